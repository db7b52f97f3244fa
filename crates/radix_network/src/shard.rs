//! Shards and shard spaces.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// A partition identifier.
pub type Shard = i64;

/// A set of shards a request needs to be served from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Shards(BTreeSet<Shard>);

impl Shards {
    pub fn single(shard: Shard) -> Self {
        Self(BTreeSet::from([shard]))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Shard> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }
}

impl FromIterator<Shard> for Shards {
    fn from_iter<I: IntoIterator<Item = Shard>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// An inclusive range of shards, relative to a [`ShardSpace`] anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardRange {
    pub low: Shard,
    pub high: Shard,
}

impl ShardRange {
    pub fn new(low: Shard, high: Shard) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, offset: Shard) -> bool {
        self.low <= offset && offset <= self.high
    }
}

/// The shards a node is responsible for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ShardSpace {
    pub anchor: Shard,
    pub range: ShardRange,
}

impl ShardSpace {
    pub fn new(anchor: Shard, range: ShardRange) -> Self {
        Self { anchor, range }
    }

    /// Whether `shard` falls inside this space. The range is measured from
    /// the anchor with wrapping arithmetic.
    pub fn contains(&self, shard: Shard) -> bool {
        self.range.contains(shard.wrapping_sub(self.anchor))
    }

    /// Whether any of `shards` falls inside this space.
    pub fn intersects(&self, shards: &Shards) -> bool {
        shards.iter().any(|s| self.contains(*s))
    }
}
