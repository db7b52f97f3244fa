//! RadixNetworkController: composition root of the orchestration layer.
//!
//! [`RadixNetworkController`] owns:
//! - The action bus (FIFO, one action reduced at a time)
//! - The network state, updated by the reducer before an action is broadcast
//! - The epics, each running as its own task for the controller's lifetime
//! - The shared pool of node channels

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::action::NodeAction;
use crate::config::NetworkConfig;
use crate::epics::{
    AutoCloseEpic, AutoConnectEpic, ConnectWebSocketEpic, DiscoverNodesEpic, Epic, EpicContext,
    FetchAtomsEpic, FindANodeEpic, RpcMethodsEpic, SearchSettings, SubmitAtomEpic,
};
use crate::error::NetworkError;
use crate::reducer::reduce;
use crate::selector::PeerSelector;
use crate::state::RadixNetworkState;
use crate::transport::{
    NodeHttpClient, ReqwestNodeHttpClient, TungsteniteFactory, WebSocketFactory, WebSockets,
};

type Subscribers = Arc<Mutex<Vec<mpsc::UnboundedSender<NodeAction>>>>;

/// Builder for [`RadixNetworkController`].
///
/// Transports default to tokio-tungstenite channels and a reqwest HTTP
/// client configured from the [`NetworkConfig`].
pub struct RadixNetworkControllerBuilder {
    config: NetworkConfig,
    factory: Option<Arc<dyn WebSocketFactory>>,
    http: Option<Arc<dyn NodeHttpClient>>,
    selector: Option<Arc<dyn PeerSelector>>,
    initial_state: RadixNetworkState,
    extra_epics: Vec<Arc<dyn Epic>>,
    default_epics: bool,
}

impl RadixNetworkControllerBuilder {
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            factory: None,
            http: None,
            selector: None,
            initial_state: RadixNetworkState::new(),
            extra_epics: Vec::new(),
            default_epics: true,
        }
    }

    pub fn websocket_factory(mut self, factory: Arc<dyn WebSocketFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub fn http_client(mut self, http: Arc<dyn NodeHttpClient>) -> Self {
        self.http = Some(http);
        self
    }

    /// Overrides `config.peer_selector`.
    pub fn peer_selector(mut self, selector: Arc<dyn PeerSelector>) -> Self {
        self.selector = Some(selector);
        self
    }

    pub fn initial_state(mut self, state: RadixNetworkState) -> Self {
        self.initial_state = state;
        self
    }

    /// Run `epic` alongside the default ones.
    pub fn epic(mut self, epic: Arc<dyn Epic>) -> Self {
        self.extra_epics.push(epic);
        self
    }

    /// Run only the epics added with [`epic`](Self::epic).
    pub fn without_default_epics(mut self) -> Self {
        self.default_epics = false;
        self
    }

    /// Start the controller. Must be called within a tokio runtime.
    pub fn build(self) -> Result<RadixNetworkController, NetworkError> {
        let seeds = self.config.seed_nodes()?;
        let factory = self
            .factory
            .unwrap_or_else(|| Arc::new(TungsteniteFactory::from_config(&self.config)));
        let http = self
            .http
            .unwrap_or_else(|| Arc::new(ReqwestNodeHttpClient::new(self.config.rpc_timeout)));
        let selector = self
            .selector
            .unwrap_or_else(|| Arc::from(self.config.peer_selector.build()));
        let sockets = Arc::new(WebSockets::new(factory));

        let mut epics: Vec<Arc<dyn Epic>> = Vec::new();
        if self.default_epics {
            let config = &self.config;
            epics.push(Arc::new(DiscoverNodesEpic::new(
                seeds,
                config.universe.clone(),
                http,
            )));
            epics.push(Arc::new(FindANodeEpic::new(
                SearchSettings {
                    max_connecting: config.max_simultaneous_connection_requests,
                    universe: config.universe.clone(),
                },
                selector,
            )));
            epics.push(Arc::new(ConnectWebSocketEpic::new(
                Arc::clone(&sockets),
                config.max_simultaneous_connection_requests,
            )));
            epics.push(Arc::new(AutoConnectEpic));
            epics.push(Arc::new(AutoCloseEpic::new(config.auto_close_grace)));
            epics.push(Arc::new(RpcMethodsEpic::new(
                Arc::clone(&sockets),
                config.rpc_timeout,
            )));
            epics.push(Arc::new(SubmitAtomEpic::new(
                Arc::clone(&sockets),
                config.submit_timeout,
                config.rpc_timeout,
            )));
            epics.push(Arc::new(FetchAtomsEpic::new(
                Arc::clone(&sockets),
                config.rpc_timeout,
            )));
        }
        epics.extend(self.extra_epics);

        Ok(RadixNetworkController::start(
            self.initial_state,
            sockets,
            epics,
        ))
    }
}

/// The running network layer.
///
/// Callers [`dispatch`](Self::dispatch) request actions and observe the
/// resulting actions and state. Dropping the controller stops every task it
/// started.
pub struct RadixNetworkController {
    inbox: mpsc::UnboundedSender<NodeAction>,
    subscribers: Subscribers,
    state_rx: watch::Receiver<RadixNetworkState>,
    sockets: Arc<WebSockets>,
    bus: JoinHandle<()>,
    epics: Vec<(&'static str, JoinHandle<()>)>,
}

impl RadixNetworkController {
    pub fn builder(config: NetworkConfig) -> RadixNetworkControllerBuilder {
        RadixNetworkControllerBuilder::new(config)
    }

    /// Start with the default transports and epics.
    pub fn new(config: NetworkConfig) -> Result<Self, NetworkError> {
        Self::builder(config).build()
    }

    fn start(
        initial_state: RadixNetworkState,
        sockets: Arc<WebSockets>,
        epics: Vec<Arc<dyn Epic>>,
    ) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let (state_tx, state_rx) = watch::channel(initial_state);
        let subscribers: Subscribers = Arc::new(Mutex::new(Vec::new()));

        // Epics subscribe before the bus runs so they see every action.
        let handles = epics
            .into_iter()
            .map(|epic| {
                let (tx, rx) = mpsc::unbounded_channel();
                subscribers.lock().push(tx);
                let ctx = EpicContext::new(rx, state_rx.clone(), inbox_tx.clone());
                let name = epic.name();
                let handle = tokio::spawn(async move {
                    epic.run(ctx).await;
                    debug!(epic = name, "Epic stopped");
                });
                (name, handle)
            })
            .collect::<Vec<_>>();

        let bus = tokio::spawn(run_bus(inbox_rx, state_tx, Arc::clone(&subscribers)));
        info!(epics = handles.len(), "Radix network controller started");

        Self {
            inbox: inbox_tx,
            subscribers,
            state_rx,
            sockets,
            bus,
            epics: handles,
        }
    }

    /// Enqueue an action. Actions are reduced and broadcast in dispatch
    /// order.
    pub fn dispatch(&self, action: NodeAction) {
        if self.inbox.send(action).is_err() || self.bus.is_finished() {
            warn!("Dispatch on a stopped controller ignored");
        }
    }

    /// Every action from now on, after it has been reduced into state.
    pub fn actions(&self) -> mpsc::UnboundedReceiver<NodeAction> {
        let (tx, rx) = mpsc::unbounded_channel();
        if !self.bus.is_finished() {
            self.subscribers.lock().push(tx);
        }
        rx
    }

    /// Network state, marked changed whenever an action changes it.
    pub fn observe_network_state(&self) -> watch::Receiver<RadixNetworkState> {
        self.state_rx.clone()
    }

    pub fn current_network_state(&self) -> RadixNetworkState {
        self.state_rx.borrow().clone()
    }

    /// The shared channel pool.
    pub fn websockets(&self) -> &Arc<WebSockets> {
        &self.sockets
    }

    /// Whether the bus is still processing actions.
    pub fn is_running(&self) -> bool {
        !self.bus.is_finished()
    }

    /// Stop the bus and every epic, then close all channels.
    pub fn shutdown(&mut self) {
        self.stop_tasks();
        self.sockets.close_all();
        info!("Radix network controller stopped");
    }

    fn stop_tasks(&mut self) {
        self.bus.abort();
        for (name, handle) in self.epics.drain(..) {
            debug!(epic = name, "Stopping epic");
            handle.abort();
        }
        self.subscribers.lock().clear();
    }
}

impl Drop for RadixNetworkController {
    fn drop(&mut self) {
        self.stop_tasks();
    }
}

/// Reduce each action, publish the new state, then hand the action to every
/// subscriber. A state error stops the bus.
async fn run_bus(
    mut inbox: mpsc::UnboundedReceiver<NodeAction>,
    state_tx: watch::Sender<RadixNetworkState>,
    subscribers: Subscribers,
) {
    while let Some(action) = inbox.recv().await {
        debug!(action = action.name(), node = ?action.node(), "Routing action");

        let mut failure = None;
        state_tx.send_if_modified(|state| match reduce(state, &action) {
            Ok(next) if next != *state => {
                if let NodeAction::AddNode { node, .. } = &action {
                    if !state.contains(node) {
                        info!(node = %node, "Node added");
                    }
                }
                *state = next;
                true
            }
            Ok(_) => false,
            Err(e) => {
                failure = Some(e);
                false
            }
        });
        if let Some(e) = failure {
            error!(action = action.name(), "Network state invariant violated, stopping: {e}");
            break;
        }

        subscribers
            .lock()
            .retain(|tx| tx.send(action.clone()).is_ok());
    }

    subscribers.lock().clear();
}
