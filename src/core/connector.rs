use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::rest::{ReqwestRest, RestClient};
use crate::core::kernel::router::{DataHandler, MessageRouter, StatusCallback};
use crate::core::kernel::session::{
    spawn_socket, SessionCommand, SessionContext, SocketHandle, SocketSpec,
};
use crate::core::kernel::ws::{ConnectionStats, TungsteniteWs, WsSession};
use crate::core::kernel::SubscriptionRegistry;
use crate::core::traits::ExchangeConnector;
use crate::core::types::{ConnectionState, Endpoint, RequestParams, SubAckStatus, Subscription};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

/// Wires a REST dispatcher and any number of sockets into a [`ConnectorHandle`]
pub struct ConnectorBuilder {
    exchange: String,
    rest: ReqwestRest,
    credentials: Option<Credentials>,
    router: MessageRouter,
    sockets: Vec<(SocketSpec, Box<dyn WsSession>)>,
}

impl ConnectorBuilder {
    /// # Arguments
    /// * `exchange` - Exchange name for logging and tracing
    /// * `rest` - REST dispatcher, already carrying the exchange's signer
    pub fn new(exchange: impl Into<String>, rest: ReqwestRest) -> Self {
        Self {
            exchange: exchange.into(),
            rest,
            credentials: None,
            router: MessageRouter::new(),
            sockets: Vec::new(),
        }
    }

    /// Credentials for socket login; `None` keeps every socket unauthenticated
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    /// Observer for state changes, login results and subscription acks
    pub fn with_status_callback(self, callback: StatusCallback) -> Self {
        self.router.set_status_callback(callback);
        self
    }

    /// Add a socket backed by a real WebSocket connection
    pub fn socket(self, spec: SocketSpec) -> Self {
        let transport = TungsteniteWs::new(
            spec.url.clone(),
            format!("{}/{}", self.exchange, spec.name),
        );
        self.socket_with_transport(spec, transport)
    }

    /// Add a socket over a caller-supplied transport
    pub fn socket_with_transport(
        mut self,
        spec: SocketSpec,
        transport: impl WsSession + 'static,
    ) -> Self {
        self.sockets.push((spec, Box::new(transport)));
        self
    }

    /// Spawn every socket and hand back the connector. Must run inside a tokio runtime.
    pub fn start(self) -> ConnectorHandle {
        let registry = SubscriptionRegistry::new();
        let cancel = CancellationToken::new();

        let sockets = self
            .sockets
            .into_iter()
            .map(|(spec, transport)| {
                let context = SessionContext {
                    exchange: self.exchange.clone(),
                    registry: registry.clone(),
                    router: self.router.clone(),
                    credentials: self.credentials.clone(),
                    cancel: cancel.child_token(),
                };
                spawn_socket(spec, transport, context)
            })
            .collect::<Vec<_>>();

        info!(exchange = %self.exchange, sockets = sockets.len(), "Connector started");

        ConnectorHandle {
            exchange: self.exchange,
            rest: self.rest,
            registry,
            router: self.router,
            sockets,
            cancel,
        }
    }
}

/// One live connection to one exchange: a REST dispatcher plus its sockets.
///
/// Subscriptions are kept in a registry owned by the handle, so they are replayed on
/// every reconnect until explicitly removed. Dropping the handle stops every socket.
pub struct ConnectorHandle {
    exchange: String,
    rest: ReqwestRest,
    registry: SubscriptionRegistry,
    router: MessageRouter,
    sockets: Vec<SocketHandle>,
    cancel: CancellationToken,
}

impl std::fmt::Debug for ConnectorHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorHandle")
            .field("exchange", &self.exchange)
            .field("sockets", &self.sockets)
            .field("subscriptions", &self.registry.len())
            .finish_non_exhaustive()
    }
}

impl ConnectorHandle {
    /// Execute a catalog endpoint and deserialize the response
    pub async fn rest_call_json<T: DeserializeOwned + Send>(
        &self,
        endpoint: &Endpoint,
        params: &RequestParams,
    ) -> Result<T, ExchangeError> {
        self.rest
            .call_json(endpoint.method, endpoint.path, params, endpoint.signed)
            .await
    }

    pub fn rest(&self) -> &ReqwestRest {
        &self.rest
    }

    /// Names of the sockets in start order
    pub fn socket_names(&self) -> Vec<&str> {
        self.sockets.iter().map(SocketHandle::name).collect()
    }

    pub fn state(&self, socket: &str) -> Option<ConnectionState> {
        self.socket(socket).map(SocketHandle::state)
    }

    pub fn state_receiver(&self, socket: &str) -> Option<watch::Receiver<ConnectionState>> {
        self.socket(socket).map(SocketHandle::state_receiver)
    }

    pub fn stats(&self, socket: &str) -> Option<Arc<ConnectionStats>> {
        self.socket(socket).map(SocketHandle::stats)
    }

    /// Latest acknowledgement state of a subscribed channel
    pub fn subscription_status(&self, channel_id: &str) -> Option<SubAckStatus> {
        self.router.subscription_status(channel_id)
    }

    /// Currently desired subscriptions in insertion order
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.snapshot()
    }

    pub fn set_status_callback(&self, callback: StatusCallback) {
        self.router.set_status_callback(callback);
    }

    fn socket(&self, name: &str) -> Option<&SocketHandle> {
        self.sockets.iter().find(|s| s.name() == name)
    }
}

#[async_trait]
impl ExchangeConnector for ConnectorHandle {
    fn exchange_name(&self) -> &str {
        &self.exchange
    }

    #[instrument(skip(self, params), fields(exchange = %self.exchange, endpoint = %endpoint.path))]
    async fn rest_call(
        &self,
        endpoint: &Endpoint,
        params: &RequestParams,
    ) -> Result<Value, ExchangeError> {
        self.rest.call_endpoint(endpoint, params).await
    }

    fn subscribe(
        &self,
        subscription: Subscription,
        handler: DataHandler,
    ) -> Result<bool, ExchangeError> {
        let targets: Vec<&SocketHandle> = self
            .sockets
            .iter()
            .filter(|s| s.accepts(&subscription))
            .collect();
        if targets.is_empty() {
            return Err(ExchangeError::InvalidParameters(format!(
                "No {} socket carries channel '{}'",
                self.exchange, subscription.channel_id
            )));
        }

        self.router.register(&subscription.channel_id, handler);
        if !self.registry.add(subscription.clone()) {
            debug!(channel = %subscription.channel_id, "Already subscribed, handler replaced");
            return Ok(false);
        }

        for socket in targets {
            if let Err(e) = socket.send(SessionCommand::Subscribe(subscription.clone())) {
                warn!(channel = %subscription.channel_id, error = %e, "Subscribe not forwarded");
            }
        }
        Ok(true)
    }

    fn unsubscribe(&self, channel_id: &str) -> bool {
        let Some(subscription) = self.registry.remove(channel_id) else {
            return false;
        };
        self.router.unregister(channel_id);

        for socket in self.sockets.iter().filter(|s| s.accepts(&subscription)) {
            if let Err(e) = socket.send(SessionCommand::Unsubscribe(subscription.clone())) {
                warn!(channel = %channel_id, error = %e, "Unsubscribe not forwarded");
            }
        }
        true
    }

    async fn close(&mut self) {
        self.cancel.cancel();
        for socket in &mut self.sockets {
            socket.join().await;
        }
        info!(exchange = %self.exchange, "Connector closed");
    }
}

impl Drop for ConnectorHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
