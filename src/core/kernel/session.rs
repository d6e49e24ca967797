use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::kernel::reconnect::Backoff;
use crate::core::kernel::registry::SubscriptionRegistry;
use crate::core::kernel::router::{MessageRouter, RouteOutcome, SessionEvent};
use crate::core::kernel::ws::{ConnectionStats, WsConfig, WsSession};
use crate::core::types::{ConnectionState, InboundMessage, Subscription};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, sleep_until, timeout, Instant, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Decides whether a subscription travels on a given socket
pub type SubscriptionFilter = Arc<dyn Fn(&Subscription) -> bool + Send + Sync>;

/// Static description of one physical socket of an exchange
#[derive(Clone)]
pub struct SocketSpec {
    /// Short name, unique per connector (e.g. `market`, `mbp`, `account`)
    pub name: String,
    pub url: String,
    /// Whether the socket logs in before subscribing
    pub requires_auth: bool,
    pub accepts: SubscriptionFilter,
    pub codec: Arc<dyn WsCodec>,
    pub config: WsConfig,
}

impl SocketSpec {
    pub fn new(name: impl Into<String>, url: impl Into<String>, codec: Arc<dyn WsCodec>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            requires_auth: false,
            accepts: Arc::new(|_: &Subscription| true),
            codec,
            config: WsConfig::default(),
        }
    }

    #[must_use]
    pub fn with_auth(mut self, requires_auth: bool) -> Self {
        self.requires_auth = requires_auth;
        self
    }

    #[must_use]
    pub fn accepting(mut self, accepts: impl Fn(&Subscription) -> bool + Send + Sync + 'static) -> Self {
        self.accepts = Arc::new(accepts);
        self
    }

    #[must_use]
    pub fn with_config(mut self, config: WsConfig) -> Self {
        self.config = config;
        self
    }
}

impl std::fmt::Debug for SocketSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketSpec")
            .field("name", &self.name)
            .field("url", &self.url)
            .field("requires_auth", &self.requires_auth)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Registry changes forwarded to a running socket
#[derive(Debug, Clone)]
pub enum SessionCommand {
    Subscribe(Subscription),
    Unsubscribe(Subscription),
}

/// Caller-side view of a spawned socket task
pub struct SocketHandle {
    name: String,
    accepts: SubscriptionFilter,
    commands: mpsc::UnboundedSender<SessionCommand>,
    state: watch::Receiver<ConnectionState>,
    stats: Arc<ConnectionStats>,
    task: Option<JoinHandle<()>>,
}

impl SocketHandle {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn accepts(&self, subscription: &Subscription) -> bool {
        (self.accepts)(subscription)
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch channel that sees every state this socket publishes
    pub fn state_receiver(&self) -> watch::Receiver<ConnectionState> {
        self.state.clone()
    }

    pub fn stats(&self) -> Arc<ConnectionStats> {
        self.stats.clone()
    }

    /// Forward a registry change. Commands queue up while the socket is not `Active`.
    pub fn send(&self, command: SessionCommand) -> Result<(), ExchangeError> {
        self.commands.send(command).map_err(|_| {
            ExchangeError::WebSocketError(format!("Socket '{}' is closed", self.name))
        })
    }

    /// Wait for the socket task to finish. Only returns after cancellation.
    pub async fn join(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(socket = %self.name, error = %e, "Socket task ended abnormally");
            }
        }
    }
}

impl std::fmt::Debug for SocketHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SocketHandle")
            .field("name", &self.name)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

/// Shared pieces every socket of a connector works with
#[derive(Clone, Debug)]
pub struct SessionContext {
    pub exchange: String,
    pub registry: SubscriptionRegistry,
    pub router: MessageRouter,
    pub credentials: Option<Credentials>,
    pub cancel: CancellationToken,
}

/// Spawn the state machine for one socket on the current tokio runtime.
///
/// The task owns the transport, so every frame (subscribe, unsubscribe, pong) is written
/// by a single writer. It runs until `context.cancel` fires or the returned handle is
/// dropped, and always finishes in `Closed`.
pub fn spawn_socket(
    spec: SocketSpec,
    transport: impl WsSession + 'static,
    context: SessionContext,
) -> SocketHandle {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
    let stats = Arc::new(ConnectionStats::default());

    let name = spec.name.clone();
    let accepts = spec.accepts.clone();
    let backoff = Backoff::new(spec.config.reconnect.clone(), spec.config.stability_threshold);

    let driver = SocketDriver {
        spec,
        transport: Box::new(transport),
        context,
        commands: command_rx,
        state: state_tx,
        stats: stats.clone(),
        backoff,
        live: HashSet::new(),
        parse_failures: 0,
        last_heartbeat: Instant::now(),
        active_since: None,
    };
    let task = tokio::spawn(driver.run());

    SocketHandle {
        name,
        accepts,
        commands: command_tx,
        state: state_rx,
        stats,
        task: Some(task),
    }
}

/// Why the current connection ended
#[derive(Debug)]
enum Interrupt {
    /// Graceful stop; the socket goes to `Closed`
    Cancelled,
    /// Abnormal loss; the socket goes to `Reconnecting`
    Lost(String),
}

type Step<T = ()> = Result<T, Interrupt>;

enum ActiveEvent {
    Cancelled,
    Command(Option<SessionCommand>),
    CheckLiveness,
    Frame(Option<Result<Message, ExchangeError>>),
}

const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);

struct SocketDriver {
    spec: SocketSpec,
    transport: Box<dyn WsSession>,
    context: SessionContext,
    commands: mpsc::UnboundedReceiver<SessionCommand>,
    state: watch::Sender<ConnectionState>,
    stats: Arc<ConnectionStats>,
    backoff: Backoff,
    /// Channels with a subscribe frame sent on the current connection
    live: HashSet<String>,
    parse_failures: u32,
    last_heartbeat: Instant,
    active_since: Option<Instant>,
}

impl SocketDriver {
    async fn run(mut self) {
        let cancel = self.context.cancel.clone();

        loop {
            self.active_since = None;
            let interrupt = match self.establish().await {
                Ok(()) => self.stream().await,
                Err(interrupt) => interrupt,
            };

            let reason = match interrupt {
                Interrupt::Cancelled => break,
                Interrupt::Lost(reason) => reason,
            };

            let active_for = self.active_since.map(|since| since.elapsed());
            warn!(
                exchange = %self.context.exchange,
                socket = %self.spec.name,
                reason = %reason,
                "Connection lost"
            );
            self.set_state(ConnectionState::Reconnecting);
            self.stats.record_reconnect();
            self.close_transport().await;

            let delay = self.backoff.next_delay(active_for);
            debug!(
                socket = %self.spec.name,
                ?delay,
                attempt = self.backoff.attempt_count(),
                "Waiting before reconnect"
            );
            let cancelled = tokio::select! {
                biased;
                () = cancel.cancelled() => true,
                () = sleep(delay) => false,
            };
            if cancelled {
                break;
            }
        }

        self.close_transport().await;
        self.set_state(ConnectionState::Closed);
        info!(exchange = %self.context.exchange, socket = %self.spec.name, "Socket closed");
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(socket = %self.spec.name, from = %previous, to = %state, "State change");
            self.context.router.emit(&SessionEvent::StateChanged {
                socket: self.spec.name.clone(),
                state,
            });
        }
    }

    async fn close_transport(&mut self) {
        match timeout(CLOSE_TIMEOUT, self.transport.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => debug!(socket = %self.spec.name, error = %e, "Close failed"),
            Err(_) => debug!(socket = %self.spec.name, "Close timed out"),
        }
    }

    async fn establish(&mut self) -> Step {
        self.set_state(ConnectionState::Connecting);
        self.connect().await?;
        self.authenticate().await?;
        self.replay().await
    }

    async fn connect(&mut self) -> Step {
        let cancel = self.context.cancel.clone();
        let connect_timeout = self.spec.config.connect_timeout;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Interrupt::Cancelled),
            result = timeout(connect_timeout, self.transport.connect()) => result,
        };

        match result {
            Ok(Ok(())) => {
                info!(exchange = %self.context.exchange, socket = %self.spec.name, url = %self.spec.url, "Connected");
                self.parse_failures = 0;
                self.last_heartbeat = Instant::now();
                self.spec.codec.reset();
                Ok(())
            }
            Ok(Err(e)) => Err(Interrupt::Lost(format!("connect failed: {}", e))),
            Err(_) => Err(Interrupt::Lost(format!(
                "connect timed out after {:?}",
                connect_timeout
            ))),
        }
    }

    async fn authenticate(&mut self) -> Step {
        if !self.spec.requires_auth {
            return Ok(());
        }
        let Some(credentials) = self.context.credentials.clone() else {
            debug!(socket = %self.spec.name, "No credentials, skipping login");
            return Ok(());
        };

        let frame = match self.spec.codec.encode_auth(&credentials, now_millis()) {
            Ok(Some(frame)) => frame,
            Ok(None) => return Ok(()),
            Err(e) => return Err(Interrupt::Lost(format!("cannot build login frame: {}", e))),
        };

        self.set_state(ConnectionState::Authenticating);
        self.send(frame).await?;

        let cancel = self.context.cancel.clone();
        let deadline = Instant::now() + self.spec.config.auth_timeout;
        loop {
            let frame = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(Interrupt::Cancelled),
                () = sleep_until(deadline) => {
                    return Err(Interrupt::Lost("login not acknowledged in time".to_string()));
                }
                frame = self.transport.next_raw() => frame,
            };

            if let Some((success, reason)) = self.handle_frame(frame).await? {
                if success {
                    info!(socket = %self.spec.name, "Authenticated");
                    return Ok(());
                }
                return Err(Interrupt::Lost(format!(
                    "login rejected: {}",
                    reason.unwrap_or_else(|| "no reason given".to_string())
                )));
            }
        }
    }

    async fn replay(&mut self) -> Step {
        self.set_state(ConnectionState::Subscribing);
        self.live.clear();

        let snapshot: Vec<Subscription> = self
            .context
            .registry
            .snapshot()
            .into_iter()
            .filter(|s| (self.spec.accepts)(s))
            .collect();
        debug!(socket = %self.spec.name, count = snapshot.len(), "Replaying subscriptions");

        for subscription in &snapshot {
            self.subscribe(subscription).await?;
        }
        Ok(())
    }

    async fn stream(&mut self) -> Interrupt {
        self.set_state(ConnectionState::Active);
        self.active_since = Some(Instant::now());

        let cancel = self.context.cancel.clone();
        let period = self.spec.config.heartbeat_check_interval;
        let mut liveness = interval_at(Instant::now() + period, period);
        liveness.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => ActiveEvent::Cancelled,
                command = self.commands.recv() => ActiveEvent::Command(command),
                _ = liveness.tick() => ActiveEvent::CheckLiveness,
                frame = self.transport.next_raw() => ActiveEvent::Frame(frame),
            };

            let step = match event {
                ActiveEvent::Cancelled | ActiveEvent::Command(None) => {
                    return Interrupt::Cancelled;
                }
                ActiveEvent::Command(Some(command)) => self.apply(command).await,
                ActiveEvent::CheckLiveness => self.check_liveness(),
                ActiveEvent::Frame(frame) => self.handle_frame(frame).await.map(|_| ()),
            };

            if let Err(interrupt) = step {
                return interrupt;
            }
        }
    }

    async fn apply(&mut self, command: SessionCommand) -> Step {
        match command {
            SessionCommand::Subscribe(subscription) => {
                let id = &subscription.channel_id;
                // replay may already have sent it, or it was removed while queued
                if self.live.contains(id) || !self.context.registry.contains(id) {
                    return Ok(());
                }
                self.subscribe(&subscription).await
            }
            SessionCommand::Unsubscribe(subscription) => {
                let id = subscription.channel_id.clone();
                if !self.live.contains(&id) || self.context.registry.contains(&id) {
                    return Ok(());
                }
                self.live.remove(&id);
                match self.spec.codec.encode_unsubscription(&subscription) {
                    Ok(frame) => {
                        debug!(socket = %self.spec.name, channel = %id, "Unsubscribing");
                        self.send(frame).await
                    }
                    Err(e) => {
                        warn!(socket = %self.spec.name, channel = %id, error = %e, "Cannot encode unsubscribe");
                        Ok(())
                    }
                }
            }
        }
    }

    async fn subscribe(&mut self, subscription: &Subscription) -> Step {
        let id = subscription.channel_id.clone();
        match self.spec.codec.encode_subscription(subscription) {
            Ok(frame) => {
                self.context.router.mark_pending(&id);
                self.send(frame).await?;
                debug!(socket = %self.spec.name, channel = %id, "Subscribe sent");
                self.live.insert(id);
            }
            Err(e) => {
                self.context.router.mark_pending(&id);
                self.context.router.dispatch(
                    &self.spec.name,
                    InboundMessage::SubAck {
                        channel_id: id,
                        success: false,
                        reason: Some(e.to_string()),
                    },
                );
            }
        }
        Ok(())
    }

    fn check_liveness(&self) -> Step {
        let silent = self.last_heartbeat.elapsed();
        if silent >= self.spec.config.heartbeat_timeout {
            return Err(Interrupt::Lost(format!("no heartbeat for {:?}", silent)));
        }
        Ok(())
    }

    async fn send(&mut self, frame: Message) -> Step {
        let cancel = self.context.cancel.clone();
        let send_timeout = self.spec.config.send_timeout;

        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(Interrupt::Cancelled),
            result = timeout(send_timeout, self.transport.send_raw(frame)) => result,
        };

        match result {
            Ok(Ok(())) => {
                self.stats.record_sent();
                Ok(())
            }
            Ok(Err(e)) => Err(Interrupt::Lost(format!("send failed: {}", e))),
            Err(_) => Err(Interrupt::Lost(format!("send stalled for {:?}", send_timeout))),
        }
    }

    /// Route one inbound frame. Returns the login result if the frame was an auth ack.
    async fn handle_frame(
        &mut self,
        frame: Option<Result<Message, ExchangeError>>,
    ) -> Step<Option<(bool, Option<String>)>> {
        let message = match frame {
            None => return Err(Interrupt::Lost("stream ended".to_string())),
            Some(Err(e)) => return Err(Interrupt::Lost(e.to_string())),
            Some(Ok(Message::Close(frame))) => {
                return Err(Interrupt::Lost(format!("closed by server: {:?}", frame)));
            }
            Some(Ok(message)) => message,
        };
        self.stats.record_received();

        let classified = self
            .context
            .router
            .classify(self.spec.codec.as_ref(), message);

        match classified {
            Ok(Some(inbound)) => {
                self.parse_failures = 0;
                match self.context.router.dispatch(&self.spec.name, inbound) {
                    RouteOutcome::Reply(reply) => {
                        self.send(reply).await?;
                        self.stats.record_heartbeat();
                        self.last_heartbeat = Instant::now();
                    }
                    RouteOutcome::Auth { success, reason } => return Ok(Some((success, reason))),
                    RouteOutcome::Unmatched => self.stats.record_unmatched(),
                    RouteOutcome::Delivered | RouteOutcome::Ignored => {}
                }
            }
            Ok(None) => self.parse_failures = 0,
            Err(e) => {
                self.parse_failures += 1;
                self.stats.record_parse_failure();
                warn!(
                    socket = %self.spec.name,
                    error = %e,
                    consecutive = self.parse_failures,
                    "Dropping undecodable frame"
                );
                if self.parse_failures >= self.spec.config.parse_failure_threshold {
                    return Err(Interrupt::Lost(format!(
                        "{} consecutive undecodable frames",
                        self.parse_failures
                    )));
                }
            }
        }
        Ok(None)
    }
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as u64)
}

#[async_trait]
impl WsSession for Box<dyn WsSession> {
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        (**self).connect().await
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        (**self).send_raw(msg).await
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        (**self).next_raw().await
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        (**self).close().await
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }
}
