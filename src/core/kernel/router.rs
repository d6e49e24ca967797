use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::WsCodec;
use crate::core::types::{ConnectionState, InboundMessage, SubAckStatus};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

/// Caller-supplied sink for one channel's data frames: `(channel_id, payload)`
pub type DataHandler = Arc<dyn Fn(&str, Value) + Send + Sync>;

/// Optional observer for session bookkeeping
pub type StatusCallback = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// Bookkeeping notifications emitted by sockets
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    StateChanged {
        socket: String,
        state: ConnectionState,
    },
    Authenticated {
        socket: String,
        success: bool,
        reason: Option<String>,
    },
    SubscriptionAck {
        socket: String,
        channel_id: String,
        status: SubAckStatus,
    },
}

/// What the socket has to do after a frame was routed
#[derive(Debug, Clone, PartialEq)]
pub enum RouteOutcome {
    /// Send this frame back immediately
    Reply(Message),
    Auth {
        success: bool,
        reason: Option<String>,
    },
    Delivered,
    /// Data for a channel with no handler (removed mid-flight)
    Unmatched,
    Ignored,
}

/// Classifies inbound frames and dispatches data to per-channel handlers.
///
/// One router is shared by every socket of a connector; handlers are keyed by channel
/// id so it does not matter which socket a frame arrived on.
#[derive(Clone, Default)]
pub struct MessageRouter {
    handlers: Arc<RwLock<HashMap<String, DataHandler>>>,
    sub_status: Arc<Mutex<HashMap<String, SubAckStatus>>>,
    status_callback: Arc<RwLock<Option<StatusCallback>>>,
}

impl std::fmt::Debug for MessageRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MessageRouter")
            .field("handlers", &self.handlers.read().len())
            .field("has_status_callback", &self.status_callback.read().is_some())
            .finish()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, channel_id: &str, handler: DataHandler) {
        self.handlers.write().insert(channel_id.to_string(), handler);
    }

    pub fn unregister(&self, channel_id: &str) {
        self.handlers.write().remove(channel_id);
        self.sub_status.lock().remove(channel_id);
    }

    pub fn set_status_callback(&self, callback: StatusCallback) {
        *self.status_callback.write() = Some(callback);
    }

    /// Record that a subscribe frame for `channel_id` is in flight
    pub fn mark_pending(&self, channel_id: &str) {
        self.sub_status
            .lock()
            .insert(channel_id.to_string(), SubAckStatus::Pending);
    }

    pub fn subscription_status(&self, channel_id: &str) -> Option<SubAckStatus> {
        self.sub_status.lock().get(channel_id).cloned()
    }

    /// Exact handler first, then a wildcard registration such as `orders#*`
    fn handler_for(&self, channel_id: &str) -> Option<DataHandler> {
        let handlers = self.handlers.read();
        if let Some(handler) = handlers.get(channel_id) {
            return Some(handler.clone());
        }
        handlers
            .iter()
            .find(|(pattern, _)| matches_wildcard(pattern, channel_id))
            .map(|(_, handler)| handler.clone())
    }

    pub fn emit(&self, event: &SessionEvent) {
        let callback = self.status_callback.read().clone();
        if let Some(callback) = callback {
            callback(event);
        }
    }

    /// Turn a raw frame into an [`InboundMessage`].
    ///
    /// Transport pings become heartbeats answered with a pong carrying the same payload;
    /// everything else is up to the codec. Close frames are the socket's business and
    /// must not be passed here.
    pub fn classify(
        &self,
        codec: &dyn WsCodec,
        frame: Message,
    ) -> Result<Option<InboundMessage>, ExchangeError> {
        match frame {
            Message::Ping(payload) => Ok(Some(InboundMessage::Heartbeat {
                reply: Message::Pong(payload),
            })),
            Message::Pong(_) | Message::Frame(_) | Message::Close(_) => Ok(None),
            other => codec.decode_message(other),
        }
    }

    /// Act on a classified frame.
    pub fn dispatch(&self, socket: &str, message: InboundMessage) -> RouteOutcome {
        match message {
            InboundMessage::Heartbeat { reply } => RouteOutcome::Reply(reply),
            InboundMessage::AuthAck { success, reason } => {
                self.emit(&SessionEvent::Authenticated {
                    socket: socket.to_string(),
                    success,
                    reason: reason.clone(),
                });
                RouteOutcome::Auth { success, reason }
            }
            InboundMessage::SubAck {
                channel_id,
                success,
                reason,
            } => {
                let status = if success {
                    SubAckStatus::Confirmed
                } else {
                    SubAckStatus::Rejected(reason.unwrap_or_else(|| "rejected".to_string()))
                };
                {
                    let mut sub_status = self.sub_status.lock();
                    let Some(entry) = sub_status.get_mut(&channel_id) else {
                        debug!(socket, channel = %channel_id, "Ack for a channel no longer subscribed");
                        return RouteOutcome::Ignored;
                    };
                    *entry = status.clone();
                }
                if let SubAckStatus::Rejected(reason) = &status {
                    warn!(socket, channel = %channel_id, reason = %reason, "Subscription rejected");
                } else {
                    debug!(socket, channel = %channel_id, "Subscription confirmed");
                }
                self.emit(&SessionEvent::SubscriptionAck {
                    socket: socket.to_string(),
                    channel_id,
                    status,
                });
                RouteOutcome::Ignored
            }
            InboundMessage::Data {
                channel_id,
                payload,
            } => {
                let handler = self.handler_for(&channel_id);
                match handler {
                    Some(handler) => {
                        handler(&channel_id, payload);
                        RouteOutcome::Delivered
                    }
                    None => {
                        trace!(socket, channel = %channel_id, "Dropping data for unknown channel");
                        RouteOutcome::Unmatched
                    }
                }
            }
        }
    }
}

/// `*` stands for exactly one `#`-separated segment: `trade.clearing#*#0` matches
/// `trade.clearing#btcusdt#0` but not `trade.clearing#btcusdt#1`.
fn matches_wildcard(pattern: &str, channel_id: &str) -> bool {
    if !pattern.contains('*') {
        return false;
    }
    let mut expected = pattern.split('#');
    let mut actual = channel_id.split('#');
    loop {
        match (expected.next(), actual.next()) {
            (None, None) => return true,
            (Some(e), Some(a)) if e == "*" || e == a => {}
            _ => return false,
        }
    }
}
