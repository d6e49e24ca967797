use crate::core::errors::ExchangeError;
use crate::core::kernel::reconnect::ReconnectConfig;
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::protocol::Message};
use tracing::{debug, instrument};

/// Per-socket timing and recovery configuration
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Upper bound for the TCP + TLS + upgrade handshake
    pub connect_timeout: Duration,
    /// How long to wait for the login acknowledgement
    pub auth_timeout: Duration,
    /// A write stalled for longer than this counts as a lost connection
    pub send_timeout: Duration,
    /// Silence (no heartbeat frame) after which the connection counts as lost
    pub heartbeat_timeout: Duration,
    /// How often liveness is checked
    pub heartbeat_check_interval: Duration,
    /// Consecutive undecodable frames that force a reconnect
    pub parse_failure_threshold: u32,
    /// `Active` time after which the backoff schedule starts over
    pub stability_threshold: Duration,
    pub reconnect: ReconnectConfig,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            auth_timeout: Duration::from_secs(5),
            send_timeout: Duration::from_secs(10),
            heartbeat_timeout: Duration::from_secs(60),
            heartbeat_check_interval: Duration::from_secs(1),
            parse_failure_threshold: 5,
            stability_threshold: Duration::from_secs(60),
            reconnect: ReconnectConfig::default(),
        }
    }
}

impl WsConfig {
    /// Set the heartbeat timeout
    pub fn with_heartbeat_timeout(mut self, timeout: Duration) -> Self {
        self.heartbeat_timeout = timeout;
        self
    }

    /// Set the login acknowledgement timeout
    pub fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_send_timeout(mut self, timeout: Duration) -> Self {
        self.send_timeout = timeout;
        self
    }

    pub fn with_parse_failure_threshold(mut self, threshold: u32) -> Self {
        self.parse_failure_threshold = threshold;
        self
    }

    pub fn with_stability_threshold(mut self, threshold: Duration) -> Self {
        self.stability_threshold = threshold;
        self
    }

    pub fn with_reconnect(mut self, reconnect: ReconnectConfig) -> Self {
        self.reconnect = reconnect;
        self
    }
}

/// WebSocket session trait - pure transport layer
///
/// Control frames are passed through untouched: answering pings is the session's job so
/// that every heartbeat is counted and replied to exactly once.
#[async_trait]
pub trait WsSession: Send {
    /// Connect to the WebSocket
    async fn connect(&mut self) -> Result<(), ExchangeError>;

    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Receive the next raw message. `None` means the stream ended.
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ExchangeError>;

    /// Check if the connection is alive
    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Tungstenite-based WebSocket transport. TLS goes through native-tls with the
/// platform's certificate validation.
pub struct TungsteniteWs {
    url: String,
    socket_name: String,
    write: Option<futures_util::stream::SplitSink<WsStream, Message>>,
    read: Option<futures_util::stream::SplitStream<WsStream>>,
    connected: bool,
}

impl TungsteniteWs {
    /// Create a new WebSocket transport
    ///
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to
    /// * `socket_name` - Name used in logs, e.g. `huobi/market`
    pub fn new(url: String, socket_name: String) -> Self {
        Self {
            url,
            socket_name,
            write: None,
            read: None,
            connected: false,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WsSession for TungsteniteWs {
    #[instrument(skip(self), fields(socket = %self.socket_name, url = %self.url))]
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        let (ws_stream, _) = connect_async(self.url.as_str()).await.map_err(|e| {
            ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e))
        })?;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;
        debug!("WebSocket connected");

        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.connected {
            return Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            ));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            ExchangeError::NetworkError("WebSocket write stream not available".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.connected = false;
            ExchangeError::WebSocketError(format!("Failed to send WebSocket message: {}", e))
        })
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        if !self.connected {
            return Some(Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            )));
        }

        let read = self.read.as_mut()?;

        match read.next().await {
            Some(Ok(message)) => {
                if matches!(message, Message::Close(_)) {
                    self.connected = false;
                }
                Some(Ok(message))
            }
            Some(Err(e)) => {
                self.connected = false;
                Some(Err(ExchangeError::WebSocketError(format!(
                    "WebSocket error: {}",
                    e
                ))))
            }
            None => {
                self.connected = false;
                None
            }
        }
    }

    #[instrument(skip(self), fields(socket = %self.socket_name))]
    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some(write) = self.write.as_mut() {
            if self.connected {
                let _ = write.send(Message::Close(None)).await;
            }
        }
        self.connected = false;
        self.write = None;
        self.read = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Counters for one socket, shared between its task and the connector handle
#[derive(Debug, Default)]
pub struct ConnectionStats {
    frames_received: AtomicU64,
    frames_sent: AtomicU64,
    heartbeats: AtomicU64,
    parse_failures: AtomicU64,
    unmatched: AtomicU64,
    reconnects: AtomicU64,
}

impl ConnectionStats {
    pub(crate) fn record_received(&self) {
        self.frames_received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_sent(&self) {
        self.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_heartbeat(&self) {
        self.heartbeats.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_parse_failure(&self) {
        self.parse_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_unmatched(&self) {
        self.unmatched.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect(&self) {
        self.reconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub fn frames_received(&self) -> u64 {
        self.frames_received.load(Ordering::Relaxed)
    }

    pub fn frames_sent(&self) -> u64 {
        self.frames_sent.load(Ordering::Relaxed)
    }

    /// Heartbeats answered
    pub fn heartbeats(&self) -> u64 {
        self.heartbeats.load(Ordering::Relaxed)
    }

    pub fn parse_failures(&self) -> u64 {
        self.parse_failures.load(Ordering::Relaxed)
    }

    /// Data frames for channels without a handler
    pub fn unmatched(&self) -> u64 {
        self.unmatched.load(Ordering::Relaxed)
    }

    pub fn reconnects(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WsConfig::default();
        assert_eq!(config.auth_timeout, Duration::from_secs(5));
        assert_eq!(config.parse_failure_threshold, 5);
        assert_eq!(config.stability_threshold, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_send_before_connect_fails() {
        let mut ws = TungsteniteWs::new(
            "wss://api.huobi.pro/ws".to_string(),
            "huobi/market".to_string(),
        );
        assert!(!ws.is_connected());
        let err = ws.send_raw(Message::Text("{}".to_string())).await.unwrap_err();
        assert!(err.is_retryable());
    }

    #[test]
    fn test_stats_counters() {
        let stats = ConnectionStats::default();
        stats.record_received();
        stats.record_received();
        stats.record_heartbeat();
        stats.record_unmatched();
        assert_eq!(stats.frames_received(), 2);
        assert_eq!(stats.heartbeats(), 1);
        assert_eq!(stats.unmatched(), 1);
        assert_eq!(stats.reconnects(), 0);
    }
}
