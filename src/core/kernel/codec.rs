use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::types::{InboundMessage, Subscription};
use tokio_tungstenite::tungstenite::Message;

/// Codec trait for handling exchange-specific WebSocket message encoding/decoding
///
/// This trait defines the contract for converting between raw WebSocket frames and
/// the exchange-neutral [`InboundMessage`]. Each socket of each exchange gets one codec;
/// sockets of the same exchange may use different codecs when their protocols differ.
pub trait WsCodec: Send + Sync + 'static {
    /// Encode a subscription request into a WebSocket message
    ///
    /// # Arguments
    /// * `subscription` - The channel to subscribe to
    ///
    /// # Returns
    /// A WebSocket message ready to be sent to the exchange
    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError>;

    /// Encode an unsubscription request into a WebSocket message
    fn encode_unsubscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Message, ExchangeError>;

    /// Encode the login frame for an authenticated socket
    ///
    /// # Returns
    /// - `Ok(Some(message))` - frame to send before subscribing
    /// - `Ok(None)` - this socket does not authenticate
    fn encode_auth(
        &self,
        _credentials: &Credentials,
        _timestamp: u64,
    ) -> Result<Option<Message>, ExchangeError> {
        Ok(None)
    }

    /// Decode a raw text or binary frame
    ///
    /// Transport control frames (ping, pong, close) never reach the codec.
    ///
    /// # Returns
    /// - `Ok(Some(message))` - Successfully classified frame
    /// - `Ok(None)` - Frame is valid but carries nothing to act on
    /// - `Err(error)` - Frame could not be parsed
    fn decode_message(&self, message: Message) -> Result<Option<InboundMessage>, ExchangeError>;

    /// Forget per-connection state (e.g. request ids awaiting a reply).
    /// Called every time the socket (re)connects.
    fn reset(&self) {}
}

/// Text payload of a data frame as JSON
pub fn parse_text(text: &str) -> Result<serde_json::Value, ExchangeError> {
    serde_json::from_str(text)
        .map_err(|e| ExchangeError::DeserializationError(format!("Invalid JSON frame: {}", e)))
}
