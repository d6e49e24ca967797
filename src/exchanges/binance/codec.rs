use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::parse_text;
use crate::core::kernel::WsCodec;
use crate::core::types::{InboundMessage, Subscription};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio_tungstenite::tungstenite::Message;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RequestKind {
    Subscribe,
    Unsubscribe,
}

/// Codec for the combined-stream endpoint.
///
/// Requests carry numeric ids and the replies only echo the id, so the codec keeps the
/// id → channel mapping of every request still waiting for its reply.
#[derive(Debug, Default)]
pub struct BinanceCodec {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, (String, RequestKind)>>,
}

impl BinanceCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn request(&self, method: &str, channel_id: &str, kind: RequestKind) -> Message {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending.lock().insert(id, (channel_id.to_string(), kind));
        let frame = json!({
            "method": method,
            "params": [channel_id],
            "id": id
        });
        Message::Text(frame.to_string())
    }

    fn take_pending(&self, id: Option<u64>) -> Option<(String, RequestKind)> {
        id.and_then(|id| self.pending.lock().remove(&id))
    }

    /// Requests sent but not yet answered
    pub fn pending_requests(&self) -> usize {
        self.pending.lock().len()
    }
}

impl WsCodec for BinanceCodec {
    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError> {
        Ok(self.request(
            "SUBSCRIBE",
            &subscription.channel_id,
            RequestKind::Subscribe,
        ))
    }

    fn encode_unsubscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Message, ExchangeError> {
        Ok(self.request(
            "UNSUBSCRIBE",
            &subscription.channel_id,
            RequestKind::Unsubscribe,
        ))
    }

    fn reset(&self) {
        self.pending.lock().clear();
    }

    fn decode_message(&self, message: Message) -> Result<Option<InboundMessage>, ExchangeError> {
        let text = match message {
            Message::Text(text) => text,
            Message::Binary(data) => String::from_utf8(data).map_err(|e| {
                ExchangeError::DeserializationError(format!(
                    "Invalid UTF-8 in binary message: {}",
                    e
                ))
            })?,
            _ => return Ok(None),
        };
        let mut value = parse_text(&text)?;

        if let Some(channel_id) = value.get("stream").and_then(Value::as_str) {
            let channel_id = channel_id.to_string();
            let payload = value.get_mut("data").map(Value::take).unwrap_or(Value::Null);
            return Ok(Some(InboundMessage::Data {
                channel_id,
                payload,
            }));
        }

        let id = value.get("id").and_then(Value::as_u64);

        if let Some(error) = value.get("error") {
            let reason = error
                .get("msg")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string);
            return Ok(match self.take_pending(id) {
                Some((channel_id, RequestKind::Subscribe)) => Some(InboundMessage::SubAck {
                    channel_id,
                    success: false,
                    reason: Some(reason),
                }),
                _ => None,
            });
        }

        if value.get("result").is_some() && id.is_some() {
            return Ok(match self.take_pending(id) {
                Some((channel_id, RequestKind::Subscribe)) => Some(InboundMessage::SubAck {
                    channel_id,
                    success: true,
                    reason: None,
                }),
                _ => None,
            });
        }

        Err(ExchangeError::DeserializationError(format!(
            "Unrecognized frame: {}",
            text
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchanges::binance::channels;

    fn frame_id(message: &Message) -> u64 {
        let Message::Text(text) = message else {
            panic!("expected text frame");
        };
        serde_json::from_str::<Value>(text).unwrap()["id"]
            .as_u64()
            .unwrap()
    }

    #[test]
    fn test_subscribe_frame() {
        let codec = BinanceCodec::new();
        let frame = codec
            .encode_subscription(&channels::trade("btcusdt"))
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["method"], "SUBSCRIBE");
        assert_eq!(value["params"], json!(["btcusdt@trade"]));
        assert_eq!(value["id"], 1);
    }

    #[test]
    fn test_result_reply_maps_back_to_channel() {
        let codec = BinanceCodec::new();
        let first = codec.encode_subscription(&channels::trade("btcusdt")).unwrap();
        let second = codec
            .encode_subscription(&channels::kline("ethusdt", "1m"))
            .unwrap();
        assert_eq!(codec.pending_requests(), 2);

        let reply = format!(r#"{{"result":null,"id":{}}}"#, frame_id(&second));
        match codec.decode_message(Message::Text(reply)).unwrap() {
            Some(InboundMessage::SubAck {
                channel_id,
                success,
                ..
            }) => {
                assert_eq!(channel_id, "ethusdt@kline_1m");
                assert!(success);
            }
            other => panic!("unexpected {:?}", other),
        }

        let error = format!(
            r#"{{"error":{{"code":2,"msg":"Invalid request"}},"id":{}}}"#,
            frame_id(&first)
        );
        match codec.decode_message(Message::Text(error)).unwrap() {
            Some(InboundMessage::SubAck {
                channel_id,
                success,
                reason,
            }) => {
                assert_eq!(channel_id, "btcusdt@trade");
                assert!(!success);
                assert_eq!(reason.as_deref(), Some("Invalid request"));
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(codec.pending_requests(), 0);
    }

    #[test]
    fn test_unsubscribe_reply_is_ignored() {
        let codec = BinanceCodec::new();
        let frame = codec
            .encode_unsubscription(&channels::trade("btcusdt"))
            .unwrap();
        let reply = format!(r#"{{"result":null,"id":{}}}"#, frame_id(&frame));
        assert!(codec.decode_message(Message::Text(reply)).unwrap().is_none());
    }

    #[test]
    fn test_reset_forgets_unanswered_requests() {
        let codec = BinanceCodec::new();
        let stale = codec.encode_subscription(&channels::trade("btcusdt")).unwrap();
        codec
            .encode_unsubscription(&channels::depth("btcusdt"))
            .unwrap();
        assert_eq!(codec.pending_requests(), 2);

        codec.reset();
        assert_eq!(codec.pending_requests(), 0);

        // a reply from the previous connection no longer maps to anything
        let reply = format!(r#"{{"result":null,"id":{}}}"#, frame_id(&stale));
        assert!(codec.decode_message(Message::Text(reply)).unwrap().is_none());

        // ids keep increasing so they never collide with old replies
        let fresh = codec.encode_subscription(&channels::trade("btcusdt")).unwrap();
        assert_eq!(frame_id(&fresh), 3);
        assert_eq!(codec.pending_requests(), 1);
    }

    #[test]
    fn test_stream_frame_yields_data_payload() {
        let codec = BinanceCodec::new();
        let text = r#"{"stream":"btcusdt@trade","data":{"e":"trade","s":"BTCUSDT","p":"0.001"}}"#;
        match codec.decode_message(Message::Text(text.to_string())).unwrap() {
            Some(InboundMessage::Data {
                channel_id,
                payload,
            }) => {
                assert_eq!(channel_id, "btcusdt@trade");
                assert_eq!(payload["s"], "BTCUSDT");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_garbage_is_a_parse_failure() {
        let codec = BinanceCodec::new();
        assert!(codec
            .decode_message(Message::Text("not json".to_string()))
            .is_err());
        assert!(codec
            .decode_message(Message::Text(r#"{"unexpected":true}"#.to_string()))
            .is_err());
    }
}
