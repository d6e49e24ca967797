use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::kernel::codec::parse_text;
use crate::core::kernel::signer::{canonical_signature, utc_timestamp};
use crate::core::kernel::WsCodec;
use crate::core::types::{InboundMessage, Subscription};
use flate2::read::GzDecoder;
use serde_json::{json, Value};
use std::io::Read;
use tokio_tungstenite::tungstenite::Message;

/// Frame text; market sockets gzip every frame
fn frame_text(message: Message) -> Result<Option<String>, ExchangeError> {
    match message {
        Message::Text(text) => Ok(Some(text)),
        Message::Binary(data) => {
            let mut text = String::new();
            GzDecoder::new(data.as_slice())
                .read_to_string(&mut text)
                .map_err(|e| {
                    ExchangeError::DeserializationError(format!("Invalid gzip frame: {}", e))
                })?;
            Ok(Some(text))
        }
        _ => Ok(None),
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

/// Codec for the market (`/ws`) and MBP (`/feed`) sockets
#[derive(Debug, Clone, Copy, Default)]
pub struct HuobiMarketCodec;

impl WsCodec for HuobiMarketCodec {
    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError> {
        let frame = json!({
            "sub": subscription.channel_id,
            "id": subscription.channel_id,
        });
        Ok(Message::Text(frame.to_string()))
    }

    fn encode_unsubscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Message, ExchangeError> {
        let frame = json!({
            "unsub": subscription.channel_id,
            "id": subscription.channel_id,
        });
        Ok(Message::Text(frame.to_string()))
    }

    fn decode_message(&self, message: Message) -> Result<Option<InboundMessage>, ExchangeError> {
        let Some(text) = frame_text(message)? else {
            return Ok(None);
        };
        let value = parse_text(&text)?;

        if let Some(ping) = value.get("ping") {
            return Ok(Some(InboundMessage::Heartbeat {
                reply: Message::Text(json!({ "pong": ping }).to_string()),
            }));
        }

        if let Some(channel) = str_field(&value, "subbed") {
            return Ok(Some(InboundMessage::SubAck {
                channel_id: channel.to_string(),
                success: str_field(&value, "status") == Some("ok"),
                reason: None,
            }));
        }

        if str_field(&value, "status") == Some("error") {
            let reason = format!(
                "{}: {}",
                str_field(&value, "err-code").unwrap_or("unknown"),
                str_field(&value, "err-msg").unwrap_or("")
            );
            // subscribe frames carry the channel id as request id
            return Ok(str_field(&value, "id").map(|id| InboundMessage::SubAck {
                channel_id: id.to_string(),
                success: false,
                reason: Some(reason),
            }));
        }

        if let (Some(channel), Some(tick)) = (str_field(&value, "ch"), value.get("tick")) {
            return Ok(Some(InboundMessage::Data {
                channel_id: channel.to_string(),
                payload: tick.clone(),
            }));
        }

        if value.get("unsubbed").is_some() || value.get("rep").is_some() {
            return Ok(None);
        }

        Err(ExchangeError::DeserializationError(format!(
            "Unrecognized market frame: {}",
            text
        )))
    }
}

/// Codec for the authenticated v2 account socket (`/ws/v2`)
#[derive(Debug, Clone)]
pub struct HuobiAccountCodec {
    host: String,
    path: String,
}

impl HuobiAccountCodec {
    /// # Arguments
    /// * `host` - host part of the socket URL, part of the signed string
    /// * `path` - path part of the socket URL, e.g. `/ws/v2`
    pub fn new(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            path: path.into(),
        }
    }
}

impl WsCodec for HuobiAccountCodec {
    fn encode_subscription(&self, subscription: &Subscription) -> Result<Message, ExchangeError> {
        let frame = json!({ "action": "sub", "ch": subscription.channel_id });
        Ok(Message::Text(frame.to_string()))
    }

    fn encode_unsubscription(
        &self,
        subscription: &Subscription,
    ) -> Result<Message, ExchangeError> {
        let frame = json!({ "action": "unsub", "ch": subscription.channel_id });
        Ok(Message::Text(frame.to_string()))
    }

    fn encode_auth(
        &self,
        credentials: &Credentials,
        timestamp: u64,
    ) -> Result<Option<Message>, ExchangeError> {
        if !credentials.is_complete() {
            return Err(ExchangeError::AuthError(
                "API key and secret are required to log in".to_string(),
            ));
        }

        let timestamp = utc_timestamp(timestamp)?;
        let mut params = vec![
            ("accessKey".to_string(), credentials.api_key().to_string()),
            ("signatureMethod".to_string(), "HmacSHA256".to_string()),
            ("signatureVersion".to_string(), "2.1".to_string()),
            ("timestamp".to_string(), timestamp.clone()),
        ];
        let signature = canonical_signature(
            credentials.secret_key(),
            "GET",
            &self.host,
            &self.path,
            &mut params,
        )?;

        let frame = json!({
            "action": "req",
            "ch": "auth",
            "params": {
                "authType": "api",
                "accessKey": credentials.api_key(),
                "signatureMethod": "HmacSHA256",
                "signatureVersion": "2.1",
                "timestamp": timestamp,
                "signature": signature,
            }
        });
        Ok(Some(Message::Text(frame.to_string())))
    }

    fn decode_message(&self, message: Message) -> Result<Option<InboundMessage>, ExchangeError> {
        let Some(text) = frame_text(message)? else {
            return Ok(None);
        };
        let value = parse_text(&text)?;
        let code = value.get("code").and_then(Value::as_i64);
        let reason = || {
            str_field(&value, "message")
                .map(str::to_string)
                .or_else(|| code.map(|c| format!("code {}", c)))
        };

        match str_field(&value, "action") {
            Some("ping") => {
                let ts = value.pointer("/data/ts").cloned().unwrap_or(Value::Null);
                Ok(Some(InboundMessage::Heartbeat {
                    reply: Message::Text(
                        json!({ "action": "pong", "data": { "ts": ts } }).to_string(),
                    ),
                }))
            }
            Some("req") if str_field(&value, "ch") == Some("auth") => {
                let success = code == Some(200);
                Ok(Some(InboundMessage::AuthAck {
                    success,
                    reason: if success { None } else { reason() },
                }))
            }
            Some("sub") => {
                let channel = str_field(&value, "ch").ok_or_else(|| {
                    ExchangeError::DeserializationError(format!("Sub ack without channel: {}", text))
                })?;
                let success = code == Some(200);
                Ok(Some(InboundMessage::SubAck {
                    channel_id: channel.to_string(),
                    success,
                    reason: if success { None } else { reason() },
                }))
            }
            Some("push") => {
                let channel = str_field(&value, "ch").ok_or_else(|| {
                    ExchangeError::DeserializationError(format!("Push without channel: {}", text))
                })?;
                Ok(Some(InboundMessage::Data {
                    channel_id: channel.to_string(),
                    payload: value.get("data").cloned().unwrap_or(Value::Null),
                }))
            }
            Some("unsub" | "req") => Ok(None),
            _ => Err(ExchangeError::DeserializationError(format!(
                "Unrecognized account frame: {}",
                text
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;

    fn gzip(text: &str) -> Message {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(text.as_bytes()).unwrap();
        Message::Binary(encoder.finish().unwrap())
    }

    #[test]
    fn test_market_ping_gets_matching_pong() {
        let decoded = HuobiMarketCodec
            .decode_message(gzip(r#"{"ping":1492420473027}"#))
            .unwrap();
        let Some(InboundMessage::Heartbeat { reply }) = decoded else {
            panic!("expected heartbeat, got {:?}", decoded);
        };
        let Message::Text(reply) = reply else {
            panic!("expected text reply");
        };
        let reply: Value = serde_json::from_str(&reply).unwrap();
        assert_eq!(reply, json!({"pong": 1_492_420_473_027_u64}));
    }

    #[test]
    fn test_market_subscribe_frame() {
        let frame = HuobiMarketCodec
            .encode_subscription(&Subscription::market_data("market.btcusdt.kline.1min"))
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["sub"], "market.btcusdt.kline.1min");
    }

    #[test]
    fn test_market_ack_error_and_data() {
        let ack = HuobiMarketCodec
            .decode_message(gzip(
                r#"{"id":"market.btcusdt.kline.1min","status":"ok","subbed":"market.btcusdt.kline.1min","ts":1489474081631}"#,
            ))
            .unwrap();
        assert_eq!(
            ack,
            Some(InboundMessage::SubAck {
                channel_id: "market.btcusdt.kline.1min".to_string(),
                success: true,
                reason: None,
            })
        );

        let rejected = HuobiMarketCodec
            .decode_message(gzip(
                r#"{"id":"market.nope.kline.1min","status":"error","err-code":"bad-request","err-msg":"invalid topic market.nope.kline.1min","ts":1}"#,
            ))
            .unwrap();
        assert!(matches!(
            rejected,
            Some(InboundMessage::SubAck { success: false, ref channel_id, .. }) if channel_id == "market.nope.kline.1min"
        ));

        let data = HuobiMarketCodec
            .decode_message(gzip(
                r#"{"ch":"market.btcusdt.detail","ts":1630000000000,"tick":{"close":47000.5,"vol":1.0}}"#,
            ))
            .unwrap();
        assert_eq!(
            data,
            Some(InboundMessage::Data {
                channel_id: "market.btcusdt.detail".to_string(),
                payload: json!({"close": 47000.5, "vol": 1.0}),
            })
        );
    }

    #[test]
    fn test_market_garbage_is_error() {
        assert!(HuobiMarketCodec
            .decode_message(Message::Binary(vec![1, 2, 3]))
            .is_err());
        assert!(HuobiMarketCodec
            .decode_message(gzip(r#"{"unexpected":true}"#))
            .is_err());
    }

    #[test]
    fn test_account_auth_frame_signature() {
        let codec = HuobiAccountCodec::new("api.huobi.pro", "/ws/v2");
        let frame = codec
            .encode_auth(&Credentials::new("test_key", "test_secret"), 1_704_067_200_000)
            .unwrap()
            .unwrap();
        let Message::Text(text) = frame else {
            panic!("expected text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["action"], "req");
        assert_eq!(value["ch"], "auth");
        assert_eq!(value["params"]["authType"], "api");
        assert_eq!(value["params"]["timestamp"], "2024-01-01T00:00:00");
        assert_eq!(
            value["params"]["signature"],
            "YuFkA7vEte4B4ccdIc9QwcC8g4zTVrlIOtI9sbJvo2E="
        );
    }

    #[test]
    fn test_account_auth_requires_credentials() {
        let codec = HuobiAccountCodec::new("api.huobi.pro", "/ws/v2");
        assert!(codec.encode_auth(&Credentials::new("", ""), 0).is_err());
    }

    #[test]
    fn test_account_frames() {
        let codec = HuobiAccountCodec::new("api.huobi.pro", "/ws/v2");

        let ping = codec
            .decode_message(Message::Text(
                r#"{"action":"ping","data":{"ts":1575537778295}}"#.to_string(),
            ))
            .unwrap();
        assert_eq!(
            ping,
            Some(InboundMessage::Heartbeat {
                reply: Message::Text(r#"{"action":"pong","data":{"ts":1575537778295}}"#.to_string())
            })
        );

        let auth = codec
            .decode_message(Message::Text(
                r#"{"action":"req","code":200,"ch":"auth","data":{}}"#.to_string(),
            ))
            .unwrap();
        assert_eq!(
            auth,
            Some(InboundMessage::AuthAck {
                success: true,
                reason: None
            })
        );

        let denied = codec
            .decode_message(Message::Text(
                r#"{"action":"req","code":2002,"ch":"auth","message":"invalid.auth.state"}"#
                    .to_string(),
            ))
            .unwrap();
        assert_eq!(
            denied,
            Some(InboundMessage::AuthAck {
                success: false,
                reason: Some("invalid.auth.state".to_string())
            })
        );

        let push = codec
            .decode_message(Message::Text(
                r#"{"action":"push","ch":"orders#btcusdt","data":{"orderId":1}}"#.to_string(),
            ))
            .unwrap();
        assert_eq!(
            push,
            Some(InboundMessage::Data {
                channel_id: "orders#btcusdt".to_string(),
                payload: json!({"orderId": 1}),
            })
        );
    }

    #[test]
    fn test_wildcard_order_push_reaches_handler() {
        use crate::core::kernel::router::{MessageRouter, RouteOutcome};
        use crate::exchanges::huobi::channels;
        use parking_lot::Mutex;
        use std::sync::Arc;

        let codec = HuobiAccountCodec::new("api.huobi.pro", "/ws/v2");
        let router = MessageRouter::new();
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        router.register(
            &channels::orders("*").channel_id,
            Arc::new(move |channel: &str, payload: Value| {
                sink.lock().push((channel.to_string(), payload));
            }),
        );

        let push = codec
            .decode_message(Message::Text(
                r#"{"action":"push","ch":"orders#btcusdt","data":{"orderId":7,"eventType":"trigger"}}"#
                    .to_string(),
            ))
            .unwrap()
            .unwrap();
        assert_eq!(router.dispatch("account", push), RouteOutcome::Delivered);

        let clearing = codec
            .decode_message(Message::Text(
                r#"{"action":"push","ch":"trade.clearing#ethusdt#0","data":{"tradeId":3}}"#
                    .to_string(),
            ))
            .unwrap()
            .unwrap();
        assert_eq!(router.dispatch("account", clearing), RouteOutcome::Unmatched);

        let received = received.lock();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0, "orders#btcusdt");
        assert_eq!(received[0].1["orderId"], 7);
    }
}
