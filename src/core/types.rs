use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use tokio_tungstenite::tungstenite::Message;

/// HTTP verbs used by the endpoint catalogs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Delete => "DELETE",
        }
    }

    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One logical REST operation as supplied by an exchange's endpoint catalog.
///
/// `path` is either relative to the exchange base URL or an absolute `https://` URL;
/// absolute URLs are only valid for unsigned endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub method: HttpMethod,
    pub path: &'static str,
    pub signed: bool,
}

impl Endpoint {
    pub const fn public(method: HttpMethod, path: &'static str) -> Self {
        Self {
            method,
            path,
            signed: false,
        }
    }

    pub const fn signed(method: HttpMethod, path: &'static str) -> Self {
        Self {
            method,
            path,
            signed: true,
        }
    }

    pub fn is_absolute(&self) -> bool {
        is_absolute_url(self.path)
    }
}

pub(crate) fn is_absolute_url(path: &str) -> bool {
    path.starts_with("https://") || path.starts_with("http://")
}

/// Ordered logical parameters for a REST call.
///
/// Insertion order is preserved. `Null` and empty-string values are kept here but
/// never reach the wire: [`RequestParams::compact`] drops them before anything is
/// signed or sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParams {
    entries: Vec<(String, Value)>,
}

impl RequestParams {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_opt<V: Into<Value>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.insert(key, value.map_or(Value::Null, Into::into));
        self
    }

    /// Insert or replace a value, keeping the key's first position on replace.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        let key = key.into();
        let value = value.into();
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl DoubleEndedIterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Wire-ready pairs in insertion order with empty values removed.
    pub fn compact(&self) -> Vec<(String, String)> {
        self.entries
            .iter()
            .filter_map(|(k, v)| param_to_string(v).map(|s| (k.clone(), s)))
            .collect()
    }

    /// JSON object of the non-empty values, used as a request body.
    pub fn to_json_body(&self) -> Value {
        let map: Map<String, Value> = self
            .entries
            .iter()
            .filter(|(_, v)| !is_empty_param(v))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Value::Object(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for RequestParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (k, v) in iter {
            params.insert(k, v);
        }
        params
    }
}

fn is_empty_param(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

fn param_to_string(value: &Value) -> Option<String> {
    if is_empty_param(value) {
        return None;
    }
    Some(match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    })
}

/// What a subscription streams; decides which socket carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionKind {
    MarketData,
    Account,
    Order,
}

/// A desired stream, identified by its exchange channel id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub channel_id: String,
    pub kind: SubscriptionKind,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Subscription {
    pub fn new(channel_id: impl Into<String>, kind: SubscriptionKind) -> Self {
        Self {
            channel_id: channel_id.into(),
            kind,
            params: Map::new(),
        }
    }

    pub fn market_data(channel_id: impl Into<String>) -> Self {
        Self::new(channel_id, SubscriptionKind::MarketData)
    }

    pub fn account(channel_id: impl Into<String>) -> Self {
        Self::new(channel_id, SubscriptionKind::Account)
    }

    pub fn order(channel_id: impl Into<String>) -> Self {
        Self::new(channel_id, SubscriptionKind::Order)
    }

    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }
}

/// Lifecycle of one physical socket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Authenticating,
    Subscribing,
    Active,
    Reconnecting,
    Closed,
}

impl ConnectionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Authenticating => "authenticating",
            Self::Subscribing => "subscribing",
            Self::Active => "active",
            Self::Reconnecting => "reconnecting",
            Self::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// A classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Liveness probe; `reply` is the frame that must go straight back.
    Heartbeat { reply: Message },
    AuthAck {
        success: bool,
        reason: Option<String>,
    },
    SubAck {
        channel_id: String,
        success: bool,
        reason: Option<String>,
    },
    Data {
        channel_id: String,
        payload: Value,
    },
}

/// Observed outcome of the latest subscribe frame sent for a channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubAckStatus {
    Pending,
    Confirmed,
    Rejected(String),
}
