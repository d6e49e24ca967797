/// `exwire` Kernel - exchange-agnostic transport and session layer
///
/// The kernel contains only transport logic and generic interfaces; everything
/// exchange-specific (endpoint paths, frame shapes, error envelopes) is plugged in
/// from `crate::exchanges`.
///
/// # Architecture
///
/// ## Transport Layer
/// - `RestClient`: unified HTTP dispatcher interface, implemented by `ReqwestRest`
/// - `WsSession`: raw WebSocket transport, implemented by `TungsteniteWs`
///
/// ## Authentication
/// - `Signer`: pluggable request signing
/// - `HmacSigner`: HMAC-SHA256 in the query-signed (Binance) and canonical-string
///   (Huobi) wire formats
///
/// ## Streaming
/// - `SubscriptionRegistry`: desired channels, replayed after every reconnect
/// - `WsCodec`: exchange-specific frame encoding/classification
/// - `MessageRouter`: heartbeat replies, ack bookkeeping and per-channel data dispatch
/// - `Backoff`: reconnect delays with a stability reset
/// - `spawn_socket`: the connect → authenticate → subscribe → stream → reconnect
///   state machine, one tokio task per socket
///
/// # Example
///
/// ```rust,no_run
/// use exwire::core::kernel::*;
/// use exwire::core::config::Credentials;
/// use exwire::core::types::RequestParams;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let rest_config = RestClientConfig::new(
///     "https://api.huobi.pro".to_string(),
///     "huobi".to_string(),
/// );
/// let signer = Arc::new(HmacSigner::new(
///     Credentials::new("api_key", "secret_key"),
///     HmacExchangeType::Huobi,
/// ));
/// let rest = RestClientBuilder::new(rest_config)
///     .with_signer(signer)
///     .build()?;
///
/// let accounts = rest
///     .get("/v1/account/accounts", &RequestParams::new(), true)
///     .await?;
/// println!("{}", accounts);
/// # Ok(())
/// # }
/// ```
pub mod codec;
pub mod reconnect;
pub mod registry;
pub mod rest;
pub mod router;
pub mod session;
pub mod signer;
pub mod ws;

// Re-export key types for convenience
pub use codec::WsCodec;
pub use reconnect::{Backoff, ReconnectConfig};
pub use registry::SubscriptionRegistry;
pub use rest::{ApiErrorParser, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig};
pub use router::{DataHandler, MessageRouter, RouteOutcome, SessionEvent, StatusCallback};
pub use session::{
    spawn_socket, SessionCommand, SessionContext, SocketHandle, SocketSpec, SubscriptionFilter,
};
pub use signer::{
    HmacExchangeType, HmacSigner, SignatureResult, SignedRequest, Signer, SigningContext,
};
pub use ws::{ConnectionStats, TungsteniteWs, WsConfig, WsSession};
