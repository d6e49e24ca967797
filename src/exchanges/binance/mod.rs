pub mod builder;
pub mod channels;
pub mod codec;
pub mod rest;

// Re-export main types for easier importing
pub use builder::{build_connector, build_rest, socket_specs};
pub use codec::BinanceCodec;
pub use rest::{endpoints, parse_api_error, BinanceRestClient, ServerTime};

pub const REST_URL: &str = "https://api.binance.com";
pub const STREAM_URL: &str = "wss://stream.binance.com:9443/stream";
pub const TESTNET_REST_URL: &str = "https://testnet.binance.vision";
pub const TESTNET_STREAM_URL: &str = "wss://testnet.binance.vision/stream";
