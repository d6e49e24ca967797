pub mod builder;
pub mod channels;
pub mod codec;
pub mod rest;

pub use builder::{build_connector, build_rest, socket_specs};
pub use codec::{HuobiAccountCodec, HuobiMarketCodec};
pub use rest::{endpoints, parse_api_error, HuobiRestClient, TransferRequest};

pub const REST_URL: &str = "https://api.huobi.pro";
pub const MARKET_WS_URL: &str = "wss://api.huobi.pro/ws";
pub const MBP_WS_URL: &str = "wss://api.huobi.pro/feed";
pub const ACCOUNT_WS_URL: &str = "wss://api.huobi.pro/ws/v2";
