use crate::core::config::ExchangeConfig;
use crate::core::connector::{ConnectorBuilder, ConnectorHandle};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    HmacExchangeType, HmacSigner, ReqwestRest, RestClientBuilder, RestClientConfig, SocketSpec,
    WsConfig,
};
use crate::exchanges::binance::{
    parse_api_error, BinanceCodec, REST_URL, STREAM_URL, TESTNET_REST_URL, TESTNET_STREAM_URL,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// The single combined-stream socket. The server pings every 3 minutes and drops
/// clients silent for 10, so liveness waits slightly longer than that.
pub fn socket_specs(config: &ExchangeConfig) -> Vec<SocketSpec> {
    let url = if config.testnet {
        TESTNET_STREAM_URL
    } else {
        STREAM_URL
    };
    let ws_config = WsConfig::default().with_heartbeat_timeout(Duration::from_secs(600));

    vec![SocketSpec::new("market", url, Arc::new(BinanceCodec::new())).with_config(ws_config)]
}

/// REST dispatcher for Binance, signing when the config carries credentials
pub fn build_rest(config: &ExchangeConfig) -> Result<ReqwestRest, ExchangeError> {
    let base_url = if config.testnet {
        TESTNET_REST_URL.to_string()
    } else {
        config
            .base_url
            .clone()
            .unwrap_or_else(|| REST_URL.to_string())
    };

    let rest_config = RestClientConfig::new(base_url, "binance".to_string())
        .with_timeout(config.rest_timeout_seconds);

    let mut rest_builder = RestClientBuilder::new(rest_config).with_error_parser(parse_api_error);

    // Add authentication if credentials are provided
    if let Some(credentials) = config.credentials() {
        let signer = Arc::new(HmacSigner::new(credentials, HmacExchangeType::Binance));
        rest_builder = rest_builder.with_signer(signer);
    }

    rest_builder.build()
}

/// Create a Binance connector and start its socket. Must run inside a tokio runtime.
pub fn build_connector(config: ExchangeConfig) -> Result<ConnectorHandle, ExchangeError> {
    let rest = build_rest(&config)?;
    let mut builder =
        ConnectorBuilder::new("binance", rest).with_credentials(config.credentials());
    for spec in socket_specs(&config) {
        builder = builder.socket(spec);
    }

    info!(testnet = config.testnet, "Building binance connector");
    Ok(builder.start())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_testnet_urls() {
        let config = ExchangeConfig::read_only().testnet(true);
        let rest = build_rest(&config).unwrap();
        assert_eq!(rest.config().base_url, TESTNET_REST_URL);

        let specs = socket_specs(&config);
        assert_eq!(specs.len(), 1);
        assert_eq!(specs[0].url, TESTNET_STREAM_URL);
        assert!(!specs[0].requires_auth);
    }

    #[test]
    fn test_mainnet_defaults() {
        let config = ExchangeConfig::read_only();
        assert_eq!(build_rest(&config).unwrap().config().base_url, REST_URL);
        assert_eq!(socket_specs(&config)[0].url, STREAM_URL);
    }
}
