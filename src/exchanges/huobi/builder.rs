use crate::core::config::ExchangeConfig;
use crate::core::connector::{ConnectorBuilder, ConnectorHandle};
use crate::core::errors::ExchangeError;
use crate::core::kernel::{
    HmacExchangeType, HmacSigner, ReqwestRest, RestClientBuilder, RestClientConfig, SocketSpec,
    WsConfig,
};
use crate::exchanges::huobi::{
    channels, parse_api_error, HuobiAccountCodec, HuobiMarketCodec, ACCOUNT_WS_URL, MARKET_WS_URL,
    MBP_WS_URL, REST_URL,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use url::Url;

/// Socket layout of a Huobi connector: `market` for public channels, `mbp` for MBP
/// depth and `account` (authenticated) for orders, clearing and balances.
pub fn socket_specs() -> Result<Vec<SocketSpec>, ExchangeError> {
    let account_url = Url::parse(ACCOUNT_WS_URL)
        .map_err(|e| ExchangeError::ConfigurationError(format!("Bad account URL: {}", e)))?;
    let host = account_url.host_str().unwrap_or_default().to_string();
    let account_codec = HuobiAccountCodec::new(host, account_url.path());

    // the server pings every 5s on market sockets and every 20s on v2
    let market_config = WsConfig::default().with_heartbeat_timeout(Duration::from_secs(30));
    let account_config = WsConfig::default().with_heartbeat_timeout(Duration::from_secs(60));

    Ok(vec![
        SocketSpec::new("market", MARKET_WS_URL, Arc::new(HuobiMarketCodec))
            .accepting(channels::is_market)
            .with_config(market_config.clone()),
        SocketSpec::new("mbp", MBP_WS_URL, Arc::new(HuobiMarketCodec))
            .accepting(channels::is_mbp)
            .with_config(market_config),
        SocketSpec::new("account", ACCOUNT_WS_URL, Arc::new(account_codec))
            .with_auth(true)
            .accepting(channels::is_account)
            .with_config(account_config),
    ])
}

/// REST dispatcher for Huobi, signing when the config carries credentials
pub fn build_rest(config: &ExchangeConfig) -> Result<ReqwestRest, ExchangeError> {
    if config.testnet {
        return Err(ExchangeError::ConfigurationError(
            "Huobi has no public spot testnet".to_string(),
        ));
    }

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| REST_URL.to_string());
    let rest_config = RestClientConfig::new(base_url, "huobi".to_string())
        .with_timeout(config.rest_timeout_seconds);

    let mut rest_builder = RestClientBuilder::new(rest_config).with_error_parser(parse_api_error);

    if let Some(credentials) = config.credentials() {
        let signer = Arc::new(HmacSigner::new(credentials, HmacExchangeType::Huobi));
        rest_builder = rest_builder.with_signer(signer);
    }

    rest_builder.build()
}

/// Create a Huobi connector and start its sockets. Must run inside a tokio runtime.
pub fn build_connector(config: ExchangeConfig) -> Result<ConnectorHandle, ExchangeError> {
    let rest = build_rest(&config)?;
    let mut builder =
        ConnectorBuilder::new("huobi", rest).with_credentials(config.credentials());
    for spec in socket_specs()? {
        builder = builder.socket(spec);
    }

    info!(authenticated = config.has_credentials(), "Building huobi connector");
    Ok(builder.start())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    #[test]
    fn test_account_socket_requires_auth() {
        let specs = socket_specs().unwrap();
        let names: Vec<&str> = specs.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["market", "mbp", "account"]);
        assert!(!specs[0].requires_auth);
        assert!(specs[2].requires_auth);
        assert!((specs[1].accepts)(&channels::mbp("btcusdt", 150)));
        assert!(!(specs[0].accepts)(&channels::mbp("btcusdt", 150)));
    }

    #[test]
    fn test_testnet_is_rejected() {
        let err = build_rest(&ExchangeConfig::read_only().testnet(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Config);
    }

    #[test]
    fn test_base_url_override() {
        let config = ExchangeConfig::read_only().base_url("https://api-aws.huobi.pro/".to_string());
        let rest = build_rest(&config).unwrap();
        assert_eq!(rest.config().base_url, "https://api-aws.huobi.pro");
    }
}
