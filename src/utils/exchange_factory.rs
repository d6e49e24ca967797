use crate::core::config::ExchangeConfig;
use crate::core::connector::ConnectorHandle;
use crate::core::errors::ExchangeError;
use crate::exchanges::{binance, huobi};
use std::str::FromStr;

/// Supported exchange types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExchangeType {
    Binance,
    Huobi,
}

impl ExchangeType {
    pub const ALL: [Self; 2] = [Self::Binance, Self::Huobi];

    /// Prefix of the environment variables holding this exchange's credentials
    pub fn env_prefix(&self) -> &'static str {
        match self {
            Self::Binance => "BINANCE",
            Self::Huobi => "HUOBI",
        }
    }
}

impl std::fmt::Display for ExchangeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Binance => write!(f, "Binance"),
            Self::Huobi => write!(f, "Huobi"),
        }
    }
}

impl FromStr for ExchangeType {
    type Err = ExchangeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "binance" => Ok(Self::Binance),
            "huobi" | "htx" => Ok(Self::Huobi),
            other => Err(ExchangeError::ConfigurationError(format!(
                "Unknown exchange '{}'",
                other
            ))),
        }
    }
}

/// Factory for creating exchange connectors
pub struct ExchangeFactory;

impl ExchangeFactory {
    /// Build and start a connector. `None` connects read-only: public REST and public
    /// channels only.
    pub fn connect(
        exchange_type: ExchangeType,
        config: Option<ExchangeConfig>,
    ) -> Result<ConnectorHandle, ExchangeError> {
        let cfg = config.unwrap_or_else(ExchangeConfig::read_only);
        match exchange_type {
            ExchangeType::Binance => binance::build_connector(cfg),
            ExchangeType::Huobi => huobi::build_connector(cfg),
        }
    }

    /// Like [`ExchangeFactory::connect`], with credentials read from the environment
    /// (and a `.env` file when the `env-file` feature is on). Falls back to read-only
    /// when no credentials are set.
    pub fn connect_from_env(exchange_type: ExchangeType) -> Result<ConnectorHandle, ExchangeError> {
        #[cfg(feature = "env-file")]
        let loaded = ExchangeConfig::from_env_file(exchange_type.env_prefix());
        #[cfg(not(feature = "env-file"))]
        let loaded = ExchangeConfig::from_env(exchange_type.env_prefix());

        let config = match loaded {
            Ok(config) => Some(config),
            Err(crate::core::config::ConfigError::MissingEnvironmentVariable(var)) => {
                tracing::debug!(%var, exchange = %exchange_type, "No credentials, connecting read-only");
                None
            }
            Err(e) => return Err(e.into()),
        };
        Self::connect(exchange_type, config)
    }
}
