pub mod core;
pub mod exchanges;
pub mod utils;

pub use crate::core::{
    config::{Credentials, ExchangeConfig},
    connector::{ConnectorBuilder, ConnectorHandle},
    errors::{ErrorKind, ExchangeError},
    traits::ExchangeConnector,
    types::*,
};
pub use crate::utils::exchange_factory::{ExchangeFactory, ExchangeType};
