use crate::core::{
    errors::ExchangeError,
    kernel::router::DataHandler,
    types::{Endpoint, RequestParams, Subscription},
};
use async_trait::async_trait;
use serde_json::Value;

/// Caller-facing operations of a connected exchange
#[async_trait]
pub trait ExchangeConnector: Send + Sync {
    fn exchange_name(&self) -> &str;

    /// Execute one catalog endpoint. Never retried.
    async fn rest_call(
        &self,
        endpoint: &Endpoint,
        params: &RequestParams,
    ) -> Result<Value, ExchangeError>;

    /// Register a channel and the handler for its data frames.
    ///
    /// Returns `Ok(false)` if the channel was already subscribed; the new handler
    /// replaces the old one in that case.
    fn subscribe(
        &self,
        subscription: Subscription,
        handler: DataHandler,
    ) -> Result<bool, ExchangeError>;

    /// Drop a channel. Returns `false` if it was not subscribed.
    fn unsubscribe(&self, channel_id: &str) -> bool;

    /// Stop every socket and wait until all of them are `Closed`
    async fn close(&mut self);
}
