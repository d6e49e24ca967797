use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{Endpoint, HttpMethod, RequestParams};
use serde::Deserialize;
use serde_json::Value;

/// Endpoint catalog for the Binance spot REST API
pub mod endpoints {
    use super::{Endpoint, HttpMethod};

    pub const PING: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v3/ping");
    pub const SERVER_TIME: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v3/time");
    pub const EXCHANGE_INFO: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v3/exchangeInfo");
    pub const DEPTH: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v3/depth");
    pub const RECENT_TRADES: Endpoint = Endpoint::public(HttpMethod::Get, "/api/v3/trades");
    pub const SYSTEM_STATUS: Endpoint =
        Endpoint::signed(HttpMethod::Get, "/wapi/v3/systemStatus.html");
    pub const COIN_CONFIG: Endpoint =
        Endpoint::public(HttpMethod::Get, "/sapi/v1/capital/config/getall");
    pub const ACCOUNT_SNAPSHOT: Endpoint =
        Endpoint::signed(HttpMethod::Get, "/sapi/v1/accountSnapshot");
    pub const DISABLE_FAST_WITHDRAW: Endpoint = Endpoint::signed(
        HttpMethod::Post,
        "/sapi/v1/account/disableFastWithdrawSwitch",
    );
}

/// Order book depths the API accepts
pub const DEPTH_LIMITS: [u32; 8] = [5, 10, 20, 50, 100, 500, 1000, 5000];

/// Binance rejects with `{"code":<negative>,"msg":..}`. Successful `sapi` bodies may
/// carry a positive `code` (accountSnapshot returns 200), so only negatives count.
pub fn parse_api_error(body: &Value) -> Option<ExchangeError> {
    let code = body.get("code").and_then(Value::as_i64)?;
    if code >= 0 {
        return None;
    }
    Some(ExchangeError::ApiError {
        code: code.to_string(),
        message: body
            .get("msg")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerTime {
    pub server_time: u64,
}

/// Thin typed wrapper around `RestClient` for the Binance API
pub struct BinanceRestClient<R: RestClient> {
    client: R,
}

impl<R: RestClient> BinanceRestClient<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    /// Test connectivity
    pub async fn ping(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::PING, &RequestParams::new())
            .await
    }

    pub async fn server_time(&self) -> Result<ServerTime, ExchangeError> {
        let endpoint = endpoints::SERVER_TIME;
        self.client
            .call_json(endpoint.method, endpoint.path, &RequestParams::new(), false)
            .await
    }

    /// Trading rules and symbol information
    pub async fn exchange_info(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::EXCHANGE_INFO, &RequestParams::new())
            .await
    }

    /// Order book; `limit` must be one of [`DEPTH_LIMITS`]
    pub async fn depth(&self, symbol: &str, limit: u32) -> Result<Value, ExchangeError> {
        if !DEPTH_LIMITS.contains(&limit) {
            return Err(ExchangeError::InvalidParameters(format!(
                "Depth limit {} not in {:?}",
                limit, DEPTH_LIMITS
            )));
        }
        let params = RequestParams::new()
            .with("symbol", symbol)
            .with("limit", limit);
        self.client.call_endpoint(&endpoints::DEPTH, &params).await
    }

    pub async fn recent_trades(&self, symbol: &str, limit: Option<u32>) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("symbol", symbol)
            .with_opt("limit", limit);
        self.client
            .call_endpoint(&endpoints::RECENT_TRADES, &params)
            .await
    }

    pub async fn system_status(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::SYSTEM_STATUS, &RequestParams::new())
            .await
    }

    /// Deposit and withdrawal configuration of every coin
    pub async fn coin_config(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::COIN_CONFIG, &RequestParams::new())
            .await
    }

    /// Daily account snapshot; `account_type` is SPOT, MARGIN or FUTURES
    pub async fn account_snapshot(
        &self,
        account_type: &str,
        limit: Option<u32>,
    ) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("type", account_type)
            .with_opt("limit", limit);
        self.client
            .call_endpoint(&endpoints::ACCOUNT_SNAPSHOT, &params)
            .await
    }

    pub async fn disable_fast_withdraw_switch(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::DISABLE_FAST_WITHDRAW, &RequestParams::new())
            .await
    }
}
