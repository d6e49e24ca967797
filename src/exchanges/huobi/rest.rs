use crate::core::errors::ExchangeError;
use crate::core::kernel::RestClient;
use crate::core::types::{Endpoint, HttpMethod, RequestParams};
use serde_json::Value;

/// Endpoint catalog for the Huobi spot REST API
pub mod endpoints {
    use super::{Endpoint, HttpMethod};

    pub const SYSTEM_STATUS: Endpoint = Endpoint::public(
        HttpMethod::Get,
        "https://status.huobigroup.com/api/v2/summary.json",
    );
    pub const MARKET_STATUS: Endpoint = Endpoint::public(HttpMethod::Get, "/v2/market-status");
    pub const SYMBOLS: Endpoint = Endpoint::public(HttpMethod::Get, "/v1/common/symbols");
    pub const CURRENCIES: Endpoint = Endpoint::public(HttpMethod::Get, "/v1/common/currencys");
    pub const REFERENCE_CURRENCIES: Endpoint =
        Endpoint::public(HttpMethod::Get, "/v2/reference/currencies");
    pub const TIMESTAMP: Endpoint = Endpoint::public(HttpMethod::Get, "/v1/common/timestamp");
    pub const KLINES: Endpoint = Endpoint::public(HttpMethod::Get, "/market/history/kline");
    pub const MERGED_TICKER: Endpoint = Endpoint::public(HttpMethod::Get, "/market/detail/merged");
    pub const TICKERS: Endpoint = Endpoint::public(HttpMethod::Get, "/market/tickers");
    pub const DEPTH: Endpoint = Endpoint::public(HttpMethod::Get, "/market/depth");
    pub const LAST_TRADE: Endpoint = Endpoint::public(HttpMethod::Get, "/market/trade");
    pub const TRADE_HISTORY: Endpoint = Endpoint::public(HttpMethod::Get, "/market/history/trade");
    pub const DETAIL_24H: Endpoint = Endpoint::public(HttpMethod::Get, "/market/detail");
    pub const ETP: Endpoint = Endpoint::public(HttpMethod::Get, "/market/etp");
    pub const ACCOUNTS: Endpoint = Endpoint::signed(HttpMethod::Get, "/v1/account/accounts");
    pub const ASSET_VALUATION: Endpoint =
        Endpoint::signed(HttpMethod::Get, "/v2/account/asset-valuation");
    pub const TRANSFER: Endpoint = Endpoint::signed(HttpMethod::Post, "/v1/account/transfer");
}

/// Balance path for one account id
pub fn balance_path(account_id: u64) -> String {
    format!("/v1/account/accounts/{}/balance", account_id)
}

/// Huobi reports rejections inside the body, usually with HTTP 200.
///
/// v1 endpoints use `{"status":"error","err-code":..,"err-msg":..}`, v2 endpoints use
/// `{"code":<not 200>,"message":..}`.
pub fn parse_api_error(body: &Value) -> Option<ExchangeError> {
    if body.get("status").and_then(Value::as_str) == Some("error") {
        return Some(ExchangeError::ApiError {
            code: body
                .get("err-code")
                .and_then(Value::as_str)
                .unwrap_or("unknown")
                .to_string(),
            message: body
                .get("err-msg")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        });
    }

    match body.get("code").and_then(Value::as_i64) {
        Some(code) if code != 200 => Some(ExchangeError::ApiError {
            code: code.to_string(),
            message: body
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
        }),
        _ => None,
    }
}

/// Thin typed wrapper around `RestClient` for the Huobi API
pub struct HuobiRestClient<R: RestClient> {
    client: R,
}

impl<R: RestClient> HuobiRestClient<R> {
    pub fn new(client: R) -> Self {
        Self { client }
    }

    pub async fn system_status(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::SYSTEM_STATUS, &RequestParams::new())
            .await
    }

    pub async fn market_status(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::MARKET_STATUS, &RequestParams::new())
            .await
    }

    pub async fn symbols(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::SYMBOLS, &RequestParams::new())
            .await
    }

    pub async fn currencies(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::CURRENCIES, &RequestParams::new())
            .await
    }

    pub async fn reference_currencies(
        &self,
        currency: Option<&str>,
        authorized_user: bool,
    ) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with_opt("currency", currency)
            .with("authorizedUser", authorized_user);
        self.client
            .call_endpoint(&endpoints::REFERENCE_CURRENCIES, &params)
            .await
    }

    pub async fn timestamp(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::TIMESTAMP, &RequestParams::new())
            .await
    }

    /// Candles; `period` is one of 1min, 5min, 15min, 30min, 60min, 4hour, 1day, 1mon,
    /// 1week, 1year
    pub async fn klines(&self, symbol: &str, period: &str, size: u32) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("symbol", symbol)
            .with("period", period)
            .with("size", size);
        self.client.call_endpoint(&endpoints::KLINES, &params).await
    }

    pub async fn ticker(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = RequestParams::new().with("symbol", symbol);
        self.client
            .call_endpoint(&endpoints::MERGED_TICKER, &params)
            .await
    }

    pub async fn tickers(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::TICKERS, &RequestParams::new())
            .await
    }

    pub async fn depth(&self, symbol: &str, depth: u32, step: &str) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("symbol", symbol)
            .with("depth", depth)
            .with("type", step);
        self.client.call_endpoint(&endpoints::DEPTH, &params).await
    }

    pub async fn last_trade(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = RequestParams::new().with("symbol", symbol);
        self.client
            .call_endpoint(&endpoints::LAST_TRADE, &params)
            .await
    }

    pub async fn trades(&self, symbol: &str, size: u32) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("symbol", symbol)
            .with("size", size);
        self.client
            .call_endpoint(&endpoints::TRADE_HISTORY, &params)
            .await
    }

    pub async fn detail_24h(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = RequestParams::new().with("symbol", symbol);
        self.client
            .call_endpoint(&endpoints::DETAIL_24H, &params)
            .await
    }

    pub async fn etp(&self, symbol: &str) -> Result<Value, ExchangeError> {
        let params = RequestParams::new().with("symbol", symbol);
        self.client.call_endpoint(&endpoints::ETP, &params).await
    }

    pub async fn accounts(&self) -> Result<Value, ExchangeError> {
        self.client
            .call_endpoint(&endpoints::ACCOUNTS, &RequestParams::new())
            .await
    }

    pub async fn balance(&self, account_id: u64) -> Result<Value, ExchangeError> {
        self.client
            .call(
                HttpMethod::Get,
                &balance_path(account_id),
                &RequestParams::new(),
                true,
            )
            .await
    }

    /// Asset valuation; `account_type` is spot, margin, otc or super-margin
    pub async fn asset_valuation(
        &self,
        account_type: &str,
        valuation_currency: &str,
        sub_uid: Option<u64>,
    ) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("accountType", account_type)
            .with("valuationCurrency", valuation_currency)
            .with_opt("subUid", sub_uid);
        self.client
            .call_endpoint(&endpoints::ASSET_VALUATION, &params)
            .await
    }

    /// Move funds between accounts. Not idempotent: never retry blindly.
    pub async fn transfer(&self, transfer: &TransferRequest) -> Result<Value, ExchangeError> {
        let params = RequestParams::new()
            .with("from-user", transfer.from_user)
            .with("from-account-type", transfer.from_account_type.as_str())
            .with("from-account", transfer.from_account)
            .with("to-user", transfer.to_user)
            .with("to-account-type", transfer.to_account_type.as_str())
            .with("to-account", transfer.to_account)
            .with("currency", transfer.currency.as_str())
            .with("amount", transfer.amount.as_str());
        self.client
            .call_endpoint(&endpoints::TRANSFER, &params)
            .await
    }
}

/// Parameters of an asset transfer between (sub-)user accounts
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub from_user: u64,
    pub from_account_type: String,
    pub from_account: u64,
    pub to_user: u64,
    pub to_account_type: String,
    pub to_account: u64,
    pub currency: String,
    pub amount: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_v1_error_envelope() {
        let err = parse_api_error(&json!({
            "status": "error",
            "err-code": "api-signature-not-valid",
            "err-msg": "Signature not valid: Verification failure",
            "data": null
        }))
        .unwrap();
        assert!(matches!(
            err,
            ExchangeError::ApiError { ref code, .. } if code == "api-signature-not-valid"
        ));
    }

    #[test]
    fn test_v2_error_envelope() {
        let err = parse_api_error(&json!({"code": 1002, "message": "unauthorized"})).unwrap();
        assert_eq!(err.to_string(), "API error: 1002 - unauthorized");
    }

    #[test]
    fn test_success_bodies_are_not_errors() {
        assert!(parse_api_error(&json!({"status": "ok", "data": []})).is_none());
        assert!(parse_api_error(&json!({"code": 200, "data": {}, "success": true})).is_none());
        assert!(parse_api_error(&json!({
            "page": {"id": "p0qjfl24znv5"},
            "status": {"indicator": "none", "description": "All Systems Operational"}
        }))
        .is_none());
    }

    #[test]
    fn test_only_transfer_and_account_calls_are_signed() {
        assert!(endpoints::ACCOUNTS.signed);
        assert!(endpoints::TRANSFER.signed);
        assert_eq!(endpoints::TRANSFER.method, HttpMethod::Post);
        assert!(!endpoints::KLINES.signed);
        assert!(endpoints::SYSTEM_STATUS.is_absolute());
        assert_eq!(balance_path(100_009), "/v1/account/accounts/100009/balance");
    }
}
