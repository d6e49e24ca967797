use crate::core::errors::ExchangeError;
use crate::core::kernel::signer::{urlencode, Signer, SigningContext};
use crate::core::types::{is_absolute_url, Endpoint, HttpMethod, RequestParams};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tracing::{debug, instrument, trace};

/// Recognizes an exchange-defined error inside a JSON response body.
///
/// Exchanges report rejections with their own envelope (sometimes under HTTP 200), so the
/// dispatcher asks the exchange wiring whether a decoded body is actually an error.
pub type ApiErrorParser = fn(&Value) -> Option<ExchangeError>;

/// REST client trait for making HTTP requests
///
/// This trait provides a unified interface for HTTP operations across different exchanges.
/// Implementations handle the specific authentication and request formatting requirements
/// for each exchange. Nothing at this layer retries: a failed call is reported once.
#[async_trait]
pub trait RestClient: Send + Sync {
    /// Execute one logical call
    ///
    /// # Arguments
    /// * `method` - HTTP method
    /// * `path` - Path relative to the base URL, or an absolute URL for unsigned calls
    /// * `params` - Logical parameters; empty values are dropped before sending
    /// * `signed` - Whether to sign the request
    ///
    /// # Returns
    /// The response body as a JSON value
    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: &RequestParams,
        signed: bool,
    ) -> Result<Value, ExchangeError>;

    /// Execute one logical call with a strongly-typed response
    async fn call_json<T: DeserializeOwned + Send>(
        &self,
        method: HttpMethod,
        path: &str,
        params: &RequestParams,
        signed: bool,
    ) -> Result<T, ExchangeError> {
        let value = self.call(method, path, params, signed).await?;
        serde_json::from_value(value).map_err(|e| {
            ExchangeError::DeserializationError(format!("Failed to deserialize JSON: {}", e))
        })
    }

    /// Execute a catalog endpoint
    async fn call_endpoint(
        &self,
        endpoint: &Endpoint,
        params: &RequestParams,
    ) -> Result<Value, ExchangeError> {
        self.call(endpoint.method, endpoint.path, params, endpoint.signed)
            .await
    }

    /// Make a GET request
    async fn get(
        &self,
        path: &str,
        params: &RequestParams,
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        self.call(HttpMethod::Get, path, params, signed).await
    }

    /// Make a POST request
    async fn post(
        &self,
        path: &str,
        params: &RequestParams,
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        self.call(HttpMethod::Post, path, params, signed).await
    }
}

/// Configuration for the REST client
#[derive(Clone, Debug)]
pub struct RestClientConfig {
    /// Base URL for the API
    pub base_url: String,
    /// Exchange name for logging and tracing
    pub exchange_name: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// User agent string to include in requests
    pub user_agent: String,
}

impl RestClientConfig {
    /// Create a new configuration
    ///
    /// # Arguments
    /// * `base_url` - Base URL for the API
    /// * `exchange_name` - Name of the exchange
    pub fn new(base_url: String, exchange_name: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            exchange_name,
            timeout_seconds: 30,
            user_agent: "exwire/0.1".to_string(),
        }
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_seconds: u64) -> Self {
        self.timeout_seconds = timeout_seconds;
        self
    }

    /// Set the user agent string
    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

/// Builder for creating REST client instances
pub struct RestClientBuilder {
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    error_parser: ApiErrorParser,
}

impl RestClientBuilder {
    /// Create a new builder with the given configuration
    ///
    /// # Arguments
    /// * `config` - Configuration for the REST client
    pub fn new(config: RestClientConfig) -> Self {
        Self {
            config,
            signer: None,
            error_parser: no_api_error,
        }
    }

    /// Set the signer for authenticated requests
    ///
    /// # Arguments
    /// * `signer` - The signer to use for authentication
    pub fn with_signer(mut self, signer: Arc<dyn Signer>) -> Self {
        self.signer = Some(signer);
        self
    }

    /// Set the exchange-specific error envelope parser
    pub fn with_error_parser(mut self, parser: ApiErrorParser) -> Self {
        self.error_parser = parser;
        self
    }

    /// Build the REST client
    ///
    /// # Returns
    /// A new `ReqwestRest` instance
    pub fn build(self) -> Result<ReqwestRest, ExchangeError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(self.config.timeout_seconds))
            .user_agent(&self.config.user_agent)
            .build()
            .map_err(|e| {
                ExchangeError::ConfigurationError(format!("Failed to build HTTP client: {}", e))
            })?;

        Ok(ReqwestRest {
            client,
            config: self.config,
            signer: self.signer,
            error_parser: self.error_parser,
        })
    }
}

/// Implementation of `RestClient` using reqwest
#[derive(Clone)]
pub struct ReqwestRest {
    client: Client,
    config: RestClientConfig,
    signer: Option<Arc<dyn Signer>>,
    error_parser: ApiErrorParser,
}

impl std::fmt::Debug for ReqwestRest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReqwestRest")
            .field("config", &self.config)
            .field("has_signer", &self.signer.is_some())
            .finish_non_exhaustive()
    }
}

impl ReqwestRest {
    pub fn config(&self) -> &RestClientConfig {
        &self.config
    }

    /// Get the current timestamp in milliseconds
    fn get_timestamp() -> Result<u64, ExchangeError> {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .map_err(|e| ExchangeError::AuthError(format!("Failed to get timestamp: {}", e)))
    }

    /// URL for an unsigned call; absolute paths bypass the base host
    fn unsigned_url(&self, path: &str, method: HttpMethod, params: &RequestParams) -> String {
        let url = if is_absolute_url(path) {
            path.to_string()
        } else {
            format!("{}{}", self.config.base_url, path)
        };

        if method != HttpMethod::Get {
            return url;
        }
        let query = urlencode(&params.compact());
        if query.is_empty() {
            url
        } else {
            format!("{}?{}", url, query)
        }
    }

    fn build_signed(
        &self,
        method: HttpMethod,
        path: &str,
        params: &RequestParams,
    ) -> Result<reqwest::RequestBuilder, ExchangeError> {
        let signer = self.signer.as_ref().ok_or_else(|| {
            ExchangeError::AuthError(
                "Authentication required but no credentials configured".to_string(),
            )
        })?;

        if is_absolute_url(path) {
            return Err(ExchangeError::InvalidParameters(format!(
                "Signed calls must use a path relative to the base URL, got '{}'",
                path
            )));
        }

        let context = SigningContext {
            method,
            base_url: &self.config.base_url,
            path,
            params,
        };
        let signed = signer.sign_request(&context, Self::get_timestamp()?)?;

        let mut request = self.client.request(method.to_reqwest(), &signed.url);
        for (key, value) in &signed.headers {
            request = request.header(key, value);
        }
        if let Some(body) = signed.body {
            request = request.body(body);
        }
        Ok(request)
    }

    fn build_unsigned(
        &self,
        method: HttpMethod,
        path: &str,
        params: &RequestParams,
    ) -> Result<reqwest::RequestBuilder, ExchangeError> {
        let url = self.unsigned_url(path, method, params);
        let mut request = self.client.request(method.to_reqwest(), &url);

        if method != HttpMethod::Get {
            let body = serde_json::to_vec(&params.to_json_body()).map_err(|e| {
                ExchangeError::SerializationError(format!(
                    "Failed to serialize request body: {}",
                    e
                ))
            })?;
            request = request
                .header("Content-Type", "application/json")
                .body(body);
        }
        Ok(request)
    }

    /// Handle the response and extract JSON
    #[instrument(skip(self, response), fields(exchange = %self.config.exchange_name, status = %response.status()))]
    async fn handle_response(&self, response: Response) -> Result<Value, ExchangeError> {
        let status = response.status();
        let response_text = response.text().await.map_err(|e| {
            ExchangeError::NetworkError(format!("Failed to read response body: {}", e))
        })?;

        trace!("Response body: {}", response_text);

        match serde_json::from_str::<Value>(&response_text) {
            Ok(value) => {
                if let Some(err) = (self.error_parser)(&value) {
                    debug!(error = %err, "Exchange rejected request");
                    return Err(err);
                }
                if status.is_success() {
                    Ok(value)
                } else {
                    Err(ExchangeError::ApiError {
                        code: status.as_u16().to_string(),
                        message: response_text,
                    })
                }
            }
            Err(e) if status.is_success() => Err(ExchangeError::DeserializationError(format!(
                "Failed to parse JSON response: {}",
                e
            ))),
            Err(_) => Err(ExchangeError::ApiError {
                code: status.as_u16().to_string(),
                message: response_text,
            }),
        }
    }
}

#[async_trait]
impl RestClient for ReqwestRest {
    #[instrument(skip(self, params), fields(exchange = %self.config.exchange_name, method = %method, endpoint = %path, signed = signed))]
    async fn call(
        &self,
        method: HttpMethod,
        path: &str,
        params: &RequestParams,
        signed: bool,
    ) -> Result<Value, ExchangeError> {
        let request = if signed {
            self.build_signed(method, path, params)?
        } else {
            self.build_unsigned(method, path, params)?
        };

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                ExchangeError::ConnectionTimeout(format!("Request to {} timed out", path))
            } else {
                ExchangeError::NetworkError(format!("Request to {} failed: {}", path, e))
            }
        })?;

        self.handle_response(response).await
    }
}

/// Default parser: only HTTP status decides
pub fn no_api_error(_body: &Value) -> Option<ExchangeError> {
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::errors::ErrorKind;

    fn client() -> ReqwestRest {
        RestClientBuilder::new(RestClientConfig::new(
            "https://api.huobi.pro/".to_string(),
            "huobi".to_string(),
        ))
        .build()
        .unwrap()
    }

    #[test]
    fn test_unsigned_url_appends_compacted_query() {
        let params = RequestParams::new()
            .with("symbol", "btcusdt")
            .with("period", "")
            .with("size", 150);
        assert_eq!(
            client().unsigned_url("/market/history/kline", HttpMethod::Get, &params),
            "https://api.huobi.pro/market/history/kline?symbol=btcusdt&size=150"
        );
    }

    #[test]
    fn test_absolute_url_bypasses_base() {
        assert_eq!(
            client().unsigned_url(
                "https://status.huobigroup.com/api/v2/summary.json",
                HttpMethod::Get,
                &RequestParams::new()
            ),
            "https://status.huobigroup.com/api/v2/summary.json"
        );
    }

    #[tokio::test]
    async fn test_signed_call_without_signer_is_auth_error() {
        let err = client()
            .call(
                HttpMethod::Get,
                "/v1/account/accounts",
                &RequestParams::new(),
                true,
            )
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Auth);
    }
}
