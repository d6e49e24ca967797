use crate::core::config::Credentials;
use crate::core::errors::ExchangeError;
use crate::core::types::{HttpMethod, RequestParams};
use base64::engine::general_purpose;
use base64::Engine;
use hmac::{Hmac, Mac};
use sha2::Sha256;
use std::collections::HashMap;

type HmacSha256 = Hmac<Sha256>;

/// Result type for signing operations
pub type SignatureResult = Result<SignedRequest, ExchangeError>;

/// Everything a signer needs to know about one logical call
#[derive(Debug, Clone, Copy)]
pub struct SigningContext<'a> {
    pub method: HttpMethod,
    /// Base URL of the REST API, e.g. `https://api.huobi.pro`
    pub base_url: &'a str,
    /// Endpoint path, e.g. `/v1/account/accounts`
    pub path: &'a str,
    pub params: &'a RequestParams,
}

/// A fully signed request. Timestamps make it single-use.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedRequest {
    /// Final URL including the query string
    pub url: String,
    /// Query string exactly as signed and sent (without leading '?')
    pub query: String,
    pub body: Option<Vec<u8>>,
    pub headers: HashMap<String, String>,
}

/// Signer trait for request authentication
///
/// Implementations must be pure given their inputs and the supplied timestamp, and
/// must refuse to sign (with `AuthError`) when credentials are incomplete.
pub trait Signer: Send + Sync {
    /// Sign a request
    ///
    /// # Arguments
    /// * `request` - method, base URL, path and logical parameters of the call
    /// * `timestamp` - Request timestamp in milliseconds since the Unix epoch
    fn sign_request(&self, request: &SigningContext<'_>, timestamp: u64) -> SignatureResult;
}

/// Supported HMAC exchange types
///
/// Each variant is one wire format; a new exchange adds a variant here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HmacExchangeType {
    /// Query-signed: hex HMAC over the query string, API key in a header
    Binance,
    /// Canonical-string: base64 HMAC over `METHOD\nHOST\nPATH\nsorted_query`
    Huobi,
}

/// HMAC-SHA256 signer for exchanges using SHA256 signatures
pub struct HmacSigner {
    credentials: Credentials,
    exchange_type: HmacExchangeType,
}

impl HmacSigner {
    /// Create a new HMAC signer
    ///
    /// # Arguments
    /// * `credentials` - API key and secret from the exchange
    /// * `exchange_type` - Which exchange format to use
    pub fn new(credentials: Credentials, exchange_type: HmacExchangeType) -> Self {
        Self {
            credentials,
            exchange_type,
        }
    }

    pub fn exchange_type(&self) -> HmacExchangeType {
        self.exchange_type
    }

    fn ensure_credentials(&self) -> Result<(), ExchangeError> {
        if self.credentials.is_complete() {
            Ok(())
        } else {
            Err(ExchangeError::AuthError(
                "API key and secret are required for signed requests".to_string(),
            ))
        }
    }

    fn sign_binance(&self, request: &SigningContext<'_>, timestamp: u64) -> SignatureResult {
        let mut pairs = vec![("timestamp".to_string(), timestamp.to_string())];
        pairs.extend(request.params.compact());

        let query_string = urlencode(&pairs);
        let signature = hex::encode(hmac_sha256(
            self.credentials.secret_key(),
            query_string.as_bytes(),
        )?);
        let query = format!("{}&signature={}", query_string, signature);

        let mut headers = HashMap::new();
        headers.insert(
            "X-MBX-APIKEY".to_string(),
            self.credentials.api_key().to_string(),
        );

        Ok(SignedRequest {
            url: format!("{}{}?{}", request.base_url, request.path, query),
            query,
            body: None,
            headers,
        })
    }

    fn sign_huobi(&self, request: &SigningContext<'_>, timestamp: u64) -> SignatureResult {
        let host = host_of(request.base_url)?;

        let mut signed_params = vec![
            (
                "AccessKeyId".to_string(),
                self.credentials.api_key().to_string(),
            ),
            ("SignatureMethod".to_string(), "HmacSHA256".to_string()),
            ("SignatureVersion".to_string(), "2".to_string()),
            ("Timestamp".to_string(), utc_timestamp(timestamp)?),
        ];

        // GET carries caller params in the signed query; everything else sends them
        // as an unsigned JSON body.
        let body = if request.method == HttpMethod::Get {
            signed_params.extend(request.params.compact());
            None
        } else {
            let body = serde_json::to_vec(&request.params.to_json_body()).map_err(|e| {
                ExchangeError::SerializationError(format!("Failed to serialize body: {}", e))
            })?;
            Some(body)
        };

        let signature = canonical_signature(
            self.credentials.secret_key(),
            request.method.as_str(),
            &host,
            request.path,
            &mut signed_params,
        )?;

        let query = format!(
            "{}&{}",
            urlencode(&signed_params),
            urlencode(&[("Signature".to_string(), signature)])
        );

        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());

        Ok(SignedRequest {
            url: format!("{}{}?{}", request.base_url, request.path, query),
            query,
            body,
            headers,
        })
    }
}

impl Signer for HmacSigner {
    fn sign_request(&self, request: &SigningContext<'_>, timestamp: u64) -> SignatureResult {
        self.ensure_credentials()?;

        match self.exchange_type {
            HmacExchangeType::Binance => self.sign_binance(request, timestamp),
            HmacExchangeType::Huobi => self.sign_huobi(request, timestamp),
        }
    }
}

/// Raw HMAC-SHA256 digest
pub fn hmac_sha256(secret: &str, payload: &[u8]) -> Result<Vec<u8>, ExchangeError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthError(format!("Invalid secret key: {}", e)))?;
    mac.update(payload);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Canonical-string signature: sorts `params` by key (byte order) in place, then
/// returns `base64(HMAC-SHA256(secret, METHOD\nHOST\nPATH\nurlencode(params)))`.
pub fn canonical_signature(
    secret: &str,
    method: &str,
    host: &str,
    path: &str,
    params: &mut [(String, String)],
) -> Result<String, ExchangeError> {
    params.sort_by(|a, b| a.0.cmp(&b.0));
    let payload = format!("{}\n{}\n{}\n{}", method, host, path, urlencode(params));
    let digest = hmac_sha256(secret, payload.as_bytes())?;
    Ok(general_purpose::STANDARD.encode(digest))
}

/// `application/x-www-form-urlencoded` in the given order
pub fn urlencode(pairs: &[(String, String)]) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
        .finish()
}

/// UTC ISO-8601 without offset or fraction, e.g. `2017-05-11T15:19:30`
pub fn utc_timestamp(timestamp_ms: u64) -> Result<String, ExchangeError> {
    let millis = i64::try_from(timestamp_ms)
        .map_err(|_| ExchangeError::AuthError("Timestamp out of range".to_string()))?;
    let datetime = chrono::DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| ExchangeError::AuthError("Invalid timestamp".to_string()))?;
    Ok(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
}

pub(crate) fn host_of(base_url: &str) -> Result<String, ExchangeError> {
    let parsed = url::Url::parse(base_url).map_err(|e| {
        ExchangeError::ConfigurationError(format!("Invalid base URL '{}': {}", base_url, e))
    })?;
    let host = parsed.host_str().ok_or_else(|| {
        ExchangeError::ConfigurationError(format!("Base URL '{}' has no host", base_url))
    })?;
    Ok(match parsed.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
