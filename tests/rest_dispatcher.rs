use exwire::core::config::Credentials;
use exwire::core::kernel::signer::{canonical_signature, hmac_sha256};
use exwire::core::kernel::{
    HmacExchangeType, HmacSigner, ReqwestRest, RestClient, RestClientBuilder, RestClientConfig,
};
use exwire::exchanges::{binance, huobi};
use exwire::{ErrorKind, ExchangeError, HttpMethod, RequestParams};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const KEY: &str = "test-api-key";
const SECRET: &str = "test-secret-key";

fn rest_client(
    server: &MockServer,
    exchange: HmacExchangeType,
    signed: bool,
) -> ReqwestRest {
    let (name, parser): (&str, fn(&Value) -> Option<ExchangeError>) = match exchange {
        HmacExchangeType::Binance => ("binance", binance::parse_api_error),
        HmacExchangeType::Huobi => ("huobi", huobi::parse_api_error),
    };
    let mut builder = RestClientBuilder::new(RestClientConfig::new(server.uri(), name.to_string()))
        .with_error_parser(parser);
    if signed {
        builder = builder.with_signer(Arc::new(HmacSigner::new(
            Credentials::new(KEY, SECRET),
            exchange,
        )));
    }
    builder.build().unwrap()
}

fn query_pairs(request: &wiremock::Request) -> Vec<(String, String)> {
    request
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect()
}

#[tokio::test]
async fn test_unsigned_get_drops_empty_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/market/history/kline"))
        .and(query_param("symbol", "btcusdt"))
        .and(query_param("period", "1min"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "data": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Huobi, false);
    let params = RequestParams::new()
        .with("symbol", "btcusdt")
        .with("period", "1min")
        .with("size", "");
    let body = client
        .call_endpoint(&huobi::endpoints::KLINES, &params)
        .await
        .unwrap();
    assert_eq!(body["status"], "ok");

    let requests = server.received_requests().await.unwrap();
    let keys: Vec<String> = query_pairs(&requests[0]).into_iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["symbol", "period"]);
}

#[tokio::test]
async fn test_absolute_path_bypasses_base_url() {
    let status_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/summary.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": {"indicator": "none"}})))
        .expect(1)
        .mount(&status_server)
        .await;

    let api_server = MockServer::start().await;
    let client = rest_client(&api_server, HmacExchangeType::Huobi, false);
    let url = format!("{}/api/v2/summary.json", status_server.uri());
    let body = client
        .get(&url, &RequestParams::new(), false)
        .await
        .unwrap();
    assert_eq!(body["status"]["indicator"], "none");
    assert!(api_server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_binance_signed_call_carries_key_header_and_signature() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/sapi/v1/accountSnapshot"))
        .and(header("X-MBX-APIKEY", KEY))
        .and(query_param("type", "SPOT"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"code": 200, "msg": "", "snapshotVos": []})))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Binance, true);
    let body = binance::BinanceRestClient::new(client)
        .account_snapshot("SPOT", None)
        .await
        .unwrap();
    assert_eq!(body["code"], 200);

    let requests = server.received_requests().await.unwrap();
    let query = requests[0].url.query().unwrap().to_string();
    let (signed_part, signature) = query.rsplit_once("&signature=").unwrap();
    assert!(signed_part.starts_with("timestamp="));
    assert!(signed_part.ends_with("&type=SPOT"));
    assert_eq!(
        signature,
        hex::encode(hmac_sha256(SECRET, signed_part.as_bytes()).unwrap())
    );
    assert!(!query.contains(KEY));
}

#[tokio::test]
async fn test_huobi_signed_post_sends_params_as_body() {
    let server = MockServer::start().await;
    let transfer = huobi::TransferRequest {
        from_user: 1,
        from_account_type: "spot".to_string(),
        from_account: 100,
        to_user: 2,
        to_account_type: "spot".to_string(),
        to_account: 200,
        currency: "usdt".to_string(),
        amount: "10.5".to_string(),
    };
    Mock::given(method("POST"))
        .and(path("/v1/account/transfer"))
        .and(body_json(json!({
            "from-user": 1,
            "from-account-type": "spot",
            "from-account": 100,
            "to-user": 2,
            "to-account-type": "spot",
            "to-account": 200,
            "currency": "usdt",
            "amount": "10.5"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok", "data": 12345})))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Huobi, true);
    let body = huobi::HuobiRestClient::new(client)
        .transfer(&transfer)
        .await
        .unwrap();
    assert_eq!(body["data"], 12345);

    let requests = server.received_requests().await.unwrap();
    let mut pairs = query_pairs(&requests[0]);
    let signature_at = pairs.iter().position(|(k, _)| k == "Signature").unwrap();
    let (_, signature) = pairs.remove(signature_at);
    let keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(
        keys,
        ["AccessKeyId", "SignatureMethod", "SignatureVersion", "Timestamp"]
    );

    let host = requests[0].url.host_str().unwrap().to_string();
    let host = format!("{}:{}", host, requests[0].url.port().unwrap());
    let expected =
        canonical_signature(SECRET, "POST", &host, "/v1/account/transfer", &mut pairs).unwrap();
    assert_eq!(signature, expected);
}

#[tokio::test]
async fn test_error_envelope_under_http_200_is_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/account/accounts"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "error",
            "err-code": "api-signature-not-valid",
            "err-msg": "Signature not valid",
            "data": null
        })))
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Huobi, true);
    let err = client
        .call_endpoint(&huobi::endpoints::ACCOUNTS, &RequestParams::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Exchange);
    assert!(matches!(
        err,
        ExchangeError::ApiError { ref code, .. } if code == "api-signature-not-valid"
    ));
}

#[tokio::test]
async fn test_binance_error_under_http_400_keeps_exchange_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/depth"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": -1121, "msg": "Invalid symbol."})))
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Binance, false);
    let err = binance::BinanceRestClient::new(client)
        .depth("NOPE", 100)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::ApiError { ref code, ref message } if code == "-1121" && message == "Invalid symbol."
    ));
}

#[tokio::test]
async fn test_non_2xx_without_envelope_is_single_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/ping"))
        .respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
        .expect(1)
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Binance, false);
    let err = client
        .call_endpoint(&binance::endpoints::PING, &RequestParams::new())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ExchangeError::ApiError { ref code, ref message } if code == "503" && message == "maintenance"
    ));
    // `expect(1)` is verified when the server drops
}

#[tokio::test]
async fn test_malformed_success_body_is_protocol_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/v1/common/timestamp"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"status\":\"ok\",\"data\":"))
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Huobi, false);
    let err = client
        .call_endpoint(&huobi::endpoints::TIMESTAMP, &RequestParams::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Protocol);
}

#[tokio::test]
async fn test_missing_credentials_never_reach_the_wire() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(0)
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Binance, false);
    let err = client
        .call_endpoint(&binance::endpoints::ACCOUNT_SNAPSHOT, &RequestParams::new())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);

    let half = RestClientBuilder::new(RestClientConfig::new(server.uri(), "binance".to_string()))
        .with_signer(Arc::new(HmacSigner::new(
            Credentials::new(KEY, ""),
            HmacExchangeType::Binance,
        )))
        .build()
        .unwrap();
    let err = half
        .call(HttpMethod::Get, "/sapi/v1/accountSnapshot", &RequestParams::new(), true)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Auth);
}

#[tokio::test]
async fn test_signed_absolute_url_is_rejected() {
    let server = MockServer::start().await;
    let client = rest_client(&server, HmacExchangeType::Huobi, true);
    let err = client
        .call(
            HttpMethod::Get,
            "https://status.huobigroup.com/api/v2/summary.json",
            &RequestParams::new(),
            true,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::InvalidParameters(_)));
}

#[tokio::test]
async fn test_slow_response_is_a_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"serverTime": 1}))
                .set_delay(Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let client = RestClientBuilder::new(
        RestClientConfig::new(server.uri(), "binance".to_string()).with_timeout(1),
    )
    .build()
    .unwrap();
    let err = client
        .call_endpoint(&binance::endpoints::SERVER_TIME, &RequestParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::ConnectionTimeout(_)), "{:?}", err);
    assert_eq!(err.kind(), ErrorKind::Transport);
}

#[tokio::test]
async fn test_refused_connection_is_a_network_error() {
    // nothing listens on a port whose listener was just dropped
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let uri = format!("http://{}", listener.local_addr().unwrap());
    drop(listener);

    let client = RestClientBuilder::new(RestClientConfig::new(uri, "binance".to_string()))
        .build()
        .unwrap();
    let err = client
        .call_endpoint(&binance::endpoints::PING, &RequestParams::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ExchangeError::NetworkError(_)), "{:?}", err);
    assert!(err.is_retryable());
}

#[tokio::test]
async fn test_typed_response() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v3/time"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"serverTime": 1_499_827_319_559_u64})))
        .mount(&server)
        .await;

    let client = rest_client(&server, HmacExchangeType::Binance, false);
    let time = binance::BinanceRestClient::new(client)
        .server_time()
        .await
        .unwrap();
    assert_eq!(time.server_time, 1_499_827_319_559);
}
