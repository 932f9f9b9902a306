//! End-to-end behaviour of the API access layer against a mock backend.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use wellspring_core::api::{AppCredentials, ClientSettings, ManualClock, ProductQuery};
use wellspring_core::models::{CartItemRequest, PaymentRequest, Product};
use wellspring_core::{ApiClient, ApiError, ApiResult, Language};

fn settings(server: &MockServer) -> ClientSettings {
    ClientSettings {
        base_url: server.uri(),
        credentials: AppCredentials {
            app_key: "K".to_string(),
            app_secret: "S".to_string(),
        },
        timeout: Duration::from_secs(2),
        device_id: "test-device".to_string(),
        language: Language::Arabic,
    }
}

fn client(server: &MockServer) -> ApiClient {
    ApiClient::new(settings(server)).expect("client")
}

fn token_response(token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "success": true,
        "data": {"token": token, "expires_in": expires_in, "token_type": "Bearer"}
    }))
}

async fn mount_exchange(server: &MockServer, token: &str, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .respond_with(token_response(token, 3600))
        .expect(expected_calls)
        .mount(server)
        .await;
}

fn products_body() -> Value {
    json!({
        "success": true,
        "data": [
            {"id": 1, "name": "Water well", "price": 250.0, "currency": "SAR", "target_amount": 1000.0, "raised_amount": 400.0},
            {"id": 2, "name": "Food basket", "price": 50.0}
        ],
        "meta": {"pagination": {"total": 2, "current_page": 1, "per_page": 20, "total_pages": 1, "count": 2}}
    })
}

#[tokio::test]
async fn test_first_call_exchanges_then_requests_with_app_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .and(body_json(json!({"app_key": "K", "app_secret": "S"})))
        .respond_with(token_response("abc", 3600))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("x-app-token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let result: ApiResult<Vec<Product>> = client.get("/products", None, None).await;

    assert!(result.success, "unexpected failure: {:?}", result.error);
    assert_eq!(result.data.as_ref().map(Vec::len), Some(2));

    let requests = server.received_requests().await.expect("recording enabled");
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method.as_str(), "POST");
    assert_eq!(requests[0].url.path(), "/auth/app-token");
    assert!(requests[0].headers.get("x-app-token").is_none());
    assert_eq!(requests[1].method.as_str(), "GET");
    assert_eq!(requests[1].url.path(), "/products");
}

#[tokio::test]
async fn test_token_is_reused_while_fresh() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body()))
        .expect(3)
        .mount(&server)
        .await;

    let client = client(&server);
    for _ in 0..3 {
        let result = client.fetch_products(&ProductQuery::default()).await;
        assert!(result.success);
    }
    assert!(client.tokens().ensure_valid_token().await);
    assert!(client.tokens().ensure_valid_token().await);
}

#[tokio::test]
async fn test_token_refreshed_once_past_skew() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 2).await;

    let start = Utc::now();
    let clock = Arc::new(ManualClock::new(start));
    let client = ApiClient::with_clock(settings(&server), clock.clone()).expect("client");

    assert!(client.tokens().ensure_valid_token().await);
    clock.advance(chrono::Duration::minutes(54));
    assert!(client.tokens().ensure_valid_token().await);

    // 55 minutes into a one hour token is inside the refresh window
    clock.advance(chrono::Duration::minutes(1));
    assert!(client.tokens().ensure_valid_token().await);
    assert!(client.tokens().ensure_valid_token().await);

    let held = client.tokens().current().expect("token held");
    assert_eq!(held.issued_at, start + chrono::Duration::minutes(55));
}

#[tokio::test]
async fn test_failed_exchange_blocks_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "down"})))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body()))
        .expect(0)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch_products(&ProductQuery::default()).await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert_eq!(result.error.as_deref(), Some("Could not obtain application credential"));
    assert!(!client.tokens().ensure_valid_token().await);
}

#[tokio::test]
async fn test_rejected_envelope_from_exchange_is_a_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": false, "error": "Unknown app"})))
        .mount(&server)
        .await;

    let client = client(&server);
    let err = client.tokens().refresh_token().await.expect_err("rejected");
    assert!(matches!(err, ApiError::Rejected(_)));
    assert_eq!(err.to_string(), "Unknown app");
    assert_eq!(err.status(), None);
    assert!(client.tokens().current().is_none());
}

#[tokio::test]
async fn test_out_of_range_token_lifetime_is_a_failure() {
    for expires_in in [i64::MAX, 10_000_000_000_000] {
        let server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/auth/app-token"))
            .respond_with(token_response("abc", expires_in))
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/products"))
            .respond_with(ResponseTemplate::new(200).set_body_json(products_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = client(&server);
        let err = client.tokens().refresh_token().await.expect_err("lifetime out of range");
        assert!(matches!(err, ApiError::InvalidResponse(_)));
        assert!(client.tokens().current().is_none());

        for _ in 0..2 {
            let result = client.fetch_products(&ProductQuery::default()).await;
            assert!(!result.success);
            assert_eq!(result.error.as_deref(), Some("Could not obtain application credential"));
        }
    }
}

#[tokio::test]
async fn test_failed_refresh_keeps_previous_token() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .respond_with(token_response("first", 3600))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let client = client(&server);
    let first = client.tokens().refresh_token().await.expect("first exchange");
    assert_eq!(first.value, "first");

    assert!(client.tokens().refresh_token().await.is_err());
    assert_eq!(client.tokens().current().map(|t| t.value).as_deref(), Some("first"));
}

#[tokio::test]
async fn test_app_token_and_user_bearer_both_sent() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/cart"))
        .and(header("x-app-token", "abc"))
        .and(header("authorization", "Bearer user-1"))
        .and(header("accept-language", "ar"))
        .and(header("x-device-id", "test-device"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"items": [{"id": 7, "product_id": 1, "quantity": 2, "amount": 250.0}], "total": 500.0, "currency": "SAR"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch_cart("user-1").await;

    let cart = result.into_data().expect("cart");
    assert_eq!(cart.item_count(), 2);
}

#[tokio::test]
async fn test_server_error_message_is_surfaced() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/products/9"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"message": "boom"})))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch_product(9).await;

    assert!(!result.success);
    assert_eq!(result.error.as_deref(), Some("boom"));
    assert_eq!(result.status, Some(500));
}

#[tokio::test]
async fn test_unstructured_error_uses_status() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/profile"))
        .respond_with(ResponseTemplate::new(401).set_body_string("Unauthorized"))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch_profile("expired").await;

    assert!(result.is_unauthorized());
    assert_eq!(result.display_message(), "HTTP error 401");
}

#[tokio::test]
async fn test_timeout_becomes_failure_result() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body()).set_delay(Duration::from_secs(3)))
        .mount(&server)
        .await;

    let mut s = settings(&server);
    s.timeout = Duration::from_millis(500);
    let client = ApiClient::new(s).expect("client");

    let result = client.fetch_products(&ProductQuery::default()).await;
    assert!(!result.success);
    let error = result.error.expect("error text");
    assert!(error.contains("timed out"), "got {}", error);
}

#[tokio::test]
async fn test_unreachable_server_becomes_failure_result() {
    let server = MockServer::start().await;
    let mut s = settings(&server);
    drop(server);
    s.base_url = "http://127.0.0.1:9".to_string();

    let client = ApiClient::new(s).expect("client");
    let result: ApiResult<Value> = client.execute("/products", Method::GET, None, None, false).await;

    assert!(!result.success);
    assert!(result.error.expect("error").starts_with("Network error"));
}

#[tokio::test]
async fn test_malformed_success_body_is_a_failure() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;

    let client = client(&server);
    let result = client.fetch_products(&ProductQuery::default()).await;

    assert!(!result.success);
    assert!(result.error.expect("error").starts_with("Invalid response"));
}

#[tokio::test]
async fn test_server_reported_failure_drops_data() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("POST"))
        .and(path("/cart/items"))
        .and(body_json(json!({"product_id": 3, "quantity": 1})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": false,
            "data": {"items": []},
            "message": "Product is fully funded"
        })))
        .mount(&server)
        .await;

    let client = client(&server);
    let request = CartItemRequest {
        product_id: 3,
        quantity: 1,
        amount: None,
    };
    let result = client.add_to_cart("user-1", &request).await;

    assert!(!result.success);
    assert!(result.data.is_none());
    assert_eq!(result.display_message(), "Product is fully funded");
    assert_eq!(result.status, Some(200));
}

#[tokio::test]
async fn test_public_call_never_touches_token_manager() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 0).await;

    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"success": true, "data": "ok"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let result: ApiResult<String> = client.execute("/health", Method::GET, None, None, false).await;
    assert_eq!(result.into_data().as_deref(), Some("ok"));

    assert!(client.tokens().current().is_none());
    let requests = server.received_requests().await.expect("recording enabled");
    assert!(requests[0].headers.get("x-app-token").is_none());
}

#[tokio::test]
async fn test_concurrent_calls_share_one_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/auth/app-token"))
        .respond_with(token_response("abc", 3600).set_delay(Duration::from_millis(200)))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(header("x-app-token", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(products_body()))
        .expect(5)
        .mount(&server)
        .await;

    let client = client(&server);
    let query = ProductQuery::default();
    let results = futures::future::join_all((0..5).map(|_| client.fetch_products(&query))).await;

    assert!(results.iter().all(|r| r.success));
}

#[tokio::test]
async fn test_query_params_and_pagination() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "2"))
        .and(query_param("per_page", "20"))
        .and(query_param("category", "wells"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": [],
            "meta": {"pagination": {"total": 25, "current_page": 2, "per_page": 20, "total_pages": 2, "count": 5}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let query = ProductQuery {
        page: Some(2),
        per_page: None,
        category: Some("wells".to_string()),
    };
    let result = client.fetch_products(&query).await;

    assert!(result.success);
    let pagination = result.pagination().expect("pagination");
    assert_eq!(pagination.current_page, 2);
    assert!(!pagination.has_next_page());
}

#[tokio::test]
async fn test_language_switch_changes_locale_header() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("GET"))
        .and(path("/products/1"))
        .and(header("accept-language", "en"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"id": 1, "name": "Water well"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    client.set_language(Language::English);
    let product = client.fetch_product(1).await.into_data().expect("product");
    assert_eq!(product.name, "Water well");
}

#[tokio::test]
async fn test_sign_in_and_checkout_flow() {
    let server = MockServer::start().await;
    mount_exchange(&server, "abc", 1).await;

    Mock::given(method("POST"))
        .and(path("/mobile/login"))
        .and(body_json(json!({"phone": "+966500000000"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"phone": "+966500000000", "resend_after": 60},
            "message": "Code sent"
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/mobile/verify-otp"))
        .and(body_json(json!({"phone": "+966500000000", "otp": "1234"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {"token": "user-9", "user": {"id": 9, "name": "Yusuf", "phone": "+966500000000"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/payments/initiate"))
        .and(header("authorization", "Bearer user-9"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "data": {
                "payment_id": "pay_1",
                "checkout_url": "https://checkout.example.com/pay_1",
                "success_url": "https://api.wellspring.org/payments/success"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);

    let challenge = client.request_login("+966500000000").await;
    assert_eq!(challenge.message.as_deref(), Some("Code sent"));
    assert_eq!(challenge.into_data().and_then(|c| c.resend_after), Some(60));

    let auth = client.verify_otp("+966500000000", "1234").await.into_data().expect("auth payload");
    assert_eq!(auth.user.display_name(), "Yusuf");

    let session = client
        .initiate_payment(&auth.token, &PaymentRequest::default())
        .await
        .into_data()
        .expect("payment session");
    assert_eq!(session.checkout_url, "https://checkout.example.com/pay_1");
}
