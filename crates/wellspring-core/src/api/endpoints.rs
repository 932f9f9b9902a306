//! Typed calls for the storefront endpoints.
//!
//! Each method fixes one endpoint contract: the verb, the path, whether a
//! user bearer token is needed, and the type of `data` in the envelope.
//! Browsing and sign-in only need the application token; cart, profile and
//! payment calls also carry the user's bearer token.

use serde::Serialize;
use serde_json::{json, Value};

use crate::models::{
    AuthPayload, Cart, CartItemRequest, OtpChallenge, PaymentRequest, PaymentSession, Product,
    ProfileUpdate, RegistrationRequest, UserProfile,
};

use super::{ApiClient, ApiError, ApiResult};

/// Page size used when the caller does not ask for one
pub const DEFAULT_PAGE_SIZE: u32 = 20;

#[derive(Debug, Clone, Default)]
pub struct ProductQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub category: Option<String>,
}

impl ProductQuery {
    pub fn page(page: u32) -> Self {
        Self {
            page: Some(page),
            ..Self::default()
        }
    }

    fn to_params(&self) -> Value {
        let mut params = json!({
            "page": self.page.unwrap_or(1).max(1),
            "per_page": self.per_page.unwrap_or(DEFAULT_PAGE_SIZE),
        });
        if let Some(ref category) = self.category {
            params["category"] = Value::String(category.clone());
        }
        params
    }
}

fn to_body<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Client(format!("could not encode request: {}", e)))
}

impl ApiClient {
    // ===== Catalog =====

    pub async fn fetch_products(&self, query: &ProductQuery) -> ApiResult<Vec<Product>> {
        self.get("/products", Some(query.to_params()), None).await
    }

    pub async fn fetch_product(&self, product_id: i64) -> ApiResult<Product> {
        self.get(&format!("/products/{}", product_id), None, None).await
    }

    // ===== Sign-in =====

    pub async fn register(&self, request: &RegistrationRequest) -> ApiResult<OtpChallenge> {
        match to_body(request) {
            Ok(body) => self.post("/mobile/register", Some(body), None).await,
            Err(e) => e.into(),
        }
    }

    /// Ask the server to send a login code to `phone`
    pub async fn request_login(&self, phone: &str) -> ApiResult<OtpChallenge> {
        self.post("/mobile/login", Some(json!({ "phone": phone })), None)
            .await
    }

    pub async fn verify_otp(&self, phone: &str, code: &str) -> ApiResult<AuthPayload> {
        self.post(
            "/mobile/verify-otp",
            Some(json!({ "phone": phone, "otp": code })),
            None,
        )
        .await
    }

    pub async fn resend_otp(&self, phone: &str) -> ApiResult<OtpChallenge> {
        self.post("/mobile/resend-otp", Some(json!({ "phone": phone })), None)
            .await
    }

    // ===== Profile =====

    pub async fn fetch_profile(&self, user_token: &str) -> ApiResult<UserProfile> {
        match ApiClient::bearer(user_token) {
            Ok(headers) => self.get("/profile", None, Some(headers)).await,
            Err(e) => e.into(),
        }
    }

    pub async fn update_profile(&self, user_token: &str, update: &ProfileUpdate) -> ApiResult<UserProfile> {
        let prepared = to_body(update).and_then(|body| Ok((body, ApiClient::bearer(user_token)?)));
        match prepared {
            Ok((body, headers)) => self.put("/profile", Some(body), Some(headers)).await,
            Err(e) => e.into(),
        }
    }

    // ===== Cart =====

    pub async fn fetch_cart(&self, user_token: &str) -> ApiResult<Cart> {
        match ApiClient::bearer(user_token) {
            Ok(headers) => self.get("/cart", None, Some(headers)).await,
            Err(e) => e.into(),
        }
    }

    pub async fn add_to_cart(&self, user_token: &str, item: &CartItemRequest) -> ApiResult<Cart> {
        let prepared = to_body(item).and_then(|body| Ok((body, ApiClient::bearer(user_token)?)));
        match prepared {
            Ok((body, headers)) => self.post("/cart/items", Some(body), Some(headers)).await,
            Err(e) => e.into(),
        }
    }

    pub async fn update_cart_item(&self, user_token: &str, item_id: i64, quantity: u32) -> ApiResult<Cart> {
        match ApiClient::bearer(user_token) {
            Ok(headers) => {
                self.put(
                    &format!("/cart/items/{}", item_id),
                    Some(json!({ "quantity": quantity })),
                    Some(headers),
                )
                .await
            }
            Err(e) => e.into(),
        }
    }

    pub async fn remove_cart_item(&self, user_token: &str, item_id: i64) -> ApiResult<Cart> {
        match ApiClient::bearer(user_token) {
            Ok(headers) => {
                self.delete(&format!("/cart/items/{}", item_id), None, Some(headers))
                    .await
            }
            Err(e) => e.into(),
        }
    }

    // ===== Payment =====

    /// Start a hosted checkout; the returned URL is opened in a webview
    pub async fn initiate_payment(&self, user_token: &str, request: &PaymentRequest) -> ApiResult<PaymentSession> {
        let prepared = to_body(request).and_then(|body| Ok((body, ApiClient::bearer(user_token)?)));
        match prepared {
            Ok((body, headers)) => {
                self.post("/payments/initiate", Some(body), Some(headers))
                    .await
            }
            Err(e) => e.into(),
        }
    }
}
