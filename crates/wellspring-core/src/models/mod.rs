//! Data models for Wellspring entities.
//!
//! - `Product`: a fundraising project in the store
//! - `Cart`, `CartItem`: the signed-in user's cart
//! - `UserProfile`, `AuthPayload`, `OtpChallenge`: accounts and sign-in
//! - `PaymentSession`: a hosted checkout opened in a webview

pub mod cart;
pub mod payment;
pub mod product;
pub mod user;

pub use cart::{Cart, CartItem, CartItemRequest};
pub use payment::{PaymentOutcome, PaymentRequest, PaymentSession};
pub use product::Product;
pub use user::{AuthPayload, OtpChallenge, ProfileUpdate, RegistrationRequest, UserProfile};
