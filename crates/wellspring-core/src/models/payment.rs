use serde::{Deserialize, Serialize};

/// Body for `POST /payments/initiate`. Without explicit items the whole
/// cart is charged.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PaymentRequest {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub cart_item_ids: Vec<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dedication: Option<String>,
}

/// A hosted checkout page to be opened in a webview
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct PaymentSession {
    pub payment_id: String,
    pub checkout_url: String,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub cancel_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentOutcome {
    Succeeded,
    Cancelled,
}

impl PaymentSession {
    /// Classify a URL the checkout webview navigated to.
    ///
    /// Returns `None` while the user is still on the payment provider's pages.
    pub fn outcome_for_url(&self, url: &str) -> Option<PaymentOutcome> {
        let matches = |prefix: &Option<String>| {
            prefix
                .as_deref()
                .filter(|p| !p.is_empty())
                .is_some_and(|p| url.starts_with(p))
        };

        if matches(&self.success_url) {
            Some(PaymentOutcome::Succeeded)
        } else if matches(&self.cancel_url) {
            Some(PaymentOutcome::Cancelled)
        } else {
            None
        }
    }
}
