use serde::{Deserialize, Serialize};

use super::product::default_currency;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Cart {
    #[serde(default)]
    pub items: Vec<CartItem>,
    #[serde(default)]
    pub total: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct CartItem {
    pub id: i64,
    pub product_id: i64,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: u32,
    /// Amount for one unit
    pub amount: f64,
    #[serde(default)]
    pub subtotal: Option<f64>,
}

impl CartItem {
    pub fn line_total(&self) -> f64 {
        self.subtotal.unwrap_or(self.amount * f64::from(self.quantity))
    }
}

impl Cart {
    /// Number of units across all lines
    pub fn item_count(&self) -> u32 {
        self.items.iter().map(|i| i.quantity).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Body for `POST /cart/items`
#[derive(Debug, Clone, Serialize)]
pub struct CartItemRequest {
    pub product_id: i64,
    pub quantity: u32,
    /// Required for open-amount products, ignored otherwise
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
}
