use serde::{Deserialize, Serialize};

/// A fundraising project offered in the store (a water well, a mosque
/// renovation, a food basket...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Product {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    /// Price of one unit; `None` for open-amount donations
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default = "default_currency")]
    pub currency: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub target_amount: Option<f64>,
    #[serde(default)]
    pub raised_amount: Option<f64>,
}

pub(crate) fn default_currency() -> String {
    "SAR".to_string()
}

impl Product {
    /// Funding progress, clamped to 0..=100. `None` when the project has no target.
    pub fn progress_percent(&self) -> Option<u8> {
        let target = self.target_amount.filter(|t| *t > 0.0)?;
        let raised = self.raised_amount.unwrap_or(0.0).max(0.0);
        let percent = (raised / target * 100.0).clamp(0.0, 100.0);
        Some(percent.floor() as u8)
    }

    pub fn is_open_amount(&self) -> bool {
        self.price.is_none()
    }

    pub fn is_fully_funded(&self) -> bool {
        self.progress_percent() == Some(100)
    }
}
