//! Trading signals and the alerts generated from them.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire;

/// Recommended action of a signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalAction {
    #[serde(alias = "buy")]
    Buy,
    #[serde(alias = "sell")]
    Sell,
    #[serde(alias = "hold")]
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "BUY",
            SignalAction::Sell => "SELL",
            SignalAction::Hold => "HOLD",
        }
    }

    /// BUY and SELL are actionable; HOLD is informational.
    pub fn is_actionable(&self) -> bool {
        !matches!(self, SignalAction::Hold)
    }
}

/// Signal card from `/api/signals`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub asset: String,

    pub action: SignalAction,

    /// Confidence in percent (0-100)
    #[serde(default, deserialize_with = "wire::f64_or_zero")]
    pub confidence: f64,

    /// Composite score (0-100)
    #[serde(default, deserialize_with = "wire::f64_or_zero")]
    pub score: f64,

    #[serde(default)]
    pub reasons: String,

    #[serde(default, deserialize_with = "wire::decimal_or_zero")]
    pub price: Decimal,

    #[serde(default, alias = "change_24h", deserialize_with = "wire::f64_or_zero")]
    pub change_24h: f64,

    #[serde(default, deserialize_with = "wire::opt_timestamp")]
    pub timestamp: Option<DateTime<Utc>>,
}

/// Alert record from `/api/alerts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub asset: String,

    pub action: SignalAction,

    #[serde(default, deserialize_with = "wire::f64_or_zero")]
    pub score: f64,

    #[serde(default, deserialize_with = "wire::f64_or_zero")]
    pub confidence: f64,

    #[serde(default, deserialize_with = "wire::decimal_or_zero")]
    pub price: Decimal,

    #[serde(default)]
    pub reasons: String,

    #[serde(default, alias = "createdAt", deserialize_with = "wire::opt_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
}
