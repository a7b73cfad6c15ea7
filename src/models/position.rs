//! Position model representing a user's holding of an asset.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::asset::normalize_asset;
use super::wire;

/// A holding of an asset bought at a recorded price.
///
/// Positions are immutable once created; the only mutation is deletion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    /// Position identifier (server-assigned or a local UUID)
    #[serde(default, deserialize_with = "wire::id_string")]
    pub id: String,

    /// Canonical asset id, lowercase (e.g. "bitcoin")
    pub asset: String,

    /// Quantity held
    pub amount: Decimal,

    /// Price paid per unit
    #[serde(alias = "buy_price")]
    pub buy_price: Decimal,

    /// When the position was acquired
    #[serde(
        alias = "purchase_date",
        alias = "date",
        default = "Utc::now",
        deserialize_with = "wire::timestamp_or_now"
    )]
    pub purchase_date: DateTime<Utc>,

    /// Wallet this position belongs to, if any
    #[serde(alias = "wallet_id", default, deserialize_with = "wire::opt_id_string")]
    pub wallet_id: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    /// Exchange transaction id from the CSV import
    #[serde(alias = "transaction_id", default)]
    pub transaction_id: Option<String>,
}

impl Position {
    /// Create a new position from manual entry.
    ///
    /// The asset may be a canonical id or a ticker. Fails when `amount` is not
    /// positive or `buy_price` is negative.
    pub fn new(
        asset: &str,
        amount: Decimal,
        buy_price: Decimal,
        wallet_id: Option<String>,
    ) -> Result<Self> {
        if amount <= Decimal::ZERO {
            bail!("Amount must be greater than zero, got {}", amount);
        }
        if buy_price < Decimal::ZERO {
            bail!("Buy price cannot be negative, got {}", buy_price);
        }
        let asset = normalize_asset(asset);
        if asset.is_empty() {
            bail!("Asset is required");
        }

        Ok(Self {
            id: uuid::Uuid::new_v4().to_string(),
            asset,
            amount,
            buy_price,
            purchase_date: Utc::now(),
            wallet_id,
            notes: None,
            transaction_id: None,
        })
    }

    /// Cost basis: amount × buy price.
    pub fn invested(&self) -> Decimal {
        self.amount.saturating_mul(self.buy_price)
    }
}
