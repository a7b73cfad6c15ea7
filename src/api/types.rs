//! Request and response types for the SENTIX backend.

use std::collections::BTreeMap;

use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::models::{normalize_asset, wire, Position, Wallet, WalletMeta, WalletType, DEFAULT_WALLET_COLOR};

/// Body of `POST /api/send-alert`.
#[derive(Debug, Clone, Serialize)]
pub struct SendAlertRequest {
    pub email: String,
    pub message: String,
}

/// Response of `POST /api/send-alert`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SendAlertResponse {
    #[serde(default)]
    pub success: bool,

    #[serde(default)]
    pub message: String,

    /// Per-channel delivery status, e.g. `{"telegram": "sent"}`
    #[serde(default)]
    pub delivery: Option<BTreeMap<String, serde_json::Value>>,
}

/// Server-side totals of the multi-wallet payload.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerTotals {
    #[serde(deserialize_with = "wire::decimal_or_zero")]
    pub total_value: Decimal,
    #[serde(deserialize_with = "wire::decimal_or_zero")]
    pub total_invested: Decimal,
    #[serde(rename = "totalPnL", deserialize_with = "wire::decimal_or_zero")]
    pub total_pnl: Decimal,
    pub wallet_count: usize,
    pub position_count: usize,
}

/// One wallet group of the multi-wallet payload.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerWalletGroup {
    #[serde(default, alias = "wallet_id", deserialize_with = "wire::opt_id_string")]
    pub wallet_id: Option<String>,

    #[serde(default, alias = "wallet_name")]
    pub wallet_name: String,

    #[serde(default, alias = "wallet_color")]
    pub wallet_color: Option<String>,

    #[serde(default)]
    pub positions: Vec<Position>,
}

/// `GET /api/portfolio/:userId` in either of its two shapes.
///
/// The shape is chosen by the presence of `byWallet`/`consolidated`, so a
/// malformed multi-wallet payload is an error rather than an empty portfolio.
#[derive(Debug, Clone)]
pub enum PortfolioResponse {
    MultiWallet {
        consolidated: ServerTotals,
        by_wallet: Vec<ServerWalletGroup>,
    },
    Single {
        positions: Vec<Position>,
    },
}

#[derive(Deserialize)]
struct MultiWalletPayload {
    #[serde(default)]
    consolidated: ServerTotals,
    #[serde(rename = "byWallet", default)]
    by_wallet: Vec<ServerWalletGroup>,
}

#[derive(Deserialize)]
struct SinglePayload {
    #[serde(default)]
    positions: Vec<Position>,
}

impl<'de> Deserialize<'de> for PortfolioResponse {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = serde_json::Value::deserialize(deserializer)?;
        if !value.is_object() {
            return Err(de::Error::custom("portfolio payload is not a JSON object"));
        }

        if value.get("byWallet").is_some() || value.get("consolidated").is_some() {
            let payload: MultiWalletPayload = serde_json::from_value(value)
                .map_err(|e| de::Error::custom(format!("invalid multi-wallet portfolio: {}", e)))?;
            Ok(PortfolioResponse::MultiWallet {
                consolidated: payload.consolidated,
                by_wallet: payload.by_wallet,
            })
        } else {
            let payload: SinglePayload = serde_json::from_value(value)
                .map_err(|e| de::Error::custom(format!("invalid portfolio: {}", e)))?;
            Ok(PortfolioResponse::Single {
                positions: payload.positions,
            })
        }
    }
}

/// Positions plus whatever wallet metadata the payload carried.
#[derive(Debug, Clone, Default)]
pub struct Holdings {
    pub positions: Vec<Position>,
    pub wallets: Vec<WalletMeta>,
    /// Totals as computed by the backend, when it sent any
    pub server_totals: Option<ServerTotals>,
}

impl PortfolioResponse {
    /// Flatten into raw positions so valuation is always recomputed locally.
    pub fn into_holdings(self) -> Holdings {
        match self {
            PortfolioResponse::Single { positions } => Holdings {
                positions: positions.into_iter().map(normalized).collect(),
                wallets: Vec::new(),
                server_totals: None,
            },
            PortfolioResponse::MultiWallet { consolidated, by_wallet } => {
                let mut positions = Vec::new();
                let mut wallets = Vec::new();

                for group in by_wallet {
                    if let Some(id) = &group.wallet_id {
                        wallets.push(WalletMeta {
                            id: id.clone(),
                            name: if group.wallet_name.is_empty() {
                                id.clone()
                            } else {
                                group.wallet_name.clone()
                            },
                            color: group
                                .wallet_color
                                .clone()
                                .unwrap_or_else(|| DEFAULT_WALLET_COLOR.to_string()),
                        });
                    }

                    for (index, mut position) in group.positions.into_iter().enumerate() {
                        if position.wallet_id.is_none() {
                            position.wallet_id = group.wallet_id.clone();
                        }
                        if position.id.is_empty() {
                            position.id = format!(
                                "{}-{}",
                                group.wallet_id.as_deref().unwrap_or("unassigned"),
                                index
                            );
                        }
                        positions.push(normalized(position));
                    }
                }

                Holdings {
                    positions,
                    wallets,
                    server_totals: Some(consolidated),
                }
            }
        }
    }
}

fn normalized(mut position: Position) -> Position {
    position.asset = normalize_asset(&position.asset);
    position
}

/// Raw response of `POST /api/portfolio/upload`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UploadResponse {
    #[serde(default)]
    pub message: Option<String>,

    /// Either a count or the list of imported positions
    #[serde(default)]
    pub positions: Option<serde_json::Value>,

    #[serde(default)]
    pub error: Option<String>,

    /// A single message or a list of per-row problems
    #[serde(default)]
    pub details: Option<serde_json::Value>,
}

impl UploadResponse {
    pub fn position_count(&self) -> usize {
        match &self.positions {
            Some(serde_json::Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
            Some(serde_json::Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    pub fn detail_lines(&self) -> Vec<String> {
        match &self.details {
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .map(|v| match v {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                })
                .collect(),
            Some(serde_json::Value::String(s)) => vec![s.clone()],
            Some(serde_json::Value::Null) | None => Vec::new(),
            Some(other) => vec![other.to_string()],
        }
    }
}

/// User-visible result of an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success { message: String, positions: usize },
    Failure { message: String, details: Vec<String> },
}

impl UploadOutcome {
    pub fn from_response(ok: bool, response: UploadResponse) -> Self {
        if ok {
            let positions = response.position_count();
            UploadOutcome::Success {
                message: response
                    .message
                    .unwrap_or_else(|| format!("Successfully uploaded {} positions", positions)),
                positions,
            }
        } else {
            let details = response.detail_lines();
            UploadOutcome::Failure {
                message: response.error.unwrap_or_else(|| "Upload failed".to_string()),
                details,
            }
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WalletsResponse {
    #[serde(default)]
    pub wallets: Vec<Wallet>,
}

/// Body of `POST /api/wallets`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateWalletRequest {
    pub user_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub wallet_type: WalletType,
    pub provider: String,
    pub color: String,
    pub notes: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateWalletResponse {
    #[serde(default)]
    pub wallet: Option<Wallet>,
    #[serde(default)]
    pub error: Option<String>,
}
