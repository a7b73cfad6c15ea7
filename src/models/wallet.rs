//! Wallets: named groupings of positions (exchange accounts, hardware wallets, ...).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::wire;

/// Kind of wallet.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WalletType {
    #[default]
    Exchange,
    Wallet,
    ColdStorage,
    Defi,
    Other,
}

impl WalletType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletType::Exchange => "exchange",
            WalletType::Wallet => "wallet",
            WalletType::ColdStorage => "cold_storage",
            WalletType::Defi => "defi",
            WalletType::Other => "other",
        }
    }
}

impl fmt::Display for WalletType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WalletType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "exchange" => Ok(WalletType::Exchange),
            "wallet" => Ok(WalletType::Wallet),
            "cold_storage" | "cold" => Ok(WalletType::ColdStorage),
            "defi" => Ok(WalletType::Defi),
            "other" => Ok(WalletType::Other),
            other => anyhow::bail!(
                "Unknown wallet type '{}' (expected exchange, wallet, cold_storage, defi, other)",
                other
            ),
        }
    }
}

/// A known wallet provider with its brand color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProviderInfo {
    pub id: &'static str,
    pub label: &'static str,
    pub color: &'static str,
}

pub const DEFAULT_WALLET_COLOR: &str = "#6366f1";

pub const PROVIDERS: &[ProviderInfo] = &[
    ProviderInfo { id: "binance", label: "Binance", color: "#F3BA2F" },
    ProviderInfo { id: "bybit", label: "Bybit", color: "#F7931A" },
    ProviderInfo { id: "coinbase", label: "Coinbase", color: "#0052FF" },
    ProviderInfo { id: "kraken", label: "Kraken", color: "#5741D9" },
    ProviderInfo { id: "okx", label: "OKX", color: "#000000" },
    ProviderInfo { id: "kucoin", label: "KuCoin", color: "#23AF91" },
    ProviderInfo { id: "mercadopago", label: "MercadoPago", color: "#00B1EA" },
    ProviderInfo { id: "skipo", label: "Skipo", color: "#6366f1" },
    ProviderInfo { id: "lemon", label: "Lemon", color: "#FFEB3B" },
    ProviderInfo { id: "ripio", label: "Ripio", color: "#00C896" },
    ProviderInfo { id: "metamask", label: "MetaMask", color: "#F6851B" },
    ProviderInfo { id: "trust_wallet", label: "Trust Wallet", color: "#3375BB" },
    ProviderInfo { id: "ledger", label: "Ledger", color: "#000000" },
    ProviderInfo { id: "trezor", label: "Trezor", color: "#01B757" },
    ProviderInfo { id: "phantom", label: "Phantom", color: "#AB9FF2" },
    ProviderInfo { id: "exodus", label: "Exodus", color: "#0B46F9" },
    ProviderInfo { id: "other", label: "Other", color: "#6366f1" },
];

/// Look up a provider by id (case-insensitive).
pub fn find_provider(id: &str) -> Option<&'static ProviderInfo> {
    PROVIDERS.iter().find(|p| p.id.eq_ignore_ascii_case(id))
}

/// Brand color for a provider, or the default color.
pub fn provider_color(id: &str) -> &'static str {
    find_provider(id).map(|p| p.color).unwrap_or(DEFAULT_WALLET_COLOR)
}

/// Wallet as returned by `/api/wallets/:userId`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    #[serde(deserialize_with = "wire::id_string")]
    pub id: String,

    pub name: String,

    #[serde(rename = "type", default)]
    pub wallet_type: WalletType,

    #[serde(default)]
    pub provider: String,

    #[serde(default)]
    pub color: Option<String>,

    #[serde(default)]
    pub notes: Option<String>,

    /// Number of positions the backend reports for this wallet
    #[serde(default, alias = "positionCount")]
    pub position_count: u32,
}

impl Wallet {
    /// Display color, falling back to the provider's brand color.
    pub fn display_color(&self) -> String {
        self.color
            .clone()
            .filter(|c| !c.is_empty())
            .unwrap_or_else(|| provider_color(&self.provider).to_string())
    }

    /// Provider display name, or the raw provider id when it is not a known one.
    pub fn provider_label(&self) -> String {
        find_provider(&self.provider)
            .map(|p| p.label.to_string())
            .unwrap_or_else(|| self.provider.clone())
    }

    pub fn meta(&self) -> WalletMeta {
        WalletMeta {
            id: self.id.clone(),
            name: self.name.clone(),
            color: self.display_color(),
        }
    }
}

/// Display metadata attached to per-wallet valuation groups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletMeta {
    pub id: String,
    pub name: String,
    pub color: String,
}
