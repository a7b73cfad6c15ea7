//! Data models for positions, wallets, market data, signals and alerts.

mod asset;
mod market;
mod position;
mod signal;
mod wallet;
pub mod wire;

pub use asset::{normalize_asset, ticker_for, KNOWN_ASSETS};
pub use market::{CryptoQuote, MacroData, MarketSnapshot, MetalQuote, Metals, PriceMap, PriceStatus, Sentiment};
pub use position::Position;
pub use signal::{Alert, Signal, SignalAction};
pub use wallet::{
    find_provider, provider_color, ProviderInfo, Wallet, WalletMeta, WalletType,
    DEFAULT_WALLET_COLOR, PROVIDERS,
};
