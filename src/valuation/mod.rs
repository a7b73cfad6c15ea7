//! Portfolio valuation shared by every portfolio view.

mod engine;

pub use engine::{
    aggregate, consolidate, consolidate_by_asset, consolidate_by_wallet, value_position,
    AssetSummary, ConsolidatedPortfolio, PortfolioTotals, PositionValuation, WalletSummary,
    UNASSIGNED_WALLET,
};
