//! Asset identifiers and ticker normalization.

/// Canonical asset ids tracked by the backend, with their tickers.
pub const KNOWN_ASSETS: &[(&str, &str)] = &[
    ("bitcoin", "BTC"),
    ("ethereum", "ETH"),
    ("solana", "SOL"),
    ("cardano", "ADA"),
    ("ripple", "XRP"),
    ("polkadot", "DOT"),
    ("dogecoin", "DOGE"),
    ("binancecoin", "BNB"),
    ("avalanche-2", "AVAX"),
    ("chainlink", "LINK"),
];

/// Normalize a user-supplied asset (canonical id or ticker) to the canonical id.
///
/// Unknown assets are trimmed and lowercased so they still match price map keys.
pub fn normalize_asset(input: &str) -> String {
    let trimmed = input.trim();
    KNOWN_ASSETS
        .iter()
        .find(|(id, ticker)| id.eq_ignore_ascii_case(trimmed) || ticker.eq_ignore_ascii_case(trimmed))
        .map(|(id, _)| (*id).to_string())
        .unwrap_or_else(|| trimmed.to_lowercase())
}

/// Ticker for display, falling back to the uppercased id.
pub fn ticker_for(asset: &str) -> String {
    KNOWN_ASSETS
        .iter()
        .find(|(id, _)| id.eq_ignore_ascii_case(asset))
        .map(|(_, ticker)| (*ticker).to_string())
        .unwrap_or_else(|| asset.to_uppercase())
}
