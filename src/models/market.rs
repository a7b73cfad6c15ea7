//! Market snapshot from `/api/market` and the price map derived from it.

use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::wire;

/// Spot quote for a single crypto asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CryptoQuote {
    #[serde(default, deserialize_with = "wire::decimal_or_zero")]
    pub price: Decimal,

    /// 24h change in percent
    #[serde(default, alias = "change_24h", deserialize_with = "wire::f64_or_zero")]
    pub change_24h: f64,
}

/// Macro indicators shown alongside crypto prices.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MacroData {
    /// Fear & Greed index (0-100), ingested as opaque data
    #[serde(default)]
    pub fear_greed: Option<f64>,

    #[serde(default)]
    pub fear_label: Option<String>,

    /// Bitcoin dominance in percent
    #[serde(default)]
    pub btc_dom: Option<f64>,

    /// Global crypto market cap in USD
    #[serde(default)]
    pub global_mcap: Option<Decimal>,
}

impl MacroData {
    pub fn sentiment(&self) -> Option<Sentiment> {
        self.fear_greed.map(Sentiment::from_index)
    }
}

/// Coarse reading of the Fear & Greed index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sentiment {
    Fear,
    Neutral,
    Greed,
}

impl Sentiment {
    pub fn from_index(index: f64) -> Self {
        if index < 30.0 {
            Sentiment::Fear
        } else if index > 70.0 {
            Sentiment::Greed
        } else {
            Sentiment::Neutral
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetalQuote {
    #[serde(default, deserialize_with = "wire::decimal_or_zero")]
    pub price: Decimal,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metals {
    #[serde(default)]
    pub gold: Option<MetalQuote>,
    #[serde(default)]
    pub silver: Option<MetalQuote>,
}

/// Full market payload.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub crypto: BTreeMap<String, CryptoQuote>,

    #[serde(rename = "macro", default)]
    pub macro_data: MacroData,

    #[serde(default)]
    pub metals: Metals,
}

impl MarketSnapshot {
    /// Build the price map used by the valuation engine.
    pub fn price_map(&self) -> PriceMap {
        PriceMap::from_prices(self.crypto.iter().map(|(id, q)| (id.as_str(), q.price)))
    }

    /// Assets with the largest 24h gain, best first.
    pub fn top_gainers(&self, n: usize) -> Vec<(&str, &CryptoQuote)> {
        self.sorted_by_change(true).into_iter().take(n).collect()
    }

    /// Assets with the largest 24h loss, worst first.
    pub fn top_losers(&self, n: usize) -> Vec<(&str, &CryptoQuote)> {
        self.sorted_by_change(false).into_iter().take(n).collect()
    }

    /// Entries ordered by 24h change; ties always fall back to ascending id.
    fn sorted_by_change(&self, descending: bool) -> Vec<(&str, &CryptoQuote)> {
        let mut entries: Vec<_> = self.crypto.iter().map(|(k, v)| (k.as_str(), v)).collect();
        entries.sort_by(|a, b| {
            let by_change = a.1.change_24h.total_cmp(&b.1.change_24h);
            let by_change = if descending { by_change.reverse() } else { by_change };
            by_change.then_with(|| a.0.cmp(b.0))
        });
        entries
    }
}

/// How a price was obtained for valuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceStatus {
    /// Present in a fresh snapshot
    Known,
    /// Present, but the last refresh failed and this is the previous snapshot
    Stale,
    /// Missing from the snapshot; valued at zero
    Unavailable,
}

/// Read-only snapshot of asset id -> spot price.
///
/// Keys are lowercase. Missing assets price at zero with
/// [`PriceStatus::Unavailable`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceMap {
    prices: HashMap<String, Decimal>,
    stale: bool,
}

impl PriceMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_prices<'a, I>(prices: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, Decimal)>,
    {
        Self {
            prices: prices
                .into_iter()
                .map(|(id, price)| (id.to_lowercase(), price))
                .collect(),
            stale: false,
        }
    }

    /// Price and status for an asset; absent assets yield zero.
    pub fn lookup(&self, asset: &str) -> (Decimal, PriceStatus) {
        match self.prices.get(&asset.to_lowercase()) {
            Some(price) if self.stale => (*price, PriceStatus::Stale),
            Some(price) => (*price, PriceStatus::Known),
            None => (Decimal::ZERO, PriceStatus::Unavailable),
        }
    }

    pub fn mark_stale(&mut self) {
        self.stale = true;
    }

    pub fn is_stale(&self) -> bool {
        self.stale
    }

    pub fn len(&self) -> usize {
        self.prices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    const MARKET_JSON: &str = r#"{
        "crypto": {
            "bitcoin": {"price": 65000, "change24h": 2.5},
            "ethereum": {"price": 3200.5, "change24h": -1.2},
            "solana": {"price": 150, "change24h": 7.8},
            "dogecoin": {"price": 0.1234, "change24h": -4.0}
        },
        "macro": {"fearGreed": 72, "fearLabel": "Greed", "btcDom": 54.3, "globalMcap": 2450000000000},
        "metals": {"gold": {"price": 2350.1}, "silver": {"price": 29.4}}
    }"#;

    #[test]
    fn test_parse_market() {
        let market: MarketSnapshot = serde_json::from_str(MARKET_JSON).unwrap();
        assert_eq!(market.crypto.len(), 4);
        assert_eq!(market.crypto["bitcoin"].price, dec!(65000));
        assert_eq!(market.macro_data.sentiment(), Some(Sentiment::Greed));
        assert_eq!(market.metals.gold.as_ref().unwrap().price, dec!(2350.1));
    }

    #[test]
    fn test_null_quote_fields_default_to_zero() {
        let json = r#"{
            "crypto": {
                "bitcoin": {"price": 65000, "change24h": 2.5},
                "newcoin": {"price": null, "change24h": null}
            },
            "metals": {"gold": {"price": null}}
        }"#;

        let market: MarketSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(market.crypto["newcoin"].price, Decimal::ZERO);
        assert_eq!(market.crypto["newcoin"].change_24h, 0.0);
        assert_eq!(market.metals.gold.as_ref().unwrap().price, Decimal::ZERO);

        let prices = market.price_map();
        assert_eq!(prices.lookup("bitcoin"), (dec!(65000), PriceStatus::Known));
        assert_eq!(prices.lookup("newcoin").0, Decimal::ZERO);
    }

    #[test]
    fn test_top_gainers_and_losers() {
        let market: MarketSnapshot = serde_json::from_str(MARKET_JSON).unwrap();

        let gainers: Vec<_> = market.top_gainers(3).into_iter().map(|(id, _)| id).collect();
        assert_eq!(gainers, vec!["solana", "bitcoin", "ethereum"]);

        let losers: Vec<_> = market.top_losers(2).into_iter().map(|(id, _)| id).collect();
        assert_eq!(losers, vec!["dogecoin", "ethereum"]);
    }

    #[test]
    fn test_movers_ties_ordered_by_id() {
        let json = r#"{"crypto": {
            "solana": {"price": 150, "change24h": 3.0},
            "cardano": {"price": 0.5, "change24h": 3.0},
            "ripple": {"price": 0.6, "change24h": -2.0},
            "polkadot": {"price": 7, "change24h": -2.0}
        }}"#;
        let market: MarketSnapshot = serde_json::from_str(json).unwrap();

        let gainers: Vec<_> = market.top_gainers(2).into_iter().map(|(id, _)| id).collect();
        assert_eq!(gainers, vec!["cardano", "solana"]);

        let losers: Vec<_> = market.top_losers(2).into_iter().map(|(id, _)| id).collect();
        assert_eq!(losers, vec!["polkadot", "ripple"]);
    }

    #[test]
    fn test_price_map_lookup() {
        let market: MarketSnapshot = serde_json::from_str(MARKET_JSON).unwrap();
        let mut prices = market.price_map();

        assert_eq!(prices.lookup("Bitcoin"), (dec!(65000), PriceStatus::Known));
        assert_eq!(prices.lookup("cardano"), (Decimal::ZERO, PriceStatus::Unavailable));

        prices.mark_stale();
        assert_eq!(prices.lookup("bitcoin"), (dec!(65000), PriceStatus::Stale));
        assert_eq!(prices.lookup("cardano").1, PriceStatus::Unavailable);
    }

    #[test]
    fn test_sentiment_buckets() {
        assert_eq!(Sentiment::from_index(12.0), Sentiment::Fear);
        assert_eq!(Sentiment::from_index(50.0), Sentiment::Neutral);
        assert_eq!(Sentiment::from_index(70.0), Sentiment::Neutral);
        assert_eq!(Sentiment::from_index(71.0), Sentiment::Greed);
    }
}
