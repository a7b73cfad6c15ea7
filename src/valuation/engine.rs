//! Portfolio valuation: per-position figures, aggregates, and consolidated views.
//!
//! Every function here is a pure function of `(positions, prices)`. Missing
//! prices value at zero and are reported through [`PriceStatus`]; no input
//! makes these functions fail or divide by zero.

use std::collections::{BTreeMap, HashMap, HashSet};

use rust_decimal::Decimal;
use serde::Serialize;

use crate::models::{Position, PriceMap, PriceStatus, WalletMeta, DEFAULT_WALLET_COLOR};

pub const UNASSIGNED_WALLET: &str = "Unassigned";

/// Valuation of a single position against a price snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionValuation {
    pub position_id: String,
    pub asset: String,
    pub wallet_id: Option<String>,
    pub amount: Decimal,
    pub buy_price: Decimal,
    pub current_price: Decimal,
    pub price_status: PriceStatus,
    pub invested: Decimal,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
}

/// Totals over a set of positions.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioTotals {
    pub total_invested: Decimal,
    pub total_value: Decimal,
    #[serde(rename = "totalPnL")]
    pub total_pnl: Decimal,
    #[serde(rename = "totalPnLPercent")]
    pub total_pnl_percent: Decimal,
    pub position_count: usize,
}

/// Positions in one asset, merged across wallets.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetSummary {
    pub asset: String,
    pub total_amount: Decimal,
    /// Quantity-weighted average cost
    pub avg_buy_price: Decimal,
    pub current_price: Decimal,
    pub price_status: PriceStatus,
    pub current_value: Decimal,
    pub pnl: Decimal,
    pub pnl_percent: Decimal,
    /// Distinct wallets holding this asset
    pub wallet_count: usize,
}

/// One wallet's positions with their aggregate.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletSummary {
    pub wallet_id: Option<String>,
    pub wallet_name: String,
    pub wallet_color: String,
    #[serde(flatten)]
    pub totals: PortfolioTotals,
    pub positions: Vec<PositionValuation>,
}

/// Portfolio-wide totals plus the per-asset breakdown.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsolidatedPortfolio {
    #[serde(flatten)]
    pub totals: PortfolioTotals,
    pub wallet_count: usize,
    pub by_asset: Vec<AssetSummary>,
}

/// `numerator / denominator × 100`, or zero when the denominator is not positive.
fn percent_of(numerator: Decimal, denominator: Decimal) -> Decimal {
    if denominator > Decimal::ZERO {
        numerator
            .checked_div(denominator)
            .map(|ratio| ratio.saturating_mul(Decimal::ONE_HUNDRED))
            .unwrap_or(Decimal::ZERO)
    } else {
        Decimal::ZERO
    }
}

/// Value one position.
pub fn value_position(position: &Position, prices: &PriceMap) -> PositionValuation {
    let (current_price, price_status) = prices.lookup(&position.asset);
    let invested = position.invested();
    let current_value = position.amount.saturating_mul(current_price);

    PositionValuation {
        position_id: position.id.clone(),
        asset: position.asset.clone(),
        wallet_id: position.wallet_id.clone(),
        amount: position.amount,
        buy_price: position.buy_price,
        current_price,
        price_status,
        invested,
        current_value,
        pnl: current_value.saturating_sub(invested),
        pnl_percent: percent_of(current_price.saturating_sub(position.buy_price), position.buy_price),
    }
}

fn totals_from(invested: Decimal, value: Decimal, position_count: usize) -> PortfolioTotals {
    let total_pnl = value.saturating_sub(invested);
    PortfolioTotals {
        total_invested: invested,
        total_value: value,
        total_pnl,
        total_pnl_percent: percent_of(total_pnl, invested),
        position_count,
    }
}

/// Aggregate totals over a list of positions.
///
/// Repeated assets are valued independently and summed.
pub fn aggregate(positions: &[Position], prices: &PriceMap) -> PortfolioTotals {
    let (invested, value) = positions.iter().fold(
        (Decimal::ZERO, Decimal::ZERO),
        |(invested, value), p| {
            let v = value_position(p, prices);
            (invested.saturating_add(v.invested), value.saturating_add(v.current_value))
        },
    );
    totals_from(invested, value, positions.len())
}

/// Group positions by asset across all wallets.
///
/// Output is sorted by current value (descending), then asset id.
pub fn consolidate_by_asset(positions: &[Position], prices: &PriceMap) -> Vec<AssetSummary> {
    #[derive(Default)]
    struct Group<'a> {
        amount: Decimal,
        invested: Decimal,
        wallets: HashSet<Option<&'a str>>,
    }

    let mut groups: BTreeMap<String, Group> = BTreeMap::new();
    for p in positions {
        let group = groups.entry(p.asset.to_lowercase()).or_default();
        group.amount = group.amount.saturating_add(p.amount);
        group.invested = group.invested.saturating_add(p.invested());
        group.wallets.insert(p.wallet_id.as_deref());
    }

    let mut summaries: Vec<AssetSummary> = groups
        .into_iter()
        .map(|(asset, g)| {
            let (current_price, price_status) = prices.lookup(&asset);
            let avg_buy_price = if g.amount > Decimal::ZERO {
                g.invested.checked_div(g.amount).unwrap_or(Decimal::ZERO)
            } else {
                Decimal::ZERO
            };
            let current_value = g.amount.saturating_mul(current_price);

            AssetSummary {
                asset,
                total_amount: g.amount,
                avg_buy_price,
                current_price,
                price_status,
                current_value,
                pnl: current_value.saturating_sub(g.invested),
                pnl_percent: percent_of(current_price.saturating_sub(avg_buy_price), avg_buy_price),
                wallet_count: g.wallets.len(),
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.current_value
            .cmp(&a.current_value)
            .then_with(|| a.asset.cmp(&b.asset))
    });
    summaries
}

/// Group positions by wallet and aggregate within each group.
///
/// `wallets` supplies display metadata; unknown ids use the id as name.
/// Positions without a wallet form an "Unassigned" group. Output is sorted by
/// total value (descending), then wallet id.
pub fn consolidate_by_wallet(
    positions: &[Position],
    prices: &PriceMap,
    wallets: &[WalletMeta],
) -> Vec<WalletSummary> {
    let meta: HashMap<&str, &WalletMeta> = wallets.iter().map(|w| (w.id.as_str(), w)).collect();

    let mut groups: BTreeMap<Option<&str>, Vec<&Position>> = BTreeMap::new();
    for p in positions {
        groups.entry(p.wallet_id.as_deref()).or_default().push(p);
    }

    let mut summaries: Vec<WalletSummary> = groups
        .into_iter()
        .map(|(wallet_id, members)| {
            let valuations: Vec<PositionValuation> =
                members.iter().map(|p| value_position(p, prices)).collect();
            let invested = valuations
                .iter()
                .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v.invested));
            let value = valuations
                .iter()
                .fold(Decimal::ZERO, |acc, v| acc.saturating_add(v.current_value));

            let (wallet_name, wallet_color) = match wallet_id.and_then(|id| meta.get(id)) {
                Some(m) => (m.name.clone(), m.color.clone()),
                None => (
                    wallet_id.unwrap_or(UNASSIGNED_WALLET).to_string(),
                    DEFAULT_WALLET_COLOR.to_string(),
                ),
            };

            WalletSummary {
                wallet_id: wallet_id.map(str::to_string),
                wallet_name,
                wallet_color,
                totals: totals_from(invested, value, valuations.len()),
                positions: valuations,
            }
        })
        .collect();

    summaries.sort_by(|a, b| {
        b.totals
            .total_value
            .cmp(&a.totals.total_value)
            .then_with(|| a.wallet_id.cmp(&b.wallet_id))
    });
    summaries
}

/// Consolidated view: totals, distinct wallet count, and per-asset breakdown.
pub fn consolidate(positions: &[Position], prices: &PriceMap) -> ConsolidatedPortfolio {
    let wallet_count = positions
        .iter()
        .map(|p| p.wallet_id.as_deref())
        .collect::<HashSet<_>>()
        .len();

    ConsolidatedPortfolio {
        totals: aggregate(positions, prices),
        wallet_count,
        by_asset: consolidate_by_asset(positions, prices),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn position(id: &str, asset: &str, amount: Decimal, buy_price: Decimal, wallet: Option<&str>) -> Position {
        Position {
            id: id.to_string(),
            asset: asset.to_string(),
            amount,
            buy_price,
            purchase_date: Utc::now(),
            wallet_id: wallet.map(str::to_string),
            notes: None,
            transaction_id: None,
        }
    }

    fn prices() -> PriceMap {
        PriceMap::from_prices([
            ("bitcoin", dec!(65000)),
            ("ethereum", dec!(3000)),
            ("solana", dec!(150)),
        ])
    }

    #[test]
    fn test_value_position_example() {
        let pos = position("1", "bitcoin", dec!(0.5), dec!(60000), None);
        let v = value_position(&pos, &prices());

        assert_eq!(v.current_value, dec!(32500));
        assert_eq!(v.pnl, dec!(2500));
        assert!((v.pnl_percent - dec!(8.3333)).abs() < dec!(0.0001));
        assert_eq!(v.price_status, PriceStatus::Known);
    }

    #[test]
    fn test_zero_buy_price_has_zero_percent() {
        for price in [dec!(0), dec!(1), dec!(65000)] {
            let map = PriceMap::from_prices([("airdrop", price)]);
            let pos = position("1", "airdrop", dec!(100), dec!(0), None);
            let v = value_position(&pos, &map);
            assert_eq!(v.pnl_percent, Decimal::ZERO);
            assert_eq!(v.pnl, dec!(100) * price);
        }
    }

    #[test]
    fn test_missing_price_values_at_zero() {
        let pos = position("1", "cardano", dec!(1000), dec!(0.45), None);
        let v = value_position(&pos, &prices());

        assert_eq!(v.current_value, Decimal::ZERO);
        assert_eq!(v.pnl, dec!(-450));
        assert_eq!(v.pnl_percent, dec!(-100));
        assert_eq!(v.price_status, PriceStatus::Unavailable);
    }

    #[test]
    fn test_stale_prices_are_flagged() {
        let mut map = prices();
        map.mark_stale();
        let v = value_position(&position("1", "bitcoin", dec!(1), dec!(1), None), &map);
        assert_eq!(v.price_status, PriceStatus::Stale);
        assert_eq!(v.current_price, dec!(65000));
    }

    #[test]
    fn test_aggregate_empty() {
        let totals = aggregate(&[], &prices());
        assert_eq!(totals, PortfolioTotals::default());
        assert_eq!(totals.total_pnl_percent, Decimal::ZERO);
    }

    #[test]
    fn test_aggregate_totals() {
        let positions = vec![
            position("1", "bitcoin", dec!(0.5), dec!(60000), None),
            position("2", "ethereum", dec!(2), dec!(2500), None),
            position("3", "bitcoin", dec!(0.1), dec!(70000), None),
        ];
        let totals = aggregate(&positions, &prices());

        // invested: 30000 + 5000 + 7000; value: 32500 + 6000 + 6500
        assert_eq!(totals.total_invested, dec!(42000));
        assert_eq!(totals.total_value, dec!(45000));
        assert_eq!(totals.total_pnl, dec!(3000));
        assert!((totals.total_pnl_percent - dec!(7.142857)).abs() < dec!(0.00001));
        assert_eq!(totals.position_count, 3);
    }

    #[test]
    fn test_aggregate_is_order_independent() {
        let mut positions = vec![
            position("1", "bitcoin", dec!(0.123), dec!(61234.56), Some("a")),
            position("2", "ethereum", dec!(3.3), dec!(2999.99), Some("b")),
            position("3", "solana", dec!(17), dec!(141.7), None),
            position("4", "cardano", dec!(500), dec!(0.31), Some("a")),
            position("5", "bitcoin", dec!(0.01), dec!(0), Some("c")),
        ];
        let map = prices();
        let expected = aggregate(&positions, &map);

        positions.reverse();
        assert_eq!(aggregate(&positions, &map), expected);

        positions.rotate_left(2);
        assert_eq!(aggregate(&positions, &map), expected);

        positions.swap(0, 3);
        assert_eq!(aggregate(&positions, &map), expected);
    }

    #[test]
    fn test_consolidate_by_asset_weighted_average() {
        let positions = vec![
            position("1", "bitcoin", dec!(0.5), dec!(60000), Some("binance")),
            position("2", "bitcoin", dec!(0.5), dec!(70000), Some("ledger")),
        ];
        let by_asset = consolidate_by_asset(&positions, &prices());

        assert_eq!(by_asset.len(), 1);
        let btc = &by_asset[0];
        assert_eq!(btc.total_amount, dec!(1));
        assert_eq!(btc.avg_buy_price, dec!(65000));
        assert_eq!(btc.current_value, dec!(65000));
        assert_eq!(btc.pnl, Decimal::ZERO);
        assert_eq!(btc.pnl_percent, Decimal::ZERO);
        assert_eq!(btc.wallet_count, 2);
    }

    #[test]
    fn test_consolidate_disjoint_wallets() {
        let positions = vec![
            position("1", "bitcoin", dec!(0.2), dec!(50000), Some("w1")),
            position("2", "ethereum", dec!(1), dec!(2000), Some("w2")),
            position("3", "solana", dec!(10), dec!(100), Some("w3")),
        ];

        let by_asset = consolidate_by_asset(&positions, &prices());
        assert_eq!(by_asset.len(), 3);
        assert!(by_asset.iter().all(|a| a.wallet_count == 1));

        let consolidated = consolidate(&positions, &prices());
        assert_eq!(consolidated.wallet_count, 3);
        assert_eq!(consolidated.totals.position_count, 3);
    }

    #[test]
    fn test_consolidate_by_asset_sorted_by_value() {
        let positions = vec![
            position("1", "solana", dec!(1), dec!(100), None),
            position("2", "bitcoin", dec!(1), dec!(50000), None),
            position("3", "ethereum", dec!(1), dec!(2000), None),
        ];
        let assets: Vec<_> = consolidate_by_asset(&positions, &prices())
            .into_iter()
            .map(|a| a.asset)
            .collect();
        assert_eq!(assets, vec!["bitcoin", "ethereum", "solana"]);
    }

    #[test]
    fn test_consolidate_by_asset_zero_amount_guard() {
        // Violates the amount > 0 invariant; must still not divide by zero.
        let positions = vec![position("1", "bitcoin", dec!(0), dec!(60000), None)];
        let by_asset = consolidate_by_asset(&positions, &prices());
        assert_eq!(by_asset[0].avg_buy_price, Decimal::ZERO);
        assert_eq!(by_asset[0].pnl_percent, Decimal::ZERO);
    }

    #[test]
    fn test_consolidate_by_wallet_attaches_meta() {
        let positions = vec![
            position("1", "bitcoin", dec!(0.5), dec!(60000), Some("w1")),
            position("2", "ethereum", dec!(2), dec!(2500), Some("w1")),
            position("3", "solana", dec!(10), dec!(100), Some("w2")),
            position("4", "solana", dec!(1), dec!(100), None),
        ];
        let wallets = vec![WalletMeta {
            id: "w1".to_string(),
            name: "Binance".to_string(),
            color: "#F3BA2F".to_string(),
        }];

        let groups = consolidate_by_wallet(&positions, &prices(), &wallets);
        assert_eq!(groups.len(), 3);

        let w1 = &groups[0];
        assert_eq!(w1.wallet_name, "Binance");
        assert_eq!(w1.wallet_color, "#F3BA2F");
        assert_eq!(w1.totals.total_invested, dec!(35000));
        assert_eq!(w1.totals.total_value, dec!(38500));
        assert_eq!(w1.totals.total_pnl, dec!(3500));
        assert_eq!(w1.positions.len(), 2);

        let w2 = &groups[1];
        assert_eq!(w2.wallet_name, "w2");
        assert_eq!(w2.wallet_color, DEFAULT_WALLET_COLOR);

        let unassigned = &groups[2];
        assert_eq!(unassigned.wallet_id, None);
        assert_eq!(unassigned.wallet_name, UNASSIGNED_WALLET);
        assert_eq!(unassigned.totals.position_count, 1);
    }

    #[test]
    fn test_wallet_totals_sum_to_portfolio_totals() {
        let positions = vec![
            position("1", "bitcoin", dec!(0.3), dec!(58000), Some("w1")),
            position("2", "ethereum", dec!(4), dec!(3100), Some("w2")),
            position("3", "cardano", dec!(800), dec!(0.5), Some("w2")),
        ];
        let map = prices();

        let groups = consolidate_by_wallet(&positions, &map, &[]);
        let total = aggregate(&positions, &map);

        let summed: Decimal = groups.iter().map(|g| g.totals.total_pnl).sum();
        assert_eq!(summed, total.total_pnl);
    }

    #[test]
    fn test_extreme_values_saturate_instead_of_panicking() {
        let huge = PriceMap::from_prices([("bitcoin", Decimal::MAX)]);
        let positions = vec![
            position("1", "bitcoin", Decimal::MAX, dec!(2), Some("w1")),
            position("2", "bitcoin", Decimal::MAX, dec!(3), Some("w2")),
        ];

        let v = value_position(&positions[0], &huge);
        assert_eq!(v.current_value, Decimal::MAX);
        assert_eq!(v.invested, Decimal::MAX);

        let totals = aggregate(&positions, &huge);
        assert_eq!(totals.total_value, Decimal::MAX);
        assert_eq!(totals.position_count, 2);

        let by_asset = consolidate_by_asset(&positions, &huge);
        assert_eq!(by_asset.len(), 1);
        assert_eq!(by_asset[0].total_amount, Decimal::MAX);

        let by_wallet = consolidate_by_wallet(&positions, &huge, &[]);
        assert_eq!(by_wallet.len(), 2);
    }
}
