//! Display formatting for prices, totals and percentages.

use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;

const UNITS: &[(Decimal, &str)] = &[
    (dec!(1000000000000), "T"),
    (dec!(1000000000), "B"),
    (dec!(1000000), "M"),
    (dec!(1000), "K"),
];

fn round(value: Decimal, dp: u32) -> Decimal {
    value.round_dp_with_strategy(dp, RoundingStrategy::MidpointAwayFromZero)
}

/// Format an absolute value with `dp` decimals and thousands separators.
fn grouped(value: Decimal, dp: u32) -> String {
    let fixed = format!("{:.*}", dp as usize, round(value.abs(), dp));
    let (int_part, frac_part) = match fixed.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (fixed, None),
    };

    let mut out = String::with_capacity(int_part.len() + int_part.len() / 3 + dp as usize + 1);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if let Some(frac) = frac_part {
        out.push('.');
        out.push_str(&frac);
    }
    out
}

fn sign(value: Decimal) -> &'static str {
    if value.is_sign_negative() && !value.is_zero() {
        "-"
    } else {
        ""
    }
}

/// Spot price: 2 decimals at or above $1, 4 decimals below.
pub fn format_price(price: Decimal) -> String {
    if price.is_zero() {
        return "$0".to_string();
    }
    let dp = if price.abs() >= Decimal::ONE { 2 } else { 4 };
    format!("{}${}", sign(price), grouped(price, dp))
}

/// Totals truncated to K/M/B/T units, e.g. `$2.45T`.
pub fn format_large_number(value: Decimal) -> String {
    if value.is_zero() {
        return "$0".to_string();
    }
    let abs = value.abs();
    let tier = UNITS.iter().position(|(unit, _)| abs >= *unit);
    let (mut scaled, mut suffix) = scale(abs, tier);

    // 999.996 rounds to 1000.00, which belongs to the next unit up.
    if scaled >= dec!(1000) {
        let promoted = match tier {
            Some(0) => None,
            Some(i) => Some(i - 1),
            None => UNITS.len().checked_sub(1),
        };
        if promoted.is_some() {
            (scaled, suffix) = scale(abs, promoted);
        }
    }

    format!("{}${}{}", sign(value), grouped(scaled, 2), suffix)
}

/// `abs` expressed in `UNITS[tier]` (or plain dollars), rounded to cents.
fn scale(abs: Decimal, tier: Option<usize>) -> (Decimal, &'static str) {
    match tier.and_then(|i| UNITS.get(i)) {
        Some((unit, suffix)) => (round(abs / *unit, 2), *suffix),
        None => (round(abs, 2), ""),
    }
}

/// USD amount with two decimals and separators, e.g. `-$1,234.50`.
pub fn format_currency(value: Decimal) -> String {
    format!("{}${}", sign(round(value, 2)), grouped(value, 2))
}

/// Signed percentage, e.g. `+8.33%`.
pub fn format_percent(value: Decimal) -> String {
    let rounded = round(value, 2);
    let prefix = if rounded.is_sign_negative() && !rounded.is_zero() { "-" } else { "+" };
    format!("{}{}%", prefix, grouped(rounded, 2))
}

/// Asset quantity with four decimals.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.4}", round(value, 4))
}

/// Parse any of the formatted strings above back into a number.
pub fn parse_display_value(s: &str) -> Option<Decimal> {
    let cleaned: String = s
        .trim()
        .chars()
        .filter(|c| !matches!(c, '$' | ',' | '%' | '+' | ' '))
        .collect();
    if cleaned.is_empty() {
        return None;
    }

    let (number, multiplier) = match cleaned.chars().last() {
        Some(suffix) if suffix.is_ascii_alphabetic() => {
            let unit = UNITS
                .iter()
                .find(|(_, u)| u.eq_ignore_ascii_case(&suffix.to_string()))?
                .0;
            (&cleaned[..cleaned.len() - 1], unit)
        }
        _ => (cleaned.as_str(), Decimal::ONE),
    };

    Decimal::from_str(number).ok().map(|n| n * multiplier)
}

/// Truncate a string with ellipsis if too long.
pub fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
