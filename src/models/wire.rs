//! Lenient deserializers for backend payloads.
//!
//! The backend is not consistent about ids (numeric or string) and timestamps
//! (RFC 3339, bare dates, SQL datetimes or epoch milliseconds).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{de, Deserialize, Deserializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawScalar {
    Str(String),
    Int(i64),
    Float(f64),
}

/// Accept either a JSON string or number as an identifier.
pub fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match RawScalar::deserialize(deserializer)? {
        RawScalar::Str(s) => Ok(s),
        RawScalar::Int(i) => Ok(i.to_string()),
        RawScalar::Float(f) => Ok(f.to_string()),
    }
}

/// Optional variant of [`id_string`]; `null` and empty strings map to `None`.
pub fn opt_id_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawScalar> = Option::deserialize(deserializer)?;
    Ok(match raw {
        None => None,
        Some(RawScalar::Str(s)) if s.is_empty() => None,
        Some(RawScalar::Str(s)) => Some(s),
        Some(RawScalar::Int(i)) => Some(i.to_string()),
        Some(RawScalar::Float(f)) => Some(f.to_string()),
    })
}

/// Decimal where `null` reads as zero.
pub fn decimal_or_zero<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Decimal>::deserialize(deserializer)?.unwrap_or_default())
}

/// Float where `null` reads as zero.
pub fn f64_or_zero<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<f64>::deserialize(deserializer)?.unwrap_or_default())
}

/// Parse a timestamp string in any of the shapes the backend emits.
pub fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(Utc.from_utc_datetime(&naive));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|n| Utc.from_utc_datetime(&n));
    }
    None
}

fn from_scalar<E: de::Error>(raw: RawScalar) -> Result<DateTime<Utc>, E> {
    match raw {
        RawScalar::Str(s) => {
            parse_timestamp(&s).ok_or_else(|| E::custom(format!("invalid timestamp: {}", s)))
        }
        RawScalar::Int(ms) => Utc
            .timestamp_millis_opt(ms)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp out of range: {}", ms))),
        RawScalar::Float(ms) => Utc
            .timestamp_millis_opt(ms as i64)
            .single()
            .ok_or_else(|| E::custom(format!("timestamp out of range: {}", ms))),
    }
}

/// Optional flexible timestamp; `null` maps to `None`, garbage is an error.
pub fn opt_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<RawScalar> = Option::deserialize(deserializer)?;
    raw.map(from_scalar).transpose()
}

/// Flexible timestamp that falls back to the current time when absent.
pub fn timestamp_or_now<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(opt_timestamp(deserializer)?.unwrap_or_else(Utc::now))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    #[test]
    fn test_parse_timestamp_shapes() {
        let rfc = parse_timestamp("2024-03-01T12:30:00Z").unwrap();
        assert_eq!(rfc.day(), 1);

        let sql = parse_timestamp("2024-03-01 12:30:00").unwrap();
        assert_eq!(sql, rfc);

        let date = parse_timestamp("2024-03-01").unwrap();
        assert_eq!(date.month(), 3);

        assert!(parse_timestamp("yesterday").is_none());
    }

    #[test]
    fn test_id_from_number() {
        #[derive(Deserialize)]
        struct Row {
            #[serde(deserialize_with = "id_string")]
            id: String,
        }

        let row: Row = serde_json::from_str(r#"{"id": 1718000000000}"#).unwrap();
        assert_eq!(row.id, "1718000000000");

        let row: Row = serde_json::from_str(r#"{"id": "abc"}"#).unwrap();
        assert_eq!(row.id, "abc");
    }

    #[test]
    fn test_null_numbers_read_as_zero() {
        #[derive(Deserialize)]
        struct Quote {
            #[serde(default, deserialize_with = "decimal_or_zero")]
            price: Decimal,
            #[serde(default, deserialize_with = "f64_or_zero")]
            change: f64,
        }

        let q: Quote = serde_json::from_str(r#"{"price": null, "change": null}"#).unwrap();
        assert_eq!(q.price, Decimal::ZERO);
        assert_eq!(q.change, 0.0);

        let q: Quote = serde_json::from_str(r#"{"price": "12.5", "change": 1.5}"#).unwrap();
        assert_eq!(q.price, Decimal::new(125, 1));
        assert_eq!(q.change, 1.5);

        let q: Quote = serde_json::from_str("{}").unwrap();
        assert_eq!(q.price, Decimal::ZERO);
    }
}
