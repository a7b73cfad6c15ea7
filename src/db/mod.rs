//! Local persistence for portfolio entries and alert settings.
//!
//! Everything is keyed by user id so several users can share one file.
//! Decimals are stored as TEXT to keep them exact.

use std::str::FromStr;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use tracing::debug;

use crate::alerts::AlertConfig;
use crate::models::{wire, Position};

/// Database connection pool.
pub struct Database {
    pool: SqlitePool,
}

/// Stored position row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StoredPosition {
    pub id: String,
    pub user_id: String,
    pub wallet_id: Option<String>,
    pub asset: String,
    pub amount: String,
    pub buy_price: String,
    pub purchase_date: String,
    pub notes: Option<String>,
    pub transaction_id: Option<String>,
    pub created_at: String,
}

impl TryFrom<StoredPosition> for Position {
    type Error = anyhow::Error;

    fn try_from(row: StoredPosition) -> Result<Self> {
        let amount = Decimal::from_str(&row.amount)
            .with_context(|| format!("Invalid amount '{}' for position {}", row.amount, row.id))?;
        let buy_price = Decimal::from_str(&row.buy_price).with_context(|| {
            format!("Invalid buy price '{}' for position {}", row.buy_price, row.id)
        })?;
        let purchase_date = wire::parse_timestamp(&row.purchase_date)
            .with_context(|| format!("Invalid purchase date '{}'", row.purchase_date))?;

        Ok(Position {
            id: row.id,
            asset: row.asset,
            amount,
            buy_price,
            purchase_date,
            wallet_id: row.wallet_id,
            notes: row.notes,
            transaction_id: row.transaction_id,
        })
    }
}

#[derive(Debug, Clone, sqlx::FromRow)]
struct StoredAlertConfig {
    email: String,
    telegram_enabled: bool,
    min_confidence: i64,
}

impl Database {
    /// Create a new database connection.
    pub async fn new(database_url: &str) -> Result<Self> {
        // Each in-memory connection is its own database.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        let db = Self { pool };
        db.run_migrations().await?;

        Ok(db)
    }

    async fn run_migrations(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS positions (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                wallet_id TEXT,
                asset TEXT NOT NULL,
                amount TEXT NOT NULL,
                buy_price TEXT NOT NULL,
                purchase_date TEXT NOT NULL,
                notes TEXT,
                transaction_id TEXT,
                created_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS alert_configs (
                user_id TEXT PRIMARY KEY,
                email TEXT NOT NULL DEFAULT '',
                telegram_enabled INTEGER NOT NULL DEFAULT 0,
                min_confidence INTEGER NOT NULL DEFAULT 75,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_positions_user ON positions(user_id, wallet_id)")
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    // ==================== Positions ====================

    /// Persist a new position for a user.
    pub async fn add_position(&self, user_id: &str, position: &Position) -> Result<()> {
        if position.amount <= Decimal::ZERO {
            bail!("Amount must be greater than zero");
        }
        if position.buy_price < Decimal::ZERO {
            bail!("Buy price cannot be negative");
        }

        sqlx::query(
            r#"
            INSERT INTO positions
                (id, user_id, wallet_id, asset, amount, buy_price, purchase_date, notes, transaction_id)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&position.id)
        .bind(user_id)
        .bind(&position.wallet_id)
        .bind(&position.asset)
        .bind(position.amount.to_string())
        .bind(position.buy_price.to_string())
        .bind(position.purchase_date.to_rfc3339())
        .bind(&position.notes)
        .bind(&position.transaction_id)
        .execute(&self.pool)
        .await
        .context("Failed to save position")?;

        debug!(id = %position.id, asset = %position.asset, "Position saved");
        Ok(())
    }

    /// Delete a position. Returns false when no such position exists.
    pub async fn remove_position(&self, user_id: &str, id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM positions WHERE user_id = ? AND id = ?")
            .bind(user_id)
            .bind(id)
            .execute(&self.pool)
            .await
            .context("Failed to remove position")?;

        Ok(result.rows_affected() > 0)
    }

    /// A user's positions, oldest first, optionally limited to one wallet.
    pub async fn get_positions(&self, user_id: &str, wallet_id: Option<&str>) -> Result<Vec<Position>> {
        let rows = match wallet_id {
            Some(wallet) => {
                sqlx::query_as::<_, StoredPosition>(
                    "SELECT * FROM positions WHERE user_id = ? AND wallet_id = ? ORDER BY purchase_date, id",
                )
                .bind(user_id)
                .bind(wallet)
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as::<_, StoredPosition>(
                    "SELECT * FROM positions WHERE user_id = ? ORDER BY purchase_date, id",
                )
                .bind(user_id)
                .fetch_all(&self.pool)
                .await
            }
        }
        .context("Failed to fetch positions")?;

        rows.into_iter().map(Position::try_from).collect()
    }

    // ==================== Alert Settings ====================

    /// Stored alert settings, or the defaults when none were saved.
    pub async fn get_alert_config(&self, user_id: &str) -> Result<AlertConfig> {
        let row = sqlx::query_as::<_, StoredAlertConfig>(
            "SELECT email, telegram_enabled, min_confidence FROM alert_configs WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch alert config")?;

        Ok(match row {
            Some(r) => AlertConfig {
                email: r.email,
                telegram_enabled: r.telegram_enabled,
                min_confidence: r.min_confidence.clamp(0, 100) as u8,
            },
            None => AlertConfig::default(),
        })
    }

    /// Insert or replace a user's alert settings.
    pub async fn save_alert_config(&self, user_id: &str, config: &AlertConfig) -> Result<()> {
        if config.min_confidence > 100 {
            bail!("Minimum confidence must be between 0 and 100");
        }

        sqlx::query(
            r#"
            INSERT INTO alert_configs (user_id, email, telegram_enabled, min_confidence, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                email = excluded.email,
                telegram_enabled = excluded.telegram_enabled,
                min_confidence = excluded.min_confidence,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(user_id)
        .bind(&config.email)
        .bind(config.telegram_enabled)
        .bind(i64::from(config.min_confidence))
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .context("Failed to save alert config")?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    async fn memory_db() -> Database {
        Database::new("sqlite::memory:").await.unwrap()
    }

    #[tokio::test]
    async fn test_position_round_trip() {
        let db = memory_db().await;

        let btc = Position::new("BTC", dec!(0.5), dec!(60000.12), Some("w1".to_string())).unwrap();
        let eth = Position::new("ethereum", dec!(2), dec!(2500), None).unwrap();
        db.add_position("alice", &btc).await.unwrap();
        db.add_position("alice", &eth).await.unwrap();
        db.add_position("bob", &Position::new("solana", dec!(1), dec!(100), None).unwrap())
            .await
            .unwrap();

        let all = db.get_positions("alice", None).await.unwrap();
        assert_eq!(all.len(), 2);

        let stored = all.iter().find(|p| p.id == btc.id).unwrap();
        assert_eq!(stored.asset, "bitcoin");
        assert_eq!(stored.buy_price, dec!(60000.12));
        assert_eq!(stored.wallet_id.as_deref(), Some("w1"));

        let w1 = db.get_positions("alice", Some("w1")).await.unwrap();
        assert_eq!(w1.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_position() {
        let db = memory_db().await;
        let pos = Position::new("bitcoin", dec!(1), dec!(50000), None).unwrap();
        db.add_position("alice", &pos).await.unwrap();

        assert!(!db.remove_position("bob", &pos.id).await.unwrap());
        assert!(db.remove_position("alice", &pos.id).await.unwrap());
        assert!(!db.remove_position("alice", &pos.id).await.unwrap());
        assert!(db.get_positions("alice", None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_alert_config_defaults_and_upsert() {
        let db = memory_db().await;

        let initial = db.get_alert_config("alice").await.unwrap();
        assert_eq!(initial, AlertConfig::default());

        let config = AlertConfig {
            email: "alice@example.com".to_string(),
            telegram_enabled: true,
            min_confidence: 80,
        };
        db.save_alert_config("alice", &config).await.unwrap();
        assert_eq!(db.get_alert_config("alice").await.unwrap(), config);

        let lowered = AlertConfig {
            min_confidence: 60,
            ..config
        };
        db.save_alert_config("alice", &lowered).await.unwrap();
        assert_eq!(db.get_alert_config("alice").await.unwrap().min_confidence, 60);

        assert!(db
            .save_alert_config("alice", &AlertConfig { min_confidence: 101, ..AlertConfig::default() })
            .await
            .is_err());
    }
}
