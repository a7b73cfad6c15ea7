//! Application configuration.

use std::time::Duration;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

pub const DEFAULT_API_URL: &str = "http://localhost:3001";
pub const DEFAULT_USER_ID: &str = "default-user";
pub const DEFAULT_DATABASE_URL: &str = "sqlite:./sentix.db?mode=rwc";

/// Runtime configuration, assembled from CLI flags and `SENTIX_*` env vars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    /// Base URL of the SENTIX backend
    pub api_url: String,

    /// User whose portfolio, wallets and alert settings are used
    pub user_id: String,

    /// Market data and signal refresh period (seconds)
    pub refresh_interval_secs: u64,

    /// Per-request HTTP timeout (seconds)
    pub request_timeout_secs: u64,

    /// Local store for portfolio entries and alert settings
    pub database_url: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            user_id: DEFAULT_USER_ID.to_string(),
            refresh_interval_secs: 30,
            request_timeout_secs: 30,
            database_url: DEFAULT_DATABASE_URL.to_string(),
        }
    }
}

impl AppConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    /// Reject settings that would make the client unusable.
    pub fn validate(&self) -> Result<()> {
        if !(self.api_url.starts_with("http://") || self.api_url.starts_with("https://")) {
            bail!("API URL must start with http:// or https://, got '{}'", self.api_url);
        }
        if self.user_id.trim().is_empty() {
            bail!("User id cannot be empty");
        }
        if self.refresh_interval_secs == 0 {
            bail!("Refresh interval must be at least one second");
        }
        if self.request_timeout_secs == 0 {
            bail!("Request timeout must be at least one second");
        }
        Ok(())
    }
}
