//! Alert settings and test-alert dispatch.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{SendAlertResponse, SentixClient};
use crate::models::Signal;

pub const TEST_ALERT_MESSAGE: &str = "Test alert from SENTIX Pro - System working correctly!";
pub const DEFAULT_MIN_CONFIDENCE: u8 = 75;

/// Per-user alert preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlertConfig {
    pub email: String,

    /// Whether Telegram delivery is enabled for this user
    pub telegram_enabled: bool,

    /// Minimum signal confidence (0-100) that triggers an alert
    pub min_confidence: u8,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            email: String::new(),
            telegram_enabled: false,
            min_confidence: DEFAULT_MIN_CONFIDENCE,
        }
    }
}

impl AlertConfig {
    /// BUY/SELL signals at or above the confidence threshold qualify.
    pub fn qualifies(&self, signal: &Signal) -> bool {
        signal.action.is_actionable() && signal.confidence >= f64::from(self.min_confidence)
    }

    pub fn qualifying<'a>(&self, signals: &'a [Signal]) -> Vec<&'a Signal> {
        signals.iter().filter(|s| self.qualifies(s)).collect()
    }
}

/// Send the fixed test message. Transport failures become an unsuccessful
/// response rather than an error so they can be shown to the user.
pub async fn send_test_alert(client: &SentixClient, config: &AlertConfig) -> SendAlertResponse {
    match client.send_alert(&config.email, TEST_ALERT_MESSAGE).await {
        Ok(response) => {
            info!(success = response.success, "Test alert dispatched");
            response
        }
        Err(e) => {
            warn!(error = %e, "Test alert failed");
            SendAlertResponse {
                success: false,
                message: format!("Error: {:#}", e),
                delivery: None,
            }
        }
    }
}
