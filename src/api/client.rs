//! SENTIX backend client: market data, signals, alerts, portfolios and wallets.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::models::{provider_color, Alert, MarketSnapshot, Signal, Wallet, WalletType};

use super::types::*;

/// Parameters for creating a wallet.
#[derive(Debug, Clone)]
pub struct NewWallet {
    pub user_id: String,
    pub name: String,
    pub wallet_type: WalletType,
    pub provider: String,
    /// Falls back to the provider's brand color
    pub color: Option<String>,
    pub notes: String,
}

/// Client for the SENTIX REST API.
pub struct SentixClient {
    client: Client,
    base_url: String,
    upload_in_flight: AtomicBool,
}

/// Held while an upload is running; releases the slot on drop.
pub struct UploadGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for UploadGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

impl SentixClient {
    /// Create a client from application config.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Self::with_base_url(
            config.api_url.clone(),
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    /// Create with custom base URL and request timeout.
    pub fn with_base_url(base_url: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            upload_in_flight: AtomicBool::new(false),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, what: &str) -> Result<T> {
        let url = self.endpoint(path);
        debug!(url = %url, "Fetching {}", what);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch {}", what))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("{} request failed: {} - {}", what, status, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Failed to parse {} response", what))
    }

    /// Fetch crypto prices, macro indicators and metals.
    pub async fn get_market(&self) -> Result<MarketSnapshot> {
        self.get_json("market", "market data").await
    }

    /// Fetch the current signal list.
    pub async fn get_signals(&self) -> Result<Vec<Signal>> {
        self.get_json("signals", "signals").await
    }

    /// Fetch recent alerts.
    pub async fn get_alerts(&self) -> Result<Vec<Alert>> {
        self.get_json("alerts", "alerts").await
    }

    /// Fetch a user's portfolio in whichever shape the backend returns.
    pub async fn get_portfolio(&self, user_id: &str) -> Result<PortfolioResponse> {
        self.get_json(&format!("portfolio/{}", user_id), "portfolio").await
    }

    /// Fetch a user's wallets.
    pub async fn get_wallets(&self, user_id: &str) -> Result<Vec<Wallet>> {
        let response: WalletsResponse = self
            .get_json(&format!("wallets/{}", user_id), "wallets")
            .await?;
        Ok(response.wallets)
    }

    /// Download the CSV import template.
    pub async fn download_template(&self) -> Result<Vec<u8>> {
        let url = self.endpoint("portfolio/template");
        debug!(url = %url, "Downloading portfolio template");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to download template")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Template request failed: {} - {}", status, body);
        }

        let bytes = response.bytes().await.context("Failed to read template body")?;
        Ok(bytes.to_vec())
    }

    /// Send an alert through the backend's notification channels.
    pub async fn send_alert(&self, email: &str, message: &str) -> Result<SendAlertResponse> {
        let url = self.endpoint("send-alert");
        debug!(url = %url, "Sending alert");

        let body = SendAlertRequest {
            email: email.to_string(),
            message: message.to_string(),
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to send alert")?;

        let status = response.status();
        let parsed: SendAlertResponse = response
            .json()
            .await
            .context("Failed to parse send-alert response")?;

        if !status.is_success() && parsed.message.is_empty() {
            bail!("Send alert request failed: {}", status);
        }

        Ok(parsed)
    }

    /// Reserve the upload slot; fails if another upload is still running.
    pub fn begin_upload(&self) -> Result<UploadGuard<'_>> {
        if self
            .upload_in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            bail!("An upload is already in progress");
        }
        Ok(UploadGuard {
            flag: &self.upload_in_flight,
        })
    }

    /// Upload a CSV/Excel portfolio file for server-side import.
    ///
    /// Backend rejections come back as [`UploadOutcome::Failure`]; only
    /// local and transport problems are errors.
    pub async fn upload_portfolio(
        &self,
        file: &Path,
        user_id: &str,
        wallet_id: Option<&str>,
    ) -> Result<UploadOutcome> {
        if !file.is_file() {
            bail!("Please select a file: {} does not exist", file.display());
        }

        let _guard = self.begin_upload()?;

        let bytes = tokio::fs::read(file)
            .await
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let file_name = file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "portfolio.csv".to_string());
        let mime = mime_for(&file_name);

        let mut form = Form::new()
            .part("file", Part::bytes(bytes).file_name(file_name.clone()).mime_str(mime)?)
            .text("userId", user_id.to_string());
        if let Some(wallet) = wallet_id {
            form = form.text("walletId", wallet.to_string());
        }

        let url = self.endpoint("portfolio/upload");
        info!(file = %file_name, user = %user_id, wallet = ?wallet_id, "Uploading portfolio");

        let response = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .context("Network error during upload")?;

        let ok = response.status().is_success();
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: UploadResponse = serde_json::from_str(&body).unwrap_or_else(|_| {
            warn!(status = %status, "Upload response was not JSON");
            UploadResponse::default()
        });

        Ok(UploadOutcome::from_response(ok, parsed))
    }

    /// Create a wallet. The name must be non-empty.
    pub async fn create_wallet(&self, wallet: &NewWallet) -> Result<Wallet> {
        let name = wallet.name.trim();
        if name.is_empty() {
            bail!("Wallet name is required");
        }

        let body = CreateWalletRequest {
            user_id: wallet.user_id.clone(),
            name: name.to_string(),
            wallet_type: wallet.wallet_type,
            provider: wallet.provider.clone(),
            color: wallet
                .color
                .clone()
                .unwrap_or_else(|| provider_color(&wallet.provider).to_string()),
            notes: wallet.notes.clone(),
        };

        let url = self.endpoint("wallets");
        debug!(url = %url, name = %body.name, "Creating wallet");

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .context("Failed to create wallet")?;

        let status = response.status();
        let parsed: CreateWalletResponse = response.json().await.unwrap_or_default();

        if !status.is_success() {
            bail!(
                "{}",
                parsed.error.unwrap_or_else(|| "Failed to create wallet".to_string())
            );
        }

        parsed
            .wallet
            .context("Backend did not return the created wallet")
    }
}

fn mime_for(file_name: &str) -> &'static str {
    let lower = file_name.to_lowercase();
    if lower.ends_with(".xlsx") {
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
    } else if lower.ends_with(".xls") {
        "application/vnd.ms-excel"
    } else {
        "text/csv"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SentixClient {
        // Port 9 (discard) so nothing is ever reached.
        SentixClient::with_base_url("http://127.0.0.1:9/".to_string(), Duration::from_secs(1))
            .unwrap()
    }

    #[test]
    fn test_endpoint_building() {
        let c = client();
        assert_eq!(c.base_url(), "http://127.0.0.1:9");
        assert_eq!(c.endpoint("market"), "http://127.0.0.1:9/api/market");
        assert_eq!(
            c.endpoint("/portfolio/default-user"),
            "http://127.0.0.1:9/api/portfolio/default-user"
        );
    }

    #[test]
    fn test_upload_guard_blocks_duplicates() {
        let c = client();
        let guard = c.begin_upload().unwrap();
        assert!(c.begin_upload().is_err());
        drop(guard);
        assert!(c.begin_upload().is_ok());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for("positions.CSV"), "text/csv");
        assert_eq!(mime_for("book.xls"), "application/vnd.ms-excel");
        assert!(mime_for("book.xlsx").contains("spreadsheetml"));
    }

    #[tokio::test]
    async fn test_create_wallet_requires_name() {
        let c = client();
        let err = c
            .create_wallet(&NewWallet {
                user_id: "default-user".to_string(),
                name: "   ".to_string(),
                wallet_type: WalletType::Exchange,
                provider: "binance".to_string(),
                color: None,
                notes: String::new(),
            })
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Wallet name is required"));
    }

    #[tokio::test]
    async fn test_upload_requires_existing_file() {
        let c = client();
        let err = c
            .upload_portfolio(Path::new("/definitely/not/here.csv"), "default-user", None)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("Please select a file"));
        // The slot was never taken.
        assert!(c.begin_upload().is_ok());
    }
}
