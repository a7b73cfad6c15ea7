//! SENTIX Pro dashboard client
//!
//! Market data, trading signals, alerts and a multi-wallet crypto portfolio
//! valued locally against live prices.

mod alerts;
mod api;
mod config;
mod dashboard;
mod db;
mod format;
mod models;
mod valuation;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use tracing::{debug, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::alerts::{send_test_alert, AlertConfig};
use crate::api::{Holdings, NewWallet, SentixClient, UploadOutcome};
use crate::config::{AppConfig, DEFAULT_API_URL, DEFAULT_DATABASE_URL, DEFAULT_USER_ID};
use crate::dashboard::{Dashboard, DashboardState};
use crate::db::Database;
use crate::format::{
    format_amount, format_currency, format_large_number, format_percent, format_price,
    parse_display_value, truncate,
};
use crate::models::{
    find_provider, ticker_for, MarketSnapshot, Position, PriceMap, PriceStatus, Sentiment,
    Signal, Wallet, WalletType,
};
use crate::valuation::{consolidate, consolidate_by_wallet, PortfolioTotals};

/// SENTIX Pro command-line dashboard.
#[derive(Parser)]
#[command(name = "sentix")]
#[command(about = "Crypto market signals and multi-wallet portfolio tracking", long_about = None)]
struct Cli {
    /// SENTIX backend base URL
    #[arg(long, env = "SENTIX_API_URL", default_value = DEFAULT_API_URL, global = true)]
    api_url: String,

    /// User id for portfolio, wallets and alert settings
    #[arg(short, long, env = "SENTIX_USER_ID", default_value = DEFAULT_USER_ID, global = true)]
    user: String,

    /// Local database URL
    #[arg(short, long, env = "SENTIX_DATABASE", default_value = DEFAULT_DATABASE_URL, global = true)]
    database: String,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,

    /// HTTP request timeout in seconds
    #[arg(long, default_value = "30", global = true)]
    timeout: u64,

    /// Refresh interval in seconds
    #[arg(long, env = "SENTIX_REFRESH_SECS", default_value = "30", global = true)]
    interval: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum PortfolioView {
    /// Totals plus one row per asset across all wallets
    Consolidated,
    /// One block per wallet
    Wallets,
}

#[derive(Subcommand)]
enum Commands {
    /// Show crypto prices, macro indicators and metals
    Market,

    /// Show current trading signals
    Signals {
        /// Maximum number of signals to show
        #[arg(long, default_value = "20")]
        limit: usize,

        /// Only show signals at or above this confidence (0-100)
        #[arg(short, long)]
        min_confidence: Option<u8>,
    },

    /// Show recent alerts
    Alerts,

    /// Show portfolio valuation
    Portfolio {
        /// How to group positions
        #[arg(long, value_enum, default_value = "consolidated")]
        view: PortfolioView,

        /// Value positions from the local store instead of the backend
        #[arg(long)]
        local: bool,

        /// Only include positions held in this wallet
        #[arg(short, long)]
        wallet: Option<String>,
    },

    /// Record a position in the local store
    Add {
        /// Asset id or ticker (bitcoin, BTC, ...)
        asset: String,

        /// Quantity held
        amount: Decimal,

        /// Price paid per unit in USD ("60000", "$60,000.50", "1.2K")
        #[arg(value_parser = parse_usd)]
        buy_price: Decimal,

        /// Wallet id the position belongs to
        #[arg(short, long)]
        wallet: Option<String>,

        /// Free-form notes
        #[arg(short, long)]
        notes: Option<String>,
    },

    /// Remove a position from the local store
    Remove {
        /// Position id
        id: String,
    },

    /// Upload a CSV/Excel portfolio file
    Upload {
        /// Path to the file
        file: PathBuf,

        /// Wallet to import into
        #[arg(short, long)]
        wallet: Option<String>,
    },

    /// Download the CSV import template
    Template {
        /// Where to save the template
        #[arg(short, long, default_value = "portfolio_template.csv")]
        output: PathBuf,
    },

    /// List wallets
    Wallets,

    /// Create a wallet
    CreateWallet {
        /// Wallet name
        name: String,

        /// Wallet type (exchange, wallet, cold_storage, defi, other)
        #[arg(short = 't', long = "type", default_value = "exchange")]
        wallet_type: WalletType,

        /// Provider id (binance, metamask, ledger, ...)
        #[arg(short, long, default_value = "other")]
        provider: String,

        /// Hex color; defaults to the provider's brand color
        #[arg(short, long)]
        color: Option<String>,

        /// Free-form notes
        #[arg(short, long, default_value = "")]
        notes: String,
    },

    /// Show or update alert settings
    AlertConfig {
        /// Alert email address
        #[arg(long)]
        email: Option<String>,

        /// Enable or disable Telegram delivery
        #[arg(long)]
        telegram: Option<bool>,

        /// Minimum signal confidence (0-100) that triggers an alert
        #[arg(long)]
        min_confidence: Option<u8>,
    },

    /// Send a test alert through the configured channels
    TestAlert,

    /// Live dashboard, refreshed on an interval
    Watch,

    /// Show current configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Setup logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = AppConfig {
        api_url: cli.api_url.clone(),
        user_id: cli.user.clone(),
        refresh_interval_secs: cli.interval,
        request_timeout_secs: cli.timeout,
        database_url: cli.database.clone(),
    };
    config.validate()?;

    let client = SentixClient::from_config(&config)?;

    match cli.command {
        Commands::Market => {
            let market = client.get_market().await?;
            print_market(&market);
        }

        Commands::Signals {
            limit,
            min_confidence,
        } => {
            let signals = client.get_signals().await?;
            let alert_config = open_db(&config).await?.get_alert_config(&config.user_id).await?;

            let shown: Vec<&Signal> = signals
                .iter()
                .filter(|s| min_confidence.map_or(true, |m| s.confidence >= f64::from(m)))
                .take(limit)
                .collect();

            if shown.is_empty() {
                println!("No signals available.");
                return Ok(());
            }

            print_signals(&shown, &alert_config);
        }

        Commands::Alerts => {
            let alerts = client.get_alerts().await?;
            if alerts.is_empty() {
                println!("No alerts yet.");
                return Ok(());
            }

            println!(
                "\n{:<17} {:<8} {:<6} {:>6} {:>6} {:>14}  {}",
                "TIME", "ASSET", "ACTION", "SCORE", "CONF", "PRICE", "REASONS"
            );
            println!("{}", "-".repeat(100));

            for alert in &alerts {
                let time = alert
                    .created_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:<17} {:<8} {:<6} {:>6.0} {:>5.0}% {:>14}  {}",
                    time,
                    ticker_for(&alert.asset),
                    alert.action.as_str(),
                    alert.score,
                    alert.confidence,
                    format_price(alert.price),
                    truncate(&alert.reasons, 40)
                );
            }
        }

        Commands::Portfolio { view, local, wallet } => {
            let mut holdings = if local {
                let positions = open_db(&config)
                    .await?
                    .get_positions(&config.user_id, wallet.as_deref())
                    .await?;
                let wallets = match client.get_wallets(&config.user_id).await {
                    Ok(wallets) => wallets.iter().map(|w| w.meta()).collect(),
                    Err(e) => {
                        warn!(error = %e, "Wallet metadata unavailable");
                        Vec::new()
                    }
                };
                Holdings {
                    positions,
                    wallets,
                    server_totals: None,
                }
            } else {
                client.get_portfolio(&config.user_id).await?.into_holdings()
            };

            if let Some(id) = wallet.as_deref() {
                holdings.positions.retain(|p| p.wallet_id.as_deref() == Some(id));
            }

            if holdings.positions.is_empty() {
                println!("No positions. Add one with 'sentix add' or import with 'sentix upload'.");
                return Ok(());
            }

            let prices = match client.get_market().await {
                Ok(market) => market.price_map(),
                Err(e) => {
                    warn!(error = %e, "Market data unavailable, valuing without prices");
                    let mut prices = PriceMap::new();
                    prices.mark_stale();
                    prices
                }
            };

            match view {
                PortfolioView::Consolidated => print_consolidated(&holdings, &prices),
                PortfolioView::Wallets => print_by_wallet(&holdings, &prices),
            }
        }

        Commands::Add {
            asset,
            amount,
            buy_price,
            wallet,
            notes,
        } => {
            let mut position = Position::new(&asset, amount, buy_price, wallet)?;
            position.notes = notes;

            open_db(&config).await?.add_position(&config.user_id, &position).await?;
            info!(id = %position.id, asset = %position.asset, "Position added");

            println!(
                "Added {} {} @ {} (id: {})",
                format_amount(position.amount),
                ticker_for(&position.asset),
                format_price(position.buy_price),
                position.id
            );
        }

        Commands::Remove { id } => {
            if open_db(&config).await?.remove_position(&config.user_id, &id).await? {
                println!("Removed position {}", id);
            } else {
                println!("No position with id {}", id);
            }
        }

        Commands::Upload { file, wallet } => {
            if wallet.is_none() {
                let wallets = client
                    .get_wallets(&config.user_id)
                    .await
                    .context("Failed to load wallets")?;
                ensure_wallet_selected(wallet.as_deref(), &wallets)?;
            }

            match client
                .upload_portfolio(&file, &config.user_id, wallet.as_deref())
                .await?
            {
                UploadOutcome::Success { message, positions } => {
                    println!("{}", message);
                    debug!(positions = positions, "Upload accepted");
                }
                UploadOutcome::Failure { message, details } => {
                    println!("Error: {}", message);
                    for line in details {
                        println!("  - {}", line);
                    }
                }
            }
        }

        Commands::Template { output } => {
            let bytes = client.download_template().await?;
            tokio::fs::write(&output, &bytes).await?;
            println!("Template saved to {}", output.display());
        }

        Commands::Wallets => {
            let wallets = client.get_wallets(&config.user_id).await?;
            if wallets.is_empty() {
                println!("No wallets. Create one with 'sentix create-wallet <name>'.");
                return Ok(());
            }

            println!(
                "\n{:<38} {:<20} {:<13} {:<16} {:<8} {:>9}",
                "ID", "NAME", "TYPE", "PROVIDER", "COLOR", "POSITIONS"
            );
            println!("{}", "-".repeat(109));

            for wallet in &wallets {
                let provider = wallet.provider_label();
                println!(
                    "{:<38} {:<20} {:<13} {:<16} {:<8} {:>9}",
                    truncate(&wallet.id, 36),
                    truncate(&wallet.name, 18),
                    wallet.wallet_type.as_str(),
                    truncate(&provider, 14),
                    wallet.display_color(),
                    wallet.position_count
                );
            }
        }

        Commands::CreateWallet {
            name,
            wallet_type,
            provider,
            color,
            notes,
        } => {
            if find_provider(&provider).is_none() {
                warn!(provider = %provider, "Unknown provider, using default color");
            }

            let wallet = client
                .create_wallet(&NewWallet {
                    user_id: config.user_id.clone(),
                    name,
                    wallet_type,
                    provider,
                    color,
                    notes,
                })
                .await?;

            println!("Created wallet '{}' (id: {})", wallet.name, wallet.id);
        }

        Commands::AlertConfig {
            email,
            telegram,
            min_confidence,
        } => {
            let db = open_db(&config).await?;
            let mut alert_config = db.get_alert_config(&config.user_id).await?;

            let changed = email.is_some() || telegram.is_some() || min_confidence.is_some();
            if let Some(email) = email {
                alert_config.email = email;
            }
            if let Some(enabled) = telegram {
                alert_config.telegram_enabled = enabled;
            }
            if let Some(min) = min_confidence {
                alert_config.min_confidence = min;
            }

            if changed {
                db.save_alert_config(&config.user_id, &alert_config).await?;
                println!("Alert settings saved.");
            }

            println!("\n=== Alert Settings ===");
            println!(
                "Email:            {}",
                if alert_config.email.is_empty() { "(not set)" } else { alert_config.email.as_str() }
            );
            println!(
                "Telegram:         {}",
                if alert_config.telegram_enabled { "Enabled" } else { "Disabled" }
            );
            println!("Min Confidence:   {}%", alert_config.min_confidence);
        }

        Commands::TestAlert => {
            let alert_config = open_db(&config).await?.get_alert_config(&config.user_id).await?;
            let response = send_test_alert(&client, &alert_config).await;

            if response.success {
                println!("Test alert sent: {}", response.message);
            } else {
                println!("Test alert failed: {}", response.message);
            }

            if let Some(delivery) = &response.delivery {
                for (channel, status) in delivery {
                    println!("  {:<10} {}", channel, status);
                }
            }
        }

        Commands::Watch => {
            let alert_config = open_db(&config).await?.get_alert_config(&config.user_id).await?;
            let dashboard = Arc::new(Dashboard::new(Arc::new(client)));

            println!("\n=== SENTIX Pro ===");
            println!("Backend:          {}", config.api_url);
            println!("Refresh interval: {}s", config.refresh_interval_secs);
            println!("\nPress Ctrl+C to stop.\n");

            dashboard.initial_load().await;
            let mut updates = dashboard.subscribe();
            render_dashboard(&dashboard.snapshot().await, &alert_config);

            let poller = dashboard.clone().spawn(config.refresh_interval());

            loop {
                tokio::select! {
                    changed = updates.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        render_dashboard(&dashboard.snapshot().await, &alert_config);
                    }
                    _ = tokio::signal::ctrl_c() => {
                        println!("\nStopping dashboard...");
                        break;
                    }
                }
            }

            poller.stop();
        }

        Commands::Config => {
            println!("\n=== Configuration ===\n");
            println!("API URL:          {}", config.api_url);
            println!("User:             {}", config.user_id);
            println!("Database:         {}", config.database_url);
            println!("Refresh Interval: {}s", config.refresh_interval_secs);
            println!("Request Timeout:  {}s", config.request_timeout_secs);
        }
    }

    Ok(())
}

fn parse_usd(s: &str) -> Result<Decimal, String> {
    parse_display_value(s).ok_or_else(|| format!("'{}' is not a valid USD amount", s))
}

/// An upload must name a wallet once the user has any.
fn ensure_wallet_selected(selected: Option<&str>, wallets: &[Wallet]) -> Result<()> {
    if selected.is_none() && !wallets.is_empty() {
        bail!("Please select a wallet first (--wallet <id>, see 'sentix wallets')");
    }
    Ok(())
}

async fn open_db(config: &AppConfig) -> Result<Database> {
    Database::new(&config.database_url).await
}

/// Price cell with a marker for stale or missing prices.
fn price_cell(price: Decimal, status: PriceStatus) -> String {
    match status {
        PriceStatus::Known => format_price(price),
        PriceStatus::Stale => format!("{}*", format_price(price)),
        PriceStatus::Unavailable => "n/a".to_string(),
    }
}

fn print_totals(totals: &PortfolioTotals) {
    println!("Total Value:      {}", format_currency(totals.total_value));
    println!("Total Invested:   {}", format_currency(totals.total_invested));
    println!(
        "Total P&L:        {} ({})",
        format_currency(totals.total_pnl),
        format_percent(totals.total_pnl_percent)
    );
    println!("Positions:        {}", totals.position_count);
}

fn print_price_notes(prices: &PriceMap) {
    if prices.is_stale() {
        println!("\n* prices may be out of date (last market refresh failed)");
    }
}

fn print_consolidated(holdings: &Holdings, prices: &PriceMap) {
    let portfolio = consolidate(&holdings.positions, prices);

    if let Some(server) = &holdings.server_totals {
        if server.total_value != portfolio.totals.total_value {
            debug!(
                server = %server.total_value,
                local = %portfolio.totals.total_value,
                "Backend totals differ from local valuation"
            );
        }
    }

    println!("\n=== Portfolio ===");
    print_totals(&portfolio.totals);
    println!("Wallets:          {}", portfolio.wallet_count);

    println!(
        "\n{:<8} {:>14} {:>14} {:>14} {:>16} {:>16} {:>9} {:>7}",
        "ASSET", "AMOUNT", "AVG COST", "PRICE", "VALUE", "P&L", "P&L%", "WALLETS"
    );
    println!("{}", "-".repeat(106));

    for asset in &portfolio.by_asset {
        println!(
            "{:<8} {:>14} {:>14} {:>14} {:>16} {:>16} {:>9} {:>7}",
            ticker_for(&asset.asset),
            format_amount(asset.total_amount),
            format_price(asset.avg_buy_price),
            price_cell(asset.current_price, asset.price_status),
            format_currency(asset.current_value),
            format_currency(asset.pnl),
            format_percent(asset.pnl_percent),
            asset.wallet_count
        );
    }

    print_price_notes(prices);
}

fn print_by_wallet(holdings: &Holdings, prices: &PriceMap) {
    let groups = consolidate_by_wallet(&holdings.positions, prices, &holdings.wallets);

    for group in &groups {
        println!("\n=== {} ({}) ===", group.wallet_name, group.wallet_color);
        print_totals(&group.totals);

        println!(
            "\n  {:<38} {:<8} {:>14} {:>14} {:>14} {:>16} {:>9}",
            "ID", "ASSET", "AMOUNT", "BUY PRICE", "PRICE", "VALUE", "P&L%"
        );
        println!("  {}", "-".repeat(119));

        for v in &group.positions {
            println!(
                "  {:<38} {:<8} {:>14} {:>14} {:>14} {:>16} {:>9}",
                truncate(&v.position_id, 36),
                ticker_for(&v.asset),
                format_amount(v.amount),
                format_price(v.buy_price),
                price_cell(v.current_price, v.price_status),
                format_currency(v.current_value),
                format_percent(v.pnl_percent)
            );
        }
    }

    print_price_notes(prices);
}

fn print_market(market: &MarketSnapshot) {
    println!("\n{:<14} {:<6} {:>14} {:>9}", "ASSET", "TICKER", "PRICE", "24H");
    println!("{}", "-".repeat(46));

    for (id, quote) in &market.crypto {
        println!(
            "{:<14} {:<6} {:>14} {:>8.2}%",
            truncate(id, 14),
            ticker_for(id),
            format_price(quote.price),
            quote.change_24h
        );
    }

    let m = &market.macro_data;
    println!("\n=== Macro ===");
    if let (Some(index), Some(sentiment)) = (m.fear_greed, m.sentiment()) {
        let mood = match sentiment {
            Sentiment::Fear => "fear",
            Sentiment::Neutral => "neutral",
            Sentiment::Greed => "greed",
        };
        println!(
            "Fear & Greed:     {:.0} {} ({})",
            index,
            m.fear_label.as_deref().unwrap_or(""),
            mood
        );
    }
    if let Some(dom) = m.btc_dom {
        println!("BTC Dominance:    {:.1}%", dom);
    }
    if let Some(mcap) = m.global_mcap {
        println!("Global Mcap:      {}", format_large_number(mcap));
    }
    if let Some(gold) = &market.metals.gold {
        println!("Gold:             {}", format_price(gold.price));
    }
    if let Some(silver) = &market.metals.silver {
        println!("Silver:           {}", format_price(silver.price));
    }

    let gainers = market.top_gainers(3);
    if !gainers.is_empty() {
        println!("\n--- Top Gainers ---");
        for (id, q) in gainers {
            println!("  {:<6} {:+.2}%", ticker_for(id), q.change_24h);
        }

        println!("\n--- Top Losers ---");
        for (id, q) in market.top_losers(3) {
            println!("  {:<6} {:+.2}%", ticker_for(id), q.change_24h);
        }
    }
}

fn print_signals(signals: &[&Signal], alert_config: &AlertConfig) {
    println!(
        "\n  {:<8} {:<6} {:>6} {:>6} {:>14} {:>8}  {}",
        "ASSET", "ACTION", "SCORE", "CONF", "PRICE", "24H", "REASONS"
    );
    println!("{}", "-".repeat(96));

    for signal in signals {
        let marker = if alert_config.qualifies(signal) { "*" } else { " " };
        println!(
            "{} {:<8} {:<6} {:>6.0} {:>5.0}% {:>14} {:>7.2}%  {}",
            marker,
            ticker_for(&signal.asset),
            signal.action.as_str(),
            signal.score,
            signal.confidence,
            format_price(signal.price),
            signal.change_24h,
            truncate(&signal.reasons, 40)
        );
    }

    println!(
        "\n* meets alert threshold ({}% confidence)",
        alert_config.min_confidence
    );
}

fn render_dashboard(state: &DashboardState, alert_config: &AlertConfig) {
    let updated = state
        .last_update
        .map(|t| t.with_timezone(&chrono::Local).format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "never".to_string());

    let stale = if state.prices.is_stale() { " (stale)" } else { "" };
    println!("[{}] Market data{}", updated, stale);

    match &state.market {
        Some(market) => print_market(market),
        None => println!("Market data unavailable."),
    }

    let qualifying = alert_config.qualifying(&state.signals);
    println!(
        "\nSignals: {} | Alert-worthy: {} | Recent alerts: {}",
        state.signals.len(),
        qualifying.len(),
        state.alerts.len()
    );

    if !qualifying.is_empty() {
        print_signals(&qualifying, alert_config);
    }
    println!();
}
