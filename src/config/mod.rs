//! Configuration management for the bridge.
//!
//! Loads settings from an optional `config.toml`, a `.env` file and
//! `BRIDGE__*` environment variables (e.g. `BRIDGE__TRADOVATE__USERNAME`).

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Tradovate API endpoint and credentials
    #[serde(default)]
    pub tradovate: TradovateConfig,
    /// Webhook listener settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Order risk limits
    #[serde(default)]
    pub risk: RiskConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradovateConfig {
    /// REST base URL including the API version segment
    #[serde(default = "default_host")]
    pub host: String,
    /// Login name
    #[serde(default)]
    pub username: Option<String>,
    /// Login password
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_app_id")]
    pub app_id: String,
    #[serde(default = "default_app_version")]
    pub app_version: String,
    /// API client id issued by Tradovate
    #[serde(default = "default_cid")]
    pub cid: String,
    /// API client secret issued by Tradovate
    #[serde(default)]
    pub sec: Option<String>,
    #[serde(default)]
    pub device_id: Option<String>,
    /// Fixed trading account; when unset the first listed account is used
    #[serde(default)]
    pub account_id: Option<i64>,
    /// Assumed token lifetime when the login response carries no expiry
    #[serde(default = "default_token_lifetime")]
    pub token_lifetime_secs: u64,
    /// Deadline applied to every outbound request
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Maximum number of contracts requested when resolving a root symbol
    #[serde(default = "default_suggest_limit")]
    pub suggest_limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Listen address for the webhook server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret expected in `X-TV-Secret` or `?secret=` (disabled when unset)
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Maximum order quantity per root symbol (e.g. MES = 10)
    #[serde(default = "default_max_qty")]
    pub max_qty: HashMap<String, u32>,
    /// Notional cap in USD. Reported only: no pricing source is wired in.
    #[serde(default)]
    pub max_notional_usd: Option<Decimal>,
    /// Account size in USD (informational)
    #[serde(default = "default_account_size")]
    pub account_size: Decimal,
    /// Maximum drawdown in USD (informational, not a hard stop)
    #[serde(default = "default_max_drawdown")]
    pub max_drawdown: Decimal,
}

// Default value functions
fn default_host() -> String {
    "https://demo.tradovateapi.com/v1".to_string()
}

fn default_app_id() -> String {
    "Sample App".to_string()
}

fn default_app_version() -> String {
    "1.0".to_string()
}

fn default_cid() -> String {
    "8".to_string()
}

fn default_token_lifetime() -> u64 {
    80 * 60 // Tradovate tokens last roughly 90 minutes
}

fn default_request_timeout() -> u64 {
    10
}

fn default_suggest_limit() -> u32 {
    20
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

fn default_max_qty() -> HashMap<String, u32> {
    [
        ("ES", 1),
        ("MES", 10),
        ("NQ", 1),
        ("MNQ", 10),
        ("CL", 1),
        ("MCL", 10),
        ("GC", 1),
        ("MGC", 10),
    ]
    .into_iter()
    .map(|(root, max)| (root.to_string(), max))
    .collect()
}

fn default_account_size() -> Decimal {
    Decimal::new(50_000, 0) // $50k evaluation account
}

fn default_max_drawdown() -> Decimal {
    Decimal::new(2_000, 0) // $2k trailing drawdown
}

impl Config {
    /// Load configuration from environment variables and config files.
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name("config").required(false))
            .add_source(config::Environment::default().separator("__").prefix("BRIDGE"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            !self.tradovate.host.trim().is_empty(),
            "tradovate.host must not be empty"
        );

        anyhow::ensure!(
            self.tradovate.request_timeout_secs > 0,
            "tradovate.request_timeout_secs must be > 0"
        );

        anyhow::ensure!(
            self.tradovate.token_lifetime_secs > 60,
            "tradovate.token_lifetime_secs must exceed the 60s renewal margin"
        );

        anyhow::ensure!(
            self.tradovate.suggest_limit > 0,
            "tradovate.suggest_limit must be > 0"
        );

        if let Some((root, _)) = self.risk.max_qty.iter().find(|(_, max)| **max == 0) {
            anyhow::bail!("risk.max_qty for {} must be > 0", root);
        }

        anyhow::ensure!(
            self.risk.account_size >= Decimal::ZERO && self.risk.max_drawdown >= Decimal::ZERO,
            "account_size and max_drawdown must not be negative"
        );

        Ok(())
    }

    /// True when both login credentials are present.
    pub fn has_credentials(&self) -> bool {
        let present = |v: &Option<String>| v.as_deref().is_some_and(|s| !s.is_empty());
        present(&self.tradovate.username) && present(&self.tradovate.password)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tradovate: TradovateConfig::default(),
            server: ServerConfig::default(),
            risk: RiskConfig::default(),
        }
    }
}

impl Default for TradovateConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            username: None,
            password: None,
            app_id: default_app_id(),
            app_version: default_app_version(),
            cid: default_cid(),
            sec: None,
            device_id: None,
            account_id: None,
            token_lifetime_secs: default_token_lifetime(),
            request_timeout_secs: default_request_timeout(),
            suggest_limit: default_suggest_limit(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            webhook_secret: None,
        }
    }
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            max_qty: default_max_qty(),
            max_notional_usd: None,
            account_size: default_account_size(),
            max_drawdown: default_max_drawdown(),
        }
    }
}
