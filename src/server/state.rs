//! Shared state handed to every route handler.

use crate::broker::BrokerClient;
use crate::config::{Config, RiskConfig};
use crate::risk::RiskGuard;

/// Shared application state accessible by all route handlers.
pub struct AppState {
    pub broker: BrokerClient,
    pub risk: RiskGuard,
    /// Informational limits echoed on the health endpoint
    pub risk_config: RiskConfig,
    pub webhook_secret: Option<String>,
}

impl AppState {
    pub fn new(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            broker: BrokerClient::new(&config.tradovate)?,
            risk: RiskGuard::new(&config.risk),
            risk_config: config.risk.clone(),
            webhook_secret: config
                .server
                .webhook_secret
                .clone()
                .filter(|s| !s.is_empty()),
        })
    }
}
