//! Per-instrument quantity guard.

use crate::config::RiskConfig;
use crate::utils::root_symbol;
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, warn};

/// Why an order was refused by the guard.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RiskViolation {
    #[error("risk guard: quantity must be positive (got {qty})")]
    NonPositiveQuantity { qty: i64 },

    #[error("risk guard: {root} quantity {qty} exceeds max {max}")]
    QuantityCapExceeded { root: String, qty: i64, max: u32 },
}

/// Static quantity caps keyed by uppercase root symbol.
#[derive(Debug, Clone, Default)]
pub struct RiskGuard {
    max_qty: HashMap<String, u32>,
}

impl RiskGuard {
    /// Build the guard from configuration.
    ///
    /// Roots are uppercased since environment sources deliver lowercase keys.
    pub fn new(config: &RiskConfig) -> Self {
        Self::from_caps(config.max_qty.iter().map(|(root, max)| (root.as_str(), *max)))
    }

    /// Build the guard from `(root, max)` pairs.
    pub fn from_caps<'a>(caps: impl IntoIterator<Item = (&'a str, u32)>) -> Self {
        let max_qty = caps
            .into_iter()
            .map(|(root, max)| (root.trim().to_uppercase(), max))
            .collect();
        Self { max_qty }
    }

    /// Check an entry order against the caps.
    pub fn enforce_risk(&self, instrument: &str, qty: i64) -> Result<(), RiskViolation> {
        if qty <= 0 {
            warn!(%instrument, qty, "Rejected non-positive quantity");
            return Err(RiskViolation::NonPositiveQuantity { qty });
        }

        let root = root_symbol(instrument);
        match self.max_qty.get(&root) {
            Some(&max) if qty > i64::from(max) => {
                warn!(%instrument, %root, qty, max, "Quantity cap exceeded");
                Err(RiskViolation::QuantityCapExceeded { root, qty, max })
            }
            cap => {
                debug!(%instrument, %root, qty, max = ?cap, "Risk check passed");
                Ok(())
            }
        }
    }

    /// Cap for a root, if one is configured.
    pub fn max_qty(&self, root: &str) -> Option<u32> {
        self.max_qty.get(&root.to_uppercase()).copied()
    }

    /// Roots with a configured cap, sorted.
    pub fn roots(&self) -> Vec<String> {
        let mut roots: Vec<String> = self.max_qty.keys().cloned().collect();
        roots.sort();
        roots
    }

    /// The full cap table.
    pub fn caps(&self) -> &HashMap<String, u32> {
        &self.max_qty
    }

    pub fn is_empty(&self) -> bool {
        self.max_qty.is_empty()
    }
}
