//! Pre-trade risk checks.
//!
//! Orders are checked before they reach the broker:
//! - Quantity must be positive
//! - Quantity must not exceed the per-root cap

mod guard;

pub use guard::{RiskGuard, RiskViolation};
