//! Shared helpers.

pub mod symbol;

pub use symbol::{has_contract_month, normalize_symbol, root_symbol};
