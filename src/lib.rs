//! # Tradovate Bridge
//!
//! Receives trade signals over HTTP (e.g. TradingView alerts) and routes
//! them to Tradovate as authenticated market orders.
//!
//! ## Architecture
//!
//! - `config`: Configuration management and validation
//! - `broker`: Tradovate REST client (session, contracts, orders, positions)
//! - `risk`: Pre-trade quantity guard
//! - `server`: Webhook and health endpoints
//! - `error`: Error kinds and their HTTP mapping
//! - `utils`: Symbol helpers

pub mod broker;
pub mod config;
pub mod error;
pub mod risk;
pub mod server;
pub mod utils;

pub use config::Config;
pub use error::BridgeError;
