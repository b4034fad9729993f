//! Tradovate integration.
//!
//! Provides authenticated REST access for:
//! - Access token lifecycle (lazy login and renewal)
//! - Contract resolution (explicit month or front month from a root)
//! - Market order placement and position flattening

mod client;
mod contract;
mod session;
mod types;

pub use client::{BrokerClient, FlattenOutcome, OrderPlacement};
pub use contract::{select_front_month, ContractCache};
pub use session::{AccessToken, AuthContext, Session, RENEWAL_MARGIN_SECS};
pub use types::*;
