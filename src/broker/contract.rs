//! Contract resolution: cache and front-month selection.

use crate::broker::types::Contract;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

/// Resolved contracts, keyed two ways.
#[derive(Debug, Default)]
pub struct ContractCache {
    /// Exact symbol (e.g. "ESZ4") -> contract id
    by_symbol: HashMap<String, i64>,
    /// Root (e.g. "ES") -> front-month contract chosen for it
    by_root: HashMap<String, Contract>,
}

impl ContractCache {
    pub fn symbol(&self, symbol: &str) -> Option<i64> {
        self.by_symbol.get(symbol).copied()
    }

    pub fn insert_symbol(&mut self, symbol: &str, contract_id: i64) {
        self.by_symbol.insert(symbol.to_string(), contract_id);
    }

    /// Cached front month for a root, unless it has expired by `now`.
    pub fn root(&self, root: &str, now: DateTime<Utc>) -> Option<&Contract> {
        self.by_root
            .get(root)
            .filter(|c| c.expiration_date.map_or(true, |exp| exp > now))
    }

    pub fn insert_root(&mut self, root: &str, contract: Contract) {
        self.by_root.insert(root.to_string(), contract);
    }
}

/// Pick the front month for `root` out of a contract search.
///
/// Candidates are the contracts whose name starts with the root; `None`
/// when there are none. Among candidates, the one with the nearest
/// expiration strictly after `now` wins; when no candidate qualifies the
/// first candidate is returned. The second element is false in that case.
pub fn select_front_month<'a>(
    contracts: &'a [Contract],
    root: &str,
    now: DateTime<Utc>,
) -> Option<(&'a Contract, bool)> {
    let candidates: Vec<&Contract> = contracts
        .iter()
        .filter(|c| c.name.to_uppercase().starts_with(root))
        .collect();

    let front = candidates
        .iter()
        .filter_map(|c| c.expiration_date.filter(|exp| *exp > now).map(|exp| (exp, *c)))
        .min_by_key(|(exp, _)| *exp)
        .map(|(_, c)| c);

    match front {
        Some(contract) => Some((contract, true)),
        None => candidates.first().map(|c| (*c, false)),
    }
}
