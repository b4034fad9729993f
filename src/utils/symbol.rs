//! Futures symbol helpers.
//!
//! A Tradovate symbol is a root (`ES`, `MES`, `GC`) optionally followed by
//! a month code and year (`ESZ4`, `MESH25`).

/// Uppercase and trim a caller-supplied symbol.
pub fn normalize_symbol(symbol: &str) -> String {
    symbol.trim().to_uppercase()
}

/// True when the symbol names a specific contract month.
///
/// Any digit counts: `ESZ4` and `ESZ2024` are explicit, `ES` is a root.
pub fn has_contract_month(symbol: &str) -> bool {
    symbol.chars().any(|c| c.is_ascii_digit())
}

/// CME month codes, January through December.
const MONTH_CODES: &[char] = &['F', 'G', 'H', 'J', 'K', 'M', 'N', 'Q', 'U', 'V', 'X', 'Z'];

/// Product root of a symbol: the leading alphabetic prefix of the
/// uppercased symbol, minus the month code when a year follows it.
pub fn root_symbol(symbol: &str) -> String {
    let symbol = normalize_symbol(symbol);
    let mut root: String = symbol
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();

    let followed_by_year = symbol[root.len()..]
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());
    if followed_by_year && root.len() > 1 && root.ends_with(MONTH_CODES) {
        root.pop();
    }
    root
}
