//! Webhook payload parsing.
//!
//! Alerts arrive as loosely typed JSON (`{"action": "buy", "units": "3"}`).
//! They are validated once here and turned into a [`TradeSignal`].

use crate::broker::{OrderAction, PositionSide};
use crate::error::{BridgeError, Result};
use crate::utils::normalize_symbol;
use serde::Deserialize;
use serde_json::Value;

/// Webhook body as sent by the alerting side.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RawSignal {
    pub action: Option<String>,
    pub instrument: Option<String>,
    /// Number or numeric string
    pub units: Option<Value>,
    pub side: Option<String>,
}

impl RawSignal {
    /// Decode a request body.
    pub fn from_slice(body: &[u8]) -> Result<Self> {
        serde_json::from_slice(body).map_err(|e| BridgeError::Protocol(e.to_string()))
    }

    /// Lowercased action, if any.
    pub fn action_label(&self) -> Option<String> {
        self.action
            .as_deref()
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
    }

    /// Normalized instrument, if any.
    pub fn instrument_label(&self) -> Option<String> {
        self.instrument
            .as_deref()
            .map(normalize_symbol)
            .filter(|s| !s.is_empty())
    }
}

/// A validated instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum TradeSignal {
    /// Open or add to a position with a market order.
    Entry {
        action: OrderAction,
        instrument: String,
        qty: i64,
    },
    /// Flatten every position on one side, optionally on one instrument.
    Close {
        side: PositionSide,
        instrument: Option<String>,
    },
}

impl TryFrom<RawSignal> for TradeSignal {
    type Error = BridgeError;

    fn try_from(raw: RawSignal) -> Result<Self> {
        let instrument = raw.instrument_label();

        match raw.action_label().as_deref() {
            Some(action @ ("buy" | "sell")) => {
                let instrument = instrument.ok_or_else(|| {
                    BridgeError::Validation(format!("instrument is required for {}", action))
                })?;
                let action = if action == "buy" {
                    OrderAction::Buy
                } else {
                    OrderAction::Sell
                };

                Ok(TradeSignal::Entry {
                    action,
                    instrument,
                    qty: coerce_units(raw.units.as_ref())?,
                })
            }
            Some("close") => {
                let side = match raw.side.as_deref().map(|s| s.trim().to_lowercase()).as_deref() {
                    Some("long") => PositionSide::Long,
                    Some("short") => PositionSide::Short,
                    _ => {
                        return Err(BridgeError::Validation(
                            "side must be 'long' or 'short' for close".to_string(),
                        ))
                    }
                };

                Ok(TradeSignal::Close { side, instrument })
            }
            Some(other) => Err(BridgeError::Validation(format!(
                "unrecognized action: {}",
                other
            ))),
            None => Err(BridgeError::Validation("action is required".to_string())),
        }
    }
}

/// Order size from the `units` field: defaults to 1, truncated toward zero.
fn coerce_units(units: Option<&Value>) -> Result<i64> {
    let parsed = match units {
        None | Some(Value::Null) => return Ok(1),
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        Some(_) => None,
    };

    match parsed {
        Some(v) if v.is_finite() => Ok(v.trunc() as i64),
        _ => Err(BridgeError::Validation(format!(
            "units must be numeric (got {})",
            units.map(Value::to_string).unwrap_or_default()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<TradeSignal> {
        let raw = RawSignal::from_slice(value.to_string().as_bytes())?;
        TradeSignal::try_from(raw)
    }

    #[test]
    fn test_entry_defaults_to_one_unit() {
        assert_eq!(
            parse(json!({"action": "buy", "instrument": " mes "})).unwrap(),
            TradeSignal::Entry {
                action: OrderAction::Buy,
                instrument: "MES".to_string(),
                qty: 1
            }
        );
    }

    #[test]
    fn test_units_are_truncated() {
        let signal = parse(json!({"action": "SELL", "instrument": "ESZ4", "units": 2.9})).unwrap();
        assert!(matches!(signal, TradeSignal::Entry { action: OrderAction::Sell, qty: 2, .. }));

        let signal = parse(json!({"action": "buy", "instrument": "ES", "units": "3.0"})).unwrap();
        assert!(matches!(signal, TradeSignal::Entry { qty: 3, .. }));

        let signal = parse(json!({"action": "buy", "instrument": "ES", "units": 0.4})).unwrap();
        assert!(matches!(signal, TradeSignal::Entry { qty: 0, .. }));
    }

    #[test]
    fn test_non_numeric_units_rejected() {
        for units in [json!("three"), json!(true), json!([1])] {
            let err = parse(json!({"action": "buy", "instrument": "ES", "units": units}))
                .unwrap_err();
            assert!(matches!(err, BridgeError::Validation(_)));
        }
    }

    #[test]
    fn test_entry_requires_instrument() {
        let err = parse(json!({"action": "buy", "instrument": "  "})).unwrap_err();
        assert!(matches!(err, BridgeError::Validation(_)));
        assert!(parse(json!({"action": "sell"})).is_err());
    }

    #[test]
    fn test_close_signal() {
        assert_eq!(
            parse(json!({"action": "close", "side": "Long", "instrument": "gc"})).unwrap(),
            TradeSignal::Close {
                side: PositionSide::Long,
                instrument: Some("GC".to_string())
            }
        );
        assert_eq!(
            parse(json!({"action": "close", "side": "short"})).unwrap(),
            TradeSignal::Close {
                side: PositionSide::Short,
                instrument: None
            }
        );
    }

    #[test]
    fn test_close_requires_valid_side() {
        assert!(parse(json!({"action": "close"})).is_err());
        assert!(parse(json!({"action": "close", "side": "flat"})).is_err());
    }

    #[test]
    fn test_unknown_or_missing_action() {
        let err = parse(json!({"action": "reverse", "instrument": "ES"})).unwrap_err();
        assert_eq!(err.to_string(), "unrecognized action: reverse");
        assert!(parse(json!({"instrument": "ES"})).is_err());
    }

    #[test]
    fn test_invalid_json_is_protocol_error() {
        let err = RawSignal::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, BridgeError::Protocol(_)));
    }
}
