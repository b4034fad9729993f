//! Type definitions for Tradovate API requests and responses.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Body of `POST /auth/accesstokenrequest`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenRequest {
    pub name: String,
    pub password: String,
    pub app_id: String,
    pub app_version: String,
    pub cid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sec: Option<String>,
}

/// Login response. A refused login still answers 200 with `errorText`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default, deserialize_with = "deserialize_datetime_option")]
    pub expiration_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub error_text: Option<String>,
}

/// Trading account.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
}

/// Futures contract as returned by `contract/find` and `contract/suggest`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Contract {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
    #[serde(
        default,
        alias = "expiration",
        deserialize_with = "deserialize_datetime_option"
    )]
    pub expiration_date: Option<DateTime<Utc>>,
}

/// Open position on a contract.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    #[serde(default)]
    pub id: Option<i64>,
    pub account_id: i64,
    pub contract_id: i64,
    /// Signed net quantity: positive long, negative short
    pub net_pos: i64,
}

/// Order direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderAction {
    Buy,
    Sell,
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "Buy"),
            OrderAction::Sell => write!(f, "Sell"),
        }
    }
}

/// Which side of the book to flatten.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

impl PositionSide {
    /// Closing order for a position on this side, if the position is on it.
    ///
    /// Returns the offsetting action and the absolute quantity.
    pub fn closing_order(&self, net_pos: i64) -> Option<(OrderAction, i64)> {
        match self {
            PositionSide::Long if net_pos > 0 => Some((OrderAction::Sell, net_pos)),
            PositionSide::Short if net_pos < 0 => Some((OrderAction::Buy, net_pos.abs())),
            _ => None,
        }
    }
}

impl fmt::Display for PositionSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionSide::Long => write!(f, "long"),
            PositionSide::Short => write!(f, "short"),
        }
    }
}

/// Order type. The bridge only routes market orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum OrderType {
    Market,
}

/// Time in force.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TimeInForce {
    Day,
}

/// Body of `POST /order/placeorder`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaceOrderRequest {
    pub account_id: i64,
    pub contract_id: i64,
    pub action: OrderAction,
    pub order_type: OrderType,
    pub order_qty: i64,
    pub time_in_force: TimeInForce,
    pub is_automated: bool,
}

impl PlaceOrderRequest {
    /// Automated day market order.
    pub fn market(account_id: i64, contract_id: i64, action: OrderAction, qty: i64) -> Self {
        Self {
            account_id,
            contract_id,
            action,
            order_type: OrderType::Market,
            order_qty: qty,
            time_in_force: TimeInForce::Day,
            is_automated: true,
        }
    }
}

/// Tradovate answers some lookups with either one entity or a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    pub fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::Many(items) => items,
            OneOrMany::One(item) => vec![item],
        }
    }
}

/// Parse the timestamp shapes Tradovate emits.
///
/// Accepts RFC 3339, minute-precision `2024-12-20T14:30Z` and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%MZ", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

fn deserialize_datetime_option<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp: {}", s))),
    }
}
