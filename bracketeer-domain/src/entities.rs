//! Domain Entities for Bracketeer
//!
//! Instruments, order legs and the two-leg bracket built from them.

use crate::value_objects::{DomainError, OrderAction, Price, ShareQuantity, Symbol};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Unique identifier for a prepared order ticket
pub type TicketId = Uuid;

// =============================================================================
// Instrument
// =============================================================================

/// Tradable instrument as resolved by the broker
///
/// Acts as the handle passed back to the gateway for quotes and orders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instrument {
    /// Ticker symbol
    pub symbol: Symbol,
    /// Broker contract identifier
    pub contract_id: i64,
    /// Routing exchange (e.g., SMART)
    pub exchange: String,
    /// Trading currency (e.g., USD)
    pub currency: String,
}

impl Instrument {
    /// Create a US stock instrument routed through SMART
    pub fn us_stock(symbol: Symbol, contract_id: i64) -> Self {
        Self {
            symbol,
            contract_id,
            exchange: "SMART".to_string(),
            currency: "USD".to_string(),
        }
    }
}

// =============================================================================
// Account
// =============================================================================

/// Read-only snapshot of the account's cash
///
/// Shown to the trader for sanity; sizing never enforces it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountState {
    /// Base currency of the balance
    pub currency: String,
    /// Cash balance, if the broker reported one
    pub available_cash: Option<Decimal>,
}

// =============================================================================
// Order Types
// =============================================================================

/// Entry order kind requested by the trader
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EntryKind {
    /// Fill at the market; the limit price is not sent
    Market,
    /// Fill at the limit price or better
    Limit,
    /// Peg to the prevailing midpoint, capped at the limit price
    Midpoint,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Market => write!(f, "MARKET"),
            EntryKind::Limit => write!(f, "LIMIT"),
            EntryKind::Midpoint => write!(f, "MIDPOINT"),
        }
    }
}

impl FromStr for EntryKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "MARKET" | "MKT" => Ok(EntryKind::Market),
            "LIMIT" | "LMT" => Ok(EntryKind::Limit),
            "MIDPOINT" | "MIDPRICE" => Ok(EntryKind::Midpoint),
            other => Err(DomainError::InvalidOrderKind(format!(
                "'{}' (expected MARKET, LIMIT or MIDPOINT)",
                other
            ))),
        }
    }
}

/// Order type of a single leg, with the prices it needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OrderType {
    /// Market order
    Market,
    /// Limit order
    Limit {
        /// Worst acceptable price
        limit_price: Price,
    },
    /// Midpoint-pegged order
    Midpoint {
        /// Cap on the pegged price
        price_cap: Price,
    },
    /// Stop (market) order
    Stop {
        /// Price at which the order activates
        trigger_price: Price,
    },
}

impl OrderType {
    /// Broker-facing order type code
    pub fn code(&self) -> &'static str {
        match self {
            OrderType::Market => "MKT",
            OrderType::Limit { .. } => "LMT",
            OrderType::Midpoint { .. } => "MIDPRICE",
            OrderType::Stop { .. } => "STP",
        }
    }

    /// Limit (or cap) price carried by the order, if any
    pub fn limit_price(&self) -> Option<Price> {
        match self {
            OrderType::Limit { limit_price } => Some(*limit_price),
            OrderType::Midpoint { price_cap } => Some(*price_cap),
            OrderType::Market | OrderType::Stop { .. } => None,
        }
    }

    /// Stop trigger price, if any
    pub fn trigger_price(&self) -> Option<Price> {
        match self {
            OrderType::Stop { trigger_price } => Some(*trigger_price),
            _ => None,
        }
    }
}

/// How long a leg stays working
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TimeInForce {
    /// Expires at the end of the trading day
    Day,
    /// Good till canceled
    Gtc,
}

impl TimeInForce {
    /// Broker-facing code
    pub fn code(&self) -> &'static str {
        match self {
            TimeInForce::Day => "DAY",
            TimeInForce::Gtc => "GTC",
        }
    }
}

// =============================================================================
// Order Leg
// =============================================================================

/// One order of a bracket as it is sent to the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderLeg {
    /// Client-side identifier (UUID v7)
    pub client_order_id: String,
    /// Buy or sell
    pub action: OrderAction,
    /// Number of shares
    pub quantity: ShareQuantity,
    /// Order type and its prices
    pub order_type: OrderType,
    /// Day or GTC
    pub time_in_force: TimeInForce,
    /// Send immediately instead of staging in the broker
    pub transmit: bool,
    /// Broker order id of the parent leg; `None` for the entry
    pub parent_order_id: Option<String>,
}

impl OrderLeg {
    /// Create a new unlinked leg that transmits immediately
    pub fn new(
        action: OrderAction,
        quantity: ShareQuantity,
        order_type: OrderType,
        time_in_force: TimeInForce,
    ) -> Self {
        Self {
            client_order_id: Uuid::now_v7().to_string(),
            action,
            quantity,
            order_type,
            time_in_force,
            transmit: true,
            parent_order_id: None,
        }
    }

    /// Copy of this leg attached to a submitted parent
    ///
    /// The parent id is only known once the entry has been accepted by the
    /// broker, so linkage produces a new value instead of mutating the bracket.
    pub fn child_of(&self, parent_order_id: impl Into<String>) -> Self {
        Self {
            parent_order_id: Some(parent_order_id.into()),
            ..self.clone()
        }
    }

    /// Check if this leg is attached to a parent
    pub fn is_child(&self) -> bool {
        self.parent_order_id.is_some()
    }
}

impl fmt::Display for OrderLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.order_type.code(), self.action, self.quantity)?;
        if let Some(price) = self.order_type.limit_price() {
            write!(f, " @ {}", price)?;
        }
        if let Some(trigger) = self.order_type.trigger_price() {
            write!(f, " stop {}", trigger)?;
        }
        write!(f, " {}", self.time_in_force.code())
    }
}

// =============================================================================
// Bracket Order
// =============================================================================

/// Entry order plus its protective stop
///
/// Built once from a sized order right before submission and never mutated
/// afterwards. The stop leg is unlinked here; see [`OrderLeg::child_of`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketOrder {
    /// Instrument both legs trade
    pub instrument: Instrument,
    /// Parent leg
    pub entry: OrderLeg,
    /// Protective stop leg (child of the entry)
    pub stop: OrderLeg,
    /// When the bracket was assembled
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Order Status
// =============================================================================

/// Order status as reported by the broker
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Sent, broker has not acknowledged yet
    PendingSubmit,
    /// Accepted, held until conditions are met (e.g., child of unfilled parent)
    PreSubmitted,
    /// Working at the exchange
    Submitted,
    /// Completely filled
    Filled,
    /// Cancelled
    Cancelled,
    /// Rejected by the broker
    Rejected(String),
    /// Inactive (not working, e.g. outside trading hours or blocked)
    Inactive,
}

impl OrderStatus {
    /// Check if the broker has acknowledged the order
    pub fn is_acknowledged(&self) -> bool {
        !matches!(self, OrderStatus::PendingSubmit)
    }

    /// Check if the order will never work
    pub fn is_dead(&self) -> bool {
        matches!(self, OrderStatus::Cancelled | OrderStatus::Rejected(_))
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderStatus::PendingSubmit => write!(f, "PendingSubmit"),
            OrderStatus::PreSubmitted => write!(f, "PreSubmitted"),
            OrderStatus::Submitted => write!(f, "Submitted"),
            OrderStatus::Filled => write!(f, "Filled"),
            OrderStatus::Cancelled => write!(f, "Cancelled"),
            OrderStatus::Rejected(reason) => write!(f, "Rejected ({})", reason),
            OrderStatus::Inactive => write!(f, "Inactive"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
