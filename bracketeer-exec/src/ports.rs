//! Execution layer port definitions.
//!
//! Ports define the interfaces for the collaborators the core talks to
//! (the broker gateway, the human confirming an order). Adapters implement
//! these ports for specific services (Client Portal, terminal, stub, etc.).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use bracketeer_domain::{Instrument, OrderLeg, OrderStatus, Quote, Symbol};

use crate::error::ExecError;
use crate::preview::OrderPreview;

// =============================================================================
// Broker Gateway Port
// =============================================================================

/// Port for broker operations (contract lookup, quotes, order placement).
///
/// Implementations:
/// - `StubGateway` - For testing (scripted contracts, quotes and statuses)
/// - `ClientPortalGateway` - IBKR Client Portal Web API (binary crate)
///
/// Calls may take arbitrarily long; the core wraps each one in a timeout.
#[async_trait]
pub trait BrokerGateway: Send + Sync {
    /// Resolve a symbol to a tradable instrument.
    ///
    /// # Errors
    ///
    /// `ExecError::ContractNotFound` if the broker knows no such contract.
    async fn get_instrument_details(&self, symbol: &Symbol) -> Result<Instrument, ExecError>;

    /// Snapshot quote for an instrument.
    ///
    /// Either price may be missing (e.g. outside trading hours the market
    /// price usually is). Callers decide what to fall back on.
    async fn get_latest_price(&self, instrument: &Instrument) -> Result<Quote, ExecError>;

    /// Cash balance in the given currency, `None` if not reported.
    async fn get_available_cash(&self, currency: &str) -> Result<Option<Decimal>, ExecError>;

    /// Submit a single order leg.
    ///
    /// Returns as soon as the broker has taken the order; it may not have
    /// been acknowledged yet. Use [`BrokerGateway::get_status`] to follow it.
    async fn submit(
        &self,
        instrument: &Instrument,
        leg: &OrderLeg,
    ) -> Result<SubmissionHandle, ExecError>;

    /// Current status of a submitted leg.
    async fn get_status(&self, handle: &SubmissionHandle) -> Result<OrderStatus, ExecError>;

    /// Release the broker session.
    async fn disconnect(&self) -> Result<(), ExecError>;
}

/// Reference to a submitted order leg.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubmissionHandle {
    /// Broker-assigned order ID
    pub order_id: String,
    /// Client order ID of the leg
    pub client_order_id: String,
    /// When the broker took the order
    pub submitted_at: DateTime<Utc>,
}

impl SubmissionHandle {
    /// Create a handle stamped with the current time.
    pub fn new(order_id: impl Into<String>, client_order_id: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            client_order_id: client_order_id.into(),
            submitted_at: Utc::now(),
        }
    }
}

// =============================================================================
// Confirmation Port
// =============================================================================

/// Port for the human approving an order before it is sent.
///
/// Implementations:
/// - `TerminalPrompt` - Interactive y/N prompt (binary crate)
/// - `AutoConfirm` - Fixed answer, for scripted use and tests
#[async_trait]
pub trait ConfirmationPort: Send + Sync {
    /// Show the preview and return `true` if the trader approves.
    async fn confirm(&self, preview: &OrderPreview) -> Result<bool, ExecError>;
}

/// Confirmation port that always gives the same answer.
#[derive(Debug, Clone, Copy)]
pub struct AutoConfirm(pub bool);

#[async_trait]
impl ConfirmationPort for AutoConfirm {
    async fn confirm(&self, _preview: &OrderPreview) -> Result<bool, ExecError> {
        Ok(self.0)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_handle_serialization() {
        let handle = SubmissionHandle::new("1001", "0192f1c4-aaaa");

        let json = serde_json::to_string(&handle).unwrap();
        let parsed: SubmissionHandle = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, handle);
        assert_eq!(parsed.order_id, "1001");
    }
}
