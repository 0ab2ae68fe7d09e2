//! Execution layer error types.

use thiserror::Error;

/// Errors that can occur during execution operations.
#[derive(Debug, Error)]
pub enum ExecError {
    /// Broker knows no contract for the symbol
    #[error("Contract not found: {0}")]
    ContractNotFound(String),

    /// No usable price, or the quote did not arrive in time
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// Broker did not acknowledge a submission in time
    ///
    /// The order may still have reached the broker. Check its order
    /// management before trying again.
    #[error("Submission timeout: {0}")]
    SubmissionTimeout(String),

    /// Order was rejected by the broker
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Leg may be working at the broker but its state could not be read
    ///
    /// The gateway failed after the leg was handed over. The order may be
    /// live; check the broker's order management before trying again.
    #[error(
        "UNCONFIRMED: order {order} may be live at the broker ({reason}). \
         Check the broker's order management before trying again."
    )]
    Unconfirmed {
        /// Broker order id, or the client order id if none was assigned
        order: String,
        /// Gateway failure
        reason: String,
    },

    /// Entry order is live but its protective stop is not
    ///
    /// **The entry is unprotected.** Nothing is rolled back or retried;
    /// the stop has to be placed by hand in the broker's order management.
    #[error(
        "PARTIAL BRACKET: entry order {entry_order_id} is live without a stop loss ({reason}). \
         Reconcile it in the broker's order management."
    )]
    PartialBracket {
        /// Broker id of the live entry order
        entry_order_id: String,
        /// Why the stop leg failed
        reason: String,
    },

    /// Ticket already went through submission (idempotency check)
    #[error("Ticket already submitted: {0}")]
    AlreadySubmitted(uuid::Uuid),

    /// Broker communication error
    #[error("Gateway error: {0}")]
    Gateway(String),

    /// Submission journal error
    #[error("Submission journal error: {0}")]
    Journal(String),

    /// Confirmation prompt could not be shown or answered
    #[error("Confirmation error: {0}")]
    Confirmation(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] bracketeer_domain::DomainError),

    /// Engine error
    #[error("Engine error: {0}")]
    Engine(#[from] bracketeer_engine::EngineError),
}

impl ExecError {
    /// Check if an order may be live at the broker after this error.
    ///
    /// `true` means capital may be at risk and the trader has to look at the
    /// broker's order management. A rejected order is not live.
    pub fn needs_reconciliation(&self) -> bool {
        matches!(
            self,
            ExecError::SubmissionTimeout(_)
                | ExecError::Unconfirmed { .. }
                | ExecError::PartialBracket { .. }
        )
    }
}

/// Result type for execution operations.
pub type ExecResult<T> = Result<T, ExecError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_bracket_names_entry_order() {
        let err = ExecError::PartialBracket {
            entry_order_id: "1001".to_string(),
            reason: "rejected".to_string(),
        };
        assert!(err.to_string().contains("1001"));
        assert!(err.needs_reconciliation());
    }

    #[test]
    fn test_unconfirmed_leg_needs_reconciliation() {
        let err = ExecError::Unconfirmed {
            order: "1001".to_string(),
            reason: "connection reset".to_string(),
        };
        assert!(err.to_string().contains("1001"));
        assert!(err.needs_reconciliation());
        assert!(ExecError::SubmissionTimeout("1001".to_string()).needs_reconciliation());
    }

    #[test]
    fn test_nothing_live_after_sizing_or_rejection() {
        let err = ExecError::from(bracketeer_engine::EngineError::InvalidRiskInputs(
            "bad".to_string(),
        ));
        assert!(!err.needs_reconciliation());
        assert!(!ExecError::QuoteUnavailable("AAPL".to_string()).needs_reconciliation());
        assert!(!ExecError::OrderRejected("insufficient margin".to_string()).needs_reconciliation());
    }
}
