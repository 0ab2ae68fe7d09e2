//! Engine error types.

use bracketeer_domain::{DomainError, PositionTier};
use rust_decimal::Decimal;
use thiserror::Error;

/// Sizing and assembly failures.
///
/// Every variant carries the values that caused it so the trader can see
/// why the order was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Stop loss unparseable, on the wrong side of the limit, or not positive
    #[error("Invalid stop loss {stop} for limit price {limit}: {reason}")]
    InvalidStopLoss {
        /// Stop loss as entered or derived
        stop: String,
        /// Limit price it was checked against
        limit: Decimal,
        /// What is wrong with it
        reason: String,
    },

    /// Risk budget buys less than one share
    #[error(
        "Quantity too small: ({dollar_risk} / {per_share_risk}) x {tier} = {quantity} shares"
    )]
    QuantityTooSmall {
        /// Dollar risk budget
        dollar_risk: Decimal,
        /// Distance between limit and stop
        per_share_risk: Decimal,
        /// Tier multiplier that was applied
        tier: PositionTier,
        /// Whole shares computed (always 0)
        quantity: Decimal,
    },

    /// Order would commit more capital than allowed
    #[error("Invested amount {invested} exceeds dollar threshold {threshold}")]
    ThresholdExceeded {
        /// Quantity × limit price
        invested: Decimal,
        /// Configured cap
        threshold: Decimal,
    },

    /// Risk budget or policy parameters out of range
    #[error("Invalid risk inputs: {0}")]
    InvalidRiskInputs(String),

    /// Domain error
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;
