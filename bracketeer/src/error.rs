//! Application error types.

use bracketeer_connectors::ClientPortalError;
use bracketeer_exec::ExecError;
use thiserror::Error;

/// Application-level errors.
#[derive(Debug, Error)]
pub enum AppError {
    /// Execution error (sizing, quotes, submission)
    #[error(transparent)]
    Exec(#[from] ExecError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Broker connector error outside of an order flow
    #[error("Connector error: {0}")]
    Connector(#[from] ClientPortalError),

    /// Terminal I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AppError {
    /// Process exit code for this error.
    ///
    /// `3` means something may be live at the broker and needs a look.
    pub fn exit_code(&self) -> i32 {
        match self {
            AppError::Exec(e) if e.needs_reconciliation() => 3,
            AppError::Config(_) => 2,
            _ => 1,
        }
    }
}

/// Result type for application operations.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let partial = AppError::from(ExecError::PartialBracket {
            entry_order_id: "1001".to_string(),
            reason: "rejected".to_string(),
        });
        assert_eq!(partial.exit_code(), 3);
        assert_eq!(AppError::Config("bad".to_string()).exit_code(), 2);
        assert_eq!(
            AppError::from(ExecError::ContractNotFound("ZZZZ".to_string())).exit_code(),
            1
        );
        assert_eq!(
            AppError::from(ExecError::OrderRejected("insufficient margin".to_string())).exit_code(),
            1
        );
    }
}
