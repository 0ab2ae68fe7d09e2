//! Bracketeer Execution Layer
//!
//! Quote lookup, confirmation and at-most-once bracket submission.
//!
//! # Architecture
//!
//! ```text
//! OrderRequest → Executor → Submission Journal → BrokerGateway → BracketSubmission
//! ```
//!
//! # Components
//!
//! - **Ports**: Traits for the broker gateway and the confirming human
//! - **Quote Resolver**: Symbol → instrument → usable price, with timeout
//! - **Session**: Scoped gateway handle that always disconnects
//! - **Submission Journal**: Ensures a ticket is sent at most once
//! - **Executor**: prepare → confirm → submit
//! - **Stub**: Scripted gateway for tests
//!
//! # Example
//!
//! ```rust,ignore
//! use bracketeer_exec::{AutoConfirm, BrokerSession, Executor, ExecutorSettings, StubGateway, SubmissionJournal};
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(StubGateway::new());
//! let journal = Arc::new(SubmissionJournal::new());
//!
//! let outcome = BrokerSession::new(gateway)
//!     .run(|gateway| async move {
//!         let executor = Executor::new(gateway, journal, ExecutorSettings::default());
//!         executor.place(&request, &AutoConfirm(true)).await
//!     })
//!     .await?;
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod executor;
pub mod journal;
pub mod ports;
pub mod preview;
pub mod quote;
pub mod session;
pub mod stub;

// Re-exports for convenience
pub use error::{ExecError, ExecResult};
pub use executor::{
    BracketSubmission, Executor, ExecutorSettings, LegSubmission, OrderRequest, OrderTicket,
    PlacementOutcome,
};
pub use journal::{SubmissionJournal, SubmissionRecord, SubmissionResult, SubmissionState};
pub use ports::{AutoConfirm, BrokerGateway, ConfirmationPort, SubmissionHandle};
pub use preview::OrderPreview;
pub use quote::{QuoteResolver, ResolvedQuote, DEFAULT_QUOTE_TIMEOUT};
pub use session::BrokerSession;
pub use stub::{StubGateway, SubmittedLeg};
