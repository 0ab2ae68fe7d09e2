//! Scoped broker session.
//!
//! The gateway connection is passed explicitly instead of living in a
//! global. [`BrokerSession::run`] releases it however the body ends.

use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures_util::FutureExt;
use tracing::{error, info, warn};

use crate::ports::BrokerGateway;

/// Owns a broker connection for the length of one unit of work.
pub struct BrokerSession<G: BrokerGateway> {
    gateway: Arc<G>,
}

impl<G: BrokerGateway> BrokerSession<G> {
    /// Open a session over an already configured gateway.
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Run `body` with the gateway, then disconnect.
    ///
    /// `disconnect()` is called exactly once, whether `body` returns `Ok`,
    /// returns `Err` or panics. A panic is resumed after the disconnect. A
    /// failing disconnect is logged and does not replace the body's result.
    ///
    /// Dropping the returned future skips the disconnect; callers that need
    /// to stop early do it inside `body`.
    pub async fn run<F, Fut, T, E>(self, body: F) -> Result<T, E>
    where
        F: FnOnce(Arc<G>) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let outcome = AssertUnwindSafe(body(Arc::clone(&self.gateway)))
            .catch_unwind()
            .await;

        let ok = matches!(outcome, Ok(Ok(_)));
        if outcome.is_err() {
            error!("Session body panicked, closing broker session");
        }

        match self.gateway.disconnect().await {
            Ok(()) => info!(ok, "Broker session closed"),
            Err(e) => warn!(error = %e, "Failed to close broker session"),
        }

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}
