//! Order runner: one broker session, one order.
//!
//! # Lifecycle
//!
//! 1. Open a broker session
//! 2. Resolve the quote and size the order
//! 3. Show the preview and ask for confirmation
//! 4. Submit the entry, then the stop as its child
//! 5. Disconnect, whatever happened
//!
//! Ctrl-C before step 4 ends the run with nothing sent. Once the entry
//! is on its way, submission runs to the end.

use std::future::Future;
use std::sync::Arc;

use rust_decimal_macros::dec;
use tracing::{info, warn};

use bracketeer_exec::{
    BrokerGateway, BrokerSession, ConfirmationPort, ExecError, Executor, ExecutorSettings,
    OrderRequest, PlacementOutcome, StubGateway, SubmissionJournal,
};

use crate::error::AppResult;

/// Contract id given to the demo instrument.
const DEMO_CONTRACT_ID: i64 = 1;

// =============================================================================
// Runner
// =============================================================================

/// Place one bracket order through `gateway`, stopping early on Ctrl-C.
///
/// The gateway is disconnected before this returns, on success and on
/// every error.
pub async fn run_order<G, C>(
    gateway: Arc<G>,
    settings: ExecutorSettings,
    request: &OrderRequest,
    confirmer: &C,
) -> AppResult<PlacementOutcome>
where
    G: BrokerGateway + 'static,
    C: ConfirmationPort + ?Sized,
{
    run_order_until(gateway, settings, request, confirmer, ctrl_c()).await
}

/// Place one bracket order, giving up before submission if `interrupt`
/// resolves first.
///
/// An interrupted run returns `PlacementOutcome::Interrupted` and still
/// disconnects.
pub async fn run_order_until<G, C, I>(
    gateway: Arc<G>,
    settings: ExecutorSettings,
    request: &OrderRequest,
    confirmer: &C,
    interrupt: I,
) -> AppResult<PlacementOutcome>
where
    G: BrokerGateway + 'static,
    C: ConfirmationPort + ?Sized,
    I: Future<Output = ()>,
{
    let journal = Arc::new(SubmissionJournal::new());

    let outcome = BrokerSession::new(gateway)
        .run(|gateway| async move {
            let executor = Executor::new(gateway, journal, settings);

            let (ticket, approved) = tokio::select! {
                reviewed = async {
                    let ticket = executor.prepare(request).await?;
                    let approved = confirmer.confirm(&ticket.preview).await?;
                    Ok::<_, ExecError>((ticket, approved))
                } => reviewed?,
                () = interrupt => {
                    warn!("Interrupted before submission");
                    return Ok(PlacementOutcome::Interrupted);
                },
            };

            if !approved {
                info!(ticket_id = %ticket.id, symbol = %ticket.preview.symbol, "Order declined");
                return Ok(PlacementOutcome::Declined(ticket.preview));
            }

            executor.submit(&ticket).await.map(PlacementOutcome::Submitted)
        })
        .await?;

    match &outcome {
        PlacementOutcome::Declined(preview) => {
            info!(symbol = %preview.symbol, "Nothing submitted")
        },
        PlacementOutcome::Interrupted => info!("Nothing submitted"),
        PlacementOutcome::Submitted(submission) => info!(
            ticket_id = %submission.ticket_id,
            entry_order_id = %submission.entry.handle.order_id,
            stop_order_id = %submission.stop.handle.order_id,
            "Bracket live"
        ),
    }

    Ok(outcome)
}

/// Resolves on Ctrl-C. Never resolves if the handler cannot be installed.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Ctrl-C handler unavailable");
        std::future::pending::<()>().await;
    }
}

/// Human-readable result line(s) for the terminal.
pub fn report(outcome: &PlacementOutcome) -> String {
    match outcome {
        PlacementOutcome::Declined(_) => "Order not submitted.".to_string(),
        PlacementOutcome::Interrupted => "Interrupted, order not submitted.".to_string(),
        PlacementOutcome::Submitted(submission) => format!(
            "Bracket submitted.\n  Entry: order {} [{}] {}\n  Stop:  order {} [{}] {}",
            submission.entry.handle.order_id,
            submission.entry.status,
            submission.entry.leg,
            submission.stop.handle.order_id,
            submission.stop.status,
            submission.stop.leg,
        ),
    }
}

/// Stub gateway for the test environment, quoting `symbol` at 100.
///
/// An invalid symbol is left unregistered; the quote lookup reports it.
pub fn demo_gateway(symbol: &str) -> StubGateway {
    let gateway = StubGateway::new();
    gateway.set_cash(Some(dec!(25000)));

    if let Err(e) = gateway.add_instrument(symbol, DEMO_CONTRACT_ID, Some(dec!(100)), Some(dec!(99.50)))
    {
        warn!(%symbol, error = %e, "Demo instrument not registered");
    }

    gateway
}
