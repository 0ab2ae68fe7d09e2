//! E2E test: one order from command-line arguments to a live bracket.
//!
//! Flow:
//! 1. Parse arguments into an order request
//! 2. Run it against the stub gateway inside a broker session
//! 3. Verify: preview shown, legs submitted and linked, session closed

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bracketeer::{run_order, AppError, Cli, Config};
use bracketeer_domain::{OrderAction, OrderStatus, OrderType};
use bracketeer_engine::EngineError;
use bracketeer_exec::{
    ConfirmationPort, ExecError, ExecutorSettings, OrderPreview, PlacementOutcome, StubGateway,
};
use clap::Parser;
use rust_decimal_macros::dec;

// =============================================================================
// Helpers
// =============================================================================

/// Records the preview it was shown and answers with a fixed decision.
struct RecordingConfirm {
    approve: bool,
    seen: Mutex<Option<OrderPreview>>,
}

impl RecordingConfirm {
    fn new(approve: bool) -> Self {
        Self {
            approve,
            seen: Mutex::new(None),
        }
    }

    fn preview(&self) -> OrderPreview {
        self.seen.lock().unwrap().clone().expect("confirmation was never asked")
    }
}

#[async_trait]
impl ConfirmationPort for RecordingConfirm {
    async fn confirm(&self, preview: &OrderPreview) -> Result<bool, ExecError> {
        *self.seen.lock().unwrap() = Some(preview.clone());
        Ok(self.approve)
    }
}

/// Stub quoting `symbol` with the given market price.
fn gateway(symbol: &str, market: rust_decimal::Decimal) -> Arc<StubGateway> {
    let gateway = StubGateway::new();
    gateway.add_instrument(symbol, 265598, Some(market), None).unwrap();
    gateway.set_cash(Some(dec!(25000)));
    Arc::new(gateway)
}

fn settings() -> ExecutorSettings {
    Config::test().executor_settings().unwrap()
}

async fn place(
    gateway: &Arc<StubGateway>,
    args: &[&str],
    confirmer: &RecordingConfirm,
) -> Result<PlacementOutcome, AppError> {
    let cli = Cli::try_parse_from(std::iter::once("bracketeer").chain(args.iter().copied()))
        .unwrap();
    let request = cli.order_request(&Config::test())?;

    run_order(Arc::clone(gateway), settings(), &request, confirmer).await
}

// =============================================================================
// Tests
// =============================================================================

#[tokio::test]
async fn test_full_buy_with_default_stop() {
    // Latest 99.00 → limit 99.99, default 5% stop 94.99, risk 5.00 per share
    let gateway = gateway("AAPL", dec!(99));
    let confirmer = RecordingConfirm::new(true);

    let outcome = place(&gateway, &["-s", "aapl", "-a", "BUY"], &confirmer).await.unwrap();

    let preview = confirmer.preview();
    assert_eq!(preview.limit_price.as_decimal(), dec!(99.99));
    assert_eq!(preview.stop_loss_price.as_decimal(), dec!(94.99));
    assert_eq!(preview.quantity.as_u64(), 10);
    assert_eq!(preview.invested_amount, dec!(999.90));
    assert_eq!(preview.account.available_cash, Some(dec!(25000)));

    let PlacementOutcome::Submitted(submission) = outcome else {
        panic!("expected a submitted bracket");
    };
    assert_eq!(submission.entry.leg.order_type, OrderType::Market);
    assert_eq!(submission.stop.leg.action, OrderAction::Sell);
    assert_eq!(
        submission.stop.leg.parent_order_id.as_deref(),
        Some(submission.entry.handle.order_id.as_str())
    );

    let legs = gateway.submitted();
    assert_eq!(legs.len(), 2);
    assert!(!legs[0].leg.is_child());
    assert_eq!(legs[1].leg.parent_order_id.as_deref(), Some(legs[0].order_id.as_str()));
    assert_eq!(gateway.disconnect_count(), 1);
}

#[tokio::test]
async fn test_quarter_tier_scales_quantity() {
    let gateway = gateway("AAPL", dec!(99));
    let confirmer = RecordingConfirm::new(true);

    place(&gateway, &["-s", "AAPL", "-a", "BUY", "-t", "quarter"], &confirmer)
        .await
        .unwrap();

    assert_eq!(confirmer.preview().quantity.as_u64(), 2);
    assert!(gateway.submitted().iter().all(|s| s.leg.quantity.as_u64() == 2));
}

#[tokio::test]
async fn test_threshold_exceeded_sends_nothing() {
    let gateway = gateway("AAPL", dec!(99));
    let confirmer = RecordingConfirm::new(true);

    let result = place(
        &gateway,
        &["-s", "AAPL", "-a", "BUY", "--dollar-threshold", "500"],
        &confirmer,
    )
    .await;

    assert!(matches!(
        result,
        Err(AppError::Exec(ExecError::Engine(EngineError::ThresholdExceeded { .. })))
    ));
    assert!(confirmer.seen.lock().unwrap().is_none());
    assert!(gateway.submitted().is_empty());
    assert_eq!(gateway.disconnect_count(), 1);
}

#[tokio::test]
async fn test_sell_stop_below_limit_rejected() {
    let gateway = gateway("MSFT", dec!(100));
    let confirmer = RecordingConfirm::new(true);

    let result = place(
        &gateway,
        &["-s", "MSFT", "-a", "SELL", "--stop-loss", "90"],
        &confirmer,
    )
    .await;

    let err = result.unwrap_err();
    assert!(matches!(
        err,
        AppError::Exec(ExecError::Engine(EngineError::InvalidStopLoss { .. }))
    ));
    assert_eq!(err.exit_code(), 1);
    assert!(gateway.submitted().is_empty());
}

#[tokio::test]
async fn test_declined_order_sends_nothing() {
    let gateway = gateway("AAPL", dec!(99));
    let confirmer = RecordingConfirm::new(false);

    let outcome = place(&gateway, &["-s", "AAPL", "-a", "BUY"], &confirmer).await.unwrap();

    assert!(matches!(outcome, PlacementOutcome::Declined(_)));
    assert!(gateway.submitted().is_empty());
    assert_eq!(gateway.disconnect_count(), 1);
}

#[tokio::test]
async fn test_rejected_stop_reports_partial_bracket() {
    let gateway = gateway("AAPL", dec!(99));
    gateway.queue_status(OrderStatus::Submitted);
    gateway.queue_status(OrderStatus::Rejected("stop price too close".to_string()));
    let confirmer = RecordingConfirm::new(true);

    let err = place(&gateway, &["-s", "AAPL", "-a", "BUY"], &confirmer)
        .await
        .unwrap_err();

    match &err {
        AppError::Exec(ExecError::PartialBracket { entry_order_id, .. }) => {
            assert_eq!(entry_order_id, &gateway.submitted()[0].order_id);
        },
        other => panic!("expected a partial bracket, got {}", other),
    }
    assert_eq!(err.exit_code(), 3);
    assert_eq!(gateway.disconnect_count(), 1);
}

#[tokio::test]
async fn test_rejected_entry_sends_no_stop() {
    let gateway = gateway("AAPL", dec!(99));
    gateway.reject_next("insufficient buying power");
    let confirmer = RecordingConfirm::new(true);

    let err = place(&gateway, &["-s", "AAPL", "-a", "BUY"], &confirmer)
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Exec(ExecError::OrderRejected(_))));
    assert_eq!(err.exit_code(), 1);
    assert!(gateway.submitted().is_empty());
    assert_eq!(gateway.disconnect_count(), 1);
}
