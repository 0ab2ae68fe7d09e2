//! Executor: turns an order request into a submitted bracket.
//!
//! The Executor is the bridge between the pure Engine (sizing, assembly)
//! and the impure broker (I/O). Submission goes through the journal so a
//! ticket is sent at most once.
//!
//! # Flow
//!
//! ```text
//! OrderRequest → prepare → OrderTicket → confirm → submit → BracketSubmission
//!                  │                                  │
//!            quote + sizing                 entry, then stop as its child
//! ```

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{error, info, warn};
use uuid::Uuid;

use bracketeer_domain::{
    AccountState, BracketOrder, EntryKind, Instrument, OrderLeg, OrderStatus, TicketId,
};
use bracketeer_engine::{build_bracket, size_order, RiskInputs, SizingPolicy};

use crate::error::{ExecError, ExecResult};
use crate::journal::{SubmissionJournal, SubmissionRecord, SubmissionResult};
use crate::ports::{BrokerGateway, ConfirmationPort, SubmissionHandle};
use crate::preview::OrderPreview;
use crate::quote::{QuoteResolver, DEFAULT_QUOTE_TIMEOUT};

// =============================================================================
// Settings
// =============================================================================

/// Knobs the executor needs beyond the request itself.
#[derive(Debug, Clone)]
pub struct ExecutorSettings {
    /// Limit offset and default stop distance
    pub policy: SizingPolicy,
    /// Currency of the cash balance shown in the preview
    pub currency: String,
    /// Time allowed for contract lookup, quote and cash balance
    pub quote_timeout: Duration,
    /// Time allowed for a leg to be taken and acknowledged
    pub ack_timeout: Duration,
    /// Pause between status polls while waiting for acknowledgement
    pub ack_poll_interval: Duration,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            policy: SizingPolicy::default(),
            currency: "USD".to_string(),
            quote_timeout: DEFAULT_QUOTE_TIMEOUT,
            ack_timeout: Duration::from_secs(5),
            ack_poll_interval: Duration::from_millis(250),
        }
    }
}

// =============================================================================
// Request, Ticket and Results
// =============================================================================

/// What the trader wants to trade.
#[derive(Debug, Clone)]
pub struct OrderRequest {
    /// Symbol as entered (validated by the quote resolver, not normalised)
    pub symbol: String,
    /// Action, tier, stop and budgets
    pub inputs: RiskInputs,
    /// Entry order kind
    pub entry_kind: EntryKind,
}

/// A sized bracket waiting for confirmation.
#[derive(Debug, Clone)]
pub struct OrderTicket {
    /// Unique ticket id (journal key)
    pub id: TicketId,
    /// Snapshot shown to the trader
    pub preview: OrderPreview,
    /// Legs to submit
    pub bracket: BracketOrder,
}

/// One leg as taken and acknowledged by the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegSubmission {
    /// The leg as it was sent
    pub leg: OrderLeg,
    /// Broker reference
    pub handle: SubmissionHandle,
    /// First acknowledged status
    pub status: OrderStatus,
}

/// Both legs of a bracket, live at the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BracketSubmission {
    /// Ticket the bracket came from
    pub ticket_id: TicketId,
    /// Entry leg
    pub entry: LegSubmission,
    /// Protective stop leg, child of the entry
    pub stop: LegSubmission,
}

/// How a placement ended when nothing went wrong.
#[derive(Debug, Clone)]
pub enum PlacementOutcome {
    /// Trader declined; nothing was sent
    Declined(OrderPreview),
    /// Bracket is live
    Submitted(BracketSubmission),
    /// Stopped by the trader before submission; nothing was sent
    Interrupted,
}

// =============================================================================
// Executor
// =============================================================================

/// Prepares, confirms and submits bracket orders.
pub struct Executor<G: BrokerGateway> {
    /// Broker gateway
    gateway: Arc<G>,
    /// Journal for at-most-once submission
    journal: Arc<SubmissionJournal>,
    /// Quote lookup with timeout
    quotes: QuoteResolver<G>,
    settings: ExecutorSettings,
}

impl<G: BrokerGateway> Executor<G> {
    /// Create a new executor.
    pub fn new(gateway: Arc<G>, journal: Arc<SubmissionJournal>, settings: ExecutorSettings) -> Self {
        let quotes = QuoteResolver::with_timeout(Arc::clone(&gateway), settings.quote_timeout);
        Self {
            gateway,
            journal,
            quotes,
            settings,
        }
    }

    /// Prepare, ask for confirmation, then submit.
    ///
    /// A declined ticket returns `PlacementOutcome::Declined` and sends
    /// nothing to the broker.
    pub async fn place<C>(&self, request: &OrderRequest, confirmer: &C) -> ExecResult<PlacementOutcome>
    where
        C: ConfirmationPort + ?Sized,
    {
        let ticket = self.prepare(request).await?;

        if !confirmer.confirm(&ticket.preview).await? {
            info!(ticket_id = %ticket.id, symbol = %ticket.preview.symbol, "Order declined");
            return Ok(PlacementOutcome::Declined(ticket.preview));
        }

        self.submit(&ticket).await.map(PlacementOutcome::Submitted)
    }

    /// Resolve the quote, size the order and assemble the bracket.
    ///
    /// Nothing is sent to the broker. Sizing errors surface here.
    pub async fn prepare(&self, request: &OrderRequest) -> ExecResult<OrderTicket> {
        let resolved = self.quotes.resolve(&request.symbol).await?;
        let sized = size_order(&request.inputs, resolved.price, &self.settings.policy)?;
        let account = self.account_state().await;

        let preview =
            OrderPreview::new(&sized, &resolved.instrument, request.entry_kind, account);
        let bracket = build_bracket(&sized, &resolved.instrument, request.entry_kind);
        let ticket = OrderTicket {
            id: Uuid::now_v7(),
            preview,
            bracket,
        };

        info!(
            ticket_id = %ticket.id,
            symbol = %ticket.preview.symbol,
            action = %ticket.preview.action,
            quantity = %ticket.preview.quantity,
            limit = %ticket.preview.limit_price,
            stop = %ticket.preview.stop_loss_price,
            invested = %ticket.preview.invested_amount,
            "Ticket prepared"
        );

        Ok(ticket)
    }

    /// Submit a prepared ticket: entry first, then the stop as its child.
    ///
    /// # Errors
    ///
    /// - `AlreadySubmitted` if the ticket went through here before
    /// - `OrderRejected` if the broker refused the entry; the stop is not sent
    /// - `SubmissionTimeout` / `Unconfirmed` if the entry's state is unknown;
    ///   the stop is not sent and the ticket stays open in the journal
    /// - `PartialBracket` if the entry is live and the stop failed
    pub async fn submit(&self, ticket: &OrderTicket) -> ExecResult<BracketSubmission> {
        let bracket = &ticket.bracket;

        self.journal.record(SubmissionRecord::new(
            ticket.id,
            bracket.instrument.symbol.clone(),
            bracket.entry.action,
            bracket.entry.quantity,
        ))?;
        self.journal.mark_submitting(ticket.id)?;

        let entry = match self.submit_leg(&bracket.instrument, &bracket.entry).await {
            Ok(entry) => entry,
            Err(e) => {
                error!(
                    ticket_id = %ticket.id,
                    error = %e,
                    may_be_live = e.needs_reconciliation(),
                    "Entry order failed, stop not sent"
                );
                // An entry that may be live leaves the ticket open.
                if !e.needs_reconciliation() {
                    self.finish(ticket.id, SubmissionResult::Failed(e.to_string()));
                }
                return Err(e);
            },
        };

        let stop_leg = bracket.stop.child_of(entry.handle.order_id.clone());
        let stop = match self.submit_leg(&bracket.instrument, &stop_leg).await {
            Ok(stop) => stop,
            Err(e) => {
                let entry_order_id = entry.handle.order_id.clone();
                let reason = e.to_string();
                error!(
                    ticket_id = %ticket.id,
                    %entry_order_id,
                    %reason,
                    "Stop order failed, entry is unprotected"
                );
                self.finish(
                    ticket.id,
                    SubmissionResult::Partial {
                        entry_order_id: entry_order_id.clone(),
                        reason: reason.clone(),
                    },
                );
                return Err(ExecError::PartialBracket {
                    entry_order_id,
                    reason,
                });
            },
        };

        let submission = BracketSubmission {
            ticket_id: ticket.id,
            entry,
            stop,
        };
        self.finish(ticket.id, SubmissionResult::Submitted(submission.clone()));

        info!(
            ticket_id = %ticket.id,
            entry_order_id = %submission.entry.handle.order_id,
            stop_order_id = %submission.stop.handle.order_id,
            "Bracket submitted"
        );

        Ok(submission)
    }

    /// Get the submission journal (for inspection).
    pub fn journal(&self) -> &SubmissionJournal {
        &self.journal
    }

    /// Write the ticket's result to the journal.
    ///
    /// The broker outcome is already decided here, so a journal failure is
    /// logged and never replaces it.
    fn finish(&self, ticket_id: TicketId, result: SubmissionResult) {
        if let Err(e) = self.journal.complete(ticket_id, result) {
            error!(%ticket_id, error = %e, "Failed to record submission result");
        }
    }

    /// Send one leg and wait until the broker acknowledges it.
    ///
    /// Once the leg is handed to the gateway, a connection failure leaves its
    /// broker state unknown and is reported as `Unconfirmed`.
    async fn submit_leg(&self, instrument: &Instrument, leg: &OrderLeg) -> ExecResult<LegSubmission> {
        let ack_timeout = self.settings.ack_timeout;

        let handle = timeout(ack_timeout, self.gateway.submit(instrument, leg))
            .await
            .map_err(|_| {
                ExecError::SubmissionTimeout(format!(
                    "{} not taken within {}ms",
                    leg,
                    ack_timeout.as_millis()
                ))
            })?
            .map_err(|e| unconfirmed(&leg.client_order_id, e))?;

        let status = self
            .await_acknowledgement(&handle)
            .await
            .map_err(|e| unconfirmed(&handle.order_id, e))?;

        info!(
            %leg,
            order_id = %handle.order_id,
            parent_order_id = leg.parent_order_id.as_deref().unwrap_or("-"),
            %status,
            "Order leg acknowledged"
        );

        match status {
            OrderStatus::Rejected(reason) => Err(ExecError::OrderRejected(format!(
                "order {}: {}",
                handle.order_id, reason
            ))),
            OrderStatus::Cancelled => Err(ExecError::OrderRejected(format!(
                "order {} was cancelled by the broker",
                handle.order_id
            ))),
            status => {
                if status == OrderStatus::Inactive {
                    warn!(order_id = %handle.order_id, "Order is inactive at the broker");
                }
                Ok(LegSubmission {
                    leg: leg.clone(),
                    handle,
                    status,
                })
            },
        }
    }

    /// Poll the leg's status until it leaves `PendingSubmit`.
    async fn await_acknowledgement(&self, handle: &SubmissionHandle) -> ExecResult<OrderStatus> {
        let ack_timeout = self.settings.ack_timeout;
        let poll_interval = self.settings.ack_poll_interval;

        let poll = async {
            loop {
                let status = self.gateway.get_status(handle).await?;
                if status.is_acknowledged() {
                    return Ok::<_, ExecError>(status);
                }
                tokio::time::sleep(poll_interval).await;
            }
        };

        timeout(ack_timeout, poll).await.map_err(|_| {
            ExecError::SubmissionTimeout(format!(
                "order {} not acknowledged within {}ms",
                handle.order_id,
                ack_timeout.as_millis()
            ))
        })?
    }

    /// Cash balance for the preview; a failed lookup only loses the display.
    async fn account_state(&self) -> AccountState {
        let currency = self.settings.currency.clone();
        let lookup = timeout(
            self.settings.quote_timeout,
            self.gateway.get_available_cash(&currency),
        )
        .await;

        let available_cash = match lookup {
            Ok(Ok(cash)) => cash,
            Ok(Err(e)) => {
                warn!(error = %e, "Cash balance unavailable");
                None
            },
            Err(_) => {
                warn!("Cash balance timed out");
                None
            },
        };

        AccountState {
            currency,
            available_cash,
        }
    }
}

/// Turn a gateway failure on a handed-over leg into `Unconfirmed`.
fn unconfirmed(order: &str, error: ExecError) -> ExecError {
    match error {
        ExecError::Gateway(reason) => ExecError::Unconfirmed {
            order: order.to_string(),
            reason,
        },
        other => other,
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::journal::SubmissionState;
    use crate::ports::AutoConfirm;
    use crate::stub::StubGateway;
    use async_trait::async_trait;
    use bracketeer_domain::{OrderAction, OrderType, PositionTier, Quote, Symbol, TimeInForce};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    /// Gateway that closes every open journal ticket just before the stop
    /// leg goes out, so the executor's own result write fails.
    struct ClosesJournalOnStop {
        inner: StubGateway,
        journal: Arc<SubmissionJournal>,
    }

    #[async_trait]
    impl BrokerGateway for ClosesJournalOnStop {
        async fn get_instrument_details(&self, symbol: &Symbol) -> Result<Instrument, ExecError> {
            self.inner.get_instrument_details(symbol).await
        }

        async fn get_latest_price(&self, instrument: &Instrument) -> Result<Quote, ExecError> {
            self.inner.get_latest_price(instrument).await
        }

        async fn get_available_cash(&self, currency: &str) -> Result<Option<Decimal>, ExecError> {
            self.inner.get_available_cash(currency).await
        }

        async fn submit(
            &self,
            instrument: &Instrument,
            leg: &OrderLeg,
        ) -> Result<SubmissionHandle, ExecError> {
            if leg.is_child() {
                for record in self.journal.get_open()? {
                    self.journal
                        .complete(record.ticket_id, SubmissionResult::Failed("closed".to_string()))?;
                }
            }
            self.inner.submit(instrument, leg).await
        }

        async fn get_status(&self, handle: &SubmissionHandle) -> Result<OrderStatus, ExecError> {
            self.inner.get_status(handle).await
        }

        async fn disconnect(&self) -> Result<(), ExecError> {
            self.inner.disconnect().await
        }
    }

    fn create_test_executor() -> (Executor<StubGateway>, Arc<StubGateway>) {
        let gateway = Arc::new(StubGateway::new());
        gateway.add_instrument("AAPL", 265598, Some(dec!(100)), Some(dec!(98))).unwrap();
        gateway.set_cash(Some(dec!(25000)));

        let settings = ExecutorSettings {
            ack_timeout: Duration::from_millis(500),
            ack_poll_interval: Duration::from_millis(10),
            ..ExecutorSettings::default()
        };
        let executor =
            Executor::new(gateway.clone(), Arc::new(SubmissionJournal::new()), settings);

        (executor, gateway)
    }

    fn request(stop_loss: &str, kind: EntryKind) -> OrderRequest {
        OrderRequest {
            symbol: "AAPL".to_string(),
            inputs: RiskInputs::new(
                OrderAction::Buy,
                PositionTier::Full,
                stop_loss,
                dec!(50),
                dec!(10000),
            )
            .unwrap(),
            entry_kind: kind,
        }
    }

    #[tokio::test]
    async fn test_prepare_sizes_without_submitting() {
        let (executor, gateway) = create_test_executor();

        let ticket = executor.prepare(&request("96", EntryKind::Limit)).await.unwrap();

        // limit 101.00, stop 96, risk 5/share → 10 shares
        assert_eq!(ticket.preview.limit_price.as_decimal(), dec!(101.00));
        assert_eq!(ticket.preview.quantity.as_u64(), 10);
        assert_eq!(ticket.preview.invested_amount, dec!(1010.00));
        assert_eq!(ticket.preview.account.available_cash, Some(dec!(25000)));
        assert_eq!(
            ticket.bracket.entry.order_type,
            OrderType::Limit { limit_price: ticket.preview.limit_price }
        );
        assert!(gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_prepare_surfaces_sizing_errors() {
        let (executor, gateway) = create_test_executor();

        let result = executor.prepare(&request("105", EntryKind::Market)).await;

        assert!(matches!(result, Err(ExecError::Engine(_))));
        assert!(gateway.submitted().is_empty());
    }

    #[tokio::test]
    async fn test_submit_links_stop_to_entry() {
        let (executor, gateway) = create_test_executor();
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        let submission = executor.submit(&ticket).await.unwrap();

        let sent = gateway.submitted();
        assert_eq!(sent.len(), 2);
        assert!(!sent[0].leg.is_child());
        assert_eq!(sent[1].leg.parent_order_id.as_deref(), Some(sent[0].order_id.as_str()));
        assert_eq!(sent[1].leg.action, OrderAction::Sell);
        assert_eq!(sent[1].leg.time_in_force, TimeInForce::Gtc);
        assert_eq!(submission.entry.status, OrderStatus::Submitted);
        assert_eq!(submission.stop.status, OrderStatus::PreSubmitted);
        assert!(executor.journal().get(ticket.id).unwrap().unwrap().is_success());
    }

    #[tokio::test]
    async fn test_ticket_submitted_at_most_once() {
        let (executor, gateway) = create_test_executor();
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        executor.submit(&ticket).await.unwrap();
        let second = executor.submit(&ticket).await;

        assert!(matches!(second, Err(ExecError::AlreadySubmitted(id)) if id == ticket.id));
        assert_eq!(gateway.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_rejected_entry_sends_no_stop() {
        let (executor, gateway) = create_test_executor();
        gateway.queue_status(OrderStatus::Rejected("insufficient margin".to_string()));
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        let result = executor.submit(&ticket).await;

        assert!(matches!(result, Err(ExecError::OrderRejected(_))));
        assert_eq!(gateway.submitted().len(), 1);
        let record = executor.journal().get(ticket.id).unwrap().unwrap();
        assert!(matches!(record.result, Some(SubmissionResult::Failed(_))));
    }

    #[tokio::test]
    async fn test_failed_stop_reports_partial_bracket() {
        let (executor, gateway) = create_test_executor();
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        gateway.queue_status(OrderStatus::Submitted);
        gateway.queue_status(OrderStatus::Rejected("stop price invalid".to_string()));

        let result = executor.submit(&ticket).await;

        match result {
            Err(ExecError::PartialBracket { entry_order_id, .. }) => {
                assert_eq!(entry_order_id, gateway.submitted()[0].order_id);
            },
            other => panic!("Expected PartialBracket, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unacknowledged_entry_times_out() {
        let (executor, gateway) = create_test_executor();
        gateway.queue_status(OrderStatus::PendingSubmit);
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        let result = executor.submit(&ticket).await;

        assert!(matches!(result, Err(ExecError::SubmissionTimeout(_))));
        assert_eq!(gateway.submitted().len(), 1);
        let record = executor.journal().get(ticket.id).unwrap().unwrap();
        assert_eq!(record.state, SubmissionState::Submitting);
    }

    #[tokio::test]
    async fn test_status_failure_after_entry_taken_leaves_ticket_open() {
        let (executor, gateway) = create_test_executor();
        gateway.set_status_error(Some("connection reset"));
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        let err = executor.submit(&ticket).await.unwrap_err();

        assert!(err.needs_reconciliation());
        match err {
            ExecError::Unconfirmed { order, reason } => {
                assert_eq!(order, "1001");
                assert_eq!(reason, "connection reset");
            },
            other => panic!("Expected Unconfirmed, got {:?}", other),
        }
        assert_eq!(gateway.submitted().len(), 1);
        let record = executor.journal().get(ticket.id).unwrap().unwrap();
        assert_eq!(record.state, SubmissionState::Submitting);
        assert!(record.result.is_none());
    }

    #[tokio::test]
    async fn test_connection_lost_during_entry_submit_is_unconfirmed() {
        let (executor, gateway) = create_test_executor();
        gateway.set_fail_next(true);
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        let result = executor.submit(&ticket).await;

        assert!(matches!(
            result,
            Err(ExecError::Unconfirmed { ref order, .. }) if *order == ticket.bracket.entry.client_order_id
        ));
        assert_eq!(executor.journal().get_open().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_partial_bracket_survives_journal_failure() {
        let stub = StubGateway::new();
        stub.add_instrument("AAPL", 265598, Some(dec!(100)), Some(dec!(98))).unwrap();
        stub.queue_status(OrderStatus::Submitted);
        stub.queue_status(OrderStatus::Rejected("stop price invalid".to_string()));
        let journal = Arc::new(SubmissionJournal::new());
        let gateway = Arc::new(ClosesJournalOnStop {
            inner: stub,
            journal: Arc::clone(&journal),
        });
        let settings = ExecutorSettings {
            ack_poll_interval: Duration::from_millis(10),
            ..ExecutorSettings::default()
        };
        let executor = Executor::new(gateway.clone(), Arc::clone(&journal), settings);
        let ticket = executor.prepare(&request("96", EntryKind::Market)).await.unwrap();

        let result = executor.submit(&ticket).await;

        assert!(matches!(
            result,
            Err(ExecError::PartialBracket { ref entry_order_id, .. }) if entry_order_id == "1001"
        ));
        assert_eq!(gateway.inner.submitted().len(), 2);
        let record = journal.get(ticket.id).unwrap().unwrap();
        assert!(matches!(record.result, Some(SubmissionResult::Failed(ref r)) if r == "closed"));
    }

    #[tokio::test]
    async fn test_place_declined_sends_nothing() {
        let (executor, gateway) = create_test_executor();

        let outcome = executor
            .place(&request("", EntryKind::Market), &AutoConfirm(false))
            .await
            .unwrap();

        assert!(matches!(outcome, PlacementOutcome::Declined(_)));
        assert!(gateway.submitted().is_empty());
        assert!(executor.journal().get_open().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_place_approved_submits_bracket() {
        let (executor, gateway) = create_test_executor();

        let outcome = executor
            .place(&request("", EntryKind::Market), &AutoConfirm(true))
            .await
            .unwrap();

        assert!(matches!(outcome, PlacementOutcome::Submitted(_)));
        assert_eq!(gateway.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_missing_cash_does_not_block_preview() {
        let (executor, gateway) = create_test_executor();
        gateway.set_cash(None);

        let ticket = executor.prepare(&request("", EntryKind::Market)).await.unwrap();
        assert_eq!(ticket.preview.account.available_cash, None);
        assert_eq!(ticket.preview.account.currency, "USD");
    }
}
