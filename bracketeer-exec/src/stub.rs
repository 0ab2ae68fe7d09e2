//! Stub gateway for testing.
//!
//! Simulates a broker without making real API calls: contracts and quotes
//! are registered up front, submissions are recorded and acknowledged with a
//! scripted status.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use bracketeer_domain::{Instrument, OrderLeg, OrderStatus, Quote, Symbol};

use crate::error::ExecError;
use crate::ports::{BrokerGateway, SubmissionHandle};

/// First broker order id handed out by the stub.
const FIRST_ORDER_ID: u64 = 1001;

/// A leg the stub has accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedLeg {
    /// Instrument the leg was sent for
    pub instrument: Instrument,
    /// The leg exactly as submitted
    pub leg: OrderLeg,
    /// Order id the stub assigned
    pub order_id: String,
}

#[derive(Default)]
struct StubState {
    instruments: HashMap<String, Instrument>,
    quotes: HashMap<String, (Option<Decimal>, Option<Decimal>)>,
    cash: Option<Decimal>,
    latency: Option<Duration>,
    next_order_id: u64,
    submitted: Vec<SubmittedLeg>,
    statuses: HashMap<String, OrderStatus>,
    scripted_statuses: VecDeque<OrderStatus>,
    reject_next: Option<String>,
    fail_next: bool,
    status_error: Option<String>,
    calls: usize,
    disconnects: usize,
}

/// Stub broker gateway.
///
/// Unless scripted otherwise, an entry leg is acknowledged as `Submitted`
/// and a child leg as `PreSubmitted` (held until its parent fills).
pub struct StubGateway {
    state: RwLock<StubState>,
}

impl StubGateway {
    /// Create an empty stub with no contracts.
    pub fn new() -> Self {
        Self {
            state: RwLock::new(StubState {
                next_order_id: FIRST_ORDER_ID,
                ..StubState::default()
            }),
        }
    }

    /// Register a US stock contract and its quote.
    pub fn add_instrument(
        &self,
        symbol: &str,
        contract_id: i64,
        market_price: Option<Decimal>,
        close: Option<Decimal>,
    ) -> Result<(), ExecError> {
        let parsed = Symbol::parse(symbol)?;
        let mut state = self.write();
        state
            .instruments
            .insert(symbol.to_string(), Instrument::us_stock(parsed, contract_id));
        state.quotes.insert(symbol.to_string(), (market_price, close));
        Ok(())
    }

    /// Replace the quote for a registered symbol.
    pub fn set_quote(&self, symbol: &str, market_price: Option<Decimal>, close: Option<Decimal>) {
        self.write().quotes.insert(symbol.to_string(), (market_price, close));
    }

    /// Set the reported cash balance.
    pub fn set_cash(&self, cash: Option<Decimal>) {
        self.write().cash = cash;
    }

    /// Delay every call by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.write().latency = Some(latency);
    }

    /// Status for the next submitted leg (consumed in submission order).
    pub fn queue_status(&self, status: OrderStatus) {
        self.write().scripted_statuses.push_back(status);
    }

    /// Reject the next submission with the given reason.
    pub fn reject_next(&self, reason: impl Into<String>) {
        self.write().reject_next = Some(reason.into());
    }

    /// Configure the next submission to fail with a connection error.
    pub fn set_fail_next(&self, fail: bool) {
        self.write().fail_next = fail;
    }

    /// Fail every status lookup with a connection error until cleared.
    pub fn set_status_error(&self, reason: Option<&str>) {
        self.write().status_error = reason.map(str::to_string);
    }

    /// Every leg accepted so far, in submission order.
    pub fn submitted(&self) -> Vec<SubmittedLeg> {
        self.read().submitted.clone()
    }

    /// Number of gateway calls made (disconnects excluded).
    pub fn call_count(&self) -> usize {
        self.read().calls
    }

    /// Number of times the session was released.
    pub fn disconnect_count(&self) -> usize {
        self.read().disconnects
    }

    fn read(&self) -> RwLockReadGuard<'_, StubState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StubState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    async fn begin_call(&self) {
        let latency = {
            let mut state = self.write();
            state.calls += 1;
            state.latency
        };
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

impl Default for StubGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BrokerGateway for StubGateway {
    async fn get_instrument_details(&self, symbol: &Symbol) -> Result<Instrument, ExecError> {
        self.begin_call().await;

        self.read()
            .instruments
            .get(symbol.as_str())
            .cloned()
            .ok_or_else(|| ExecError::ContractNotFound(symbol.to_string()))
    }

    async fn get_latest_price(&self, instrument: &Instrument) -> Result<Quote, ExecError> {
        self.begin_call().await;

        let (market_price, close) = self
            .read()
            .quotes
            .get(instrument.symbol.as_str())
            .copied()
            .ok_or_else(|| ExecError::QuoteUnavailable(instrument.symbol.to_string()))?;

        Ok(Quote::new(instrument.symbol.clone(), market_price, close))
    }

    async fn get_available_cash(&self, _currency: &str) -> Result<Option<Decimal>, ExecError> {
        self.begin_call().await;
        Ok(self.read().cash)
    }

    async fn submit(
        &self,
        instrument: &Instrument,
        leg: &OrderLeg,
    ) -> Result<SubmissionHandle, ExecError> {
        self.begin_call().await;
        let mut state = self.write();

        if std::mem::take(&mut state.fail_next) {
            return Err(ExecError::Gateway("Simulated connection failure".to_string()));
        }
        if let Some(reason) = state.reject_next.take() {
            return Err(ExecError::OrderRejected(reason));
        }

        let order_id = state.next_order_id.to_string();
        state.next_order_id += 1;

        let status = state.scripted_statuses.pop_front().unwrap_or(if leg.is_child() {
            OrderStatus::PreSubmitted
        } else {
            OrderStatus::Submitted
        });
        state.statuses.insert(order_id.clone(), status);
        state.submitted.push(SubmittedLeg {
            instrument: instrument.clone(),
            leg: leg.clone(),
            order_id: order_id.clone(),
        });

        tracing::debug!(%order_id, %leg, "Stub: order accepted");
        Ok(SubmissionHandle::new(order_id, leg.client_order_id.clone()))
    }

    async fn get_status(&self, handle: &SubmissionHandle) -> Result<OrderStatus, ExecError> {
        self.begin_call().await;
        let state = self.read();

        if let Some(reason) = &state.status_error {
            return Err(ExecError::Gateway(reason.clone()));
        }

        state
            .statuses
            .get(&handle.order_id)
            .cloned()
            .ok_or_else(|| ExecError::Gateway(format!("Unknown order id {}", handle.order_id)))
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        self.write().disconnects += 1;
        Ok(())
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bracketeer_domain::{OrderAction, OrderType, ShareQuantity, TimeInForce};
    use rust_decimal_macros::dec;

    fn market_buy() -> OrderLeg {
        OrderLeg::new(
            OrderAction::Buy,
            ShareQuantity::new(10).unwrap(),
            OrderType::Market,
            TimeInForce::Day,
        )
    }

    fn stub() -> (StubGateway, Instrument) {
        let gateway = StubGateway::new();
        gateway.add_instrument("AAPL", 265598, Some(dec!(187.43)), None).unwrap();
        let instrument = Instrument::us_stock(Symbol::parse("AAPL").unwrap(), 265598);
        (gateway, instrument)
    }

    #[tokio::test]
    async fn test_stub_assigns_sequential_order_ids() {
        let (gateway, instrument) = stub();

        let first = gateway.submit(&instrument, &market_buy()).await.unwrap();
        let second = gateway.submit(&instrument, &market_buy()).await.unwrap();

        assert_eq!(first.order_id, "1001");
        assert_eq!(second.order_id, "1002");
        assert_eq!(gateway.submitted().len(), 2);
    }

    #[tokio::test]
    async fn test_stub_default_statuses() {
        let (gateway, instrument) = stub();

        let entry = gateway.submit(&instrument, &market_buy()).await.unwrap();
        let child = gateway
            .submit(&instrument, &market_buy().child_of(entry.order_id.clone()))
            .await
            .unwrap();

        assert_eq!(gateway.get_status(&entry).await.unwrap(), OrderStatus::Submitted);
        assert_eq!(gateway.get_status(&child).await.unwrap(), OrderStatus::PreSubmitted);
    }

    #[tokio::test]
    async fn test_stub_scripted_status() {
        let (gateway, instrument) = stub();
        gateway.queue_status(OrderStatus::Rejected("margin".to_string()));

        let handle = gateway.submit(&instrument, &market_buy()).await.unwrap();
        assert_eq!(
            gateway.get_status(&handle).await.unwrap(),
            OrderStatus::Rejected("margin".to_string())
        );
    }

    #[tokio::test]
    async fn test_stub_simulated_failure() {
        let (gateway, instrument) = stub();
        gateway.set_fail_next(true);

        let result = gateway.submit(&instrument, &market_buy()).await;
        assert!(matches!(result, Err(ExecError::Gateway(_))));

        // Next call should succeed
        assert!(gateway.submit(&instrument, &market_buy()).await.is_ok());
        assert_eq!(gateway.submitted().len(), 1);
    }

    #[tokio::test]
    async fn test_stub_status_error_until_cleared() {
        let (gateway, instrument) = stub();
        let handle = gateway.submit(&instrument, &market_buy()).await.unwrap();

        gateway.set_status_error(Some("connection reset"));
        assert!(matches!(
            gateway.get_status(&handle).await,
            Err(ExecError::Gateway(reason)) if reason == "connection reset"
        ));

        gateway.set_status_error(None);
        assert_eq!(gateway.get_status(&handle).await.unwrap(), OrderStatus::Submitted);
    }

    #[tokio::test]
    async fn test_stub_unknown_contract() {
        let (gateway, _) = stub();
        let result = gateway.get_instrument_details(&Symbol::parse("MSFT").unwrap()).await;
        assert!(matches!(result, Err(ExecError::ContractNotFound(_))));
    }

    #[tokio::test]
    async fn test_stub_counts_disconnects() {
        let (gateway, _) = stub();
        gateway.disconnect().await.unwrap();
        assert_eq!(gateway.disconnect_count(), 1);
        assert_eq!(gateway.call_count(), 0);
    }
}
