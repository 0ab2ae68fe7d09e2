//! Client Portal adapter for the broker gateway port.
//!
//! Maps Client Portal types and errors onto the execution layer's
//! vocabulary. The wire protocol itself lives in `bracketeer-connectors`.

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::RwLock;
use tracing::{debug, info, warn};

use bracketeer_connectors::{ClientPortalClient, ClientPortalError, OrderBody};
use bracketeer_domain::{Instrument, OrderLeg, OrderStatus, Quote, Symbol};
use bracketeer_exec::{BrokerGateway, ExecError, SubmissionHandle};

use crate::config::GatewayConfig;
use crate::error::AppResult;

/// Broker gateway backed by the IBKR Client Portal Web API.
pub struct ClientPortalGateway {
    client: ClientPortalClient,
    /// Broker order id → client order id, for linking child legs
    client_ids: RwLock<HashMap<String, String>>,
}

impl ClientPortalGateway {
    /// Create a gateway from configuration.
    pub fn new(config: &GatewayConfig) -> AppResult<Self> {
        let client = ClientPortalClient::new(
            config.url.clone(),
            config.account_id.clone(),
            config.accept_invalid_certs,
        )?;

        Ok(Self {
            client,
            client_ids: RwLock::new(HashMap::new()),
        })
    }

    fn parent_client_id(&self, leg: &OrderLeg) -> Result<Option<String>, ExecError> {
        let Some(parent_order_id) = leg.parent_order_id.as_deref() else {
            return Ok(None);
        };

        let client_ids = self
            .client_ids
            .read()
            .map_err(|e| ExecError::Gateway(format!("Failed to acquire read lock: {}", e)))?;

        client_ids
            .get(parent_order_id)
            .cloned()
            .map(Some)
            .ok_or_else(|| {
                ExecError::Gateway(format!(
                    "Parent order {} was not submitted in this session",
                    parent_order_id
                ))
            })
    }

    fn remember(&self, order_id: &str, client_order_id: &str) -> Result<(), ExecError> {
        self.client_ids
            .write()
            .map_err(|e| ExecError::Gateway(format!("Failed to acquire write lock: {}", e)))?
            .insert(order_id.to_string(), client_order_id.to_string());
        Ok(())
    }
}

#[async_trait]
impl BrokerGateway for ClientPortalGateway {
    async fn get_instrument_details(&self, symbol: &Symbol) -> Result<Instrument, ExecError> {
        let results = self.client.search_contracts(symbol.as_str()).await.map_err(map_error)?;

        let contract = results
            .into_iter()
            .find(|c| c.symbol == symbol.as_str())
            .ok_or_else(|| ExecError::ContractNotFound(symbol.to_string()))?;

        debug!(%symbol, conid = contract.conid, listing = ?contract.description, "Contract resolved");
        Ok(Instrument::us_stock(symbol.clone(), contract.conid))
    }

    async fn get_latest_price(&self, instrument: &Instrument) -> Result<Quote, ExecError> {
        let snapshot = self
            .client
            .market_snapshot(instrument.contract_id)
            .await
            .map_err(|e| ExecError::QuoteUnavailable(format!("{}: {}", instrument.symbol, e)))?;

        Ok(Quote::new(instrument.symbol.clone(), snapshot.last, snapshot.prior_close))
    }

    async fn get_available_cash(&self, currency: &str) -> Result<Option<Decimal>, ExecError> {
        let ledger = self.client.ledger().await.map_err(map_error)?;

        Ok(ledger
            .get(currency)
            .or_else(|| ledger.get("BASE"))
            .and_then(|entry| entry.cash_balance))
    }

    async fn submit(
        &self,
        instrument: &Instrument,
        leg: &OrderLeg,
    ) -> Result<SubmissionHandle, ExecError> {
        let parent_client_id = self.parent_client_id(leg)?;
        let body = OrderBody::from_leg(
            self.client.account_id(),
            instrument.contract_id,
            leg,
            parent_client_id,
        )
        .map_err(map_error)?;

        let placed = self.client.place_order(&body).await.map_err(|e| match e {
            ClientPortalError::ApiError { msg, .. } => ExecError::OrderRejected(msg),
            other => map_error(other),
        })?;

        self.remember(&placed.order_id, &leg.client_order_id)?;
        info!(
            order_id = %placed.order_id,
            %leg,
            status = ?placed.order_status,
            "Order placed"
        );

        Ok(SubmissionHandle::new(placed.order_id, leg.client_order_id.clone()))
    }

    async fn get_status(&self, handle: &SubmissionHandle) -> Result<OrderStatus, ExecError> {
        let response = self.client.order_status(&handle.order_id).await.map_err(map_error)?;
        Ok(map_status(&response.order_status))
    }

    async fn disconnect(&self) -> Result<(), ExecError> {
        self.client.logout().await.map_err(map_error)
    }
}

/// Map a Client Portal error onto the execution layer.
///
/// Order warnings that need an explicit reply are never answered
/// automatically; the order counts as rejected.
fn map_error(error: ClientPortalError) -> ExecError {
    match error {
        ClientPortalError::ReplyRequired { reply_id, message } => ExecError::OrderRejected(
            format!("gateway asks for confirmation ({}): {}", reply_id, message),
        ),
        other => ExecError::Gateway(other.to_string()),
    }
}

/// Map a Client Portal status name onto `OrderStatus`.
///
/// Unknown names are treated as not yet acknowledged, so the caller keeps
/// polling until its timeout.
fn map_status(status: &str) -> OrderStatus {
    match status {
        "PendingSubmit" | "ApiPending" => OrderStatus::PendingSubmit,
        "PreSubmitted" => OrderStatus::PreSubmitted,
        "Submitted" => OrderStatus::Submitted,
        "Filled" => OrderStatus::Filled,
        "Cancelled" | "ApiCancelled" | "PendingCancel" => OrderStatus::Cancelled,
        "Inactive" => OrderStatus::Inactive,
        "Rejected" => OrderStatus::Rejected("rejected by the broker".to_string()),
        other => {
            warn!(status = other, "Unknown order status");
            OrderStatus::PendingSubmit
        },
    }
}
