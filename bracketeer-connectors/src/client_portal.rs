//! IBKR Client Portal Web API Client
//!
//! Provides REST integration with a locally running Client Portal gateway:
//! - Contract search
//! - Market data snapshots
//! - Account ledger (cash balances)
//! - Order placement and status
//! - Session logout
//!
//! # Authentication
//!
//! The gateway holds the brokerage session; the trader logs in through the
//! gateway's web page beforehand. Requests carry no credentials. The gateway
//! serves a self-signed certificate, so certificate checks are usually
//! disabled for `localhost`.

use reqwest::{Client, RequestBuilder};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::time::timeout;

use bracketeer_domain::{OrderLeg, OrderType};

// =============================================================================
// Constants
// =============================================================================

/// Default base URL of a local Client Portal gateway
pub const DEFAULT_GATEWAY_URL: &str = "https://localhost:5000/v1/api";

/// Request timeout in seconds
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Snapshot field: last price
const FIELD_LAST: &str = "31";

/// Snapshot field: prior session close
const FIELD_PRIOR_CLOSE: &str = "7741";

/// The first snapshot request for a contract only opens the stream; fields
/// arrive on a later one.
const SNAPSHOT_ATTEMPTS: usize = 3;

/// Pause between snapshot attempts
const SNAPSHOT_RETRY_DELAY: Duration = Duration::from_millis(300);

// =============================================================================
// Errors
// =============================================================================

/// Errors that can occur in the Client Portal client.
#[derive(Debug, Clone, Error)]
pub enum ClientPortalError {
    /// HTTP client could not be built
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    /// HTTP request failed
    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    /// Gateway returned an error
    #[error("Client Portal error: HTTP {status} - {msg}")]
    ApiError { status: u16, msg: String },

    /// Gateway wants an order warning confirmed before it accepts the order
    #[error("Order needs confirmation ({reply_id}): {message}")]
    ReplyRequired { reply_id: String, message: String },

    /// Failed to parse response
    #[error("Failed to parse response: {0}")]
    ParseError(String),

    /// Request timed out
    #[error("Request timed out")]
    Timeout,

    /// Invalid parameter
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

// =============================================================================
// Client Portal Client
// =============================================================================

/// Client Portal Web API client bound to one account.
pub struct ClientPortalClient {
    /// HTTP client
    client: Client,
    /// Gateway base URL, e.g. `https://localhost:5000/v1/api`
    base_url: String,
    /// Brokerage account id
    account_id: String,
}

impl ClientPortalClient {
    /// Create a new client.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Gateway base URL (trailing slash optional)
    /// * `account_id` - Account orders are placed in
    /// * `accept_invalid_certs` - Trust the gateway's self-signed certificate
    pub fn new(
        base_url: impl Into<String>,
        account_id: impl Into<String>,
        accept_invalid_certs: bool,
    ) -> Result<Self, ClientPortalError> {
        let client = Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .build()
            .map_err(|e| ClientPortalError::ClientBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            account_id: account_id.into(),
        })
    }

    /// Account this client trades in.
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint)
    }

    /// Send a request and return the body of a successful response.
    async fn send(&self, request: RequestBuilder) -> Result<String, ClientPortalError> {
        let response = timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS), request.send())
            .await
            .map_err(|_| ClientPortalError::Timeout)?
            .map_err(|e| ClientPortalError::RequestFailed(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| ClientPortalError::ParseError(e.to_string()))?;

        if !status.is_success() {
            let msg = serde_json::from_str::<ErrorResponse>(&body)
                .map(|err| err.error)
                .unwrap_or(body);
            return Err(ClientPortalError::ApiError {
                status: status.as_u16(),
                msg,
            });
        }

        Ok(body)
    }

    async fn get(&self, endpoint: &str, params: &[(&str, String)]) -> Result<String, ClientPortalError> {
        self.send(self.client.get(self.url(endpoint)).query(params)).await
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> Result<String, ClientPortalError> {
        self.send(self.client.post(self.url(endpoint)).json(body)).await
    }

    // =========================================================================
    // Contracts and Market Data
    // =========================================================================

    /// Search stock contracts by symbol.
    ///
    /// # Endpoint
    ///
    /// `GET /iserver/secdef/search?symbol=AAPL&secType=STK`
    pub async fn search_contracts(
        &self,
        symbol: &str,
    ) -> Result<Vec<ContractSearchResult>, ClientPortalError> {
        let params = [("symbol", symbol.to_string()), ("secType", "STK".to_string())];
        let body = self.get("/iserver/secdef/search", &params).await?;

        parse_contract_search(&body)
    }

    /// Last price and prior close for a contract.
    ///
    /// Retries while the gateway is still warming up the snapshot and
    /// returns whatever the last attempt produced.
    ///
    /// # Endpoint
    ///
    /// `GET /iserver/marketdata/snapshot?conids=265598&fields=31,7741`
    pub async fn market_snapshot(&self, conid: i64) -> Result<MarketSnapshot, ClientPortalError> {
        let params = [
            ("conids", conid.to_string()),
            ("fields", format!("{},{}", FIELD_LAST, FIELD_PRIOR_CLOSE)),
        ];

        let mut snapshot = MarketSnapshot::empty(conid);
        for attempt in 1..=SNAPSHOT_ATTEMPTS {
            let body = self.get("/iserver/marketdata/snapshot", &params).await?;
            snapshot = parse_snapshot(conid, &body)?;

            if snapshot.has_price() {
                break;
            }
            tracing::debug!(conid, attempt, "Snapshot not ready yet");
            if attempt < SNAPSHOT_ATTEMPTS {
                tokio::time::sleep(SNAPSHOT_RETRY_DELAY).await;
            }
        }

        Ok(snapshot)
    }

    // =========================================================================
    // Account API
    // =========================================================================

    /// Cash balances per currency (plus a `BASE` entry).
    ///
    /// # Endpoint
    ///
    /// `GET /portfolio/{accountId}/ledger`
    pub async fn ledger(&self) -> Result<HashMap<String, LedgerEntry>, ClientPortalError> {
        let endpoint = format!("/portfolio/{}/ledger", self.account_id);
        let body = self.get(&endpoint, &[]).await?;

        serde_json::from_str(&body).map_err(|e| ClientPortalError::ParseError(e.to_string()))
    }

    // =========================================================================
    // Order API
    // =========================================================================

    /// Place a single order.
    ///
    /// Gateway warnings that need an explicit reply are returned as
    /// `ClientPortalError::ReplyRequired` and are never answered here.
    ///
    /// # Endpoint
    ///
    /// `POST /iserver/account/{accountId}/orders`
    pub async fn place_order(&self, order: &OrderBody) -> Result<PlacedOrder, ClientPortalError> {
        let endpoint = format!("/iserver/account/{}/orders", self.account_id);
        let request = PlaceOrdersRequest {
            orders: std::slice::from_ref(order),
        };
        let body = self.post(&endpoint, &request).await?;

        parse_place_order(&body)
    }

    /// Query order status.
    ///
    /// # Endpoint
    ///
    /// `GET /iserver/account/order/status/{orderId}`
    pub async fn order_status(&self, order_id: &str) -> Result<OrderStatusResponse, ClientPortalError> {
        let endpoint = format!("/iserver/account/order/status/{}", order_id);
        let body = self.get(&endpoint, &[]).await?;

        serde_json::from_str(&body).map_err(|e| ClientPortalError::ParseError(e.to_string()))
    }

    /// End the brokerage session.
    ///
    /// # Endpoint
    ///
    /// `POST /logout`
    pub async fn logout(&self) -> Result<(), ClientPortalError> {
        self.post("/logout", &serde_json::json!({})).await.map(|_| ())
    }
}

// =============================================================================
// Client Portal Types (from API responses)
// =============================================================================

/// Client Portal error response.
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

/// Contract id as sent by the gateway: a number on some endpoints, a string
/// on others.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum Conid {
    Number(i64),
    Text(String),
}

impl Conid {
    fn value(&self) -> Result<i64, ClientPortalError> {
        match self {
            Conid::Number(n) => Ok(*n),
            Conid::Text(s) => s
                .parse()
                .map_err(|_| ClientPortalError::ParseError(format!("Invalid conid: {}", s))),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawContractSearchResult {
    conid: Conid,
    symbol: Option<String>,
    company_name: Option<String>,
    description: Option<String>,
}

/// One match of a contract search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractSearchResult {
    /// Contract id
    pub conid: i64,
    /// Ticker symbol
    pub symbol: String,
    /// Company name
    pub company_name: Option<String>,
    /// Listing exchange
    pub description: Option<String>,
}

fn parse_contract_search(body: &str) -> Result<Vec<ContractSearchResult>, ClientPortalError> {
    // An unknown symbol comes back as an error object instead of a list.
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        tracing::debug!(error = %err.error, "Contract search returned no match");
        return Ok(Vec::new());
    }

    let raw: Vec<RawContractSearchResult> =
        serde_json::from_str(body).map_err(|e| ClientPortalError::ParseError(e.to_string()))?;

    raw.into_iter()
        .map(|r| {
            Ok(ContractSearchResult {
                conid: r.conid.value()?,
                symbol: r.symbol.unwrap_or_default(),
                company_name: r.company_name,
                description: r.description,
            })
        })
        .collect()
}

#[derive(Debug, Deserialize)]
struct RawSnapshot {
    conid: Option<i64>,
    #[serde(rename = "31")]
    last: Option<String>,
    #[serde(rename = "7741")]
    prior_close: Option<String>,
}

/// Market snapshot for one contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MarketSnapshot {
    /// Contract id
    pub conid: i64,
    /// Last price (field 31)
    pub last: Option<Decimal>,
    /// Prior session close (field 7741)
    pub prior_close: Option<Decimal>,
}

impl MarketSnapshot {
    fn empty(conid: i64) -> Self {
        Self {
            conid,
            last: None,
            prior_close: None,
        }
    }

    /// Check if either price is present.
    pub fn has_price(&self) -> bool {
        self.last.is_some() || self.prior_close.is_some()
    }
}

fn parse_snapshot(conid: i64, body: &str) -> Result<MarketSnapshot, ClientPortalError> {
    let raw: Vec<RawSnapshot> =
        serde_json::from_str(body).map_err(|e| ClientPortalError::ParseError(e.to_string()))?;

    let entry = raw.into_iter().find(|r| r.conid.map_or(true, |c| c == conid));

    Ok(match entry {
        Some(r) => MarketSnapshot {
            conid,
            last: r.last.as_deref().and_then(parse_snapshot_price),
            prior_close: r.prior_close.as_deref().and_then(parse_snapshot_price),
        },
        None => MarketSnapshot::empty(conid),
    })
}

/// Parse a snapshot price field.
///
/// The gateway prefixes the last price with `C` when it is the previous
/// close and with `H` when trading is halted.
pub fn parse_snapshot_price(raw: &str) -> Option<Decimal> {
    let value = raw.trim().trim_start_matches(['C', 'H']).replace(',', "");
    Decimal::from_str(value.trim()).ok()
}

/// Ledger entry for one currency.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerEntry {
    /// Currency code
    pub currency: Option<String>,
    /// Settled cash
    #[serde(rename = "cashbalance")]
    pub cash_balance: Option<Decimal>,
}

/// Order as sent to the gateway.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderBody {
    /// Account id
    pub acct_id: String,
    /// Contract id
    pub conid: i64,
    /// Client order id
    #[serde(rename = "cOID")]
    pub c_oid: String,
    /// Client order id of the parent order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// MKT, LMT, MIDPRICE or STP
    pub order_type: String,
    /// Limit price, midpoint cap or stop trigger
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    /// BUY or SELL
    pub side: String,
    /// DAY or GTC
    pub tif: String,
    /// Shares
    pub quantity: u64,
    /// Regular trading hours only
    pub outside_rth: bool,
}

impl OrderBody {
    /// Build the wire order for a leg.
    ///
    /// `parent_c_oid` is the client order id of the already submitted
    /// parent; the gateway links children by client id.
    pub fn from_leg(
        account_id: &str,
        conid: i64,
        leg: &OrderLeg,
        parent_c_oid: Option<String>,
    ) -> Result<Self, ClientPortalError> {
        let price = match leg.order_type {
            OrderType::Market => None,
            OrderType::Limit { limit_price } => Some(limit_price),
            OrderType::Midpoint { price_cap } => Some(price_cap),
            OrderType::Stop { trigger_price } => Some(trigger_price),
        }
        .map(|p| {
            p.as_decimal().to_f64().ok_or_else(|| {
                ClientPortalError::InvalidParameter(format!("Price {} out of range", p))
            })
        })
        .transpose()?;

        Ok(Self {
            acct_id: account_id.to_string(),
            conid,
            c_oid: leg.client_order_id.clone(),
            parent_id: parent_c_oid,
            order_type: leg.order_type.code().to_string(),
            price,
            side: leg.action.to_string(),
            tif: leg.time_in_force.code().to_string(),
            quantity: leg.quantity.as_u64(),
            outside_rth: false,
        })
    }
}

#[derive(Debug, Serialize)]
struct PlaceOrdersRequest<'a> {
    orders: &'a [OrderBody],
}

/// Reply to an order placement.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PlaceOrderReply {
    Placed {
        order_id: String,
        order_status: Option<String>,
    },
    Confirmation {
        id: String,
        #[serde(default)]
        message: Vec<String>,
    },
}

/// Order accepted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedOrder {
    /// Broker order id
    pub order_id: String,
    /// Status reported with the placement, if any
    pub order_status: Option<String>,
}

fn parse_place_order(body: &str) -> Result<PlacedOrder, ClientPortalError> {
    if let Ok(err) = serde_json::from_str::<ErrorResponse>(body) {
        return Err(ClientPortalError::ApiError {
            status: 200,
            msg: err.error,
        });
    }

    let replies: Vec<PlaceOrderReply> =
        serde_json::from_str(body).map_err(|e| ClientPortalError::ParseError(e.to_string()))?;

    match replies.into_iter().next() {
        Some(PlaceOrderReply::Placed {
            order_id,
            order_status,
        }) => Ok(PlacedOrder {
            order_id,
            order_status,
        }),
        Some(PlaceOrderReply::Confirmation { id, message }) => {
            Err(ClientPortalError::ReplyRequired {
                reply_id: id,
                message: message.join(" "),
            })
        },
        None => Err(ClientPortalError::ParseError("Empty order reply".to_string())),
    }
}

/// Order status response.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusResponse {
    /// Broker order id
    pub order_id: Option<serde_json::Value>,
    /// Status name (PendingSubmit, PreSubmitted, Submitted, Filled, ...)
    pub order_status: String,
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use bracketeer_domain::{OrderAction, Price, ShareQuantity, TimeInForce};
    use rust_decimal_macros::dec;

    fn stop_leg() -> OrderLeg {
        OrderLeg::new(
            OrderAction::Sell,
            ShareQuantity::new(10).unwrap(),
            OrderType::Stop { trigger_price: Price::new(dec!(95.95)).unwrap() },
            TimeInForce::Gtc,
        )
    }

    #[test]
    fn test_parse_snapshot_price_strips_prefixes() {
        assert_eq!(parse_snapshot_price("187.43"), Some(dec!(187.43)));
        assert_eq!(parse_snapshot_price("C185.00"), Some(dec!(185.00)));
        assert_eq!(parse_snapshot_price("H12.5"), Some(dec!(12.5)));
        assert_eq!(parse_snapshot_price("1,024.10"), Some(dec!(1024.10)));
        assert_eq!(parse_snapshot_price(""), None);
        assert_eq!(parse_snapshot_price("N/A"), None);
    }

    #[test]
    fn test_parse_snapshot() {
        let body = r#"[{"conid":265598,"31":"C187.43","7741":"185.00","_updated":1712000000000}]"#;
        let snapshot = parse_snapshot(265598, body).unwrap();

        assert_eq!(snapshot.last, Some(dec!(187.43)));
        assert_eq!(snapshot.prior_close, Some(dec!(185.00)));
        assert!(snapshot.has_price());
    }

    #[test]
    fn test_parse_snapshot_not_ready() {
        let snapshot = parse_snapshot(265598, r#"[{"conid":265598}]"#).unwrap();
        assert!(!snapshot.has_price());
    }

    #[test]
    fn test_parse_contract_search() {
        let body = r#"[
            {"conid":"265598","companyName":"APPLE INC","symbol":"AAPL","description":"NASDAQ"},
            {"conid":38708077,"companyName":"APPLE INC","symbol":"AAPL","description":"MEXI"}
        ]"#;
        let results = parse_contract_search(body).unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].conid, 265598);
        assert_eq!(results[1].conid, 38708077);
        assert_eq!(results[0].description.as_deref(), Some("NASDAQ"));
    }

    #[test]
    fn test_parse_contract_search_no_match() {
        let results = parse_contract_search(r#"{"error":"No symbol found"}"#).unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_parse_place_order_success() {
        let body = r#"[{"order_id":"1234567","order_status":"PreSubmitted","encrypt_message":"1"}]"#;
        let placed = parse_place_order(body).unwrap();

        assert_eq!(placed.order_id, "1234567");
        assert_eq!(placed.order_status.as_deref(), Some("PreSubmitted"));
    }

    #[test]
    fn test_parse_place_order_reply_required() {
        let body = r#"[{"id":"07a13a5a-4a48-44a5-bb25-5ab37b79186c","message":["You are about to submit a stop order."],"isSuppressed":false,"messageIds":["o0"]}]"#;

        match parse_place_order(body) {
            Err(ClientPortalError::ReplyRequired { reply_id, message }) => {
                assert!(reply_id.starts_with("07a13a5a"));
                assert!(message.contains("stop order"));
            },
            other => panic!("Expected ReplyRequired, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_place_order_error() {
        let result = parse_place_order(r#"{"error":"Order rejected - reason: margin"}"#);
        assert!(matches!(result, Err(ClientPortalError::ApiError { .. })));
    }

    #[test]
    fn test_order_body_from_stop_leg() {
        let body =
            OrderBody::from_leg("U1234567", 265598, &stop_leg(), Some("parent-coid".to_string()))
                .unwrap();
        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["acctId"], "U1234567");
        assert_eq!(json["orderType"], "STP");
        assert_eq!(json["price"], 95.95);
        assert_eq!(json["side"], "SELL");
        assert_eq!(json["tif"], "GTC");
        assert_eq!(json["quantity"], 10);
        assert_eq!(json["parentId"], "parent-coid");
        assert!(json["cOID"].is_string());
    }

    #[test]
    fn test_market_order_body_has_no_price() {
        let leg = OrderLeg::new(
            OrderAction::Buy,
            ShareQuantity::new(10).unwrap(),
            OrderType::Market,
            TimeInForce::Day,
        );
        let json = serde_json::to_value(OrderBody::from_leg("U1", 1, &leg, None).unwrap()).unwrap();

        assert!(json.get("price").is_none());
        assert!(json.get("parentId").is_none());
        assert_eq!(json["orderType"], "MKT");
    }

    #[test]
    fn test_ledger_parsing() {
        let body = r#"{"USD":{"currency":"USD","cashbalance":25000.5},"BASE":{"currency":"BASE","cashbalance":25000.5}}"#;
        let ledger: HashMap<String, LedgerEntry> = serde_json::from_str(body).unwrap();

        assert_eq!(ledger["USD"].cash_balance, Some(dec!(25000.5)));
    }

    #[test]
    fn test_client_trims_base_url() {
        let client = ClientPortalClient::new("https://localhost:5000/v1/api/", "U1", true).unwrap();
        assert_eq!(client.url("/logout"), "https://localhost:5000/v1/api/logout");
        assert_eq!(client.account_id(), "U1");
    }
}
