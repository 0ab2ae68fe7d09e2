//! Quote resolution: symbol → instrument → usable price.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, warn};

use bracketeer_domain::{Instrument, Price, Quote, Symbol};

use crate::error::{ExecError, ExecResult};
use crate::ports::BrokerGateway;

/// Default time allowed for contract lookup plus the quote snapshot.
pub const DEFAULT_QUOTE_TIMEOUT: Duration = Duration::from_secs(2);

/// Instrument and the price sizing will start from.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedQuote {
    /// Contract the quote belongs to
    pub instrument: Instrument,
    /// Raw snapshot as returned by the broker
    pub quote: Quote,
    /// Market price, or the close when no market price is available
    pub price: Price,
}

/// Looks up the latest usable price for a symbol.
pub struct QuoteResolver<G: BrokerGateway> {
    gateway: Arc<G>,
    timeout: Duration,
}

impl<G: BrokerGateway> QuoteResolver<G> {
    /// Create a resolver with the default timeout.
    pub fn new(gateway: Arc<G>) -> Self {
        Self::with_timeout(gateway, DEFAULT_QUOTE_TIMEOUT)
    }

    /// Create a resolver with a custom timeout.
    pub fn with_timeout(gateway: Arc<G>, timeout: Duration) -> Self {
        Self { gateway, timeout }
    }

    /// Resolve a symbol to its instrument and latest price.
    ///
    /// The symbol is validated as given; no trimming or upper-casing.
    ///
    /// # Errors
    ///
    /// - `Domain(InvalidSymbol)` if the symbol is malformed
    /// - `ContractNotFound` if the broker has no such contract
    /// - `QuoteUnavailable` if neither market price nor close is usable, or
    ///   the broker did not answer in time
    pub async fn resolve(&self, symbol: &str) -> ExecResult<ResolvedQuote> {
        let symbol = Symbol::parse(symbol)?;

        let lookup = async {
            let instrument = self.gateway.get_instrument_details(&symbol).await?;
            let quote = self.gateway.get_latest_price(&instrument).await?;
            Ok::<_, ExecError>((instrument, quote))
        };

        let (instrument, quote) = timeout(self.timeout, lookup).await.map_err(|_| {
            warn!(%symbol, timeout_ms = self.timeout.as_millis() as u64, "Quote timed out");
            ExecError::QuoteUnavailable(format!(
                "{}: no answer within {}ms",
                symbol,
                self.timeout.as_millis()
            ))
        })??;

        let price = quote.best_price().ok_or_else(|| {
            ExecError::QuoteUnavailable(format!("{}: no market price or close", symbol))
        })?;

        debug!(
            %symbol,
            contract_id = instrument.contract_id,
            %price,
            market = ?quote.market_price,
            close = ?quote.close,
            "Quote resolved"
        );

        Ok(ResolvedQuote {
            instrument,
            quote,
            price,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================
