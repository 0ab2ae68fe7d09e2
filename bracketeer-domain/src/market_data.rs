//! Market Data Types
//!
//! Snapshot quotes as returned by the broker gateway.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Price, Symbol};

// =============================================================================
// Quote
// =============================================================================

/// One-off market snapshot for an instrument.
///
/// Fields are optional because the broker leaves them empty outside trading
/// hours or for instruments without market data permissions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    /// Ticker symbol
    pub symbol: Symbol,
    /// Composite market price (last trade, or midpoint when no trade is available)
    pub market_price: Option<Decimal>,
    /// Previous session close
    pub close: Option<Decimal>,
    /// When the snapshot was taken
    pub timestamp: DateTime<Utc>,
}

impl Quote {
    /// Create a new quote snapshot.
    pub fn new(symbol: Symbol, market_price: Option<Decimal>, close: Option<Decimal>) -> Self {
        Self {
            symbol,
            market_price,
            close,
            timestamp: Utc::now(),
        }
    }

    /// Best usable price: the market price, else the close.
    ///
    /// Non-positive values count as unavailable.
    ///
    /// # Examples
    /// ```
    /// # use bracketeer_domain::{Quote, Symbol};
    /// # use rust_decimal_macros::dec;
    /// let symbol = Symbol::parse("AAPL").unwrap();
    /// let quote = Quote::new(symbol, Some(dec!(-1)), Some(dec!(187.25)));
    /// assert_eq!(quote.best_price().unwrap().as_decimal(), dec!(187.25));
    /// ```
    pub fn best_price(&self) -> Option<Price> {
        self.market_price
            .and_then(|p| Price::new(p).ok())
            .or_else(|| self.close.and_then(|p| Price::new(p).ok()))
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn quote(market_price: Option<Decimal>, close: Option<Decimal>) -> Quote {
        Quote::new(Symbol::parse("SPY").unwrap(), market_price, close)
    }

    #[test]
    fn test_best_price_prefers_market_price() {
        let q = quote(Some(dec!(512.30)), Some(dec!(510.00)));
        assert_eq!(q.best_price().unwrap().as_decimal(), dec!(512.30));
    }

    #[test]
    fn test_best_price_falls_back_to_close() {
        assert_eq!(quote(None, Some(dec!(510))).best_price().unwrap().as_decimal(), dec!(510));
        assert_eq!(
            quote(Some(dec!(0)), Some(dec!(510))).best_price().unwrap().as_decimal(),
            dec!(510)
        );
    }

    #[test]
    fn test_best_price_unavailable() {
        assert!(quote(None, None).best_price().is_none());
        assert!(quote(Some(dec!(-1)), Some(dec!(0))).best_price().is_none());
    }
}
