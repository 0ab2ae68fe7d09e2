//! Read-only order snapshot shown to the trader before submission.

use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;

use bracketeer_domain::{
    AccountState, EntryKind, Instrument, OrderAction, PositionTier, Price, ShareQuantity, Symbol,
};
use bracketeer_engine::SizedOrder;

/// Everything the trader needs to approve or decline an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderPreview {
    /// Instrument symbol
    pub symbol: Symbol,
    /// Entry direction
    pub action: OrderAction,
    /// Position tier used for sizing
    pub tier: PositionTier,
    /// Entry order kind
    pub entry_kind: EntryKind,
    /// Entry limit price
    pub limit_price: Price,
    /// Quote the limit was derived from
    pub latest_price: Price,
    /// Shares to trade
    pub quantity: ShareQuantity,
    /// Quantity × limit price
    pub invested_amount: Decimal,
    /// Account cash (display only)
    pub account: AccountState,
    /// Protective stop trigger
    pub stop_loss_price: Price,
    /// Stop distance in percent of the limit
    pub stop_loss_percent: Decimal,
    /// Dollar risk budget
    pub dollar_risk: Decimal,
    /// Cap on capital committed
    pub dollar_threshold: Decimal,
}

impl OrderPreview {
    /// Snapshot a sized order.
    pub fn new(
        sized: &SizedOrder,
        instrument: &Instrument,
        entry_kind: EntryKind,
        account: AccountState,
    ) -> Self {
        Self {
            symbol: instrument.symbol.clone(),
            action: sized.action(),
            tier: sized.tier(),
            entry_kind,
            limit_price: sized.limit_price(),
            latest_price: sized.latest_price(),
            quantity: sized.quantity(),
            invested_amount: sized.invested_amount(),
            account,
            stop_loss_price: sized.stop_loss_price(),
            stop_loss_percent: sized.stop_loss_percent(),
            dollar_risk: sized.dollar_risk(),
            dollar_threshold: sized.dollar_threshold(),
        }
    }
}

impl fmt::Display for OrderPreview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{} {} {} ({} position), {} entry",
            self.action, self.quantity, self.symbol, self.tier, self.entry_kind
        )?;
        writeln!(f, "  Limit price:   {} (latest {})", self.limit_price, self.latest_price)?;
        writeln!(f, "  Invested:      {} of {} threshold", self.invested_amount, self.dollar_threshold)?;
        match self.account.available_cash {
            Some(cash) => writeln!(f, "  Account cash:  {} {}", cash, self.account.currency)?,
            None => writeln!(f, "  Account cash:  n/a")?,
        }
        writeln!(f, "  Dollar risk:   {}", self.dollar_risk)?;
        write!(
            f,
            "  Stop loss:     {} ({}% from limit)",
            self.stop_loss_price, self.stop_loss_percent
        )
    }
}
