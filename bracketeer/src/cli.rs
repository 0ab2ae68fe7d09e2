//! Command-line arguments.

use clap::Parser;
use rust_decimal::Decimal;

use bracketeer_domain::{EntryKind, OrderAction, PositionTier};
use bracketeer_engine::RiskInputs;
use bracketeer_exec::{ExecError, OrderRequest};

use crate::config::Config;
use crate::error::AppResult;

/// Size and submit a bracket order (entry + protective stop)
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Ticker symbol (e.g. AAPL)
    #[arg(short, long)]
    pub symbol: String,

    /// BUY or SELL
    #[arg(short, long)]
    pub action: OrderAction,

    /// Position tier: full, half, quarter (or 1.0, 0.5, 0.25)
    #[arg(short, long, default_value = "full")]
    pub tier: PositionTier,

    /// Stop loss price; defaults to a fixed percentage from the limit
    #[arg(long)]
    pub stop_loss: Option<String>,

    /// Dollar risk per order [default: BRACKETEER_DOLLAR_RISK or 50]
    #[arg(long)]
    pub dollar_risk: Option<Decimal>,

    /// Cap on capital committed [default: BRACKETEER_DOLLAR_THRESHOLD or 10000]
    #[arg(long)]
    pub dollar_threshold: Option<Decimal>,

    /// Entry order type: MARKET, LIMIT or MIDPOINT
    #[arg(long, default_value = "MARKET")]
    pub order_type: EntryKind,

    /// Submit without asking for confirmation
    #[arg(short, long)]
    pub yes: bool,
}

impl Cli {
    /// Turn the arguments into an order request.
    ///
    /// The symbol is trimmed and upper-cased here, before validation.
    /// Budgets not given on the command line come from `config`.
    pub fn order_request(&self, config: &Config) -> AppResult<OrderRequest> {
        let inputs = RiskInputs::new(
            self.action,
            self.tier,
            self.stop_loss.clone().unwrap_or_default(),
            self.dollar_risk.unwrap_or(config.risk.dollar_risk),
            self.dollar_threshold.unwrap_or(config.risk.dollar_threshold),
        )
        .map_err(ExecError::from)?;

        Ok(OrderRequest {
            symbol: normalize_symbol(&self.symbol),
            inputs,
            entry_kind: self.order_type,
        })
    }
}

/// Trim and upper-case a symbol as typed by the trader.
pub fn normalize_symbol(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}
