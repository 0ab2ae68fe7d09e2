//! Risk sizing: limit price, stop loss and share quantity.
//!
//! All functions here are pure and deterministic. Currency values are
//! rounded to cents (half away from zero) as soon as they are derived, and
//! every check runs on the rounded value, which is the value the broker sees.
//!
//! ```text
//! limit    = round(latest × (1 ± offset%))
//! stop     = input, or round(limit × (1 ∓ default%))
//! quantity = floor(dollar_risk / |limit − stop| × tier)
//! invested = quantity × limit            (must be ≤ dollar threshold)
//! ```

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::debug;

use bracketeer_domain::{round_currency, OrderAction, PositionTier, Price, ShareQuantity};

use crate::error::{EngineError, EngineResult};

// =============================================================================
// Policy
// =============================================================================

/// Percentages used to derive prices the trader did not enter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SizingPolicy {
    /// Distance of the limit price from the latest quote, in percent
    limit_offset_percent: Decimal,
    /// Stop distance used when no stop is entered, in percent
    default_stop_loss_percent: Decimal,
}

impl SizingPolicy {
    /// Create a policy with validation
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRiskInputs` unless both percentages are
    /// in `(0, 100)`.
    pub fn new(
        limit_offset_percent: Decimal,
        default_stop_loss_percent: Decimal,
    ) -> EngineResult<Self> {
        validate_percent("limit offset", limit_offset_percent)?;
        validate_percent("default stop loss", default_stop_loss_percent)?;

        Ok(Self {
            limit_offset_percent,
            default_stop_loss_percent,
        })
    }

    /// Limit offset in percent
    pub fn limit_offset_percent(&self) -> Decimal {
        self.limit_offset_percent
    }

    /// Default stop loss distance in percent
    pub fn default_stop_loss_percent(&self) -> Decimal {
        self.default_stop_loss_percent
    }
}

impl Default for SizingPolicy {
    /// 1% marketable-limit offset, 5% default stop.
    fn default() -> Self {
        Self {
            limit_offset_percent: Decimal::ONE,
            default_stop_loss_percent: Decimal::from(5),
        }
    }
}

fn validate_percent(name: &str, value: Decimal) -> EngineResult<()> {
    if value <= Decimal::ZERO || value >= Decimal::ONE_HUNDRED {
        return Err(EngineError::InvalidRiskInputs(format!(
            "{} percent must be between 0 and 100, got {}",
            name, value
        )));
    }
    Ok(())
}

// =============================================================================
// Risk Inputs
// =============================================================================

/// What the trader asked for.
///
/// The stop loss is kept as entered; an empty string means "use the default".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskInputs {
    action: OrderAction,
    tier: PositionTier,
    stop_loss: String,
    dollar_risk: Decimal,
    dollar_threshold: Decimal,
}

impl RiskInputs {
    /// Default dollar risk per order
    pub fn default_dollar_risk() -> Decimal {
        Decimal::from(50)
    }

    /// Default cap on capital committed per order
    pub fn default_dollar_threshold() -> Decimal {
        Decimal::from(10_000)
    }

    /// Create risk inputs with validation
    ///
    /// # Errors
    /// Returns `EngineError::InvalidRiskInputs` if the dollar risk or the
    /// dollar threshold is not positive.
    pub fn new(
        action: OrderAction,
        tier: PositionTier,
        stop_loss: impl Into<String>,
        dollar_risk: Decimal,
        dollar_threshold: Decimal,
    ) -> EngineResult<Self> {
        validate_budget(dollar_risk, dollar_threshold)?;

        Ok(Self {
            action,
            tier,
            stop_loss: stop_loss.into(),
            dollar_risk,
            dollar_threshold,
        })
    }

    /// Entry direction
    pub fn action(&self) -> OrderAction {
        self.action
    }

    /// Position tier
    pub fn tier(&self) -> PositionTier {
        self.tier
    }

    /// Stop loss as entered (may be empty)
    pub fn stop_loss(&self) -> &str {
        &self.stop_loss
    }

    /// Dollar risk budget
    pub fn dollar_risk(&self) -> Decimal {
        self.dollar_risk
    }

    /// Dollar threshold
    pub fn dollar_threshold(&self) -> Decimal {
        self.dollar_threshold
    }
}

fn validate_budget(dollar_risk: Decimal, dollar_threshold: Decimal) -> EngineResult<()> {
    if dollar_risk <= Decimal::ZERO {
        return Err(EngineError::InvalidRiskInputs(format!(
            "Dollar risk must be greater than 0, got {}",
            dollar_risk
        )));
    }
    if dollar_threshold <= Decimal::ZERO {
        return Err(EngineError::InvalidRiskInputs(format!(
            "Dollar threshold must be greater than 0, got {}",
            dollar_threshold
        )));
    }
    Ok(())
}

// =============================================================================
// Sized Order
// =============================================================================

/// Fully validated sizing result.
///
/// # Invariants
/// - BUY: `stop_loss_price < limit_price`; SELL: `stop_loss_price > limit_price`
/// - `quantity >= 1`
/// - `invested_amount = quantity × limit_price <= dollar_threshold`
///
/// Only [`size_order`] can build one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizedOrder {
    action: OrderAction,
    tier: PositionTier,
    latest_price: Price,
    limit_price: Price,
    stop_loss_price: Price,
    quantity: ShareQuantity,
    invested_amount: Decimal,
    stop_loss_percent: Decimal,
    dollar_risk: Decimal,
    dollar_threshold: Decimal,
}

impl SizedOrder {
    /// Entry direction
    pub fn action(&self) -> OrderAction {
        self.action
    }

    /// Position tier used for sizing
    pub fn tier(&self) -> PositionTier {
        self.tier
    }

    /// Quote the limit was derived from
    pub fn latest_price(&self) -> Price {
        self.latest_price
    }

    /// Entry limit price (cents)
    pub fn limit_price(&self) -> Price {
        self.limit_price
    }

    /// Protective stop trigger (cents)
    pub fn stop_loss_price(&self) -> Price {
        self.stop_loss_price
    }

    /// Shares to trade
    pub fn quantity(&self) -> ShareQuantity {
        self.quantity
    }

    /// Quantity × limit price
    pub fn invested_amount(&self) -> Decimal {
        self.invested_amount
    }

    /// Stop distance as a percentage of the limit price (2dp)
    pub fn stop_loss_percent(&self) -> Decimal {
        self.stop_loss_percent
    }

    /// Dollar risk budget used
    pub fn dollar_risk(&self) -> Decimal {
        self.dollar_risk
    }

    /// Dollar threshold checked against
    pub fn dollar_threshold(&self) -> Decimal {
        self.dollar_threshold
    }
}

// =============================================================================
// Sizing Functions
// =============================================================================

/// Marketable limit price: the latest quote moved `offset_percent` against us.
///
/// BUY → above the quote, SELL → below, rounded to cents.
///
/// # Examples
/// ```
/// # use bracketeer_domain::{OrderAction, Price};
/// # use bracketeer_engine::derive_limit_price;
/// # use rust_decimal_macros::dec;
/// let latest = Price::new(dec!(187.43)).unwrap();
/// let buy = derive_limit_price(latest, OrderAction::Buy, dec!(1)).unwrap();
/// assert_eq!(buy.as_decimal(), dec!(189.30)); // 189.3043
/// let sell = derive_limit_price(latest, OrderAction::Sell, dec!(1)).unwrap();
/// assert_eq!(sell.as_decimal(), dec!(185.56)); // 185.5557
/// ```
///
/// # Errors
/// Returns `EngineError::Domain` if the rounded price is not positive.
pub fn derive_limit_price(
    latest: Price,
    action: OrderAction,
    offset_percent: Decimal,
) -> EngineResult<Price> {
    let offset = offset_percent / Decimal::ONE_HUNDRED;
    let factor = match action {
        OrderAction::Buy => Decimal::ONE + offset,
        OrderAction::Sell => Decimal::ONE - offset,
    };

    Ok(Price::new_rounded(latest.as_decimal() * factor)?)
}

/// Stop loss price for an entry at `limit`.
///
/// An empty `input` derives the stop `default_percent` away from the limit
/// (below for BUY, above for SELL). The result is rounded to cents and must
/// sit strictly on the protective side of the limit.
///
/// # Errors
/// Returns `EngineError::InvalidStopLoss` if the input is not a number, is
/// not positive, or is on the wrong side of (or equal to) the limit.
pub fn compute_stop_loss(
    input: &str,
    limit: Price,
    action: OrderAction,
    default_percent: Decimal,
) -> EngineResult<Price> {
    let raw = input.trim();
    let limit_value = limit.as_decimal();

    let stop = if raw.is_empty() {
        validate_percent("default stop loss", default_percent)?;
        let distance = default_percent / Decimal::ONE_HUNDRED;
        match action {
            OrderAction::Buy => limit_value * (Decimal::ONE - distance),
            OrderAction::Sell => limit_value * (Decimal::ONE + distance),
        }
    } else {
        Decimal::from_str(raw).map_err(|_| EngineError::InvalidStopLoss {
            stop: raw.to_string(),
            limit: limit_value,
            reason: "Stop loss must be a valid number".to_string(),
        })?
    };

    let stop = round_currency(stop);
    let invalid = |reason: &str| EngineError::InvalidStopLoss {
        stop: stop.to_string(),
        limit: limit_value,
        reason: reason.to_string(),
    };

    if stop <= Decimal::ZERO {
        return Err(invalid("Stop loss must be greater than 0"));
    }

    match action {
        OrderAction::Buy if stop >= limit_value => {
            Err(invalid("Stop loss must be less than the limit price for BUY"))
        },
        OrderAction::Sell if stop <= limit_value => {
            Err(invalid("Stop loss must be greater than the limit price for SELL"))
        },
        _ => Ok(Price::new(stop)?),
    }
}

/// Whole shares that risk at most `dollar_risk` between `limit` and `stop`.
///
/// ```text
/// quantity = floor(dollar_risk / |limit − stop| × tier)
/// ```
///
/// # Examples
/// ```
/// # use bracketeer_domain::{PositionTier, Price};
/// # use bracketeer_engine::compute_quantity;
/// # use rust_decimal_macros::dec;
/// let limit = Price::new(dec!(100)).unwrap();
/// let stop = Price::new(dec!(95)).unwrap();
/// let qty = compute_quantity(dec!(50), dec!(10000), limit, stop, PositionTier::Full).unwrap();
/// assert_eq!(qty.as_u64(), 10);
/// ```
///
/// # Errors
/// - `InvalidRiskInputs` if the dollar risk or threshold is not positive
/// - `InvalidStopLoss` if `limit == stop`
/// - `QuantityTooSmall` if the result is below one share
/// - `ThresholdExceeded` if `quantity × limit > dollar_threshold`
pub fn compute_quantity(
    dollar_risk: Decimal,
    dollar_threshold: Decimal,
    limit: Price,
    stop: Price,
    tier: PositionTier,
) -> EngineResult<ShareQuantity> {
    validate_budget(dollar_risk, dollar_threshold)?;

    let per_share_risk = (limit.as_decimal() - stop.as_decimal()).abs();
    if per_share_risk.is_zero() {
        return Err(EngineError::InvalidStopLoss {
            stop: stop.to_string(),
            limit: limit.as_decimal(),
            reason: "Stop loss must differ from the limit price".to_string(),
        });
    }

    let quantity = dollar_risk
        .checked_div(per_share_risk)
        .and_then(|shares| shares.checked_mul(tier.multiplier()))
        .ok_or_else(|| {
            EngineError::InvalidRiskInputs(format!(
                "Quantity overflow: {} / {}",
                dollar_risk, per_share_risk
            ))
        })?
        .floor();

    if quantity < Decimal::ONE {
        return Err(EngineError::QuantityTooSmall {
            dollar_risk,
            per_share_risk,
            tier,
            quantity,
        });
    }

    let invested = quantity
        .checked_mul(limit.as_decimal())
        .ok_or_else(|| EngineError::InvalidRiskInputs("Invested amount overflow".to_string()))?;

    if invested > dollar_threshold {
        return Err(EngineError::ThresholdExceeded {
            invested,
            threshold: dollar_threshold,
        });
    }

    let shares = quantity.to_u64().ok_or_else(|| {
        EngineError::InvalidRiskInputs(format!("Quantity {} does not fit in u64", quantity))
    })?;

    Ok(ShareQuantity::new(shares)?)
}

/// Size an order from the trader's inputs and the latest quote.
///
/// Chains [`derive_limit_price`], [`compute_stop_loss`] and
/// [`compute_quantity`].
///
/// # Errors
/// Any error of the three steps, unchanged.
pub fn size_order(
    inputs: &RiskInputs,
    latest_price: Price,
    policy: &SizingPolicy,
) -> EngineResult<SizedOrder> {
    let action = inputs.action();
    let limit_price = derive_limit_price(latest_price, action, policy.limit_offset_percent())?;
    let stop_loss_price = compute_stop_loss(
        inputs.stop_loss(),
        limit_price,
        action,
        policy.default_stop_loss_percent(),
    )?;
    let quantity = compute_quantity(
        inputs.dollar_risk(),
        inputs.dollar_threshold(),
        limit_price,
        stop_loss_price,
        inputs.tier(),
    )?;

    let invested_amount = quantity.as_decimal() * limit_price.as_decimal();
    let distance = (limit_price.as_decimal() - stop_loss_price.as_decimal()).abs();
    let stop_loss_percent =
        round_currency(distance / limit_price.as_decimal() * Decimal::ONE_HUNDRED);

    debug!(
        %action,
        latest = %latest_price,
        limit = %limit_price,
        stop = %stop_loss_price,
        %quantity,
        invested = %invested_amount,
        "Order sized"
    );

    Ok(SizedOrder {
        action,
        tier: inputs.tier(),
        latest_price,
        limit_price,
        stop_loss_price,
        quantity,
        invested_amount,
        stop_loss_percent,
        dollar_risk: inputs.dollar_risk(),
        dollar_threshold: inputs.dollar_threshold(),
    })
}

// =============================================================================
// Tests
// =============================================================================
