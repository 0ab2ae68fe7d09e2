//! Value Objects for the Bracketeer Domain
//!
//! Immutable, validated domain primitives.
//! All value objects enforce invariants at construction time.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Domain errors for value object validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DomainError {
    /// Price must be positive
    #[error("Invalid price: {0}")]
    InvalidPrice(String),

    /// Quantity must be a positive whole number of shares
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    /// Symbol must be 1-5 uppercase letters
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Position tier must be one of Full, Half, Quarter
    #[error("Invalid position tier: {0}")]
    InvalidPositionTier(String),

    /// Action must be BUY or SELL
    #[error("Invalid action: {0}")]
    InvalidAction(String),

    /// Entry order kind must be MARKET, LIMIT or MIDPOINT
    #[error("Invalid order kind: {0}")]
    InvalidOrderKind(String),
}

/// Number of decimal places used for every currency amount sent to the broker.
pub const CURRENCY_DP: u32 = 2;

/// Round a currency amount to cents, half away from zero.
///
/// This is the only rounding rule in the system: limit prices, stop prices
/// and the stop-loss percentage all go through it.
///
/// ```
/// # use bracketeer_domain::value_objects::round_currency;
/// # use rust_decimal_macros::dec;
/// assert_eq!(round_currency(dec!(101.005)), dec!(101.01));
/// assert_eq!(round_currency(dec!(-0.125)), dec!(-0.13));
/// ```
pub fn round_currency(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(CURRENCY_DP, RoundingStrategy::MidpointAwayFromZero)
}

// =============================================================================
// Price
// =============================================================================

/// Price represents a positive decimal price
///
/// # Invariants
/// - Must be > 0
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Price(Decimal);

impl Price {
    /// Create a new Price with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidPrice` if value <= 0
    pub fn new(value: Decimal) -> Result<Self, DomainError> {
        if value <= Decimal::ZERO {
            return Err(DomainError::InvalidPrice(format!("Price must be positive, got {}", value)));
        }
        Ok(Self(value))
    }

    /// Create a Price rounded to cents
    ///
    /// Validation happens after rounding, so `0.004` is rejected.
    pub fn new_rounded(value: Decimal) -> Result<Self, DomainError> {
        Self::new(round_currency(value))
    }

    /// Get the underlying Decimal value
    pub fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Same price rounded to cents
    pub fn rounded(&self) -> Decimal {
        round_currency(self.0)
    }
}

impl TryFrom<Decimal> for Price {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Price> for Decimal {
    fn from(price: Price) -> Self {
        price.0
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// ShareQuantity
// =============================================================================

/// Whole number of shares
///
/// # Invariants
/// - Must be >= 1
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct ShareQuantity(u64);

impl ShareQuantity {
    /// Create a new ShareQuantity with validation
    ///
    /// # Errors
    /// Returns `DomainError::InvalidQuantity` if value is 0
    pub fn new(value: u64) -> Result<Self, DomainError> {
        if value == 0 {
            return Err(DomainError::InvalidQuantity("Quantity must be at least 1 share".to_string()));
        }
        Ok(Self(value))
    }

    /// Number of shares
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    /// Number of shares as a Decimal (for notional math)
    pub fn as_decimal(&self) -> Decimal {
        Decimal::from(self.0)
    }
}

impl TryFrom<u64> for ShareQuantity {
    type Error = DomainError;

    fn try_from(value: u64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ShareQuantity> for u64 {
    fn from(quantity: ShareQuantity) -> Self {
        quantity.0
    }
}

impl fmt::Display for ShareQuantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Symbol
// =============================================================================

/// Ticker symbol of a US-listed stock (e.g., AAPL)
///
/// # Invariants
/// - 1 to 5 characters
/// - ASCII uppercase letters only
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Symbol(String);

impl Symbol {
    /// Maximum ticker length accepted
    pub const MAX_LEN: usize = 5;

    /// Parse a ticker symbol
    ///
    /// No normalisation happens here: `"aapl"` is rejected.
    ///
    /// # Examples
    /// ```
    /// # use bracketeer_domain::value_objects::Symbol;
    /// let symbol = Symbol::parse("AAPL").unwrap();
    /// assert_eq!(symbol.as_str(), "AAPL");
    /// assert!(Symbol::parse("aapl").is_err());
    /// assert!(Symbol::parse("BRK.B").is_err());
    /// ```
    ///
    /// # Errors
    /// Returns `DomainError::InvalidSymbol` if format is invalid
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        if raw.is_empty() || raw.len() > Self::MAX_LEN {
            return Err(DomainError::InvalidSymbol(format!(
                "'{}' must be between 1 and {} characters",
                raw,
                Self::MAX_LEN
            )));
        }

        if !raw.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(DomainError::InvalidSymbol(format!(
                "'{}' must contain uppercase letters only",
                raw
            )));
        }

        Ok(Self(raw.to_string()))
    }

    /// Get the ticker as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Symbol {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Symbol> for String {
    fn from(symbol: Symbol) -> Self {
        symbol.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// OrderAction
// =============================================================================

/// Direction of the entry order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderAction {
    /// Buy order (opens a long position)
    Buy,
    /// Sell order (opens a short position)
    Sell,
}

impl OrderAction {
    /// Action of the protective leg
    ///
    /// Buy → Sell, Sell → Buy
    pub fn opposite(&self) -> OrderAction {
        match self {
            OrderAction::Buy => OrderAction::Sell,
            OrderAction::Sell => OrderAction::Buy,
        }
    }
}

impl fmt::Display for OrderAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OrderAction::Buy => write!(f, "BUY"),
            OrderAction::Sell => write!(f, "SELL"),
        }
    }
}

impl FromStr for OrderAction {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "BUY" => Ok(OrderAction::Buy),
            "SELL" => Ok(OrderAction::Sell),
            other => Err(DomainError::InvalidAction(format!(
                "'{}' (expected BUY or SELL)",
                other
            ))),
        }
    }
}

// =============================================================================
// PositionTier
// =============================================================================

/// Fraction of the fully-sized position to trade
///
/// Scales the share quantity derived from the dollar risk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PositionTier {
    /// 0.25 of the full size
    Quarter,
    /// 0.5 of the full size
    Half,
    /// 1.0 (full size)
    Full,
}

impl PositionTier {
    /// All tiers, smallest first
    pub const ALL: [PositionTier; 3] = [PositionTier::Quarter, PositionTier::Half, PositionTier::Full];

    /// Multiplier applied to the risk-derived quantity
    pub fn multiplier(&self) -> Decimal {
        match self {
            PositionTier::Quarter => Decimal::new(25, 2),
            PositionTier::Half => Decimal::new(5, 1),
            PositionTier::Full => Decimal::ONE,
        }
    }
}

impl TryFrom<Decimal> for PositionTier {
    type Error = DomainError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|tier| tier.multiplier() == value)
            .ok_or_else(|| {
                DomainError::InvalidPositionTier(format!("{} (expected 0.25, 0.5 or 1)", value))
            })
    }
}

impl FromStr for PositionTier {
    type Err = DomainError;

    /// Accepts tier names (`full`, `half`, `quarter`) or multipliers (`0.25`, `0.5`, `1.0`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "full" => return Ok(PositionTier::Full),
            "half" => return Ok(PositionTier::Half),
            "quarter" => return Ok(PositionTier::Quarter),
            _ => {},
        }

        let value = Decimal::from_str(trimmed)
            .map_err(|_| DomainError::InvalidPositionTier(format!("'{}'", trimmed)))?;
        Self::try_from(value)
    }
}

impl fmt::Display for PositionTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PositionTier::Quarter => write!(f, "Quarter"),
            PositionTier::Half => write!(f, "Half"),
            PositionTier::Full => write!(f, "Full"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
