//! Bracketeer Domain Layer
//!
//! Pure domain logic with zero I/O dependencies.
//! Contains entities, value objects, and domain rules.

#![warn(missing_docs)]
#![warn(clippy::all)]

// Public modules
pub mod entities;
pub mod market_data;
pub mod value_objects;

// Re-export commonly used types
pub use entities::{
    AccountState, BracketOrder, EntryKind, Instrument, OrderLeg, OrderStatus, OrderType,
    TicketId, TimeInForce,
};
pub use market_data::Quote;
pub use value_objects::{
    round_currency, DomainError, OrderAction, PositionTier, Price, ShareQuantity, Symbol,
    CURRENCY_DP,
};
