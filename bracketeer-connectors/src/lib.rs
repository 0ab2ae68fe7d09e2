//! Bracketeer Broker Connectors
//!
//! Adapters for broker APIs (REST).
//! Speaks the broker's wire format; mapping to ports happens in the binary.

#![warn(clippy::all)]

// Public modules
pub mod client_portal;

// Re-exports
pub use client_portal::{
    parse_snapshot_price, ClientPortalClient, ClientPortalError, ContractSearchResult,
    LedgerEntry, MarketSnapshot, OrderBody, OrderStatusResponse, PlacedOrder, DEFAULT_GATEWAY_URL,
};
