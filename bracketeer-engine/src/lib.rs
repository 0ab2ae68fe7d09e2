//! Bracketeer Engine Layer
//!
//! Pure decision logic, deterministic, no I/O.
//! Takes trader inputs and a quote → returns a sized order and its bracket.
//!
//! # Components
//!
//! - **Sizing**: limit price, stop loss and share quantity from a dollar risk budget
//! - **Assembler**: entry + protective stop legs from a sized order

#![warn(clippy::all)]

pub mod assembler;
pub mod error;
pub mod sizing;

pub use assembler::build_bracket;
pub use error::{EngineError, EngineResult};
pub use sizing::{
    compute_quantity, compute_stop_loss, derive_limit_price, size_order, RiskInputs, SizedOrder,
    SizingPolicy,
};
