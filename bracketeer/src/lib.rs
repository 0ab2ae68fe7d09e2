//! Bracketeer CLI Library
//!
//! Sizes one bracket order from a dollar risk budget, shows it for
//! confirmation and submits it through the broker gateway.
//!
//! # Architecture
//!
//! ```text
//! CLI → Config → Executor → BrokerSession → ClientPortalGateway → IBKR
//!                   ↑
//!            TerminalPrompt (confirmation)
//! ```
//!
//! # Components
//!
//! - **CLI**: Command-line arguments → order request
//! - **Config**: Environment-based configuration
//! - **Gateway**: Client Portal adapter for the broker port
//! - **Prompt**: Terminal confirmation
//! - **App**: Runs one order inside a broker session
//!
//! # Example
//!
//! ```rust,ignore
//! use bracketeer::{demo_gateway, run_order, Config};
//! use bracketeer_exec::AutoConfirm;
//!
//! let config = Config::test();
//! let gateway = Arc::new(demo_gateway("AAPL"));
//! let outcome = run_order(gateway, config.executor_settings()?, &request, &AutoConfirm(true)).await?;
//! ```

#![warn(clippy::all)]

pub mod app;
pub mod cli;
pub mod config;
pub mod error;
pub mod gateway;
pub mod prompt;

// Re-exports for convenience
pub use app::{demo_gateway, report, run_order, run_order_until};
pub use cli::Cli;
pub use config::{Config, Environment, GatewayConfig, RiskConfig, TimeoutConfig};
pub use error::{AppError, AppResult};
pub use gateway::ClientPortalGateway;
pub use prompt::TerminalPrompt;
