//! Bracketeer
//!
//! Size and submit one bracket order (entry + protective stop).
//!
//! # Usage
//!
//! ```bash
//! # Full position, default stop, market entry
//! bracketeer --symbol AAPL --action BUY
//!
//! # Half position with an explicit stop, against the stub gateway
//! BRACKETEER_ENV=test bracketeer -s AAPL -a BUY -t half --stop-loss 95
//! ```
//!
//! # Environment Variables
//!
//! - `BRACKETEER_ENV`: Environment (test, development, production)
//! - `BRACKETEER_GATEWAY_URL`: Client Portal base URL (default: https://localhost:5000/v1/api)
//! - `BRACKETEER_ACCOUNT_ID`: Account to trade in (required outside test)
//! - `BRACKETEER_DOLLAR_RISK`: Default dollar risk (default: 50)
//! - `BRACKETEER_DOLLAR_THRESHOLD`: Default capital cap (default: 10000)
//! - `BRACKETEER_LOG_JSON`: Log as JSON lines (default: false)

use std::sync::Arc;

use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bracketeer::{
    demo_gateway, report, run_order, AppError, AppResult, Cli, ClientPortalGateway, Config, Environment,
    TerminalPrompt,
};
use bracketeer_exec::{AutoConfirm, ConfirmationPort, PlacementOutcome};

/// Exit code after Ctrl-C (128 + SIGINT).
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => exit_with(e),
    };

    // Initialize tracing (stderr, so the preview and prompt stay readable)
    let filter = EnvFilter::from_default_env().add_directive("bracketeer=info".parse()?);
    if config.log_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(fmt::layer().with_writer(std::io::stderr))
            .with(filter)
            .init();
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        gateway = %config.gateway.url,
        "Bracketeer"
    );

    match place(&cli, &config).await {
        Ok(outcome @ PlacementOutcome::Interrupted) => {
            println!("{}", report(&outcome));
            // The prompt's reader thread is still blocked on stdin.
            std::process::exit(INTERRUPTED_EXIT_CODE)
        },
        Ok(outcome) => {
            println!("{}", report(&outcome));
            Ok(())
        },
        Err(e) => exit_with(e),
    }
}

fn exit_with(error: AppError) -> ! {
    eprintln!("Error: {}", error);
    std::process::exit(error.exit_code())
}

async fn place(cli: &Cli, config: &Config) -> AppResult<PlacementOutcome> {
    let request = cli.order_request(config)?;
    let settings = config.executor_settings()?;

    let confirmer: Box<dyn ConfirmationPort> = if cli.yes {
        Box::new(AutoConfirm(true))
    } else {
        Box::new(TerminalPrompt)
    };

    match config.environment {
        Environment::Test => {
            let gateway = Arc::new(demo_gateway(&request.symbol));
            run_order(gateway, settings, &request, confirmer.as_ref()).await
        },
        Environment::Development | Environment::Production => {
            let gateway = Arc::new(ClientPortalGateway::new(&config.gateway)?);
            run_order(gateway, settings, &request, confirmer.as_ref()).await
        },
    }
}
