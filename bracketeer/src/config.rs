//! Application configuration.
//!
//! Loads configuration from environment variables with sensible defaults.

use crate::error::{AppError, AppResult};
use bracketeer_connectors::DEFAULT_GATEWAY_URL;
use bracketeer_engine::SizingPolicy;
use bracketeer_exec::ExecutorSettings;
use rust_decimal::Decimal;
use std::env;
use std::str::FromStr;
use std::time::Duration;

// =============================================================================
// Configuration
// =============================================================================

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Broker gateway configuration
    pub gateway: GatewayConfig,

    /// Risk defaults
    pub risk: RiskConfig,

    /// Timeouts for broker calls
    pub timeouts: TimeoutConfig,

    /// Emit logs as JSON lines
    pub log_json: bool,

    /// Environment (test, development, production)
    pub environment: Environment,
}

/// Broker gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Client Portal base URL
    pub url: String,
    /// Account orders are placed in
    pub account_id: String,
    /// Currency of the cash balance shown before confirmation
    pub currency: String,
    /// Trust the gateway's self-signed certificate
    pub accept_invalid_certs: bool,
}

/// Risk defaults, overridable per order from the command line.
#[derive(Debug, Clone)]
pub struct RiskConfig {
    /// Dollar risk per order
    pub dollar_risk: Decimal,
    /// Cap on capital committed per order
    pub dollar_threshold: Decimal,
    /// Marketable limit offset from the latest price, in percent
    pub limit_offset_percent: Decimal,
    /// Stop distance when none is entered, in percent
    pub default_stop_percent: Decimal,
}

/// Timeouts for broker calls.
#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    /// Contract lookup plus quote snapshot
    pub quote: Duration,
    /// Order taken and acknowledged
    pub ack: Duration,
    /// Pause between status polls
    pub ack_poll: Duration,
}

/// Environment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// Test environment (uses the stub gateway)
    Test,
    /// Development environment (paper account)
    Development,
    /// Production environment
    Production,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let environment = Self::load_environment()?;
        let gateway = Self::load_gateway_config(environment)?;
        let risk = Self::load_risk_config()?;
        let timeouts = Self::load_timeout_config()?;
        let log_json = Self::load_bool_env("BRACKETEER_LOG_JSON", false)?;

        Ok(Self {
            gateway,
            risk,
            timeouts,
            log_json,
            environment,
        })
    }

    /// Create test configuration.
    pub fn test() -> Self {
        Self {
            gateway: GatewayConfig {
                url: "http://127.0.0.1:0/v1/api".to_string(),
                account_id: "DU0000000".to_string(),
                currency: "USD".to_string(),
                accept_invalid_certs: true,
            },
            timeouts: TimeoutConfig {
                quote: Duration::from_millis(500),
                ack: Duration::from_millis(500),
                ack_poll: Duration::from_millis(10),
            },
            environment: Environment::Test,
            ..Self::default()
        }
    }

    /// Executor settings derived from this configuration.
    pub fn executor_settings(&self) -> AppResult<ExecutorSettings> {
        let policy =
            SizingPolicy::new(self.risk.limit_offset_percent, self.risk.default_stop_percent)
                .map_err(|e| AppError::Config(e.to_string()))?;

        Ok(ExecutorSettings {
            policy,
            currency: self.gateway.currency.clone(),
            quote_timeout: self.timeouts.quote,
            ack_timeout: self.timeouts.ack,
            ack_poll_interval: self.timeouts.ack_poll,
        })
    }

    fn load_environment() -> AppResult<Environment> {
        let env_str = env::var("BRACKETEER_ENV").unwrap_or_else(|_| "development".to_string());

        match env_str.to_lowercase().as_str() {
            "test" => Ok(Environment::Test),
            "development" | "dev" => Ok(Environment::Development),
            "production" | "prod" => Ok(Environment::Production),
            other => Err(AppError::Config(format!(
                "Invalid BRACKETEER_ENV: {}. Expected: test, development, production",
                other
            ))),
        }
    }

    fn load_gateway_config(environment: Environment) -> AppResult<GatewayConfig> {
        let url =
            env::var("BRACKETEER_GATEWAY_URL").unwrap_or_else(|_| DEFAULT_GATEWAY_URL.to_string());
        let currency = env::var("BRACKETEER_CURRENCY").unwrap_or_else(|_| "USD".to_string());
        let accept_invalid_certs = Self::load_bool_env("BRACKETEER_ACCEPT_INVALID_CERTS", true)?;

        let account_id = match (env::var("BRACKETEER_ACCOUNT_ID"), environment) {
            (Ok(id), _) if !id.trim().is_empty() => id.trim().to_string(),
            (_, Environment::Test) => "DU0000000".to_string(),
            _ => {
                return Err(AppError::Config(
                    "BRACKETEER_ACCOUNT_ID is required outside the test environment".to_string(),
                ))
            },
        };

        Ok(GatewayConfig {
            url,
            account_id,
            currency,
            accept_invalid_certs,
        })
    }

    fn load_risk_config() -> AppResult<RiskConfig> {
        let dollar_risk = Self::load_decimal_env("BRACKETEER_DOLLAR_RISK", Decimal::from(50))?;
        let dollar_threshold =
            Self::load_decimal_env("BRACKETEER_DOLLAR_THRESHOLD", Decimal::from(10_000))?;
        let limit_offset_percent =
            Self::load_decimal_env("BRACKETEER_LIMIT_OFFSET_PERCENT", Decimal::ONE)?;
        let default_stop_percent =
            Self::load_decimal_env("BRACKETEER_DEFAULT_STOP_PERCENT", Decimal::from(5))?;

        Ok(RiskConfig {
            dollar_risk,
            dollar_threshold,
            limit_offset_percent,
            default_stop_percent,
        })
    }

    fn load_timeout_config() -> AppResult<TimeoutConfig> {
        Ok(TimeoutConfig {
            quote: Self::load_millis_env("BRACKETEER_QUOTE_TIMEOUT_MS", 2_000)?,
            ack: Self::load_millis_env("BRACKETEER_ACK_TIMEOUT_MS", 5_000)?,
            ack_poll: Self::load_millis_env("BRACKETEER_ACK_POLL_MS", 250)?,
        })
    }

    fn load_decimal_env(key: &str, default: Decimal) -> AppResult<Decimal> {
        match env::var(key) {
            Ok(val) => Decimal::from_str(&val)
                .map_err(|_| AppError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }

    fn load_millis_env(key: &str, default: u64) -> AppResult<Duration> {
        match env::var(key) {
            Ok(val) => val
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|_| AppError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(Duration::from_millis(default)),
        }
    }

    fn load_bool_env(key: &str, default: bool) -> AppResult<bool> {
        match env::var(key) {
            Ok(val) => parse_bool(&val)
                .ok_or_else(|| AppError::Config(format!("Invalid {} value: {}", key, val))),
            Err(_) => Ok(default),
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig {
                url: DEFAULT_GATEWAY_URL.to_string(),
                account_id: String::new(),
                currency: "USD".to_string(),
                accept_invalid_certs: true,
            },
            risk: RiskConfig {
                dollar_risk: Decimal::from(50),
                dollar_threshold: Decimal::from(10_000),
                limit_offset_percent: Decimal::ONE,
                default_stop_percent: Decimal::from(5),
            },
            timeouts: TimeoutConfig {
                quote: Duration::from_millis(2_000),
                ack: Duration::from_millis(5_000),
                ack_poll: Duration::from_millis(250),
            },
            log_json: false,
            environment: Environment::Development,
        }
    }
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Test => write!(f, "test"),
            Environment::Development => write!(f, "development"),
            Environment::Production => write!(f, "production"),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
