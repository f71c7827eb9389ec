//! Runtime configuration loaded from environment variables (and `.env`).
//!
//! Optional: `PLATFORM_FEE_PERCENT`, `CONFIRMATION_TIMEOUT_SECS`,
//!           `GATEWAY_CALL_TIMEOUT_MS`, `POLL_INTERVAL_MS`, `MAX_CONFLICT_RETRIES`,
//!           `CHECKOUT_BASE_URL`, `CONFIRMATION_TOKEN_TTL_SECS`, `HTTP_BIND`

use crate::error::{PaymentError, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::str::FromStr;
use std::time::Duration;

/// Knobs the settlement coordinator and wallet engine run with.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementConfig {
    /// Share of each sale kept by the platform, in percent.
    pub platform_fee_percent: Decimal,
    /// How long an attempt may wait for the gateway before it fails.
    pub confirmation_timeout: Duration,
    /// Upper bound on any single gateway call.
    pub gateway_call_timeout: Duration,
    /// Delay between verifies while awaiting confirmation.
    pub poll_interval: Duration,
    /// Compare-and-swap retries before giving up with `Conflict`.
    pub max_conflict_retries: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            platform_fee_percent: dec!(10),
            confirmation_timeout: Duration::from_secs(30),
            gateway_call_timeout: Duration::from_millis(5000),
            poll_interval: Duration::from_millis(1000),
            max_conflict_retries: 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub settlement: SettlementConfig,
    /// Base of the redirect URLs handed out by the simulated gateways.
    pub checkout_base_url: String,
    pub confirmation_token_ttl: Duration,
    pub http_bind: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            settlement: SettlementConfig::default(),
            checkout_base_url: "https://checkout.lessonpay.test".to_string(),
            confirmation_token_ttl: Duration::from_secs(86_400),
            http_bind: "127.0.0.1:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads `.env` if present, then reads the process environment.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup; unset keys take defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let platform_fee_percent = parse_or(
            &lookup,
            "PLATFORM_FEE_PERCENT",
            defaults.settlement.platform_fee_percent,
        )?;
        if platform_fee_percent < Decimal::ZERO || platform_fee_percent > dec!(99) {
            return Err(PaymentError::Config(format!(
                "PLATFORM_FEE_PERCENT must be in [0, 99], got {platform_fee_percent}"
            )));
        }

        let confirmation_timeout = Duration::from_secs(parse_or(
            &lookup,
            "CONFIRMATION_TIMEOUT_SECS",
            defaults.settlement.confirmation_timeout.as_secs(),
        )?);
        let gateway_call_timeout = Duration::from_millis(parse_or(
            &lookup,
            "GATEWAY_CALL_TIMEOUT_MS",
            defaults.settlement.gateway_call_timeout.as_millis() as u64,
        )?);
        let poll_interval = Duration::from_millis(parse_or(
            &lookup,
            "POLL_INTERVAL_MS",
            defaults.settlement.poll_interval.as_millis() as u64,
        )?);
        let max_conflict_retries = parse_or(
            &lookup,
            "MAX_CONFLICT_RETRIES",
            defaults.settlement.max_conflict_retries,
        )?;

        let checkout_base_url =
            lookup("CHECKOUT_BASE_URL").unwrap_or(defaults.checkout_base_url);
        let confirmation_token_ttl = Duration::from_secs(parse_or(
            &lookup,
            "CONFIRMATION_TOKEN_TTL_SECS",
            defaults.confirmation_token_ttl.as_secs(),
        )?);
        let http_bind = lookup("HTTP_BIND").unwrap_or(defaults.http_bind);

        Ok(Self {
            settlement: SettlementConfig {
                platform_fee_percent,
                confirmation_timeout,
                gateway_call_timeout,
                poll_interval,
                max_conflict_retries,
            },
            checkout_base_url,
            confirmation_token_ttl,
            http_bind,
        })
    }
}

fn parse_or<T: FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    default: T,
) -> Result<T> {
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| PaymentError::Config(format!("invalid {key}: {raw}"))),
        None => Ok(default),
    }
}
