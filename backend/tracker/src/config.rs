//! Application configuration loaded from environment variables.

use std::time::Duration;

use crate::aggregator::DEFAULT_MAX_BATCH_ITEMS;
use crate::errors::{Result, TrackerError};
use crate::types::Address;

#[derive(Debug, Clone)]
pub struct Config {
    /// JSON-RPC endpoint fronting the charity tracker contract
    pub rpc_url: String,
    /// The deployed charity tracker contract
    pub contract_address: Address,
    /// Connected wallet, if any
    pub wallet_address: Option<Address>,
    /// Port for the read API server
    pub api_port: u16,
    /// How long (in seconds) a cached read stays fresh
    pub cache_ttl_secs: u64,
    /// How many times a failed read is retried
    pub read_retries: u32,
    /// Receipt polling interval in milliseconds
    pub receipt_poll_ms: u64,
    /// Upper bound on a confirmation wait; `None` waits indefinitely
    pub receipt_timeout_secs: Option<u64>,
    /// Decimals of the chain's native currency
    pub native_decimals: u32,
    /// Largest collection the aggregator will batch-read
    pub max_batch_items: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            rpc_url: env_var("RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8545".to_string()),
            contract_address: env_var("CONTRACT_ADDRESS")
                .map_err(|_| {
                    TrackerError::Config(
                        "CONTRACT_ADDRESS environment variable is required".to_string(),
                    )
                })?
                .parse::<Address>()?,
            wallet_address: env_var("WALLET_ADDRESS")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<Address>())
                .transpose()?,
            api_port: parse_or("API_PORT", 3001)?,
            cache_ttl_secs: parse_or("CACHE_TTL_SECS", 300)?,
            read_retries: parse_or("READ_RETRIES", 1)?,
            receipt_poll_ms: parse_or("RECEIPT_POLL_MS", 1_000)?,
            receipt_timeout_secs: env_var("RECEIPT_TIMEOUT_SECS")
                .ok()
                .map(|s| {
                    s.parse::<u64>()
                        .map_err(|_| TrackerError::Config("Invalid RECEIPT_TIMEOUT_SECS".to_string()))
                })
                .transpose()?,
            native_decimals: parse_or("NATIVE_DECIMALS", 18)?,
            max_batch_items: parse_or("MAX_BATCH_ITEMS", DEFAULT_MAX_BATCH_ITEMS)?,
        })
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_ms)
    }

    pub fn receipt_timeout(&self) -> Option<Duration> {
        self.receipt_timeout_secs.map(Duration::from_secs)
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> Result<T> {
    match env_var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|_| TrackerError::Config(format!("Invalid {key}"))),
        Err(_) => Ok(default),
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| TrackerError::Config(format!("Missing env var: {key}")))
}
