//! Execution provider configuration
//!
//! # Environment Variable Schema
//!
//! ```text
//! EXEC_START_BLOCK=0                        # optional, 0 disables replay
//! EXEC_MAX_GAS_PRICE=200000000000           # optional, wei (decimal or 0x hex)
//!
//! USDC_ATTESTATION_API=https://iris-api.circle.com   # bridge enabled when set
//! USDC_SOURCE_TOKEN_ADDRESS=0x...
//! USDC_SOURCE_MESSAGE_TRANSMITTER_ADDRESS=0x...
//! USDC_ATTESTATION_API_TIMEOUT_SECONDS=5             # optional
//! USDC_ATTESTATION_API_INTERVAL_MILLISECONDS=100     # optional
//!
//! LBTC_ATTESTATION_API=https://bridge-manager.lombard.finance
//! LBTC_SOURCE_TOKEN_ADDRESS=0x...
//! LBTC_ATTESTATION_API_TIMEOUT_SECONDS=5
//! LBTC_ATTESTATION_API_INTERVAL_MILLISECONDS=100
//!
//! RPC_BATCH_SIZE_LIMIT=256                  # optional
//! RPC_BATCH_BACKOFF_MULTIPLIER=5            # optional
//! RPC_MAX_PARALLEL_CALLS=10                 # optional
//! ```

use alloy::primitives::{Address, U256};
use eyre::{eyre, Result, WrapErr};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ProviderError;

pub const DEFAULT_ATTESTATION_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_ATTESTATION_INTERVAL: Duration = Duration::from_millis(100);

pub const DEFAULT_RPC_BATCH_SIZE_LIMIT: usize = 256;
pub const DEFAULT_RPC_BATCH_BACKOFF_MULTIPLIER: usize = 5;
pub const DEFAULT_MAX_PARALLEL_RPC_CALLS: usize = 10;

/// Attestation-backed token bridge settings
#[derive(Clone, Deserialize, PartialEq, Eq)]
pub struct TokenBridgeConfig {
    /// Token contract on the source chain
    pub source_token_address: Address,
    /// Attestation service base URL
    pub attestation_api: String,
    #[serde(default)]
    pub attestation_api_timeout_seconds: u32,
    #[serde(default)]
    pub attestation_api_interval_milliseconds: u32,
}

/// Attestation URLs may carry API keys in their query string
impl fmt::Debug for TokenBridgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenBridgeConfig")
            .field("source_token_address", &self.source_token_address)
            .field("attestation_api", &redact_query(&self.attestation_api))
            .field(
                "attestation_api_timeout_seconds",
                &self.attestation_api_timeout_seconds,
            )
            .field(
                "attestation_api_interval_milliseconds",
                &self.attestation_api_interval_milliseconds,
            )
            .finish()
    }
}

impl TokenBridgeConfig {
    /// Polling timeout, falling back to the default when unset
    pub fn attestation_timeout(&self) -> Duration {
        match self.attestation_api_timeout_seconds {
            0 => DEFAULT_ATTESTATION_TIMEOUT,
            secs => Duration::from_secs(u64::from(secs)),
        }
    }

    /// Polling interval, falling back to the default when unset
    pub fn attestation_interval(&self) -> Duration {
        match self.attestation_api_interval_milliseconds {
            0 => DEFAULT_ATTESTATION_INTERVAL,
            ms => Duration::from_millis(u64::from(ms)),
        }
    }
}

/// USDC-style bridge: attestations are keyed by the `MessageSent` payload emitted
/// by the message transmitter
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UsdcConfig {
    #[serde(flatten)]
    pub bridge: TokenBridgeConfig,
    pub source_message_transmitter_address: Address,
}

/// Limits for the batching contract caller
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct BatchCallerConfig {
    #[serde(default = "default_batch_size_limit")]
    pub batch_size_limit: usize,
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: usize,
    #[serde(default = "default_max_parallel_calls")]
    pub max_parallel_calls: usize,
}

impl Default for BatchCallerConfig {
    fn default() -> Self {
        Self {
            batch_size_limit: DEFAULT_RPC_BATCH_SIZE_LIMIT,
            backoff_multiplier: DEFAULT_RPC_BATCH_BACKOFF_MULTIPLIER,
            max_parallel_calls: DEFAULT_MAX_PARALLEL_RPC_CALLS,
        }
    }
}

/// Settings consumed by both provider variants at construction
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct ExecProviderConfig {
    /// Block to replay from on start; 0 disables replay
    #[serde(default)]
    pub start_block: u64,
    /// Gas price ceiling for destination-side execution
    #[serde(default)]
    pub max_gas_price: U256,
    #[serde(default)]
    pub usdc: Option<UsdcConfig>,
    #[serde(default)]
    pub lbtc: Option<TokenBridgeConfig>,
    #[serde(default)]
    pub batch: BatchCallerConfig,
}

fn default_batch_size_limit() -> usize {
    DEFAULT_RPC_BATCH_SIZE_LIMIT
}

fn default_backoff_multiplier() -> usize {
    DEFAULT_RPC_BATCH_BACKOFF_MULTIPLIER
}

fn default_max_parallel_calls() -> usize {
    DEFAULT_MAX_PARALLEL_RPC_CALLS
}

impl ExecProviderConfig {
    /// Load configuration from environment variables
    /// Loads .env file if present, then reads from environment
    pub fn load() -> Result<Self> {
        Self::load_from_file(".env")
    }

    /// Load from a specific .env file path
    pub fn load_from_file(path: &str) -> Result<Self> {
        if Path::new(path).exists() {
            dotenvy::from_filename(path)
                .wrap_err_with(|| format!("Failed to load .env file from {}", path))?;
        }
        Self::load_from_env()
    }

    /// Load configuration from environment variables
    pub fn load_from_env() -> Result<Self> {
        let start_block = optional_parse::<u64>("EXEC_START_BLOCK")?.unwrap_or(0);
        let max_gas_price = match optional_var("EXEC_MAX_GAS_PRICE") {
            Some(raw) => U256::from_str(&raw)
                .map_err(|e| eyre!("EXEC_MAX_GAS_PRICE must be a valid U256: {}", e))?,
            None => U256::ZERO,
        };

        let usdc = match load_bridge_from_env("USDC")? {
            Some(bridge) => Some(UsdcConfig {
                bridge,
                source_message_transmitter_address: required_address(
                    "USDC_SOURCE_MESSAGE_TRANSMITTER_ADDRESS",
                )?,
            }),
            None => None,
        };
        let lbtc = load_bridge_from_env("LBTC")?;

        let batch = BatchCallerConfig {
            batch_size_limit: optional_parse("RPC_BATCH_SIZE_LIMIT")?
                .unwrap_or(DEFAULT_RPC_BATCH_SIZE_LIMIT),
            backoff_multiplier: optional_parse("RPC_BATCH_BACKOFF_MULTIPLIER")?
                .unwrap_or(DEFAULT_RPC_BATCH_BACKOFF_MULTIPLIER),
            max_parallel_calls: optional_parse("RPC_MAX_PARALLEL_CALLS")?
                .unwrap_or(DEFAULT_MAX_PARALLEL_RPC_CALLS),
        };

        let config = Self {
            start_block,
            max_gas_price,
            usdc,
            lbtc,
            batch,
        };
        config.validate().map_err(|e| eyre!(e))?;
        Ok(config)
    }

    /// At most one bridge may claim a token address
    pub fn validate(&self) -> Result<(), ProviderError> {
        if let (Some(usdc), Some(lbtc)) = (&self.usdc, &self.lbtc) {
            if usdc.bridge.source_token_address == lbtc.source_token_address {
                return Err(ProviderError::Config(format!(
                    "USDC and LBTC bridges both claim token {}",
                    usdc.bridge.source_token_address
                )));
            }
        }
        if self.batch.batch_size_limit == 0 || self.batch.max_parallel_calls == 0 {
            return Err(ProviderError::Config(
                "batch size limit and max parallel calls must be non-zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// A bridge is enabled when its `<PREFIX>_ATTESTATION_API` variable is non-empty
fn load_bridge_from_env(prefix: &str) -> Result<Option<TokenBridgeConfig>> {
    let attestation_api = match optional_var(&format!("{}_ATTESTATION_API", prefix)) {
        Some(api) => api,
        None => return Ok(None),
    };

    Ok(Some(TokenBridgeConfig {
        source_token_address: required_address(&format!("{}_SOURCE_TOKEN_ADDRESS", prefix))?,
        attestation_api,
        attestation_api_timeout_seconds: optional_parse(&format!(
            "{}_ATTESTATION_API_TIMEOUT_SECONDS",
            prefix
        ))?
        .unwrap_or(0),
        attestation_api_interval_milliseconds: optional_parse(&format!(
            "{}_ATTESTATION_API_INTERVAL_MILLISECONDS",
            prefix
        ))?
        .unwrap_or(0),
    }))
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn optional_parse<T>(name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    optional_var(name)
        .map(|raw| {
            raw.parse::<T>()
                .map_err(|e| eyre!("{} has invalid value {:?}: {}", name, raw, e))
        })
        .transpose()
}

fn required_address(name: &str) -> Result<Address> {
    let raw = optional_var(name).ok_or_else(|| eyre!("{} environment variable is required", name))?;
    Address::from_str(&raw).wrap_err_with(|| format!("{} must be a valid EVM address", name))
}

fn redact_query(url: &str) -> String {
    match url.split_once('?') {
        Some((base, _)) => format!("{}?<redacted>", base),
        None => url.to_string(),
    }
}
