//! Common types shared by the source and destination execution providers
//!
//! Addresses cross the hosting-engine boundary as chain-agnostic strings
//! ([`GenericAddress`]) and are converted to EVM addresses at the edge.

use alloy::primitives::{Address, Bytes, B256};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::ProviderError;

// ============================================================================
// Addresses
// ============================================================================

/// Chain-agnostic address as exchanged with the hosting engine
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct GenericAddress(pub String);

impl GenericAddress {
    pub fn new(address: impl Into<String>) -> Self {
        GenericAddress(address.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Parse as a 20-byte EVM address (with or without 0x prefix)
    pub fn to_evm(&self) -> Result<Address, ProviderError> {
        let raw = self.0.trim();
        let hex_part = raw.strip_prefix("0x").unwrap_or(raw);
        if hex_part.len() != 40 {
            return Err(ProviderError::InvalidAddress {
                address: self.0.clone(),
                reason: format!("expected 40 hex chars, got {}", hex_part.len()),
            });
        }
        Address::from_str(hex_part).map_err(|e| ProviderError::InvalidAddress {
            address: self.0.clone(),
            reason: e.to_string(),
        })
    }
}

impl From<Address> for GenericAddress {
    /// EIP-55 checksummed form
    fn from(address: Address) -> Self {
        GenericAddress(address.to_checksum(None))
    }
}

impl From<&str> for GenericAddress {
    fn from(address: &str) -> Self {
        GenericAddress(address.to_string())
    }
}

impl fmt::Display for GenericAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Provider role
// ============================================================================

/// Direction a provider serves on the bridge. Fixed at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Source,
    Destination,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Destination => "destination",
        }
    }

    pub fn opposite(&self) -> Role {
        match self {
            Role::Source => Role::Destination,
            Role::Destination => Role::Source,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Transaction status
// ============================================================================

/// Status of a transaction as reported by the transaction manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransactionStatus {
    Unknown,
    Pending,
    Unconfirmed,
    Finalized,
    Failed,
    Fatal,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Unknown => "unknown",
            TransactionStatus::Pending => "pending",
            TransactionStatus::Unconfirmed => "unconfirmed",
            TransactionStatus::Finalized => "finalized",
            TransactionStatus::Failed => "failed",
            TransactionStatus::Fatal => "fatal",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Reader parameters
// ============================================================================

/// Parameters an on-ramp reader was created with, needed again to close it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnRampParams {
    pub address: GenericAddress,
    pub source_chain_selector: u64,
    pub dest_chain_selector: u64,
}

/// Log filter registered with the log poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogFilter {
    /// Unique filter name; unregistration is keyed by it
    pub name: String,
    pub event_signatures: Vec<B256>,
    pub addresses: Vec<Address>,
}

/// A log as stored by the log poller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolledLog {
    pub address: Address,
    pub topics: Vec<B256>,
    pub data: Bytes,
    pub tx_hash: B256,
    pub log_index: u64,
    pub block_number: u64,
}

/// The part of a cross-chain message a token-data reader needs
#[derive(Debug, Clone, Default)]
pub struct TokenTransferMessage {
    /// Source transaction that emitted the send request
    pub tx_hash: B256,
    /// Log index of the send-request event within that transaction
    pub log_index: u64,
    /// Source token addresses, one per transferred token
    pub tokens: Vec<Address>,
    /// Pool-provided data, one entry per transferred token
    pub source_token_data: Vec<Bytes>,
}

/// A single read-only contract call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContractCall {
    pub to: Address,
    pub data: Bytes,
}

/// Result of one call inside a batch. A revert does not fail the batch.
pub type CallOutcome = Result<Bytes, String>;

// ============================================================================
// OCR configuration
// ============================================================================

pub type ConfigDigest = B256;

/// On-chain OCR configuration as read by a config tracker
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ContractConfig {
    pub config_digest: ConfigDigest,
    pub config_count: u64,
    pub signers: Vec<Bytes>,
    pub transmitters: Vec<String>,
    pub f: u8,
    pub onchain_config: Bytes,
    pub offchain_config_version: u64,
    pub offchain_config: Bytes,
}
