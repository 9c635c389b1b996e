//! Narrow interfaces to the subsystems the providers depend on
//!
//! The ledger RPC client, log poller, fee estimator, transaction manager and the
//! contract-bound protocol readers all live outside this crate. Providers only see
//! them through these traits, and every fallible method reports an
//! [`eyre::Report`].

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use async_trait::async_trait;
use eyre::Result;

use crate::batch_caller::DynamicLimitedBatchCaller;
use crate::types::{
    CallOutcome, ConfigDigest, ContractCall, ContractConfig, GenericAddress, LogFilter,
    OnRampParams, PolledLog, TokenTransferMessage, TransactionStatus,
};

// ============================================================================
// Infrastructure
// ============================================================================

/// Log polling and event replay subsystem
#[async_trait]
pub trait LogPoller: Send + Sync {
    /// Re-process logs starting at `from_block`
    async fn replay(&self, from_block: u64) -> Result<()>;

    async fn register_filter(&self, filter: LogFilter) -> Result<()>;

    async fn unregister_filter(&self, name: &str) -> Result<()>;

    /// Logs with `event_sig` emitted by `address` in the given transaction
    async fn indexed_logs_by_tx_hash(
        &self,
        event_sig: B256,
        address: Address,
        tx_hash: B256,
    ) -> Result<Vec<PolledLog>>;
}

/// Ledger RPC client, reduced to read-only contract calls
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn call_contract(&self, call: ContractCall, block: Option<u64>) -> Result<Bytes>;

    /// Executes all calls as a single RPC batch. Individual reverts are reported
    /// per call; an `Err` means the batch as a whole failed.
    async fn batch_call_contract(
        &self,
        calls: Vec<ContractCall>,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>>;
}

/// Gas-fee estimation engine
#[async_trait]
pub trait FeeEstimator: Send + Sync {
    /// Current gas price, bounded by `max_gas_price`
    async fn gas_price(&self, max_gas_price: U256) -> Result<U256>;
}

/// Fee-estimator configuration that needs on-ramp specific data
pub trait FeeEstimatorConfig: Send + Sync {
    fn set_on_ramp_reader(&self, reader: Arc<dyn OnRampReader>);
}

#[async_trait]
pub trait TxManager: Send + Sync {
    async fn get_transaction_status(&self, transaction_id: &str) -> Result<TransactionStatus>;
}

// ============================================================================
// Protocol readers
// ============================================================================

#[async_trait]
pub trait OnRampReader: Send + Sync {
    fn address(&self) -> GenericAddress;

    async fn router_address(&self) -> Result<GenericAddress>;

    async fn source_price_registry_address(&self) -> Result<GenericAddress>;
}

#[async_trait]
pub trait OffRampReader: Send + Sync {
    fn address(&self) -> GenericAddress;

    async fn get_execution_state(&self, seq_num: u64) -> Result<u8>;
}

#[async_trait]
pub trait GasPriceEstimator: Send + Sync {
    async fn get_gas_price(&self) -> Result<U256>;
}

#[async_trait]
pub trait CommitStoreReader: Send + Sync {
    fn gas_price_estimator(&self) -> Result<Arc<dyn GasPriceEstimator>>;

    async fn get_expected_next_sequence_number(&self) -> Result<u64>;

    async fn is_down(&self) -> Result<bool>;

    async fn is_blessed(&self, root: B256) -> Result<bool>;
}

#[async_trait]
pub trait PriceRegistryReader: Send + Sync {
    fn address(&self) -> GenericAddress;

    async fn get_token_prices(&self, tokens: &[GenericAddress]) -> Result<Vec<U256>>;
}

#[async_trait]
pub trait TokenPoolBatchedReader: Send + Sync {
    async fn get_inbound_token_pool_rate_limits(
        &self,
        pools: &[GenericAddress],
    ) -> Result<Vec<Bytes>>;
}

/// Fetches off-chain attestation data for a token transfer
#[async_trait]
pub trait TokenDataReader: Send + Sync {
    async fn read_token_data(
        &self,
        msg: &TokenTransferMessage,
        token_index: usize,
    ) -> Result<Bytes>;
}

/// Builds and tears down the contract-bound protocol readers.
///
/// Readers register log filters with the log poller when created; the matching
/// `close_*` call unregisters them.
#[async_trait]
pub trait ReaderFactory: Send + Sync {
    async fn new_on_ramp_reader(&self, params: &OnRampParams) -> Result<Arc<dyn OnRampReader>>;

    async fn close_on_ramp_reader(&self, params: &OnRampParams) -> Result<()>;

    async fn new_off_ramp_reader(
        &self,
        address: &GenericAddress,
        estimator: Arc<dyn FeeEstimator>,
        max_gas_price: U256,
    ) -> Result<Arc<dyn OffRampReader>>;

    async fn close_off_ramp_reader(&self, address: &GenericAddress) -> Result<()>;

    async fn new_commit_store_reader(
        &self,
        address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>>;

    async fn close_commit_store_reader(&self, address: &GenericAddress) -> Result<()>;

    async fn new_price_registry_reader(
        &self,
        address: &GenericAddress,
    ) -> Result<Arc<dyn PriceRegistryReader>>;

    async fn new_token_pool_batched_reader(
        &self,
        off_ramp: &GenericAddress,
        source_chain_selector: u64,
        caller: Arc<DynamicLimitedBatchCaller>,
    ) -> Result<Arc<dyn TokenPoolBatchedReader>>;
}

// ============================================================================
// OCR surfaces
// ============================================================================

pub trait OffchainConfigDigester: Send + Sync {
    fn config_digest(&self, config: &ContractConfig) -> Result<ConfigDigest>;

    fn config_digest_prefix(&self) -> Result<u16>;
}

#[async_trait]
pub trait ContractConfigTracker: Send + Sync {
    /// Block the config last changed in, and its digest
    async fn latest_config_details(&self) -> Result<(u64, ConfigDigest)>;

    async fn latest_config(&self, changed_in_block: u64) -> Result<ContractConfig>;

    async fn latest_block_height(&self) -> Result<u64>;
}

#[async_trait]
pub trait ContractTransmitter: Send + Sync {
    async fn transmit(
        &self,
        config_digest: ConfigDigest,
        report: Bytes,
        signatures: Vec<Bytes>,
    ) -> Result<()>;

    async fn latest_config_digest_and_epoch(&self) -> Result<(ConfigDigest, u32)>;

    fn from_account(&self) -> Result<String>;
}

/// Watches the off-ramp's OCR config and hands out its digester and tracker
#[derive(Clone)]
pub struct ConfigWatcher {
    digester: Arc<dyn OffchainConfigDigester>,
    tracker: Arc<dyn ContractConfigTracker>,
}

impl ConfigWatcher {
    pub fn new(
        digester: Arc<dyn OffchainConfigDigester>,
        tracker: Arc<dyn ContractConfigTracker>,
    ) -> Self {
        Self { digester, tracker }
    }

    pub fn offchain_config_digester(&self) -> Arc<dyn OffchainConfigDigester> {
        self.digester.clone()
    }

    pub fn contract_config_tracker(&self) -> Arc<dyn ContractConfigTracker> {
        self.tracker.clone()
    }
}
