//! In-memory collaborators for driving the providers in tests
//!
//! Every fake records what it was asked to do into a shared [`Recorder`], so tests
//! can assert on exact collaborator calls and their order.

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use eyre::{eyre, Result};

use exec_provider::batch_caller::DynamicLimitedBatchCaller;
use exec_provider::collaborators::{
    ChainClient, CommitStoreReader, ConfigWatcher, ContractConfigTracker, ContractTransmitter,
    FeeEstimator, FeeEstimatorConfig, GasPriceEstimator, LogPoller, OffRampReader,
    OffchainConfigDigester, OnRampReader, PriceRegistryReader, ReaderFactory,
    TokenPoolBatchedReader, TxManager,
};
use exec_provider::types::{
    CallOutcome, ConfigDigest, ContractCall, ContractConfig, LogFilter, PolledLog,
};
use exec_provider::{
    DestinationCollaborators, DestinationExecProvider, ExecProviderConfig, GenericAddress,
    OnRampParams, SourceCollaborators, SourceExecProvider, TransactionStatus,
};

// ============================================================================
// Call recording
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Replay(u64),
    RegisterFilter(String),
    UnregisterFilter(String),
    NewOnRampReader(OnRampParams),
    CloseOnRampReader(OnRampParams),
    NewOffRampReader(GenericAddress, U256),
    CloseOffRampReader(GenericAddress),
    NewCommitStoreReader(GenericAddress),
    CloseCommitStoreReader(GenericAddress),
    NewPriceRegistryReader(GenericAddress),
    NewTokenPoolBatchedReader {
        off_ramp: GenericAddress,
        source_chain_selector: u64,
        batch_size_limit: usize,
    },
    SetOnRampReader(GenericAddress),
    GetTransactionStatus(String),
    ContractCall(Address),
}

#[derive(Default)]
pub struct Recorder {
    calls: Mutex<Vec<Call>>,
    failing: Mutex<HashSet<&'static str>>,
    hanging: Mutex<HashSet<&'static str>>,
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.calls.lock().unwrap().clear();
    }

    /// Make every later call of `op` fail
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().unwrap().insert(op);
    }

    pub fn recover(&self, op: &'static str) {
        self.failing.lock().unwrap().remove(op);
    }

    /// Make every later call of `op` block forever after being recorded
    pub fn hang(&self, op: &'static str) {
        self.hanging.lock().unwrap().insert(op);
    }

    async fn gate(&self, op: &'static str) -> Result<()> {
        let hangs = self.hanging.lock().unwrap().contains(op);
        if hangs {
            std::future::pending::<()>().await;
        }
        self.check(op)
    }

    fn check(&self, op: &'static str) -> Result<()> {
        if self.failing.lock().unwrap().contains(op) {
            return Err(eyre!("{} exploded", op));
        }
        Ok(())
    }

    /// Calls that tear something down
    pub fn teardown_calls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| {
                matches!(
                    c,
                    Call::CloseOnRampReader(_)
                        | Call::CloseOffRampReader(_)
                        | Call::CloseCommitStoreReader(_)
                        | Call::UnregisterFilter(_)
                )
            })
            .collect()
    }
}

// ============================================================================
// Infrastructure fakes
// ============================================================================

pub struct FakeLogPoller {
    recorder: Arc<Recorder>,
    logs: Mutex<Vec<PolledLog>>,
}

impl FakeLogPoller {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self {
            recorder,
            logs: Mutex::new(Vec::new()),
        }
    }

    pub fn push_log(&self, log: PolledLog) {
        self.logs.lock().unwrap().push(log);
    }
}

#[async_trait]
impl LogPoller for FakeLogPoller {
    async fn replay(&self, from_block: u64) -> Result<()> {
        self.recorder.record(Call::Replay(from_block));
        self.recorder.check("replay")
    }

    async fn register_filter(&self, filter: LogFilter) -> Result<()> {
        self.recorder.record(Call::RegisterFilter(filter.name));
        self.recorder.check("register_filter")
    }

    async fn unregister_filter(&self, name: &str) -> Result<()> {
        self.recorder.record(Call::UnregisterFilter(name.to_string()));
        self.recorder.check("unregister_filter")
    }

    async fn indexed_logs_by_tx_hash(
        &self,
        event_sig: B256,
        address: Address,
        tx_hash: B256,
    ) -> Result<Vec<PolledLog>> {
        Ok(self
            .logs
            .lock()
            .unwrap()
            .iter()
            .filter(|l| {
                l.address == address && l.tx_hash == tx_hash && l.topics.first() == Some(&event_sig)
            })
            .cloned()
            .collect())
    }
}

/// Answers every call with the ABI encoding of `wrapped_native`
pub struct FakeChainClient {
    recorder: Arc<Recorder>,
    pub wrapped_native: Address,
}

impl FakeChainClient {
    pub fn new(recorder: Arc<Recorder>, wrapped_native: Address) -> Self {
        Self {
            recorder,
            wrapped_native,
        }
    }
}

#[async_trait]
impl ChainClient for FakeChainClient {
    async fn call_contract(&self, call: ContractCall, _block: Option<u64>) -> Result<Bytes> {
        self.recorder.record(Call::ContractCall(call.to));
        self.recorder.check("call_contract")?;
        Ok(self.wrapped_native.abi_encode().into())
    }

    async fn batch_call_contract(
        &self,
        calls: Vec<ContractCall>,
        _block: Option<u64>,
    ) -> Result<Vec<CallOutcome>> {
        self.recorder.check("batch_call_contract")?;
        Ok(calls.into_iter().map(|c| Ok(c.data)).collect())
    }
}

pub struct FixedFeeEstimator(pub U256);

#[async_trait]
impl FeeEstimator for FixedFeeEstimator {
    async fn gas_price(&self, _max_gas_price: U256) -> Result<U256> {
        Ok(self.0)
    }
}

pub struct RecordingFeeConfig {
    recorder: Arc<Recorder>,
}

impl FeeEstimatorConfig for RecordingFeeConfig {
    fn set_on_ramp_reader(&self, reader: Arc<dyn OnRampReader>) {
        self.recorder.record(Call::SetOnRampReader(reader.address()));
    }
}

pub struct FakeTxManager {
    recorder: Arc<Recorder>,
    pub status: TransactionStatus,
}

#[async_trait]
impl TxManager for FakeTxManager {
    async fn get_transaction_status(&self, transaction_id: &str) -> Result<TransactionStatus> {
        self.recorder
            .record(Call::GetTransactionStatus(transaction_id.to_string()));
        self.recorder.check("get_transaction_status")?;
        Ok(self.status)
    }
}

// ============================================================================
// Reader stubs
// ============================================================================

pub struct StubOnRamp(pub GenericAddress);

#[async_trait]
impl OnRampReader for StubOnRamp {
    fn address(&self) -> GenericAddress {
        self.0.clone()
    }

    async fn router_address(&self) -> Result<GenericAddress> {
        Ok(GenericAddress::from(Address::ZERO))
    }

    async fn source_price_registry_address(&self) -> Result<GenericAddress> {
        Ok(GenericAddress::from(Address::ZERO))
    }
}

pub struct StubOffRamp(pub GenericAddress);

#[async_trait]
impl OffRampReader for StubOffRamp {
    fn address(&self) -> GenericAddress {
        self.0.clone()
    }

    async fn get_execution_state(&self, _seq_num: u64) -> Result<u8> {
        Ok(0)
    }
}

pub struct StubCommitStore;

#[async_trait]
impl CommitStoreReader for StubCommitStore {
    fn gas_price_estimator(&self) -> Result<Arc<dyn GasPriceEstimator>> {
        Err(eyre!("not used"))
    }

    async fn get_expected_next_sequence_number(&self) -> Result<u64> {
        Ok(1)
    }

    async fn is_down(&self) -> Result<bool> {
        Ok(false)
    }

    async fn is_blessed(&self, _root: B256) -> Result<bool> {
        Ok(true)
    }
}

pub struct StubPriceRegistry(pub GenericAddress);

#[async_trait]
impl PriceRegistryReader for StubPriceRegistry {
    fn address(&self) -> GenericAddress {
        self.0.clone()
    }

    async fn get_token_prices(&self, tokens: &[GenericAddress]) -> Result<Vec<U256>> {
        Ok(vec![U256::from(1); tokens.len()])
    }
}

pub struct StubTokenPool;

#[async_trait]
impl TokenPoolBatchedReader for StubTokenPool {
    async fn get_inbound_token_pool_rate_limits(
        &self,
        pools: &[GenericAddress],
    ) -> Result<Vec<Bytes>> {
        Ok(vec![Bytes::new(); pools.len()])
    }
}

pub struct FakeReaderFactory {
    recorder: Arc<Recorder>,
}

impl FakeReaderFactory {
    pub fn new(recorder: Arc<Recorder>) -> Self {
        Self { recorder }
    }
}

#[async_trait]
impl ReaderFactory for FakeReaderFactory {
    async fn new_on_ramp_reader(&self, params: &OnRampParams) -> Result<Arc<dyn OnRampReader>> {
        self.recorder.record(Call::NewOnRampReader(params.clone()));
        self.recorder.check("new_on_ramp_reader")?;
        Ok(Arc::new(StubOnRamp(params.address.clone())))
    }

    async fn close_on_ramp_reader(&self, params: &OnRampParams) -> Result<()> {
        self.recorder.record(Call::CloseOnRampReader(params.clone()));
        self.recorder.gate("close_on_ramp_reader").await
    }

    async fn new_off_ramp_reader(
        &self,
        address: &GenericAddress,
        _estimator: Arc<dyn FeeEstimator>,
        max_gas_price: U256,
    ) -> Result<Arc<dyn OffRampReader>> {
        self.recorder
            .record(Call::NewOffRampReader(address.clone(), max_gas_price));
        self.recorder.check("new_off_ramp_reader")?;
        Ok(Arc::new(StubOffRamp(address.clone())))
    }

    async fn close_off_ramp_reader(&self, address: &GenericAddress) -> Result<()> {
        self.recorder.record(Call::CloseOffRampReader(address.clone()));
        self.recorder.gate("close_off_ramp_reader").await
    }

    async fn new_commit_store_reader(
        &self,
        address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>> {
        self.recorder
            .record(Call::NewCommitStoreReader(address.clone()));
        self.recorder.check("new_commit_store_reader")?;
        Ok(Arc::new(StubCommitStore))
    }

    async fn close_commit_store_reader(&self, address: &GenericAddress) -> Result<()> {
        self.recorder
            .record(Call::CloseCommitStoreReader(address.clone()));
        self.recorder.check("close_commit_store_reader")
    }

    async fn new_price_registry_reader(
        &self,
        address: &GenericAddress,
    ) -> Result<Arc<dyn PriceRegistryReader>> {
        self.recorder
            .record(Call::NewPriceRegistryReader(address.clone()));
        self.recorder.check("new_price_registry_reader")?;
        Ok(Arc::new(StubPriceRegistry(address.clone())))
    }

    async fn new_token_pool_batched_reader(
        &self,
        off_ramp: &GenericAddress,
        source_chain_selector: u64,
        caller: Arc<DynamicLimitedBatchCaller>,
    ) -> Result<Arc<dyn TokenPoolBatchedReader>> {
        self.recorder.record(Call::NewTokenPoolBatchedReader {
            off_ramp: off_ramp.clone(),
            source_chain_selector,
            batch_size_limit: caller.batch_size_limit(),
        });
        self.recorder.check("new_token_pool_batched_reader")?;
        Ok(Arc::new(StubTokenPool))
    }
}

// ============================================================================
// OCR fakes for the destination side
// ============================================================================

pub struct FakeDigester;

impl OffchainConfigDigester for FakeDigester {
    fn config_digest(&self, config: &ContractConfig) -> Result<ConfigDigest> {
        Ok(config.config_digest)
    }

    fn config_digest_prefix(&self) -> Result<u16> {
        Ok(0x0001)
    }
}

pub struct FakeTracker;

#[async_trait]
impl ContractConfigTracker for FakeTracker {
    async fn latest_config_details(&self) -> Result<(u64, ConfigDigest)> {
        Ok((7, ConfigDigest::repeat_byte(0x07)))
    }

    async fn latest_config(&self, _changed_in_block: u64) -> Result<ContractConfig> {
        Ok(ContractConfig::default())
    }

    async fn latest_block_height(&self) -> Result<u64> {
        Ok(100)
    }
}

pub struct FakeTransmitter;

#[async_trait]
impl ContractTransmitter for FakeTransmitter {
    async fn transmit(
        &self,
        _config_digest: ConfigDigest,
        _report: Bytes,
        _signatures: Vec<Bytes>,
    ) -> Result<()> {
        Ok(())
    }

    async fn latest_config_digest_and_epoch(&self) -> Result<(ConfigDigest, u32)> {
        Ok((ConfigDigest::ZERO, 1))
    }

    fn from_account(&self) -> Result<String> {
        Ok("0xtransmitter".to_string())
    }
}

// ============================================================================
// Harness
// ============================================================================

pub const JOB_ID: &str = "job-42";

/// Log to the test output, filtered by `RUST_LOG` (default `warn`)
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn addr(byte: u8) -> GenericAddress {
    GenericAddress::from(Address::repeat_byte(byte))
}

pub struct SourceHarness {
    pub provider: SourceExecProvider,
    pub recorder: Arc<Recorder>,
    pub log_poller: Arc<FakeLogPoller>,
}

pub struct DestinationHarness {
    pub provider: DestinationExecProvider,
    pub recorder: Arc<Recorder>,
}

pub fn source_collaborators(
    recorder: &Arc<Recorder>,
    log_poller: Arc<FakeLogPoller>,
) -> SourceCollaborators {
    SourceCollaborators {
        client: Arc::new(FakeChainClient::new(
            recorder.clone(),
            Address::repeat_byte(0xee),
        )),
        log_poller,
        reader_factory: Arc::new(FakeReaderFactory::new(recorder.clone())),
        estimator: Arc::new(FixedFeeEstimator(U256::from(50u64))),
        fee_estimator_config: Arc::new(RecordingFeeConfig {
            recorder: recorder.clone(),
        }),
    }
}

pub async fn source(config: ExecProviderConfig) -> SourceHarness {
    try_source(config, Recorder::new()).await.unwrap()
}

pub async fn try_source(
    config: ExecProviderConfig,
    recorder: Arc<Recorder>,
) -> std::result::Result<SourceHarness, exec_provider::ProviderError> {
    init_tracing();
    let log_poller = Arc::new(FakeLogPoller::new(recorder.clone()));
    let deps = source_collaborators(&recorder, log_poller.clone());
    let provider = SourceExecProvider::new(JOB_ID, deps, &config).await?;
    Ok(SourceHarness {
        provider,
        recorder,
        log_poller,
    })
}

pub fn destination(config: ExecProviderConfig, off_ramp: GenericAddress) -> DestinationHarness {
    init_tracing();
    let recorder = Recorder::new();
    let deps = DestinationCollaborators {
        client: Arc::new(FakeChainClient::new(recorder.clone(), Address::ZERO)),
        log_poller: Arc::new(FakeLogPoller::new(recorder.clone())),
        reader_factory: Arc::new(FakeReaderFactory::new(recorder.clone())),
        gas_estimator: Arc::new(FixedFeeEstimator(U256::from(50u64))),
        contract_transmitter: Arc::new(FakeTransmitter),
        config_watcher: ConfigWatcher::new(Arc::new(FakeDigester), Arc::new(FakeTracker)),
        tx_manager: Arc::new(FakeTxManager {
            recorder: recorder.clone(),
            status: TransactionStatus::Finalized,
        }),
    };
    let provider = DestinationExecProvider::new(JOB_ID, deps, &config, off_ramp).unwrap();
    DestinationHarness { provider, recorder }
}
