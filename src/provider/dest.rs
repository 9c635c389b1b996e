use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{wrong_role, ExecProvider};
use crate::batch_caller::DynamicLimitedBatchCaller;
use crate::collaborators::{
    ChainClient, CommitStoreReader, ConfigWatcher, ContractConfigTracker, ContractTransmitter,
    FeeEstimator, LogPoller, OffRampReader, OffchainConfigDigester, OnRampReader,
    PriceRegistryReader, ReaderFactory, TokenDataReader, TokenPoolBatchedReader, TxManager,
};
use crate::config::{BatchCallerConfig, ExecProviderConfig};
use crate::error::ProviderError;
use crate::lifecycle::{with_cancel, Lifecycle, LifecycleState};
use crate::registry::{ReaderRegistry, TeardownStep};
use crate::types::{GenericAddress, Role, TransactionStatus};

/// Destination-chain collaborators
#[derive(Clone)]
pub struct DestinationCollaborators {
    pub client: Arc<dyn ChainClient>,
    pub log_poller: Arc<dyn LogPoller>,
    pub reader_factory: Arc<dyn ReaderFactory>,
    pub gas_estimator: Arc<dyn FeeEstimator>,
    pub contract_transmitter: Arc<dyn ContractTransmitter>,
    pub config_watcher: ConfigWatcher,
    pub tx_manager: Arc<dyn TxManager>,
}

/// Execution provider for the destination side of a lane
pub struct DestinationExecProvider {
    name: String,
    deps: DestinationCollaborators,
    start_block: u64,
    max_gas_price: U256,
    batch: BatchCallerConfig,
    off_ramp_address: GenericAddress,
    registry: ReaderRegistry,
    lifecycle: Lifecycle,
}

impl DestinationExecProvider {
    pub fn new(
        job_id: &str,
        deps: DestinationCollaborators,
        config: &ExecProviderConfig,
        off_ramp_address: GenericAddress,
    ) -> Result<Self, ProviderError> {
        config.validate()?;
        let name = format!("{}.DestinationExecProvider", job_id);
        info!(
            provider = %name,
            start_block = config.start_block,
            off_ramp = %off_ramp_address,
            "Created destination exec provider"
        );

        Ok(Self {
            name,
            deps,
            start_block: config.start_block,
            max_gas_price: config.max_gas_price,
            batch: config.batch.clone(),
            off_ramp_address,
            registry: ReaderRegistry::new(),
            lifecycle: Lifecycle::new(Role::Destination),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> LifecycleState {
        self.lifecycle.state()
    }

    pub fn registry(&self) -> &ReaderRegistry {
        &self.registry
    }

    pub fn off_ramp_address(&self) -> &GenericAddress {
        &self.off_ramp_address
    }

    /// A failed replay leaves the provider in `Created`, ready for another `Start`
    pub async fn start(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        self.lifecycle.begin_start()?;
        if self.start_block == 0 {
            return Ok(());
        }

        info!(provider = %self.name, from_block = self.start_block, "Start replaying destination chain");
        let res = with_cancel(ctx, "Start", async {
            self.deps
                .log_poller
                .replay(self.start_block)
                .await
                .map_err(|e| {
                    ProviderError::collaborator("replay", format!("block {}", self.start_block), e)
                })
        })
        .await;
        if res.is_err() {
            self.lifecycle.abort_start();
        }
        res
    }

    /// Closes the commit store reader if one was created, then the off-ramp
    /// reader unconditionally
    pub async fn close(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        self.lifecycle.begin_close()?;

        let extra = vec![TeardownStep::OffRampReader(self.off_ramp_address.clone())];
        let errors = self
            .registry
            .teardown_all(ctx, self.deps.reader_factory.as_ref(), extra)
            .await;

        self.lifecycle.finish_close();
        info!(provider = %self.name, failures = errors.len(), "Closed destination exec provider");
        errors.into_result().map_err(ProviderError::from)
    }

    pub async fn new_off_ramp_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn OffRampReader>, ProviderError> {
        self.lifecycle.ensure_open("NewOffRampReader")?;
        let reader = with_cancel(ctx, "NewOffRampReader", async {
            self.deps
                .reader_factory
                .new_off_ramp_reader(address, self.deps.gas_estimator.clone(), self.max_gas_price)
                .await
                .map_err(|e| ProviderError::collaborator("new off-ramp reader", address, e))
        })
        .await?;
        info!(provider = %self.name, address = %address, "Created off-ramp reader");
        Ok(reader)
    }

    pub async fn new_commit_store_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>, ProviderError> {
        self.lifecycle.ensure_open("NewCommitStoreReader")?;
        let reader = with_cancel(ctx, "NewCommitStoreReader", async {
            self.deps
                .reader_factory
                .new_commit_store_reader(address)
                .await
                .map_err(|e| ProviderError::collaborator("new commit store reader", address, e))
        })
        .await?;

        self.registry.record_commit_store_seen(address.clone()).await;
        info!(provider = %self.name, address = %address, "Created commit store reader");
        Ok(reader)
    }

    pub async fn new_price_registry_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn PriceRegistryReader>, ProviderError> {
        self.lifecycle.ensure_open("NewPriceRegistryReader")?;
        with_cancel(ctx, "NewPriceRegistryReader", async {
            self.deps
                .reader_factory
                .new_price_registry_reader(address)
                .await
                .map_err(|e| ProviderError::collaborator("new price registry reader", address, e))
        })
        .await
    }

    /// Token pool reader over a fresh batch caller bounded by the configured limits
    pub async fn new_token_pool_batched_reader(
        &self,
        ctx: &CancellationToken,
        off_ramp: &GenericAddress,
        source_chain_selector: u64,
    ) -> Result<Arc<dyn TokenPoolBatchedReader>, ProviderError> {
        self.lifecycle.ensure_open("NewTokenPoolBatchedReader")?;
        let caller = Arc::new(DynamicLimitedBatchCaller::new(
            self.deps.client.clone(),
            &self.batch,
        ));
        with_cancel(ctx, "NewTokenPoolBatchedReader", async {
            self.deps
                .reader_factory
                .new_token_pool_batched_reader(off_ramp, source_chain_selector, caller)
                .await
                .map_err(|e| ProviderError::collaborator("new token pool batched reader", off_ramp, e))
        })
        .await
    }

    pub async fn get_transaction_status(
        &self,
        ctx: &CancellationToken,
        transaction_id: &str,
    ) -> Result<TransactionStatus, ProviderError> {
        self.lifecycle.ensure_open("GetTransactionStatus")?;
        with_cancel(ctx, "GetTransactionStatus", async {
            self.deps
                .tx_manager
                .get_transaction_status(transaction_id)
                .await
                .map_err(|e| ProviderError::collaborator("get transaction status", transaction_id, e))
        })
        .await
    }

    pub fn offchain_config_digester(&self) -> Arc<dyn OffchainConfigDigester> {
        self.deps.config_watcher.offchain_config_digester()
    }

    pub fn contract_config_tracker(&self) -> Arc<dyn ContractConfigTracker> {
        self.deps.config_watcher.contract_config_tracker()
    }

    pub fn contract_transmitter(&self) -> Arc<dyn ContractTransmitter> {
        self.deps.contract_transmitter.clone()
    }
}

#[async_trait]
impl ExecProvider for DestinationExecProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> Role {
        Role::Destination
    }

    async fn start(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        DestinationExecProvider::start(self, ctx).await
    }

    async fn close(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        DestinationExecProvider::close(self, ctx).await
    }

    fn offchain_config_digester(&self) -> Arc<dyn OffchainConfigDigester> {
        DestinationExecProvider::offchain_config_digester(self)
    }

    fn contract_config_tracker(&self) -> Arc<dyn ContractConfigTracker> {
        DestinationExecProvider::contract_config_tracker(self)
    }

    fn contract_transmitter(&self) -> Arc<dyn ContractTransmitter> {
        DestinationExecProvider::contract_transmitter(self)
    }

    async fn new_on_ramp_reader(
        &self,
        _ctx: &CancellationToken,
        _address: &GenericAddress,
        _source_chain_selector: u64,
        _dest_chain_selector: u64,
    ) -> Result<Arc<dyn OnRampReader>, ProviderError> {
        Err(wrong_role("NewOnRampReader", Role::Destination))
    }

    async fn new_off_ramp_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn OffRampReader>, ProviderError> {
        DestinationExecProvider::new_off_ramp_reader(self, ctx, address).await
    }

    async fn new_commit_store_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>, ProviderError> {
        DestinationExecProvider::new_commit_store_reader(self, ctx, address).await
    }

    async fn new_price_registry_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn PriceRegistryReader>, ProviderError> {
        DestinationExecProvider::new_price_registry_reader(self, ctx, address).await
    }

    async fn new_token_data_reader(
        &self,
        _ctx: &CancellationToken,
        _token: &GenericAddress,
    ) -> Result<Arc<dyn TokenDataReader>, ProviderError> {
        Err(wrong_role("NewTokenDataReader", Role::Destination))
    }

    async fn new_token_pool_batched_reader(
        &self,
        ctx: &CancellationToken,
        off_ramp: &GenericAddress,
        source_chain_selector: u64,
    ) -> Result<Arc<dyn TokenPoolBatchedReader>, ProviderError> {
        DestinationExecProvider::new_token_pool_batched_reader(
            self,
            ctx,
            off_ramp,
            source_chain_selector,
        )
        .await
    }

    async fn source_native_token(
        &self,
        _ctx: &CancellationToken,
        _router: &GenericAddress,
    ) -> Result<GenericAddress, ProviderError> {
        Err(wrong_role("SourceNativeToken", Role::Destination))
    }

    async fn get_transaction_status(
        &self,
        ctx: &CancellationToken,
        transaction_id: &str,
    ) -> Result<TransactionStatus, ProviderError> {
        DestinationExecProvider::get_transaction_status(self, ctx, transaction_id).await
    }
}
