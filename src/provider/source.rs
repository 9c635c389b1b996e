use std::sync::Arc;

use alloy::primitives::U256;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::info;

use super::{wrong_role, ExecProvider};
use crate::collaborators::{
    ChainClient, CommitStoreReader, ContractConfigTracker, ContractTransmitter, FeeEstimator,
    FeeEstimatorConfig, LogPoller, OffRampReader, OffchainConfigDigester, OnRampReader,
    PriceRegistryReader, ReaderFactory, TokenDataReader, TokenPoolBatchedReader,
};
use crate::commit_store::IncompleteSourceCommitStoreReader;
use crate::config::ExecProviderConfig;
use crate::error::ProviderError;
use crate::lifecycle::{with_cancel, Lifecycle, LifecycleState};
use crate::ocr::{
    UnimplementedContractConfigTracker, UnimplementedContractTransmitter,
    UnimplementedOffchainConfigDigester,
};
use crate::registry::{ReaderRegistry, TeardownStep};
use crate::router::wrapped_native;
use crate::token_data::usdc::UsdcMessageSubscription;
use crate::token_data::TokenBridgeDispatcher;
use crate::types::{GenericAddress, OnRampParams, Role, TransactionStatus};

/// Source-chain collaborators
#[derive(Clone)]
pub struct SourceCollaborators {
    pub client: Arc<dyn ChainClient>,
    pub log_poller: Arc<dyn LogPoller>,
    pub reader_factory: Arc<dyn ReaderFactory>,
    pub estimator: Arc<dyn FeeEstimator>,
    pub fee_estimator_config: Arc<dyn FeeEstimatorConfig>,
}

/// Execution provider for the source side of a lane
pub struct SourceExecProvider {
    name: String,
    deps: SourceCollaborators,
    start_block: u64,
    max_gas_price: U256,
    token_bridges: TokenBridgeDispatcher,
    registry: ReaderRegistry,
    lifecycle: Lifecycle,
}

impl SourceExecProvider {
    /// Registers the USDC `MessageSent` filter up front when a USDC bridge is
    /// configured, so attestation lookups can find the burn messages later.
    pub async fn new(
        job_id: &str,
        deps: SourceCollaborators,
        config: &ExecProviderConfig,
    ) -> Result<Self, ProviderError> {
        config.validate()?;

        let usdc_messages = match &config.usdc {
            Some(usdc) => {
                let messages = Arc::new(UsdcMessageSubscription::new(
                    deps.log_poller.clone(),
                    job_id,
                    usdc.source_message_transmitter_address,
                ));
                messages.register().await.map_err(|e| {
                    ProviderError::collaborator("new usdc reader", messages.name(), e)
                })?;
                Some(messages)
            }
            None => None,
        };

        let token_bridges =
            TokenBridgeDispatcher::new(config.usdc.clone(), config.lbtc.clone(), usdc_messages)?;

        let name = format!("{}.SourceExecProvider", job_id);
        info!(
            provider = %name,
            start_block = config.start_block,
            usdc = config.usdc.is_some(),
            lbtc = config.lbtc.is_some(),
            "Created source exec provider"
        );

        Ok(Self {
            name,
            deps,
            start_block: config.start_block,
            max_gas_price: config.max_gas_price,
            token_bridges,
            registry: ReaderRegistry::new(),
            lifecycle: Lifecycle::new(Role::Source),
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

    /// A failed replay leaves the provider in `Created`, ready for another `Start`
    pub async fn start(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        self.lifecycle.begin_start()?;
        if self.start_block == 0 {
            return Ok(());
        }

        info!(provider = %self.name, from_block = self.start_block, "Start replaying source chain");
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

    /// Closes the on-ramp reader if one was created and the USDC subscription if
    /// a USDC bridge is configured. Every failure is reported.
    pub async fn close(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        self.lifecycle.begin_close()?;

        let mut extra = Vec::new();
        if let Some(messages) = self.token_bridges.usdc_messages() {
            extra.push(TeardownStep::UsdcMessageSubscription(messages.clone()));
        }
        let errors = self
            .registry
            .teardown_all(ctx, self.deps.reader_factory.as_ref(), extra)
            .await;

        self.lifecycle.finish_close();
        info!(provider = %self.name, failures = errors.len(), "Closed source exec provider");
        errors.into_result().map_err(ProviderError::from)
    }

    pub async fn new_on_ramp_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
        source_chain_selector: u64,
        dest_chain_selector: u64,
    ) -> Result<Arc<dyn OnRampReader>, ProviderError> {
        self.lifecycle.ensure_open("NewOnRampReader")?;
        let params = OnRampParams {
            address: address.clone(),
            source_chain_selector,
            dest_chain_selector,
        };

        let reader = with_cancel(ctx, "NewOnRampReader", async {
            self.deps
                .reader_factory
                .new_on_ramp_reader(&params)
                .await
                .map_err(|e| ProviderError::collaborator("new on-ramp reader", address, e))
        })
        .await?;

        self.registry.record_on_ramp_seen(params).await;
        self.deps.fee_estimator_config.set_on_ramp_reader(reader.clone());
        info!(
            provider = %self.name,
            address = %address,
            source_chain_selector,
            dest_chain_selector,
            "Created on-ramp reader"
        );
        Ok(reader)
    }

    /// Source-side stand-in; only its gas price estimator is usable
    pub async fn new_commit_store_reader(
        &self,
        _ctx: &CancellationToken,
        _address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>, ProviderError> {
        self.lifecycle.ensure_open("NewCommitStoreReader")?;
        Ok(Arc::new(IncompleteSourceCommitStoreReader::new(
            self.deps.estimator.clone(),
            self.max_gas_price,
            self.deps.fee_estimator_config.clone(),
        )))
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

    pub async fn new_token_data_reader(
        &self,
        ctx: &CancellationToken,
        token: &GenericAddress,
    ) -> Result<Arc<dyn TokenDataReader>, ProviderError> {
        self.lifecycle.ensure_open("NewTokenDataReader")?;
        if ctx.is_cancelled() {
            return Err(ProviderError::Cancelled {
                operation: "NewTokenDataReader",
            });
        }
        self.token_bridges.new_reader(token)
    }

    /// Wrapped native token configured on the source router
    pub async fn source_native_token(
        &self,
        ctx: &CancellationToken,
        router: &GenericAddress,
    ) -> Result<GenericAddress, ProviderError> {
        self.lifecycle.ensure_open("SourceNativeToken")?;
        let router_address = router.to_evm()?;
        let native = with_cancel(ctx, "SourceNativeToken", async {
            wrapped_native(self.deps.client.as_ref(), router_address)
                .await
                .map_err(|e| ProviderError::collaborator("get wrapped native", router, e))
        })
        .await?;
        Ok(GenericAddress::from(native))
    }

    pub fn offchain_config_digester(&self) -> Arc<dyn OffchainConfigDigester> {
        Arc::new(UnimplementedOffchainConfigDigester)
    }

    pub fn contract_config_tracker(&self) -> Arc<dyn ContractConfigTracker> {
        Arc::new(UnimplementedContractConfigTracker)
    }

    pub fn contract_transmitter(&self) -> Arc<dyn ContractTransmitter> {
        Arc::new(UnimplementedContractTransmitter)
    }
}

#[async_trait]
impl ExecProvider for SourceExecProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> Role {
        Role::Source
    }

    async fn start(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        SourceExecProvider::start(self, ctx).await
    }

    async fn close(&self, ctx: &CancellationToken) -> Result<(), ProviderError> {
        SourceExecProvider::close(self, ctx).await
    }

    fn offchain_config_digester(&self) -> Arc<dyn OffchainConfigDigester> {
        SourceExecProvider::offchain_config_digester(self)
    }

    fn contract_config_tracker(&self) -> Arc<dyn ContractConfigTracker> {
        SourceExecProvider::contract_config_tracker(self)
    }

    fn contract_transmitter(&self) -> Arc<dyn ContractTransmitter> {
        SourceExecProvider::contract_transmitter(self)
    }

    async fn new_on_ramp_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
        source_chain_selector: u64,
        dest_chain_selector: u64,
    ) -> Result<Arc<dyn OnRampReader>, ProviderError> {
        SourceExecProvider::new_on_ramp_reader(
            self,
            ctx,
            address,
            source_chain_selector,
            dest_chain_selector,
        )
        .await
    }

    async fn new_off_ramp_reader(
        &self,
        _ctx: &CancellationToken,
        _address: &GenericAddress,
    ) -> Result<Arc<dyn OffRampReader>, ProviderError> {
        Err(wrong_role("NewOffRampReader", Role::Source))
    }

    async fn new_commit_store_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>, ProviderError> {
        SourceExecProvider::new_commit_store_reader(self, ctx, address).await
    }

    async fn new_price_registry_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn PriceRegistryReader>, ProviderError> {
        SourceExecProvider::new_price_registry_reader(self, ctx, address).await
    }

    async fn new_token_data_reader(
        &self,
        ctx: &CancellationToken,
        token: &GenericAddress,
    ) -> Result<Arc<dyn TokenDataReader>, ProviderError> {
        SourceExecProvider::new_token_data_reader(self, ctx, token).await
    }

    async fn new_token_pool_batched_reader(
        &self,
        _ctx: &CancellationToken,
        _off_ramp: &GenericAddress,
        _source_chain_selector: u64,
    ) -> Result<Arc<dyn TokenPoolBatchedReader>, ProviderError> {
        Err(wrong_role("NewTokenPoolBatchedReader", Role::Source))
    }

    async fn source_native_token(
        &self,
        ctx: &CancellationToken,
        router: &GenericAddress,
    ) -> Result<GenericAddress, ProviderError> {
        SourceExecProvider::source_native_token(self, ctx, router).await
    }

    async fn get_transaction_status(
        &self,
        _ctx: &CancellationToken,
        _transaction_id: &str,
    ) -> Result<TransactionStatus, ProviderError> {
        Err(wrong_role("GetTransactionStatus", Role::Source))
    }
}
