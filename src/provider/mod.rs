//! Directional execution providers
//!
//! [`SourceExecProvider`] and [`DestinationExecProvider`] each expose their valid
//! operations as inherent methods. Both also implement [`ExecProvider`], the
//! drop-in form the hosting engine drives, where an operation belonging to the
//! other side fails with [`ProviderError::WrongRole`] and touches nothing.

mod dest;
mod source;

pub use dest::{DestinationCollaborators, DestinationExecProvider};
pub use source::{SourceCollaborators, SourceExecProvider};

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::collaborators::{
    CommitStoreReader, ContractConfigTracker, ContractTransmitter, OffRampReader,
    OffchainConfigDigester, OnRampReader, PriceRegistryReader, TokenDataReader,
    TokenPoolBatchedReader,
};
use crate::error::ProviderError;
use crate::types::{GenericAddress, Role, TransactionStatus};

/// Health of a provider's subcomponents, keyed by name. `Ok` means healthy.
pub type HealthReport = HashMap<String, Result<(), String>>;

#[async_trait]
pub trait ExecProvider: Send + Sync {
    fn name(&self) -> &str;

    fn role(&self) -> Role;

    /// Replays missed logs when a start block is configured
    async fn start(&self, ctx: &CancellationToken) -> Result<(), ProviderError>;

    /// Tears down every reader this provider created. Runs every step even if
    /// earlier ones fail; may be called once.
    async fn close(&self, ctx: &CancellationToken) -> Result<(), ProviderError>;

    fn ready(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    fn health_report(&self) -> HealthReport {
        HealthReport::new()
    }

    fn offchain_config_digester(&self) -> Arc<dyn OffchainConfigDigester>;

    fn contract_config_tracker(&self) -> Arc<dyn ContractConfigTracker>;

    fn contract_transmitter(&self) -> Arc<dyn ContractTransmitter>;

    async fn new_on_ramp_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
        source_chain_selector: u64,
        dest_chain_selector: u64,
    ) -> Result<Arc<dyn OnRampReader>, ProviderError>;

    async fn new_off_ramp_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn OffRampReader>, ProviderError>;

    async fn new_commit_store_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn CommitStoreReader>, ProviderError>;

    async fn new_price_registry_reader(
        &self,
        ctx: &CancellationToken,
        address: &GenericAddress,
    ) -> Result<Arc<dyn PriceRegistryReader>, ProviderError>;

    async fn new_token_data_reader(
        &self,
        ctx: &CancellationToken,
        token: &GenericAddress,
    ) -> Result<Arc<dyn TokenDataReader>, ProviderError>;

    async fn new_token_pool_batched_reader(
        &self,
        ctx: &CancellationToken,
        off_ramp: &GenericAddress,
        source_chain_selector: u64,
    ) -> Result<Arc<dyn TokenPoolBatchedReader>, ProviderError>;

    async fn source_native_token(
        &self,
        ctx: &CancellationToken,
        router: &GenericAddress,
    ) -> Result<GenericAddress, ProviderError>;

    async fn get_transaction_status(
        &self,
        ctx: &CancellationToken,
        transaction_id: &str,
    ) -> Result<TransactionStatus, ProviderError>;
}

pub(crate) fn wrong_role(operation: &'static str, role: Role) -> ProviderError {
    ProviderError::WrongRole { operation, role }
}
