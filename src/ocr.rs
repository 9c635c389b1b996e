//! Inert OCR surfaces for the source provider
//!
//! The source side takes no part in OCR config tracking or transmission. These
//! stand-ins let the hosting engine poll the accessors, but any call on them
//! fails and is logged at error level.

use alloy::primitives::Bytes;
use async_trait::async_trait;
use eyre::{eyre, Result};
use tracing::error;

use crate::collaborators::{ContractConfigTracker, ContractTransmitter, OffchainConfigDigester};
use crate::types::{ConfigDigest, ContractConfig};

fn unimplemented(surface: &'static str, method: &'static str) -> eyre::Report {
    error!(surface = surface, method = method, "Unimplemented OCR method called on source exec provider");
    eyre!("{}::{} is not implemented on the source exec provider", surface, method)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedOffchainConfigDigester;

impl OffchainConfigDigester for UnimplementedOffchainConfigDigester {
    fn config_digest(&self, _config: &ContractConfig) -> Result<ConfigDigest> {
        Err(unimplemented("OffchainConfigDigester", "ConfigDigest"))
    }

    fn config_digest_prefix(&self) -> Result<u16> {
        Err(unimplemented("OffchainConfigDigester", "ConfigDigestPrefix"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedContractConfigTracker;

#[async_trait]
impl ContractConfigTracker for UnimplementedContractConfigTracker {
    async fn latest_config_details(&self) -> Result<(u64, ConfigDigest)> {
        Err(unimplemented("ContractConfigTracker", "LatestConfigDetails"))
    }

    async fn latest_config(&self, _changed_in_block: u64) -> Result<ContractConfig> {
        Err(unimplemented("ContractConfigTracker", "LatestConfig"))
    }

    async fn latest_block_height(&self) -> Result<u64> {
        Err(unimplemented("ContractConfigTracker", "LatestBlockHeight"))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct UnimplementedContractTransmitter;

#[async_trait]
impl ContractTransmitter for UnimplementedContractTransmitter {
    async fn transmit(
        &self,
        _config_digest: ConfigDigest,
        _report: Bytes,
        _signatures: Vec<Bytes>,
    ) -> Result<()> {
        Err(unimplemented("ContractTransmitter", "Transmit"))
    }

    async fn latest_config_digest_and_epoch(&self) -> Result<(ConfigDigest, u32)> {
        Err(unimplemented("ContractTransmitter", "LatestConfigDigestAndEpoch"))
    }

    fn from_account(&self) -> Result<String> {
        Err(unimplemented("ContractTransmitter", "FromAccount"))
    }
}
