//! Source-side commit store reader
//!
//! The commit store lives on the destination chain, so on the source side only the
//! execution gas price estimator is meaningful.

use std::sync::Arc;

use alloy::primitives::{B256, U256};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};

use crate::collaborators::{
    CommitStoreReader, FeeEstimator, FeeEstimatorConfig, GasPriceEstimator,
};

/// Execution gas price: the fee estimator's price, capped at `max_gas_price`
pub struct ExecGasPriceEstimator {
    estimator: Arc<dyn FeeEstimator>,
    max_gas_price: U256,
}

impl ExecGasPriceEstimator {
    pub fn new(estimator: Arc<dyn FeeEstimator>, max_gas_price: U256) -> Self {
        Self {
            estimator,
            max_gas_price,
        }
    }

    pub fn max_gas_price(&self) -> U256 {
        self.max_gas_price
    }
}

#[async_trait]
impl GasPriceEstimator for ExecGasPriceEstimator {
    async fn get_gas_price(&self) -> Result<U256> {
        let price = self
            .estimator
            .gas_price(self.max_gas_price)
            .await
            .wrap_err("Failed to estimate gas price")?;
        Ok(price.min(self.max_gas_price))
    }
}

pub struct IncompleteSourceCommitStoreReader {
    gas_price_estimator: Arc<ExecGasPriceEstimator>,
    // Held for parity with the full reader; the source side never reads it
    _fee_estimator_config: Arc<dyn FeeEstimatorConfig>,
}

impl IncompleteSourceCommitStoreReader {
    pub fn new(
        estimator: Arc<dyn FeeEstimator>,
        max_gas_price: U256,
        fee_estimator_config: Arc<dyn FeeEstimatorConfig>,
    ) -> Self {
        Self {
            gas_price_estimator: Arc::new(ExecGasPriceEstimator::new(estimator, max_gas_price)),
            _fee_estimator_config: fee_estimator_config,
        }
    }
}

fn invalid_usage(method: &str) -> eyre::Report {
    eyre!(
        "invalid usage: {} is not available on the source commit store reader",
        method
    )
}

#[async_trait]
impl CommitStoreReader for IncompleteSourceCommitStoreReader {
    fn gas_price_estimator(&self) -> Result<Arc<dyn GasPriceEstimator>> {
        Ok(self.gas_price_estimator.clone())
    }

    async fn get_expected_next_sequence_number(&self) -> Result<u64> {
        Err(invalid_usage("GetExpectedNextSequenceNumber"))
    }

    async fn is_down(&self) -> Result<bool> {
        Err(invalid_usage("IsDown"))
    }

    async fn is_blessed(&self, _root: B256) -> Result<bool> {
        Err(invalid_usage("IsBlessed"))
    }
}
