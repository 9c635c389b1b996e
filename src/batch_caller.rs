//! Dynamically limited batch caller
//!
//! Splits read-only contract calls into RPC batches of at most `batch_size_limit`
//! calls and runs up to `max_parallel_calls` batches at once. When a batch fails
//! as a whole (usually the node rejecting an oversized batch), the limit is divided
//! by `backoff_multiplier` and the whole call set retried. The reduced limit sticks
//! for later calls.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use eyre::{eyre, Result, WrapErr};
use futures::stream::{self, StreamExt, TryStreamExt};
use tracing::{debug, warn};

use crate::collaborators::ChainClient;
use crate::config::BatchCallerConfig;
use crate::types::{CallOutcome, ContractCall};

pub struct DynamicLimitedBatchCaller {
    client: Arc<dyn ChainClient>,
    batch_size_limit: AtomicUsize,
    backoff_multiplier: usize,
    max_parallel_calls: usize,
}

impl DynamicLimitedBatchCaller {
    pub fn new(client: Arc<dyn ChainClient>, config: &BatchCallerConfig) -> Self {
        Self {
            client,
            batch_size_limit: AtomicUsize::new(config.batch_size_limit.max(1)),
            backoff_multiplier: config.backoff_multiplier.max(2),
            max_parallel_calls: config.max_parallel_calls.max(1),
        }
    }

    /// Current batch size limit
    pub fn batch_size_limit(&self) -> usize {
        self.batch_size_limit.load(Ordering::Relaxed)
    }

    pub fn max_parallel_calls(&self) -> usize {
        self.max_parallel_calls
    }

    /// Executes `calls`, returning one outcome per call in input order
    pub async fn batch_call(
        &self,
        calls: Vec<ContractCall>,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>> {
        if calls.is_empty() {
            return Ok(Vec::new());
        }

        loop {
            let limit = self.batch_size_limit();
            match self.call_in_batches(&calls, limit, block).await {
                Ok(outcomes) => return Ok(outcomes),
                Err(e) if limit > 1 => {
                    let reduced = (limit / self.backoff_multiplier).max(1);
                    // Another caller may already have lowered it further
                    let _ = self.batch_size_limit.compare_exchange(
                        limit,
                        reduced,
                        Ordering::Relaxed,
                        Ordering::Relaxed,
                    );
                    warn!(
                        error = %e,
                        from = limit,
                        to = reduced,
                        "Batch call failed, reducing batch size limit"
                    );
                }
                Err(e) => {
                    return Err(e).wrap_err("batch call failed at minimum batch size");
                }
            }
        }
    }

    async fn call_in_batches(
        &self,
        calls: &[ContractCall],
        limit: usize,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>> {
        let batches: Vec<Vec<ContractCall>> = calls.chunks(limit).map(|c| c.to_vec()).collect();
        debug!(
            calls = calls.len(),
            batches = batches.len(),
            limit = limit,
            "Executing batched contract calls"
        );

        let results: Vec<Vec<CallOutcome>> = stream::iter(batches)
            .map(|batch| {
                let client = self.client.clone();
                async move {
                    let expected = batch.len();
                    let outcomes = client.batch_call_contract(batch, block).await?;
                    if outcomes.len() != expected {
                        return Err(eyre!(
                            "batch returned {} results for {} calls",
                            outcomes.len(),
                            expected
                        ));
                    }
                    Ok(outcomes)
                }
            })
            .buffered(self.max_parallel_calls)
            .try_collect()
            .await?;

        Ok(results.into_iter().flatten().collect())
    }
}
