//! Router queries and the alloy-backed chain client

use alloy::{
    eips::BlockId,
    primitives::{Address, Bytes},
    providers::{Provider, ProviderBuilder, RootProvider},
    rpc::client::BatchRequest,
    rpc::types::{TransactionInput, TransactionRequest},
    sol,
    sol_types::SolCall,
    transports::http::{Client, Http},
};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use tracing::debug;

use crate::collaborators::ChainClient;
use crate::types::{CallOutcome, ContractCall};

sol! {
    interface IRouter {
        function getWrappedNative() external view returns (address);
    }
}

/// Wrapped native token configured on the router
pub async fn wrapped_native(client: &dyn ChainClient, router: Address) -> Result<Address> {
    let call = ContractCall {
        to: router,
        data: IRouter::getWrappedNativeCall {}.abi_encode().into(),
    };
    let raw = client
        .call_contract(call, None)
        .await
        .wrap_err("getWrappedNative call failed")?;
    let decoded = IRouter::getWrappedNativeCall::abi_decode_returns(&raw, true)
        .map_err(|e| eyre!("Failed to decode getWrappedNative result: {}", e))?;
    Ok(decoded._0)
}

/// [`ChainClient`] over an HTTP JSON-RPC endpoint
pub struct AlloyChainClient {
    provider: RootProvider<Http<Client>>,
}

impl AlloyChainClient {
    pub fn new(rpc_url: &str) -> Result<Self> {
        let provider = ProviderBuilder::new().on_http(
            rpc_url
                .parse()
                .wrap_err_with(|| format!("Invalid RPC URL: {}", rpc_url))?,
        );
        Ok(Self { provider })
    }

    pub fn provider(&self) -> &RootProvider<Http<Client>> {
        &self.provider
    }

    fn request(call: &ContractCall) -> TransactionRequest {
        TransactionRequest::default()
            .to(call.to)
            .input(TransactionInput::new(call.data.clone()))
    }
}

#[async_trait]
impl ChainClient for AlloyChainClient {
    async fn call_contract(&self, call: ContractCall, block: Option<u64>) -> Result<Bytes> {
        let tx = Self::request(&call);
        let pending = self.provider.call(&tx);
        let pending = match block {
            Some(number) => pending.block(BlockId::number(number)),
            None => pending,
        };
        pending
            .await
            .map_err(|e| eyre!("eth_call to {} failed: {}", call.to, e))
    }

    async fn batch_call_contract(
        &self,
        calls: Vec<ContractCall>,
        block: Option<u64>,
    ) -> Result<Vec<CallOutcome>> {
        let block_id = block.map(BlockId::number).unwrap_or_else(BlockId::latest);
        let mut batch = BatchRequest::new(self.provider.client());
        let waiters = calls
            .iter()
            .map(|call| batch.add_call::<_, Bytes>("eth_call", &(Self::request(call), block_id)))
            .collect::<Result<Vec<_>, _>>()
            .wrap_err("Failed to encode eth_call batch")?;

        debug!(calls = calls.len(), "Sending eth_call batch");
        batch
            .send()
            .await
            .map_err(|e| eyre!("eth_call batch of {} calls failed: {}", calls.len(), e))?;

        let mut outcomes = Vec::with_capacity(waiters.len());
        for (call, waiter) in calls.iter().zip(waiters) {
            match waiter.await {
                Ok(data) => outcomes.push(Ok(data)),
                // Reverts come back as JSON-RPC error responses for that call only
                Err(e) if e.is_error_resp() => {
                    outcomes.push(Err(format!("eth_call to {} failed: {}", call.to, e)))
                }
                Err(e) => {
                    return Err(eyre!(
                        "eth_call batch of {} calls failed: {}",
                        calls.len(),
                        e
                    ))
                }
            }
        }
        Ok(outcomes)
    }
}
