//! USDC-style token data
//!
//! The message transmitter emits `MessageSent(bytes)` alongside every burn. The
//! attestation service signs `keccak256(message)`; the destination needs both the
//! message and the attestation, ABI-encoded together.

use std::sync::Arc;

use alloy::primitives::{keccak256, Address, Bytes, B256};
use alloy::sol;
use alloy::sol_types::{SolEvent, SolValue};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, info};

use crate::collaborators::{LogPoller, TokenDataReader};
use crate::token_data::attestation::{decode_hex_bytes, AttestationClient, AttestationPoll};
use crate::types::{LogFilter, TokenTransferMessage};

sol! {
    /// Emitted by the message transmitter for each burn
    event MessageSent(bytes message);

    /// Token data handed to the destination chain
    struct MessageAndAttestation {
        bytes message;
        bytes attestation;
    }
}

const ATTESTATION_STATUS_COMPLETE: &str = "complete";

/// Log subscription for `MessageSent` events of one message transmitter.
///
/// Registered once per source provider; unregistered on close.
pub struct UsdcMessageSubscription {
    log_poller: Arc<dyn LogPoller>,
    filter_name: String,
    transmitter: Address,
}

impl UsdcMessageSubscription {
    pub fn new(log_poller: Arc<dyn LogPoller>, job_id: &str, transmitter: Address) -> Self {
        Self {
            log_poller,
            filter_name: Self::filter_name(job_id, transmitter),
            transmitter,
        }
    }

    pub fn filter_name(job_id: &str, transmitter: Address) -> String {
        format!("ccip-usdc-message-sent-{}-{}", job_id, transmitter)
    }

    pub fn name(&self) -> &str {
        &self.filter_name
    }

    pub fn transmitter(&self) -> Address {
        self.transmitter
    }

    pub fn log_filter(&self) -> LogFilter {
        LogFilter {
            name: self.filter_name.clone(),
            event_signatures: vec![MessageSent::SIGNATURE_HASH],
            addresses: vec![self.transmitter],
        }
    }

    pub async fn register(&self) -> Result<()> {
        self.log_poller
            .register_filter(self.log_filter())
            .await
            .wrap_err_with(|| format!("register filter {}", self.filter_name))?;
        info!(filter = %self.filter_name, transmitter = %self.transmitter, "Registered USDC MessageSent filter");
        Ok(())
    }

    pub async fn unregister(&self) -> Result<()> {
        self.log_poller.unregister_filter(&self.filter_name).await
    }

    /// Message body of the `ordinal`-th of `usdc_transfers` USDC burns in `msg`.
    ///
    /// The burns' `MessageSent` logs are the last `usdc_transfers` logs emitted
    /// before the send request, in token order.
    pub async fn message_body(
        &self,
        msg: &TokenTransferMessage,
        ordinal: usize,
        usdc_transfers: usize,
    ) -> Result<Bytes> {
        let mut logs = self
            .log_poller
            .indexed_logs_by_tx_hash(MessageSent::SIGNATURE_HASH, self.transmitter, msg.tx_hash)
            .await
            .wrap_err_with(|| format!("fetch MessageSent logs for tx {}", msg.tx_hash))?;

        logs.retain(|log| log.log_index < msg.log_index);
        logs.sort_by_key(|log| log.log_index);

        if logs.len() < usdc_transfers || ordinal >= usdc_transfers {
            return Err(eyre!(
                "expected {} MessageSent logs before log index {} in tx {}, found {}",
                usdc_transfers,
                msg.log_index,
                msg.tx_hash,
                logs.len()
            ));
        }

        let log = &logs[logs.len() - usdc_transfers + ordinal];
        let (message,) = MessageSent::abi_decode_data(&log.data, true)
            .wrap_err("decode MessageSent data")?;
        Ok(message)
    }
}

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    status: String,
    #[serde(default)]
    attestation: Option<String>,
}

pub struct UsdcTokenDataReader {
    messages: Arc<UsdcMessageSubscription>,
    client: AttestationClient,
    token: Address,
}

impl UsdcTokenDataReader {
    pub fn new(
        messages: Arc<UsdcMessageSubscription>,
        client: AttestationClient,
        token: Address,
    ) -> Self {
        Self {
            messages,
            client,
            token,
        }
    }

    pub fn client(&self) -> &AttestationClient {
        &self.client
    }

    async fn fetch_attestation(&self, message_hash: B256) -> Result<AttestationPoll<Bytes>> {
        let url = self
            .client
            .endpoint(&format!("v1/attestations/0x{}", hex::encode(message_hash)));
        let response = self
            .client
            .http()
            .get(url)
            .send()
            .await
            .wrap_err("USDC attestation request failed")?;

        // Iris answers 404 until it has seen the burn
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(AttestationPoll::Pending);
        }
        if !response.status().is_success() {
            return Err(eyre!(
                "USDC attestation API returned status {}",
                response.status()
            ));
        }

        let body: AttestationResponse = response
            .json()
            .await
            .wrap_err("invalid USDC attestation response")?;
        match (body.status.as_str(), body.attestation) {
            (ATTESTATION_STATUS_COMPLETE, Some(attestation)) => {
                Ok(AttestationPoll::Ready(decode_hex_bytes(&attestation)?))
            }
            (status, _) => {
                debug!(status = %status, hash = %message_hash, "USDC attestation pending");
                Ok(AttestationPoll::Pending)
            }
        }
    }
}

#[async_trait]
impl TokenDataReader for UsdcTokenDataReader {
    async fn read_token_data(&self, msg: &TokenTransferMessage, token_index: usize) -> Result<Bytes> {
        let token = msg
            .tokens
            .get(token_index)
            .ok_or_else(|| eyre!("token index {} out of range", token_index))?;
        if *token != self.token {
            return Err(eyre!("token {} is not the configured USDC token", token));
        }

        let usdc_positions: Vec<usize> = msg
            .tokens
            .iter()
            .enumerate()
            .filter(|(_, t)| **t == self.token)
            .map(|(i, _)| i)
            .collect();
        let ordinal = usdc_positions
            .iter()
            .position(|&i| i == token_index)
            .ok_or_else(|| eyre!("token index {} is not a USDC transfer", token_index))?;

        let message = self
            .messages
            .message_body(msg, ordinal, usdc_positions.len())
            .await?;
        let message_hash = keccak256(&message);

        let attestation = self
            .client
            .poll(&message_hash.to_string(), || self.fetch_attestation(message_hash))
            .await?;

        Ok(MessageAndAttestation {
            message,
            attestation,
        }
        .abi_encode()
        .into())
    }
}
