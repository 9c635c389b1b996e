//! LBTC-style token data
//!
//! When attestation is enabled on the pool, the source token data is the 32-byte
//! payload hash. The notarization service is queried by hash until the session is
//! approved. Any other length means the pool ships the payload itself.

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collaborators::TokenDataReader;
use crate::token_data::attestation::{decode_hex_bytes, AttestationClient, AttestationPoll};
use crate::types::TokenTransferMessage;

pub const STATUS_APPROVED: &str = "NOTARIZATION_STATUS_SESSION_APPROVED";
pub const STATUS_FAILED: &str = "NOTARIZATION_STATUS_FAILED";

const PAYLOAD_HASH_LEN: usize = 32;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AttestationRequest {
    message_hash: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct AttestationResponse {
    #[serde(default)]
    attestations: Vec<Attestation>,
}

#[derive(Debug, Deserialize)]
struct Attestation {
    message_hash: String,
    status: String,
    #[serde(default)]
    attestation: Option<String>,
}

pub struct LbtcTokenDataReader {
    client: AttestationClient,
    token: Address,
}

impl LbtcTokenDataReader {
    pub fn new(client: AttestationClient, token: Address) -> Self {
        Self { client, token }
    }

    pub fn client(&self) -> &AttestationClient {
        &self.client
    }

    async fn fetch_attestation(&self, payload_hash: B256) -> Result<AttestationPoll<Bytes>> {
        let hash = format!("0x{}", hex::encode(payload_hash));
        let response = self
            .client
            .http()
            .post(self.client.endpoint("bridge/v1/deposits/getByHash"))
            .json(&AttestationRequest {
                message_hash: vec![hash.clone()],
            })
            .send()
            .await
            .wrap_err("LBTC attestation request failed")?;

        if !response.status().is_success() {
            return Err(eyre!(
                "LBTC attestation API returned status {}",
                response.status()
            ));
        }

        let body: AttestationResponse = response
            .json()
            .await
            .wrap_err("invalid LBTC attestation response")?;
        let entry = body
            .attestations
            .into_iter()
            .find(|a| a.message_hash.eq_ignore_ascii_case(&hash));

        match entry {
            Some(a) if a.status == STATUS_APPROVED => {
                let raw = a
                    .attestation
                    .ok_or_else(|| eyre!("approved attestation for {} has no data", hash))?;
                Ok(AttestationPoll::Ready(decode_hex_bytes(&raw)?))
            }
            Some(a) if a.status == STATUS_FAILED => {
                Err(eyre!("notarization failed for payload {}", hash))
            }
            Some(a) => {
                debug!(status = %a.status, hash = %hash, "LBTC attestation pending");
                Ok(AttestationPoll::Pending)
            }
            None => Ok(AttestationPoll::Pending),
        }
    }
}

#[async_trait]
impl TokenDataReader for LbtcTokenDataReader {
    async fn read_token_data(&self, msg: &TokenTransferMessage, token_index: usize) -> Result<Bytes> {
        let token = msg
            .tokens
            .get(token_index)
            .ok_or_else(|| eyre!("token index {} out of range", token_index))?;
        if *token != self.token {
            return Err(eyre!("token {} is not the configured LBTC token", token));
        }
        let source_data = msg
            .source_token_data
            .get(token_index)
            .ok_or_else(|| eyre!("no source token data for token index {}", token_index))?;

        if source_data.len() != PAYLOAD_HASH_LEN {
            debug!(len = source_data.len(), "LBTC attestation disabled, using payload");
            return Ok(source_data.clone());
        }

        let payload_hash = B256::from_slice(source_data);
        self.client
            .poll(&payload_hash.to_string(), || self.fetch_attestation(payload_hash))
            .await
    }
}
