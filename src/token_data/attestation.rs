//! Polling HTTP client for attestation services

use std::future::Future;
use std::time::Duration;

use alloy::primitives::Bytes;
use eyre::{eyre, Result, WrapErr};
use tracing::debug;
use url::Url;

/// Outcome of a single attestation request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttestationPoll<T> {
    Ready(T),
    Pending,
}

/// Attestation API client bound to one base URL
#[derive(Debug, Clone)]
pub struct AttestationClient {
    base: Url,
    timeout: Duration,
    interval: Duration,
    http: reqwest::Client,
}

impl AttestationClient {
    pub fn new(base: Url, timeout: Duration, interval: Duration) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .wrap_err("Failed to build attestation HTTP client")?;
        Ok(Self {
            base,
            timeout,
            interval,
            http,
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `path` appended to the base URL's path
    pub fn endpoint(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let joined = format!(
            "{}/{}",
            url.path().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        url.set_path(&joined);
        url
    }

    /// Repeats `attempt` every `interval` until it is ready, errors, or the
    /// overall timeout elapses
    pub async fn poll<T, F, Fut>(&self, what: &str, mut attempt: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<AttestationPoll<T>>>,
    {
        let polling = async {
            let mut attempts: u32 = 0;
            loop {
                attempts += 1;
                match attempt().await? {
                    AttestationPoll::Ready(value) => return Ok::<T, eyre::Report>(value),
                    AttestationPoll::Pending => {
                        debug!(
                            what = %what,
                            attempts = attempts,
                            "Attestation not ready yet"
                        );
                        tokio::time::sleep(self.interval).await;
                    }
                }
            }
        };

        match tokio::time::timeout(self.timeout, polling).await {
            Ok(result) => result,
            Err(_) => Err(eyre!(
                "attestation for {} not ready after {:?}",
                what,
                self.timeout
            )),
        }
    }
}

/// Decode a 0x-prefixed (or bare) hex attestation
pub fn decode_hex_bytes(raw: &str) -> Result<Bytes> {
    let hex_part = raw.strip_prefix("0x").unwrap_or(raw);
    let bytes = hex::decode(hex_part).wrap_err("attestation is not valid hex")?;
    Ok(Bytes::from(bytes))
}
