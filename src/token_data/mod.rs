//! Attestation-backed token bridges
//!
//! Maps a source token address to its configured bridge and builds the matching
//! [`TokenDataReader`]. USDC is checked before LBTC.

pub mod attestation;
pub mod lbtc;
pub mod usdc;

use std::fmt;
use std::sync::Arc;

use alloy::primitives::Address;
use tracing::info;
use url::Url;

use crate::collaborators::TokenDataReader;
use crate::config::{TokenBridgeConfig, UsdcConfig};
use crate::error::ProviderError;
use crate::types::GenericAddress;

use self::attestation::AttestationClient;
use self::lbtc::LbtcTokenDataReader;
use self::usdc::{UsdcMessageSubscription, UsdcTokenDataReader};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenBridgeKind {
    Usdc,
    Lbtc,
}

impl TokenBridgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenBridgeKind::Usdc => "USDC",
            TokenBridgeKind::Lbtc => "LBTC",
        }
    }
}

impl fmt::Display for TokenBridgeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct TokenBridgeDispatcher {
    usdc: Option<UsdcConfig>,
    lbtc: Option<TokenBridgeConfig>,
    usdc_messages: Option<Arc<UsdcMessageSubscription>>,
}

impl TokenBridgeDispatcher {
    /// `usdc_messages` must be present whenever `usdc` is
    pub fn new(
        usdc: Option<UsdcConfig>,
        lbtc: Option<TokenBridgeConfig>,
        usdc_messages: Option<Arc<UsdcMessageSubscription>>,
    ) -> Result<Self, ProviderError> {
        if usdc.is_some() && usdc_messages.is_none() {
            return Err(ProviderError::Config(
                "USDC bridge configured without a MessageSent subscription".to_string(),
            ));
        }
        if let (Some(u), Some(l)) = (&usdc, &lbtc) {
            if u.bridge.source_token_address == l.source_token_address {
                return Err(ProviderError::Config(format!(
                    "USDC and LBTC bridges both claim token {}",
                    l.source_token_address
                )));
            }
        }
        Ok(Self {
            usdc,
            lbtc,
            usdc_messages,
        })
    }

    pub fn usdc_messages(&self) -> Option<&Arc<UsdcMessageSubscription>> {
        self.usdc_messages.as_ref()
    }

    /// Bridge claiming `token`, USDC first
    pub fn resolve(
        &self,
        token: &GenericAddress,
    ) -> Result<(TokenBridgeKind, &TokenBridgeConfig), ProviderError> {
        let address = token.to_evm()?;
        if let Some(usdc) = &self.usdc {
            if usdc.bridge.source_token_address == address {
                return Ok((TokenBridgeKind::Usdc, &usdc.bridge));
            }
        }
        if let Some(lbtc) = &self.lbtc {
            if lbtc.source_token_address == address {
                return Ok((TokenBridgeKind::Lbtc, lbtc));
            }
        }
        Err(ProviderError::UnsupportedToken(token.clone()))
    }

    pub fn build_reader(
        &self,
        kind: TokenBridgeKind,
        config: &TokenBridgeConfig,
    ) -> Result<Arc<dyn TokenDataReader>, ProviderError> {
        let client = attestation_client(kind, config)?;
        let token: Address = config.source_token_address;

        let reader: Arc<dyn TokenDataReader> = match kind {
            TokenBridgeKind::Usdc => {
                let messages = self.usdc_messages.clone().ok_or_else(|| {
                    ProviderError::Config("USDC MessageSent subscription missing".to_string())
                })?;
                Arc::new(UsdcTokenDataReader::new(messages, client, token))
            }
            TokenBridgeKind::Lbtc => Arc::new(LbtcTokenDataReader::new(client, token)),
        };

        info!(
            bridge = %kind,
            token = %token,
            timeout = ?config.attestation_timeout(),
            interval = ?config.attestation_interval(),
            "Created token data reader"
        );
        Ok(reader)
    }

    /// `resolve` then `build_reader`
    pub fn new_reader(
        &self,
        token: &GenericAddress,
    ) -> Result<Arc<dyn TokenDataReader>, ProviderError> {
        let (kind, config) = self.resolve(token)?;
        self.build_reader(kind, config)
    }
}

/// The attestation API must be an absolute URL
pub fn attestation_client(
    kind: TokenBridgeKind,
    config: &TokenBridgeConfig,
) -> Result<AttestationClient, ProviderError> {
    let base = Url::parse(&config.attestation_api).map_err(|source| {
        ProviderError::AttestationUrl {
            bridge: kind,
            url: config.attestation_api.clone(),
            source,
        }
    })?;
    AttestationClient::new(
        base,
        config.attestation_timeout(),
        config.attestation_interval(),
    )
    .map_err(|e| ProviderError::collaborator("build attestation client", kind, e))
}
