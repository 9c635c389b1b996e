//! Error types for the execution providers
//!
//! Collaborators report failures as [`eyre::Report`]; the providers wrap them in
//! [`ProviderError`] together with the operation and address/id involved, so the
//! hosting engine can tell role misuse, configuration problems, unsupported tokens
//! and collaborator failures apart.

use std::fmt;
use thiserror::Error;

use crate::token_data::TokenBridgeKind;
use crate::types::{GenericAddress, Role};

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxes an eyre report so it can sit behind `#[source]`
pub fn boxed(report: eyre::Report) -> BoxError {
    report.into()
}

#[derive(Error, Debug)]
pub enum ProviderError {
    // ========================================================================
    // Role / Lifecycle Errors
    // ========================================================================
    #[error("invalid: {operation} called on {role} exec provider, it should only be called on {} exec provider", .role.opposite())]
    WrongRole {
        operation: &'static str,
        role: Role,
    },

    #[error("{operation} called on closed {role} exec provider")]
    Closed {
        operation: &'static str,
        role: Role,
    },

    #[error("{role} exec provider already closed")]
    AlreadyClosed { role: Role },

    #[error("{role} exec provider already started")]
    AlreadyStarted { role: Role },

    #[error("{operation} cancelled")]
    Cancelled { operation: &'static str },

    // ========================================================================
    // Construction Errors
    // ========================================================================
    #[error("invalid address {address}: {reason}")]
    InvalidAddress { address: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("failed to parse {bridge} attestation API {url:?}: {source}")]
    AttestationUrl {
        bridge: TokenBridgeKind,
        url: String,
        #[source]
        source: url::ParseError,
    },

    // ========================================================================
    // Dispatch Errors
    // ========================================================================
    #[error("unsupported token address: {0}")]
    UnsupportedToken(GenericAddress),

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    #[error("{operation} failed for {target}: {source}")]
    Collaborator {
        operation: &'static str,
        target: String,
        #[source]
        source: BoxError,
    },

    #[error(transparent)]
    Teardown(#[from] TeardownErrors),
}

impl ProviderError {
    pub fn collaborator(
        operation: &'static str,
        target: impl fmt::Display,
        report: eyre::Report,
    ) -> Self {
        ProviderError::Collaborator {
            operation,
            target: target.to_string(),
            source: boxed(report),
        }
    }

    /// True for errors caused by calling an operation on the wrong provider variant
    pub fn is_wrong_role(&self) -> bool {
        matches!(self, ProviderError::WrongRole { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ProviderError::Cancelled { .. })
    }
}

// ============================================================================
// Aggregated Teardown Errors
// ============================================================================

/// Which teardown step failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TeardownKind {
    OnRampReader,
    CommitStoreReader,
    OffRampReader,
    UsdcMessageSubscription,
}

impl TeardownKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TeardownKind::OnRampReader => "on-ramp reader",
            TeardownKind::CommitStoreReader => "commit store reader",
            TeardownKind::OffRampReader => "off-ramp reader",
            TeardownKind::UsdcMessageSubscription => "usdc message subscription",
        }
    }
}

impl fmt::Display for TeardownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Error, Debug)]
#[error("close {kind}: {source}")]
pub struct TeardownFailure {
    pub kind: TeardownKind,
    #[source]
    pub source: ProviderError,
}

/// Every failure from a best-effort teardown, in step order.
///
/// Empty means the teardown succeeded.
#[derive(Debug, Default)]
pub struct TeardownErrors {
    failures: Vec<TeardownFailure>,
}

impl TeardownErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: TeardownKind, source: ProviderError) {
        self.failures.push(TeardownFailure { kind, source });
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    pub fn kinds(&self) -> Vec<TeardownKind> {
        self.failures.iter().map(|f| f.kind).collect()
    }

    pub fn into_result(self) -> Result<(), TeardownErrors> {
        if self.is_empty() {
            Ok(())
        } else {
            Err(self)
        }
    }
}

impl fmt::Display for TeardownErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for TeardownErrors {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| f as &(dyn std::error::Error + 'static))
    }
}
