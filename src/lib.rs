//! Cross-chain execution providers
//!
//! Directional adapters that let an execution plugin read and act on a lane of the
//! cross-chain messaging protocol without knowing ledger details:
//!
//! - **Source provider** - on-ramp, price registry, token data (USDC/LBTC
//!   attestations) and wrapped-native lookups on the source chain
//! - **Destination provider** - off-ramp, commit store, token pools, price
//!   registry and transaction status on the destination chain
//! - **Reader registry** - remembers which readers were created so `Close` can
//!   unregister exactly those, reporting every failure
//! - **Token bridges** - dispatch from token address to attestation-backed reader
//!
//! Ledger clients, the log poller, fee estimation, the transaction manager and the
//! contract reader bindings are injected through the traits in [`collaborators`].
//!
//! ## Usage
//!
//! ```ignore
//! let ctx = CancellationToken::new();
//! let config = ExecProviderConfig::load()?;
//! let source = SourceExecProvider::new("job-1", deps, &config).await?;
//! source.start(&ctx).await?;
//! let on_ramp = source.new_on_ramp_reader(&ctx, &address, 1, 2).await?;
//! source.close(&ctx).await?;
//! ```

pub mod batch_caller;
pub mod collaborators;
pub mod commit_store;
pub mod config;
pub mod error;
pub mod lifecycle;
pub mod ocr;
pub mod provider;
pub mod registry;
pub mod router;
pub mod token_data;
pub mod types;

pub use batch_caller::DynamicLimitedBatchCaller;
pub use config::{BatchCallerConfig, ExecProviderConfig, TokenBridgeConfig, UsdcConfig};
pub use error::{ProviderError, TeardownErrors, TeardownFailure, TeardownKind};
pub use lifecycle::LifecycleState;
pub use provider::{
    DestinationCollaborators, DestinationExecProvider, ExecProvider, HealthReport,
    SourceCollaborators, SourceExecProvider,
};
pub use registry::{ReaderRegistry, SeenResource};
pub use token_data::{TokenBridgeDispatcher, TokenBridgeKind};
pub use types::{GenericAddress, OnRampParams, Role, TransactionStatus};
