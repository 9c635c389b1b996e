//! Lazily created reader bookkeeping
//!
//! Records the parameters of the last successfully created on-ramp and commit-store
//! readers so `Close` can tear exactly those down. Teardown is best-effort: every
//! step runs, even under an already cancelled token, and every failure is kept.

use std::sync::Arc;

use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::collaborators::ReaderFactory;
use crate::error::{ProviderError, TeardownErrors, TeardownKind};
use crate::lifecycle::with_cancel_in_flight;
use crate::token_data::usdc::UsdcMessageSubscription;
use crate::types::{GenericAddress, OnRampParams};

/// Whether a reader kind was ever created, and with what parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SeenResource<T> {
    NeverCreated,
    Created(T),
}

impl<T> Default for SeenResource<T> {
    fn default() -> Self {
        SeenResource::NeverCreated
    }
}

impl<T> SeenResource<T> {
    pub fn as_created(&self) -> Option<&T> {
        match self {
            SeenResource::NeverCreated => None,
            SeenResource::Created(params) => Some(params),
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, SeenResource::Created(_))
    }
}

#[derive(Debug, Default)]
struct SeenReaders {
    on_ramp: SeenResource<OnRampParams>,
    commit_store: SeenResource<GenericAddress>,
}

/// Role-specific teardown work run in the same pass as the registry's own steps
pub enum TeardownStep {
    /// Always closes the fixed off-ramp, whether or not a reader was built
    OffRampReader(GenericAddress),
    UsdcMessageSubscription(Arc<UsdcMessageSubscription>),
}

impl TeardownStep {
    fn kind(&self) -> TeardownKind {
        match self {
            TeardownStep::OffRampReader(_) => TeardownKind::OffRampReader,
            TeardownStep::UsdcMessageSubscription(_) => TeardownKind::UsdcMessageSubscription,
        }
    }
}

#[derive(Debug, Default)]
pub struct ReaderRegistry {
    seen: Mutex<SeenReaders>,
}

impl ReaderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites any earlier on-ramp record
    pub async fn record_on_ramp_seen(&self, params: OnRampParams) {
        self.seen.lock().await.on_ramp = SeenResource::Created(params);
    }

    /// Overwrites any earlier commit-store record
    pub async fn record_commit_store_seen(&self, address: GenericAddress) {
        self.seen.lock().await.commit_store = SeenResource::Created(address);
    }

    pub async fn on_ramp(&self) -> SeenResource<OnRampParams> {
        self.seen.lock().await.on_ramp.clone()
    }

    pub async fn commit_store(&self) -> SeenResource<GenericAddress> {
        self.seen.lock().await.commit_store.clone()
    }

    /// Closes every recorded reader, then runs `extra` in order.
    ///
    /// Never short-circuits; the returned collection is empty on success.
    pub async fn teardown_all(
        &self,
        ctx: &CancellationToken,
        factory: &dyn ReaderFactory,
        extra: Vec<TeardownStep>,
    ) -> TeardownErrors {
        let (on_ramp, commit_store) = {
            let seen = self.seen.lock().await;
            (seen.on_ramp.clone(), seen.commit_store.clone())
        };
        let mut errors = TeardownErrors::new();

        if let SeenResource::Created(params) = &on_ramp {
            let res = with_cancel_in_flight(ctx, "CloseOnRampReader", async {
                factory
                    .close_on_ramp_reader(params)
                    .await
                    .map_err(|e| ProviderError::collaborator("close on-ramp reader", &params.address, e))
            })
            .await;
            record(&mut errors, TeardownKind::OnRampReader, res);
        }

        if let SeenResource::Created(address) = &commit_store {
            let res = with_cancel_in_flight(ctx, "CloseCommitStoreReader", async {
                factory
                    .close_commit_store_reader(address)
                    .await
                    .map_err(|e| ProviderError::collaborator("close commit store reader", address, e))
            })
            .await;
            record(&mut errors, TeardownKind::CommitStoreReader, res);
        }

        for step in extra {
            let kind = step.kind();
            let res = match &step {
                TeardownStep::OffRampReader(address) => {
                    with_cancel_in_flight(ctx, "CloseOffRampReader", async {
                        factory.close_off_ramp_reader(address).await.map_err(|e| {
                            ProviderError::collaborator("close off-ramp reader", address, e)
                        })
                    })
                    .await
                }
                TeardownStep::UsdcMessageSubscription(messages) => {
                    with_cancel_in_flight(ctx, "CloseUSDCReader", async {
                        messages.unregister().await.map_err(|e| {
                            ProviderError::collaborator("unregister filter", messages.name(), e)
                        })
                    })
                    .await
                }
            };
            record(&mut errors, kind, res);
        }

        errors
    }
}

fn record(errors: &mut TeardownErrors, kind: TeardownKind, res: Result<(), ProviderError>) {
    match res {
        Ok(()) => debug!(step = %kind, "Teardown step succeeded"),
        Err(e) => {
            warn!(step = %kind, error = %e, "Teardown step failed");
            errors.push(kind, e);
        }
    }
}
