//! Provider lifecycle and cancellation
//!
//! Both providers move through `Created → Started → Closing → Closed`. Reader
//! creation is allowed until `Close` begins; `Close` runs at most once.

use std::future::Future;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;

use crate::error::ProviderError;
use crate::types::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum LifecycleState {
    Created = 0,
    Started = 1,
    Closing = 2,
    Closed = 3,
}

impl LifecycleState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => LifecycleState::Created,
            1 => LifecycleState::Started,
            2 => LifecycleState::Closing,
            _ => LifecycleState::Closed,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Started => "started",
            LifecycleState::Closing => "closing",
            LifecycleState::Closed => "closed",
        }
    }
}

/// Lock-free lifecycle guard, cheap enough for `ready()` style polling
#[derive(Debug)]
pub struct Lifecycle {
    role: Role,
    state: AtomicU8,
}

impl Lifecycle {
    pub fn new(role: Role) -> Self {
        Self {
            role,
            state: AtomicU8::new(LifecycleState::Created as u8),
        }
    }

    pub fn state(&self) -> LifecycleState {
        LifecycleState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// `Created → Started`
    pub fn begin_start(&self) -> Result<(), ProviderError> {
        match self.transition(LifecycleState::Created, LifecycleState::Started) {
            Ok(()) => Ok(()),
            Err(LifecycleState::Closing | LifecycleState::Closed) => Err(ProviderError::Closed {
                operation: "Start",
                role: self.role,
            }),
            Err(_) => Err(ProviderError::AlreadyStarted { role: self.role }),
        }
    }

    /// `Started → Created` after a failed start, so `Start` can be retried.
    /// A concurrent `Close` keeps its state.
    pub fn abort_start(&self) {
        let _ = self.transition(LifecycleState::Started, LifecycleState::Created);
    }

    /// Rejects operations once `Close` has begun
    pub fn ensure_open(&self, operation: &'static str) -> Result<(), ProviderError> {
        match self.state() {
            LifecycleState::Created | LifecycleState::Started => Ok(()),
            LifecycleState::Closing | LifecycleState::Closed => Err(ProviderError::Closed {
                operation,
                role: self.role,
            }),
        }
    }

    /// `Created | Started → Closing`. Only one caller wins.
    pub fn begin_close(&self) -> Result<(), ProviderError> {
        let mut current = self.state.load(Ordering::Acquire);
        loop {
            match LifecycleState::from_u8(current) {
                LifecycleState::Closing | LifecycleState::Closed => {
                    return Err(ProviderError::AlreadyClosed { role: self.role })
                }
                _ => {}
            }
            match self.state.compare_exchange(
                current,
                LifecycleState::Closing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }

    pub fn finish_close(&self) {
        self.state
            .store(LifecycleState::Closed as u8, Ordering::Release);
    }

    fn transition(&self, from: LifecycleState, to: LifecycleState) -> Result<(), LifecycleState> {
        self.state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(LifecycleState::from_u8)
    }
}

/// Runs a collaborator future, failing promptly with [`ProviderError::Cancelled`]
/// if the token is (or becomes) cancelled first.
pub async fn with_cancel<F, T>(
    ctx: &CancellationToken,
    operation: &'static str,
    fut: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    tokio::select! {
        biased;
        _ = ctx.cancelled() => Err(ProviderError::Cancelled { operation }),
        res = fut => res,
    }
}

/// Teardown flavour of [`with_cancel`]: `fut` always runs. A token that is
/// already cancelled when the step begins is ignored; only a cancellation that
/// arrives while the step is in flight fails it with [`ProviderError::Cancelled`].
pub async fn with_cancel_in_flight<F, T>(
    ctx: &CancellationToken,
    operation: &'static str,
    fut: F,
) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    if ctx.is_cancelled() {
        return fut.await;
    }
    tokio::select! {
        biased;
        res = fut => res,
        _ = ctx.cancelled() => Err(ProviderError::Cancelled { operation }),
    }
}
