//! Single-flight credential refresh coordination
//!
//! [`RefreshCoordinator`] guarantees that at most one refresh is in flight
//! per gateway.  Every caller that hits an authorization failure calls
//! [`RefreshCoordinator::recover`]:
//!
//! - While `Idle`, the caller switches the state to `Refreshing` and spawns
//!   the refresh cycle.  The switch happens inside the same critical section
//!   that observed `Idle`, before any `.await`, so two callers can never
//!   both start a refresh.
//! - While `Refreshing`, the caller joins the waiter queue.
//!
//! The cycle drains the queue exactly once, in FIFO order, delivering the
//! same outcome to every waiter.  On failure the session is torn down after
//! the queue is drained.
//!
//! The cycle runs in its own task, so it completes and resets the state
//! even if the caller that started it is dropped.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::oneshot;

use crate::credentials::{ActiveCredential, CredentialStore};
use crate::error::{GatewayError, Result};
use crate::gateway::teardown::SessionTeardown;
use crate::refresh::{ProviderFallbackResolver, RefreshError};

/// Result delivered to every waiter of a refresh cycle.
pub type RefreshOutcome = std::result::Result<ActiveCredential, Arc<RefreshError>>;

type Waiter = oneshot::Sender<RefreshOutcome>;

/// Coordinator state.  The waiter queue exists only while refreshing, so the
/// in-flight flag and the queue always change together.
#[derive(Debug)]
enum CoordinatorState {
    Idle,
    Refreshing { cycle: u64, waiters: Vec<Waiter> },
}

#[derive(Debug)]
struct CoordinatorInner {
    state: Mutex<CoordinatorState>,
    cycles: AtomicU64,
    resolver: ProviderFallbackResolver,
    store: CredentialStore,
    teardown: SessionTeardown,
}

impl CoordinatorInner {
    fn lock(&self) -> MutexGuard<'_, CoordinatorState> {
        // State transitions never panic mid-update, so a poisoned lock still
        // holds a consistent state.
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Swaps in `Idle` and returns the waiters of `cycle`, if it is current.
    fn take_waiters(&self, cycle: u64) -> Vec<Waiter> {
        let mut state = self.lock();
        match &*state {
            CoordinatorState::Refreshing { cycle: current, .. } if *current == cycle => {}
            _ => return Vec::new(),
        }
        match std::mem::replace(&mut *state, CoordinatorState::Idle) {
            CoordinatorState::Refreshing { waiters, .. } => waiters,
            CoordinatorState::Idle => Vec::new(),
        }
    }

    async fn run_cycle(self: Arc<Self>, cycle: u64) {
        let guard = CycleGuard {
            inner: &self,
            cycle,
        };

        tracing::info!(cycle, "Starting credential refresh");
        let outcome: RefreshOutcome = self.resolver.resolve(&self.store).await.map_err(Arc::new);

        let waiters = self.take_waiters(cycle);
        std::mem::forget(guard);

        tracing::debug!(cycle, waiters = waiters.len(), "Draining refresh waiters");
        for waiter in waiters {
            // A dropped receiver means that caller went away; nothing to do.
            let _ = waiter.send(outcome.clone());
        }

        match outcome {
            Ok(credential) => {
                tracing::info!(cycle, credential = credential.kind(), "Credential refresh succeeded");
            }
            Err(error) => {
                tracing::warn!(cycle, "Credential refresh failed: {}", error);
                self.teardown.run(cycle, &error.to_string());
            }
        }
    }
}

/// Resets the coordinator if a refresh cycle unwinds before draining.
///
/// Dropping the waiters wakes each caller with
/// [`GatewayError::RefreshAborted`].
struct CycleGuard<'a> {
    inner: &'a CoordinatorInner,
    cycle: u64,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        let waiters = self.inner.take_waiters(self.cycle);
        if !waiters.is_empty() {
            tracing::warn!(
                cycle = self.cycle,
                waiters = waiters.len(),
                "Refresh cycle aborted"
            );
        }
    }
}

/// Single-flight coordinator owned by one gateway.
///
/// Cloning shares the same state; separate `RefreshCoordinator::new` calls
/// never do.
#[derive(Debug, Clone)]
pub struct RefreshCoordinator {
    inner: Arc<CoordinatorInner>,
}

impl RefreshCoordinator {
    /// Creates an idle coordinator.
    pub fn new(
        resolver: ProviderFallbackResolver,
        store: CredentialStore,
        teardown: SessionTeardown,
    ) -> Self {
        Self {
            inner: Arc::new(CoordinatorInner {
                state: Mutex::new(CoordinatorState::Idle),
                cycles: AtomicU64::new(0),
                resolver,
                store,
                teardown,
            }),
        }
    }

    /// Waits for a fresh credential, starting a refresh if none is running.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::RefreshFailed`] carrying the cycle's shared
    /// error when every strategy fails (the session has been torn down by
    /// then), or [`GatewayError::RefreshAborted`] if the cycle ended without
    /// an outcome.
    pub async fn recover(&self) -> Result<ActiveCredential> {
        let (tx, rx) = oneshot::channel();

        let started = {
            let mut state = self.inner.lock();
            match &mut *state {
                CoordinatorState::Refreshing { cycle, waiters } => {
                    waiters.push(tx);
                    tracing::debug!(
                        cycle = *cycle,
                        position = waiters.len(),
                        "Refresh in flight, queued"
                    );
                    None
                }
                CoordinatorState::Idle => {
                    let cycle = self.inner.cycles.fetch_add(1, Ordering::SeqCst) + 1;
                    *state = CoordinatorState::Refreshing {
                        cycle,
                        waiters: vec![tx],
                    };
                    Some(cycle)
                }
            }
        };

        if let Some(cycle) = started {
            tokio::spawn(Arc::clone(&self.inner).run_cycle(cycle));
        }

        match rx.await {
            Ok(Ok(credential)) => Ok(credential),
            Ok(Err(error)) => Err(GatewayError::RefreshFailed(error).into()),
            Err(_) => Err(GatewayError::RefreshAborted.into()),
        }
    }

    /// Returns `true` while a refresh cycle is in flight.
    pub fn is_refreshing(&self) -> bool {
        matches!(*self.inner.lock(), CoordinatorState::Refreshing { .. })
    }

    /// Number of callers waiting on the in-flight refresh.
    pub fn pending_waiters(&self) -> usize {
        match &*self.inner.lock() {
            CoordinatorState::Refreshing { waiters, .. } => waiters.len(),
            CoordinatorState::Idle => 0,
        }
    }

    /// Number of refresh cycles started so far.
    pub fn cycles_started(&self) -> u64 {
        self.inner.cycles.load(Ordering::SeqCst)
    }

    /// Number of session teardowns performed so far.
    pub fn teardowns(&self) -> usize {
        self.inner.teardown.runs()
    }
}
