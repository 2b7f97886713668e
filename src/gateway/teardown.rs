//! Terminal session teardown
//!
//! Invoked when every refresh avenue is exhausted: clears the credential
//! store and sends the application back to its unauthenticated entry point.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use crate::credentials::CredentialStore;

/// Hook that returns the application to its unauthenticated entry point.
pub trait LoginRedirect: Send + Sync + std::fmt::Debug {
    /// Navigates to `entry_point`.  `reason` describes the refresh failure.
    fn redirect_to_login(&self, entry_point: &str, reason: &str);
}

/// Default redirect: records the navigation in the log.
#[derive(Debug, Default, Clone)]
pub struct TracingRedirect;

impl LoginRedirect for TracingRedirect {
    fn redirect_to_login(&self, entry_point: &str, reason: &str) {
        tracing::warn!(entry_point, "Session ended, sign in again: {}", reason);
    }
}

/// Clears all session state and redirects, at most once per refresh cycle.
///
/// Refresh cycles are numbered from 1 by the coordinator and only ever
/// increase, so remembering the highest torn-down cycle is enough.
#[derive(Debug)]
pub struct SessionTeardown {
    store: CredentialStore,
    redirect: Arc<dyn LoginRedirect>,
    entry_point: String,
    last_cycle: AtomicU64,
    runs: AtomicUsize,
}

impl SessionTeardown {
    /// Creates a teardown for `store` redirecting to `entry_point`.
    pub fn new(
        store: CredentialStore,
        redirect: Arc<dyn LoginRedirect>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            store,
            redirect,
            entry_point: entry_point.into(),
            last_cycle: AtomicU64::new(0),
            runs: AtomicUsize::new(0),
        }
    }

    /// Tears the session down for refresh `cycle`.
    ///
    /// Returns `false` without side effects when `cycle` was already torn
    /// down.  Storage failures are logged; the redirect always happens.
    pub fn run(&self, cycle: u64, reason: &str) -> bool {
        if self.last_cycle.fetch_max(cycle, Ordering::SeqCst) >= cycle {
            tracing::debug!(cycle, "Teardown already ran for this refresh cycle");
            return false;
        }

        tracing::info!(cycle, "Tearing down session");
        if let Err(e) = self.store.clear_all() {
            tracing::warn!("Credential store not fully cleared during teardown: {}", e);
        }
        self.runs.fetch_add(1, Ordering::SeqCst);
        self.redirect.redirect_to_login(&self.entry_point, reason);
        true
    }

    /// Number of teardowns performed so far.
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    /// Redirect target.
    pub fn entry_point(&self) -> &str {
        &self.entry_point
    }
}
