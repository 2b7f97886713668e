//! Provider fallback for credential refresh
//!
//! A refresh is modelled as an ordered list of [`RefreshStrategy`] values.
//! [`ProviderFallbackResolver`] tries them in sequence and the first
//! strategy that produces a credential wins:
//!
//! 1. [`primary::PrimaryRefresh`] -- exchanges the stored refresh token at
//!    the application's own refresh endpoint.
//! 2. [`secondary::SecondaryRefresh`] -- renews the secondary identity
//!    provider session through the provider's native refresh call.
//!
//! Adding a provider means appending a strategy.

pub mod primary;
pub mod secondary;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::credentials::{ActiveCredential, CredentialStore};

pub use primary::PrimaryRefresh;
pub use secondary::{OAuthSessionProvider, SecondaryIdentityProvider, SecondaryRefresh};

/// Outcome of a single strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// A new credential was obtained and persisted.
    Refreshed(ActiveCredential),
    /// The strategy had no material to work with (no token, no session).
    /// No request was made.
    Unavailable(String),
    /// The strategy made a request and it failed.
    Failed(String),
}

/// One line of the attempt log carried by [`RefreshError::Exhausted`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyAttempt {
    /// Strategy name.
    pub strategy: String,
    /// Why it did not produce a credential.
    pub outcome: StrategyOutcome,
}

impl std::fmt::Display for StrategyAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.outcome {
            StrategyOutcome::Refreshed(credential) => {
                write!(f, "{}: refreshed ({})", self.strategy, credential.kind())
            }
            StrategyOutcome::Unavailable(reason) => {
                write!(f, "{}: unavailable ({})", self.strategy, reason)
            }
            StrategyOutcome::Failed(reason) => write!(f, "{}: failed ({})", self.strategy, reason),
        }
    }
}

/// Terminal failure of a refresh cycle.
#[derive(Error, Debug)]
pub enum RefreshError {
    /// Every strategy was unavailable or failed.
    #[error("all refresh strategies exhausted: {}", format_attempts(.attempts))]
    Exhausted {
        /// Per-strategy results, in the order they were tried.
        attempts: Vec<StrategyAttempt>,
    },

    /// The configured refresh bound elapsed before any strategy succeeded.
    #[error("refresh did not complete within {seconds}s")]
    TimedOut {
        /// Configured bound.
        seconds: u64,
    },
}

fn format_attempts(attempts: &[StrategyAttempt]) -> String {
    if attempts.is_empty() {
        return "no strategies configured".to_string();
    }
    attempts
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// A single way of obtaining a fresh credential.
#[async_trait::async_trait]
pub trait RefreshStrategy: Send + Sync + std::fmt::Debug {
    /// Short name used in logs and in [`StrategyAttempt`].
    fn name(&self) -> &str;

    /// Attempts a refresh.
    ///
    /// On success the strategy has already persisted the new credential in
    /// `store`.
    async fn refresh(&self, store: &CredentialStore) -> StrategyOutcome;
}

/// Ordered list of refresh strategies; the first success wins.
#[derive(Debug, Clone, Default)]
pub struct ProviderFallbackResolver {
    strategies: Vec<Arc<dyn RefreshStrategy>>,
    timeout: Option<Duration>,
}

impl ProviderFallbackResolver {
    /// Creates a resolver over `strategies`, tried in order.
    pub fn new(strategies: Vec<Arc<dyn RefreshStrategy>>) -> Self {
        Self {
            strategies,
            timeout: None,
        }
    }

    /// Appends a strategy after the existing ones.
    pub fn with_strategy(mut self, strategy: Arc<dyn RefreshStrategy>) -> Self {
        self.strategies.push(strategy);
        self
    }

    /// Bounds the whole resolution; `None` leaves it unbounded.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Names of the configured strategies, in order.
    pub fn strategy_names(&self) -> Vec<&str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Runs the strategies in order until one produces a credential.
    ///
    /// # Errors
    ///
    /// Returns [`RefreshError::Exhausted`] when no strategy succeeds, or
    /// [`RefreshError::TimedOut`] when the configured bound elapses first.
    pub async fn resolve(
        &self,
        store: &CredentialStore,
    ) -> std::result::Result<ActiveCredential, RefreshError> {
        match self.timeout {
            None => self.try_strategies(store).await,
            Some(bound) => match tokio::time::timeout(bound, self.try_strategies(store)).await {
                Ok(result) => result,
                Err(_) => {
                    tracing::warn!("Credential refresh exceeded {:?}", bound);
                    Err(RefreshError::TimedOut {
                        seconds: bound.as_secs(),
                    })
                }
            },
        }
    }

    async fn try_strategies(
        &self,
        store: &CredentialStore,
    ) -> std::result::Result<ActiveCredential, RefreshError> {
        let mut attempts = Vec::with_capacity(self.strategies.len());

        for strategy in &self.strategies {
            let outcome = strategy.refresh(store).await;
            match outcome {
                StrategyOutcome::Refreshed(credential) => {
                    tracing::info!(
                        strategy = strategy.name(),
                        credential = credential.kind(),
                        "Credential refreshed"
                    );
                    return Ok(credential);
                }
                StrategyOutcome::Unavailable(ref reason) => {
                    tracing::debug!(strategy = strategy.name(), "Strategy skipped: {}", reason);
                }
                StrategyOutcome::Failed(ref reason) => {
                    tracing::warn!(strategy = strategy.name(), "Strategy failed: {}", reason);
                }
            }
            attempts.push(StrategyAttempt {
                strategy: strategy.name().to_string(),
                outcome,
            });
        }

        Err(RefreshError::Exhausted { attempts })
    }
}
