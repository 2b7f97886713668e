//! Typed credential store
//!
//! [`CredentialStore`] is the single owner of the persisted session state:
//! the primary access and refresh tokens, the signed-in user and
//! organization, and the secondary identity provider session.  Each key can
//! be set and cleared independently.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::credentials::backend::{CredentialBackend, MemoryBackend};
use crate::credentials::types::{
    ActiveCredential, CredentialPair, OrganizationProfile, SecondarySession, UserProfile,
};
use crate::error::Result;

/// Logical keys persisted by the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Primary access token.
    AccessToken,
    /// Primary refresh token.
    RefreshToken,
    /// Signed-in user profile (JSON).
    User,
    /// Signed-in organization profile (JSON).
    Organization,
    /// Secondary identity provider session (JSON).
    SecondarySession,
}

impl StoreKey {
    /// Every key, in the order teardown clears them.
    pub const ALL: [StoreKey; 5] = [
        StoreKey::AccessToken,
        StoreKey::RefreshToken,
        StoreKey::User,
        StoreKey::Organization,
        StoreKey::SecondarySession,
    ];

    /// Backend key string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreKey::AccessToken => "access_token",
            StoreKey::RefreshToken => "refresh_token",
            StoreKey::User => "user",
            StoreKey::Organization => "organization",
            StoreKey::SecondarySession => "secondary_session",
        }
    }
}

/// Shared, typed view over a [`CredentialBackend`].
///
/// Cloning is cheap; all clones observe the same backend.
///
/// # Examples
///
/// ```
/// use hirelink::credentials::{ActiveCredential, CredentialPair, CredentialStore};
///
/// let store = CredentialStore::in_memory();
/// store
///     .set_credentials(&CredentialPair {
///         access_token: "a1".to_string(),
///         refresh_token: "r1".to_string(),
///     })
///     .unwrap();
///
/// assert_eq!(
///     store.active_credential().unwrap(),
///     Some(ActiveCredential::Primary("a1".to_string())),
/// );
/// ```
#[derive(Debug, Clone)]
pub struct CredentialStore {
    backend: Arc<dyn CredentialBackend>,
}

impl CredentialStore {
    /// Wraps an existing backend.
    pub fn new(backend: Arc<dyn CredentialBackend>) -> Self {
        Self { backend }
    }

    /// Creates a store over a fresh [`MemoryBackend`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryBackend::new()))
    }

    // -----------------------------------------------------------------------
    // Primary credentials
    // -----------------------------------------------------------------------

    /// Current primary access token.
    pub fn access_token(&self) -> Result<Option<String>> {
        self.get_raw(StoreKey::AccessToken)
    }

    /// Replaces the primary access token.
    pub fn set_access_token(&self, token: &str) -> Result<()> {
        self.set_raw(StoreKey::AccessToken, token)
    }

    /// Current primary refresh token.
    pub fn refresh_token(&self) -> Result<Option<String>> {
        self.get_raw(StoreKey::RefreshToken)
    }

    /// Replaces the primary refresh token.
    pub fn set_refresh_token(&self, token: &str) -> Result<()> {
        self.set_raw(StoreKey::RefreshToken, token)
    }

    /// Stores both halves of a freshly issued pair.
    pub fn set_credentials(&self, pair: &CredentialPair) -> Result<()> {
        self.set_access_token(&pair.access_token)?;
        self.set_refresh_token(&pair.refresh_token)
    }

    /// Returns the pair when both halves are present.
    pub fn credentials(&self) -> Result<Option<CredentialPair>> {
        match (self.access_token()?, self.refresh_token()?) {
            (Some(access_token), Some(refresh_token)) => Ok(Some(CredentialPair {
                access_token,
                refresh_token,
            })),
            _ => Ok(None),
        }
    }

    // -----------------------------------------------------------------------
    // Profiles and secondary session
    // -----------------------------------------------------------------------

    /// Signed-in user, if any.
    pub fn user(&self) -> Result<Option<UserProfile>> {
        self.get_json(StoreKey::User)
    }

    /// Replaces the signed-in user.
    pub fn set_user(&self, user: &UserProfile) -> Result<()> {
        self.set_json(StoreKey::User, user)
    }

    /// Signed-in organization, if any.
    pub fn organization(&self) -> Result<Option<OrganizationProfile>> {
        self.get_json(StoreKey::Organization)
    }

    /// Replaces the signed-in organization.
    pub fn set_organization(&self, organization: &OrganizationProfile) -> Result<()> {
        self.set_json(StoreKey::Organization, organization)
    }

    /// Secondary identity provider session, if any.
    pub fn secondary_session(&self) -> Result<Option<SecondarySession>> {
        self.get_json(StoreKey::SecondarySession)
    }

    /// Replaces the secondary identity provider session.
    pub fn set_secondary_session(&self, session: &SecondarySession) -> Result<()> {
        self.set_json(StoreKey::SecondarySession, session)
    }

    // -----------------------------------------------------------------------
    // Derived state
    // -----------------------------------------------------------------------

    /// Chooses the credential for the next outbound call.
    ///
    /// A primary access token always wins; the secondary session is used only
    /// when the application holds no token of its own.
    pub fn active_credential(&self) -> Result<Option<ActiveCredential>> {
        if let Some(token) = self.access_token()? {
            return Ok(Some(ActiveCredential::Primary(token)));
        }
        if let Some(session) = self.secondary_session()? {
            return Ok(Some(ActiveCredential::Secondary(session.access_token)));
        }
        Ok(None)
    }

    // -----------------------------------------------------------------------
    // Removal
    // -----------------------------------------------------------------------

    /// Clears a single key.
    pub fn clear(&self, key: StoreKey) -> Result<()> {
        self.backend.remove(key.as_str())
    }

    /// Clears every key.
    ///
    /// All removals are attempted even if one fails; the first error is
    /// returned.
    pub fn clear_all(&self) -> Result<()> {
        let mut first_error = None;
        for key in StoreKey::ALL {
            if let Err(e) = self.clear(key) {
                tracing::warn!("Failed to clear {}: {}", key.as_str(), e);
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Returns `true` when no key holds a value.
    pub fn is_empty(&self) -> Result<bool> {
        for key in StoreKey::ALL {
            if self.get_raw(key)?.is_some() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    fn get_raw(&self, key: StoreKey) -> Result<Option<String>> {
        // Empty values are what some keyrings leave behind after a soft clear.
        Ok(self
            .backend
            .get(key.as_str())?
            .filter(|value| !value.is_empty()))
    }

    fn set_raw(&self, key: StoreKey, value: &str) -> Result<()> {
        self.backend.set(key.as_str(), value)
    }

    fn get_json<T: DeserializeOwned>(&self, key: StoreKey) -> Result<Option<T>> {
        match self.get_raw(key)? {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    fn set_json<T: Serialize>(&self, key: StoreKey, value: &T) -> Result<()> {
        let json = serde_json::to_string(value)?;
        self.set_raw(key, &json)
    }
}
