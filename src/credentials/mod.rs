//! Persisted session credentials
//!
//! # Module Layout
//!
//! - [`backend`] -- key-value persistence (keyring, JSON file, memory)
//! - [`store`]   -- typed [`CredentialStore`] over a backend
//! - [`types`]   -- credential and profile value types

pub mod backend;
pub mod store;
pub mod types;

pub use backend::{CredentialBackend, FileBackend, KeyringBackend, MemoryBackend};
pub use store::{CredentialStore, StoreKey};
pub use types::{
    ActiveCredential, CredentialPair, OrganizationProfile, SecondarySession, UserProfile,
};
