//! Key-value backends for credential persistence
//!
//! Three backends are provided:
//!
//! - [`KeyringBackend`] -- OS native credential store (Keychain, Secret
//!   Service, Windows Credential Manager) via the `keyring` crate.
//! - [`FileBackend`] -- a single JSON object file, rewritten on every
//!   mutation.  Survives process restarts without a system keyring.
//! - [`MemoryBackend`] -- process-local map used by tests and ephemeral runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use directories::ProjectDirs;

use crate::error::{GatewayError, Result};

/// Raw string key-value persistence used by
/// [`CredentialStore`](super::CredentialStore).
///
/// Implementations must treat `remove` of an absent key as a no-op.
pub trait CredentialBackend: Send + Sync + std::fmt::Debug {
    /// Returns the stored value, or `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Stores `value` under `key`, replacing any previous value.
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Deletes `key`.
    fn remove(&self, key: &str) -> Result<()>;
}

// ---------------------------------------------------------------------------
// KeyringBackend
// ---------------------------------------------------------------------------

/// Stateless accessor for the OS native keyring.
///
/// Each key is stored as its own entry under the service name
/// `"{namespace}-{key}"`, with the namespace as the account.
#[derive(Debug, Clone)]
pub struct KeyringBackend {
    namespace: String,
}

impl KeyringBackend {
    /// Creates a keyring backend whose entries are prefixed with `namespace`.
    pub fn new(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
        }
    }

    fn service_name(&self, key: &str) -> String {
        format!("{}-{}", self.namespace, key)
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry> {
        let service = self.service_name(key);
        keyring::Entry::new(&service, &self.namespace).map_err(|e| GatewayError::Keyring(e).into())
    }
}

impl CredentialBackend for KeyringBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(GatewayError::Keyring(e).into()),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entry(key)?
            .set_password(value)
            .map_err(GatewayError::Keyring)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(GatewayError::Keyring(e).into()),
        }
    }
}

// ---------------------------------------------------------------------------
// FileBackend
// ---------------------------------------------------------------------------

/// JSON file backend.
///
/// The whole map is cached in memory and written back after every `set` or
/// `remove`.  On Unix the file is created with mode `0600`.
#[derive(Debug)]
pub struct FileBackend {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileBackend {
    /// Opens (or lazily creates) the credential file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Storage`] if an existing file cannot be read
    /// or does not contain a JSON object of strings.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let entries = if path.exists() {
            let contents = std::fs::read_to_string(&path).map_err(|e| {
                GatewayError::Storage(format!(
                    "failed to read credential file {}: {e}",
                    path.display()
                ))
            })?;
            if contents.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&contents).map_err(|e| {
                    GatewayError::Storage(format!(
                        "credential file {} is corrupt: {e}",
                        path.display()
                    ))
                })?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Returns the platform data-directory location for the credential file.
    pub fn default_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("com", "hirelink", "hirelink")
            .ok_or_else(|| GatewayError::Storage("Could not determine data directory".into()))?;
        Ok(proj_dirs.data_dir().join("credentials.json"))
    }

    /// Path of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GatewayError::Storage(format!("failed to create {}: {e}", parent.display()))
            })?;
        }

        let json = serde_json::to_string_pretty(entries)?;
        write_private(&self.path, json.as_bytes()).map_err(|e| {
            GatewayError::Storage(format!("failed to write {}: {e}", self.path.display()))
        })?;
        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| GatewayError::Storage("credential file lock poisoned".into()).into())
    }
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::OpenOptionsExt;

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    file.write_all(contents)
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

impl CredentialBackend for FileBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.lock()?;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries)
    }

    fn remove(&self, key: &str) -> Result<()> {
        let mut entries = self.lock()?;
        if entries.remove(key).is_some() {
            self.persist(&entries)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryBackend
// ---------------------------------------------------------------------------

/// In-process backend; contents are lost when the process exits.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    /// Creates an empty in-memory backend.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>> {
        self.entries
            .lock()
            .map_err(|_| GatewayError::Storage("memory store lock poisoned".into()).into())
    }
}

impl CredentialBackend for MemoryBackend {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}
