//! Durable storage for session credentials.
//!
//! The session manager and the API client see one interface,
//! [`CredentialStore`], with three backends: the OS keychain, a JSON file
//! under the user data directory, and an in-process map. Storage failures
//! are absorbed here - operations log at `warn` and fall back to a safe
//! default, so a broken keychain degrades the session to signed-out
//! instead of crashing the caller.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Keychain service name for [`KeyringStore`] entries
const SERVICE_NAME: &str = "paddock";

/// Credential file name inside the data directory
const CREDENTIALS_FILE: &str = "credentials.json";

/// Directory under the platform data dir holding our files
const APP_DIR: &str = "paddock";

/// The fixed set of keys the store will hold. Nothing else belongs in
/// credential storage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StoreKey {
    /// Opaque bearer token for the current session
    SessionToken,
    /// Last identifier used to sign in (non-secret, used to pre-fill prompts)
    LastIdentifier,
}

impl StoreKey {
    pub fn as_str(self) -> &'static str {
        match self {
            StoreKey::SessionToken => "session_token",
            StoreKey::LastIdentifier => "last_identifier",
        }
    }
}

/// Key/value storage that outlives the process.
///
/// Implementations never propagate backend failures: `get` answers `None`,
/// `set` and `remove` become no-ops, and the cause is logged. Callers may
/// treat the store as always available.
pub trait CredentialStore: Send + Sync {
    fn get(&self, key: StoreKey) -> Option<String>;
    fn set(&self, key: StoreKey, value: &str);
    fn remove(&self, key: StoreKey);
}

/// Masked rendering of a token for logs and status output
pub fn mask_token(token: &str) -> String {
    if token.chars().count() <= 12 {
        "***".to_string()
    } else {
        let prefix: String = token.chars().take(8).collect();
        format!("{prefix}...")
    }
}

// ============================================================================
// OS keychain backend
// ============================================================================

/// Keychain-backed store. Each key becomes one entry under the `paddock`
/// service, named after the key.
#[derive(Clone, Copy, Debug, Default)]
pub struct KeyringStore;

impl KeyringStore {
    pub fn new() -> Self {
        Self
    }

    fn entry(key: StoreKey) -> Option<Entry> {
        match Entry::new(SERVICE_NAME, key.as_str()) {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, key = key.as_str(), "could not open keychain entry");
                None
            }
        }
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        let entry = Self::entry(key)?;
        match entry.get_password() {
            Ok(value) => Some(value),
            Err(keyring::Error::NoEntry) => None,
            Err(e) => {
                warn!(error = %e, key = key.as_str(), "keychain read failed");
                None
            }
        }
    }

    fn set(&self, key: StoreKey, value: &str) {
        if let Some(entry) = Self::entry(key) {
            if let Err(e) = entry.set_password(value) {
                warn!(error = %e, key = key.as_str(), "keychain write failed");
            }
        }
    }

    fn remove(&self, key: StoreKey) {
        if let Some(entry) = Self::entry(key) {
            match entry.delete_credential() {
                Ok(()) | Err(keyring::Error::NoEntry) => {}
                Err(e) => {
                    warn!(error = %e, key = key.as_str(), "keychain delete failed");
                }
            }
        }
    }
}

// ============================================================================
// File backend
// ============================================================================

/// On-disk shape of the credential file
#[derive(Debug, Default, Serialize, Deserialize)]
struct FileContents {
    #[serde(default)]
    values: HashMap<String, String>,
    /// When the file was last written. Display only, no expiry is attached.
    saved_at: Option<DateTime<Utc>>,
}

/// File-backed store: a small JSON map in the user data directory, written
/// with owner-only permissions. The fallback for platforms without a
/// usable keychain, and the easiest backend to inspect when debugging.
pub struct FileStore {
    data_dir: PathBuf,
}

impl FileStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    /// Platform default: `<data_dir>/paddock`
    pub fn default_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join(APP_DIR))
    }

    fn file_path(&self) -> PathBuf {
        self.data_dir.join(CREDENTIALS_FILE)
    }

    /// A missing file is the normal first-run state and reads as empty;
    /// only unreadable or corrupt files are errors.
    fn read(&self) -> Result<FileContents> {
        let path = self.file_path();
        if !path.exists() {
            return Ok(FileContents::default());
        }
        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write(&self, contents: &FileContents) -> Result<()> {
        let path = self.file_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let raw = serde_json::to_string_pretty(contents)
            .context("Failed to serialize credential file")?;

        #[cfg(unix)]
        {
            use std::io::Write;
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = std::fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&path)
                .with_context(|| format!("Failed to open {}", path.display()))?;
            file.write_all(raw.as_bytes())
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        #[cfg(not(unix))]
        {
            std::fs::write(&path, raw)
                .with_context(|| format!("Failed to write {}", path.display()))?;
        }

        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        match self.read() {
            Ok(contents) => contents.values.get(key.as_str()).cloned(),
            Err(e) => {
                warn!(error = %e, key = key.as_str(), "credential file read failed");
                None
            }
        }
    }

    fn set(&self, key: StoreKey, value: &str) {
        // A corrupt file must not brick the store: start over from empty.
        let mut contents = match self.read() {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, "credential file unreadable, rewriting from scratch");
                FileContents::default()
            }
        };
        contents
            .values
            .insert(key.as_str().to_string(), value.to_string());
        contents.saved_at = Some(Utc::now());
        if let Err(e) = self.write(&contents) {
            warn!(error = %e, key = key.as_str(), "credential file write failed");
        }
    }

    fn remove(&self, key: StoreKey) {
        let mut contents = match self.read() {
            Ok(contents) => contents,
            Err(e) => {
                warn!(error = %e, key = key.as_str(), "credential file read failed");
                return;
            }
        };
        if contents.values.remove(key.as_str()).is_none() {
            return;
        }
        contents.saved_at = Some(Utc::now());
        if let Err(e) = self.write(&contents) {
            warn!(error = %e, key = key.as_str(), "credential file write failed");
        }
    }
}

// ============================================================================
// In-memory backend
// ============================================================================

/// In-process store for tests and ephemeral sessions
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<StoreKey, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_map<R>(&self, f: impl FnOnce(&mut HashMap<StoreKey, String>) -> R) -> R {
        match self.values.lock() {
            Ok(mut map) => f(&mut map),
            Err(poisoned) => f(&mut poisoned.into_inner()),
        }
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, key: StoreKey) -> Option<String> {
        self.with_map(|map| map.get(&key).cloned())
    }

    fn set(&self, key: StoreKey, value: &str) {
        self.with_map(|map| {
            map.insert(key, value.to_string());
        });
    }

    fn remove(&self, key: StoreKey) {
        self.with_map(|map| {
            map.remove(&key);
        });
    }
}
