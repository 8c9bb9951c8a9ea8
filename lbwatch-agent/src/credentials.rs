//! Credential handling with durable storage
//!
//! Handles:
//! - Validation of the API token and account identifier
//! - A file-backed key/value store with per-entry expiry
//! - The OS keyring (Keychain / Credential Manager / kernel keyring)
//! - An in-memory store for tests and dry runs

use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use keyring::Entry;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::config::{StorageBackend, StorageConfig};

/// Shortest account identifier the entry form accepts
pub const MIN_ACCOUNT_ID_LEN: usize = 10;

const TOKEN_KEY: &str = "api-token";
const ACCOUNT_ID_KEY: &str = "account-id";
const KEYRING_SERVICE: &str = "lbwatch";

/// How long a file-stored entry stays valid after it was written
const ENTRY_TTL_DAYS: i64 = 365;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("API token is required")]
    EmptyToken,
    #[error("Account ID is required")]
    EmptyAccountId,
    #[error("Account ID must be at least {min} characters (got {actual})")]
    AccountIdTooShort { min: usize, actual: usize },
}

/// Bearer token plus the account the pools belong to
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    token: String,
    account_id: String,
}

impl Credentials {
    /// Validate and build credentials. Surrounding whitespace is trimmed.
    pub fn new(token: impl AsRef<str>, account_id: impl AsRef<str>) -> Result<Self, ValidationError> {
        let token = token.as_ref().trim();
        let account_id = account_id.as_ref().trim();

        if token.is_empty() {
            return Err(ValidationError::EmptyToken);
        }
        if account_id.is_empty() {
            return Err(ValidationError::EmptyAccountId);
        }
        let actual = account_id.chars().count();
        if actual < MIN_ACCOUNT_ID_LEN {
            return Err(ValidationError::AccountIdTooShort {
                min: MIN_ACCOUNT_ID_LEN,
                actual,
            });
        }

        Ok(Self {
            token: token.to_string(),
            account_id: account_id.to_string(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn account_id(&self) -> &str {
        &self.account_id
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("account_id", &self.account_id)
            .finish()
    }
}

/// Durable key/value storage for the two credential entries
pub trait CredentialStore: Send + Sync {
    /// Stored credentials, or `None` when either entry is missing, expired or invalid
    fn get(&self) -> Result<Option<Credentials>>;

    fn set(&self, credentials: &Credentials) -> Result<()>;

    /// Remove both entries. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

/// Rebuild credentials from raw entries, treating invalid data as absent
fn from_entries(token: Option<String>, account_id: Option<String>) -> Option<Credentials> {
    let (token, account_id) = (token?, account_id?);
    match Credentials::new(&token, &account_id) {
        Ok(credentials) => Some(credentials),
        Err(e) => {
            warn!("Ignoring stored credentials: {}", e);
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    #[serde(default)]
    entries: BTreeMap<String, StoredEntry>,
}

/// TOML file under the config directory, one entry per key with an expiry
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store in the OS-specific config location
    pub fn default_location() -> Result<Self> {
        let mut path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        path.push("lbwatch");
        path.push("credentials.toml");
        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<StoreFile> {
        if !self.path.exists() {
            return Ok(StoreFile::default());
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))
    }

    fn write(&self, file: &StoreFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(file)?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("Failed to write {}", self.path.display()))?;

        // Token is a secret: owner read/write only
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&self.path, perms)?;
        }

        Ok(())
    }

    fn live_value(file: &StoreFile, key: &str, now: DateTime<Utc>) -> Option<String> {
        let entry = file.entries.get(key)?;
        if entry.expires_at <= now {
            debug!("Stored entry {} expired at {}", key, entry.expires_at);
            return None;
        }
        Some(entry.value.clone())
    }
}

impl CredentialStore for FileStore {
    fn get(&self) -> Result<Option<Credentials>> {
        let file = self.read()?;
        let now = Utc::now();
        Ok(from_entries(
            Self::live_value(&file, TOKEN_KEY, now),
            Self::live_value(&file, ACCOUNT_ID_KEY, now),
        ))
    }

    fn set(&self, credentials: &Credentials) -> Result<()> {
        let mut file = self.read()?;
        let expires_at = Utc::now() + ChronoDuration::days(ENTRY_TTL_DAYS);

        for (key, value) in [
            (TOKEN_KEY, credentials.token()),
            (ACCOUNT_ID_KEY, credentials.account_id()),
        ] {
            file.entries.insert(
                key.to_string(),
                StoredEntry {
                    value: value.to_string(),
                    expires_at,
                },
            );
        }

        self.write(&file)?;
        info!("Credentials saved to {}", self.path.display());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut file = self.read()?;
        file.entries.remove(TOKEN_KEY);
        file.entries.remove(ACCOUNT_ID_KEY);

        if file.entries.is_empty() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        } else {
            self.write(&file)?;
        }
        info!("Credentials cleared");
        Ok(())
    }
}

/// Secure OS keyring, one entry per key under the `lbwatch` service
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            service: KEYRING_SERVICE.to_string(),
        }
    }

    fn entry(&self, key: &str) -> Result<Entry> {
        Entry::new(&self.service, key).context("Failed to open keyring entry")
    }

    fn load(&self, key: &str) -> Result<Option<String>> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {} from keyring", key)),
        }
    }

    fn delete(&self, key: &str) -> Result<()> {
        match self.entry(key)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {} from keyring", key)),
        }
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self) -> Result<Option<Credentials>> {
        Ok(from_entries(self.load(TOKEN_KEY)?, self.load(ACCOUNT_ID_KEY)?))
    }

    fn set(&self, credentials: &Credentials) -> Result<()> {
        self.entry(TOKEN_KEY)?
            .set_password(credentials.token())
            .context("Failed to save token to keyring")?;
        self.entry(ACCOUNT_ID_KEY)?
            .set_password(credentials.account_id())
            .context("Failed to save account ID to keyring")?;
        info!("Credentials saved to OS keyring");
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.delete(TOKEN_KEY)?;
        self.delete(ACCOUNT_ID_KEY)?;
        info!("Credentials removed from OS keyring");
        Ok(())
    }
}

/// Open the store selected in the configuration
pub fn store_from_config(config: &StorageConfig) -> Result<Box<dyn CredentialStore>> {
    match config.backend {
        StorageBackend::File => Ok(Box::new(FileStore::default_location()?)),
        StorageBackend::Keyring => Ok(Box::new(KeyringStore::new())),
    }
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Option<Credentials>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self) -> Result<Option<Credentials>> {
        Ok(self.inner.lock().clone())
    }

    fn set(&self, credentials: &Credentials) -> Result<()> {
        *self.inner.lock() = Some(credentials.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        *self.inner.lock() = None;
        Ok(())
    }
}
