//! Credential pair persistence
//!
//! The [`TokenStore`] is the only owner of the persisted credential pair. It
//! sits on top of a [`StorageArea`], a small key/value abstraction with a
//! file-backed default, an in-memory variant, and an unavailable variant for
//! contexts without durable storage.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::error::{Result, SessionError};

/// Storage key for the identity-provider token
pub const IDENTITY_TOKEN_KEY: &str = "firebase_token";
/// Storage key for the backend session token
pub const SESSION_TOKEN_KEY: &str = "backend_token";

/// Identity-provider token plus the backend session token exchanged for it
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialPair {
    /// Token issued by the identity provider
    pub identity_token: String,
    /// Token issued by the backend
    pub session_token: String,
}

impl CredentialPair {
    /// Create a credential pair
    pub fn new(identity_token: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            identity_token: identity_token.into(),
            session_token: session_token.into(),
        }
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.session_token)
    }
}

impl std::fmt::Debug for CredentialPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialPair")
            .field("identity_token", &"<redacted>")
            .field("session_token", &"<redacted>")
            .finish()
    }
}

// ============================================================================
// Storage Areas
// ============================================================================

/// Durable key/value area the token store persists into
///
/// `set_many` and `remove_many` must apply all entries or none.
pub trait StorageArea: Send + Sync {
    /// Read one key
    ///
    /// # Errors
    /// Returns an error if the area cannot be read
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Read several keys from one snapshot of the area
    ///
    /// # Errors
    /// Returns an error if the area cannot be read
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>>;

    /// Write several keys in one transaction
    ///
    /// # Errors
    /// Returns an error if the area cannot be written; nothing is written then
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()>;

    /// Remove several keys in one transaction
    ///
    /// # Errors
    /// Returns an error if the area cannot be written
    fn remove_many(&self, keys: &[&str]) -> Result<()>;
}

/// JSON file storage, written by replace-on-rename
#[derive(Debug, Clone)]
pub struct FileStorage {
    path: PathBuf,
}

impl Default for FileStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl FileStorage {
    /// Create file storage with default path (platform-specific config directory)
    #[must_use]
    pub fn new() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("tutor-session");

        Self {
            path: config_dir.join("session.json"),
        }
    }

    /// Create file storage with custom path
    #[must_use]
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the storage path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<HashMap<String, String>> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let content = std::fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(HashMap::new());
        }
        Ok(serde_json::from_str(&content)?)
    }

    fn store(&self, entries: &HashMap<String, String>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(entries)?;
        let tmp_path = self.path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &content)?;

        // Set restrictive permissions on Unix before the file becomes visible
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            std::fs::set_permissions(&tmp_path, perms)?;
        }

        std::fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl StorageArea for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.load()?.remove(key))
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let mut map = self.load()?;
        Ok(keys.iter().map(|key| map.remove(*key)).collect())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = match self.load() {
            Ok(map) => map,
            Err(SessionError::Json(e)) => {
                tracing::warn!("Replacing unreadable session file: {e}");
                HashMap::new()
            }
            Err(e) => return Err(e),
        };
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        self.store(&map)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        if !self.path.exists() {
            return Ok(());
        }
        let mut map = self.load()?;
        let before = map.len();
        for key in keys {
            map.remove(*key);
        }
        if map.len() == before {
            return Ok(());
        }
        self.store(&map)
    }
}

/// In-process storage, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create empty in-memory storage
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl StorageArea for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(key).cloned())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>> {
        let entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for (key, value) in entries {
            map.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<()> {
        let mut map = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        for key in keys {
            map.remove(*key);
        }
        Ok(())
    }
}

/// Storage for contexts with no durable area; every call fails
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableStorage;

impl StorageArea for UnavailableStorage {
    fn get(&self, _key: &str) -> Result<Option<String>> {
        Err(SessionError::StorageUnavailable)
    }

    fn get_many(&self, _keys: &[&str]) -> Result<Vec<Option<String>>> {
        Err(SessionError::StorageUnavailable)
    }

    fn set_many(&self, _entries: &[(&str, &str)]) -> Result<()> {
        Err(SessionError::StorageUnavailable)
    }

    fn remove_many(&self, _keys: &[&str]) -> Result<()> {
        Err(SessionError::StorageUnavailable)
    }
}

// ============================================================================
// Token Store
// ============================================================================

/// Persisted credential pair accessors
///
/// Every operation absorbs storage failures: reads return `None` and writes
/// become no-ops, with a `warn` trace. The two tokens are written and
/// cleared together; a pair with only one half present reads as absent.
#[derive(Clone)]
pub struct TokenStore {
    area: Arc<dyn StorageArea>,
    write_lock: Arc<Mutex<()>>,
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}

impl Default for TokenStore {
    fn default() -> Self {
        Self::new(FileStorage::new())
    }
}

impl TokenStore {
    /// Create a token store over a storage area
    pub fn new(area: impl StorageArea + 'static) -> Self {
        Self::from_shared(Arc::new(area))
    }

    /// Create a token store over a shared storage area
    #[must_use]
    pub fn from_shared(area: Arc<dyn StorageArea>) -> Self {
        Self {
            area,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    /// Token store backed by the given file
    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(FileStorage::with_path(path))
    }

    /// Token store that keeps tokens in memory only
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(MemoryStorage::new())
    }

    /// Token store for a context without durable storage
    #[must_use]
    pub fn unavailable() -> Self {
        Self::new(UnavailableStorage)
    }

    /// Persist both tokens in one write
    pub fn set_tokens(&self, identity_token: &str, session_token: &str) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let entries = [
            (IDENTITY_TOKEN_KEY, identity_token),
            (SESSION_TOKEN_KEY, session_token),
        ];
        match self.area.set_many(&entries) {
            Ok(()) => tracing::debug!("Stored credential pair"),
            Err(SessionError::StorageUnavailable) => {
                tracing::debug!("No session storage, credential pair not persisted");
            }
            Err(e) => tracing::warn!("Could not store credential pair: {e}"),
        }
    }

    /// Persist a credential pair
    pub fn set_credentials(&self, credentials: &CredentialPair) {
        self.set_tokens(&credentials.identity_token, &credentials.session_token);
    }

    /// Stored identity-provider token
    #[must_use]
    pub fn identity_token(&self) -> Option<String> {
        self.credentials().map(|pair| pair.identity_token)
    }

    /// Stored backend session token
    #[must_use]
    pub fn session_token(&self) -> Option<String> {
        self.credentials().map(|pair| pair.session_token)
    }

    /// Stored credential pair, if both halves are present
    ///
    /// Both halves come from the same write; a concurrent `set_tokens`
    /// is seen entirely or not at all.
    #[must_use]
    pub fn credentials(&self) -> Option<CredentialPair> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let values = match self.area.get_many(&[IDENTITY_TOKEN_KEY, SESSION_TOKEN_KEY]) {
            Ok(values) => values,
            Err(SessionError::StorageUnavailable) => return None,
            Err(e) => {
                tracing::warn!("Could not read credential pair from session storage: {e}");
                return None;
            }
        };

        let mut halves = values.into_iter().map(|v| v.filter(|v| !v.is_empty()));
        let identity_token = halves.next().flatten()?;
        let session_token = halves.next().flatten()?;
        Some(CredentialPair {
            identity_token,
            session_token,
        })
    }

    /// Remove both tokens; succeeds when nothing is stored
    pub fn clear_tokens(&self) {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        match self.area.remove_many(&[IDENTITY_TOKEN_KEY, SESSION_TOKEN_KEY]) {
            Ok(()) | Err(SessionError::StorageUnavailable) => {
                tracing::debug!("Cleared credential pair");
            }
            Err(e) => tracing::warn!("Could not clear credential pair: {e}"),
        }
    }

    /// True iff both tokens are stored
    #[must_use]
    pub fn has_tokens(&self) -> bool {
        self.credentials().is_some()
    }
}
