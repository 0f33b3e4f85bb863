//! Durable storage for the three session entries.
//!
//! Entries are kept as independent strings (`access_token`, `user_type`,
//! `user`). A load only succeeds when all three are present; any subset is
//! treated as no session at all, and a save that fails partway clears the
//! store rather than leave entries from two different sessions behind.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

pub const TOKEN_KEY: &str = "access_token";
pub const ROLE_KEY: &str = "user_type";
pub const USER_KEY: &str = "user";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("credential file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not encode credential entry: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Minimal string key/value contract the credential store writes through.
pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError>;
    fn remove(&mut self, key: &str) -> Result<(), StoreError>;

    /// Write several entries. Backends that can persist them together should.
    fn set_all(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: BTreeMap<String, String>,
}

#[cfg(test)]
impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[cfg(test)]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Memory store that refuses to write one key.
#[cfg(test)]
pub struct FailingStore {
    inner: MemoryStore,
    failing_key: &'static str,
}

#[cfg(test)]
impl FailingStore {
    pub fn wrap(inner: MemoryStore, failing_key: &'static str) -> Self {
        Self { inner, failing_key }
    }
}

#[cfg(test)]
impl KeyValueStore for FailingStore {
    fn get(&self, key: &str) -> Option<String> {
        self.inner.get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        if key == self.failing_key {
            return Err(StoreError::Io {
                path: PathBuf::from("credentials.json"),
                source: io::Error::new(io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.inner.set(key, value)
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        self.inner.remove(key)
    }
}

/// JSON object on disk, rewritten on every mutation.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: BTreeMap<String, String>,
}

impl FileStore {
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match fs::read_to_string(&path) {
            Ok(raw) => match serde_json::from_str::<BTreeMap<String, String>>(&raw) {
                Ok(map) => map,
                Err(err) => {
                    warn!(path = %path.display(), "ignoring unreadable credential file: {err}");
                    BTreeMap::new()
                }
            },
            Err(err) if err.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(err) => {
                warn!(path = %path.display(), "could not read credential file: {err}");
                BTreeMap::new()
            }
        };
        Self { path, entries }
    }

    fn flush(&self) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let json = serde_json::to_string_pretty(&self.entries)?;
        fs::write(&self.path, json).map_err(io_err)?;
        restrict_permissions(&self.path);
        Ok(())
    }
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) {
    use std::os::unix::fs::PermissionsExt;
    if let Err(err) = fs::set_permissions(path, fs::Permissions::from_mode(0o600)) {
        debug!(path = %path.display(), "could not restrict credential file mode: {err}");
    }
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) {}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), StoreError> {
        self.entries.insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&mut self, key: &str) -> Result<(), StoreError> {
        if self.entries.remove(key).is_some() {
            self.flush()?;
        }
        Ok(())
    }

    fn set_all(&mut self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.entries.insert(key.to_string(), value.to_string());
        }
        self.flush()
    }
}

/// Raw entries as read back from storage. The user record is still a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredCredentials {
    pub token: String,
    pub role: String,
    pub user_raw: String,
}

pub struct CredentialStore {
    backend: Box<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(backend: impl KeyValueStore + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    #[cfg(test)]
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    /// Store all three entries, or none of them.
    pub fn save<U: Serialize>(&mut self, token: &str, role: &str, user: &U) -> Result<(), StoreError> {
        let user_raw = serde_json::to_string(user)?;
        let written = self.backend.set_all(&[
            (TOKEN_KEY, token),
            (ROLE_KEY, role),
            (USER_KEY, user_raw.as_str()),
        ]);
        if let Err(err) = written {
            self.clear();
            return Err(err);
        }
        Ok(())
    }

    pub fn load(&self) -> Option<StoredCredentials> {
        let token = self.backend.get(TOKEN_KEY)?;
        let role = self.backend.get(ROLE_KEY)?;
        let user_raw = self.backend.get(USER_KEY)?;
        Some(StoredCredentials {
            token,
            role,
            user_raw,
        })
    }

    /// Remove every entry. Failures are logged; clearing never fails.
    pub fn clear(&mut self) {
        for key in [TOKEN_KEY, ROLE_KEY, USER_KEY] {
            if let Err(err) = self.backend.remove(key) {
                warn!(key, "failed to remove credential entry: {err}");
            }
        }
    }

    #[cfg(test)]
    pub fn backend_mut(&mut self) -> &mut dyn KeyValueStore {
        self.backend.as_mut()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn save_then_load_returns_serialized_record() {
        let mut store = CredentialStore::in_memory();
        let user = json!({"name": "Ana", "grade_level": "9th"});
        store.save("abc", "student", &user).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.token, "abc");
        assert_eq!(loaded.role, "student");
        assert_eq!(loaded.user_raw, serde_json::to_string(&user).unwrap());
        let back: serde_json::Value = serde_json::from_str(&loaded.user_raw).unwrap();
        assert_eq!(back, user);
    }

    #[test]
    fn partial_entries_count_as_empty() {
        let mut store = CredentialStore::in_memory();
        store.backend_mut().set(TOKEN_KEY, "abc").unwrap();
        store.backend_mut().set(ROLE_KEY, "student").unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn failed_save_leaves_no_mixed_session() {
        let mut previous = MemoryStore::new();
        previous
            .set_all(&[
                (TOKEN_KEY, "old"),
                (ROLE_KEY, "teacher"),
                (USER_KEY, r#"{"name":"Mr. Obi"}"#),
            ])
            .unwrap();
        let mut store = CredentialStore::new(FailingStore::wrap(previous, ROLE_KEY));

        let err = store.save("new", "student", &json!({"name": "Ana"})).unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(store.load().is_none());
        assert!(store.backend_mut().get(TOKEN_KEY).is_none());
    }

    #[test]
    fn clear_twice_is_harmless() {
        let mut store = CredentialStore::in_memory();
        store.save("abc", "teacher", &json!({})).unwrap();
        store.clear();
        assert!(store.load().is_none());
        store.clear();
        assert!(store.load().is_none());
    }

    #[test]
    fn file_store_survives_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config").join("credentials.json");

        let mut store = CredentialStore::new(FileStore::open(&path));
        store.save("xyz", "teacher", &json!({"name": "Mr. Obi"})).unwrap();

        let reopened = CredentialStore::new(FileStore::open(&path));
        let loaded = reopened.load().unwrap();
        assert_eq!(loaded.token, "xyz");
        assert_eq!(loaded.role, "teacher");
    }

    #[test]
    fn corrupt_file_is_treated_as_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        fs::write(&path, "{ not json").unwrap();

        let store = CredentialStore::new(FileStore::open(&path));
        assert!(store.load().is_none());
    }

    #[test]
    fn clearing_a_file_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credentials.json");
        let mut store = CredentialStore::new(FileStore::open(&path));
        store.save("xyz", "student", &json!({"name": "Ana"})).unwrap();
        store.clear();

        let reopened = CredentialStore::new(FileStore::open(&path));
        assert!(reopened.load().is_none());
    }
}
