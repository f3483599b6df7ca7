//! The single credential slot. Nothing else in the crate reads or writes persisted
//! credential state; callers go through [`TokenStore`] so there is never a second
//! copy of the token to drift out of sync.

use super::{credential::Credential, credential::AUTH_TOKEN_KEY, error::StoreError};
use serde_json::{Map, Value};
use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
    sync::{Mutex, PoisonError},
};
use tracing::{debug, instrument, warn};

/// Durable storage for the bearer credential.
///
/// `set` overwrites any prior value; `clear` succeeds when nothing is stored.
pub trait TokenStore: Send + Sync {
    fn get(&self) -> Option<Credential>;
    fn set(&self, credential: &Credential) -> Result<(), StoreError>;
    fn clear(&self) -> Result<(), StoreError>;
}

/// Cookie-variant surface: the browser owns the session, so there is nothing to keep.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTokenStore;

impl TokenStore for NoopTokenStore {
    fn get(&self) -> Option<Credential> {
        None
    }

    fn set(&self, _credential: &Credential) -> Result<(), StoreError> {
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Process-local slot.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<Credential>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
        }
    }
}

impl TokenStore for MemoryTokenStore {
    fn get(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        let mut slot = self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *slot = None;
        Ok(())
    }
}

/// JSON document on disk holding `{"auth_token": "<jwt>"}`.
///
/// Other keys in the document are preserved. Writes go through a sibling temp
/// file and a rename so a crash never leaves a half-written token behind.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_document(&self) -> Result<Map<String, Value>, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(contents) if contents.trim().is_empty() => Ok(Map::new()),
            Ok(contents) => match serde_json::from_str::<Value>(&contents)? {
                Value::Object(map) => Ok(map),
                _ => Ok(Map::new()),
            },
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(Map::new()),
            Err(err) => Err(err.into()),
        }
    }

    fn write_document(&self, document: &Map<String, Value>) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = self.path.with_extension("tmp");
        {
            let mut file = open_private(&tmp)?;
            file.write_all(serde_json::to_string_pretty(document)?.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn get(&self) -> Option<Credential> {
        match self.read_document() {
            Ok(document) => document
                .get(AUTH_TOKEN_KEY)
                .and_then(Value::as_str)
                .filter(|token| !token.is_empty())
                .map(Credential::new),
            Err(err) => {
                warn!(path = %self.path.display(), "Ignoring unreadable token store: {err}");
                None
            }
        }
    }

    #[instrument(skip(self, credential), fields(path = %self.path.display()))]
    fn set(&self, credential: &Credential) -> Result<(), StoreError> {
        let mut document = self.read_document().unwrap_or_default();
        document.insert(
            AUTH_TOKEN_KEY.to_string(),
            Value::String(credential.expose().to_string()),
        );
        self.write_document(&document)?;
        debug!("Credential persisted");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %self.path.display()))]
    fn clear(&self) -> Result<(), StoreError> {
        let mut document = match self.read_document() {
            Ok(document) => document,
            // A corrupt document cannot hold a usable token; start over.
            Err(StoreError::Json(_)) => Map::new(),
            Err(err) => return Err(err),
        };

        if document.remove(AUTH_TOKEN_KEY).is_none() && !self.path.exists() {
            return Ok(());
        }

        if document.is_empty() {
            match fs::remove_file(&self.path) {
                Ok(()) => {}
                Err(err) if err.kind() == ErrorKind::NotFound => {}
                Err(err) => return Err(err.into()),
            }
        } else {
            self.write_document(&document)?;
        }
        debug!("Credential cleared");
        Ok(())
    }
}

#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    use std::os::unix::fs::OpenOptionsExt;

    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<fs::File> {
    fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn memory_set_overwrites() {
        let store = MemoryTokenStore::new();
        assert!(store.get().is_none());
        store.set(&Credential::new("a.b.c")).unwrap();
        store.set(&Credential::new("d.e.f")).unwrap();
        assert_eq!(store.get(), Some(Credential::new("d.e.f")));
    }

    #[test]
    fn memory_clear_is_idempotent() {
        let store = MemoryTokenStore::with_credential(Credential::new("a.b.c"));
        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[test]
    fn noop_never_holds_anything() {
        let store = NoopTokenStore;
        store.set(&Credential::new("a.b.c")).unwrap();
        assert!(store.get().is_none());
        store.clear().unwrap();
    }

    #[test]
    fn file_round_trip_and_clear_twice() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("state").join("token.json"));

        assert!(store.get().is_none());
        store.clear().unwrap();

        store.set(&Credential::new("abc.def.ghi")).unwrap();
        assert_eq!(store.get(), Some(Credential::new("abc.def.ghi")));

        // Survives a fresh handle, like a page reload.
        let reopened = FileTokenStore::new(store.path());
        assert_eq!(reopened.get(), Some(Credential::new("abc.def.ghi")));

        store.clear().unwrap();
        store.clear().unwrap();
        assert!(store.get().is_none());
        assert!(!store.path().exists());
    }

    #[test]
    fn file_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let store = FileTokenStore::new(&path);
        store.set(&Credential::new("abc.def.ghi")).unwrap();
        store.clear().unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let document: Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(document, serde_json::json!({"theme": "dark"}));
    }

    #[test]
    fn file_corrupt_reads_as_absent_and_clears() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.json");
        fs::write(&path, "not json").unwrap();

        let store = FileTokenStore::new(&path);
        assert!(store.get().is_none());
        store.clear().unwrap();
        assert!(store.get().is_none());
    }

    #[cfg(unix)]
    #[test]
    fn file_is_private() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("token.json"));
        store.set(&Credential::new("abc.def.ghi")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
