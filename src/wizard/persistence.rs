//! Durable storage for wizard progress.
//!
//! Backends emulate browser key/value storage: one well-known key holds the
//! serialized `PersistedProgress` document. Calls are synchronous; the
//! controller logs and ignores failures.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::Mutex;

use serde_json::Value;
use tracing::warn;

use super::state::PersistedProgress;
use crate::error::PersistenceError;

/// Storage key for onboarding progress.
pub const PROGRESS_KEY: &str = "onboarding_progress";

/// Read/write access to persisted progress.
pub trait PersistenceAdapter: Send + Sync {
    /// Overwrite the stored progress.
    fn save(&self, progress: &PersistedProgress) -> Result<(), PersistenceError>;

    /// Read stored progress. `Ok(None)` when nothing is stored.
    fn load(&self) -> Result<Option<PersistedProgress>, PersistenceError>;

    /// Remove stored progress. Clearing an empty store succeeds.
    fn clear(&self) -> Result<(), PersistenceError>;
}

/// In-process store holding serialized documents by key.
pub struct MemoryStore {
    key: String,
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_key(PROGRESS_KEY)
    }

    pub fn with_key(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The raw stored document, if any.
    pub fn raw(&self) -> Option<String> {
        self.lock().get(&self.key).cloned()
    }

    /// Store a raw document under the progress key, bypassing serialization.
    pub fn put_raw(&self, document: impl Into<String>) {
        self.lock().insert(self.key.clone(), document.into());
    }

    pub fn is_empty(&self) -> bool {
        !self.lock().contains_key(&self.key)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceAdapter for MemoryStore {
    fn save(&self, progress: &PersistedProgress) -> Result<(), PersistenceError> {
        let document = serde_json::to_string(progress)?;
        self.lock().insert(self.key.clone(), document);
        Ok(())
    }

    fn load(&self) -> Result<Option<PersistedProgress>, PersistenceError> {
        match self.lock().get(&self.key) {
            Some(document) => Ok(Some(serde_json::from_str(document)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        self.lock().remove(&self.key);
        Ok(())
    }
}

/// File-backed store: a JSON object of key → document, rewritten atomically.
pub struct JsonFileStore {
    path: PathBuf,
    key: String,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_key(path, PROGRESS_KEY)
    }

    pub fn with_key(path: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            key: key.into(),
        }
    }

    /// Read the whole key/value object. A missing file is an empty object.
    fn read_entries(&self) -> Result<serde_json::Map<String, Value>, PersistenceError> {
        let text = match std::fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(serde_json::Map::new()),
            Err(e) => return Err(e.into()),
        };
        if text.trim().is_empty() {
            return Ok(serde_json::Map::new());
        }
        match serde_json::from_str::<Value>(&text)? {
            Value::Object(map) => Ok(map),
            other => Err(PersistenceError::Corrupt(format!(
                "expected a JSON object in {}, found {}",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    fn write_entries(
        &self,
        entries: &serde_json::Map<String, Value>,
    ) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(entries)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn remove_file(&self) -> Result<(), PersistenceError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl PersistenceAdapter for JsonFileStore {
    fn save(&self, progress: &PersistedProgress) -> Result<(), PersistenceError> {
        // A corrupt file is replaced rather than blocking every later save.
        // Read failures are not: the other keys may still be intact.
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(PersistenceError::Io(e)) => return Err(e.into()),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Overwriting unreadable storage file"
                );
                serde_json::Map::new()
            }
        };
        entries.insert(self.key.clone(), serde_json::to_value(progress)?);
        self.write_entries(&entries)
    }

    fn load(&self) -> Result<Option<PersistedProgress>, PersistenceError> {
        let mut entries = self.read_entries()?;
        match entries.remove(&self.key) {
            Some(document) => Ok(Some(serde_json::from_value(document)?)),
            None => Ok(None),
        }
    }

    fn clear(&self) -> Result<(), PersistenceError> {
        let mut entries = match self.read_entries() {
            Ok(entries) => entries,
            Err(PersistenceError::Io(e)) => return Err(e.into()),
            Err(e) => {
                warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Removing unreadable storage file"
                );
                return self.remove_file();
            }
        };
        if entries.remove(&self.key).is_none() {
            return Ok(());
        }
        if entries.is_empty() {
            self.remove_file()
        } else {
            self.write_entries(&entries)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wizard::model::WizardData;
    use serde_json::json;

    fn progress(step: usize) -> PersistedProgress {
        let data: WizardData = serde_json::from_value(json!({
            "category": {"category": "therapist"},
            "account": {"email": "dr@clinic.test"}
        }))
        .unwrap();
        PersistedProgress::new(step, data)
    }

    #[test]
    fn memory_store_save_load_clear() {
        let store = MemoryStore::new();
        assert!(store.load().unwrap().is_none());

        store.save(&progress(2)).unwrap();
        let loaded = store.load().unwrap().unwrap();
        assert_eq!(loaded.step, 2);
        assert_eq!(loaded.data["account"]["email"], "dr@clinic.test");

        store.clear().unwrap();
        assert!(store.is_empty());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn memory_store_reports_malformed_documents() {
        let store = MemoryStore::new();
        store.put_raw("{not json");
        assert!(store.load().is_err());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("storage.json"));

        assert!(store.load().unwrap().is_none());
        store.save(&progress(3)).unwrap();

        let reopened = JsonFileStore::new(dir.path().join("storage.json"));
        let loaded = reopened.load().unwrap().unwrap();
        assert_eq!(loaded.step, 3);
        assert_eq!(loaded, store.load().unwrap().unwrap());
    }

    #[test]
    fn file_store_keeps_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, r#"{"theme": "dark"}"#).unwrap();

        let store = JsonFileStore::new(&path);
        store.save(&progress(1)).unwrap();
        store.clear().unwrap();

        let remaining: Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(remaining, json!({"theme": "dark"}));
    }

    #[test]
    fn file_store_clear_removes_file_when_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("storage.json");
        let store = JsonFileStore::new(&path);

        store.clear().unwrap();
        store.save(&progress(1)).unwrap();
        assert!(path.exists());
        store.clear().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn file_store_malformed_file_is_an_error_on_load_but_not_on_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "[1, 2, 3]").unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load(), Err(PersistenceError::Corrupt(_))));

        store.save(&progress(1)).unwrap();
        assert_eq!(store.load().unwrap().unwrap().step, 1);
    }

    #[test]
    fn file_store_clear_removes_a_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "{\"onboarding_progress\": ").unwrap();

        let store = JsonFileStore::new(&path);
        store.clear().unwrap();
        assert!(!path.exists());
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn file_store_read_failure_does_not_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be makes every read fail.
        let path = dir.path().join("storage.json");
        std::fs::create_dir(&path).unwrap();

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.save(&progress(1)), Err(PersistenceError::Io(_))));
        assert!(matches!(store.clear(), Err(PersistenceError::Io(_))));
        assert!(path.is_dir());
    }
}
