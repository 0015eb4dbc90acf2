//! Bearer token storage.
//!
//! The file-backed store keeps the token in `<base>/session.json` with
//! restricted permissions (0600). Tokens are never logged in full.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::{StorageMode, paths};

/// Persistent slot for a single bearer token.
///
/// Only the auth provider writes through this trait; everything else reads
/// the token from the provider.
pub trait TokenStore: Send + Sync {
    /// Returns the previously saved token, if any.
    ///
    /// # Errors
    /// Returns an error if the backing medium cannot be read.
    fn read(&self) -> Result<Option<String>>;

    /// Saves `token`, or clears the slot when `None` (or blank).
    ///
    /// # Errors
    /// Returns an error if the backing medium cannot be written.
    fn write(&self, token: Option<&str>) -> Result<()>;

    /// Human-readable location for status output.
    fn describe(&self) -> String;
}

/// On-disk session record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredSession {
    pub konyx_token: String,
    pub saved_at: DateTime<Utc>,
}

/// Token kept in `session.json`; survives process restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at the default `$KONYX_HOME/session.json`.
    pub fn default_location() -> Self {
        Self::new(paths::session_path())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the full record, including when it was saved.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_record(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session from {}", self.path.display()))?;
        if contents.trim().is_empty() {
            return Ok(None);
        }

        let record: StoredSession = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session from {}", self.path.display()))?;
        Ok((!record.konyx_token.trim().is_empty()).then_some(record))
    }

    fn save_record(&self, record: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }

        let contents =
            serde_json::to_string_pretty(record).context("Failed to serialize session")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            let mut file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o600)
                .open(&self.path)
                .with_context(|| format!("Failed to open {} for writing", self.path.display()))?;
            file.write_all(contents.as_bytes())
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        #[cfg(not(unix))]
        {
            fs::write(&self.path, contents)
                .with_context(|| format!("Failed to write to {}", self.path.display()))?;
        }

        Ok(())
    }
}

impl TokenStore for FileTokenStore {
    fn read(&self) -> Result<Option<String>> {
        Ok(self.load_record()?.map(|r| r.konyx_token))
    }

    fn write(&self, token: Option<&str>) -> Result<()> {
        match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => self.save_record(&StoredSession {
                konyx_token: token.to_string(),
                saved_at: Utc::now(),
            }),
            None => match fs::remove_file(&self.path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e)
                    .with_context(|| format!("Failed to remove {}", self.path.display())),
            },
        }
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

/// Token kept for the lifetime of the process only.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn read(&self) -> Result<Option<String>> {
        Ok(self
            .slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone())
    }

    fn write(&self, token: Option<&str>) -> Result<()> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        Ok(())
    }

    fn describe(&self) -> String {
        "process memory".to_string()
    }
}

/// Opens the store selected by `session.storage`.
pub fn open_store(mode: StorageMode) -> Box<dyn TokenStore> {
    match mode {
        StorageMode::File => Box::new(FileTokenStore::default_location()),
        StorageMode::Memory => Box::new(MemoryTokenStore::new()),
    }
}

#[cfg(test)]
mod tests {
    use tempfile::tempdir;

    use super::*;

    fn stores(dir: &Path) -> Vec<Box<dyn TokenStore>> {
        vec![
            Box::new(FileTokenStore::new(dir.join("session.json"))),
            Box::new(MemoryTokenStore::new()),
        ]
    }

    #[test]
    fn test_read_after_write_returns_token() {
        let dir = tempdir().unwrap();
        for store in stores(dir.path()) {
            assert_eq!(store.read().unwrap(), None);
            for token in ["abc123", "xyz", "tok with spaces inside"] {
                store.write(Some(token)).unwrap();
                assert_eq!(store.read().unwrap().as_deref(), Some(token));
            }
            store.write(None).unwrap();
            assert_eq!(store.read().unwrap(), None, "{}", store.describe());
        }
    }

    #[test]
    fn test_blank_token_clears() {
        let dir = tempdir().unwrap();
        for store in stores(dir.path()) {
            store.write(Some("abc123")).unwrap();
            store.write(Some("   ")).unwrap();
            assert_eq!(store.read().unwrap(), None);
        }
    }

    #[test]
    fn test_clear_when_empty_is_ok() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("nested").join("session.json"));
        store.write(None).unwrap();
        assert!(!store.path().exists());
    }

    #[test]
    fn test_file_record_uses_storage_key() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"));
        store.write(Some("abc123")).unwrap();

        let raw = fs::read_to_string(store.path()).unwrap();
        assert!(raw.contains("\"konyx_token\": \"abc123\""));
        let record = store.load_record().unwrap().unwrap();
        assert!(record.saved_at <= Utc::now());
    }

    #[test]
    fn test_record_timestamp_is_rfc3339() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"));
        fs::write(
            store.path(),
            r#"{"konyx_token": "xyz", "saved_at": "2026-01-05T09:30:00Z"}"#,
        )
        .unwrap();

        let record = store.load_record().unwrap().unwrap();
        assert_eq!(record.konyx_token, "xyz");
        assert_eq!(record.saved_at.to_rfc3339(), "2026-01-05T09:30:00+00:00");
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"));
        fs::write(store.path(), "{not json").unwrap();
        assert!(store.read().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let store = FileTokenStore::new(dir.path().join("session.json"));
        store.write(Some("abc123")).unwrap();

        let mode = fs::metadata(store.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
