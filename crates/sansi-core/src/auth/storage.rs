//! Durable storage for the session triple.
//!
//! The session is kept as three string entries under the `ohsansi`
//! namespace. Backends always read and write the three together as one
//! record so a reader never sees a token without its profile or expiry.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Raw persisted form of a session.
///
/// Values stay as strings exactly as stored; decoding (and tolerating
/// corruption) is the credential store's job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    #[serde(rename = "ohsansi.token", default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    /// JSON-serialized user profile
    #[serde(rename = "ohsansi.user", default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    /// Expiry as decimal epoch milliseconds
    #[serde(rename = "ohsansi.expiresAt", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
}

impl StoredSession {
    pub fn is_empty(&self) -> bool {
        self.token.is_none() && self.user.is_none() && self.expires_at.is_none()
    }
}

/// A place to keep the session between runs.
pub trait SessionStorage: Send + Sync {
    /// Read the stored record, `None` if nothing is stored.
    fn load(&self) -> Result<Option<StoredSession>>;

    /// Replace the stored record in a single write.
    fn store(&self, record: &StoredSession) -> Result<()>;

    /// Remove the stored record. Removing nothing is not an error.
    fn remove(&self) -> Result<()>;
}

impl<T: SessionStorage + ?Sized> SessionStorage for Arc<T> {
    fn load(&self) -> Result<Option<StoredSession>> {
        (**self).load()
    }

    fn store(&self, record: &StoredSession) -> Result<()> {
        (**self).store(record)
    }

    fn remove(&self) -> Result<()> {
        (**self).remove()
    }
}

/// Session kept in a JSON file.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "session".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read session file {}", self.path.display()))?;
        let record: StoredSession = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse session file {}", self.path.display()))?;
        Ok(Some(record))
    }

    fn store(&self, record: &StoredSession) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let contents = serde_json::to_string_pretty(record)?;

        // Write beside the target and rename over it so the triple is replaced atomically
        let temp = self.temp_path();
        write_private(&temp, contents.as_bytes())
            .with_context(|| format!("Failed to write {}", temp.display()))?;
        std::fs::rename(&temp, &self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Session written");
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("Failed to remove {}", self.path.display()))?;
        }
        Ok(())
    }
}

/// Write `contents` to `path`, readable by the owner only on unix.
#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; a stale temp file keeps its old bits
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}

/// Process-local storage. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStorage {
    record: Mutex<Option<StoredSession>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a record already present, as if left by a previous run.
    pub fn with_record(record: StoredSession) -> Self {
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> Result<Option<StoredSession>> {
        Ok(self.record.lock().unwrap_or_else(|e| e.into_inner()).clone())
    }

    fn store(&self, record: &StoredSession) -> Result<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = Some(record.clone());
        Ok(())
    }

    fn remove(&self) -> Result<()> {
        *self.record.lock().unwrap_or_else(|e| e.into_inner()) = None;
        Ok(())
    }
}
