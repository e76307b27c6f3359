use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Context, Result};

use super::credentials::Credential;

/// Session file name in the data directory
const SESSION_FILE: &str = "session.json";

/// Durable home of the operator credential.
///
/// Only `SessionManager` writes through this trait; everything else reads the
/// credential from the session.
pub trait TokenStorage: Send + Sync {
    /// Read the persisted credential, if any.
    fn load(&self) -> Result<Option<Credential>>;

    /// Persist the credential, replacing any previous one.
    fn save(&self, credential: &Credential) -> Result<()>;

    /// Remove the persisted credential. Clearing an empty store is not an error.
    fn clear(&self) -> Result<()>;
}

impl<T: TokenStorage + ?Sized> TokenStorage for Arc<T> {
    fn load(&self) -> Result<Option<Credential>> {
        (**self).load()
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        (**self).save(credential)
    }

    fn clear(&self) -> Result<()> {
        (**self).clear()
    }
}

/// Credential persisted as JSON in `session.json` under a data directory.
pub struct FileTokenStorage {
    path: PathBuf,
}

impl FileTokenStorage {
    /// Store `session.json` inside `dir`
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            path: dir.as_ref().join(SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TokenStorage for FileTokenStorage {
    fn load(&self) -> Result<Option<Credential>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let contents =
            std::fs::read_to_string(&self.path).context("Failed to read session file")?;
        let credential: Credential =
            serde_json::from_str(&contents).context("Failed to parse session file")?;
        Ok(Some(credential))
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create session directory")?;
        }
        let contents = serde_json::to_string_pretty(credential)?;
        std::fs::write(&self.path, contents).context("Failed to write session file")?;
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        if self.path.exists() {
            std::fs::remove_file(&self.path).context("Failed to remove session file")?;
        }
        Ok(())
    }
}

/// In-process storage for tests and throwaway sessions.
///
/// Counts every `save` and `clear` so callers can assert how often the
/// durable store was touched.
#[derive(Default)]
pub struct MemoryTokenStorage {
    slot: Mutex<Option<Credential>>,
    writes: AtomicUsize,
}

impl MemoryTokenStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage that already holds a credential, as if persisted by an earlier run
    pub fn with_credential(credential: Credential) -> Self {
        Self {
            slot: Mutex::new(Some(credential)),
            writes: AtomicUsize::new(0),
        }
    }

    /// Number of `save` and `clear` calls so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Current stored value without going through the trait
    pub fn stored(&self) -> Option<Credential> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl TokenStorage for MemoryTokenStorage {
    fn load(&self) -> Result<Option<Credential>> {
        Ok(self.stored())
    }

    fn save(&self, credential: &Credential) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(credential.clone());
        Ok(())
    }

    fn clear(&self) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
        Ok(())
    }
}
