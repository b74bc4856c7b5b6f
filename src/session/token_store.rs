//! Durable storage for the bearer token.
//!
//! The file store keeps the token as the sole contents of one file, named by
//! [`TOKEN_STORAGE_KEY`] unless configured otherwise.

#[cfg(test)]
#[path = "token_store_test.rs"]
mod token_store_test;

use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Fixed storage key for the persisted bearer token.
pub const TOKEN_STORAGE_KEY: &str = "authToken";

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("token storage I/O failed at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Key/value slot for one opaque token.
pub trait TokenStore: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be read.
    fn load(&self) -> Result<Option<String>, StoreError>;

    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be written.
    fn save(&self, token: &str) -> Result<(), StoreError>;

    /// Remove the token. Clearing an empty store succeeds.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing storage cannot be modified.
    fn clear(&self) -> Result<(), StoreError>;
}

/// Process-lifetime token slot.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
    token: Mutex<Option<String>>,
}

impl MemoryTokenStore {
    #[must_use]
    pub fn with_token(token: impl Into<String>) -> Self {
        Self { token: Mutex::new(Some(token.into())) }
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<String>> {
        self.token.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl TokenStore for MemoryTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        Ok(self.slot().clone())
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        *self.slot() = Some(token.to_owned());
        Ok(())
    }

    fn clear(&self) -> Result<(), StoreError> {
        *self.slot() = None;
        Ok(())
    }
}

/// Token persisted to a file so it survives restarts.
#[derive(Debug, Clone)]
pub struct FileTokenStore {
    path: PathBuf,
}

impl FileTokenStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store under `dir`, using [`TOKEN_STORAGE_KEY`] as the file name.
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        Self::new(dir.as_ref().join(TOKEN_STORAGE_KEY))
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io { path: self.path.clone(), source }
    }
}

impl TokenStore for FileTokenStore {
    fn load(&self) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_owned()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, token: &str) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let mut file = open_private(&self.path).map_err(|e| self.io_error(e))?;
        file.write_all(token.as_bytes()).map_err(|e| self.io_error(e))
    }

    fn clear(&self) -> Result<(), StoreError> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(self.io_error(e)),
        }
    }
}

/// Open for writing with owner-only permissions before any byte lands.
/// A file left over with wider permissions is tightened first.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let file = OpenOptions::new().write(true).create(true).truncate(true).mode(0o600).open(path)?;
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new().write(true).create(true).truncate(true).open(path)
}
