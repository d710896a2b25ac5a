//! Where the uploaded workbook lives between requests

use crate::error::TabflowResult;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info};

pub const DEFAULT_UPLOAD_PATH: &str = "uploaded.xlsx";

/// Holds at most one uploaded file
pub trait UploadStore: Send + Sync {
    /// Replace the stored file
    fn save(&self, bytes: &[u8]) -> TabflowResult<()>;

    /// The stored file, if any
    fn load(&self) -> TabflowResult<Option<Vec<u8>>>;

    /// Delete the stored file. Returns whether one existed.
    fn remove(&self) -> TabflowResult<bool>;

    fn exists(&self) -> bool;
}

/// One file on disk, overwritten by each upload
#[derive(Debug, Clone)]
pub struct FsUploadStore {
    path: PathBuf,
}

impl FsUploadStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Default for FsUploadStore {
    fn default() -> Self {
        Self::new(DEFAULT_UPLOAD_PATH)
    }
}

impl UploadStore for FsUploadStore {
    fn save(&self, bytes: &[u8]) -> TabflowResult<()> {
        std::fs::write(&self.path, bytes)?;
        info!(path = %self.path.display(), bytes = bytes.len(), "stored upload");
        Ok(())
    }

    fn load(&self) -> TabflowResult<Option<Vec<u8>>> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&self) -> TabflowResult<bool> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {
                info!(path = %self.path.display(), "removed upload");
                Ok(true)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn exists(&self) -> bool {
        self.path.is_file()
    }
}

/// Keeps the upload in memory
#[derive(Debug, Default)]
pub struct MemoryUploadStore {
    bytes: Mutex<Option<Vec<u8>>>,
}

impl MemoryUploadStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn slot(&self) -> std::sync::MutexGuard<'_, Option<Vec<u8>>> {
        // A poisoned slot still holds valid bytes
        self.bytes.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl UploadStore for MemoryUploadStore {
    fn save(&self, bytes: &[u8]) -> TabflowResult<()> {
        *self.slot() = Some(bytes.to_vec());
        debug!(bytes = bytes.len(), "stored upload in memory");
        Ok(())
    }

    fn load(&self) -> TabflowResult<Option<Vec<u8>>> {
        Ok(self.slot().clone())
    }

    fn remove(&self) -> TabflowResult<bool> {
        Ok(self.slot().take().is_some())
    }

    fn exists(&self) -> bool {
        self.slot().is_some()
    }
}
