//! On-disk storage for uploaded radiographs.
//!
//! Files get UUID names and are written through a temp file in the same
//! directory, then renamed into place, so a reader never sees a partial image.

use std::io::Write;
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct ImageStore {
    root: PathBuf,
}

impl ImageStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `bytes` under a fresh name with extension `ext`.
    pub fn save(&self, bytes: &[u8], ext: &str) -> std::io::Result<PathBuf> {
        std::fs::create_dir_all(&self.root)?;
        let target = self.root.join(format!("{}.{ext}", Uuid::new_v4()));

        let mut tmp = NamedTempFile::new_in(&self.root)?;
        tmp.write_all(bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist_noclobber(&target).map_err(|e| e.error)?;

        tracing::debug!(path = %target.display(), bytes = bytes.len(), "Image stored");
        Ok(target)
    }

    /// Remove a stored image. Returns `false` if it was already gone.
    /// Paths outside the store root are refused.
    pub fn remove(&self, path: &Path) -> std::io::Result<bool> {
        if !path.starts_with(&self.root) {
            return Err(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                format!("{} is outside the image store", path.display()),
            ));
        }
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Best-effort removal used during cleanup paths; failures are logged.
    pub fn discard(&self, path: &Path) {
        if let Err(e) = self.remove(path) {
            tracing::warn!(path = %path.display(), error = %e, "Failed to remove stored image");
        }
    }
}
