//! File observations used by the readiness gate

use crate::error::{Error, Result};
use crate::extraction::volume_set;
use async_trait::async_trait;
use std::fs::{File, OpenOptions, TryLockError};
use std::io;
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;

/// Point-in-time observations of a file
///
/// The gate only ever asks two questions: how big is the file right now, and can it
/// be opened exclusively right now. Keeping them behind a trait lets tests script a
/// file that grows or stays locked for a precise number of samples.
#[async_trait]
pub trait FileProbe: Send + Sync {
    /// Current length of the file in bytes
    async fn size(&self, path: &Path) -> Result<u64>;

    /// Whether the file can be opened for exclusive access at this instant
    ///
    /// `Ok(false)` means another process holds a conflicting lock. Any other
    /// failure to open (missing file, permission denied) is an error.
    async fn is_exclusively_openable(&self, path: &Path) -> Result<bool>;

    /// Other files that must be ready together with `path`
    ///
    /// For a multi-volume archive these are the sibling volumes present right now.
    /// The default has none.
    async fn companions(&self, _path: &Path) -> Result<Vec<PathBuf>> {
        Ok(Vec::new())
    }
}

/// [`FileProbe`] backed by the real filesystem
///
/// Exclusivity is tested by opening the file for reading and taking a non-blocking
/// exclusive lock. On Windows the open also requests no sharing, so a writer that
/// keeps the file open produces a sharing violation, which counts as locked.
#[derive(Clone, Copy, Debug, Default)]
pub struct FsProbe;

impl FsProbe {
    /// Create a filesystem probe
    pub fn new() -> Self {
        Self
    }

    /// Synchronous exclusivity probe
    pub fn probe_exclusive(path: &Path) -> io::Result<bool> {
        let mut options = OpenOptions::new();
        options.read(true);
        #[cfg(windows)]
        {
            use std::os::windows::fs::OpenOptionsExt;
            options.share_mode(0);
        }

        let file: File = match options.open(path) {
            Ok(file) => file,
            Err(e) if is_sharing_violation(&e) => return Ok(false),
            Err(e) => return Err(e),
        };

        // The lock is released when `file` is dropped
        match file.try_lock() {
            Ok(()) => Ok(true),
            Err(TryLockError::WouldBlock) => Ok(false),
            Err(TryLockError::Error(e)) if is_sharing_violation(&e) => Ok(false),
            Err(TryLockError::Error(e)) => Err(e),
        }
    }
}

#[cfg(windows)]
fn is_sharing_violation(e: &io::Error) -> bool {
    // ERROR_SHARING_VIOLATION, ERROR_LOCK_VIOLATION
    matches!(e.raw_os_error(), Some(32) | Some(33))
}

#[cfg(not(windows))]
fn is_sharing_violation(_e: &io::Error) -> bool {
    false
}

#[async_trait]
impl FileProbe for FsProbe {
    async fn size(&self, path: &Path) -> Result<u64> {
        let metadata = tokio::fs::metadata(path).await?;
        Ok(metadata.len())
    }

    async fn is_exclusively_openable(&self, path: &Path) -> Result<bool> {
        let path_owned = path.to_path_buf();
        let result = spawn_blocking(move || Self::probe_exclusive(&path_owned))
            .await
            .map_err(|e| Error::Other(format!("exclusivity probe panicked: {}", e)))?;
        Ok(result?)
    }

    async fn companions(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let path_owned = path.to_path_buf();
        let mut set = spawn_blocking(move || volume_set(&path_owned))
            .await
            .map_err(|e| Error::Other(format!("volume listing panicked: {}", e)))?;
        set.retain(|member| member != path);
        Ok(set)
    }
}
