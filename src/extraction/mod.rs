//! Archive extraction
//!
//! This module defines the extraction primitive used by the orchestrator and the
//! production RAR implementation. Extraction always writes into the archive's own
//! directory and overwrites existing files, so an interrupted run can simply be
//! repeated from the source archive.

mod rar;
mod volume;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

// Re-exports
pub use rar::RarExtractor;
pub use volume::{RarVolume, VolumeScheme, is_rar_file, volume_set};

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Trait for archive extraction
///
/// Implementations open `archive`, skip directory entries and write every file
/// entry below `dest`, replacing files that already exist. A corrupt or unreadable
/// archive must surface as an error, never as a panic escaping the call.
///
/// # Examples
///
/// ```no_run
/// use auto_unrar::extraction::{ArchiveExtractor, RarExtractor};
/// use std::path::Path;
///
/// # async fn example() -> auto_unrar::Result<()> {
/// let extractor = RarExtractor::new();
/// let files = extractor
///     .extract(Path::new("/downloads/show/show.rar"), Path::new("/downloads/show"))
///     .await?;
/// println!("wrote {} files", files.len());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    /// Extract every file entry of `archive` into `dest`
    ///
    /// Returns the paths that were written.
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
