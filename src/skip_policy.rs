//! Already-processed detection
//!
//! A directory that already contains a playable media file is treated as fully
//! extracted. Re-running extraction there would only rewrite the same files every
//! time the downloader touches the archive again.

use std::path::{Path, PathBuf};
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Decides whether a directory should be left untouched
#[derive(Clone, Debug)]
pub struct SkipPolicy {
    /// Lowercase extensions without the leading dot
    media_extensions: Vec<String>,
}

impl SkipPolicy {
    /// Create a policy from a list of media extensions
    ///
    /// Extensions are matched case-insensitively; a leading dot is ignored.
    pub fn new<I, S>(media_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let media_extensions = media_extensions
            .into_iter()
            .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .collect();
        Self { media_extensions }
    }

    /// Whether `directory` (or anything below it) already holds a media file
    ///
    /// A directory that cannot be listed never causes a skip.
    pub fn should_skip(&self, directory: &Path) -> bool {
        self.find_marker(directory).is_some()
    }

    /// First media file found under `directory`, if any
    pub fn find_marker(&self, directory: &Path) -> Option<PathBuf> {
        for entry in WalkDir::new(directory).follow_links(false) {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    // Vanished or unreadable entries just don't count
                    trace!(?directory, error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            if entry.file_type().is_file() && self.is_media_file(entry.path()) {
                debug!(?directory, marker = ?entry.path(), "found media marker");
                return Some(entry.into_path());
            }
        }

        None
    }

    /// Check a single path's extension against the media list
    pub fn is_media_file(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| {
                self.media_extensions
                    .iter()
                    .any(|media| media.eq_ignore_ascii_case(ext))
            })
            .unwrap_or(false)
    }
}
