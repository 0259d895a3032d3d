use crate::error::{Error, ExtractionError, Result};
use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

use super::ArchiveExtractor;
use super::volume::is_rar_file;

/// Archive extractor for RAR files, backed by the bundled unrar library
#[derive(Clone, Copy, Debug, Default)]
pub struct RarExtractor;

impl RarExtractor {
    /// Create a RAR extractor
    pub fn new() -> Self {
        Self
    }

    /// Test-only accessor for `is_password_error`
    #[cfg(test)]
    pub(crate) fn is_password_error_pub(error_msg: &str) -> bool {
        Self::is_password_error(error_msg)
    }

    /// Check if an unrar error indicates a password problem
    fn is_password_error(error_msg: &str) -> bool {
        let lower = error_msg.to_lowercase();
        lower.contains("password")
            || lower.contains("encrypted")
            || error_msg.contains("ERAR_BAD_PASSWORD")
            || error_msg.contains("ERAR_MISSING_PASSWORD")
    }

    /// Convert an unrar error to our error type, checking for password errors
    fn convert_unrar_error(e: unrar::error::UnrarError, archive_path: &Path) -> Error {
        let err_str = e.to_string();
        if Self::is_password_error(&err_str) {
            Error::Extraction(ExtractionError::WrongPassword {
                archive: archive_path.to_path_buf(),
            })
        } else {
            Error::Extraction(ExtractionError::ExtractionFailed {
                archive: archive_path.to_path_buf(),
                reason: err_str,
            })
        }
    }

    /// Strip everything but normal components so entries cannot escape `dest_path`
    fn sanitize_entry_path(name: &Path) -> PathBuf {
        name.components()
            .filter(|c| matches!(c, Component::Normal(_)))
            .collect()
    }

    /// Extract a RAR archive synchronously
    ///
    /// Directory entries are skipped; their files still land in the right place because
    /// each file entry carries its full relative path. Existing files are overwritten.
    pub fn extract_blocking(archive_path: &Path, dest_path: &Path) -> Result<Vec<PathBuf>> {
        debug!(?archive_path, ?dest_path, "attempting RAR extraction");

        std::fs::create_dir_all(dest_path).map_err(|e| {
            Error::Extraction(ExtractionError::InvalidPath {
                path: dest_path.to_path_buf(),
                reason: format!("failed to create destination: {}", e),
            })
        })?;

        let processor = unrar::Archive::new(archive_path)
            .open_for_processing()
            .map_err(|e| Self::convert_unrar_error(e, archive_path))?;

        let mut extracted_files = Vec::new();

        // Walk the archive using unrar's cursor state machine
        let mut at_header = processor;
        loop {
            let at_file = match at_header.read_header() {
                Ok(Some(entry_processor)) => entry_processor,
                Ok(None) => break,
                Err(e) => return Err(Self::convert_unrar_error(e, archive_path)),
            };

            let header = at_file.entry();
            let sanitized = Self::sanitize_entry_path(Path::new(&header.filename));

            if header.is_directory() || sanitized.as_os_str().is_empty() {
                if !header.is_directory() {
                    warn!(?archive_path, entry = ?header.filename, "skipping entry with unsafe path");
                }
                at_header = at_file.skip().map_err(|e| {
                    Error::Extraction(ExtractionError::ExtractionFailed {
                        archive: archive_path.to_path_buf(),
                        reason: format!("failed to skip entry: {}", e),
                    })
                })?;
                continue;
            }

            let file_path = dest_path.join(&sanitized);
            if let Some(parent) = file_path.parent() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    Error::Extraction(ExtractionError::InvalidPath {
                        path: parent.to_path_buf(),
                        reason: format!("failed to create entry directory: {}", e),
                    })
                })?;
            }

            at_header = at_file
                .extract_to(&file_path)
                .map_err(|e| Self::convert_unrar_error(e, archive_path))?;
            extracted_files.push(file_path);
        }

        info!(
            ?archive_path,
            extracted_count = extracted_files.len(),
            "RAR extraction successful"
        );

        Ok(extracted_files)
    }
}

#[async_trait]
impl ArchiveExtractor for RarExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        if !is_rar_file(archive) {
            return Err(Error::Extraction(ExtractionError::UnsupportedArchive {
                archive: archive.to_path_buf(),
            }));
        }

        // Use spawn_blocking to avoid blocking the async runtime during extraction
        let archive_owned = archive.to_path_buf();
        let dest_owned = dest.to_path_buf();
        spawn_blocking(move || Self::extract_blocking(&archive_owned, &dest_owned))
            .await
            .map_err(|e| {
                Error::Extraction(ExtractionError::ExtractionFailed {
                    archive: archive.to_path_buf(),
                    reason: format!("extraction task panicked: {}", e),
                })
            })?
    }

    fn name(&self) -> &'static str {
        "unrar"
    }
}
