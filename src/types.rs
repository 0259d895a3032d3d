//! Core types and events for auto-unrar

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Origin of a trigger for a path
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// The file appeared (live create event or startup scan)
    Created,
    /// The file's content or name changed
    Modified,
}

/// A filesystem notification for one path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trigger {
    /// Absolute path of the file the event refers to
    pub path: PathBuf,
    /// What kind of event produced the trigger
    pub kind: TriggerKind,
}

impl Trigger {
    /// Trigger for a newly created file
    pub fn created(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: TriggerKind::Created,
        }
    }

    /// Trigger for a modified file
    pub fn modified(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            kind: TriggerKind::Modified,
        }
    }
}

/// Why an archive was not ready to open
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum NotReadyReason {
    /// Another process still holds the file exclusively
    InUse,
    /// The file size never stayed constant within the sampling budget
    StillWriting {
        /// Number of size samples taken
        attempts: u32,
    },
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::InUse => write!(f, "in use by another process"),
            NotReadyReason::StillWriting { attempts } => {
                write!(f, "still being written after {} size samples", attempts)
            }
        }
    }
}

/// Result of a readiness check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Readiness {
    /// The file is stable and can be opened exclusively
    Ready,
    /// The file should not be opened yet
    NotReady(NotReadyReason),
}

impl Readiness {
    /// Whether the file can be extracted now
    pub fn is_ready(&self) -> bool {
        matches!(self, Readiness::Ready)
    }
}

/// Why an archive was left alone
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum SkipReason {
    /// The containing directory already holds a media file
    AlreadyHasMedia {
        /// The media file that was found
        marker: PathBuf,
    },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::AlreadyHasMedia { marker } => {
                write!(f, "already has media ({})", marker.display())
            }
        }
    }
}

/// Terminal outcome of handling one archive path
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExtractionOutcome {
    /// Nothing was done because the directory is already processed
    Skipped {
        /// Why the archive was skipped
        reason: SkipReason,
    },
    /// The archive was extracted into its directory
    Succeeded {
        /// Number of file entries written
        entries: usize,
    },
    /// The archive was busy; a later trigger may pick it up again
    FailedInUse {
        /// Which readiness condition failed
        reason: NotReadyReason,
    },
    /// Extraction or an I/O step failed
    FailedOther {
        /// Error detail
        detail: String,
    },
    /// Shutdown interrupted the task before anything was written
    Abandoned,
}

impl ExtractionOutcome {
    /// Whether the archive was extracted
    pub fn is_success(&self) -> bool {
        matches!(self, ExtractionOutcome::Succeeded { .. })
    }
}

impl fmt::Display for ExtractionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtractionOutcome::Skipped { reason } => write!(f, "skipped: {}", reason),
            ExtractionOutcome::Succeeded { entries } => {
                write!(f, "extracted {} file(s)", entries)
            }
            ExtractionOutcome::FailedInUse { reason } => write!(f, "skipping, {}", reason),
            ExtractionOutcome::FailedOther { detail } => write!(f, "failed: {}", detail),
            ExtractionOutcome::Abandoned => write!(f, "abandoned during shutdown"),
        }
    }
}

/// Event emitted while archives move through the pipeline
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// A trigger was accepted for processing
    TriggerReceived {
        /// Archive path
        path: PathBuf,
        /// Trigger origin
        kind: TriggerKind,
    },

    /// Waiting for the archive to become ready
    ReadinessCheck {
        /// Archive path
        path: PathBuf,
    },

    /// Extraction into the containing directory has started
    ExtractionStarted {
        /// Archive path
        path: PathBuf,
        /// Directory receiving the entries
        destination: PathBuf,
    },

    /// Handling of an archive finished
    Finished {
        /// Archive path
        path: PathBuf,
        /// Terminal outcome
        outcome: ExtractionOutcome,
    },

    /// Shutdown has been requested
    Shutdown,
}
