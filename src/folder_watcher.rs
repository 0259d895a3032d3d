//! Folder watching for archives arriving in the download tree
//!
//! This module turns the watched root into a stream of [`Trigger`]s:
//! - a one-time recursive scan at startup, emitting every existing RAR file as `Created`
//! - live `notify` events, recursive: creations of RAR files as `Created`, and
//!   modifications of any file as `Modified`
//!
//! Filtering down to archives worth extracting happens in the driver; the watcher
//! reports what the filesystem did.
//!
//! # Example
//!
//! ```no_run
//! use auto_unrar::folder_watcher::FolderWatcher;
//!
//! # async fn example() -> auto_unrar::Result<()> {
//! let mut watcher = FolderWatcher::new("/srv/downloads")?;
//! watcher.start()?;
//!
//! while let Some(trigger) = watcher.recv().await {
//!     println!("{:?} {}", trigger.kind, trigger.path.display());
//! }
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::extraction::is_rar_file;
use crate::types::Trigger;
use notify::{
    Config as NotifyConfig, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher,
};
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};
use walkdir::WalkDir;

/// Watches a directory tree and yields archive triggers
pub struct FolderWatcher {
    /// Filesystem watcher instance
    watcher: RecommendedWatcher,

    /// Sender shared with the notify callback, used for the startup scan
    tx: mpsc::UnboundedSender<Trigger>,

    /// Channel for receiving triggers
    rx: mpsc::UnboundedReceiver<Trigger>,

    /// Watched root (canonicalized by `start`)
    root: PathBuf,
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("root", &self.root)
            .finish_non_exhaustive()
    }
}

impl FolderWatcher {
    /// Create a folder watcher for `root`
    ///
    /// # Errors
    /// Returns error if the filesystem watcher cannot be initialized
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let callback_tx = tx.clone();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    for trigger in triggers_from_event(&event) {
                        if callback_tx.send(trigger).is_err() {
                            // Receiver gone, the watcher is shutting down
                            return;
                        }
                    }
                }
                Err(e) => error!("Filesystem watcher error: {}", e),
            },
            NotifyConfig::default(),
        )?;

        Ok(Self {
            watcher,
            tx,
            rx,
            root: root.into(),
        })
    }

    /// Watched root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Start watching and queue the startup scan
    ///
    /// Creates the root if it does not exist. Watching starts before the scan so a
    /// file created in between is reported at least once; duplicates are harmless.
    ///
    /// # Errors
    /// Returns error if the root cannot be created, resolved or watched
    pub fn start(&mut self) -> Result<()> {
        if !self.root.exists() {
            std::fs::create_dir_all(&self.root).map_err(|e| {
                Error::FolderWatch(format!("Failed to create watch folder: {}", e))
            })?;
            info!("Created watch folder: {}", self.root.display());
        }

        self.root = std::fs::canonicalize(&self.root).map_err(|e| {
            Error::FolderWatch(format!("Failed to resolve watch folder: {}", e))
        })?;

        self.watcher
            .watch(&self.root, RecursiveMode::Recursive)
            .map_err(|e| Error::FolderWatch(format!("Failed to watch folder: {}", e)))?;
        info!("Watching folder: {}", self.root.display());

        let existing = scan_existing(&self.root);
        info!(
            count = existing.len(),
            "Scanned {} for existing archives",
            self.root.display()
        );
        for path in existing {
            if self.tx.send(Trigger::created(path)).is_err() {
                break;
            }
        }

        Ok(())
    }

    /// Next trigger
    ///
    /// The watcher keeps its own sender for the startup scan, so this only yields
    /// `None` if the channel is closed from outside.
    pub async fn recv(&mut self) -> Option<Trigger> {
        self.rx.recv().await
    }

    /// Stop watching the root
    pub fn stop(mut self) {
        if let Err(e) = self.watcher.unwatch(&self.root) {
            debug!(error = %e, "unwatch failed, dropping watcher anyway");
        }
        info!("Folder watcher stopped");
    }
}

/// Every RAR file currently under `root`, recursively
pub fn scan_existing(root: &Path) -> Vec<PathBuf> {
    WalkDir::new(root)
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!(error = %e, "Skipping unreadable entry during scan");
                None
            }
        })
        .filter(|entry| entry.file_type().is_file() && is_rar_file(entry.path()))
        .map(|entry| entry.into_path())
        .collect()
}

/// Convert a notify event into triggers
///
/// Creation is only interesting for RAR names; a modification of any file is passed on.
pub fn triggers_from_event(event: &Event) -> Vec<Trigger> {
    match event.kind {
        EventKind::Create(_) => event
            .paths
            .iter()
            .filter(|path| is_rar_file(path))
            .map(|path| Trigger::created(path.clone()))
            .collect(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .map(|path| Trigger::modified(path.clone()))
            .collect(),
        // Ignore other event types (remove, access, ...)
        _ => Vec::new(),
    }
}
