//! Registry of archive paths that currently have an orchestration task

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

/// Concurrency-safe set of in-flight archive paths
///
/// Cloning is cheap and every clone refers to the same set.
#[derive(Clone, Debug, Default)]
pub struct InFlightSet {
    paths: Arc<Mutex<HashSet<PathBuf>>>,
}

impl InFlightSet {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashSet<PathBuf>> {
        // The set stays consistent even if a holder panicked mid-insert
        self.paths.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Atomically claim `path`
    ///
    /// Returns `None` if another task already holds it. The returned guard releases the
    /// path when dropped, on every exit path including unwinding.
    pub fn try_admit(&self, path: &Path) -> Option<InFlightGuard> {
        if !self.lock().insert(path.to_path_buf()) {
            return None;
        }
        Some(InFlightGuard {
            set: self.clone(),
            path: path.to_path_buf(),
        })
    }

    /// Whether `path` is currently held
    pub fn contains(&self, path: &Path) -> bool {
        self.lock().contains(path)
    }

    /// Number of paths currently held
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether no path is currently held
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

/// Ownership of one in-flight path; dropping it releases the path
#[derive(Debug)]
pub struct InFlightGuard {
    set: InFlightSet,
    path: PathBuf,
}

impl InFlightGuard {
    /// The path this guard holds
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.path);
    }
}
