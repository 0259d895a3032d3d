//! Shared test doubles for the readiness gate and the extraction primitive.

use crate::config::{Config, ReadinessConfig};
use crate::error::{Error, ExtractionError, Result};
use crate::extraction::ArchiveExtractor;
use crate::readiness::FileProbe;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Readiness settings small enough to reason about in tests
pub(crate) fn quick_readiness() -> ReadinessConfig {
    ReadinessConfig {
        grace_delay: Duration::from_secs(30),
        poll_interval: Duration::from_secs(10),
        max_retries: 10,
        min_stable_samples: 2,
    }
}

/// Config rooted at `root` using [`quick_readiness`]
pub(crate) fn test_config(root: &Path) -> Config {
    let mut config = Config::new(root);
    config.readiness = quick_readiness();
    config
}

/// A [`FileProbe`] that replays scripted answers; the last answer repeats forever
pub(crate) struct ScriptedProbe {
    sizes: Mutex<VecDeque<u64>>,
    locks: Mutex<VecDeque<bool>>,
    pub(crate) size_calls: AtomicUsize,
    pub(crate) probe_calls: AtomicUsize,
}

impl ScriptedProbe {
    /// `sizes` are returned in order; `openable` answers the exclusivity probes in order
    pub(crate) fn new(sizes: Vec<u64>, openable: Vec<bool>) -> Self {
        Self {
            sizes: Mutex::new(sizes.into()),
            locks: Mutex::new(openable.into()),
            size_calls: AtomicUsize::new(0),
            probe_calls: AtomicUsize::new(0),
        }
    }

    /// Constant size, always openable
    pub(crate) fn settled(size: u64) -> Self {
        Self::new(vec![size], vec![true])
    }

    fn next<T: Copy>(queue: &Mutex<VecDeque<T>>) -> T {
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            *queue.front().expect("script must not be empty")
        }
    }
}

#[async_trait]
impl FileProbe for ScriptedProbe {
    async fn size(&self, _path: &Path) -> Result<u64> {
        self.size_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::next(&self.sizes))
    }

    async fn is_exclusively_openable(&self, _path: &Path) -> Result<bool> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Self::next(&self.locks))
    }
}

/// Extractor double that writes fixed entries and records how it was used
pub(crate) struct RecordingExtractor {
    entries: Vec<(String, Vec<u8>)>,
    fail_with: Option<String>,
    /// When set, each call waits for a permit before writing
    hold: Option<Semaphore>,
    pub(crate) calls: AtomicUsize,
    active: AtomicUsize,
    pub(crate) max_active: AtomicUsize,
    pub(crate) archives: Mutex<Vec<PathBuf>>,
}

impl RecordingExtractor {
    /// Writes `entries` (name, content) into the destination on every call
    pub(crate) fn writing(entries: &[(&str, &[u8])]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_vec()))
                .collect(),
            fail_with: None,
            hold: None,
            calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            archives: Mutex::new(Vec::new()),
        }
    }

    /// Fails every call with an extraction error carrying `reason`
    pub(crate) fn failing(reason: &str) -> Self {
        let mut extractor = Self::writing(&[]);
        extractor.fail_with = Some(reason.to_string());
        extractor
    }

    /// Blocks every call until [`RecordingExtractor::release`] hands out a permit
    pub(crate) fn held(mut self) -> Self {
        self.hold = Some(Semaphore::new(0));
        self
    }

    /// Let `n` held calls proceed
    pub(crate) fn release(&self, n: usize) {
        if let Some(hold) = &self.hold {
            hold.add_permits(n);
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn active_count(&self) -> usize {
        self.active.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ArchiveExtractor for RecordingExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.archives.lock().unwrap().push(archive.to_path_buf());
        let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now_active, Ordering::SeqCst);

        if let Some(hold) = &self.hold {
            hold.acquire().await.unwrap().forget();
        }

        let result = match &self.fail_with {
            Some(reason) => Err(Error::Extraction(ExtractionError::ExtractionFailed {
                archive: archive.to_path_buf(),
                reason: reason.clone(),
            })),
            None => {
                let mut written = Vec::new();
                for (name, content) in &self.entries {
                    let target = dest.join(name);
                    std::fs::write(&target, content)?;
                    written.push(target);
                }
                Ok(written)
            }
        };

        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}
