//! Shared helpers for the end-to-end scenarios
#![allow(dead_code)]

use async_trait::async_trait;
use auto_unrar::{ArchiveExtractor, Config, ReadinessConfig, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tempfile::TempDir;

/// Readiness budget: 30s grace, 10 samples 10s apart, 2 stable samples required
pub fn scenario_config(root: &Path) -> Config {
    let mut config = Config::new(root);
    config.readiness = ReadinessConfig {
        grace_delay: Duration::from_secs(30),
        poll_interval: Duration::from_secs(10),
        max_retries: 10,
        min_stable_samples: 2,
    };
    config.validate().expect("scenario config is valid");
    config
}

/// A download directory `D` holding `movie.rar`
pub struct DownloadDir {
    pub dir: TempDir,
    pub archive: PathBuf,
}

impl DownloadDir {
    pub fn with_archive() -> Self {
        let dir = TempDir::new().expect("tempdir");
        let archive = dir.path().join("movie.rar");
        std::fs::write(&archive, vec![0x52u8; 4096]).expect("write archive");
        Self { dir, archive }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Sorted file names directly inside the directory
    pub fn file_names(&self) -> Vec<String> {
        let mut names: Vec<String> = std::fs::read_dir(self.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }
}

/// Stand-in for the archive primitive: writes fixed entries and counts calls
pub struct FakeExtractor {
    entries: Vec<(String, Vec<u8>)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<PathBuf>>,
}

impl FakeExtractor {
    pub fn new(entries: &[(&str, &[u8])]) -> Self {
        Self {
            entries: entries
                .iter()
                .map(|(name, content)| (name.to_string(), content.to_vec()))
                .collect(),
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().expect("lock").clone()
    }
}

#[async_trait]
impl ArchiveExtractor for FakeExtractor {
    async fn extract(&self, archive: &Path, dest: &Path) -> Result<Vec<PathBuf>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().expect("lock").push(archive.to_path_buf());

        let mut written = Vec::new();
        for (name, content) in &self.entries {
            let target = dest.join(name);
            std::fs::write(&target, content)?;
            written.push(target);
        }
        Ok(written)
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
