//! Configuration types for auto-unrar
//!
//! Configuration is read from a JSON file. Durations are expressed in whole seconds.
//! Everything except `watch_root` has a default, so the smallest valid file is:
//!
//! ```json
//! { "watch_root": "/srv/downloads" }
//! ```

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};

/// Readiness detection settings
///
/// Controls how long the gate waits before probing an archive and how many
/// size samples it takes before giving up on a file that keeps growing.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ReadinessConfig {
    /// Delay before the first exclusivity probe (default: 30 seconds)
    #[serde(default = "default_grace_delay", with = "duration_serde")]
    pub grace_delay: Duration,

    /// Interval between size samples (default: 10 seconds)
    #[serde(default = "default_poll_interval", with = "duration_serde")]
    pub poll_interval: Duration,

    /// Maximum number of size samples before the file is reported as still being written (default: 30)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Consecutive unchanged size samples required to call a file stable (default: 2)
    ///
    /// Zero disables size sampling; only the exclusivity probe is used.
    #[serde(default = "default_min_stable_samples")]
    pub min_stable_samples: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            grace_delay: default_grace_delay(),
            poll_interval: default_poll_interval(),
            max_retries: default_max_retries(),
            min_stable_samples: default_min_stable_samples(),
        }
    }
}

impl ReadinessConfig {
    /// Longest time a single readiness check can take
    ///
    /// Saturates at [`Duration::MAX`] for absurd settings.
    pub fn max_wait(&self) -> Duration {
        self.grace_delay
            .saturating_add(self.poll_interval.saturating_mul(self.max_retries))
    }
}

/// Process-level settings (concurrency, shutdown, interactive quit)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RuntimeConfig {
    /// Maximum number of archives extracted at the same time (default: 2)
    ///
    /// Readiness checks are not limited; only the extraction step waits for a slot.
    #[serde(default = "default_max_concurrent_extractions")]
    pub max_concurrent_extractions: usize,

    /// How long shutdown waits for running extractions (default: 30 seconds)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,

    /// Key read from stdin that stops the process (default: 'q')
    #[serde(default = "default_quit_key")]
    pub quit_key: char,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            max_concurrent_extractions: default_max_concurrent_extractions(),
            shutdown_timeout: default_shutdown_timeout(),
            quit_key: default_quit_key(),
        }
    }
}

/// Top-level configuration
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Root directory watched recursively for archives
    pub watch_root: PathBuf,

    /// File extensions that mark a directory as already processed (default: common video formats)
    ///
    /// Matched case-insensitively; a leading dot is accepted and ignored.
    #[serde(default = "default_media_extensions")]
    pub media_extensions: Vec<String>,

    /// Readiness detection settings
    #[serde(default)]
    pub readiness: ReadinessConfig,

    /// Concurrency and shutdown settings
    #[serde(default)]
    pub runtime: RuntimeConfig,
}

impl Config {
    /// Create a configuration for `watch_root` with every other setting at its default
    pub fn new(watch_root: impl Into<PathBuf>) -> Self {
        Self {
            watch_root: watch_root.into(),
            media_extensions: default_media_extensions(),
            readiness: ReadinessConfig::default(),
            runtime: RuntimeConfig::default(),
        }
    }

    /// Load a configuration from a JSON file
    ///
    /// The result is not validated; call [`Config::validate`] once any overrides are applied.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config = serde_json::from_str(&raw)?;
        Ok(config)
    }

    /// Check the configuration for values the watcher cannot work with
    ///
    /// Media extensions are normalized in place (leading dot stripped, lowercased).
    pub fn validate(&mut self) -> Result<()> {
        if self.watch_root.as_os_str().is_empty() {
            return Err(Error::config("watch_root", "watch_root must not be empty"));
        }

        let mut normalized = Vec::with_capacity(self.media_extensions.len());
        for ext in &self.media_extensions {
            let ext = ext.trim().trim_start_matches('.').to_ascii_lowercase();
            if ext.is_empty() {
                return Err(Error::config(
                    "media_extensions",
                    "media extensions must not be empty strings",
                ));
            }
            if !normalized.contains(&ext) {
                normalized.push(ext);
            }
        }
        self.media_extensions = normalized;

        let readiness = &self.readiness;
        if readiness.min_stable_samples > 0 && readiness.poll_interval.is_zero() {
            return Err(Error::config(
                "readiness.poll_interval",
                "poll_interval must be positive when size sampling is enabled",
            ));
        }
        if readiness.min_stable_samples > readiness.max_retries {
            return Err(Error::config(
                "readiness.min_stable_samples",
                format!(
                    "min_stable_samples ({}) cannot exceed max_retries ({})",
                    readiness.min_stable_samples, readiness.max_retries
                ),
            ));
        }

        if self.runtime.max_concurrent_extractions == 0 {
            return Err(Error::config(
                "runtime.max_concurrent_extractions",
                "at least one concurrent extraction is required",
            ));
        }
        if !self.runtime.quit_key.is_ascii() || self.runtime.quit_key.is_ascii_control() {
            return Err(Error::config(
                "runtime.quit_key",
                "quit_key must be a printable ASCII character",
            ));
        }

        Ok(())
    }
}

fn default_grace_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_max_retries() -> u32 {
    30
}

fn default_min_stable_samples() -> u32 {
    2
}

fn default_max_concurrent_extractions() -> usize {
    2
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_quit_key() -> char {
    'q'
}

fn default_media_extensions() -> Vec<String> {
    vec![
        "mp4".into(),
        "mkv".into(),
        "avi".into(),
        "flv".into(),
        "mov".into(),
        "wmv".into(),
    ]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}
