//! Readiness detection for freshly written archives
//!
//! A download client usually creates the archive first and appends to it for a
//! while. Opening it too early either fails (the writer holds an exclusive lock)
//! or reads a truncated archive (the writer shares read access but keeps
//! appending). The gate therefore requires both conditions before it reports a
//! file as ready:
//!
//! 1. **Exclusivity**: the file can be opened and locked exclusively
//! 2. **Size stability**: the length stayed the same for a number of consecutive samples
//!
//! The sequence is: grace delay, exclusivity probe, bounded size sampling, and, if
//! the first probe failed, a second probe once the size has settled. For a
//! multi-volume archive both conditions cover every volume present at the time of
//! each observation. Nothing is
//! retried beyond that; a later filesystem event starts a fresh check.

mod probe;


pub use probe::{FileProbe, FsProbe};

use crate::config::ReadinessConfig;
use crate::error::Result;
use crate::types::{NotReadyReason, Readiness};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, trace};

/// Size-sampling progress for one readiness check
///
/// Created at the start of sampling and dropped when the check resolves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReadinessState {
    /// Byte length seen in the most recent sample
    pub last_observed_size: u64,
    /// Consecutive samples with an unchanged length
    pub stable_round_count: u32,
    /// Samples taken so far (the initial baseline reading is not counted)
    pub attempt: u32,
}

impl ReadinessState {
    /// Start sampling from a baseline size
    pub fn new(initial_size: u64) -> Self {
        Self {
            last_observed_size: initial_size,
            stable_round_count: 0,
            attempt: 0,
        }
    }

    /// Record one sample; returns `true` if the size was unchanged
    pub fn record(&mut self, size: u64) -> bool {
        self.attempt += 1;
        if size == self.last_observed_size {
            self.stable_round_count += 1;
            true
        } else {
            self.last_observed_size = size;
            self.stable_round_count = 0;
            false
        }
    }
}

/// Decides when an archive is safe to open
#[derive(Clone)]
pub struct ReadinessGate {
    config: ReadinessConfig,
    probe: Arc<dyn FileProbe>,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl ReadinessGate {
    /// Create a gate that observes the real filesystem
    pub fn new(config: ReadinessConfig) -> Self {
        Self::with_probe(config, Arc::new(FsProbe::new()))
    }

    /// Create a gate with a custom [`FileProbe`]
    pub fn with_probe(config: ReadinessConfig, probe: Arc<dyn FileProbe>) -> Self {
        Self { config, probe }
    }

    /// The settings this gate runs with
    pub fn config(&self) -> &ReadinessConfig {
        &self.config
    }

    /// Wait until `path` is ready or the sampling budget runs out
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be observed at all (removed, permission
    /// denied). A busy or growing file is not an error; it yields
    /// [`Readiness::NotReady`].
    pub async fn await_ready(&self, path: &Path) -> Result<Readiness> {
        trace!(
            ?path,
            grace = ?self.config.grace_delay,
            budget = ?self.config.max_wait(),
            "readiness grace period"
        );
        tokio::time::sleep(self.config.grace_delay).await;

        let first_probe = self.all_openable(path).await?;
        if !first_probe {
            debug!(?path, "archive is locked, waiting for its size to settle");
        }

        if let Some(reason) = self.wait_for_stable_size(path).await? {
            return Ok(Readiness::NotReady(reason));
        }

        if first_probe {
            return Ok(Readiness::Ready);
        }

        if self.all_openable(path).await? {
            debug!(?path, "archive lock released");
            Ok(Readiness::Ready)
        } else {
            Ok(Readiness::NotReady(NotReadyReason::InUse))
        }
    }

    /// Sample the size until it is stable; `Some(reason)` if the budget ran out
    async fn wait_for_stable_size(&self, path: &Path) -> Result<Option<NotReadyReason>> {
        let required = self.config.min_stable_samples;
        if required == 0 {
            return Ok(None);
        }

        let mut state = ReadinessState::new(self.observed_size(path).await?);

        while state.stable_round_count < required {
            if state.attempt >= self.config.max_retries {
                debug!(
                    ?path,
                    attempts = state.attempt,
                    size = state.last_observed_size,
                    "archive size did not settle within the sampling budget"
                );
                return Ok(Some(NotReadyReason::StillWriting {
                    attempts: state.attempt,
                }));
            }

            tokio::time::sleep(self.config.poll_interval).await;
            let size = self.observed_size(path).await?;
            let stable = state.record(size);
            trace!(
                ?path,
                attempt = state.attempt,
                size,
                stable,
                stable_rounds = state.stable_round_count,
                "size sample"
            );
        }

        Ok(None)
    }

    /// Exclusivity of `path` and every companion that still exists
    async fn all_openable(&self, path: &Path) -> Result<bool> {
        if !self.probe.is_exclusively_openable(path).await? {
            return Ok(false);
        }
        for companion in self.probe.companions(path).await? {
            match self.probe.is_exclusively_openable(&companion).await {
                Ok(true) => {}
                Ok(false) => {
                    debug!(?path, ?companion, "companion volume is locked");
                    return Ok(false);
                }
                Err(e) => trace!(?companion, error = %e, "companion vanished during probe"),
            }
        }
        Ok(true)
    }

    /// Combined length of `path` and its companions
    ///
    /// A new volume showing up counts as growth, so a set still being downloaded
    /// does not look stable.
    async fn observed_size(&self, path: &Path) -> Result<u64> {
        let mut total = self.probe.size(path).await?;
        for companion in self.probe.companions(path).await? {
            match self.probe.size(&companion).await {
                Ok(size) => total = total.saturating_add(size),
                Err(e) => trace!(?companion, error = %e, "companion vanished during sampling"),
            }
        }
        Ok(total)
    }
}
