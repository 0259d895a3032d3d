//! Dispatch of watcher triggers to orchestration tasks, and graceful shutdown.

use crate::config::Config;
use crate::error::Result;
use crate::extraction::{ArchiveExtractor, RarVolume};
use crate::folder_watcher::FolderWatcher;
use crate::orchestrator::ExtractionOrchestrator;
use crate::readiness::FileProbe;
use crate::types::{Event, Trigger};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

/// Feeds triggers into the orchestrator, one tracked task per trigger
#[derive(Debug)]
pub struct Driver {
    orchestrator: Arc<ExtractionOrchestrator>,
    tracker: TaskTracker,
    shutdown_timeout: Duration,
}

impl Driver {
    /// Create a driver that extracts with `extractor` and probes the real filesystem
    pub fn new(config: &Config, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self::from_orchestrator(
            config,
            Arc::new(ExtractionOrchestrator::new(config, extractor)),
        )
    }

    /// Create a driver whose readiness gate uses a custom [`FileProbe`]
    pub fn with_probe(
        config: &Config,
        extractor: Arc<dyn ArchiveExtractor>,
        probe: Arc<dyn FileProbe>,
    ) -> Self {
        Self::from_orchestrator(
            config,
            Arc::new(ExtractionOrchestrator::with_probe(config, extractor, probe)),
        )
    }

    fn from_orchestrator(config: &Config, orchestrator: Arc<ExtractionOrchestrator>) -> Self {
        Self {
            orchestrator,
            tracker: TaskTracker::new(),
            shutdown_timeout: config.runtime.shutdown_timeout,
        }
    }

    /// The orchestrator handling dispatched triggers
    pub fn orchestrator(&self) -> &Arc<ExtractionOrchestrator> {
        &self.orchestrator
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.orchestrator.subscribe()
    }

    /// Number of dispatched tasks that have not finished yet
    pub fn active_tasks(&self) -> usize {
        self.tracker.len()
    }

    /// Spawn a task for the RAR archive `trigger` belongs to
    ///
    /// A later volume (`.part03.rar`, `.r02`) stands for its set: the task is run
    /// for the first volume, as long as that one exists. This is how a set whose
    /// tail arrived after a failed attempt gets extracted. Non-archive files are
    /// dropped. Returns whether a task was spawned. Duplicates are not filtered
    /// here; the orchestrator's admission check handles those.
    pub fn dispatch(&self, trigger: Trigger) -> bool {
        if self.orchestrator.cancel_token().is_cancelled() {
            debug!(path = ?trigger.path, "shutting down, trigger dropped");
            return false;
        }
        let Some(volume) = RarVolume::parse(&trigger.path) else {
            trace!(path = ?trigger.path, kind = ?trigger.kind, "not a RAR archive, ignoring");
            return false;
        };

        let trigger = if volume.is_first() {
            trigger
        } else {
            let first = volume.first_volume();
            if !first.exists() {
                trace!(path = ?trigger.path, ?first, "first volume not present yet, ignoring");
                return false;
            }
            debug!(volume = ?trigger.path, ?first, "volume changed, re-evaluating its set");
            Trigger {
                path: first,
                kind: trigger.kind,
            }
        };

        let orchestrator = self.orchestrator.clone();
        self.tracker.spawn(async move {
            orchestrator.handle_trigger(&trigger).await;
        });
        true
    }

    /// Dispatch triggers from `watcher` until it closes or shutdown is requested
    pub async fn run(&self, watcher: &mut FolderWatcher) {
        info!(root = ?watcher.root(), "Archive watcher started");
        let cancel_token = self.orchestrator.cancel_token().clone();

        loop {
            tokio::select! {
                _ = cancel_token.cancelled() => break,
                next = watcher.recv() => match next {
                    Some(trigger) => {
                        self.dispatch(trigger);
                    }
                    None => break,
                },
            }
        }

        info!("Archive watcher stopped");
    }

    /// Gracefully shut down
    ///
    /// 1. Broadcasts [`Event::Shutdown`] and stops accepting triggers
    /// 2. Cancels tasks still waiting on readiness or an extraction slot
    /// 3. Waits for running extractions, up to the configured timeout
    ///
    /// Extractions that outlive the timeout are left to finish on their own; their
    /// output is overwritten from the archive on the next run.
    pub async fn shutdown(&self) -> Result<()> {
        info!("Initiating graceful shutdown");
        self.orchestrator.emit(Event::Shutdown);
        self.orchestrator.cancel_token().cancel();
        self.tracker.close();

        let pending = self.tracker.len();
        if pending > 0 {
            debug!(pending, "Waiting for in-flight archives");
        }

        match tokio::time::timeout(self.shutdown_timeout, self.tracker.wait()).await {
            Ok(()) => info!("All in-flight archives finished"),
            Err(_) => warn!(
                remaining = self.tracker.len(),
                "Timeout waiting for extractions to complete, proceeding with shutdown"
            ),
        }

        info!("Graceful shutdown complete");
        Ok(())
    }
}
