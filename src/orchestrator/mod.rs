//! Per-archive orchestration: skip check, readiness, extraction
//!
//! [`ExtractionOrchestrator::handle`] is called once per filesystem trigger. A
//! download client typically produces a burst of create and modify events for the
//! same archive, so the first step is always admission into the [`InFlightSet`]:
//! a trigger for a path that already has a running task is dropped on the spot.
//!
//! Every admitted path ends in exactly one [`ExtractionOutcome`], which is logged
//! and broadcast as [`Event::Finished`]. Failures stay inside the task; nothing
//! here retries on its own, a later trigger simply starts the sequence again.

mod in_flight;


pub use in_flight::{InFlightGuard, InFlightSet};

use crate::config::Config;
use crate::extraction::ArchiveExtractor;
use crate::readiness::{FileProbe, FsProbe, ReadinessGate};
use crate::skip_policy::SkipPolicy;
use crate::types::{Event, ExtractionOutcome, Readiness, SkipReason, Trigger, TriggerKind};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::spawn_blocking;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Sequences skip policy, readiness gate and extraction for single archive paths
pub struct ExtractionOrchestrator {
    skip_policy: Arc<SkipPolicy>,
    gate: ReadinessGate,
    extractor: Arc<dyn ArchiveExtractor>,
    in_flight: InFlightSet,
    /// Bounds concurrent extractor calls; readiness waits are not limited
    extraction_slots: Semaphore,
    event_tx: broadcast::Sender<Event>,
    cancel_token: CancellationToken,
}

impl std::fmt::Debug for ExtractionOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtractionOrchestrator")
            .field("extractor", &self.extractor.name())
            .field("in_flight", &self.in_flight.len())
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl ExtractionOrchestrator {
    /// Create an orchestrator that observes the real filesystem
    pub fn new(config: &Config, extractor: Arc<dyn ArchiveExtractor>) -> Self {
        Self::with_probe(config, extractor, Arc::new(FsProbe::new()))
    }

    /// Create an orchestrator with a custom [`FileProbe`] for the readiness gate
    pub fn with_probe(
        config: &Config,
        extractor: Arc<dyn ArchiveExtractor>,
        probe: Arc<dyn FileProbe>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1024);
        Self {
            skip_policy: Arc::new(SkipPolicy::new(&config.media_extensions)),
            gate: ReadinessGate::with_probe(config.readiness.clone(), probe),
            extractor,
            in_flight: InFlightSet::new(),
            extraction_slots: Semaphore::new(config.runtime.max_concurrent_extractions.max(1)),
            event_tx,
            cancel_token: CancellationToken::new(),
        }
    }

    /// Subscribe to pipeline events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Registry of paths with a running task
    pub fn in_flight(&self) -> &InFlightSet {
        &self.in_flight
    }

    /// Token that abandons waiting tasks when cancelled
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel_token
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Handle one trigger for `path`
    ///
    /// Returns `None` when another task already owns `path` (duplicate trigger),
    /// otherwise the terminal outcome of this run.
    pub async fn handle(&self, path: &Path) -> Option<ExtractionOutcome> {
        self.handle_trigger(&Trigger::created(path)).await
    }

    /// Same as [`handle`](Self::handle) but keeps the trigger kind for events and logs
    pub async fn handle_trigger(&self, trigger: &Trigger) -> Option<ExtractionOutcome> {
        let Some(guard) = self.in_flight.try_admit(&trigger.path) else {
            debug!(path = ?trigger.path, kind = ?trigger.kind, "archive already in flight, ignoring trigger");
            return None;
        };
        let path = guard.path().to_path_buf();

        self.emit(Event::TriggerReceived {
            path: path.clone(),
            kind: trigger.kind,
        });
        if trigger.kind == TriggerKind::Modified {
            debug!(?path, "archive modified, re-evaluating");
        }

        let outcome = self.run(&path).await;
        log_outcome(&path, &outcome);

        // Released before `Finished` so a subscriber may re-trigger the path right away
        drop(guard);
        self.emit(Event::Finished {
            path,
            outcome: outcome.clone(),
        });

        Some(outcome)
    }

    /// Media search on the blocking pool; a failed walk never skips
    async fn find_marker(&self, directory: &Path) -> Option<PathBuf> {
        let policy = Arc::clone(&self.skip_policy);
        let directory = directory.to_path_buf();
        match spawn_blocking(move || policy.find_marker(&directory)).await {
            Ok(marker) => marker,
            Err(e) => {
                warn!(error = %e, "media search task failed, not skipping");
                None
            }
        }
    }

    /// The linear per-path sequence; every return is a terminal outcome
    async fn run(&self, path: &Path) -> ExtractionOutcome {
        let Some(directory) = path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return ExtractionOutcome::FailedOther {
                detail: "archive has no parent directory".to_string(),
            };
        };

        if let Some(marker) = self.find_marker(directory).await {
            return ExtractionOutcome::Skipped {
                reason: SkipReason::AlreadyHasMedia { marker },
            };
        }

        self.emit(Event::ReadinessCheck {
            path: path.to_path_buf(),
        });
        let readiness = tokio::select! {
            _ = self.cancel_token.cancelled() => return ExtractionOutcome::Abandoned,
            result = self.gate.await_ready(path) => result,
        };
        match readiness {
            Ok(Readiness::Ready) => {}
            Ok(Readiness::NotReady(reason)) => return ExtractionOutcome::FailedInUse { reason },
            Err(e) => {
                return ExtractionOutcome::FailedOther {
                    detail: e.to_string(),
                };
            }
        }

        let _permit = tokio::select! {
            _ = self.cancel_token.cancelled() => return ExtractionOutcome::Abandoned,
            permit = self.extraction_slots.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => return ExtractionOutcome::Abandoned,
            },
        };

        self.emit(Event::ExtractionStarted {
            path: path.to_path_buf(),
            destination: directory.to_path_buf(),
        });
        info!(?path, extractor = self.extractor.name(), "extracting archive");

        match self.extractor.extract(path, directory).await {
            Ok(files) => ExtractionOutcome::Succeeded {
                entries: files.len(),
            },
            Err(e) => ExtractionOutcome::FailedOther {
                detail: e.to_string(),
            },
        }
    }
}

fn log_outcome(path: &Path, outcome: &ExtractionOutcome) {
    match outcome {
        ExtractionOutcome::Succeeded { entries } => {
            info!(?path, entries, "Successfully extracted archive");
        }
        ExtractionOutcome::Skipped { reason } => {
            info!(?path, %reason, "Skipping archive, directory already processed");
        }
        ExtractionOutcome::FailedInUse { reason } => {
            warn!(?path, %reason, "Skipping extraction, archive is not ready");
        }
        ExtractionOutcome::FailedOther { detail } => {
            warn!(?path, error = %detail, "Failed to extract archive");
        }
        ExtractionOutcome::Abandoned => {
            info!(?path, "Abandoned archive during shutdown");
        }
    }
}
