//! # auto-unrar
//!
//! Watches a download folder and extracts RAR archives in place once they are
//! completely written.
//!
//! ## How it works
//!
//! - A [`FolderWatcher`] reports existing archives at startup and every create or
//!   modify event below the watched root afterwards
//! - The [`Driver`] spawns one tracked task per archive trigger
//! - The [`ExtractionOrchestrator`] drops duplicate triggers, skips directories that
//!   already contain media, waits on the [`ReadinessGate`] and finally extracts
//!
//! ## Quick Start
//!
//! ```no_run
//! use auto_unrar::{Config, Driver, FolderWatcher, RarExtractor, run_until_quit};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut config = Config::new("/srv/downloads");
//!     config.validate()?;
//!
//!     let driver = Driver::new(&config, Arc::new(RarExtractor::new()));
//!     let mut watcher = FolderWatcher::new(&config.watch_root)?;
//!     watcher.start()?;
//!
//!     run_until_quit(&driver, &mut watcher, config.runtime.quit_key).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Configuration types
pub mod config;
/// Trigger dispatch and shutdown
pub mod driver;
/// Error types
pub mod error;
/// Archive extraction
pub mod extraction;
/// Folder watching for incoming archives
pub mod folder_watcher;
/// Per-archive orchestration and duplicate suppression
pub mod orchestrator;
/// Readiness detection (exclusivity and size stability)
pub mod readiness;
/// Already-processed directory detection
pub mod skip_policy;
/// Core types and events
pub mod types;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use config::{Config, ReadinessConfig, RuntimeConfig};
pub use driver::Driver;
pub use error::{Error, ExtractionError, Result};
pub use extraction::{ArchiveExtractor, RarExtractor};
pub use folder_watcher::FolderWatcher;
pub use orchestrator::{ExtractionOrchestrator, InFlightSet};
pub use readiness::{FileProbe, FsProbe, ReadinessGate, ReadinessState};
pub use skip_policy::SkipPolicy;
pub use types::{
    Event, ExtractionOutcome, NotReadyReason, Readiness, SkipReason, Trigger, TriggerKind,
};

use std::io::Read;
use tokio::sync::oneshot;

/// Run the driver until the quit key is pressed or a termination signal arrives,
/// then shut down gracefully.
///
/// - Stdin is read on its own thread; the process stops when `quit_key` is read.
///   If stdin is closed (e.g. running as a service) only signals stop it. A read
///   still blocked at exit never delays the runtime shutdown.
/// - **Unix:** listens for SIGTERM and SIGINT.
/// - **Windows/other:** listens for Ctrl+C.
pub async fn run_until_quit(
    driver: &Driver,
    watcher: &mut FolderWatcher,
    quit_key: char,
) -> Result<()> {
    let listener = spawn_quit_listener(std::io::stdin(), quit_key);
    let quit = async move {
        if listener.await.unwrap_or(false) {
            tracing::info!(%quit_key, "Quit key pressed");
        } else {
            tracing::debug!("stdin closed, waiting for a signal instead");
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        _ = driver.run(watcher) => {}
        _ = quit => {}
        _ = wait_for_signal() => {}
    }

    driver.shutdown().await
}

/// Watch `reader` for `quit_key` on a dedicated thread
///
/// The receiver yields `true` once the key is read and `false` on end of input.
/// It errors if the thread could not be started. The thread is detached, so a
/// blocking read never holds up process exit.
pub fn spawn_quit_listener<R>(reader: R, quit_key: char) -> oneshot::Receiver<bool>
where
    R: Read + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    let spawned = std::thread::Builder::new()
        .name("quit-key".to_string())
        .spawn(move || {
            tx.send(wait_for_quit_key(reader, quit_key)).ok();
        });
    if let Err(e) = spawned {
        tracing::warn!(error = %e, "Failed to start quit key listener");
    }
    rx
}

/// Read `reader` until `quit_key` shows up
///
/// Returns `true` when the key was read, `false` on end of input or a read error.
/// Non-ASCII keys can never match.
pub fn wait_for_quit_key<R: Read>(reader: R, quit_key: char) -> bool {
    if !quit_key.is_ascii() {
        return false;
    }
    let key = quit_key as u8;

    for byte in reader.bytes() {
        match byte {
            Ok(b) if b == key => return true,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read from stdin");
                return false;
            }
        }
    }
    false
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{Signal, SignalKind, signal};

    async fn next(stream: &mut Option<Signal>) -> Option<()> {
        match stream {
            Some(stream) => stream.recv().await,
            None => std::future::pending().await,
        }
    }

    let mut streams = [SignalKind::terminate(), SignalKind::interrupt()].map(|kind| {
        signal(kind)
            .map_err(|e| tracing::warn!(error = %e, ?kind, "Could not register signal handler"))
            .ok()
    });

    if streams.iter().all(Option::is_none) {
        // Restricted environments (some containers) refuse both handlers
        tracing::error!("No signal handlers available, falling back to ctrl_c");
        tokio::signal::ctrl_c().await.ok();
        return;
    }

    let [terminate, interrupt] = &mut streams;
    let name = tokio::select! {
        Some(()) = next(terminate) => "SIGTERM",
        Some(()) = next(interrupt) => "SIGINT",
        else => "closed signal stream",
    };
    tracing::info!(signal = name, "Received termination signal");
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl+C, relying on the quit key");
        std::future::pending::<()>().await;
    }
    tracing::info!("Received Ctrl+C");
}
