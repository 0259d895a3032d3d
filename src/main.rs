//! auto-unrar command line entry point
//!
//! Usage:
//!     auto-unrar [--config auto-unrar.json] [ROOT]

use auto_unrar::{Config, Driver, Error, FolderWatcher, RarExtractor, run_until_quit};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "auto-unrar",
    version,
    about = "Extracts RAR archives in a download folder once they are fully written"
)]
struct Args {
    /// JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to watch (overrides `watch_root` from the config file)
    root: Option<PathBuf>,
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn load_config(args: &Args) -> auto_unrar::Result<Config> {
    let mut config = match (&args.config, &args.root) {
        (Some(path), root) => {
            let mut config = Config::from_file(path)?;
            if let Some(root) = root {
                config.watch_root = root.clone();
            }
            config
        }
        (None, Some(root)) => Config::new(root.clone()),
        (None, None) => {
            return Err(Error::Config {
                message: "no watch root given; pass ROOT or --config".to_string(),
                key: Some("watch_root".to_string()),
            });
        }
    };
    config.validate()?;
    Ok(config)
}

async fn run(args: Args) -> auto_unrar::Result<()> {
    let config = load_config(&args)?;
    tracing::info!(
        root = %config.watch_root.display(),
        grace = ?config.readiness.grace_delay,
        poll_interval = ?config.readiness.poll_interval,
        max_retries = config.readiness.max_retries,
        max_wait = ?config.readiness.max_wait(),
        "Starting auto-unrar"
    );

    let driver = Driver::new(&config, Arc::new(RarExtractor::new()));
    let mut watcher = FolderWatcher::new(&config.watch_root)?;
    watcher.start()?;

    tracing::info!(
        "Monitoring {} for new .rar files. Press '{}' to exit.",
        watcher.root().display(),
        config.runtime.quit_key
    );

    run_until_quit(&driver, &mut watcher, config.runtime.quit_key).await?;
    watcher.stop();
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    init_logging();
    let args = Args::parse();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "auto-unrar failed");
            ExitCode::FAILURE
        }
    }
}
