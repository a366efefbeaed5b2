//! cadence-run - Background daemon for automated generation and publishing
//!
//! Polls the database at regular intervals and runs the same scans the cron
//! endpoints expose: due pipelines, due posts (with image backfill), and
//! failed-post retries. Useful where no external scheduler is available.

use clap::Parser;
use libcadence::ai::{build_content_generator, build_image_generator};
use libcadence::platforms::AdapterRegistry;
use libcadence::publisher::{PublishOptions, Publisher};
use libcadence::runner::PipelineRunner;
use libcadence::storage::LocalImageStore;
use libcadence::{Config, Database, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::time::{sleep, Duration};
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "cadence-run")]
#[command(version)]
#[command(about = "Background daemon for automated content generation and publishing")]
#[command(long_about = "\
cadence-run - Background daemon for automated generation and publishing

DESCRIPTION:
    cadence-run is a long-running daemon that scans active pipelines and the
    publishing queue on a fixed interval. Each tick it generates content for
    due pipelines, backfills missing images, publishes due posts, and
    reattempts recent failures.

USAGE:
    # Run in foreground (logs to stderr)
    cadence-run

    # Run with custom poll interval
    cadence-run --poll-interval 30

SIGNALS:
    SIGTERM, SIGINT - Graceful shutdown (finishes the current tick)

CONFIGURATION:
    Configuration file: ~/.config/cadence/config.toml (or CADENCE_CONFIG)
    Database location:  ~/.local/share/cadence/cadence.db

EXIT CODES:
    0 - Clean shutdown
    1 - Runtime error
    2 - Configuration error
")]
struct Cli {
    /// Poll interval in seconds
    #[arg(long, value_name = "SECONDS", default_value_t = 60)]
    poll_interval: u64,

    /// Enable verbose logging to stderr
    #[arg(short, long)]
    verbose: bool,

    /// Run one tick and exit (for testing)
    #[arg(long, hide = true)]
    once: bool,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli).await {
        error!("cadence-run: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let db = Database::new(&config.database.path).await?;
    let http = reqwest::Client::new();

    let runner = PipelineRunner::new(db.clone(), build_content_generator(&config.ai)?);
    let publisher = Publisher::new(
        db.clone(),
        AdapterRegistry::standard(http, db.clone(), &config.twitter),
        build_image_generator(&config.ai)?,
        Box::new(LocalImageStore::from_config(&config.images)),
        PublishOptions::from(&config.publishing),
    );

    info!("cadence-run daemon starting");

    let shutdown = Arc::new(AtomicBool::new(false));
    setup_signal_handlers(shutdown.clone());

    if cli.once {
        tick(&runner, &publisher).await;
        info!("cadence-run: ran one tick, exiting");
        return Ok(());
    }

    info!("Poll interval: {}s", cli.poll_interval);

    loop {
        if shutdown.load(Ordering::Relaxed) {
            info!("Shutdown requested, stopping daemon loop");
            break;
        }

        tick(&runner, &publisher).await;

        // Sleep until next poll, checking for shutdown every second.
        for _ in 0..cli.poll_interval {
            if shutdown.load(Ordering::Relaxed) {
                break;
            }
            sleep(Duration::from_secs(1)).await;
        }
    }

    info!("cadence-run daemon stopped");
    Ok(())
}

/// One scan tick: generation, publishing, retries. Scan errors are logged,
/// never fatal to the daemon.
async fn tick(runner: &PipelineRunner, publisher: &Publisher) {
    let now = chrono::Utc::now().timestamp();

    match runner.run_due_pipelines(now).await {
        Ok(report) if report.processed > 0 => {
            info!(
                processed = report.processed,
                total_active = report.total_active,
                "pipelines processed"
            );
        }
        Ok(_) => {}
        Err(e) => error!("pipeline scan failed: {}", e),
    }

    match publisher.run_due_publishing(now).await {
        Ok(report) if report.processed > 0 || report.backfilled_images > 0 => {
            info!(
                processed = report.processed,
                backfilled = report.backfilled_images,
                "posts published"
            );
        }
        Ok(_) => {}
        Err(e) => error!("publish scan failed: {}", e),
    }

    match publisher.run_retries(now).await {
        Ok(report) if report.processed > 0 => {
            info!(processed = report.processed, "failed posts retried");
        }
        Ok(_) => {}
        Err(e) => error!("retry scan failed: {}", e),
    }
}

/// Initialize logging based on verbosity level
fn init_logging(verbose: bool) {
    use libcadence::logging::{LogFormat, LoggingConfig};

    let format = std::env::var("CADENCE_LOG_FORMAT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(LogFormat::Text);
    let level = std::env::var("CADENCE_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

    LoggingConfig::new(format, level, verbose).init();
}

/// Set up signal handlers for graceful shutdown
#[cfg(unix)]
fn setup_signal_handlers(shutdown: Arc<AtomicBool>) {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = match Signals::new([SIGINT, SIGTERM]) {
        Ok(signals) => signals,
        Err(e) => {
            error!("Signal setup failed: {}", e);
            return;
        }
    };

    std::thread::spawn(move || {
        for sig in signals.forever() {
            match sig {
                SIGTERM | SIGINT => {
                    info!("Received shutdown signal, stopping gracefully...");
                    shutdown.store(true, Ordering::Relaxed);
                    break;
                }
                _ => {}
            }
        }
    });
}

#[cfg(not(unix))]
fn setup_signal_handlers(_shutdown: Arc<AtomicBool>) {}
