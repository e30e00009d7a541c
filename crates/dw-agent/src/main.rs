//! Daemon entry point for the driftwatch agent.
//!
//! Watches a directory tree, condenses filesystem events into net-effect
//! change records, and serves them to a scanner over a JSON snapshot API.
//!
//! # Usage
//!
//! ```bash
//! # Watch /srv/data with defaults (port 8080, up to 10000 tracked paths)
//! driftwatch /srv/data
//!
//! # Smaller budget, custom port, ignore VCS noise
//! driftwatch /srv/data --limit 2000 --port 9090 --ignore .git --ignore target
//! ```

#![deny(clippy::all)]
#![warn(missing_docs)]

mod server;

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::Parser;
use dw_core::Config;
use dw_tracker::ChangeTracker;
use dw_watcher::{FsWatcher, IgnorePatternFilter, WatchError, WatchUpdate};
use std::time::Duration;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// =============================================================================
// CLI ARGUMENT TYPES
// =============================================================================

/// Filesystem change-tracking agent with a paginated snapshot API.
#[derive(Parser)]
#[command(name = "driftwatch", version, about, long_about = None)]
struct Cli {
    /// Directory to watch.
    #[arg(env = "DRIFTWATCH_PATH", default_value = ".")]
    path: Utf8PathBuf,

    /// Optional JSON configuration file; flags below override its values.
    #[arg(long, env = "DRIFTWATCH_CONFIG")]
    config: Option<Utf8PathBuf>,

    /// Maximum number of tracked paths before overflow [default: 10000].
    #[arg(long, env = "DRIFTWATCH_LIMIT")]
    limit: Option<usize>,

    /// Default page size for snapshot pages [default: 256].
    #[arg(long)]
    page_size: Option<usize>,

    /// Default TTL for self-change suppressions, in seconds [default: 30].
    #[arg(long)]
    ttl_secs: Option<u64>,

    /// Seconds after which an unacknowledged snapshot generation is
    /// presumed orphaned and auto-abandoned [default: 300].
    #[arg(long)]
    snapshot_timeout_secs: Option<u64>,

    /// Address to bind the HTTP server to [default: 0.0.0.0].
    #[arg(long, env = "DRIFTWATCH_BIND")]
    bind: Option<String>,

    /// Port for the HTTP server [default: 8080].
    #[arg(long, env = "DRIFTWATCH_PORT")]
    port: Option<u16>,

    /// Watch only the top-level directory, not subdirectories.
    #[arg(long)]
    no_recursive: bool,

    /// Substring patterns for paths to ignore (repeatable).
    #[arg(long = "ignore")]
    ignore: Vec<String>,

    /// Enable verbose logging (debug level).
    #[arg(short, long)]
    verbose: bool,

    /// Disable colored output.
    #[arg(long)]
    no_color: bool,
}

// =============================================================================
// INITIALIZATION
// =============================================================================

/// Initializes the tracing subscriber for logging.
///
/// Respects the `RUST_LOG` environment variable if set. Otherwise, uses
/// `debug` level if `--verbose` is set, or `info` level by default.
/// Noisy crates like `hyper` and `mio` are filtered to `warn` level.
fn init_tracing(verbose: bool, no_color: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { "info" };
        EnvFilter::new(format!("{level},hyper=warn,mio=warn,notify=warn"))
    });

    let use_ansi = !no_color && std::env::var("NO_COLOR").is_err();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_ansi(use_ansi))
        .with(filter)
        .init();
}

/// Builds a validated [`Config`]: the config file (if any) as the base,
/// with explicit CLI flags layered on top.
fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    if !cli.path.exists() {
        anyhow::bail!("path does not exist: {}", cli.path);
    }
    if !cli.path.is_dir() {
        anyhow::bail!("path is not a directory: {}", cli.path);
    }

    let mut config = match &cli.config {
        Some(path) => Config::from_json_file(path)
            .with_context(|| format!("failed to load config file {path}"))?,
        None => Config::default(),
    };

    if let Some(limit) = cli.limit {
        config.tracker.max_tracked_files = limit;
    }
    if let Some(page_size) = cli.page_size {
        config.tracker.page_size = page_size;
    }
    if let Some(ttl_secs) = cli.ttl_secs {
        config.tracker.self_change_default_ttl_secs = ttl_secs;
    }
    if let Some(timeout) = cli.snapshot_timeout_secs {
        config.tracker.snapshot_timeout_secs = timeout;
    }
    if let Some(bind) = &cli.bind {
        config.server.bind_addr.clone_from(bind);
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    if cli.no_recursive {
        config.watch.recursive = false;
    }

    config.validate().context("invalid configuration")?;
    Ok(config)
}

// =============================================================================
// BACKGROUND TASKS
// =============================================================================

/// Pumps watcher updates into the tracker until the stream ends, then
/// folds the watcher task's terminal result into the tracker.
///
/// The stream ending is not always benign: the watch can fail after
/// startup (permissions revoked, inotify watch limit hit), in which case
/// events stop flowing while the HTTP server keeps answering. The tracker
/// must be told, or every snapshot served from then on is silently
/// incomplete.
async fn run_event_pump(mut watcher: FsWatcher, tracker: ChangeTracker) {
    while let Some(update) = watcher.recv().await {
        match update {
            WatchUpdate::Event(event) => tracker.record(event),
            WatchUpdate::Lagged => {
                warn!("watcher lagged; forcing overflow");
                tracker.force_overflow();
            }
        }
    }
    handle_watcher_exit(watcher.shutdown().await, &tracker);
}

/// Handles the watcher task's terminal result.
///
/// Any error means changes may have gone unobserved, so the tracker is
/// forced into overflow and the consumer learns its delta is stale.
fn handle_watcher_exit(result: Result<(), WatchError>, tracker: &ChangeTracker) {
    match result {
        Ok(()) => info!("watcher stream ended"),
        Err(watch_error) if watch_error.is_fatal() => {
            error!(error = %watch_error, "watcher failed; marking tracked changes untrustworthy");
            tracker.force_overflow();
        }
        Err(watch_error) => {
            warn!(error = %watch_error, "watcher stopped after recoverable error");
            tracker.force_overflow();
        }
    }
}

/// Periodically sweeps expired self-change suppressions.
async fn run_sweeper(tracker: ChangeTracker, period: Duration) {
    let mut ticker = tokio::time::interval(period);
    loop {
        ticker.tick().await;
        let removed = tracker.sweep_self_changes();
        if removed > 0 {
            debug!(removed, "swept expired self-change entries");
        }
    }
}

/// Resolves when the process receives ctrl-c (or SIGTERM on Unix).
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = match signal(SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(error) => {
                warn!(error = %error, "failed to install SIGTERM handler");
                let _ = tokio::signal::ctrl_c().await;
                return;
            }
        };

        tokio::select! {
            _ = tokio::signal::ctrl_c() => info!("received ctrl-c, shutting down"),
            _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("received ctrl-c, shutting down");
    }
}

// =============================================================================
// MAIN ENTRY POINT
// =============================================================================

/// Application entry point.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.no_color);

    let config = build_config(&cli)?;
    let tracker = ChangeTracker::new(config.tracker).context("failed to create tracker")?;

    let filter = IgnorePatternFilter::from_owned(cli.ignore.clone());
    let watcher = FsWatcher::new(&cli.path, &config.watch, filter)
        .await
        .with_context(|| format!("failed to watch {}", cli.path))?;

    info!(
        path = %watcher.watch_path(),
        limit = config.tracker.max_tracked_files,
        "driftwatch agent starting"
    );

    tokio::spawn(run_event_pump(watcher, tracker.clone()));
    tokio::spawn(run_sweeper(
        tracker.clone(),
        Duration::from_secs(config.tracker.self_change_default_ttl_secs.max(1)),
    ));

    let app = server::router(tracker);
    let addr = config.server.address();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;

    info!(addr = %addr, "serving snapshot API");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    Ok(())
}
