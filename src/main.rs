//! sleepchecker-idled - Systemd user daemon that signals screen dimming over `DBus`.
//!
//! Watches desktop idle/activity signals and emits
//! `org.sleepchecker.IdleNotifier.screenDimmed(bool)` whenever the user goes
//! idle or comes back.

use anyhow::{Context, Result};
use clap::Parser;
use sleepchecker_idled::config::Config;
use sleepchecker_idled::monitor::Monitor;
use sleepchecker_idled::notify::{
    DbusNotifier, INTERFACE, LogNotifier, Notifier, SIGNAL, StdoutNotifier,
};
use sleepchecker_idled::source::{self, HyprlandSource};
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

/// Idle watcher for the sleep checker face-detection service.
///
/// Emits screenDimmed(true) when the desktop goes idle and
/// screenDimmed(false) when the user is back.
#[derive(Parser, Debug)]
#[command(name = "sleepchecker-idled")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable dry-run mode (log notifications instead of emitting them).
    #[arg(long)]
    dry_run: bool,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print each notification as a JSON line to stdout.
    #[arg(long)]
    print_events: bool,

    /// Probe every event source, print which are available, then exit.
    #[arg(long)]
    list_sources: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&args.log_level)?;

    info!("sleepchecker-idled v{} starting", env!("CARGO_PKG_VERSION"));

    let mut config =
        Config::load_or_default(args.config.as_deref()).context("Failed to load configuration")?;

    if args.dry_run {
        config.dry_run = true;
    }

    info!("Configuration loaded (dry_run={})", config.dry_run);

    if args.list_sources {
        return list_sources(&config).await;
    }

    run_daemon(config, args.print_events).await
}

/// Initialize logging with the specified level.
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(format!("sleepchecker_idled={level}"))
        .or_else(|_| EnvFilter::try_new("info"))
        .context("Invalid log level")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

/// Probe all sources and print their availability.
async fn list_sources(config: &Config) -> Result<()> {
    for diag in HyprlandSource::get_diagnostics() {
        debug!("{}", diag);
    }

    let (enabled, disabled): (Vec<_>, Vec<_>) = source::all_sources(config)
        .into_iter()
        .partition(|s| config.is_source_enabled(s.name()));

    for (name, available) in source::probe_all(enabled).await {
        let status = if available { "available" } else { "unavailable" };
        println!("{name}: {status}");
    }

    for source in disabled {
        println!("{}: disabled", source.name());
    }

    Ok(())
}

/// Build the notifier chain from config and flags.
async fn build_notifier(config: &Config, print_events: bool) -> Result<Vec<Box<dyn Notifier>>> {
    let mut notifiers: Vec<Box<dyn Notifier>> = Vec::new();

    if config.dry_run {
        notifiers.push(Box::new(LogNotifier));
    } else {
        let dbus = DbusNotifier::connect(config.bus)
            .await
            .context("Failed to initialize DBus notifier")?;
        notifiers.push(Box::new(dbus));
    }

    if print_events {
        notifiers.push(Box::new(StdoutNotifier));
    }

    Ok(notifiers)
}

/// Run daemon event loop.
async fn run_daemon(config: Config, print_events: bool) -> Result<()> {
    let notifier = build_notifier(&config, print_events).await?;
    let mut monitor = Monitor::new(notifier);

    let (events_tx, mut events_rx) = mpsc::channel(64);
    let cancel = CancellationToken::new();

    let subscriptions =
        source::subscribe_all(source::enabled_sources(&config), &events_tx, &cancel).await;

    info!(
        "Daemon started with {} source(s), signal -> {}.{}",
        subscriptions.len(),
        INTERFACE,
        SIGNAL
    );

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            // Sources hold senders and so does this loop, so recv only
            // yields None if the channel is torn down.
            event = events_rx.recv() => {
                let Some(event) = event else { break };
                monitor.handle(&event);
            }

            () = &mut shutdown => {
                info!("Shutdown requested");
                break;
            }
        }
    }

    cancel.cancel();
    for subscription in subscriptions {
        if let Err(e) = subscription.handle.await {
            warn!("Source '{}' did not stop cleanly: {}", subscription.name, e);
        }
    }

    info!("Stopped (dimmed={})", monitor.is_dimmed());
    Ok(())
}

/// Wait for SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
