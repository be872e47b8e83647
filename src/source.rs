//! Host event sources.
//!
//! Each source binds one family of desktop signals (display power, screen
//! lock, compositor IPC, ...) and translates them into classified [`Event`]s.
//! Sources are optional: they are probed once at startup and only the ones
//! present on this host are subscribed.

mod display_power;
mod hyprland;
mod logind;
mod screensaver;
mod wayland_idle;

use crate::config::Config;
use crate::domain::Event;
use async_trait::async_trait;
pub use display_power::DisplayPowerSource;
pub use hyprland::HyprlandSource;
pub use logind::LogindSource;
pub use screensaver::ScreenSaverSource;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
pub use wayland_idle::WaylandIdleSource;

/// Channel feeding events to the monitor.
pub type EventSender = mpsc::Sender<Event>;

/// Names of all known sources, in priority order.
pub const SOURCE_NAMES: &[&str] = &[
    DisplayPowerSource::NAME,
    WaylandIdleSource::NAME,
    ScreenSaverSource::NAME,
    LogindSource::NAME,
    HyprlandSource::NAME,
];

/// Trait for optional host event sources.
#[async_trait]
pub trait EventSource: Send {
    /// Stable name used in config and logs.
    fn name(&self) -> &'static str;

    /// Check whether this host provides the source.
    ///
    /// Called once before `run`. May keep the connection it opened.
    async fn probe(&mut self) -> bool;

    /// Forward events until cancelled or the source ends.
    async fn run(
        self: Box<Self>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<(), SourceError>;
}

/// Errors that can occur while running a source.
#[derive(Error, Debug)]
pub enum SourceError {
    #[error("DBus error: {0}")]
    Dbus(#[from] zbus::Error),

    #[error("Wayland error: {0}")]
    Wayland(String),

    #[error("Socket connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Environment variable not set: {0}")]
    EnvVarNotSet(String),

    #[error("Socket path not found: {0}")]
    SocketNotFound(String),

    #[error("Source not available: {0}")]
    Unavailable(String),

    #[error("Event stream closed")]
    Closed,
}

/// A running source task.
#[derive(Debug)]
pub struct Subscription {
    pub name: &'static str,
    pub handle: JoinHandle<()>,
}

/// All sources in priority order, idle-capable ones first.
pub fn all_sources(config: &Config) -> Vec<Box<dyn EventSource>> {
    // Without a timeout wayland-idle is filtered out by `enabled_sources`.
    let idle_timeout = config.idle_timeout_seconds.unwrap_or_default();
    vec![
        Box::new(DisplayPowerSource::new()),
        Box::new(WaylandIdleSource::new(idle_timeout)),
        Box::new(ScreenSaverSource::new()),
        Box::new(LogindSource::new()),
        Box::new(HyprlandSource::new()),
    ]
}

/// Sources not disabled by config.
pub fn enabled_sources(config: &Config) -> Vec<Box<dyn EventSource>> {
    all_sources(config)
        .into_iter()
        .filter(|s| config.is_source_enabled(s.name()))
        .collect()
}

/// Probe every source and spawn the ones that are present.
///
/// Absent sources are skipped silently. If none are present the monitor
/// keeps running but can never emit.
pub async fn subscribe_all(
    sources: Vec<Box<dyn EventSource>>,
    events: &EventSender,
    cancel: &CancellationToken,
) -> Vec<Subscription> {
    let mut subscriptions = Vec::new();

    for mut source in sources {
        let name = source.name();
        if !source.probe().await {
            debug!("Source '{}' not available, skipping", name);
            continue;
        }

        info!("Subscribed to source '{}'", name);

        let events = events.clone();
        let cancel = cancel.child_token();
        let handle = tokio::spawn(async move {
            match source.run(events, cancel).await {
                Ok(()) => debug!("Source '{}' stopped", name),
                Err(e) => warn!("Source '{}' failed: {}", name, e),
            }
        });

        subscriptions.push(Subscription { name, handle });
    }

    if subscriptions.is_empty() {
        error!("No event sources available on this host.");
        error!("The monitor will keep running but screenDimmed will never be emitted.");
    }

    subscriptions
}

/// Probe every source without subscribing.
pub async fn probe_all(sources: Vec<Box<dyn EventSource>>) -> Vec<(&'static str, bool)> {
    let mut results = Vec::with_capacity(sources.len());
    for mut source in sources {
        let available = source.probe().await;
        results.push((source.name(), available));
    }
    results
}

/// Send an event to the monitor, failing once the monitor is gone.
async fn forward(events: &EventSender, event: Event) -> Result<(), SourceError> {
    tracing::trace!("{:?} event from {}", event.kind, event.source);
    events.send(event).await.map_err(|_| SourceError::Closed)
}
