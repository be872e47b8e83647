//! Outbound `screenDimmed` notifications.
//!
//! The face-detection service listens for
//! `org.sleepchecker.IdleNotifier.screenDimmed(b)`:
//! - `true`  → start face detection / acquire inhibitors
//! - `false` → stop detection / release inhibitors

use crate::config::BusKind;
use crate::domain::Notification;
use anyhow::{Context, Result};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use zbus::Connection;
use zbus::message::Message;

/// Well-known bus name requested by the daemon.
pub const SERVICE: &str = "org.sleepchecker.IdleNotifier";
pub const OBJECT_PATH: &str = "/org/sleepchecker/IdleNotifier";
pub const INTERFACE: &str = "org.sleepchecker.IdleNotifier";
pub const SIGNAL: &str = "screenDimmed";

/// Sink for state-change notifications.
///
/// Fire-and-forget: implementations must not block and report their own
/// delivery failures.
pub trait Notifier: Send {
    fn notify(&self, dimmed: bool);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn notify(&self, dimmed: bool) {
        (**self).notify(dimmed);
    }
}

impl Notifier for Vec<Box<dyn Notifier>> {
    fn notify(&self, dimmed: bool) {
        for notifier in self {
            notifier.notify(dimmed);
        }
    }
}

/// Emits the `screenDimmed` signal on `DBus`.
///
/// Signals are sent from a single background task so they leave in the
/// order they were notified.
pub struct DbusNotifier {
    tx: mpsc::UnboundedSender<bool>,
}

impl DbusNotifier {
    /// Connect to the given bus and start the emitter task.
    pub async fn connect(bus: BusKind) -> Result<Self> {
        let conn = match bus {
            BusKind::Session => Connection::session()
                .await
                .context("Failed to connect to session DBus")?,
            BusKind::System => Connection::system()
                .await
                .context("Failed to connect to system DBus")?,
        };

        Ok(Self::with_connection(conn).await)
    }

    /// Start the emitter task on an existing connection.
    pub async fn with_connection(conn: Connection) -> Self {
        match conn.request_name(SERVICE).await {
            Ok(()) => info!("Acquired bus name {}", SERVICE),
            // Listeners match on interface and member, so the unique name is enough.
            Err(e) => warn!("Could not acquire bus name {}: {}", SERVICE, e),
        }

        let (tx, mut rx) = mpsc::unbounded_channel::<bool>();

        tokio::spawn(async move {
            while let Some(dimmed) = rx.recv().await {
                match emit_screen_dimmed(&conn, dimmed).await {
                    Ok(()) => debug!("Emitted {}.{}({})", INTERFACE, SIGNAL, dimmed),
                    Err(e) => warn!("Failed to emit {}({}): {}", SIGNAL, dimmed, e),
                }
            }
        });

        Self { tx }
    }
}

impl Notifier for DbusNotifier {
    fn notify(&self, dimmed: bool) {
        if self.tx.send(dimmed).is_err() {
            warn!("DBus emitter stopped, dropping {}({})", SIGNAL, dimmed);
        }
    }
}

/// Build and send a single `screenDimmed` signal.
async fn emit_screen_dimmed(conn: &Connection, dimmed: bool) -> zbus::Result<()> {
    let msg = Message::signal(OBJECT_PATH, INTERFACE, SIGNAL)?.build(&(dimmed,))?;
    conn.send(&msg).await
}

/// Dry-run notifier: logs instead of emitting.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, dimmed: bool) {
        info!("[dry-run] Would emit {}.{}({})", INTERFACE, SIGNAL, dimmed);
    }
}

/// Prints each notification as a JSON line on stdout.
pub struct StdoutNotifier;

impl StdoutNotifier {
    /// Render a notification line.
    pub fn format(dimmed: bool) -> String {
        // Serializing a struct with a single bool field cannot fail.
        serde_json::to_string(&Notification::new(dimmed))
            .unwrap_or_else(|_| format!("{{\"screenDimmed\":{dimmed}}}"))
    }
}

impl Notifier for StdoutNotifier {
    fn notify(&self, dimmed: bool) {
        println!("{}", Self::format(dimmed));
    }
}
