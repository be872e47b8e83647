//! Private bus helpers shared by the D-Bus source tests.

#![allow(dead_code)]

use sleepchecker_idled::domain::Event;
use std::time::Duration;
use tokio::sync::mpsc;
use zbus::{Connection, connection};

/// How long to wait for a forwarded event before emitting again.
const RETRY_INTERVAL: Duration = Duration::from_millis(250);
const ATTEMPTS: usize = 20;

/// Start a private `dbus-daemon`, or `None` when it isn't installed.
pub fn launch_bus() -> Option<dbus_launch::Daemon> {
    match dbus_launch::Launcher::daemon().launch() {
        Ok(daemon) => Some(daemon),
        Err(e) => {
            eprintln!("skipping: could not launch dbus-daemon: {e}");
            None
        }
    }
}

pub async fn connect(daemon: &dbus_launch::Daemon) -> Connection {
    connection::Builder::address(daemon.address())
        .unwrap()
        .build()
        .await
        .unwrap()
}

/// First event matching `accept` within `within`, skipping others.
pub async fn wait_for(
    rx: &mut mpsc::Receiver<Event>,
    accept: impl Fn(&Event) -> bool,
    within: Duration,
) -> Option<Event> {
    tokio::time::timeout(within, async {
        while let Some(event) = rx.recv().await {
            if accept(&event) {
                return Some(event);
            }
        }
        None
    })
    .await
    .ok()
    .flatten()
}

/// Repeat `emit` until the source forwards an event matching `accept`.
///
/// Anything emitted before the source's match rule is registered is lost,
/// so a single emission can race the subscription.
pub async fn emit_until(
    rx: &mut mpsc::Receiver<Event>,
    mut emit: impl AsyncFnMut(),
    accept: impl Fn(&Event) -> bool,
) -> Event {
    for _ in 0..ATTEMPTS {
        emit().await;
        if let Some(event) = wait_for(rx, &accept, RETRY_INTERVAL).await {
            return event;
        }
    }
    panic!("source never forwarded the expected event");
}
