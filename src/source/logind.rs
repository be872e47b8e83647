//! Screen lock detection via systemd-logind `DBus` interface.
//!
//! `Lock` signals and the session's `LockedHint` property mark the screen as
//! locking. Unlocks come from `LockedHint` going false, since lock screens
//! set the hint rather than calling `UnlockSession`.

use super::{EventSource, EventSender, SourceError, forward};
use crate::domain::{Event, Trigger};
use async_trait::async_trait;
use futures_util::StreamExt;
use std::env;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbus::Connection;

/// `DBus` service and path for login1.
const LOGIND_SERVICE: &str = "org.freedesktop.login1";
const LOGIND_PATH: &str = "/org/freedesktop/login1";
const MANAGER_INTERFACE: &str = "org.freedesktop.login1.Manager";
const SESSION_INTERFACE: &str = "org.freedesktop.login1.Session";
const LOCKED_HINT: &str = "LockedHint";

/// Session lock source backed by systemd-logind.
pub struct LogindSource {
    conn: Option<Connection>,

    /// Session object path in `DBus`.
    session_path: Option<String>,
}

impl LogindSource {
    pub const NAME: &'static str = "logind";

    pub fn new() -> Self {
        Self {
            conn: None,
            session_path: None,
        }
    }

    /// Use an existing bus connection instead of the system bus.
    pub fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            session_path: None,
        }
    }

    /// Connect to the system bus and resolve the session path.
    async fn init(&mut self) -> Result<(), SourceError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => Connection::system().await?,
        };
        let session_path = resolve_session_path(&conn).await?;
        info!("Resolved session path: {}", session_path);

        self.conn = Some(conn);
        self.session_path = Some(session_path);
        Ok(())
    }
}

impl Default for LogindSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for LogindSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn probe(&mut self) -> bool {
        match self.init().await {
            Ok(()) => true,
            Err(e) => {
                debug!("logind not available: {}", e);
                false
            }
        }
    }

    async fn run(
        self: Box<Self>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let (Some(conn), Some(session_path)) = (self.conn, self.session_path) else {
            return Err(SourceError::Unavailable("logind session not resolved".to_string()));
        };

        let proxy = zbus::Proxy::new(
            &conn,
            LOGIND_SERVICE,
            session_path.as_str(),
            SESSION_INTERFACE,
        )
        .await?;

        let mut lock = proxy.receive_signal("Lock").await?;
        let mut locked_hint = proxy.receive_property_changed::<bool>(LOCKED_HINT).await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                msg = lock.next() => {
                    if msg.is_none() {
                        return Err(SourceError::Closed);
                    }
                    forward(&events, Trigger::ScreenAboutToLock.event("session locked")).await?;
                }
                change = locked_hint.next() => {
                    let Some(change) = change else {
                        return Err(SourceError::Closed);
                    };
                    match change.get().await {
                        Ok(locked) => forward(&events, locked_hint_event(locked)).await?,
                        Err(e) => warn!("Failed to read {}: {}", LOCKED_HINT, e),
                    }
                }
            }
        }
    }
}

/// Map a `LockedHint` value to an event.
fn locked_hint_event(locked: bool) -> Event {
    if locked {
        Trigger::ScreenAboutToLock.event("session lock hint set")
    } else {
        Trigger::ScreenUnlocked.event("session unlocked")
    }
}

/// Resolve the session object path for the current session.
///
/// Uses `XDG_SESSION_ID` when set, otherwise asks logind for the caller's
/// own session.
async fn resolve_session_path(conn: &Connection) -> Result<String, SourceError> {
    let session_id = if let Ok(id) = env::var("XDG_SESSION_ID") {
        debug!("Using XDG_SESSION_ID: {}", id);
        id
    } else {
        debug!("XDG_SESSION_ID not set, asking logind for the caller's session");
        "auto".to_string()
    };

    let proxy = zbus::Proxy::new(conn, LOGIND_SERVICE, LOGIND_PATH, MANAGER_INTERFACE).await?;

    let path: zbus::zvariant::OwnedObjectPath =
        proxy.call("GetSession", &(session_id.as_str(),)).await?;

    Ok(path.to_string())
}
