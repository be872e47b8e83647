//! Screensaver activation via the freedesktop `ScreenSaver` interface.
//!
//! `ActiveChanged(true)` means the lock screen is coming up,
//! `ActiveChanged(false)` means the user unlocked it.

use super::{EventSource, EventSender, SourceError, forward};
use crate::domain::{Event, Trigger};
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use zbus::Connection;

const SCREENSAVER_SERVICE: &str = "org.freedesktop.ScreenSaver";
const SCREENSAVER_INTERFACE: &str = "org.freedesktop.ScreenSaver";

/// Object paths the service is exported on; KDE uses both.
const SCREENSAVER_PATHS: &[&str] = &["/org/freedesktop/ScreenSaver", "/ScreenSaver"];

/// Screensaver source on the session bus.
pub struct ScreenSaverSource {
    conn: Option<Connection>,
    path: Option<&'static str>,
}

impl ScreenSaverSource {
    pub const NAME: &'static str = "screensaver";

    pub fn new() -> Self {
        Self {
            conn: None,
            path: None,
        }
    }

    /// Use an existing bus connection instead of the session bus.
    pub fn with_connection(conn: Connection) -> Self {
        Self {
            conn: Some(conn),
            path: None,
        }
    }

    /// Object path the service was found at.
    pub fn path(&self) -> Option<&'static str> {
        self.path
    }
}

impl Default for ScreenSaverSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for ScreenSaverSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn probe(&mut self) -> bool {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => match Connection::session().await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!("Session bus not available: {}", e);
                    return false;
                }
            },
        };

        for &path in SCREENSAVER_PATHS {
            match get_active(&conn, path).await {
                Ok(active) => {
                    info!("Screensaver found at {} (active={})", path, active);
                    self.conn = Some(conn);
                    self.path = Some(path);
                    return true;
                }
                Err(e) => debug!("No screensaver at {}: {}", path, e),
            }
        }

        self.conn = Some(conn);
        false
    }

    async fn run(
        self: Box<Self>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let (Some(conn), Some(path)) = (self.conn, self.path) else {
            return Err(SourceError::Unavailable("screensaver not probed".to_string()));
        };

        let proxy =
            zbus::Proxy::new(&conn, SCREENSAVER_SERVICE, path, SCREENSAVER_INTERFACE).await?;
        let mut changes = proxy.receive_signal("ActiveChanged").await?;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                msg = changes.next() => {
                    let Some(msg) = msg else {
                        return Err(SourceError::Closed);
                    };
                    match msg.body().deserialize::<(bool,)>() {
                        Ok((active,)) => forward(&events, active_changed_event(active)).await?,
                        Err(e) => warn!("Malformed ActiveChanged signal: {}", e),
                    }
                }
            }
        }
    }
}

/// Map an `ActiveChanged` value to an event.
fn active_changed_event(active: bool) -> Event {
    if active {
        Trigger::ScreenAboutToLock.event("screensaver activated")
    } else {
        Trigger::ScreenUnlocked.event("screensaver deactivated")
    }
}

/// Query the current screensaver state.
async fn get_active(conn: &Connection, path: &str) -> zbus::Result<bool> {
    let proxy = zbus::Proxy::new(conn, SCREENSAVER_SERVICE, path, SCREENSAVER_INTERFACE).await?;
    proxy.call("GetActive", &()).await
}
