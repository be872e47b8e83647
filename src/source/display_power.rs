//! Display power detection via GNOME Mutter's `DisplayConfig` interface.
//!
//! Watches the `PowerSaveMode` property: any DPMS mode other than "on"
//! means the display is powering off.

use super::{EventSource, EventSender, SourceError, forward};
use crate::domain::Trigger;
use async_trait::async_trait;
use futures_util::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use zbus::{Connection, Proxy};

const BUS_NAME: &str = "org.gnome.Mutter.DisplayConfig";
const OBJECT_PATH: &str = "/org/gnome/Mutter/DisplayConfig";
const INTERFACE: &str = "org.gnome.Mutter.DisplayConfig";
const POWER_SAVE_MODE: &str = "PowerSaveMode";

/// DPMS source backed by Mutter.
pub struct DisplayPowerSource {
    conn: Option<Connection>,
}

impl DisplayPowerSource {
    pub const NAME: &'static str = "display-power";

    pub fn new() -> Self {
        Self { conn: None }
    }

    /// Use an existing bus connection instead of the session bus.
    pub fn with_connection(conn: Connection) -> Self {
        Self { conn: Some(conn) }
    }
}

impl Default for DisplayPowerSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for DisplayPowerSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn probe(&mut self) -> bool {
        let injected = self.conn.take();
        let result = async move {
            let conn = match injected {
                Some(conn) => conn,
                None => Connection::session().await?,
            };
            let proxy = Proxy::new(&conn, BUS_NAME, OBJECT_PATH, INTERFACE).await?;
            let mode: i32 = proxy.get_property(POWER_SAVE_MODE).await?;
            Ok::<_, zbus::Error>((conn, mode))
        }
        .await;

        match result {
            Ok((conn, mode)) => {
                info!("Mutter display power available (PowerSaveMode={})", mode);
                self.conn = Some(conn);
                true
            }
            Err(e) => {
                debug!("Mutter DisplayConfig not available: {}", e);
                false
            }
        }
    }

    async fn run(
        self: Box<Self>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let Some(conn) = self.conn else {
            return Err(SourceError::Unavailable("display power not probed".to_string()));
        };

        let proxy = Proxy::new(&conn, BUS_NAME, OBJECT_PATH, INTERFACE).await?;
        let mut changes = proxy.receive_property_changed::<i32>(POWER_SAVE_MODE).await;

        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                change = changes.next() => {
                    let Some(change) = change else {
                        return Err(SourceError::Closed);
                    };
                    let mode = match change.get().await {
                        Ok(mode) => mode,
                        Err(e) => {
                            warn!("Failed to read {}: {}", POWER_SAVE_MODE, e);
                            continue;
                        }
                    };

                    trace!("{} changed to {}", POWER_SAVE_MODE, mode);
                    if let Some(trigger) = power_save_trigger(mode) {
                        forward(&events, trigger.into()).await?;
                    }
                }
            }
        }
    }
}

/// Map a DPMS mode to a trigger.
///
/// 0 = on, 1 = standby, 2 = suspend, 3 = off, -1 = unknown.
fn power_save_trigger(mode: i32) -> Option<Trigger> {
    match mode {
        0 => Some(Trigger::DisplayWake),
        1..=3 => Some(Trigger::DisplayPowerOff),
        _ => None,
    }
}
