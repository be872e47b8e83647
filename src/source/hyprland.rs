//! Hyprland IPC socket2 activity source.
//!
//! Connects to Hyprland's socket2 event stream and treats workspace and
//! active window changes as user activity.

use super::{EventSource, EventSender, SourceError, forward};
use crate::domain::{Event, Trigger};
use async_trait::async_trait;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::UnixStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

const INITIAL_BACKOFF: Duration = Duration::from_millis(250);
const MAX_BACKOFF: Duration = Duration::from_secs(5);

/// Hyprland activity source.
pub struct HyprlandSource {
    reader: Option<BufReader<UnixStream>>,
    backoff: Duration,
}

impl HyprlandSource {
    pub const NAME: &'static str = "hyprland";

    pub fn new() -> Self {
        Self {
            reader: None,
            backoff: INITIAL_BACKOFF,
        }
    }

    /// Connect to Hyprland's socket2.
    pub async fn connect(&mut self) -> Result<(), SourceError> {
        let socket_path = get_socket2_path()?;
        debug!("Connecting to Hyprland socket2: {}", socket_path.display());

        let stream = UnixStream::connect(&socket_path)
            .await
            .map_err(|e| SourceError::ConnectionFailed(e.to_string()))?;

        self.reader = Some(BufReader::new(stream));
        Ok(())
    }

    /// Get diagnostic information about the Hyprland environment.
    pub fn get_diagnostics() -> Vec<String> {
        let mut diags = Vec::new();

        match env::var("XDG_RUNTIME_DIR") {
            Ok(v) => diags.push(format!("XDG_RUNTIME_DIR={v}")),
            Err(_) => diags.push("XDG_RUNTIME_DIR: NOT SET".to_string()),
        }

        match env::var("HYPRLAND_INSTANCE_SIGNATURE") {
            Ok(v) => diags.push(format!("HYPRLAND_INSTANCE_SIGNATURE={v}")),
            Err(_) => diags.push("HYPRLAND_INSTANCE_SIGNATURE: NOT SET".to_string()),
        }

        match get_socket2_path() {
            Ok(path) => diags.push(format!("Socket2 path: {} (exists)", path.display())),
            Err(_) => diags.push("Socket2 path: NOT FOUND".to_string()),
        }

        diags
    }

    /// Reconnect with exponential backoff until the socket is back.
    async fn reconnect(&mut self) {
        loop {
            warn!("Socket2 connection lost. Retrying in {:?}...", self.backoff);
            tokio::time::sleep(self.backoff).await;
            self.backoff = std::cmp::min(self.backoff * 2, MAX_BACKOFF);

            match self.connect().await {
                Ok(()) => {
                    info!("Reconnected to Hyprland socket2");
                    self.backoff = INITIAL_BACKOFF;
                    return;
                }
                Err(e) => debug!("Reconnect failed: {}", e),
            }
        }
    }

    /// Read until the next line that maps to an activity event.
    pub async fn next_event(&mut self) -> Event {
        loop {
            let Some(reader) = &mut self.reader else {
                self.reconnect().await;
                continue;
            };

            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => {
                    warn!("Socket2 stream ended (EOF)");
                    self.reader = None;
                }
                Ok(_) => {
                    trace!("Received line: {}", line.trim());
                    if let Some(event) = parse_event_line(&line).into_event() {
                        return event;
                    }
                }
                Err(e) => {
                    warn!("Read error: {}", e);
                    self.reader = None;
                }
            }
        }
    }
}

impl Default for HyprlandSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventSource for HyprlandSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn probe(&mut self) -> bool {
        match self.connect().await {
            Ok(()) => true,
            Err(e) => {
                debug!("Hyprland not available: {}", e);
                false
            }
        }
    }

    async fn run(
        self: Box<Self>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let mut source = self;
        loop {
            tokio::select! {
                () = cancel.cancelled() => return Ok(()),
                event = source.next_event() => forward(&events, event).await?,
            }
        }
    }
}

/// Get the path to Hyprland's socket2.
fn get_socket2_path() -> Result<PathBuf, SourceError> {
    let xdg_runtime_dir = env::var("XDG_RUNTIME_DIR")
        .map_err(|_| SourceError::EnvVarNotSet("XDG_RUNTIME_DIR".to_string()))?;

    let hyprland_sig = env::var("HYPRLAND_INSTANCE_SIGNATURE")
        .map_err(|_| SourceError::EnvVarNotSet("HYPRLAND_INSTANCE_SIGNATURE".to_string()))?;

    let socket_path = PathBuf::from(&xdg_runtime_dir)
        .join("hypr")
        .join(&hyprland_sig)
        .join(".socket2.sock");

    if !socket_path.exists() {
        return Err(SourceError::SocketNotFound(
            socket_path.display().to_string(),
        ));
    }

    Ok(socket_path)
}

/// Parsed IPC event from socket2.
#[derive(Debug, Clone, PartialEq, Eq)]
enum HyprlandEvent {
    /// workspace>>NAME or workspacev2>>ID,NAME
    Workspace { name: String },
    /// activewindow>>WINDOWCLASS,WINDOWTITLE
    ActiveWindow { class: String },
    /// Other events we don't care about.
    Other,
}

impl HyprlandEvent {
    /// Classify the IPC event, labelled with the workspace or window class.
    fn into_event(self) -> Option<Event> {
        match self {
            Self::Workspace { name } => {
                Some(Trigger::DesktopChanged.event(format!("desktop switched to {name}")))
            }
            Self::ActiveWindow { class } if class.is_empty() => {
                Some(Trigger::FocusChanged.event("window focus cleared"))
            }
            Self::ActiveWindow { class } => {
                Some(Trigger::FocusChanged.event(format!("window focus changed to {class}")))
            }
            Self::Other => None,
        }
    }
}

/// Parse a single line from the socket2 stream.
///
/// Format: EVENT>>DATA\n
fn parse_event_line(line: &str) -> HyprlandEvent {
    let line = line.trim_end();

    let Some((event_name, data)) = line.split_once(">>") else {
        trace!("Ignoring malformed line (no >>): {}", line);
        return HyprlandEvent::Other;
    };

    match event_name {
        "workspace" => HyprlandEvent::Workspace {
            name: data.to_string(),
        },
        "workspacev2" => {
            // Data format: WORKSPACEID,WORKSPACENAME
            let name = data.split_once(',').map_or(data, |(_, n)| n);
            HyprlandEvent::Workspace {
                name: name.to_string(),
            }
        }
        "activewindow" => {
            // Title can contain commas, class cannot
            let class = data.split_once(',').map_or(data, |(c, _)| c);
            HyprlandEvent::ActiveWindow {
                class: class.to_string(),
            }
        }
        _ => {
            trace!("Ignoring event: {}", event_name);
            HyprlandEvent::Other
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_workspace() {
        assert_eq!(
            parse_event_line("workspace>>2"),
            HyprlandEvent::Workspace {
                name: "2".to_string()
            }
        );
    }

    #[test]
    fn test_parse_workspacev2() {
        assert_eq!(
            parse_event_line("workspacev2>>3,code"),
            HyprlandEvent::Workspace {
                name: "code".to_string()
            }
        );
    }

    #[test]
    fn test_parse_activewindow_comma_in_title() {
        assert_eq!(
            parse_event_line("activewindow>>code,main.rs - sleepchecker, Pair Programming"),
            HyprlandEvent::ActiveWindow {
                class: "code".to_string()
            }
        );
    }

    #[test]
    fn test_parse_activewindow_no_comma() {
        assert_eq!(
            parse_event_line("activewindow>>dmenu"),
            HyprlandEvent::ActiveWindow {
                class: "dmenu".to_string()
            }
        );
    }

    #[test]
    fn test_parse_with_trailing_newline() {
        assert_eq!(
            parse_event_line("activewindow>>firefox,Title\n"),
            HyprlandEvent::ActiveWindow {
                class: "firefox".to_string()
            }
        );
    }

    #[test]
    fn test_parse_other_events() {
        assert_eq!(parse_event_line("activewindowv2>>0x55a1"), HyprlandEvent::Other);
        assert_eq!(
            parse_event_line("openwindow>>0x123,1,kitty,kitty"),
            HyprlandEvent::Other
        );
        assert_eq!(parse_event_line("closewindow>>0x123"), HyprlandEvent::Other);
    }

    #[test]
    fn test_parse_malformed_line() {
        assert_eq!(parse_event_line("no separator"), HyprlandEvent::Other);
        assert_eq!(parse_event_line(""), HyprlandEvent::Other);
    }

    #[test]
    fn test_events_are_activity() {
        let workspace = parse_event_line("workspace>>1").into_event().unwrap();
        assert_eq!(workspace, Event::activity("desktop switched to 1"));

        let focus = parse_event_line("activewindow>>kitty,").into_event().unwrap();
        assert_eq!(focus, Event::activity("window focus changed to kitty"));

        let cleared = parse_event_line("activewindow>>,").into_event().unwrap();
        assert_eq!(cleared, Event::activity("window focus cleared"));

        assert_eq!(parse_event_line("urgent>>0x1").into_event(), None);
    }
}
