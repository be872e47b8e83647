//! Domain types for idle/activity events.

use serde::Deserialize;
use serde::Serialize;

/// Direction of an event: the user went away or came back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Idle,
    Activity,
}

/// Host-level cause of an event.
///
/// Listed in priority order: idle triggers first, earliest signal first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trigger {
    /// Display is about to power off (DPMS).
    DisplayPowerOff,
    /// Lock screen is about to appear.
    ScreenAboutToLock,
    /// Display woke up from power-off.
    DisplayWake,
    ScreenUnlocked,
    DesktopChanged,
    FocusChanged,
    /// Pointer moved or any other input resumed.
    PointerMoved,
}

impl Trigger {
    /// Classify the trigger as idle or activity.
    pub fn kind(self) -> EventKind {
        match self {
            Self::DisplayPowerOff | Self::ScreenAboutToLock => EventKind::Idle,
            Self::DisplayWake
            | Self::ScreenUnlocked
            | Self::DesktopChanged
            | Self::FocusChanged
            | Self::PointerMoved => EventKind::Activity,
        }
    }

    /// Default human-readable label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            Self::DisplayPowerOff => "display turning off",
            Self::ScreenAboutToLock => "screen about to lock",
            Self::DisplayWake => "display woke up",
            Self::ScreenUnlocked => "screen unlocked",
            Self::DesktopChanged => "desktop switched",
            Self::FocusChanged => "window focus changed",
            Self::PointerMoved => "cursor moved",
        }
    }

    /// Build an event for this trigger with a source-specific label.
    pub fn event(self, source: impl Into<String>) -> Event {
        Event {
            kind: self.kind(),
            source: source.into(),
        }
    }
}

/// A classified host event, consumed immediately by the monitor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    pub kind: EventKind,

    /// Diagnostic label describing where the event came from.
    pub source: String,
}

impl Event {
    /// Create an idle event.
    pub fn idle(source: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Idle,
            source: source.into(),
        }
    }

    /// Create an activity event.
    pub fn activity(source: impl Into<String>) -> Self {
        Self {
            kind: EventKind::Activity,
            source: source.into(),
        }
    }
}

impl From<Trigger> for Event {
    fn from(trigger: Trigger) -> Self {
        trigger.event(trigger.label())
    }
}

/// The outward `screenDimmed` message as printed by `--print-events`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    #[serde(rename = "screenDimmed")]
    pub screen_dimmed: bool,
}

impl Notification {
    pub fn new(screen_dimmed: bool) -> Self {
        Self { screen_dimmed }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_idle_triggers() {
        assert_eq!(Trigger::DisplayPowerOff.kind(), EventKind::Idle);
        assert_eq!(Trigger::ScreenAboutToLock.kind(), EventKind::Idle);
    }

    #[test]
    fn test_activity_triggers() {
        for trigger in [
            Trigger::DisplayWake,
            Trigger::ScreenUnlocked,
            Trigger::DesktopChanged,
            Trigger::FocusChanged,
            Trigger::PointerMoved,
        ] {
            assert_eq!(trigger.kind(), EventKind::Activity, "{trigger:?}");
        }
    }

    #[test]
    fn test_event_from_trigger_uses_default_label() {
        let event = Event::from(Trigger::PointerMoved);
        assert_eq!(event.kind, EventKind::Activity);
        assert_eq!(event.source, "cursor moved");
    }

    #[test]
    fn test_trigger_event_custom_label() {
        let event = Trigger::DisplayPowerOff.event("idle timeout reached");
        assert_eq!(event, Event::idle("idle timeout reached"));
    }

    #[test]
    fn test_notification_json() {
        let json = serde_json::to_string(&Notification::new(true)).unwrap();
        assert_eq!(json, r#"{"screenDimmed":true}"#);

        let parsed: Notification = serde_json::from_str(r#"{"screenDimmed":false}"#).unwrap();
        assert!(!parsed.screen_dimmed);
    }
}
