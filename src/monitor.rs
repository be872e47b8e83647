//! Idle/activity state machine.
//!
//! Debounces classified events to a single boolean:
//! - Idle while active flips to dimmed and emits `true`
//! - Activity while dimmed flips back and emits `false`
//! - Anything else is a no-op

use crate::domain::{Event, EventKind};
use crate::notify::Notifier;
use tracing::{info, trace};

/// Current presence state. Starts active (not dimmed).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MonitorState {
    dimmed: bool,
}

impl MonitorState {
    /// Whether the screen is currently considered dimmed.
    pub fn is_dimmed(self) -> bool {
        self.dimmed
    }

    /// Apply an event kind, returning the new value if the state flipped.
    pub fn apply(&mut self, kind: EventKind) -> Option<bool> {
        match (kind, self.dimmed) {
            (EventKind::Idle, false) => {
                self.dimmed = true;
                Some(true)
            }
            (EventKind::Activity, true) => {
                self.dimmed = false;
                Some(false)
            }
            _ => None,
        }
    }
}

/// Bridges classified events to deduplicated `screenDimmed` notifications.
pub struct Monitor<N> {
    state: MonitorState,
    notifier: N,
}

impl<N: Notifier> Monitor<N> {
    /// Create a monitor in the active state. Nothing is emitted at startup.
    pub fn new(notifier: N) -> Self {
        Self {
            state: MonitorState::default(),
            notifier,
        }
    }

    /// Check if the screen is currently considered dimmed.
    pub fn is_dimmed(&self) -> bool {
        self.state.is_dimmed()
    }

    /// Handle one event.
    ///
    /// Notifies exactly once per actual transition and returns the emitted
    /// value, or `None` when the event was suppressed.
    pub fn handle(&mut self, event: &Event) -> Option<bool> {
        let Some(dimmed) = self.state.apply(event.kind) else {
            trace!(
                "Ignoring {:?} event ({}): already dimmed={}",
                event.kind,
                event.source,
                self.state.is_dimmed()
            );
            return None;
        };

        self.notifier.notify(dimmed);

        if dimmed {
            info!("Idle detected ({}) -> screenDimmed(true)", event.source);
        } else {
            info!("Activity detected ({}) -> screenDimmed(false)", event.source);
        }

        Some(dimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Trigger;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<bool>>>);

    impl Recorder {
        fn sent(&self) -> Vec<bool> {
            self.0.lock().unwrap().clone()
        }
    }

    impl Notifier for Recorder {
        fn notify(&self, dimmed: bool) {
            self.0.lock().unwrap().push(dimmed);
        }
    }

    fn monitor() -> (Monitor<Recorder>, Recorder) {
        let recorder = Recorder::default();
        (Monitor::new(recorder.clone()), recorder)
    }

    #[test]
    fn test_initial_state_is_active() {
        let (monitor, recorder) = monitor();
        assert!(!monitor.is_dimmed());
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_repeated_idle_emits_once() {
        let (mut monitor, recorder) = monitor();

        assert_eq!(monitor.handle(&Event::idle("a")), Some(true));
        for _ in 0..5 {
            assert_eq!(monitor.handle(&Event::idle("b")), None);
        }

        assert!(monitor.is_dimmed());
        assert_eq!(recorder.sent(), vec![true]);
    }

    #[test]
    fn test_repeated_activity_while_dimmed_emits_once() {
        let (mut monitor, recorder) = monitor();
        monitor.handle(&Event::idle("idle"));

        assert_eq!(monitor.handle(&Event::activity("a")), Some(false));
        assert_eq!(monitor.handle(&Event::activity("b")), None);
        assert_eq!(monitor.handle(&Event::activity("c")), None);

        assert_eq!(recorder.sent(), vec![true, false]);
    }

    #[test]
    fn test_activity_while_active_is_ignored() {
        let (mut monitor, recorder) = monitor();
        assert_eq!(monitor.handle(&Trigger::FocusChanged.into()), None);
        assert_eq!(monitor.handle(&Trigger::PointerMoved.into()), None);
        assert!(recorder.sent().is_empty());
    }

    #[test]
    fn test_alternation() {
        let (mut monitor, recorder) = monitor();
        monitor.handle(&Event::idle("1"));
        monitor.handle(&Event::activity("2"));
        monitor.handle(&Event::idle("3"));
        assert_eq!(recorder.sent(), vec![true, false, true]);
    }

    #[test]
    fn test_lock_only_source_still_dims() {
        let (mut monitor, recorder) = monitor();
        monitor.handle(&Trigger::ScreenAboutToLock.into());
        assert!(monitor.is_dimmed());
        assert_eq!(recorder.sent(), vec![true]);
    }

    #[test]
    fn test_display_off_then_lock_then_cursor() {
        let (mut monitor, recorder) = monitor();
        let events: Vec<Event> = vec![
            Trigger::DisplayPowerOff.into(),
            Trigger::ScreenAboutToLock.into(),
            Trigger::PointerMoved.into(),
        ];

        for event in &events {
            monitor.handle(event);
        }

        assert_eq!(recorder.sent(), vec![true, false]);
        assert!(!monitor.is_dimmed());
    }

    #[test]
    fn test_state_apply() {
        let mut state = MonitorState::default();
        assert_eq!(state.apply(EventKind::Activity), None);
        assert_eq!(state.apply(EventKind::Idle), Some(true));
        assert_eq!(state.apply(EventKind::Idle), None);
        assert_eq!(state.apply(EventKind::Activity), Some(false));
        assert!(!state.is_dimmed());
    }
}
