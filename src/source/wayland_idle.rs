//! Inactivity detection via the Wayland `ext-idle-notify-v1` protocol.
//!
//! The compositor sends `idled` once the seat has had no input for the
//! configured timeout and `resumed` on the next input.

use super::{EventSource, EventSender, SourceError};
use crate::domain::{Event, Trigger};
use async_trait::async_trait;
use std::thread;
use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use wayland_client::protocol::wl_callback::{self, WlCallback};
use wayland_client::protocol::wl_registry::{self, WlRegistry};
use wayland_client::protocol::wl_seat::WlSeat;
use wayland_client::{Connection, Dispatch, EventQueue, QueueHandle};
use wayland_protocols::ext::idle_notify::v1::client::ext_idle_notification_v1::{
    self, ExtIdleNotificationV1,
};
use wayland_protocols::ext::idle_notify::v1::client::ext_idle_notifier_v1::ExtIdleNotifierV1;

/// Idle source for compositors implementing `ext_idle_notifier_v1`.
pub struct WaylandIdleSource {
    timeout_ms: u32,
}

impl WaylandIdleSource {
    pub const NAME: &'static str = "wayland-idle";

    pub fn new(timeout_seconds: u64) -> Self {
        let timeout_ms = u32::try_from(timeout_seconds.saturating_mul(1000)).unwrap_or(u32::MAX);
        Self { timeout_ms }
    }
}

#[async_trait]
impl EventSource for WaylandIdleSource {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    async fn probe(&mut self) -> bool {
        let result = tokio::task::spawn_blocking(|| {
            let conn = connect()?;
            let (_queue, state, _registry) = init_registry(&conn)?;
            Ok::<_, SourceError>(state.globals.is_complete())
        })
        .await;

        match result {
            Ok(Ok(true)) => true,
            Ok(Ok(false)) => {
                debug!("Compositor does not advertise ext_idle_notifier_v1 and wl_seat");
                false
            }
            Ok(Err(e)) => {
                debug!("Wayland not available: {}", e);
                false
            }
            Err(e) => {
                debug!("Wayland probe task failed: {}", e);
                false
            }
        }
    }

    async fn run(
        self: Box<Self>,
        events: EventSender,
        cancel: CancellationToken,
    ) -> Result<(), SourceError> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (done_tx, mut done_rx) = oneshot::channel();
        let timeout_ms = self.timeout_ms;
        let thread_cancel = cancel.clone();

        // Dispatch blocks until the compositor sends something, so it gets its
        // own thread rather than a runtime blocking slot.
        thread::Builder::new()
            .name("wayland-idle".to_string())
            .spawn(move || {
                let result = dispatch_loop(timeout_ms, events, &thread_cancel, ready_tx);
                let _ = done_tx.send(result);
            })
            .map_err(|e| SourceError::Wayland(e.to_string()))?;

        // The thread checks the token after reporting ready, so cancelling
        // before this point needs no wakeup.
        let wakeup = tokio::select! {
            biased;
            ready = ready_rx => match ready {
                Ok(wakeup) => wakeup,
                Err(_) => return done_rx.await.unwrap_or(Err(SourceError::Closed)),
            },
            () = cancel.cancelled() => return Ok(()),
        };

        tokio::select! {
            () = cancel.cancelled() => {
                wakeup.wake();
                done_rx.await.unwrap_or(Err(SourceError::Closed))
            }
            result = &mut done_rx => result.unwrap_or(Err(SourceError::Closed)),
        }
    }
}

/// Lets the runtime interrupt a thread parked in `blocking_dispatch`.
struct Wakeup {
    conn: Connection,
    qh: QueueHandle<IdleState>,
}

impl Wakeup {
    /// Ask the compositor for a `wl_callback.done` so dispatch returns.
    fn wake(&self) {
        let _callback = self.conn.display().sync(&self.qh, ());
        if let Err(e) = self.conn.flush() {
            debug!("Failed to flush Wayland wakeup: {}", e);
        }
    }
}

/// Globals advertised by the compositor: (name, version).
#[derive(Debug, Default)]
struct Globals {
    seat: Option<(u32, u32)>,
    notifier: Option<(u32, u32)>,
}

impl Globals {
    fn is_complete(&self) -> bool {
        self.seat.is_some() && self.notifier.is_some()
    }
}

#[derive(Default)]
struct IdleState {
    globals: Globals,
    events: Option<EventSender>,
    closed: bool,
}

impl IdleState {
    fn send(&mut self, event: Event) {
        if let Some(events) = &self.events
            && events.blocking_send(event).is_err()
        {
            self.closed = true;
        }
    }
}

fn connect() -> Result<Connection, SourceError> {
    Connection::connect_to_env().map_err(|e| SourceError::Wayland(e.to_string()))
}

/// Collect the globals we need with one roundtrip.
fn init_registry(
    conn: &Connection,
) -> Result<(EventQueue<IdleState>, IdleState, WlRegistry), SourceError> {
    let mut queue = conn.new_event_queue();
    let qh = queue.handle();
    let registry = conn.display().get_registry(&qh, ());

    let mut state = IdleState::default();
    queue
        .roundtrip(&mut state)
        .map_err(|e| SourceError::Wayland(e.to_string()))?;

    Ok((queue, state, registry))
}

/// Register the idle notification and dispatch until cancelled.
fn dispatch_loop(
    timeout_ms: u32,
    events: EventSender,
    cancel: &CancellationToken,
    ready: oneshot::Sender<Wakeup>,
) -> Result<(), SourceError> {
    let conn = connect()?;
    let (mut queue, mut state, registry) = init_registry(&conn)?;
    let qh = queue.handle();

    let (Some((seat_name, seat_version)), Some((notifier_name, notifier_version))) =
        (state.globals.seat, state.globals.notifier)
    else {
        return Err(SourceError::Unavailable(
            "ext_idle_notifier_v1 or wl_seat missing".to_string(),
        ));
    };

    let seat: WlSeat = registry.bind(seat_name, seat_version.min(7), &qh, ());
    let notifier: ExtIdleNotifierV1 = registry.bind(notifier_name, notifier_version.min(1), &qh, ());
    let _notification = notifier.get_idle_notification(timeout_ms, &seat, &qh, ());

    info!("Wayland idle notification registered (timeout {} ms)", timeout_ms);
    state.events = Some(events);
    let _ = ready.send(Wakeup {
        conn: conn.clone(),
        qh: qh.clone(),
    });

    while !state.closed && !cancel.is_cancelled() {
        queue
            .blocking_dispatch(&mut state)
            .map_err(|e| SourceError::Wayland(e.to_string()))?;
    }

    debug!("Wayland idle dispatch stopped");
    Ok(())
}

impl Dispatch<WlRegistry, ()> for IdleState {
    fn event(
        state: &mut Self,
        _registry: &WlRegistry,
        event: wl_registry::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        if let wl_registry::Event::Global {
            name,
            interface,
            version,
        } = event
        {
            match interface.as_str() {
                "wl_seat" if state.globals.seat.is_none() => {
                    state.globals.seat = Some((name, version));
                }
                "ext_idle_notifier_v1" => state.globals.notifier = Some((name, version)),
                _ => {}
            }
        }
    }
}

impl Dispatch<ExtIdleNotificationV1, ()> for IdleState {
    fn event(
        state: &mut Self,
        _proxy: &ExtIdleNotificationV1,
        event: ext_idle_notification_v1::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
        match event {
            ext_idle_notification_v1::Event::Idled => {
                state.send(Trigger::DisplayPowerOff.event("idle timeout reached"));
            }
            ext_idle_notification_v1::Event::Resumed => {
                state.send(Trigger::PointerMoved.event("input resumed"));
            }
            _ => {}
        }
    }
}

impl Dispatch<WlSeat, ()> for IdleState {
    fn event(
        _state: &mut Self,
        _proxy: &WlSeat,
        _event: <WlSeat as wayland_client::Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<WlCallback, ()> for IdleState {
    fn event(
        _state: &mut Self,
        _proxy: &WlCallback,
        _event: wl_callback::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}

impl Dispatch<ExtIdleNotifierV1, ()> for IdleState {
    fn event(
        _state: &mut Self,
        _proxy: &ExtIdleNotifierV1,
        _event: <ExtIdleNotifierV1 as wayland_client::Proxy>::Event,
        _data: &(),
        _conn: &Connection,
        _qh: &QueueHandle<Self>,
    ) {
    }
}
