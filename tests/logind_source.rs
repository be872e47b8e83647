//! Drives the logind source against a fake login1 manager and session on a
//! private bus.
//!
//! Skipped when `dbus-daemon` is not installed.

mod common;

use sleepchecker_idled::domain::EventKind;
use sleepchecker_idled::source::{EventSource, LogindSource};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use zbus::connection;
use zbus::object_server::SignalEmitter;
use zbus::zvariant::{ObjectPath, OwnedObjectPath};

const SERVICE: &str = "org.freedesktop.login1";
const MANAGER_PATH: &str = "/org/freedesktop/login1";
const SESSION_PATH: &str = "/org/freedesktop/login1/session/_31";

struct FakeManager;

#[zbus::interface(name = "org.freedesktop.login1.Manager")]
impl FakeManager {
    fn get_session(&self, _session_id: &str) -> OwnedObjectPath {
        ObjectPath::from_static_str_unchecked(SESSION_PATH).into()
    }
}

#[derive(Default)]
struct FakeSession {
    locked_hint: bool,
}

#[zbus::interface(name = "org.freedesktop.login1.Session")]
impl FakeSession {
    #[zbus(property)]
    fn locked_hint(&self) -> bool {
        self.locked_hint
    }

    #[zbus(signal)]
    async fn lock(emitter: &SignalEmitter<'_>) -> zbus::Result<()>;
}

#[tokio::test]
async fn test_not_found_on_empty_bus() {
    let Some(daemon) = common::launch_bus() else {
        return;
    };

    let mut source = LogindSource::with_connection(common::connect(&daemon).await);
    assert!(!source.probe().await);
}

#[tokio::test]
async fn test_lock_then_locked_hint_cleared() {
    let Some(daemon) = common::launch_bus() else {
        return;
    };

    let server = connection::Builder::address(daemon.address())
        .unwrap()
        .name(SERVICE)
        .unwrap()
        .serve_at(MANAGER_PATH, FakeManager)
        .unwrap()
        .serve_at(SESSION_PATH, FakeSession::default())
        .unwrap()
        .build()
        .await
        .unwrap();
    let session = server
        .object_server()
        .interface::<_, FakeSession>(SESSION_PATH)
        .await
        .unwrap();

    let mut source = Box::new(LogindSource::with_connection(
        common::connect(&daemon).await,
    ));
    assert!(source.probe().await);

    let (tx, mut rx) = mpsc::channel(8);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(source.run(tx, cancel.clone()));

    let locked = common::emit_until(
        &mut rx,
        async || FakeSession::lock(session.signal_emitter()).await.unwrap(),
        |e| e.source == "session locked",
    )
    .await;
    assert_eq!(locked.kind, EventKind::Idle);

    let set_hint = async |locked: bool| {
        let mut state = session.get_mut().await;
        state.locked_hint = locked;
        state
            .locked_hint_changed(session.signal_emitter())
            .await
            .unwrap();
    };

    // Lock screens set the hint without a further Lock signal.
    let hinted = common::emit_until(&mut rx, async || set_hint(true).await, |e| {
        e.source == "session lock hint set"
    })
    .await;
    assert_eq!(hinted.kind, EventKind::Idle);

    // Unlocking at the greeter only clears the hint; no Unlock signal.
    let unlocked = common::emit_until(&mut rx, async || set_hint(false).await, |e| {
        e.kind == EventKind::Activity
    })
    .await;
    assert_eq!(unlocked.source, "session unlocked");

    cancel.cancel();
    task.await.unwrap().unwrap();
}
