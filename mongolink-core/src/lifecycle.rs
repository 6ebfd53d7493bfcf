//! Connection lifecycle events and observers.
//!
//! The driver owns the connection state machine:
//!
//! ```text
//! disconnected -> connecting -> connected -> (error | disconnected)
//! ```
//!
//! [`LifecycleMonitor`] only watches it. It is installed as the driver's
//! SDAM event handler before any I/O happens and translates the driver's
//! topology view into [`LifecycleEvent`]s for every registered
//! [`LifecycleObserver`]. A single server failing a heartbeat is not a
//! disconnect; the connection is lost only when the topology has no
//! readable or writable server left. `Open` is announced once the initial
//! connect call succeeds, right after `Connected`.
//!
//! Errors are fatal and never retried. Instead of unwinding out of a driver
//! callback they are handed to observers and published to
//! [`Connection::fatal_error`](crate::client::Connection::fatal_error).

use std::fmt;
use std::sync::Arc;

use mongodb::event::sdam::{
    SdamEventHandler, ServerHeartbeatFailedEvent, ServerHeartbeatSucceededEvent,
    TopologyClosedEvent, TopologyDescriptionChangedEvent,
};
use parking_lot::Mutex;
use tokio::sync::watch;
use tracing::{debug, error, info};

use crate::error::ConnectError;

/// Connection state as observed from driver events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No usable server.
    Disconnected,
    /// Waiting for the first server to answer.
    Connecting,
    /// At least one server answered.
    Connected,
}

/// A lifecycle transition.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    /// The client was created and is looking for servers.
    Connecting,
    /// A server answered.
    Connected,
    /// The initial connect call completed.
    Open,
    /// The connection was lost or closed.
    Disconnected,
    /// A fatal error.
    Error(Arc<ConnectError>),
}

impl LifecycleEvent {
    /// Event name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Open => "open",
            Self::Disconnected => "disconnected",
            Self::Error(_) => "error",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Error(err) => write!(f, "error: {}", err),
            other => f.write_str(other.name()),
        }
    }
}

/// Callback invoked on every lifecycle transition.
///
/// Observers run on driver tasks and must not block.
pub trait LifecycleObserver: Send + Sync {
    /// Handle an event for the connection identified by `uri` (redacted).
    fn on_event(&self, uri: &str, event: &LifecycleEvent);
}

/// Logs every transition through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingObserver;

impl LifecycleObserver for LoggingObserver {
    fn on_event(&self, uri: &str, event: &LifecycleEvent) {
        match event {
            LifecycleEvent::Connecting => debug!(uri = %uri, "MongoDB connecting"),
            LifecycleEvent::Connected => info!(uri = %uri, "MongoDB connected"),
            LifecycleEvent::Open => info!(uri = %uri, "MongoDB connection open"),
            LifecycleEvent::Disconnected => info!(uri = %uri, "MongoDB disconnected"),
            LifecycleEvent::Error(err) => error!(uri = %uri, error = %err, "MongoDB connection error"),
        }
    }
}

/// Adapts a closure into an observer.
pub struct FnObserver<F>(F);

impl<F> FnObserver<F>
where
    F: Fn(&str, &LifecycleEvent) + Send + Sync,
{
    /// Wrap a closure.
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> LifecycleObserver for FnObserver<F>
where
    F: Fn(&str, &LifecycleEvent) + Send + Sync,
{
    fn on_event(&self, uri: &str, event: &LifecycleEvent) {
        (self.0)(uri, event)
    }
}

/// Tracks connection state and fans events out to observers.
pub struct LifecycleMonitor {
    uri: String,
    state: Mutex<ConnectionState>,
    observers: Vec<Arc<dyn LifecycleObserver>>,
    fatal: watch::Sender<Option<Arc<ConnectError>>>,
    last_failure: Mutex<Option<ConnectError>>,
}

impl fmt::Debug for LifecycleMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleMonitor")
            .field("uri", &self.uri)
            .field("state", &*self.state.lock())
            .field("observers", &self.observers.len())
            .finish()
    }
}

impl LifecycleMonitor {
    /// Create a monitor for `uri` (already redacted) with the given
    /// observers, starting out disconnected.
    pub fn new(uri: impl Into<String>, observers: Vec<Arc<dyn LifecycleObserver>>) -> Self {
        let (fatal, _) = watch::channel(None);
        Self {
            uri: uri.into(),
            state: Mutex::new(ConnectionState::Disconnected),
            observers,
            fatal,
            last_failure: Mutex::new(None),
        }
    }

    /// The redacted URI reported to observers.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    /// The client was created.
    pub fn starting(&self) {
        *self.state.lock() = ConnectionState::Connecting;
        self.emit(LifecycleEvent::Connecting);
    }

    /// A server answered. Announces `Connected` once per outage.
    pub fn server_reachable(&self) {
        if self.transition(ConnectionState::Connected) {
            self.emit(LifecycleEvent::Connected);
        }
    }

    /// One server failed a heartbeat. The failure is remembered as the
    /// likely cause should the whole topology become unavailable, but the
    /// connection state is left alone.
    pub fn heartbeat_failed(&self, server: &str, err: ConnectError) {
        debug!(uri = %self.uri, server = %server, error = %err, "Heartbeat failed");
        *self.last_failure.lock() = Some(err);
    }

    /// The driver's view of the deployment changed. `available` is whether
    /// any server can still serve reads or writes.
    ///
    /// Losing every server after having connected emits `Disconnected` and a
    /// fatal error. Unavailability while still connecting is left to the
    /// initial connect result.
    pub fn topology_changed(&self, available: bool) {
        if available {
            self.last_failure.lock().take();
            self.server_reachable();
            return;
        }

        let was_connected = {
            let mut state = self.state.lock();
            let was_connected = *state == ConnectionState::Connected;
            if was_connected {
                *state = ConnectionState::Disconnected;
            }
            was_connected
        };

        if !was_connected {
            debug!(uri = %self.uri, "No server available yet");
            return;
        }

        let cause = self
            .last_failure
            .lock()
            .take()
            .unwrap_or_else(|| ConnectError::connection("no reachable servers"));
        self.emit(LifecycleEvent::Disconnected);
        self.fail(cause);
    }

    /// The initial connect call completed.
    pub fn opened(&self) {
        self.server_reachable();
        self.emit(LifecycleEvent::Open);
    }

    /// Report a fatal error. The first one is kept for
    /// [`fatal_error`](Self::fatal_error).
    pub fn fail(&self, err: ConnectError) {
        let err = Arc::new(err);
        self.fatal.send_if_modified(|slot| {
            if slot.is_none() {
                *slot = Some(err.clone());
                true
            } else {
                false
            }
        });
        self.emit(LifecycleEvent::Error(err));
    }

    /// The client was shut down.
    pub fn closed(&self) {
        let previous = {
            let mut state = self.state.lock();
            std::mem::replace(&mut *state, ConnectionState::Disconnected)
        };
        if previous != ConnectionState::Disconnected {
            self.emit(LifecycleEvent::Disconnected);
        }
    }

    /// Wait for the first fatal error. Resolves immediately if one was
    /// already reported.
    pub async fn fatal_error(&self) -> Option<Arc<ConnectError>> {
        let mut rx = self.fatal.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            if current.is_some() {
                return current;
            }
            if rx.changed().await.is_err() {
                return None;
            }
        }
    }

    /// The first fatal error, if any, without waiting.
    pub fn last_error(&self) -> Option<Arc<ConnectError>> {
        self.fatal.borrow().clone()
    }

    fn transition(&self, next: ConnectionState) -> bool {
        let mut state = self.state.lock();
        if *state == next {
            return false;
        }
        *state = next;
        true
    }

    fn emit(&self, event: LifecycleEvent) {
        for observer in &self.observers {
            observer.on_event(&self.uri, &event);
        }
    }
}

impl SdamEventHandler for LifecycleMonitor {
    fn handle_server_heartbeat_succeeded_event(&self, event: ServerHeartbeatSucceededEvent) {
        debug!(server = %event.server_address, "Heartbeat succeeded");
        self.server_reachable();
    }

    fn handle_server_heartbeat_failed_event(&self, event: ServerHeartbeatFailedEvent) {
        self.heartbeat_failed(
            &event.server_address.to_string(),
            ConnectError::Driver(event.failure),
        );
    }

    fn handle_topology_description_changed_event(&self, event: TopologyDescriptionChangedEvent) {
        let description = &event.new_description;
        let available = description.has_writable_server() || description.has_readable_server(None);
        self.topology_changed(available);
    }

    fn handle_topology_closed_event(&self, _event: TopologyClosedEvent) {
        self.closed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<&'static str>>,
    }

    impl LifecycleObserver for Recorder {
        fn on_event(&self, _uri: &str, event: &LifecycleEvent) {
            self.events.lock().push(event.name());
        }
    }

    fn monitor() -> (LifecycleMonitor, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let monitor = LifecycleMonitor::new(
            "mongodb://localhost:27017/test",
            vec![Arc::new(LoggingObserver), recorder.clone()],
        );
        (monitor, recorder)
    }

    #[test]
    fn test_connect_sequence() {
        let (monitor, recorder) = monitor();
        assert_eq!(monitor.state(), ConnectionState::Disconnected);

        monitor.starting();
        assert_eq!(monitor.state(), ConnectionState::Connecting);

        monitor.server_reachable();
        monitor.server_reachable();
        monitor.opened();

        assert_eq!(monitor.state(), ConnectionState::Connected);
        assert_eq!(
            *recorder.events.lock(),
            vec!["connecting", "connected", "open"]
        );
    }

    #[test]
    fn test_failure_while_connecting_is_not_fatal() {
        let (monitor, recorder) = monitor();
        monitor.starting();
        monitor.heartbeat_failed("127.0.0.1:1", ConnectError::connection("refused"));
        monitor.topology_changed(false);

        assert_eq!(monitor.state(), ConnectionState::Connecting);
        assert!(monitor.last_error().is_none());
        assert_eq!(*recorder.events.lock(), vec!["connecting"]);
    }

    #[test]
    fn test_lost_connection_is_fatal() {
        let (monitor, recorder) = monitor();
        monitor.starting();
        monitor.server_reachable();
        monitor.heartbeat_failed("db-0:27017", ConnectError::connection("reset by peer"));
        monitor.topology_changed(false);

        assert_eq!(monitor.state(), ConnectionState::Disconnected);
        assert_eq!(
            *recorder.events.lock(),
            vec!["connecting", "connected", "disconnected", "error"]
        );
        let err = monitor.last_error().unwrap();
        assert!(err.is_connection_error());
    }

    #[test]
    fn test_single_server_loss_keeps_connection() {
        let (monitor, recorder) = monitor();
        monitor.starting();
        monitor.topology_changed(true);

        // One secondary misses a heartbeat while the primary keeps answering
        monitor.heartbeat_failed(
            "secondary-2:27017",
            ConnectError::connection("secondary-2 heartbeat failed"),
        );
        monitor.topology_changed(true);
        monitor.server_reachable();

        assert_eq!(monitor.state(), ConnectionState::Connected);
        assert!(monitor.last_error().is_none());
        assert_eq!(*recorder.events.lock(), vec!["connecting", "connected"]);
    }

    #[test]
    fn test_recovered_failure_is_not_blamed_later() {
        let (monitor, _) = monitor();
        monitor.starting();
        monitor.topology_changed(true);
        monitor.heartbeat_failed("db-1:27017", ConnectError::connection("blip"));
        monitor.topology_changed(true);
        monitor.topology_changed(false);

        assert_eq!(
            monitor.last_error().unwrap().to_string(),
            "connection error: no reachable servers"
        );
    }

    #[test]
    fn test_first_error_is_kept() {
        let (monitor, _) = monitor();
        monitor.fail(ConnectError::connection("first"));
        monitor.fail(ConnectError::connection("second"));

        assert_eq!(
            monitor.last_error().unwrap().to_string(),
            "connection error: first"
        );
    }

    #[test]
    fn test_closed_emits_disconnected_once() {
        let (monitor, recorder) = monitor();
        monitor.starting();
        monitor.closed();
        monitor.closed();

        assert_eq!(
            *recorder.events.lock(),
            vec!["connecting", "disconnected"]
        );
    }

    #[tokio::test]
    async fn test_fatal_error_wakes_waiter() {
        let (monitor, _) = monitor();
        let monitor = Arc::new(monitor);

        let waiter = {
            let monitor = monitor.clone();
            tokio::spawn(async move { monitor.fatal_error().await })
        };

        tokio::task::yield_now().await;
        monitor.fail(ConnectError::connection("boom"));

        let err = waiter.await.unwrap().unwrap();
        assert_eq!(err.to_string(), "connection error: boom");
    }

    #[test]
    fn test_fn_observer() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let observer = FnObserver::new(move |uri: &str, event: &LifecycleEvent| {
            sink.lock().push(format!("{} {}", event, uri));
        });

        observer.on_event("mongodb://h/db", &LifecycleEvent::Open);
        assert_eq!(*seen.lock(), vec!["open mongodb://h/db".to_string()]);
    }
}
