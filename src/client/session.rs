//! Persistent gateway session.
//!
//! A [`GatewaySession`] keeps one connection open for its lifetime and
//! replaces it when it drops, pacing attempts with a [`Backoff`].
//!
//! ```text
//! connect() ──► supervisor task
//!                 loop {
//!                   connecting → open + handshake
//!                     ok  → connected … wait until closed → disconnected
//!                     err → error (last_error set)
//!                   next backoff delay, or give up (ReconnectExhausted)
//!                 }
//! ```
//!
//! Calls are never queued: while the session is not `connected`, they fail
//! at once with [`Error::NotConnected`].

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::transport::{
    Backoff, Connection, ConnectionState, EventDispatcher, EventHandler, PendingCallInfo,
};

use super::GatewayConfig;

// ============================================================================
// SessionInner
// ============================================================================

/// State shared with the supervisor task.
struct SessionInner {
    config: GatewayConfig,
    /// Outlives every connection, so the handler survives reconnects.
    dispatcher: Arc<EventDispatcher>,
    status: watch::Sender<ConnectionState>,
    /// The live connection, if any.
    current: Mutex<Option<Connection>>,
    supervisor: Mutex<Option<JoinHandle<()>>>,
    last_error: Mutex<Option<Arc<Error>>>,
}

impl SessionInner {
    fn set_status(&self, next: ConnectionState) {
        let changed = self.status.send_if_modified(|state| {
            let changed = *state != next;
            *state = next;
            changed
        });
        if changed {
            debug!(status = %next, "Session status changed");
        }
    }

    fn record_error(&self, error: Error) {
        *self.last_error.lock() = Some(Arc::new(error));
    }

    /// Connects, waits for the connection to end, and repeats with backoff.
    async fn supervise(self: Arc<Self>) {
        let mut backoff = Backoff::new(self.config.reconnect().clone());

        loop {
            self.set_status(ConnectionState::Connecting);

            match Connection::open(&self.config, Arc::clone(&self.dispatcher)).await {
                Ok(connection) => {
                    backoff.reset();
                    *self.current.lock() = Some(connection.clone());
                    self.set_status(ConnectionState::Connected);
                    info!(connection = %connection.id(), "Session connected");

                    connection.closed().await;

                    self.current.lock().take();
                    self.set_status(ConnectionState::Disconnected);
                    warn!(connection = %connection.id(), "Session connection lost");
                }
                Err(e) => {
                    warn!(error = %e, retries = backoff.attempts(), "Connection attempt failed");
                    self.record_error(e);
                    self.set_status(ConnectionState::Error);
                }
            }

            match backoff.next_delay() {
                Some(delay) => {
                    debug!(?delay, retry = backoff.attempts(), "Reconnecting after delay");
                    tokio::time::sleep(delay).await;
                }
                None => {
                    let attempts = backoff.attempts();
                    error!(attempts, "Reconnect attempts exhausted");
                    self.record_error(Error::ReconnectExhausted { attempts });
                    self.set_status(ConnectionState::Error);
                    return;
                }
            }
        }
    }
}

// ============================================================================
// GatewaySession
// ============================================================================

/// Long-lived, self-healing gateway session.
///
/// Dropping the session stops reconnecting and closes the connection.
///
/// # Example
///
/// ```no_run
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// use gateway_rpc::{ConnectionState, GatewayConfig, GatewayEvent, GatewaySession};
///
/// # async fn example() -> gateway_rpc::Result<()> {
/// let config = GatewayConfig::builder()
///     .url("ws://127.0.0.1:18789")
///     .token("secret")
///     .build()?;
///
/// let session = GatewaySession::new(config);
/// session.set_event_handler(Arc::new(|event: &GatewayEvent| {
///     println!("{}: {}", event.name, event.payload);
/// }));
///
/// session.connect();
/// session
///     .wait_for_status(ConnectionState::Connected, Duration::from_secs(10))
///     .await?;
///
/// let sessions = session.send_request("sessions.list", &()).await?;
/// # Ok(())
/// # }
/// ```
pub struct GatewaySession {
    inner: Arc<SessionInner>,
}

impl GatewaySession {
    /// Creates a disconnected session.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        let (status, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            inner: Arc::new(SessionInner {
                config,
                dispatcher: Arc::new(EventDispatcher::new()),
                status,
                current: Mutex::new(None),
                supervisor: Mutex::new(None),
                last_error: Mutex::new(None),
            }),
        }
    }

    /// Starts connecting in the background.
    ///
    /// Returns immediately; use [`wait_for_status`](Self::wait_for_status) or
    /// [`subscribe`](Self::subscribe) to follow progress. Does nothing while
    /// the session is already connecting or connected.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn connect(&self) {
        let mut supervisor = self.inner.supervisor.lock();
        if let Some(handle) = supervisor.as_ref()
            && !handle.is_finished()
        {
            debug!("Session already active, connect ignored");
            return;
        }

        *self.inner.last_error.lock() = None;
        self.inner.set_status(ConnectionState::Connecting);
        *supervisor = Some(tokio::spawn(Arc::clone(&self.inner).supervise()));
    }

    /// Stops reconnecting and closes the connection.
    ///
    /// Pending calls are rejected with [`Error::ConnectionLost`] before this
    /// returns. Disconnecting twice is the same as disconnecting once.
    pub async fn disconnect(&self) {
        let supervisor = self.inner.supervisor.lock().take();
        if let Some(handle) = supervisor {
            handle.abort();
            let _ = handle.await;
        }

        let current = self.inner.current.lock().take();
        if let Some(connection) = current {
            connection.close().await;
            info!(connection = %connection.id(), "Session disconnected");
        }

        self.inner.set_status(ConnectionState::Disconnected);
    }

    /// Disconnects, then connects again with a fresh retry budget.
    pub async fn reconnect(&self) {
        self.disconnect().await;
        self.connect();
    }

    /// Returns the current status.
    ///
    /// Reports `disconnected` as soon as the live connection closes, before
    /// the supervisor has caught up.
    #[must_use]
    pub fn status(&self) -> ConnectionState {
        let status = *self.inner.status.borrow();
        if status.is_connected() && self.connection().is_none() {
            ConnectionState::Disconnected
        } else {
            status
        }
    }

    /// Subscribes to status changes.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.inner.status.subscribe()
    }

    /// Waits until the session reaches `target`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionTimeout`] if `target` is not reached in time.
    pub async fn wait_for_status(&self, target: ConnectionState, timeout: Duration) -> Result<()> {
        let mut status_rx = self.inner.status.subscribe();
        let reached = async { status_rx.wait_for(|status| *status == target).await.is_ok() };

        match tokio::time::timeout(timeout, reached).await {
            Ok(true) => Ok(()),
            Ok(false) | Err(_) => Err(Error::connection_timeout(timeout.as_millis() as u64)),
        }
    }

    /// Calls `method` with the configured request timeout.
    ///
    /// # Errors
    ///
    /// See [`send_request_with_timeout`](Self::send_request_with_timeout).
    pub async fn send_request<P>(&self, method: &str, params: &P) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        self.send_request_with_timeout(method, params, self.inner.config.request_timeout())
            .await
    }

    /// Calls `method` on the live connection.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the session is not `connected`
    /// - Any error from [`Connection::call`]
    pub async fn send_request_with_timeout<P>(
        &self,
        method: &str,
        params: &P,
        timeout: Duration,
    ) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        let Some(connection) = self.connection() else {
            return Err(Error::NotConnected);
        };
        connection.call(method, params, timeout).await
    }

    /// Sets the event handler, replacing any previous one.
    ///
    /// The handler keeps receiving events across reconnects.
    pub fn set_event_handler(&self, handler: EventHandler) {
        self.inner.dispatcher.set_handler(handler);
    }

    /// Removes the event handler.
    pub fn clear_event_handler(&self) {
        self.inner.dispatcher.clear_handler();
    }

    /// Returns the negotiated protocol version of the live connection.
    #[must_use]
    pub fn protocol_version(&self) -> Option<u32> {
        self.connection().and_then(|c| c.protocol_version())
    }

    /// Returns the number of calls waiting on the live connection.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.connection().map_or(0, |c| c.pending_count())
    }

    /// Lists calls waiting on the live connection, earliest deadline first.
    #[must_use]
    pub fn pending_calls(&self) -> Vec<PendingCallInfo> {
        self.connection()
            .map(|c| c.pending_calls())
            .unwrap_or_default()
    }

    /// Returns the most recent connection failure.
    #[must_use]
    pub fn last_error(&self) -> Option<Arc<Error>> {
        self.inner.last_error.lock().clone()
    }

    /// Returns the session configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.inner.config
    }

    fn connection(&self) -> Option<Connection> {
        self.inner
            .current
            .lock()
            .as_ref()
            .filter(|c| c.state().is_connected())
            .cloned()
    }
}

impl Drop for GatewaySession {
    fn drop(&mut self) {
        if let Some(handle) = self.inner.supervisor.lock().take() {
            handle.abort();
        }
    }
}

impl fmt::Debug for GatewaySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySession")
            .field("url", &self.inner.config.url().as_str())
            .field("status", &self.status())
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;
    use tokio_test::assert_ok;

    use crate::protocol::Frame;
    use crate::test_support::{MockGateway, eventually, rejecting_handshake};
    use crate::transport::{GatewayEvent, ReconnectPolicy};

    const WAIT: Duration = Duration::from_secs(5);

    async fn connected(mock: &MockGateway) -> GatewaySession {
        let session = GatewaySession::new(mock.config());
        session.connect();
        assert_ok!(session.wait_for_status(ConnectionState::Connected, WAIT).await);
        session
    }

    #[tokio::test]
    async fn test_connect_call_disconnect() {
        let mock = MockGateway::start().await;
        let session = connected(&mock).await;

        assert_eq!(session.protocol_version(), Some(3));
        let payload = session.send_request("echo", &json!({"v": 1})).await.expect("echo");
        assert_eq!(payload, json!({"v": 1}));

        session.disconnect().await;
        assert_eq!(session.status(), ConnectionState::Disconnected);

        let err = session.send_request("echo", &()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        eventually(|| mock.open_connections() == 0).await;
    }

    #[tokio::test]
    async fn test_not_connected_before_connect() {
        let mock = MockGateway::start().await;
        let session = GatewaySession::new(mock.config());

        assert_eq!(session.status(), ConnectionState::Disconnected);
        let err = session.send_request("echo", &()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(session.pending_count(), 0);
        assert_eq!(mock.connections(), 0);
    }

    #[tokio::test]
    async fn test_connect_and_disconnect_idempotent() {
        let mock = MockGateway::start().await;
        let session = connected(&mock).await;

        session.connect();
        session.connect();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(mock.connections(), 1);

        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.status(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_disconnect_rejects_pending() {
        let mock = MockGateway::start().await;
        let session = Arc::new(connected(&mock).await);

        let calls: Vec<_> = (0..3)
            .map(|_| {
                let session = Arc::clone(&session);
                tokio::spawn(async move {
                    session
                        .send_request_with_timeout("never", &(), Duration::from_secs(30))
                        .await
                })
            })
            .collect();
        eventually(|| session.pending_count() == 3).await;

        let snapshot = session.pending_calls();
        assert!(snapshot.iter().all(|call| call.method == "never"));

        session.disconnect().await;
        for call in calls {
            let err = call.await.expect("join").unwrap_err();
            assert!(matches!(err, Error::ConnectionLost { .. }), "got {err}");
        }
        assert_eq!(session.pending_count(), 0);
    }

    #[tokio::test]
    async fn test_reconnects_after_transport_loss() {
        let mock = MockGateway::start().await;
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);

        let session = GatewaySession::new(mock.config());
        session.set_event_handler(Arc::new(move |e: &GatewayEvent| {
            sink.lock().push(e.name.clone());
        }));
        session.connect();
        assert_ok!(session.wait_for_status(ConnectionState::Connected, WAIT).await);

        let mut status_rx = session.subscribe();
        mock.close_all();
        assert_ok!(
            tokio::time::timeout(WAIT, status_rx.wait_for(|s| !s.is_connected())).await
        );

        eventually(|| mock.connections() == 2).await;
        assert_ok!(session.wait_for_status(ConnectionState::Connected, WAIT).await);
        assert!(session.send_request("echo", &()).await.is_ok());

        mock.push(Frame::event("after.reconnect", json!({})));
        eventually(|| events.lock().len() == 1).await;
        assert_eq!(events.lock()[0], "after.reconnect");

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_status_follows_closed_connection() {
        let mock = MockGateway::start().await;
        let session = connected(&mock).await;
        let connection = session.inner.current.lock().clone().expect("live connection");

        mock.close_all();
        connection.closed().await;

        // The supervisor may not have run yet; status must agree with calls.
        assert_ne!(session.status(), ConnectionState::Connected);
        let err = session.send_request("echo", &()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_unbounded_timeout_is_an_error() {
        let mock = MockGateway::start().await;
        let session = connected(&mock).await;

        let err = session
            .send_request_with_timeout("echo", &(), Duration::MAX)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidArgument { .. }), "got {err}");
        assert_eq!(session.status(), ConnectionState::Connected);

        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_handshake_rejection_sets_error() {
        let mock = MockGateway::with_behavior(rejecting_handshake("unsupported version")).await;
        let config = mock
            .config_builder()
            .reconnect(ReconnectPolicy::fixed(Duration::from_secs(10)).with_max_attempts(1))
            .build()
            .expect("config");

        let session = GatewaySession::new(config);
        session.connect();
        assert_ok!(session.wait_for_status(ConnectionState::Error, WAIT).await);

        let last = session.last_error().expect("error recorded");
        assert!(last.is_handshake_error());
        assert!(last.to_string().contains("unsupported version"));
        assert_eq!(mock.methods(), vec!["connect"]);

        session.disconnect().await;
        assert_eq!(session.status(), ConnectionState::Disconnected);
    }

    #[tokio::test]
    async fn test_gives_up_after_retry_budget() {
        let mock = MockGateway::with_behavior(rejecting_handshake("nope")).await;
        let config = mock
            .config_builder()
            .reconnect(ReconnectPolicy::fixed(Duration::from_millis(10)).with_max_attempts(2))
            .build()
            .expect("config");

        let session = GatewaySession::new(config);
        session.connect();

        eventually(|| {
            session
                .last_error()
                .is_some_and(|e| matches!(*e, Error::ReconnectExhausted { attempts: 2 }))
        })
        .await;
        assert_eq!(session.status(), ConnectionState::Error);
        assert_eq!(mock.connections(), 3);

        // A new connect() starts over.
        session.connect();
        eventually(|| mock.connections() > 3).await;
        session.disconnect().await;
    }

    #[tokio::test]
    async fn test_wait_for_status_timeout() {
        let mock = MockGateway::start().await;
        let session = GatewaySession::new(mock.config());

        let err = session
            .wait_for_status(ConnectionState::Connected, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_reconnect_uses_fresh_connection() {
        let mock = MockGateway::start().await;
        let session = connected(&mock).await;

        session.reconnect().await;
        assert_ok!(session.wait_for_status(ConnectionState::Connected, WAIT).await);
        assert_eq!(mock.connections(), 2);
        assert_eq!(session.pending_count(), 0);

        session.disconnect().await;
    }
}
