//! WebSocket connection and event loop.
//!
//! This module handles one transport session with the gateway, including
//! the handshake, request/response correlation and event routing.
//!
//! # Event Loop
//!
//! Each connection spawns a tokio task that handles:
//!
//! - Incoming messages from the gateway (responses, events)
//! - Outgoing request frames from callers
//! - Request/response correlation by ID
//! - Event handler callbacks
//!
//! # Lifecycle
//!
//! 1. [`Connection::open`] - Open the socket, send `connect`, wait for the answer
//! 2. [`Connection::call`] - Any number of concurrent calls
//! 3. [`Connection::close`] - Reject pending calls, close the socket
//!
//! A connection is never reused. After it closes, open a new one.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{WebSocketStream, connect_async};
use tracing::{debug, error, info, trace, warn};

use crate::client::GatewayConfig;
use crate::error::{Error, Result};
use crate::identifiers::{ConnectionId, RequestId};
use crate::protocol::{CONNECT_METHOD, Frame, HelloOk, codec, params_object};

use super::ConnectionState;
use super::dispatch::{EventDispatcher, GatewayEvent};
use super::pending::{CancelOnDrop, PendingCallInfo, PendingTable};

// ============================================================================
// Constants
// ============================================================================

/// How long [`Connection::close`] waits for the event loop to finish.
const CLOSE_TIMEOUT: Duration = Duration::from_secs(5);

/// Close reason when the local side asked for it.
const REASON_LOCAL_CLOSE: &str = "connection closed locally";

/// Close reason when the handshake failed.
const REASON_HANDSHAKE_FAILED: &str = "handshake failed";

// ============================================================================
// Types
// ============================================================================

/// Internal commands for the event loop.
enum ConnectionCommand {
    /// Write an encoded request frame.
    Transmit { id: RequestId, text: String },
    /// Close the socket.
    Shutdown { reason: String },
}

/// State shared between connection handles and the event loop.
struct Shared {
    /// Connection ID for logs.
    id: ConnectionId,
    /// Pending calls. Owned by this connection only.
    pending: PendingTable,
    /// Observable state.
    state: watch::Sender<ConnectionState>,
    /// Event routing.
    dispatcher: Arc<EventDispatcher>,
    /// Negotiated protocol version.
    protocol: OnceLock<u32>,
}

impl Shared {
    /// Moves to a closed state, rejecting all pending calls first.
    ///
    /// Returns `false` if the connection was already closed.
    fn mark_closed(&self, next: ConnectionState, reason: &str) -> bool {
        let rejected = self.pending.sweep(reason);
        let changed = self.state.send_if_modified(|state| {
            if state.is_closed() {
                false
            } else {
                *state = next;
                true
            }
        });

        if changed {
            debug!(connection = %self.id, state = %next, rejected, reason, "Connection closed");
        }
        changed
    }
}

// ============================================================================
// Connection
// ============================================================================

/// WebSocket connection to the gateway.
///
/// Handles request/response correlation and event routing.
/// The connection spawns an internal event loop task.
///
/// # Thread Safety
///
/// `Connection` is `Send + Sync` and cheap to clone; clones share the same
/// socket. When the last clone is dropped the event loop closes the socket.
#[derive(Clone)]
pub struct Connection {
    /// State shared with the event loop.
    shared: Arc<Shared>,
    /// Channel for sending commands to the event loop.
    command_tx: mpsc::UnboundedSender<ConnectionCommand>,
    /// Event loop task, taken by the first `close()`.
    event_loop: Arc<Mutex<Option<JoinHandle<()>>>>,
}

impl Connection {
    /// Opens a connection and completes the handshake.
    ///
    /// On success the connection is `connected`. On failure the socket has
    /// already been closed.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionTimeout`] if the socket does not open in time
    /// - [`Error::WebSocket`] if the socket cannot be opened
    /// - [`Error::HandshakeRejected`] if the gateway refuses the handshake
    /// - [`Error::HandshakeTimeout`] if the gateway does not answer in time
    /// - [`Error::HandshakeMalformed`] if the `hello-ok` payload is mistyped
    /// - [`Error::ProtocolMismatch`] if the gateway picks an unsupported version
    /// - [`Error::ConnectionLost`] if the socket drops during the handshake
    pub async fn open(config: &GatewayConfig, dispatcher: Arc<EventDispatcher>) -> Result<Self> {
        let id = ConnectionId::generate();
        info!(connection = %id, url = %config.url(), "Connecting to gateway");

        let connect_timeout = config.connect_timeout();
        let (ws_stream, _response) = timeout(connect_timeout, connect_async(config.url().as_str()))
            .await
            .map_err(|_| Error::connection_timeout(connect_timeout.as_millis() as u64))??;

        let connection = Self::from_stream(id, ws_stream, dispatcher, config.max_pending());

        if let Err(e) = connection.handshake(config).await {
            warn!(connection = %id, error = %e, "Gateway handshake failed");
            connection
                .shared
                .mark_closed(ConnectionState::Error, REASON_HANDSHAKE_FAILED);
            connection.shutdown(REASON_HANDSHAKE_FAILED).await;
            return Err(e);
        }

        Ok(connection)
    }

    /// Wraps an open WebSocket stream and spawns its event loop.
    ///
    /// The connection starts in `connecting`; the caller runs the handshake.
    pub(crate) fn from_stream<S>(
        id: ConnectionId,
        ws_stream: WebSocketStream<S>,
        dispatcher: Arc<EventDispatcher>,
        max_pending: usize,
    ) -> Self
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(ConnectionState::Connecting);

        let shared = Arc::new(Shared {
            id,
            pending: PendingTable::new(max_pending),
            state,
            dispatcher,
            protocol: OnceLock::new(),
        });

        let handle = tokio::spawn(Self::run_event_loop(
            ws_stream,
            command_rx,
            Arc::clone(&shared),
        ));

        Self {
            shared,
            command_tx,
            event_loop: Arc::new(Mutex::new(Some(handle))),
        }
    }

    /// Sends `connect` and records the negotiated version.
    async fn handshake(&self, config: &GatewayConfig) -> Result<u32> {
        let (min, max) = config.protocol_range();
        let params = params_object(&config.connect_params())?;

        let payload = self
            .request(
                RequestId::handshake(),
                CONNECT_METHOD,
                params,
                config.handshake_timeout(),
            )
            .await
            .map_err(|e| match e {
                Error::Remote { error, .. } => Error::HandshakeRejected { error },
                Error::RequestTimeout { timeout_ms, .. } => Error::handshake_timeout(timeout_ms),
                other => other,
            })?;

        let hello = HelloOk::from_payload(payload)?;
        let version = hello.negotiate(min, max)?;

        let promoted = self.shared.state.send_if_modified(|state| {
            if *state == ConnectionState::Connecting {
                *state = ConnectionState::Connected;
                true
            } else {
                false
            }
        });
        if !promoted {
            return Err(Error::connection_lost("closed during handshake"));
        }

        let _ = self.shared.protocol.set(version);
        info!(
            connection = %self.shared.id,
            protocol = version,
            server = ?hello.server,
            "Gateway handshake completed"
        );

        Ok(version)
    }

    /// Calls `method` and waits for its result.
    ///
    /// Fails immediately with [`Error::NotConnected`] unless the connection
    /// is `connected`; nothing is queued.
    ///
    /// # Arguments
    ///
    /// * `method` - Method name, e.g. `agent.run`
    /// * `params` - Anything that serializes to a JSON object (or `()`)
    /// * `call_timeout` - Maximum time to wait for the response
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if the connection is not `connected`
    /// - [`Error::InvalidArgument`] if `params` is not an object, or
    ///   `call_timeout` is too large to compute a deadline
    /// - [`Error::TooManyPending`] if too many calls are in flight
    /// - [`Error::Remote`] if the gateway answered with `success: false`
    /// - [`Error::RequestTimeout`] if no response arrived in time
    /// - [`Error::ConnectionLost`] if the connection closed first
    pub async fn call<P>(&self, method: &str, params: &P, call_timeout: Duration) -> Result<Value>
    where
        P: Serialize + ?Sized,
    {
        if !self.state().is_connected() {
            return Err(Error::NotConnected);
        }

        let params = params_object(params)?;
        self.request(RequestId::next(), method, params, call_timeout)
            .await
    }

    /// Registers, transmits and awaits one request. No state check.
    async fn request(
        &self,
        id: RequestId,
        method: &str,
        params: Map<String, Value>,
        call_timeout: Duration,
    ) -> Result<Value> {
        let text = codec::encode(&Frame::request(id.clone(), method, params))?;

        // Register before sending so the response cannot beat the entry.
        let mut receiver = self
            .shared
            .pending
            .register(id.clone(), method, call_timeout)?;
        let _guard = CancelOnDrop::new(&self.shared.pending, id.clone());

        self.command_tx
            .send(ConnectionCommand::Transmit {
                id: id.clone(),
                text,
            })
            .map_err(|_| Error::connection_lost("event loop stopped"))?;

        let waited = timeout(call_timeout, &mut receiver).await;
        match waited {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(_)) => Err(Error::connection_lost("call abandoned")),
            Err(_) => {
                if self.shared.pending.expire(&id) {
                    Err(Error::request_timeout(
                        id,
                        method,
                        call_timeout.as_millis() as u64,
                    ))
                } else {
                    // Settled in the same instant the timer fired.
                    receiver
                        .await
                        .unwrap_or_else(|_| Err(Error::connection_lost("call abandoned")))
                }
            }
        }
    }

    /// Closes the connection.
    ///
    /// Pending calls are rejected with [`Error::ConnectionLost`] before this
    /// returns. Closing twice is the same as closing once.
    pub async fn close(&self) {
        self.shared
            .mark_closed(ConnectionState::Disconnected, REASON_LOCAL_CLOSE);
        self.shutdown(REASON_LOCAL_CLOSE).await;
    }

    /// Stops the event loop and waits for the socket to close.
    async fn shutdown(&self, reason: &str) {
        let _ = self.command_tx.send(ConnectionCommand::Shutdown {
            reason: reason.to_string(),
        });

        let handle = self.event_loop.lock().take();
        if let Some(mut handle) = handle {
            match timeout(CLOSE_TIMEOUT, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!(connection = %self.shared.id, error = %e, "Event loop task failed"),
                Err(_) => {
                    warn!(connection = %self.shared.id, "Event loop did not stop, aborting");
                    handle.abort();
                }
            }
        }
    }

    /// Waits until the connection is `disconnected` or `error`.
    pub async fn closed(&self) {
        let mut state_rx = self.shared.state.subscribe();
        let _ = state_rx.wait_for(|state| state.is_closed()).await;
    }

    /// Returns the connection ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> ConnectionId {
        self.shared.id
    }

    /// Returns the current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        *self.shared.state.borrow()
    }

    /// Subscribes to state changes.
    #[inline]
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.shared.state.subscribe()
    }

    /// Returns the negotiated protocol version, once the handshake succeeded.
    #[inline]
    #[must_use]
    pub fn protocol_version(&self) -> Option<u32> {
        self.shared.protocol.get().copied()
    }

    /// Returns the number of pending requests.
    #[inline]
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.shared.pending.len()
    }

    /// Lists pending requests, earliest deadline first.
    #[must_use]
    pub fn pending_calls(&self) -> Vec<PendingCallInfo> {
        self.shared.pending.snapshot()
    }

    /// Event loop that handles WebSocket I/O.
    async fn run_event_loop<S>(
        ws_stream: WebSocketStream<S>,
        mut command_rx: mpsc::UnboundedReceiver<ConnectionCommand>,
        shared: Arc<Shared>,
    ) where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (mut ws_write, mut ws_read) = ws_stream.split();

        let reason = loop {
            tokio::select! {
                // Incoming messages from the gateway
                message = ws_read.next() => {
                    match message {
                        Some(Ok(Message::Text(text))) => {
                            Self::handle_incoming_message(text.as_bytes(), &shared);
                        }

                        Some(Ok(Message::Binary(data))) => {
                            Self::handle_incoming_message(&data, &shared);
                        }

                        Some(Ok(Message::Close(frame))) => {
                            debug!(connection = %shared.id, ?frame, "WebSocket closed by gateway");
                            break "closed by gateway".to_string();
                        }

                        Some(Err(e)) => {
                            error!(connection = %shared.id, error = %e, "WebSocket error");
                            break format!("transport error: {e}");
                        }

                        None => {
                            debug!(connection = %shared.id, "WebSocket stream ended");
                            break "stream ended".to_string();
                        }

                        // Ping/Pong are answered by tungstenite
                        _ => {}
                    }
                }

                // Commands from callers
                command = command_rx.recv() => {
                    match command {
                        Some(ConnectionCommand::Transmit { id, text }) => {
                            if let Err(reason) = Self::transmit(&mut ws_write, &shared, id, text).await {
                                break reason;
                            }
                        }

                        Some(ConnectionCommand::Shutdown { reason }) => {
                            debug!(connection = %shared.id, %reason, "Shutdown command received");
                            let _ = ws_write.close().await;
                            break reason;
                        }

                        None => {
                            debug!(connection = %shared.id, "All connection handles dropped");
                            let _ = ws_write.close().await;
                            break REASON_LOCAL_CLOSE.to_string();
                        }
                    }
                }
            }
        };

        // Fail all pending requests on shutdown
        shared.mark_closed(ConnectionState::Disconnected, &reason);

        debug!(connection = %shared.id, "Event loop terminated");
    }

    /// Writes one request frame. On failure the request is rejected and the
    /// loop must stop.
    async fn transmit<S>(
        ws_write: &mut SplitSink<WebSocketStream<S>, Message>,
        shared: &Shared,
        id: RequestId,
        text: String,
    ) -> std::result::Result<(), String>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        match ws_write.send(Message::Text(text.into())).await {
            Ok(()) => {
                trace!(connection = %shared.id, %id, "Request sent");
                Ok(())
            }
            Err(e) => {
                shared.pending.fail(&id, Error::connection(e.to_string()));
                Err(format!("write failed: {e}"))
            }
        }
    }

    /// Handles one inbound message from the gateway.
    fn handle_incoming_message(bytes: &[u8], shared: &Shared) {
        match codec::decode(bytes) {
            Ok(Frame::Response {
                id,
                success,
                payload,
                error,
            }) => {
                if !shared.pending.settle(&id, success, payload, error) {
                    debug!(connection = %shared.id, %id, "Response for unknown request");
                }
            }

            Ok(Frame::Event { name, payload, seq }) => {
                trace!(connection = %shared.id, %name, ?seq, "Event received");
                shared
                    .dispatcher
                    .dispatch(&GatewayEvent { name, payload, seq });
            }

            Ok(Frame::Request { id, method, .. }) => {
                warn!(connection = %shared.id, %id, %method, "Ignoring request from gateway");
            }

            Err(e) => {
                warn!(
                    connection = %shared.id,
                    error = %e,
                    len = bytes.len(),
                    "Failed to parse incoming message"
                );
            }
        }
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.shared.id)
            .field("state", &self.state())
            .field("protocol", &self.protocol_version())
            .field("pending", &self.pending_count())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
