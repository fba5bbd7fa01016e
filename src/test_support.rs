//! In-process gateway for tests.
//!
//! Listens on `127.0.0.1:0`, answers each decoded frame through a behavior
//! function, and records everything it receives.
//!
//! | Method | Standard reply |
//! |--------|----------------|
//! | `connect` | `{"type": "hello-ok", "protocol": 3}` |
//! | `echo` | The params |
//! | `sleep` | The params, after `params.ms` milliseconds |
//! | `fail` | Error `{"code": "E_FAIL", ...}` |
//! | `agent.run` | A canned agent reply |
//! | `never` | Nothing |
//! | `drop` | Closes the socket |

// ============================================================================
// Imports
// ============================================================================

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use crate::client::{GatewayConfig, GatewayConfigBuilder};
use crate::protocol::{Frame, codec};
use crate::transport::ReconnectPolicy;

// ============================================================================
// Types
// ============================================================================

/// What the mock does in answer to one frame.
pub(crate) enum Action {
    /// Send a frame now.
    Send(Frame),
    /// Send a frame after a delay, without blocking other replies.
    SendAfter(Duration, Frame),
    /// Close the socket.
    Close,
}

/// Maps each received frame to actions.
pub(crate) type Behavior = Arc<dyn Fn(&Frame) -> Vec<Action> + Send + Sync>;

enum Outbound {
    Text(String),
    Close,
}

#[derive(Default)]
struct Record {
    received: Mutex<Vec<Frame>>,
    accepted: AtomicUsize,
    open: AtomicUsize,
    peers: Mutex<Vec<mpsc::UnboundedSender<Outbound>>>,
}

// ============================================================================
// Behaviors
// ============================================================================

/// Replies described in the module table.
pub(crate) fn standard(frame: &Frame) -> Vec<Action> {
    let Frame::Request { id, method, params } = frame else {
        return Vec::new();
    };
    let id = id.clone();

    match method.as_str() {
        "connect" => vec![Action::Send(Frame::success(
            id,
            json!({"type": "hello-ok", "protocol": 3, "server": {"name": "mock"}}),
        ))],
        "echo" => vec![Action::Send(Frame::success(id, Value::Object(params.clone())))],
        "sleep" => {
            let ms = params.get("ms").and_then(Value::as_u64).unwrap_or(0);
            vec![Action::SendAfter(
                Duration::from_millis(ms),
                Frame::success(id, Value::Object(params.clone())),
            )]
        }
        "fail" => vec![Action::Send(Frame::failure(
            id,
            json!({"code": "E_FAIL", "message": "requested failure"}),
        ))],
        "agent.run" => {
            let agent = params.get("agentId").and_then(Value::as_str).unwrap_or("?");
            let message = params.get("message").and_then(Value::as_str).unwrap_or("");
            vec![Action::Send(Frame::success(
                id,
                json!({
                    "content": format!("{agent} says: {message}"),
                    "tokens": 42,
                    "cost": 0.01,
                }),
            ))]
        }
        "never" => Vec::new(),
        "drop" => vec![Action::Close],
        other => vec![Action::Send(Frame::failure(
            id,
            json!(format!("unknown method: {other}")),
        ))],
    }
}

/// Refuses every handshake with `reason`; otherwise [`standard`].
pub(crate) fn rejecting_handshake(reason: &str) -> Behavior {
    let reason = reason.to_string();
    Arc::new(move |frame: &Frame| match frame {
        Frame::Request { id, method, .. } if method == "connect" => vec![Action::Send(
            Frame::failure(id.clone(), json!({"code": "E_HANDSHAKE", "message": reason})),
        )],
        other => standard(other),
    })
}

// ============================================================================
// MockGateway
// ============================================================================

/// Local WebSocket gateway.
pub(crate) struct MockGateway {
    addr: SocketAddr,
    record: Arc<Record>,
    accept_loop: JoinHandle<()>,
}

impl MockGateway {
    /// Starts a gateway with the [`standard`] behavior.
    pub(crate) async fn start() -> Self {
        Self::with_behavior(Arc::new(standard)).await
    }

    /// Starts a gateway with a custom behavior.
    pub(crate) async fn with_behavior(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind mock");
        let addr = listener.local_addr().expect("mock addr");
        let record = Arc::new(Record::default());

        let accept_record = Arc::clone(&record);
        let accept_loop = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                accept_record.accepted.fetch_add(1, Ordering::SeqCst);
                tokio::spawn(serve(
                    stream,
                    Arc::clone(&behavior),
                    Arc::clone(&accept_record),
                ));
            }
        });

        Self {
            addr,
            record,
            accept_loop,
        }
    }

    /// Returns `ws://127.0.0.1:<port>`.
    pub(crate) fn url(&self) -> String {
        format!("ws://{}", self.addr)
    }

    /// Builder preloaded with this gateway and short timeouts.
    pub(crate) fn config_builder(&self) -> GatewayConfigBuilder {
        GatewayConfig::builder()
            .url(self.url())
            .token("test-token")
            .connect_timeout(Duration::from_secs(2))
            .handshake_timeout(Duration::from_secs(2))
            .request_timeout(Duration::from_secs(2))
            .reconnect(ReconnectPolicy::fixed(Duration::from_millis(20)).with_max_attempts(50))
    }

    /// Config for this gateway.
    pub(crate) fn config(&self) -> GatewayConfig {
        self.config_builder().build().expect("mock config")
    }

    /// Every frame received so far, across connections.
    pub(crate) fn received(&self) -> Vec<Frame> {
        self.record.received.lock().clone()
    }

    /// Methods of the received requests, in order.
    pub(crate) fn methods(&self) -> Vec<String> {
        self.received()
            .into_iter()
            .filter_map(|frame| match frame {
                Frame::Request { method, .. } => Some(method),
                _ => None,
            })
            .collect()
    }

    /// Number of TCP connections accepted so far.
    pub(crate) fn connections(&self) -> usize {
        self.record.accepted.load(Ordering::SeqCst)
    }

    /// Number of WebSocket connections still open.
    pub(crate) fn open_connections(&self) -> usize {
        self.record.open.load(Ordering::SeqCst)
    }

    /// Sends `frame` to every open connection.
    pub(crate) fn push(&self, frame: Frame) {
        let text = codec::encode(&frame).expect("encode");
        self.push_raw(text);
    }

    /// Sends raw text to every open connection.
    pub(crate) fn push_raw(&self, text: impl Into<String>) {
        let text = text.into();
        for peer in self.record.peers.lock().iter() {
            let _ = peer.send(Outbound::Text(text.clone()));
        }
    }

    /// Closes every open connection from the gateway side.
    pub(crate) fn close_all(&self) {
        for peer in self.record.peers.lock().drain(..) {
            let _ = peer.send(Outbound::Close);
        }
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.accept_loop.abort();
    }
}

async fn serve(stream: TcpStream, behavior: Behavior, record: Arc<Record>) {
    let Ok(ws) = accept_async(stream).await else {
        return;
    };
    let (mut write, mut read) = ws.split();
    let (tx, mut rx) = mpsc::unbounded_channel();
    record.peers.lock().push(tx.clone());
    record.open.fetch_add(1, Ordering::SeqCst);

    loop {
        tokio::select! {
            message = read.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let Ok(frame) = codec::decode(text.as_bytes()) else {
                        continue;
                    };
                    record.received.lock().push(frame.clone());

                    for action in behavior(&frame) {
                        match action {
                            Action::Send(reply) => {
                                let _ = tx.send(Outbound::Text(encode(&reply)));
                            }
                            Action::SendAfter(delay, reply) => {
                                let tx = tx.clone();
                                tokio::spawn(async move {
                                    tokio::time::sleep(delay).await;
                                    let _ = tx.send(Outbound::Text(encode(&reply)));
                                });
                            }
                            Action::Close => {
                                let _ = tx.send(Outbound::Close);
                            }
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            outbound = rx.recv() => match outbound {
                Some(Outbound::Text(text)) => {
                    if write.send(Message::Text(text.into())).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => {
                    let _ = write.close().await;
                    break;
                }
            },
        }
    }

    record.open.fetch_sub(1, Ordering::SeqCst);
}

fn encode(frame: &Frame) -> String {
    codec::encode(frame).expect("encode")
}

/// Polls `condition` every few milliseconds, panicking after five seconds.
pub(crate) async fn eventually(condition: impl Fn() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !condition() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met within 5s"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
