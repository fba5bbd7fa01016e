//! Pending-call table.
//!
//! Maps request IDs to the callers waiting on them. Every entry leaves the
//! table exactly once, through one of:
//!
//! | Path | Trigger | Caller sees |
//! |------|---------|-------------|
//! | [`PendingTable::settle`] | Matching `response` frame | Payload or [`Error::Remote`] |
//! | [`PendingTable::expire`] | Caller's timer fired | [`Error::RequestTimeout`] |
//! | [`PendingTable::fail`] | Frame could not be written | The write error |
//! | [`PendingTable::cancel`] | Caller dropped the call future | nothing |
//! | [`PendingTable::sweep`] | Connection ended | [`Error::ConnectionLost`] |
//!
//! Each path removes the entry under the lock and fires the completion
//! handle after releasing it. A path that finds no entry does nothing.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, trace, warn};

use crate::error::{Error, Result};
use crate::identifiers::RequestId;
use crate::protocol::frame::response_outcome;

// ============================================================================
// Types
// ============================================================================

/// Single-use completion handle.
type Completion = oneshot::Sender<Result<Value>>;

/// Receiving half handed to the caller.
pub(crate) type CompletionRx = oneshot::Receiver<Result<Value>>;

/// One in-flight request.
struct PendingCall {
    /// Method name, for errors and diagnostics.
    method: String,
    /// When the caller stops waiting.
    deadline: Instant,
    /// Fulfilled at most once.
    completion: Completion,
}

/// Snapshot of one pending call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingCallInfo {
    /// Request ID.
    pub id: RequestId,
    /// Method name.
    pub method: String,
    /// When the call times out.
    pub deadline: Instant,
}

#[derive(Default)]
struct TableState {
    calls: FxHashMap<RequestId, PendingCall>,
    /// Set by [`PendingTable::sweep`]; the reason is reused for late
    /// registrations.
    closed: Option<String>,
}

// ============================================================================
// PendingTable
// ============================================================================

/// Request ID → waiting caller, owned by one connection.
pub(crate) struct PendingTable {
    state: Mutex<TableState>,
    /// Maximum concurrent entries.
    limit: usize,
}

impl PendingTable {
    /// Creates an empty, open table.
    pub(crate) fn new(limit: usize) -> Self {
        Self {
            state: Mutex::new(TableState::default()),
            limit,
        }
    }

    /// Registers a call and returns the receiver its result will arrive on.
    ///
    /// # Errors
    ///
    /// - [`Error::ConnectionLost`] if the table was swept
    /// - [`Error::TooManyPending`] if the table is full
    /// - [`Error::Protocol`] if the ID is already pending
    /// - [`Error::InvalidArgument`] if the deadline cannot be represented
    pub(crate) fn register(
        &self,
        id: RequestId,
        method: &str,
        timeout: Duration,
    ) -> Result<CompletionRx> {
        let mut state = self.state.lock();

        if let Some(reason) = &state.closed {
            return Err(Error::connection_lost(reason.clone()));
        }

        if state.calls.len() >= self.limit {
            warn!(
                pending = state.calls.len(),
                max = self.limit,
                "Too many pending requests"
            );
            return Err(Error::TooManyPending { limit: self.limit });
        }

        if state.calls.contains_key(&id) {
            return Err(Error::protocol(format!("request {id} is already pending")));
        }

        let deadline = Instant::now().checked_add(timeout).ok_or_else(|| {
            Error::invalid_argument(format!("timeout {timeout:?} for {method} is out of range"))
        })?;

        let (completion, receiver) = oneshot::channel();
        state.calls.insert(
            id,
            PendingCall {
                method: method.to_string(),
                deadline,
                completion,
            },
        );

        Ok(receiver)
    }

    /// Settles a call from a `response` frame.
    ///
    /// Returns `false` if no such call is pending (stale or unknown ID).
    pub(crate) fn settle(
        &self,
        id: &RequestId,
        success: bool,
        payload: Option<Value>,
        error: Option<Value>,
    ) -> bool {
        let Some(call) = self.state.lock().calls.remove(id) else {
            return false;
        };

        trace!(%id, method = %call.method, success, "Response matched");
        let outcome = response_outcome(&call.method, success, payload, error);
        let _ = call.completion.send(outcome);
        true
    }

    /// Removes a call whose timer fired.
    ///
    /// Returns `false` if the call was settled first; its result is then
    /// waiting in the caller's receiver.
    pub(crate) fn expire(&self, id: &RequestId) -> bool {
        let Some(call) = self.state.lock().calls.remove(id) else {
            return false;
        };

        let overrun = Instant::now().saturating_duration_since(call.deadline);
        debug!(%id, method = %call.method, ?overrun, "Request timed out");
        true
    }

    /// Rejects one call with `error`.
    pub(crate) fn fail(&self, id: &RequestId, error: Error) -> bool {
        let Some(call) = self.state.lock().calls.remove(id) else {
            return false;
        };

        let _ = call.completion.send(Err(error));
        true
    }

    /// Drops a call nobody waits for any more.
    pub(crate) fn cancel(&self, id: &RequestId) -> bool {
        let removed = self.state.lock().calls.remove(id).is_some();
        if removed {
            trace!(%id, "Pending call cancelled by caller");
        }
        removed
    }

    /// Rejects every pending call with [`Error::ConnectionLost`] and closes
    /// the table to new registrations.
    ///
    /// Returns the number of rejected calls. Sweeping a closed table is a
    /// no-op.
    pub(crate) fn sweep(&self, reason: &str) -> usize {
        let drained: Vec<PendingCall> = {
            let mut state = self.state.lock();
            if state.closed.is_none() {
                state.closed = Some(reason.to_string());
            }
            state.calls.drain().map(|(_, call)| call).collect()
        };

        let count = drained.len();
        for call in drained {
            let _ = call.completion.send(Err(Error::connection_lost(reason)));
        }

        if count > 0 {
            debug!(count, reason, "Failed pending requests on close");
        }
        count
    }

    /// Number of pending calls.
    pub(crate) fn len(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Returns `true` once the table has been swept.
    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.state.lock().closed.is_some()
    }

    /// Lists pending calls, earliest deadline first.
    pub(crate) fn snapshot(&self) -> Vec<PendingCallInfo> {
        let mut calls: Vec<PendingCallInfo> = self
            .state
            .lock()
            .calls
            .iter()
            .map(|(id, call)| PendingCallInfo {
                id: id.clone(),
                method: call.method.clone(),
                deadline: call.deadline,
            })
            .collect();
        calls.sort_by_key(|info| info.deadline);
        calls
    }
}

// ============================================================================
// CancelOnDrop
// ============================================================================

/// Removes a call from the table when the caller's future goes away.
///
/// Harmless after the call settled: the entry is already gone.
pub(crate) struct CancelOnDrop<'a> {
    table: &'a PendingTable,
    id: RequestId,
}

impl<'a> CancelOnDrop<'a> {
    pub(crate) fn new(table: &'a PendingTable, id: RequestId) -> Self {
        Self { table, id }
    }
}

impl Drop for CancelOnDrop<'_> {
    fn drop(&mut self) {
        self.table.cancel(&self.id);
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_settle_success() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let rx = table.register(id.clone(), "echo", TIMEOUT).expect("register");

        assert!(table.settle(&id, true, Some(json!({"v": 1})), None));
        assert_eq!(rx.await.expect("sent").expect("ok"), json!({"v": 1}));
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn test_settle_failure_is_remote() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let rx = table.register(id.clone(), "agent.run", TIMEOUT).expect("register");

        table.settle(&id, false, None, Some(json!("quota exceeded")));
        let err = rx.await.expect("sent").unwrap_err();
        assert!(err.is_remote());
        assert_eq!(err.to_string(), "agent.run failed: quota exceeded");
    }

    #[test]
    fn test_settle_unknown_id_is_ignored() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let _rx = table.register(id, "echo", TIMEOUT).expect("register");

        assert!(!table.settle(&RequestId::new("req-unknown"), true, None, None));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_settle_twice_only_first_wins() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let _rx = table.register(id.clone(), "echo", TIMEOUT).expect("register");

        assert!(table.settle(&id, true, None, None));
        assert!(!table.settle(&id, true, None, None));
        assert!(!table.expire(&id));
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let table = PendingTable::new(10);
        let id = RequestId::new("req-dup");
        let _rx = table.register(id.clone(), "a", TIMEOUT).expect("register");

        let err = table.register(id, "b", TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::Protocol { .. }));
    }

    #[test]
    fn test_unrepresentable_timeout_rejected() {
        let table = PendingTable::new(10);
        let err = table
            .register(RequestId::next(), "echo", Duration::MAX)
            .unwrap_err();

        assert!(matches!(err, Error::InvalidArgument { .. }));
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_limit_enforced() {
        let table = PendingTable::new(2);
        let _a = table.register(RequestId::next(), "a", TIMEOUT).expect("a");
        let _b = table.register(RequestId::next(), "b", TIMEOUT).expect("b");

        let err = table.register(RequestId::next(), "c", TIMEOUT).unwrap_err();
        assert!(matches!(err, Error::TooManyPending { limit: 2 }));
    }

    #[tokio::test]
    async fn test_sweep_rejects_all_and_closes() {
        let table = PendingTable::new(10);
        let receivers: Vec<_> = (0..3)
            .map(|_| table.register(RequestId::next(), "m", TIMEOUT).expect("register"))
            .collect();

        assert_eq!(table.sweep("transport closed"), 3);
        assert_eq!(table.len(), 0);
        assert!(table.is_closed());

        for rx in receivers {
            let err = rx.await.expect("sent").unwrap_err();
            assert!(matches!(err, Error::ConnectionLost { ref reason } if reason == "transport closed"));
        }

        let late = table.register(RequestId::next(), "m", TIMEOUT).unwrap_err();
        assert!(matches!(late, Error::ConnectionLost { .. }));
        assert_eq!(table.sweep("again"), 0);
    }

    #[tokio::test]
    async fn test_expire_then_settle_is_noop() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let rx = table.register(id.clone(), "slow", TIMEOUT).expect("register");

        assert!(table.expire(&id));
        assert!(!table.settle(&id, true, None, None));
        assert!(rx.await.is_err(), "completion dropped without a value");
    }

    #[test]
    fn test_cancel_on_drop() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let _rx = table.register(id.clone(), "m", TIMEOUT).expect("register");

        drop(CancelOnDrop::new(&table, id));
        assert_eq!(table.len(), 0);
    }

    #[tokio::test]
    async fn test_fail_delivers_error() {
        let table = PendingTable::new(10);
        let id = RequestId::next();
        let rx = table.register(id.clone(), "m", TIMEOUT).expect("register");

        assert!(table.fail(&id, Error::connection("write failed")));
        assert!(matches!(
            rx.await.expect("sent"),
            Err(Error::Connection { .. })
        ));
    }

    #[test]
    fn test_snapshot_sorted_by_deadline() {
        let table = PendingTable::new(10);
        let _slow = table
            .register(RequestId::next(), "slow", Duration::from_secs(60))
            .expect("slow");
        let _fast = table
            .register(RequestId::next(), "fast", Duration::from_millis(10))
            .expect("fast");

        let snapshot = table.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].method, "fast");
        assert_eq!(snapshot[1].method, "slow");
    }
}
