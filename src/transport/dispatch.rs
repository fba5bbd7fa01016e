//! Event dispatch.
//!
//! Unsolicited `event` frames go to one registered handler, called inline on
//! the connection's event-loop task in the order frames arrived.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::Value;
use tracing::trace;

// ============================================================================
// Types
// ============================================================================

/// Event handler callback type.
///
/// Runs on the event-loop task, so it should hand heavy work off (for
/// example to a channel) instead of blocking.
pub type EventHandler = Arc<dyn Fn(&GatewayEvent) + Send + Sync>;

// ============================================================================
// GatewayEvent
// ============================================================================

/// An event notification from the gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayEvent {
    /// Event name.
    pub name: String,
    /// Event data.
    pub payload: Value,
    /// Gateway sequence number, if present.
    pub seq: Option<u64>,
}

// ============================================================================
// EventDispatcher
// ============================================================================

/// Holds the registered event handler.
///
/// A session keeps one dispatcher across reconnects, so a handler set once
/// keeps receiving events from every later connection.
#[derive(Default)]
pub struct EventDispatcher {
    handler: RwLock<Option<EventHandler>>,
}

impl EventDispatcher {
    /// Creates a dispatcher with no handler.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the handler, replacing any previous one.
    pub fn set_handler(&self, handler: EventHandler) {
        *self.handler.write() = Some(handler);
    }

    /// Removes the handler. Later events are dropped.
    pub fn clear_handler(&self) {
        *self.handler.write() = None;
    }

    /// Returns `true` if a handler is registered.
    #[inline]
    #[must_use]
    pub fn has_handler(&self) -> bool {
        self.handler.read().is_some()
    }

    /// Delivers one event.
    ///
    /// Returns `false` when no handler was registered.
    pub fn dispatch(&self, event: &GatewayEvent) -> bool {
        // Clone out of the lock so a handler may replace itself.
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => {
                handler(event);
                true
            }
            None => {
                trace!(name = %event.name, "Event dropped, no handler");
                false
            }
        }
    }
}

impl fmt::Debug for EventDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("has_handler", &self.has_handler())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
