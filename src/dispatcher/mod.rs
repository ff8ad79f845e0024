//! In-process pub/sub for attendance events and connection-state changes.
//!
//! Listener sets are independent and keyed by registration id, so removal is
//! safe while a fan-out is in progress: emission snapshots the current list
//! and never holds a lock across a listener call. A panicking listener is
//! isolated and does not prevent delivery to the listeners after it.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Mutex, RwLock};

use uuid::Uuid;

use crate::connection::ConnectionState;
use crate::events::AttendanceEvent;

/// Listener for normalized attendance events.
pub type AttendanceListener = std::sync::Arc<dyn Fn(&AttendanceEvent) + Send + Sync>;

/// Listener for connection-state transitions.
pub type StateListener = std::sync::Arc<dyn Fn(ConnectionState) + Send + Sync>;

pub struct EventDispatcher {
    event_listeners: RwLock<Vec<(Uuid, AttendanceListener)>>,
    state_listeners: RwLock<Vec<(Uuid, StateListener)>>,
    /// Last published state; replayed once to each new state listener.
    last_state: Mutex<ConnectionState>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self {
            event_listeners: RwLock::new(Vec::new()),
            state_listeners: RwLock::new(Vec::new()),
            last_state: Mutex::new(ConnectionState::Disconnected),
        }
    }

    /// Register an attendance-event listener. Returns the registration id
    /// used to unsubscribe.
    pub fn subscribe_events(&self, listener: AttendanceListener) -> Uuid {
        let id = Uuid::new_v4();
        self.event_listeners.write().unwrap().push((id, listener));
        tracing::debug!(listener_id = %id, "Attendance listener registered");
        id
    }

    pub fn unsubscribe_events(&self, id: Uuid) {
        self.event_listeners
            .write()
            .unwrap()
            .retain(|(key, _)| *key != id);
        tracing::debug!(listener_id = %id, "Attendance listener removed");
    }

    /// Register a connection-state listener. The listener is immediately
    /// invoked once with the current state, then receives transitions only.
    pub fn subscribe_state(&self, listener: StateListener) -> Uuid {
        let id = Uuid::new_v4();
        let current = {
            let state = self.last_state.lock().unwrap();
            self.state_listeners
                .write()
                .unwrap()
                .push((id, listener.clone()));
            *state
        };
        invoke_state_listener(&listener, current);
        tracing::debug!(listener_id = %id, "State listener registered");
        id
    }

    pub fn unsubscribe_state(&self, id: Uuid) {
        self.state_listeners
            .write()
            .unwrap()
            .retain(|(key, _)| *key != id);
        tracing::debug!(listener_id = %id, "State listener removed");
    }

    /// Fan an event out to all current listeners, synchronously, in
    /// registration order.
    pub fn emit_event(&self, event: &AttendanceEvent) {
        let listeners: Vec<AttendanceListener> = self
            .event_listeners
            .read()
            .unwrap()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            let callback = listener.as_ref();
            if catch_unwind(AssertUnwindSafe(|| callback(event))).is_err() {
                tracing::warn!(
                    event_type = %event.event_type,
                    "Attendance listener panicked during dispatch"
                );
            }
        }
    }

    /// Publish a state transition. No-op transitions are suppressed.
    pub fn emit_state(&self, state: ConnectionState) {
        {
            let mut last = self.last_state.lock().unwrap();
            if *last == state {
                return;
            }
            let previous = *last;
            *last = state;
            tracing::info!(from = %previous, to = %state, "Connection state changed");
        }

        let listeners: Vec<StateListener> = self
            .state_listeners
            .read()
            .unwrap()
            .iter()
            .map(|(_, listener)| listener.clone())
            .collect();

        for listener in listeners {
            invoke_state_listener(&listener, state);
        }
    }

    /// The most recently published state.
    pub fn current_state(&self) -> ConnectionState {
        *self.last_state.lock().unwrap()
    }

    /// Whether any listener (event or state) is registered.
    pub fn has_listeners(&self) -> bool {
        !self.event_listeners.read().unwrap().is_empty()
            || !self.state_listeners.read().unwrap().is_empty()
    }
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

fn invoke_state_listener(listener: &StateListener, state: ConnectionState) {
    let callback = listener.as_ref();
    if catch_unwind(AssertUnwindSafe(|| callback(state))).is_err() {
        tracing::warn!(state = %state, "State listener panicked during dispatch");
    }
}
