//! Public facade of the attendance realtime client.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use uuid::Uuid;

use crate::auth::TokenProvider;
use crate::config::Settings;
use crate::connection::{ConnectionManager, ConnectionState};
use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::events::AttendanceEvent;
use crate::groups::GroupSubscriptionRegistry;
use crate::transport::{HubTransport, WebSocketTransport};

/// Real-time attendance event client.
///
/// One instance per process is enough: the connection is shared by every
/// subscriber, created lazily on the first join and torn down when the last
/// listener and the joined group are gone. Collaborators (token accessor,
/// REST base URL) are injected; nothing here is global.
pub struct AttendanceRealtimeClient {
    dispatcher: Arc<EventDispatcher>,
    connection: Arc<ConnectionManager>,
    groups: Arc<GroupSubscriptionRegistry>,
}

impl AttendanceRealtimeClient {
    /// Client backed by the WebSocket transport.
    pub fn new(settings: &Settings, tokens: Arc<dyn TokenProvider>) -> Self {
        let transport = Arc::new(WebSocketTransport::from_settings(&settings.hub));
        Self::with_transport(settings, tokens, transport)
    }

    /// Client with a caller-supplied transport. This is the seam tests use.
    pub fn with_transport(
        settings: &Settings,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn HubTransport>,
    ) -> Self {
        let dispatcher = Arc::new(EventDispatcher::new());
        let connection = ConnectionManager::new(settings, tokens, transport, dispatcher.clone());
        let groups = Arc::new(GroupSubscriptionRegistry::new(
            connection.clone(),
            dispatcher.clone(),
        ));
        Self {
            dispatcher,
            connection,
            groups,
        }
    }

    /// Listen for normalized attendance events. Events arrive for whichever
    /// tenant group is joined, regardless of which caller joined it.
    pub fn subscribe_attendance_updates(
        &self,
        listener: impl Fn(&AttendanceEvent) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.dispatcher.subscribe_events(Arc::new(listener));
        self.subscription(SubscriptionKind::Events, id)
    }

    /// Listen for connection-state changes. The current state is replayed
    /// once on subscribe.
    pub fn subscribe_connection_state(
        &self,
        listener: impl Fn(ConnectionState) + Send + Sync + 'static,
    ) -> Subscription {
        let id = self.dispatcher.subscribe_state(Arc::new(listener));
        self.subscription(SubscriptionKind::State, id)
    }

    /// Register interest in a tenant's live events, connecting and joining
    /// the server group as needed. Connection failures propagate to the
    /// caller.
    pub async fn join_gym_group(&self, tenant_id: &str) -> Result<()> {
        self.groups.join_group(tenant_id).await
    }

    /// Drop one registration of interest. `None` targets the currently
    /// joined tenant.
    pub async fn leave_gym_group(&self, tenant_id: Option<&str>) -> Result<()> {
        self.groups.leave_group(tenant_id).await
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Explicitly stop the connection. Reconnection will not resume until
    /// the next join.
    pub async fn shutdown(&self) {
        self.connection.stop().await;
    }

    fn subscription(&self, kind: SubscriptionKind, id: Uuid) -> Subscription {
        Subscription {
            dispatcher: self.dispatcher.clone(),
            groups: self.groups.clone(),
            kind,
            id,
            removed: AtomicBool::new(false),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum SubscriptionKind {
    Events,
    State,
}

/// Handle to a registered listener.
///
/// Dropping the handle removes the listener. Calling
/// [`unsubscribe`](Self::unsubscribe) additionally runs the idle-teardown
/// check, stopping the connection when nothing else is using it.
pub struct Subscription {
    dispatcher: Arc<EventDispatcher>,
    groups: Arc<GroupSubscriptionRegistry>,
    kind: SubscriptionKind,
    id: Uuid,
    removed: AtomicBool,
}

impl Subscription {
    pub async fn unsubscribe(self) {
        self.remove();
        self.groups.maybe_teardown().await;
    }

    fn remove(&self) {
        if !self.removed.swap(true, Ordering::AcqRel) {
            match self.kind {
                SubscriptionKind::Events => self.dispatcher.unsubscribe_events(self.id),
                SubscriptionKind::State => self.dispatcher.unsubscribe_state(self.id),
            }
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.remove();
    }
}
