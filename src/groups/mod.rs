//! Tenant group membership with ref-counting.
//!
//! One tenant group is joined at a time. Every join/leave runs inside a
//! single mutex-guarded critical section, so operations from concurrent
//! callers reach the server strictly in submission order and are never
//! merged beyond the ref-counting below.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::connection::ConnectionManager;
use crate::dispatcher::EventDispatcher;
use crate::error::Result;
use crate::transport::HubCommand;

#[derive(Debug, Default)]
struct GroupSlot {
    joined: Option<String>,
    ref_count: usize,
}

pub struct GroupSubscriptionRegistry {
    connection: Arc<ConnectionManager>,
    dispatcher: Arc<EventDispatcher>,
    /// The critical section. `joined`/`ref_count` are never touched outside
    /// this lock.
    slot: Mutex<GroupSlot>,
}

impl GroupSubscriptionRegistry {
    pub fn new(connection: Arc<ConnectionManager>, dispatcher: Arc<EventDispatcher>) -> Self {
        Self {
            connection,
            dispatcher,
            slot: Mutex::new(GroupSlot::default()),
        }
    }

    /// Register interest in a tenant's event stream.
    ///
    /// The first caller for a tenant ensures the connection exists and joins
    /// the server group; later callers only bump the ref-count. Joining a
    /// different tenant first leaves the old group entirely.
    pub async fn join_group(&self, tenant_id: &str) -> Result<()> {
        let mut slot = self.slot.lock().await;

        if slot.joined.as_deref() == Some(tenant_id) {
            slot.ref_count += 1;
            tracing::debug!(
                tenant_id = %tenant_id,
                ref_count = slot.ref_count,
                "Joined tenant group (ref-count only)"
            );
            return Ok(());
        }

        if let Some(previous) = slot.joined.take() {
            slot.ref_count = 0;
            self.connection.set_active_group(None);
            // best-effort: the server forgets memberships on disconnect anyway
            if let Err(err) = self
                .connection
                .invoke(HubCommand::LeaveGroup {
                    group: previous.clone(),
                })
                .await
            {
                tracing::debug!(
                    tenant_id = %previous,
                    error = %err,
                    "Leaving previous tenant group failed"
                );
            }
        }

        self.connection.connect().await?;
        self.connection
            .invoke(HubCommand::JoinGroup {
                group: tenant_id.to_string(),
            })
            .await?;

        slot.joined = Some(tenant_id.to_string());
        slot.ref_count = 1;
        self.connection.set_active_group(Some(tenant_id.to_string()));
        tracing::info!(tenant_id = %tenant_id, "Joined tenant group");
        Ok(())
    }

    /// Drop one registration of interest. Defaults to the joined tenant;
    /// no-ops when `tenant_id` names a different one. The server group is
    /// only left when the last registration goes.
    pub async fn leave_group(&self, tenant_id: Option<&str>) -> Result<()> {
        let teardown = {
            let mut slot = self.slot.lock().await;

            let Some(current) = slot.joined.clone() else {
                return Ok(());
            };
            if let Some(requested) = tenant_id {
                if requested != current {
                    return Ok(());
                }
            }

            slot.ref_count = slot.ref_count.saturating_sub(1);
            if slot.ref_count > 0 {
                tracing::debug!(
                    tenant_id = %current,
                    ref_count = slot.ref_count,
                    "Left tenant group (ref-count only)"
                );
                false
            } else {
                slot.joined = None;
                self.connection.set_active_group(None);
                if let Err(err) = self
                    .connection
                    .invoke(HubCommand::LeaveGroup {
                        group: current.clone(),
                    })
                    .await
                {
                    tracing::debug!(
                        tenant_id = %current,
                        error = %err,
                        "Leaving tenant group failed"
                    );
                }
                tracing::info!(tenant_id = %current, "Left tenant group");
                true
            }
        };

        if teardown {
            self.maybe_teardown().await;
        }
        Ok(())
    }

    /// Stop the connection when nothing cares about it anymore: no tenant
    /// joined and no local listener registered.
    pub async fn maybe_teardown(&self) {
        let idle = {
            let slot = self.slot.lock().await;
            slot.joined.is_none() && !self.dispatcher.has_listeners()
        };
        if idle {
            tracing::debug!("No listeners and no joined tenant; stopping hub connection");
            self.connection.stop().await;
        }
    }

    /// Currently joined tenant, if any.
    pub async fn joined_tenant(&self) -> Option<String> {
        self.slot.lock().await.joined.clone()
    }
}
