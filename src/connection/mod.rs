//! Hub connection lifecycle: candidate fallback, deduplicated connect,
//! automatic reconnection, and inbound wiring.

mod backoff;
mod urls;

pub use backoff::{BackoffConfig, ReconnectBackoff};
pub use urls::hub_candidates;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, Weak};
use std::time::Duration;

use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, Mutex, Notify};

use crate::auth::TokenProvider;
use crate::config::Settings;
use crate::dispatcher::EventDispatcher;
use crate::error::{ClientError, ConnectError, Result};
use crate::events::normalize_payload;
use crate::transport::{HubChannel, HubCommand, HubTransport};

/// Re-join attempts after a reconnect before giving the group up.
const REJOIN_ATTEMPTS: u32 = 3;

/// Delay between re-join attempts.
const REJOIN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Connection lifecycle states, as observed by state listeners.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ConnectionState::Disconnected => "Disconnected",
            ConnectionState::Connecting => "Connecting",
            ConnectionState::Connected => "Connected",
            ConnectionState::Reconnecting => "Reconnecting",
        };
        write!(f, "{name}")
    }
}

type SharedConnect = Shared<BoxFuture<'static, std::result::Result<(), ConnectError>>>;

struct ActiveChannel {
    id: u64,
    commands: mpsc::Sender<HubCommand>,
    shutdown: oneshot::Sender<()>,
}

/// Owns the single hub connection of a client instance.
///
/// `connect()` is idempotent and deduplicated: concurrent callers share one
/// in-flight attempt through a stored [`Shared`] future. An unexpected
/// closure starts the reconnect loop; an explicit [`stop`](Self::stop)
/// cancels everything via a generation bump.
pub struct ConnectionManager {
    /// Self-handle for the background tasks this manager spawns.
    me: Weak<ConnectionManager>,
    transport: Arc<dyn HubTransport>,
    tokens: Arc<dyn TokenProvider>,
    dispatcher: Arc<EventDispatcher>,
    candidates: Vec<String>,
    backoff_config: BackoffConfig,
    /// The one in-flight connect attempt, shared by all concurrent callers.
    pending: Arc<Mutex<Option<SharedConnect>>>,
    active: StdMutex<Option<ActiveChannel>>,
    /// Tenant group to re-join after a reconnect; written by the group
    /// registry inside its critical section.
    rejoin_group: StdMutex<Option<String>>,
    /// Bumped on stop(); tasks holding a stale generation exit quietly.
    generation: AtomicU64,
    channel_ids: AtomicU64,
    shutdown: Notify,
}

impl ConnectionManager {
    pub fn new(
        settings: &Settings,
        tokens: Arc<dyn TokenProvider>,
        transport: Arc<dyn HubTransport>,
        dispatcher: Arc<EventDispatcher>,
    ) -> Arc<Self> {
        let candidates = hub_candidates(&settings.api, &settings.hub);
        let backoff_config = BackoffConfig {
            delays_ms: settings.hub.reconnect_delays_ms.clone(),
            jitter_factor: settings.hub.reconnect_jitter,
        };
        Arc::new_cyclic(|me| Self {
            me: me.clone(),
            transport,
            tokens,
            dispatcher,
            candidates,
            backoff_config,
            pending: Arc::new(Mutex::new(None)),
            active: StdMutex::new(None),
            rejoin_group: StdMutex::new(None),
            generation: AtomicU64::new(0),
            channel_ids: AtomicU64::new(0),
            shutdown: Notify::new(),
        })
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.dispatcher.current_state()
    }

    /// Candidate hub URLs, in the order they are tried.
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// Record the tenant group to re-join after a reconnect.
    pub fn set_active_group(&self, group: Option<String>) {
        *self.rejoin_group.lock().unwrap() = group;
    }

    /// Ensure a connection exists.
    ///
    /// Returns immediately when already connected. When an attempt is in
    /// flight, awaits that same attempt instead of opening a second socket.
    /// All candidate URLs failing yields one aggregated [`ConnectError`].
    pub async fn connect(&self) -> Result<()> {
        if self.state() == ConnectionState::Connected {
            return Ok(());
        }

        let attempt = {
            let mut pending = self.pending.lock().await;
            if self.state() == ConnectionState::Connected {
                return Ok(());
            }
            match pending.as_ref() {
                Some(inflight) => inflight.clone(),
                None => {
                    let Some(manager) = self.me.upgrade() else {
                        return Err(ClientError::NotConnected);
                    };
                    let slot = Arc::clone(&self.pending);
                    let generation = self.generation.load(Ordering::Acquire);
                    let attempt: SharedConnect = async move {
                        let result = manager.establish(generation).await;
                        // stop() clears the slot itself; don't wipe a newer attempt
                        if manager.generation.load(Ordering::Acquire) == generation {
                            *slot.lock().await = None;
                        }
                        result
                    }
                    .boxed()
                    .shared();
                    *pending = Some(attempt.clone());
                    attempt
                }
            }
        };

        attempt.await?;
        Ok(())
    }

    /// Explicit teardown: close the transport and cancel reconnection.
    pub async fn stop(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.shutdown.notify_waiters();

        let active = self.active.lock().unwrap().take();
        if let Some(channel) = active {
            let _ = channel.shutdown.send(());
        }
        *self.pending.lock().await = None;

        self.dispatcher.emit_state(ConnectionState::Disconnected);
        tracing::info!("Attendance hub connection stopped");
    }

    /// Send an invocation over the open channel.
    pub async fn invoke(&self, command: HubCommand) -> Result<()> {
        let sender = {
            let active = self.active.lock().unwrap();
            active.as_ref().map(|channel| channel.commands.clone())
        };
        let sender = sender.ok_or(ClientError::NotConnected)?;
        sender
            .send(command)
            .await
            .map_err(|_| ClientError::NotConnected)
    }

    async fn establish(&self, generation: u64) -> std::result::Result<(), ConnectError> {
        // during reconnection the Reconnecting state persists across attempts
        if self.state() != ConnectionState::Reconnecting {
            self.dispatcher.emit_state(ConnectionState::Connecting);
        }

        match self.try_open_any(generation).await {
            Ok(channel) => {
                if !self.install(channel, generation) {
                    return Err(ConnectError {
                        attempted: self.candidates.clone(),
                        last_error: "client stopped during connect".to_string(),
                    });
                }
                self.dispatcher.emit_state(ConnectionState::Connected);
                Ok(())
            }
            Err(err) => {
                if self.state() == ConnectionState::Connecting {
                    self.dispatcher.emit_state(ConnectionState::Disconnected);
                }
                Err(err)
            }
        }
    }

    /// Try every candidate URL in order, with a token fetched afresh per
    /// attempt so rotated credentials are honored.
    async fn try_open_any(
        &self,
        generation: u64,
    ) -> std::result::Result<HubChannel, ConnectError> {
        let mut last_error: Option<String> = None;

        for url in &self.candidates {
            if self.generation.load(Ordering::Acquire) != generation {
                last_error = Some("client stopped".to_string());
                break;
            }
            let token = self.tokens.bearer_token().await;
            match self.transport.open(url, token.as_deref()).await {
                Ok(channel) => {
                    tracing::info!(url = %url, "Connected to attendance hub");
                    return Ok(channel);
                }
                Err(err) => {
                    tracing::warn!(url = %url, error = %err, "Attendance hub candidate failed");
                    last_error = Some(err.to_string());
                }
            }
        }

        Err(ConnectError {
            attempted: self.candidates.clone(),
            last_error: last_error.unwrap_or_else(|| "no hub candidates configured".to_string()),
        })
    }

    /// Store the channel and spawn its inbound pump. Refuses when `stop()`
    /// raced the handshake; the dropped channel halves close the socket.
    fn install(&self, channel: HubChannel, generation: u64) -> bool {
        let HubChannel {
            commands,
            inbound,
            shutdown,
        } = channel;
        let channel_id = self.channel_ids.fetch_add(1, Ordering::AcqRel);

        {
            let mut active = self.active.lock().unwrap();
            if self.generation.load(Ordering::Acquire) != generation {
                return false;
            }
            if active.is_some() {
                // an earlier attempt already holds the connection
                return true;
            }
            *active = Some(ActiveChannel {
                id: channel_id,
                commands,
                shutdown,
            });
        }

        self.spawn_reader(inbound, generation, channel_id);
        true
    }

    fn spawn_reader(&self, mut inbound: mpsc::Receiver<Value>, generation: u64, channel_id: u64) {
        let Some(manager) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            while let Some(payload) = inbound.recv().await {
                match normalize_payload(&payload) {
                    Some(event) => {
                        tracing::debug!(
                            event_type = %event.event_type,
                            record_id = event.record.id,
                            member_id = event.record.member_id,
                            "Attendance event received"
                        );
                        manager.dispatcher.emit_event(&event);
                    }
                    None => {
                        tracing::debug!("Discarding unrecognized push payload");
                    }
                }
            }
            manager.on_channel_closed(generation, channel_id).await;
        });
    }

    /// Inbound pump ended. Explicit stops and superseded channels exit
    /// quietly; anything else is an unexpected closure and starts the
    /// reconnect loop.
    async fn on_channel_closed(&self, generation: u64, channel_id: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        let was_current = {
            let mut active = self.active.lock().unwrap();
            match active.as_ref() {
                Some(channel) if channel.id == channel_id => {
                    active.take();
                    true
                }
                _ => false,
            }
        };
        if !was_current {
            return;
        }

        tracing::warn!("Attendance hub connection closed unexpectedly");
        self.reconnect_loop(generation).await;
    }

    async fn reconnect_loop(&self, generation: u64) {
        if self.generation.load(Ordering::Acquire) != generation {
            return;
        }
        self.dispatcher.emit_state(ConnectionState::Reconnecting);

        let mut backoff = ReconnectBackoff::with_config(self.backoff_config.clone());
        loop {
            if self.generation.load(Ordering::Acquire) != generation {
                return;
            }
            let delay = backoff.next_delay();
            if !delay.is_zero() {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = self.shutdown.notified() => {}
                }
                if self.generation.load(Ordering::Acquire) != generation {
                    return;
                }
            }

            match self.connect().await {
                Ok(()) => {
                    tracing::info!(attempts = backoff.attempt(), "Reconnected to attendance hub");
                    self.spawn_rejoin(generation);
                    return;
                }
                Err(err) => {
                    tracing::warn!(
                        attempt = backoff.attempt(),
                        error = %err,
                        "Reconnect attempt failed"
                    );
                }
            }
        }
    }

    /// Best-effort re-join of the last active tenant group. Never blocks or
    /// fails the `Connected` transition; gives up after a bounded number of
    /// attempts.
    fn spawn_rejoin(&self, generation: u64) {
        let Some(group) = self.rejoin_group.lock().unwrap().clone() else {
            return;
        };
        let Some(manager) = self.me.upgrade() else {
            return;
        };
        tokio::spawn(async move {
            for attempt in 1..=REJOIN_ATTEMPTS {
                if manager.generation.load(Ordering::Acquire) != generation {
                    return;
                }
                match manager
                    .invoke(HubCommand::JoinGroup {
                        group: group.clone(),
                    })
                    .await
                {
                    Ok(()) => {
                        tracing::info!(group = %group, "Re-joined tenant group after reconnect");
                        return;
                    }
                    Err(err) if attempt < REJOIN_ATTEMPTS => {
                        tracing::debug!(
                            group = %group,
                            attempt,
                            error = %err,
                            "Re-join attempt failed"
                        );
                        tokio::time::sleep(REJOIN_RETRY_DELAY).await;
                    }
                    Err(err) => {
                        tracing::warn!(
                            group = %group,
                            error = %err,
                            "Giving up re-joining tenant group after reconnect"
                        );
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_state_display() {
        assert_eq!(ConnectionState::Disconnected.to_string(), "Disconnected");
        assert_eq!(ConnectionState::Reconnecting.to_string(), "Reconnecting");
    }

    #[test]
    fn test_connection_state_serializes_as_plain_name() {
        let json = serde_json::to_string(&ConnectionState::Connected).unwrap();
        assert_eq!(json, "\"Connected\"");
    }
}
