//! WebSocket implementation of [`HubTransport`].

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::{Bytes, Message};

use crate::config::HubConfig;

use super::{HubChannel, HubCommand, HubTransport, TransportError};

pub struct WebSocketTransport {
    command_buffer: usize,
    inbound_buffer: usize,
    keepalive_interval: Option<Duration>,
}

impl WebSocketTransport {
    pub fn from_settings(hub: &HubConfig) -> Self {
        Self {
            command_buffer: hub.command_buffer,
            inbound_buffer: hub.inbound_buffer,
            keepalive_interval: match hub.keepalive_interval {
                0 => None,
                secs => Some(Duration::from_secs(secs)),
            },
        }
    }
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::from_settings(&HubConfig::default())
    }
}

#[async_trait::async_trait]
impl HubTransport for WebSocketTransport {
    async fn open(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<HubChannel, TransportError> {
        let mut request = url
            .into_client_request()
            .map_err(|e| TransportError::InvalidUrl {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        if let Some(token) = bearer_token {
            let value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|e| TransportError::InvalidToken(e.to_string()))?;
            request.headers_mut().insert(AUTHORIZATION, value);
        }

        let (stream, response) =
            connect_async(request)
                .await
                .map_err(|e| TransportError::Handshake {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;

        tracing::info!(url = %url, status = %response.status().as_u16(), "WebSocket connected");

        let (mut sink, mut source) = stream.split();
        let (command_tx, mut command_rx) = mpsc::channel::<HubCommand>(self.command_buffer);
        let (inbound_tx, inbound_rx) = mpsc::channel::<Value>(self.inbound_buffer);
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let keepalive = self.keepalive_interval;
        let url = url.to_string();

        // One pump task owns both halves of the socket: outbound commands,
        // inbound frames, keepalive pings, shutdown. Dropping inbound_tx on
        // exit is the closure signal upstream.
        tokio::spawn(async move {
            let keepalive_enabled = keepalive.is_some();
            let mut ping = interval(keepalive.unwrap_or(Duration::from_secs(3600)));
            ping.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // the first tick of tokio::time::interval fires immediately
            ping.tick().await;

            loop {
                tokio::select! {
                    // drain queued commands before reacting to a shutdown, so
                    // a LeaveGroup issued right before teardown still goes out
                    biased;

                    command = command_rx.recv() => {
                        let Some(command) = command else {
                            // all command senders dropped; close gracefully
                            let _ = sink.send(Message::Close(None)).await;
                            break;
                        };
                        let frame = command.to_frame().to_string();
                        if let Err(err) = sink.send(Message::Text(frame.into())).await {
                            tracing::warn!(url = %url, error = %err, "Failed to send hub command");
                            break;
                        }
                    }
                    frame = source.next() => {
                        match frame {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<Value>(text.as_str()) {
                                    Ok(value) => {
                                        let payload = unwrap_invocation(value);
                                        if inbound_tx.send(payload).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(err) => {
                                        tracing::debug!(url = %url, error = %err, "Ignoring non-JSON hub frame");
                                    }
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                tracing::debug!(url = %url, "Hub sent close frame");
                                break;
                            }
                            // pong replies to our pings; ping is answered by tungstenite
                            Some(Ok(_)) => {}
                            Some(Err(err)) => {
                                tracing::warn!(url = %url, error = %err, "WebSocket read failed");
                                break;
                            }
                            None => {
                                tracing::debug!(url = %url, "WebSocket stream ended");
                                break;
                            }
                        }
                    }
                    _ = &mut shutdown_rx => {
                        let _ = sink.send(Message::Close(None)).await;
                        break;
                    }
                    _ = ping.tick(), if keepalive_enabled => {
                        if let Err(err) = sink.send(Message::Ping(Bytes::new())).await {
                            tracing::warn!(url = %url, error = %err, "Keepalive ping failed");
                            break;
                        }
                    }
                }
            }
        });

        Ok(HubChannel {
            commands: command_tx,
            inbound: inbound_rx,
            shutdown: shutdown_tx,
        })
    }
}

/// Servers wrap pushes in invocation frames; unwrap to the first argument.
/// Anything else is forwarded untouched and left to the normalizer.
fn unwrap_invocation(value: Value) -> Value {
    if value.get("target").and_then(Value::as_str).is_some() {
        if let Some(first) = value
            .get("arguments")
            .and_then(Value::as_array)
            .and_then(|arguments| arguments.first())
        {
            return first.clone();
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_unwrap_invocation_takes_first_argument() {
        let frame = json!({
            "target": "AttendanceUpdate",
            "arguments": [{ "eventType": "check-in" }]
        });
        assert_eq!(unwrap_invocation(frame), json!({ "eventType": "check-in" }));
    }

    #[test]
    fn test_unwrap_invocation_passes_plain_payloads_through() {
        let payload = json!({ "eventType": "check-in", "data": {} });
        assert_eq!(unwrap_invocation(payload.clone()), payload);

        let empty_arguments = json!({ "target": "AttendanceUpdate", "arguments": [] });
        assert_eq!(unwrap_invocation(empty_arguments.clone()), empty_arguments);
    }
}
