//! Transport abstraction for the hub connection.
//!
//! [`HubTransport`] is the factory seam: the production implementation opens
//! a WebSocket ([`WebSocketTransport`]); tests substitute an in-process
//! double. One open connection is represented by a [`HubChannel`]: an
//! outbound command sender, an inbound push receiver, and a shutdown handle.
//! The inbound receiver yielding `None` is the closure signal, whatever the
//! cause.

mod websocket;

use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

pub use websocket::WebSocketTransport;

/// Remote procedure calls issued over the open channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubCommand {
    JoinGroup { group: String },
    LeaveGroup { group: String },
}

impl HubCommand {
    pub fn target(&self) -> &'static str {
        match self {
            HubCommand::JoinGroup { .. } => "JoinGroup",
            HubCommand::LeaveGroup { .. } => "LeaveGroup",
        }
    }

    pub fn group(&self) -> &str {
        match self {
            HubCommand::JoinGroup { group } | HubCommand::LeaveGroup { group } => group,
        }
    }

    /// Wire representation: an invocation frame.
    pub fn to_frame(&self) -> Value {
        json!({
            "target": self.target(),
            "arguments": [self.group()],
        })
    }
}

/// One open hub connection.
pub struct HubChannel {
    /// Outbound invocations; the transport serializes and sends them.
    pub commands: mpsc::Sender<HubCommand>,
    /// Inbound push payloads, already parsed to JSON. `None` means the
    /// connection is gone.
    pub inbound: mpsc::Receiver<Value>,
    /// Closes the connection gracefully when sent (or dropped).
    pub shutdown: oneshot::Sender<()>,
}

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("invalid hub url {url}: {message}")]
    InvalidUrl { url: String, message: String },

    #[error("invalid bearer token: {0}")]
    InvalidToken(String),

    #[error("websocket handshake with {url} failed: {message}")]
    Handshake { url: String, message: String },
}

/// Opens hub connections.
#[async_trait::async_trait]
pub trait HubTransport: Send + Sync {
    /// Open a connection to `url`, authenticating with `bearer_token` when
    /// present. On failure nothing is left half-open.
    async fn open(
        &self,
        url: &str,
        bearer_token: Option<&str>,
    ) -> Result<HubChannel, TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_frame_shape() {
        let join = HubCommand::JoinGroup {
            group: "gym-5".to_string(),
        };
        let frame = join.to_frame();
        assert_eq!(frame["target"], "JoinGroup");
        assert_eq!(frame["arguments"][0], "gym-5");

        let leave = HubCommand::LeaveGroup {
            group: "gym-5".to_string(),
        };
        assert_eq!(leave.to_frame()["target"], "LeaveGroup");
    }
}
