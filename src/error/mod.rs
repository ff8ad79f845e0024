use thiserror::Error;

/// Aggregated connection failure: every hub candidate URL was attempted and
/// none could be opened.
///
/// Cloneable so the deduplicated connect future can hand the same failure to
/// every caller awaiting it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("failed to reach attendance hub (tried: {}): {last_error}", .attempted.join(", "))]
pub struct ConnectError {
    /// Every URL attempted, in the order it was tried
    pub attempted: Vec<String>,
    /// The last underlying failure
    pub last_error: String,
}

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Connection error: {0}")]
    Connect(#[from] ConnectError),

    #[error("Not connected to the attendance hub")]
    NotConnected,
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_error_names_every_url() {
        let err = ConnectError {
            attempted: vec![
                "ws://a.example/hubs/attendance".to_string(),
                "ws://b.example/hubs/attendance".to_string(),
            ],
            last_error: "connection refused".to_string(),
        };

        let message = err.to_string();
        assert!(message.contains("ws://a.example/hubs/attendance"));
        assert!(message.contains("ws://b.example/hubs/attendance"));
        assert!(message.contains("connection refused"));
    }
}
