//! Bearer-token access for the hub connection.
//!
//! The token store itself belongs to the surrounding application; this crate
//! only consumes an accessor. The token is fetched afresh on every connection
//! attempt, so rotated tokens are picked up without an explicit reset.

use async_trait::async_trait;

/// Supplies the bearer token used to authenticate the hub connection.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Current bearer token, or `None` when the caller is unauthenticated.
    async fn bearer_token(&self) -> Option<String>;
}

/// A fixed-token provider, for applications with long-lived API tokens and
/// for tests.
pub struct StaticTokenProvider {
    token: Option<String>,
}

impl StaticTokenProvider {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: Some(token.into()),
        }
    }

    /// Provider that never supplies a token.
    pub fn anonymous() -> Self {
        Self { token: None }
    }
}

#[async_trait]
impl TokenProvider for StaticTokenProvider {
    async fn bearer_token(&self) -> Option<String> {
        self.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_provider_returns_token() {
        let provider = StaticTokenProvider::new("abc123");
        let token = tokio_test::block_on(provider.bearer_token());
        assert_eq!(token.as_deref(), Some("abc123"));
    }

    #[test]
    fn test_anonymous_provider_returns_none() {
        let provider = StaticTokenProvider::anonymous();
        assert!(tokio_test::block_on(provider.bearer_token()).is_none());
    }
}
