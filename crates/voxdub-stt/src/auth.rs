//! Short-lived credential acquisition for the recognition session.

use async_trait::async_trait;
use voxdub_foundation::SessionError;

/// Supplies the session token presented when opening the transport.
/// Tokens are fetched fresh per session start; nothing is cached here.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    async fn fetch_token(&self) -> Result<String, SessionError>;
}

/// Uses a pre-issued key directly as the session token. Suitable for
/// deployments where the recognizer accepts long-lived API keys, and for
/// tests.
pub struct StaticToken {
    token: String,
}

impl StaticToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

#[async_trait]
impl TokenProvider for StaticToken {
    async fn fetch_token(&self) -> Result<String, SessionError> {
        if self.token.is_empty() {
            return Err(SessionError::AuthFailed("missing API key".into()));
        }
        Ok(self.token.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn static_token_round_trip() {
        let provider = StaticToken::new("abc123");
        assert_eq!(provider.fetch_token().await.unwrap(), "abc123");
    }

    #[tokio::test]
    async fn empty_key_is_an_auth_failure() {
        let provider = StaticToken::new("");
        assert!(matches!(
            provider.fetch_token().await,
            Err(SessionError::AuthFailed(_))
        ));
    }
}
