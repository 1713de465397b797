use crate::domain_model::UserId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Access => "access",
            TokenKind::Refresh => "refresh",
        }
    }
}

/// Startup-time misconfiguration. Fails construction, never a per-call path.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {} token secret", .0.as_str())]
    MissingSecret(TokenKind),
    #[error("access token TTL exceeds refresh token TTL")]
    TtlOrdering,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// Bad signature, malformed payload, or expiry in the past. Deliberately
    /// one variant so callers cannot distinguish the failure mode.
    #[error("invalid token")]
    Invalid,
    #[error("token encoding: {0}")]
    Encoding(String),
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait TokenCodec: Send + Sync {
    async fn sign(&self, kind: TokenKind, subject: UserId) -> Result<SignedToken, TokenError>;
    async fn verify(&self, kind: TokenKind, token: &str) -> Result<UserId, TokenError>;
}
