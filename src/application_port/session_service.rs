use crate::domain_model::{UserId, UserProfile};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone)]
pub struct SignupInput {
    pub identity: String,
    pub display_name: String,
    pub secret: String,
}

#[derive(Debug, Clone)]
pub struct SigninInput {
    pub identity: String,
    pub secret: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SigninOutcome {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

#[derive(Debug, thiserror::Error)]
pub enum SignupError {
    #[error("identity already registered")]
    Conflict,
    #[error("failed to create user: {0}")]
    Rejected(String),
}

/// Every signin failure collapses to the one variant before crossing the
/// boundary. Unknown identity and wrong secret are indistinguishable to
/// the caller.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum SigninError {
    #[error("invalid credentials")]
    Unauthorized,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RefreshError {
    #[error("invalid refresh token")]
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum LogoutError {
    #[error("logout failed: {0}")]
    Storage(String),
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum VerifyError {
    #[error("invalid access token")]
    Unauthorized,
}

#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    #[error("user not found")]
    NotFound,
    #[error("store error: {0}")]
    Store(String),
}

#[async_trait::async_trait]
pub trait SessionService: Send + Sync {
    /// Creates the user and returns the sanitized profile. No tokens are
    /// issued; the user signs in separately.
    async fn signup(&self, input: SignupInput) -> Result<UserProfile, SignupError>;

    /// Verifies credentials, issues a token pair and persists the refresh
    /// token to the user's slot.
    async fn signin(&self, input: SigninInput) -> Result<SigninOutcome, SigninError>;

    /// Exchanges a refresh token for a new pair, rotating the stored slot.
    /// The presented token becomes permanently unusable on success.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError>;

    /// Clears the user's refresh slot. Idempotent.
    async fn logout(&self, user: UserId) -> Result<(), LogoutError>;

    /// Validates a bearer access token and confirms the subject still exists.
    async fn verify_access(&self, token: &str) -> Result<UserId, VerifyError>;

    async fn current_user(&self, user: UserId) -> Result<UserProfile, ProfileError>;
}
