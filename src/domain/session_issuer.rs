use crate::application_port::{
    LogoutError, ProfileError, RefreshError, SessionService, SigninError, SigninInput,
    SigninOutcome, SignupError, SignupInput, TokenCodec, TokenError, TokenKind, TokenPair,
    VerifyError,
};
use crate::domain_model::{UserId, UserProfile};
use crate::domain_port::{DirectoryError, NewUser, UserDirectory};
use crate::logger::*;
use std::sync::Arc;

/// Server-side orchestrator of the token lifecycle. Sole writer of the
/// per-user refresh slot: signin overwrites it, refresh rotates it via
/// compare-and-swap, logout clears it.
pub struct SessionIssuer {
    directory: Arc<dyn UserDirectory>,
    codec: Arc<dyn TokenCodec>,
}

impl SessionIssuer {
    pub fn new(directory: Arc<dyn UserDirectory>, codec: Arc<dyn TokenCodec>) -> Self {
        SessionIssuer { directory, codec }
    }

    async fn issue_pair(&self, subject: UserId) -> Result<TokenPair, TokenError> {
        let access = self.codec.sign(TokenKind::Access, subject).await?;
        let refresh = self.codec.sign(TokenKind::Refresh, subject).await?;
        Ok(TokenPair {
            access_token: access.token,
            refresh_token: refresh.token,
            access_expires_at: access.expires_at,
            refresh_expires_at: refresh.expires_at,
        })
    }
}

#[async_trait::async_trait]
impl SessionService for SessionIssuer {
    async fn signup(&self, input: SignupInput) -> Result<UserProfile, SignupError> {
        let record = self
            .directory
            .create(NewUser {
                identity: input.identity,
                display_name: input.display_name,
                secret: input.secret,
            })
            .await
            .map_err(|e| match e {
                DirectoryError::DuplicateIdentity => SignupError::Conflict,
                DirectoryError::Store(msg) => SignupError::Rejected(msg),
            })?;

        Ok(record.profile())
    }

    async fn signin(&self, input: SigninInput) -> Result<SigninOutcome, SigninError> {
        // Unknown identity and wrong secret converge on the same outcome;
        // nothing downstream of this function can tell them apart.
        let record = self
            .directory
            .find_by_identity(&input.identity)
            .await
            .map_err(|e| {
                warn!("signin directory lookup failed: {e}");
                SigninError::Unauthorized
            })?
            .ok_or(SigninError::Unauthorized)?;

        let secret_ok = self
            .directory
            .verify_secret(record.id, &input.secret)
            .await
            .map_err(|e| {
                warn!("signin secret verification failed: {e}");
                SigninError::Unauthorized
            })?;
        if !secret_ok {
            return Err(SigninError::Unauthorized);
        }

        let tokens = self.issue_pair(record.id).await.map_err(|e| {
            warn!("signin token issuance failed: {e}");
            SigninError::Unauthorized
        })?;

        self.directory
            .set_refresh_slot(record.id, Some(&tokens.refresh_token))
            .await
            .map_err(|e| {
                warn!("signin slot persistence failed: {e}");
                SigninError::Unauthorized
            })?;

        Ok(SigninOutcome {
            user: record.profile(),
            tokens,
        })
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, RefreshError> {
        let subject = self
            .codec
            .verify(TokenKind::Refresh, refresh_token)
            .await
            .map_err(|_| RefreshError::Unauthorized)?;

        let record = self
            .directory
            .find_by_id(subject)
            .await
            .map_err(|e| {
                warn!("refresh directory lookup failed: {e}");
                RefreshError::Unauthorized
            })?
            .ok_or(RefreshError::Unauthorized)?;

        let tokens = self.issue_pair(record.id).await.map_err(|e| {
            warn!("refresh token issuance failed: {e}");
            RefreshError::Unauthorized
        })?;

        // Rotation. The swap succeeds only while the slot still holds the
        // presented token, so a replayed token loses here no matter how the
        // concurrent attempts interleave.
        let rotated = self
            .directory
            .swap_refresh_slot(record.id, refresh_token, &tokens.refresh_token)
            .await
            .map_err(|e| {
                warn!("refresh slot rotation failed: {e}");
                RefreshError::Unauthorized
            })?;
        if !rotated {
            debug!(user = %record.id, "refresh token does not match stored slot");
            return Err(RefreshError::Unauthorized);
        }

        Ok(tokens)
    }

    async fn logout(&self, user: UserId) -> Result<(), LogoutError> {
        self.directory
            .set_refresh_slot(user, None)
            .await
            .map_err(|e| LogoutError::Storage(e.to_string()))
    }

    async fn verify_access(&self, token: &str) -> Result<UserId, VerifyError> {
        let subject = self
            .codec
            .verify(TokenKind::Access, token)
            .await
            .map_err(|_| VerifyError::Unauthorized)?;

        let exists = self
            .directory
            .find_by_id(subject)
            .await
            .map_err(|e| {
                warn!("access verification lookup failed: {e}");
                VerifyError::Unauthorized
            })?
            .is_some();
        if !exists {
            return Err(VerifyError::Unauthorized);
        }

        Ok(subject)
    }

    async fn current_user(&self, user: UserId) -> Result<UserProfile, ProfileError> {
        let record = self
            .directory
            .find_by_id(user)
            .await
            .map_err(|e| ProfileError::Store(e.to_string()))?
            .ok_or(ProfileError::NotFound)?;
        Ok(record.profile())
    }
}
