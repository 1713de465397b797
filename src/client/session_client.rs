use crate::client::{SessionStore, SessionTransport, TransportError};
use crate::domain_model::UserProfile;
use crate::logger::*;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A new pair was obtained and stored.
    Refreshed,
    /// Another refresh was already in flight; no call was made.
    SkippedInFlight,
    /// No refresh token on record; no call was made.
    NoRefreshToken,
    /// The refresh failed and the session was torn down locally.
    LoggedOut,
}

/// Client-side session state: the durable store plus the in-memory profile,
/// with all refresh attempts funneled through a single in-progress guard.
/// Rotation on the server makes a duplicate refresh fatal for the loser, so
/// at most one may ever be in flight.
pub struct SessionClient {
    store: SessionStore,
    transport: Arc<dyn SessionTransport>,
    profile: Mutex<Option<UserProfile>>,
    refresh_in_progress: AtomicBool,
}

impl SessionClient {
    pub fn new(store: SessionStore, transport: Arc<dyn SessionTransport>) -> Self {
        SessionClient {
            store,
            transport,
            profile: Mutex::new(None),
            refresh_in_progress: AtomicBool::new(false),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn profile(&self) -> Option<UserProfile> {
        self.profile.lock().ok().and_then(|p| p.clone())
    }

    fn set_profile(&self, profile: Option<UserProfile>) {
        if let Ok(mut guard) = self.profile.lock() {
            *guard = profile;
        }
    }

    /// Authenticated means a profile is loaded and the stored access token
    /// has not passed its recorded expiry.
    pub fn is_authenticated(&self) -> bool {
        self.profile().is_some() && self.store.is_valid()
    }

    pub async fn register(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
    ) -> Result<UserProfile, TransportError> {
        self.transport.signup(identity, name, secret).await
    }

    pub async fn login(&self, identity: &str, secret: &str) -> Result<UserProfile, TransportError> {
        let handshake = self.transport.signin(identity, secret).await?;
        self.store.save(
            &handshake.tokens.access_token,
            Some(&handshake.tokens.refresh_token),
            Some(handshake.tokens.access_expires_at.timestamp_millis()),
        );
        self.set_profile(Some(handshake.user.clone()));
        Ok(handshake.user)
    }

    /// Tells the server to clear the slot (best effort), then always drops
    /// local state.
    pub async fn logout(&self) {
        if let Some(access) = self.store.access_token() {
            if let Err(e) = self.transport.logout(&access).await {
                warn!("server logout failed: {e}");
            }
        }
        self.force_local_logout();
    }

    /// Local teardown only; used on 401 responses and failed refreshes where
    /// a server round trip is pointless or already failed.
    pub fn force_local_logout(&self) {
        self.store.clear();
        self.set_profile(None);
    }

    /// Exchanges the stored refresh token for a new pair. The in-progress
    /// flag is acquired atomically before the network call and released on
    /// every exit path; a second caller observing it set no-ops.
    pub async fn refresh_session(&self) -> RefreshOutcome {
        if self
            .refresh_in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("refresh already in progress");
            return RefreshOutcome::SkippedInFlight;
        }

        // The token must be read while holding the flag: a refresh that
        // completed between a read and the acquisition would have rotated
        // the slot, and sending the superseded token gets this session
        // killed server-side.
        let Some(refresh) = self.store.refresh_token() else {
            self.refresh_in_progress.store(false, Ordering::Release);
            return RefreshOutcome::NoRefreshToken;
        };

        let outcome = match self.transport.refresh(&refresh).await {
            Ok(pair) => {
                self.store.save(
                    &pair.access_token,
                    Some(&pair.refresh_token),
                    Some(pair.access_expires_at.timestamp_millis()),
                );
                RefreshOutcome::Refreshed
            }
            Err(e) => {
                warn!("refresh failed, logging out: {e}");
                self.force_local_logout();
                RefreshOutcome::LoggedOut
            }
        };

        self.refresh_in_progress.store(false, Ordering::Release);
        outcome
    }

    /// Reconstructs the session from stored tokens: refresh first when the
    /// access token is invalid, then load the profile. Returns whether an
    /// authenticated session was established.
    pub async fn init_session(&self) -> bool {
        if !self.store.is_valid() {
            if self.store.refresh_token().is_some() {
                match self.refresh_session().await {
                    RefreshOutcome::Refreshed => {}
                    other => {
                        debug!("session init refresh did not complete: {other:?}");
                        return false;
                    }
                }
            } else {
                debug!("no refresh token available");
                return false;
            }
        }

        let Some(access) = self.store.access_token() else {
            return false;
        };
        match self.transport.current_user(&access).await {
            Ok(user) => {
                self.set_profile(Some(user));
                true
            }
            Err(e) => {
                warn!("failed to load user profile: {e}");
                self.force_local_logout();
                false
            }
        }
    }
}
