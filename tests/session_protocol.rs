//! End-to-end protocol tests: issuance, rotation, replay detection, logout,
//! and the client-side refresh guard, run against the real issuer with an
//! in-memory directory and an in-process transport.

use chrono::Utc;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tessera::application_impl::InMemoryUserDirectory;
use tessera::application_port::{
    RefreshError, SessionService, SigninInput, SignupError, SignupInput, TokenPair,
};
use tessera::client::{
    Clock, DirectTransport, GuardDecision, ManualClock, MemoryCookieJar, RefreshOutcome, RouteGuard,
    RouteMeta, SessionClient, SessionHandshake, SessionStore, SessionTransport, StoreConfig,
    TransportError,
};
use tessera::domain::{Argon2SecretHasher, JwtTokenCodec, SessionIssuer, TokenConfig};
use tessera::domain_model::UserProfile;
use tokio::sync::Semaphore;
use warp::Filter;

fn issuer() -> Arc<dyn SessionService> {
    let codec = JwtTokenCodec::new(TokenConfig {
        access_secret: b"test-access-secret".to_vec(),
        refresh_secret: b"test-refresh-secret".to_vec(),
        access_ttl: Duration::from_secs(24 * 60 * 60),
        refresh_ttl: Duration::from_secs(7 * 24 * 60 * 60),
    })
    .expect("test codec config is valid");
    let directory = InMemoryUserDirectory::new(Arc::new(Argon2SecretHasher));
    Arc::new(SessionIssuer::new(Arc::new(directory), Arc::new(codec)))
}

fn signup_input() -> SignupInput {
    SignupInput {
        identity: "a@b.com".to_string(),
        display_name: "A".to_string(),
        secret: "Aa1!aaaa".to_string(),
    }
}

fn signin_input() -> SigninInput {
    SigninInput {
        identity: "a@b.com".to_string(),
        secret: "Aa1!aaaa".to_string(),
    }
}

fn client_for(service: Arc<dyn SessionService>) -> (Arc<SessionClient>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(Utc::now().timestamp_millis()));
    let store = SessionStore::new(
        Arc::new(MemoryCookieJar::new()),
        clock.clone(),
        StoreConfig::default(),
    );
    let transport = Arc::new(DirectTransport::new(service));
    (Arc::new(SessionClient::new(store, transport)), clock)
}

// =========================================================================
// Server-side lifecycle
// =========================================================================

#[tokio::test]
async fn signup_returns_profile_without_tokens() {
    let service = issuer();
    let profile = service.signup(signup_input()).await.unwrap();
    assert_eq!(profile.identity, "a@b.com");
    assert_eq!(profile.display_name, "A");
    // The type carries no tokens; signing in is a separate step and works.
    service.signin(signin_input()).await.unwrap();
}

#[tokio::test]
async fn duplicate_identity_conflicts() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let err = service.signup(signup_input()).await.unwrap_err();
    assert!(matches!(err, SignupError::Conflict));
}

#[tokio::test]
async fn unknown_identity_and_wrong_secret_are_indistinguishable() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();

    let unknown = service
        .signin(SigninInput {
            identity: "nobody@b.com".to_string(),
            secret: "Aa1!aaaa".to_string(),
        })
        .await
        .unwrap_err();
    let wrong = service
        .signin(SigninInput {
            identity: "a@b.com".to_string(),
            secret: "wrong-secret".to_string(),
        })
        .await
        .unwrap_err();

    assert_eq!(unknown, wrong);
    assert_eq!(unknown.to_string(), wrong.to_string());
}

#[tokio::test]
async fn refresh_rotates_and_replay_fails() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let outcome = service.signin(signin_input()).await.unwrap();
    let original = outcome.tokens.refresh_token.clone();

    let rotated = service.refresh(&original).await.unwrap();
    assert_ne!(rotated.refresh_token, original);
    assert_ne!(rotated.access_token, outcome.tokens.access_token);

    // The slot now holds the rotated token; replaying the original fails
    // even though its signature and expiry are still good.
    let err = service.refresh(&original).await.unwrap_err();
    assert_eq!(err, RefreshError::Unauthorized);

    // The rotated token itself is still honored.
    service.refresh(&rotated.refresh_token).await.unwrap();
}

#[tokio::test]
async fn signin_supersedes_previous_refresh_token() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let first = service.signin(signin_input()).await.unwrap();
    let second = service.signin(signin_input()).await.unwrap();

    // Single-slot storage: the second signin invalidated the first session.
    let err = service.refresh(&first.tokens.refresh_token).await.unwrap_err();
    assert_eq!(err, RefreshError::Unauthorized);
    service.refresh(&second.tokens.refresh_token).await.unwrap();
}

#[tokio::test]
async fn logout_clears_slot_and_is_idempotent() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let outcome = service.signin(signin_input()).await.unwrap();

    service.logout(outcome.user.id).await.unwrap();
    service.logout(outcome.user.id).await.unwrap();

    // The refresh token is unexpired but the slot is empty.
    let err = service.refresh(&outcome.tokens.refresh_token).await.unwrap_err();
    assert_eq!(err, RefreshError::Unauthorized);
}

#[tokio::test]
async fn forged_and_wrong_kind_tokens_are_rejected() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let outcome = service.signin(signin_input()).await.unwrap();

    assert_eq!(
        service.refresh("garbage").await.unwrap_err(),
        RefreshError::Unauthorized
    );
    // An access token presented as a refresh token fails verification.
    assert_eq!(
        service.refresh(&outcome.tokens.access_token).await.unwrap_err(),
        RefreshError::Unauthorized
    );
    // A refresh token is not a bearer credential.
    service
        .verify_access(&outcome.tokens.refresh_token)
        .await
        .unwrap_err();
}

#[tokio::test]
async fn end_to_end_scenario() {
    let service = issuer();

    // Sign up: profile only.
    let profile = service.signup(signup_input()).await.unwrap();

    // Sign in: profile plus a fresh pair.
    let signin = service.signin(signin_input()).await.unwrap();
    assert_eq!(signin.user, profile);
    assert!(signin.tokens.access_expires_at <= signin.tokens.refresh_expires_at);

    // Refresh: new pair, values differ from the originals.
    let refreshed = service.refresh(&signin.tokens.refresh_token).await.unwrap();
    assert_ne!(refreshed.access_token, signin.tokens.access_token);
    assert_ne!(refreshed.refresh_token, signin.tokens.refresh_token);

    // Replay of the original refresh token: rejected.
    assert_eq!(
        service.refresh(&signin.tokens.refresh_token).await.unwrap_err(),
        RefreshError::Unauthorized
    );

    // Logout with the latest access token.
    let user_id = service.verify_access(&refreshed.access_token).await.unwrap();
    service.logout(user_id).await.unwrap();

    // The latest, still-unexpired refresh token is dead: slot cleared.
    assert_eq!(
        service.refresh(&refreshed.refresh_token).await.unwrap_err(),
        RefreshError::Unauthorized
    );
}

// =========================================================================
// Client-side protocol
// =========================================================================

#[tokio::test]
async fn login_persists_session_and_logout_destroys_it() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (client, _clock) = client_for(service);

    let user = client.login("a@b.com", "Aa1!aaaa").await.unwrap();
    assert_eq!(user.identity, "a@b.com");
    assert!(client.is_authenticated());
    assert!(client.store().refresh_token().is_some());

    client.logout().await;
    assert!(!client.is_authenticated());
    assert_eq!(client.store().access_token(), None);
    assert_eq!(client.store().refresh_token(), None);
}

#[tokio::test]
async fn client_refresh_rotates_stored_tokens() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (client, _clock) = client_for(service);
    client.login("a@b.com", "Aa1!aaaa").await.unwrap();
    let before = client.store().refresh_token().unwrap();

    assert_eq!(client.refresh_session().await, RefreshOutcome::Refreshed);

    let after = client.store().refresh_token().unwrap();
    assert_ne!(before, after);
}

#[tokio::test]
async fn failed_refresh_terminates_in_full_logout() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (client, _clock) = client_for(service.clone());
    client.login("a@b.com", "Aa1!aaaa").await.unwrap();

    // Kill the session server-side; the stored refresh token no longer
    // matches the slot.
    let user_id = service
        .verify_access(&client.store().access_token().unwrap())
        .await
        .unwrap();
    service.logout(user_id).await.unwrap();

    assert_eq!(client.refresh_session().await, RefreshOutcome::LoggedOut);
    assert!(!client.is_authenticated());
    assert_eq!(client.store().access_token(), None);
}

#[tokio::test]
async fn init_session_refreshes_expired_access_token() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (client, clock) = client_for(service);
    client.login("a@b.com", "Aa1!aaaa").await.unwrap();

    // Cross the recorded expiry; only the refresh token is still usable.
    clock.advance_ms(25 * 60 * 60 * 1000);
    assert!(!client.store().is_valid());

    assert!(client.init_session().await);
    assert!(client.store().is_valid());
    assert!(client.is_authenticated());
}

#[tokio::test]
async fn refresh_with_nothing_stored_releases_the_guard() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (client, _clock) = client_for(service);

    // Empty store: no call is made and, crucially, the in-progress flag is
    // not left set.
    assert_eq!(
        client.refresh_session().await,
        RefreshOutcome::NoRefreshToken
    );

    // A later real refresh must still be able to win the flag.
    client.login("a@b.com", "Aa1!aaaa").await.unwrap();
    assert_eq!(client.refresh_session().await, RefreshOutcome::Refreshed);
}

// Transport wrapper that counts refresh calls and holds them at a gate so a
// second attempt can be made while the first is provably in flight.
struct GatedTransport {
    inner: DirectTransport,
    refresh_calls: AtomicUsize,
    gate: Semaphore,
}

#[async_trait::async_trait]
impl SessionTransport for GatedTransport {
    async fn signup(
        &self,
        identity: &str,
        name: &str,
        secret: &str,
    ) -> Result<UserProfile, TransportError> {
        self.inner.signup(identity, name, secret).await
    }

    async fn signin(
        &self,
        identity: &str,
        secret: &str,
    ) -> Result<SessionHandshake, TransportError> {
        self.inner.signin(identity, secret).await
    }

    async fn refresh(&self, refresh_token: &str) -> Result<TokenPair, TransportError> {
        self.refresh_calls.fetch_add(1, Ordering::SeqCst);
        let _permit = self.gate.acquire().await.expect("gate closed");
        self.inner.refresh(refresh_token).await
    }

    async fn logout(&self, access_token: &str) -> Result<(), TransportError> {
        self.inner.logout(access_token).await
    }

    async fn current_user(&self, access_token: &str) -> Result<UserProfile, TransportError> {
        self.inner.current_user(access_token).await
    }
}

#[tokio::test]
async fn concurrent_refresh_attempts_make_exactly_one_call() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();

    let transport = Arc::new(GatedTransport {
        inner: DirectTransport::new(service),
        refresh_calls: AtomicUsize::new(0),
        gate: Semaphore::new(0),
    });
    let clock = Arc::new(ManualClock::new(Utc::now().timestamp_millis()));
    let store = SessionStore::new(
        Arc::new(MemoryCookieJar::new()),
        clock,
        StoreConfig::default(),
    );
    let client = Arc::new(SessionClient::new(store, transport.clone()));
    client.login("a@b.com", "Aa1!aaaa").await.unwrap();

    // First attempt reaches the transport and parks at the gate.
    let racing = tokio::spawn({
        let client = client.clone();
        async move { client.refresh_session().await }
    });
    while transport.refresh_calls.load(Ordering::SeqCst) == 0 {
        tokio::task::yield_now().await;
    }

    // Second attempt sees the in-progress flag and makes no call.
    assert_eq!(
        client.refresh_session().await,
        RefreshOutcome::SkippedInFlight
    );
    assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 1);

    // Release the first attempt; it completes the rotation alone.
    transport.gate.add_permits(1);
    assert_eq!(racing.await.unwrap(), RefreshOutcome::Refreshed);
    assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 1);
}

// =========================================================================
// HTTP surface
// =========================================================================

fn api(
    service: Arc<dyn SessionService>,
) -> impl warp::Filter<Extract = (impl warp::Reply,), Error = std::convert::Infallible> + Clone {
    let server = Arc::new(tessera::server::Server {
        session_service: service,
    });
    tessera::api::v1::routes(server).recover(tessera::api::v1::recover_error)
}

#[tokio::test]
async fn guarded_endpoints_without_authorization_header_answer_401() {
    let service = issuer();
    let routes = api(service);

    let resp = warp::test::request()
        .method("POST")
        .path("/auth/logout")
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), warp::http::StatusCode::UNAUTHORIZED);

    let resp = warp::test::request()
        .method("GET")
        .path("/users/me")
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), warp::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_authorization_header_answers_401() {
    let service = issuer();
    let routes = api(service);

    let resp = warp::test::request()
        .method("GET")
        .path("/users/me")
        .header("Authorization", "Token not-a-bearer")
        .reply(&routes)
        .await;
    assert_eq!(resp.status(), warp::http::StatusCode::UNAUTHORIZED);
}

// =========================================================================
// Route guarding
// =========================================================================

#[tokio::test]
async fn bare_store_redirects_protected_navigation_without_network() {
    let service = issuer();
    let transport = Arc::new(GatedTransport {
        inner: DirectTransport::new(service),
        refresh_calls: AtomicUsize::new(0),
        gate: Semaphore::new(1),
    });
    let clock = Arc::new(ManualClock::new(Utc::now().timestamp_millis()));
    let store = SessionStore::new(
        Arc::new(MemoryCookieJar::new()),
        clock,
        StoreConfig::default(),
    );
    let client = Arc::new(SessionClient::new(store, transport.clone()));
    let guard = RouteGuard::new(client);

    assert_eq!(
        guard.decide(RouteMeta::protected()).await,
        GuardDecision::RedirectToSignIn
    );
    assert_eq!(transport.refresh_calls.load(Ordering::SeqCst), 0);

    // Public and auth-only destinations pass.
    assert_eq!(guard.decide(RouteMeta::public()).await, GuardDecision::Allow);
    assert_eq!(
        guard.decide(RouteMeta::auth_only()).await,
        GuardDecision::Allow
    );
}

#[tokio::test]
async fn guard_establishes_session_from_stale_tokens() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (first, clock) = client_for(service.clone());
    first.login("a@b.com", "Aa1!aaaa").await.unwrap();

    // Simulate a fresh page load after the recorded expiry passed: same
    // durable tokens in a new client with no profile loaded.
    let access = first.store().access_token().unwrap();
    let refresh = first.store().refresh_token().unwrap();
    let store = SessionStore::new(
        Arc::new(MemoryCookieJar::new()),
        clock.clone(),
        StoreConfig::default(),
    );
    store.save(&access, Some(&refresh), Some(clock.now_ms() + 1_000));
    clock.advance_ms(2_000);

    let client = Arc::new(SessionClient::new(
        store,
        Arc::new(DirectTransport::new(service)),
    ));
    assert!(!client.is_authenticated());

    let guard = RouteGuard::new(client.clone());
    assert_eq!(guard.decide(RouteMeta::protected()).await, GuardDecision::Allow);
    assert!(client.is_authenticated());
    // The silent refresh rotated the stored pair.
    assert_ne!(client.store().refresh_token().unwrap(), refresh);
}

#[tokio::test]
async fn authenticated_user_is_bounced_off_auth_only_pages() {
    let service = issuer();
    service.signup(signup_input()).await.unwrap();
    let (client, _clock) = client_for(service);
    client.login("a@b.com", "Aa1!aaaa").await.unwrap();
    let guard = RouteGuard::new(client);

    assert_eq!(
        guard.decide(RouteMeta::auth_only()).await,
        GuardDecision::RedirectToLanding
    );
    assert_eq!(guard.decide(RouteMeta::protected()).await, GuardDecision::Allow);
}
