use crate::client::Clock;
use crate::logger::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
}

#[derive(Debug, Clone)]
pub struct CookieAttributes {
    pub path: String,
    pub same_site: SameSite,
    pub secure: bool,
    pub max_age: Duration,
}

/// Origin-scoped durable key/value storage, the shape of a browser cookie
/// jar. Implementations may fail internally but must surface that as a
/// missing value, never a panic.
pub trait CookieJar: Send + Sync {
    fn get(&self, name: &str) -> Option<String>;
    fn set(&self, name: &str, value: &str, attrs: &CookieAttributes);
    fn remove(&self, name: &str, attrs: &CookieAttributes);
}

/// Jar backed by process memory, for tests and in-process clients.
pub struct MemoryCookieJar {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        MemoryCookieJar {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for MemoryCookieJar {
    fn default() -> Self {
        Self::new()
    }
}

impl CookieJar for MemoryCookieJar {
    fn get(&self, name: &str) -> Option<String> {
        self.entries.lock().ok()?.get(name).cloned()
    }

    fn set(&self, name: &str, value: &str, _attrs: &CookieAttributes) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(name.to_owned(), value.to_owned());
        }
    }

    fn remove(&self, name: &str, _attrs: &CookieAttributes) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(name);
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub access_key: String,
    pub refresh_key: String,
    pub expiry_key: String,
    /// Lifetime of the access/expiry cookies themselves.
    pub access_cookie_ttl: Duration,
    /// Lifetime of the refresh cookie.
    pub refresh_cookie_ttl: Duration,
    /// Assumed access-token TTL, used to compute a default expiry when the
    /// server did not supply one.
    pub access_token_ttl: Duration,
    /// Secure-only cookies; on in production.
    pub secure: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        StoreConfig {
            access_key: "tessera_access".to_string(),
            refresh_key: "tessera_refresh".to_string(),
            expiry_key: "tessera_expiry".to_string(),
            access_cookie_ttl: Duration::from_secs(24 * 60 * 60),
            refresh_cookie_ttl: Duration::from_secs(7 * 24 * 60 * 60),
            access_token_ttl: Duration::from_secs(24 * 60 * 60),
            secure: false,
        }
    }
}

/// Client-side single source of truth for "am I logged in": the current
/// access token, refresh token and access-token expiry, each an independent
/// entry. Read failures degrade to "no session", they never propagate.
pub struct SessionStore {
    jar: Arc<dyn CookieJar>,
    clock: Arc<dyn Clock>,
    cfg: StoreConfig,
}

impl SessionStore {
    pub fn new(jar: Arc<dyn CookieJar>, clock: Arc<dyn Clock>, cfg: StoreConfig) -> Self {
        SessionStore { jar, clock, cfg }
    }

    fn attrs(&self, max_age: Duration) -> CookieAttributes {
        CookieAttributes {
            path: "/".to_string(),
            same_site: SameSite::Strict,
            secure: self.cfg.secure,
            max_age,
        }
    }

    /// Persists the pair. An empty access token is logged and dropped rather
    /// than stored. When `expires_at_ms` is absent or not in the future the
    /// expiry defaults to now plus the configured access-token TTL.
    pub fn save(&self, access: &str, refresh: Option<&str>, expires_at_ms: Option<i64>) {
        if access.is_empty() {
            error!("refusing to save an empty access token");
            return;
        }

        self.jar
            .set(&self.cfg.access_key, access, &self.attrs(self.cfg.access_cookie_ttl));

        if let Some(refresh) = refresh {
            self.jar.set(
                &self.cfg.refresh_key,
                refresh,
                &self.attrs(self.cfg.refresh_cookie_ttl),
            );
        }

        let now = self.clock.now_ms();
        let default_expiry = now + self.cfg.access_token_ttl.as_millis() as i64;
        let expiry = match expires_at_ms {
            Some(at) if at > now => at,
            _ => default_expiry,
        };
        self.jar.set(
            &self.cfg.expiry_key,
            &expiry.to_string(),
            &self.attrs(self.cfg.access_cookie_ttl),
        );
    }

    pub fn access_token(&self) -> Option<String> {
        self.jar.get(&self.cfg.access_key).filter(|t| !t.is_empty())
    }

    pub fn refresh_token(&self) -> Option<String> {
        self.jar.get(&self.cfg.refresh_key).filter(|t| !t.is_empty())
    }

    /// Recorded access-token expiry in epoch milliseconds; 0 when missing or
    /// corrupt.
    pub fn expiry_ms(&self) -> i64 {
        let Some(raw) = self.jar.get(&self.cfg.expiry_key) else {
            return 0;
        };
        match raw.parse::<i64>() {
            Ok(ms) => ms,
            Err(_) => {
                warn!("corrupt expiry entry: {raw:?}");
                0
            }
        }
    }

    /// Removes all three entries. Idempotent.
    pub fn clear(&self) {
        let attrs = self.attrs(Duration::ZERO);
        self.jar.remove(&self.cfg.access_key, &attrs);
        self.jar.remove(&self.cfg.refresh_key, &attrs);
        self.jar.remove(&self.cfg.expiry_key, &attrs);
    }

    /// True iff an access token is present and the recorded expiry, if any,
    /// has not passed. A missing expiry counts as valid.
    pub fn is_valid(&self) -> bool {
        if self.access_token().is_none() {
            return false;
        }
        let expiry = self.expiry_ms();
        expiry == 0 || self.clock.now_ms() < expiry
    }
}
