use crate::client::SessionClient;
use crate::logger::*;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RouteMeta {
    /// Destination requires an authenticated session.
    pub requires_auth: bool,
    /// Destination is an auth-only page (sign-in/sign-up) that authenticated
    /// users should be bounced away from.
    pub redirect_if_auth: bool,
}

impl RouteMeta {
    pub fn protected() -> Self {
        RouteMeta {
            requires_auth: true,
            redirect_if_auth: false,
        }
    }

    pub fn auth_only() -> Self {
        RouteMeta {
            requires_auth: false,
            redirect_if_auth: true,
        }
    }

    pub fn public() -> Self {
        RouteMeta::default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardDecision {
    Allow,
    RedirectToSignIn,
    RedirectToLanding,
}

/// Navigation-time gate. Tries to establish a session from whatever tokens
/// survive in the store before turning anyone away; only a bare store skips
/// the network entirely.
pub struct RouteGuard {
    client: Arc<SessionClient>,
}

impl RouteGuard {
    pub fn new(client: Arc<SessionClient>) -> Self {
        RouteGuard { client }
    }

    pub async fn decide(&self, destination: RouteMeta) -> GuardDecision {
        if !self.client.is_authenticated() {
            let store = self.client.store();
            let has_access = store.access_token().is_some();
            let has_refresh = store.refresh_token().is_some();

            if has_access || has_refresh {
                // Full initialization: silent refresh first when the access
                // token is stale, then profile fetch.
                let established = self.client.init_session().await;
                if !established && destination.requires_auth {
                    debug!("session initialization failed on a protected route");
                    return GuardDecision::RedirectToSignIn;
                }
            } else if destination.requires_auth {
                return GuardDecision::RedirectToSignIn;
            }
        }

        if destination.redirect_if_auth && self.client.is_authenticated() {
            return GuardDecision::RedirectToLanding;
        }

        GuardDecision::Allow
    }
}

/// Reactive watcher over authentication-state transitions. `was` is `None`
/// on initial load, where no redirect ever fires; afterwards losing
/// authentication on a protected page or gaining it on an auth-only page
/// yields the corresponding redirect.
pub fn watch_transition(
    was: Option<bool>,
    is_authenticated: bool,
    current: RouteMeta,
) -> Option<GuardDecision> {
    let was = was?;
    if was == is_authenticated {
        return None;
    }
    if !is_authenticated && current.requires_auth {
        return Some(GuardDecision::RedirectToSignIn);
    }
    if is_authenticated && current.redirect_if_auth {
        return Some(GuardDecision::RedirectToLanding);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initial_load_never_redirects() {
        assert_eq!(watch_transition(None, false, RouteMeta::protected()), None);
        assert_eq!(watch_transition(None, true, RouteMeta::auth_only()), None);
    }

    #[test]
    fn losing_auth_on_protected_page_redirects_to_sign_in() {
        assert_eq!(
            watch_transition(Some(true), false, RouteMeta::protected()),
            Some(GuardDecision::RedirectToSignIn)
        );
    }

    #[test]
    fn losing_auth_on_public_page_does_nothing() {
        assert_eq!(watch_transition(Some(true), false, RouteMeta::public()), None);
    }

    #[test]
    fn gaining_auth_on_auth_only_page_redirects_to_landing() {
        assert_eq!(
            watch_transition(Some(false), true, RouteMeta::auth_only()),
            Some(GuardDecision::RedirectToLanding)
        );
    }

    #[test]
    fn steady_state_does_nothing() {
        assert_eq!(
            watch_transition(Some(true), true, RouteMeta::protected()),
            None
        );
        assert_eq!(
            watch_transition(Some(false), false, RouteMeta::auth_only()),
            None
        );
    }
}
