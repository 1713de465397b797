use crate::client::SessionClient;
use crate::logger::*;
use std::sync::Arc;

pub const AUTHORIZATION_HEADER: &str = "Authorization";

/// Binds the stored session to outgoing calls and tears it down on the
/// server's explicit "session invalid" signal. Never initiates a refresh;
/// renewal belongs to the scheduler and the route guard, which keeps a
/// failing call from looping through retry-refresh forever.
pub struct HttpSessionBinding {
    client: Arc<SessionClient>,
    logout_path: String,
}

impl HttpSessionBinding {
    pub fn new(client: Arc<SessionClient>) -> Self {
        HttpSessionBinding {
            client,
            logout_path: "/auth/logout".to_string(),
        }
    }

    pub fn with_logout_path(mut self, path: impl Into<String>) -> Self {
        self.logout_path = path.into();
        self
    }

    /// Bearer credential for an outgoing request, when a token is stored.
    pub fn authorization_header(&self) -> Option<(&'static str, String)> {
        self.client
            .store()
            .access_token()
            .map(|token| (AUTHORIZATION_HEADER, format!("Bearer {token}")))
    }

    /// Inbound hook. A 401 anywhere but the logout endpoint means the server
    /// no longer honors this session; drop it locally, without a refresh.
    pub fn on_response(&self, path: &str, status: u16) {
        if status != 401 {
            return;
        }
        if path.contains(&self.logout_path) {
            return;
        }
        debug!("401 from {path}, forcing local logout");
        self.client.force_local_logout();
    }
}
