use once_cell::sync::Lazy;
use parking_lot::RwLock;
use reqwest::header::{HeaderValue, AUTHORIZATION};
use reqwest::RequestBuilder;
use std::sync::Arc;
use tracing::{debug, warn};

static GLOBAL: Lazy<RequestGateway> = Lazy::new(RequestGateway::new);

/// Holds the bearer token every outgoing API request carries.
///
/// Cloning shares the same configuration. Only the session owner writes it;
/// request tasks read it when they build their request.
#[derive(Clone, Default)]
pub struct RequestGateway {
    token: Arc<RwLock<Option<String>>>,
}

impl RequestGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// The process-wide instance used by the running application.
    pub fn global() -> RequestGateway {
        GLOBAL.clone()
    }

    /// Replace the active configuration. A blank token clears it.
    pub fn configure(&self, token: Option<&str>) {
        let next = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(str::to_string);
        debug!(configured = next.is_some(), "request gateway reconfigured");
        *self.token.write() = next;
    }

    pub fn is_configured(&self) -> bool {
        self.token.read().is_some()
    }

    #[cfg(test)]
    pub fn token(&self) -> Option<String> {
        self.token.read().clone()
    }

    /// `Bearer <token>` when configured, otherwise nothing at all.
    pub fn authorization_header(&self) -> Option<HeaderValue> {
        let guard = self.token.read();
        let token = guard.as_deref()?;
        match HeaderValue::from_str(&format!("Bearer {token}")) {
            Ok(mut value) => {
                value.set_sensitive(true);
                Some(value)
            }
            Err(err) => {
                warn!("stored token is not a valid header value: {err}");
                None
            }
        }
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match self.authorization_header() {
            Some(value) => request.header(AUTHORIZATION, value),
            None => request,
        }
    }
}

impl std::fmt::Debug for RequestGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestGateway")
            .field("configured", &self.is_configured())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn built_header(gateway: &RequestGateway) -> Option<HeaderValue> {
        let client = reqwest::Client::new();
        let request = gateway
            .apply(client.get("http://localhost:8001/api/dashboard"))
            .build()
            .unwrap();
        request.headers().get(AUTHORIZATION).cloned()
    }

    #[test]
    fn configured_token_is_sent_as_bearer() {
        let gateway = RequestGateway::new();
        gateway.configure(Some("abc"));
        assert_eq!(built_header(&gateway).unwrap(), "Bearer abc");
    }

    #[test]
    fn clearing_removes_the_header_entirely() {
        let gateway = RequestGateway::new();
        for token in ["abc", "def", "ghi"] {
            gateway.configure(Some(token));
            gateway.configure(None);
            assert!(built_header(&gateway).is_none());
            assert!(!gateway.is_configured());
        }
    }

    #[test]
    fn blank_token_counts_as_no_token() {
        let gateway = RequestGateway::new();
        gateway.configure(Some("abc"));
        gateway.configure(Some("   "));
        assert!(built_header(&gateway).is_none());
    }

    #[test]
    fn last_configure_wins_across_clones() {
        let gateway = RequestGateway::new();
        let shared = gateway.clone();
        gateway.configure(Some("first"));
        shared.configure(Some("second"));
        assert_eq!(gateway.token().as_deref(), Some("second"));
        assert_eq!(built_header(&gateway).unwrap(), "Bearer second");
    }
}
