//! Authentication — transport credentials and the shared credential store.
//!
//! ## Security Model
//!
//! - The credential is attached to the WebSocket handshake (`{auth: {token}}`)
//!   and injected as a `Bearer` header on every REST request.
//! - Service-to-service publishers use a distinct privileged credential
//!   (`{auth: {serviceToken}}`).
//! - Tokens are NEVER printed: `Debug` on [`Credential`] redacts them.
//!
//! ## Refresh
//!
//! [`CredentialStore`] is shared between the HTTP client and the connection
//! manager. Replacing the credential does not interrupt an open connection;
//! the next handshake picks it up.

use async_lock::RwLock;
use serde::Serialize;
use std::sync::Arc;

// ============================================================================
// Credential
// ============================================================================

/// A bearer credential presented at connect time.
#[derive(Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Credential {
    /// End-user session token.
    User { token: String },
    /// Privileged token for service-to-service publishing.
    Service {
        #[serde(rename = "serviceToken")]
        service_token: String,
    },
}

impl Credential {
    pub fn user(token: impl Into<String>) -> Self {
        Credential::User {
            token: token.into(),
        }
    }

    pub fn service(token: impl Into<String>) -> Self {
        Credential::Service {
            service_token: token.into(),
        }
    }

    /// The raw bearer value for HTTP `Authorization` headers.
    pub(crate) fn bearer(&self) -> &str {
        match self {
            Credential::User { token } => token,
            Credential::Service { service_token } => service_token,
        }
    }

    pub fn is_service(&self) -> bool {
        matches!(self, Credential::Service { .. })
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::User { .. } => f.write_str("Credential::User(<redacted>)"),
            Credential::Service { .. } => f.write_str("Credential::Service(<redacted>)"),
        }
    }
}

/// Wire form of the handshake auth block: `{"auth": {...}}`.
#[derive(Debug, Clone, Serialize)]
pub struct HandshakeAuth {
    pub auth: Credential,
}

impl From<Credential> for HandshakeAuth {
    fn from(auth: Credential) -> Self {
        Self { auth }
    }
}

// ============================================================================
// CredentialStore
// ============================================================================

/// Shared, refreshable holder of the current credential.
///
/// Cloning shares the same slot.
#[derive(Clone, Default)]
pub struct CredentialStore {
    inner: Arc<RwLock<Option<Credential>>>,
}

impl CredentialStore {
    pub fn new(initial: Option<Credential>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(initial)),
        }
    }

    /// Replace the credential. Takes effect on the next handshake / request.
    pub async fn set(&self, credential: Credential) {
        *self.inner.write().await = Some(credential);
    }

    pub async fn clear(&self) {
        *self.inner.write().await = None;
    }

    /// Snapshot of the most recently known credential.
    pub async fn current(&self) -> Option<Credential> {
        self.inner.read().await.clone()
    }

    pub async fn is_set(&self) -> bool {
        self.inner.read().await.is_some()
    }
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_handshake_wire_format() {
        let hs = HandshakeAuth::from(Credential::user("abc"));
        let json = serde_json::to_value(&hs).unwrap();
        assert_eq!(json, serde_json::json!({"auth": {"token": "abc"}}));
    }

    #[test]
    fn test_service_handshake_wire_format() {
        let hs = HandshakeAuth::from(Credential::service("svc"));
        let json = serde_json::to_value(&hs).unwrap();
        assert_eq!(json, serde_json::json!({"auth": {"serviceToken": "svc"}}));
    }

    #[test]
    fn test_debug_redacts_token() {
        let dbg = format!("{:?}", Credential::user("super-secret"));
        assert!(!dbg.contains("super-secret"));
    }

    #[test]
    fn test_store_refresh_replaces_value() {
        tokio_test::block_on(async {
            let store = CredentialStore::new(Some(Credential::user("old")));
            let shared = store.clone();
            shared.set(Credential::user("new")).await;
            assert_eq!(store.current().await, Some(Credential::user("new")));
            store.clear().await;
            assert!(!shared.is_set().await);
        });
    }
}
