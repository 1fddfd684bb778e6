//! High-level client — `AuctionClient` with nested sub-client accessors.
//!
//! Each domain with REST endpoints has its own sub-client in
//! `domain/<name>/client.rs`. This module keeps the builder, the shared
//! credential store and the accessor methods.

use crate::auth::{Credential, CredentialStore};
use crate::domain::auction::client::Auctions;
use crate::domain::auction::wire::CreateAuctionRequest;
use crate::domain::auction::{AuctionApi, AuctionView, MyBid, Reconciler};
use crate::error::SdkError;
use crate::http::AuctionHttp;
use crate::shared::AuctionId;
use crate::ws::WsConfig;

use rust_decimal::Decimal;

pub use crate::domain::auction::client::Auctions as AuctionsClient;

/// The primary entry point.
///
/// REST goes through `client.auctions()`. Live updates go through a
/// [`SyncSession`](crate::session::SyncSession) created with `client.session()`;
/// views pair a session feed with a [`Reconciler`] from `client.reconciler()`.
#[derive(Clone)]
pub struct AuctionClient {
    pub(crate) http: AuctionHttp,
    pub(crate) ws_config: WsConfig,
    pub(crate) credentials: CredentialStore,
}

impl AuctionClient {
    pub fn builder() -> AuctionClientBuilder {
        AuctionClientBuilder::default()
    }

    // ── Sub-client accessors ─────────────────────────────────────────────

    pub fn auctions(&self) -> Auctions<'_> {
        Auctions { client: self }
    }

    // ── Credentials ──────────────────────────────────────────────────────

    /// The store shared by REST and every session built from this client.
    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Refresh the credential. Open connections keep running; the next
    /// handshake and every following request use the new one.
    pub async fn set_credential(&self, credential: Credential) {
        self.credentials.set(credential).await;
    }

    pub async fn clear_credential(&self) {
        self.credentials.clear().await;
    }

    // ── Realtime ─────────────────────────────────────────────────────────

    /// Get a WS config for creating a WebSocket connection.
    ///
    /// Sessions are not embedded in `AuctionClient`; their lifetime is
    /// managed at the application layer.
    pub fn ws_config(&self) -> &WsConfig {
        &self.ws_config
    }

    /// Create a new native WS client from the current config.
    #[cfg(feature = "ws-native")]
    pub fn ws_native(&self) -> crate::ws::native::WsClient {
        crate::ws::native::WsClient::new(self.ws_config.clone(), self.credentials.clone())
    }

    /// Create a sync session sharing this client's credentials.
    #[cfg(feature = "ws-native")]
    pub fn session(&self) -> crate::session::SyncSession {
        crate::session::SyncSession::new(self.ws_config.clone(), self.credentials.clone())
    }

    /// A fresh, empty reconciler for one view.
    pub fn reconciler(&self, label: impl Into<String>) -> Reconciler<&Self> {
        Reconciler::new(self, label)
    }
}

impl AuctionApi for AuctionClient {
    async fn fetch_active_auctions(&self) -> Result<Vec<AuctionView>, SdkError> {
        self.auctions().active().await
    }

    async fn fetch_auction(&self, id: &AuctionId) -> Result<AuctionView, SdkError> {
        self.auctions().get(id).await
    }

    async fn fetch_my_bids(&self) -> Result<Vec<MyBid>, SdkError> {
        self.auctions().my_bids().await
    }

    async fn place_bid(&self, id: &AuctionId, amount: Decimal) -> Result<AuctionView, SdkError> {
        self.auctions().place_bid(id, amount).await
    }

    async fn create_auction(&self, request: &CreateAuctionRequest) -> Result<AuctionView, SdkError> {
        self.auctions().create(request).await
    }
}

// ═════════════════════════════════════════════════════════════════════════════
// Builder
// ═════════════════════════════════════════════════════════════════════════════

pub struct AuctionClientBuilder {
    base_url: String,
    ws_config: WsConfig,
    credential: Option<Credential>,
}

impl Default for AuctionClientBuilder {
    fn default() -> Self {
        Self {
            base_url: crate::network::DEFAULT_API_URL.to_string(),
            ws_config: WsConfig::default(),
            credential: None,
        }
    }
}

impl AuctionClientBuilder {
    pub fn base_url(mut self, url: &str) -> Self {
        self.base_url = url.to_string();
        self
    }

    pub fn ws_url(mut self, url: &str) -> Self {
        self.ws_config.url = url.to_string();
        self
    }

    /// Replace the WS config (backoff, timeouts). A URL set through `ws_url`
    /// wins over a default `config.url`.
    pub fn ws_config(mut self, config: WsConfig) -> Self {
        let url = if config.url == crate::network::DEFAULT_WS_URL {
            std::mem::take(&mut self.ws_config.url)
        } else {
            config.url.clone()
        };
        self.ws_config = WsConfig { url, ..config };
        self
    }

    /// Pre-set the credential on construction.
    pub fn credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn build(self) -> Result<AuctionClient, SdkError> {
        let credentials = CredentialStore::new(self.credential);
        Ok(AuctionClient {
            http: AuctionHttp::new(&self.base_url, credentials.clone())?,
            ws_config: self.ws_config,
            credentials,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let client = AuctionClient::builder().build().unwrap();
        assert_eq!(client.http.base_url(), crate::network::DEFAULT_API_URL);
        assert_eq!(client.ws_config().url, crate::network::DEFAULT_WS_URL);
        assert_eq!(client.ws_config().max_reconnect_attempts, 10);
    }

    #[test]
    fn test_builder_ws_url_survives_config() {
        let client = AuctionClient::builder()
            .ws_url("ws://example.test/ws")
            .ws_config(WsConfig {
                handshake_timeout_ms: 5_000,
                ..WsConfig::default()
            })
            .build()
            .unwrap();
        assert_eq!(client.ws_config().url, "ws://example.test/ws");
        assert_eq!(client.ws_config().handshake_timeout_ms, 5_000);
    }

    #[cfg(feature = "ws-native")]
    #[tokio::test]
    async fn test_credential_shared_with_sessions() {
        let client = AuctionClient::builder().build().unwrap();
        assert!(!client.credentials().is_set().await);

        let session = client.session();
        client.set_credential(Credential::user("fresh")).await;
        assert!(session.credentials().is_set().await);
    }
}
