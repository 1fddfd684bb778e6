//! # auction-sync
//!
//! Realtime event synchronization for the auction house: one persistent
//! connection, a subscription registry that survives reconnects, and
//! per-view caches that merge optimistic bids with server events.
//!
//! ## Architecture
//!
//! The SDK is organized in layers:
//!
//! 1. **Core** — Newtypes, domain models, pure auction rules, view caches
//! 2. **Auth** — Credentials and the shared, refreshable credential store
//! 3. **HTTP API** — `AuctionHttp` with per-endpoint retry policies
//! 4. **WebSocket** — Wire protocol, topics, subscription registry, and the
//!    `tokio-tungstenite` connection manager
//! 5. **High-Level Client** — `AuctionClient` with sub-clients, `SyncSession`
//!    with view feeds
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use auction_sync::prelude::*;
//!
//! let client = AuctionClient::builder()
//!     .base_url("http://localhost:3000")
//!     .ws_url("ws://localhost:3000/ws")
//!     .credential(Credential::user(token))
//!     .build()?;
//!
//! let mut session = client.session();
//! let mut feed = session.feed(&house_interests());
//! session.connect().await?;
//!
//! let mut sidebar = client.reconciler("sidebar").with_actor(me);
//! sidebar.resync().await?;
//!
//! loop {
//!     session.pump().await;
//!     while let Some(item) = feed.try_next() {
//!         sidebar.handle(item).await;
//!     }
//! }
//! ```

// ── Layer 1: Core ────────────────────────────────────────────────────────────

/// Shared newtypes used across all domains.
pub mod shared;

/// Domain modules (vertical slices): types, wire types, conversions, state.
pub mod domain;

/// Unified SDK error types.
pub mod error;

/// Network URL constants.
pub mod network;

// ── Layer 2: Auth ────────────────────────────────────────────────────────────

/// Credentials and the shared credential store.
pub mod auth;

// ── Layer 3: HTTP API ────────────────────────────────────────────────────────

/// HTTP client with retry policies.
#[cfg(feature = "http")]
pub mod http;

// ── Layer 4: WebSocket ───────────────────────────────────────────────────────

/// WebSocket: messages, topics, subscriptions, connection lifecycle.
pub mod ws;

// ── Layer 5: High-Level Client ───────────────────────────────────────────────

/// `AuctionClient` — the primary entry point.
#[cfg(feature = "http")]
pub mod client;

/// `SyncSession` — one connection, one registry, many view feeds.
#[cfg(feature = "ws-native")]
pub mod session;

// ── Prelude ──────────────────────────────────────────────────────────────────

pub mod prelude {
    // Shared newtypes
    pub use crate::shared::{AuctionId, UserId};

    // Domain types — auction
    pub use crate::domain::auction::rules::{highest_bid, is_valid_bid, minimum_valid_bid};
    pub use crate::domain::auction::wire::CreateAuctionRequest;
    pub use crate::domain::auction::{
        auction_interests, house_interests, AuctionApi, AuctionStatus, AuctionType, AuctionView,
        AuctionViews, Bid, MergeOutcome, MyBid, Reconciler, StagedBid,
    };

    // Domain types — chat
    pub use crate::domain::chat::{ChatLog, ChatMessage};

    // Errors
    pub use crate::error::{
        BidError, ConnectError, HandlerError, HttpError, SdkError, SubscribeError, WsError,
    };

    // Network
    pub use crate::network::{DEFAULT_API_URL, DEFAULT_WS_URL};

    // Auth
    pub use crate::auth::{Credential, CredentialStore};

    // HTTP client + sub-clients
    #[cfg(feature = "http")]
    pub use crate::client::{AuctionClient, AuctionClientBuilder, AuctionsClient};
    #[cfg(feature = "http")]
    pub use crate::http::retry::{RetryConfig, RetryPolicy};

    // WebSocket types
    pub use crate::ws::{
        ConnectionState, DisconnectReason, DomainEvent, EventKind, FeedItem, MessageIn,
        MessageOut, ResourceKind, ServerEvent, SubscriptionHandle, SubscriptionRegistry, Topic,
        WsConfig, WsEvent,
    };

    // Session
    #[cfg(feature = "ws-native")]
    pub use crate::session::{SyncSession, ViewFeed};
    #[cfg(feature = "ws-native")]
    pub use crate::ws::native::WsClient;
}
