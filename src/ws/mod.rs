//! WebSocket layer — wire protocol, typed events, topics, subscriptions,
//! connection lifecycle.
//!
//! The transport lives in `native.rs` (`ws-native` feature, `tokio-tungstenite`).
//! Everything else here is transport-agnostic and always compiled.

pub mod connection;
pub mod subscriptions;
pub mod topic;

#[cfg(feature = "ws-native")]
pub mod native;

use crate::auth::HandshakeAuth;
use crate::domain::auction::wire::{AuctionCreatedEvent, AuctionEndedEvent, BidPlacedEvent};
use crate::domain::chat::wire::ChatMessageEvent;
use crate::shared::AuctionId;
use serde::{Deserialize, Serialize};

pub use connection::{ConnectionLifecycle, DisconnectReason, ReconnectDecision, ReconnectPolicy};
pub use subscriptions::{Handler, SubscriptionHandle, SubscriptionId, SubscriptionRegistry};
pub use topic::{ResourceKind, Topic};

// ─── Outbound messages ───────────────────────────────────────────────────────

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MessageOut {
    /// Handshake credential, first frame after the upgrade.
    Auth(HandshakeAuth),
    Subscribe { topic: Topic },
    Unsubscribe { topic: Topic },
    Publish { topic: Topic, event: OutboundEvent },
    Ping,
}

impl MessageOut {
    pub fn subscribe(topic: Topic) -> Self {
        MessageOut::Subscribe { topic }
    }

    pub fn unsubscribe(topic: Topic) -> Self {
        MessageOut::Unsubscribe { topic }
    }

    pub fn ping() -> Self {
        MessageOut::Ping
    }

    /// Publish a domain event on a topic (service credential required server-side).
    pub fn publish(topic: Topic, event: &DomainEvent) -> Result<Self, serde_json::Error> {
        Ok(MessageOut::Publish {
            topic,
            event: event.to_outbound()?,
        })
    }
}

impl std::fmt::Display for MessageOut {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageOut::Auth(_) => f.write_str("auth"),
            MessageOut::Subscribe { topic } => write!(f, "subscribe {}", topic),
            MessageOut::Unsubscribe { topic } => write!(f, "unsubscribe {}", topic),
            MessageOut::Publish { topic, event } => write!(f, "publish {} {}", topic, event.kind),
            MessageOut::Ping => f.write_str("ping"),
        }
    }
}

/// `{type, data}` block of a publish frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: serde_json::Value,
}

// ─── Inbound messages ────────────────────────────────────────────────────────

/// Inbound frame from the server, tagged by `"type"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
pub enum MessageIn {
    /// Handshake accepted.
    #[serde(rename = "connect")]
    Connect,
    /// Handshake rejected.
    #[serde(rename = "connect_error")]
    ConnectError { message: String },
    #[serde(rename = "auction:bid-placed")]
    BidPlaced { topic: Topic, data: BidPlacedEvent },
    #[serde(rename = "auction:created")]
    AuctionCreated { topic: Topic, data: AuctionCreatedEvent },
    #[serde(rename = "auction:ended")]
    AuctionEnded { topic: Topic, data: AuctionEndedEvent },
    #[serde(rename = "chat:message")]
    ChatMessage { topic: Topic, data: ChatMessageEvent },
    #[serde(rename = "subscribed")]
    Subscribed { topic: Topic },
    #[serde(rename = "unsubscribed")]
    Unsubscribed { topic: Topic },
    /// Server is about to close the connection.
    #[serde(rename = "disconnect")]
    Disconnect { reason: String },
    #[serde(rename = "error")]
    Error {
        message: String,
        #[serde(default)]
        topic: Option<Topic>,
    },
    #[serde(rename = "pong")]
    Pong,
}

impl MessageIn {
    /// The domain event carried by this frame, if any.
    pub fn into_server_event(self) -> Option<ServerEvent> {
        let (topic, event) = match self {
            MessageIn::BidPlaced { topic, data } => (topic, DomainEvent::BidPlaced(data)),
            MessageIn::AuctionCreated { topic, data } => (topic, DomainEvent::AuctionCreated(data)),
            MessageIn::AuctionEnded { topic, data } => (topic, DomainEvent::AuctionEnded(data)),
            MessageIn::ChatMessage { topic, data } => (topic, DomainEvent::ChatMessage(data)),
            _ => return None,
        };
        Some(ServerEvent { topic, event })
    }
}

// ─── Typed domain events ─────────────────────────────────────────────────────

/// What happened within a topic's stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventKind {
    BidPlaced,
    AuctionCreated,
    AuctionEnded,
    ChatMessage,
}

impl EventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::BidPlaced => "auction:bid-placed",
            EventKind::AuctionCreated => "auction:created",
            EventKind::AuctionEnded => "auction:ended",
            EventKind::ChatMessage => "chat:message",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of server-pushed domain events.
#[derive(Debug, Clone, PartialEq)]
pub enum DomainEvent {
    BidPlaced(BidPlacedEvent),
    AuctionCreated(AuctionCreatedEvent),
    AuctionEnded(AuctionEndedEvent),
    ChatMessage(ChatMessageEvent),
}

impl DomainEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DomainEvent::BidPlaced(_) => EventKind::BidPlaced,
            DomainEvent::AuctionCreated(_) => EventKind::AuctionCreated,
            DomainEvent::AuctionEnded(_) => EventKind::AuctionEnded,
            DomainEvent::ChatMessage(_) => EventKind::ChatMessage,
        }
    }

    pub fn auction_id(&self) -> Option<&AuctionId> {
        match self {
            DomainEvent::BidPlaced(e) => Some(&e.auction_id),
            DomainEvent::AuctionCreated(e) => Some(&e.auction_id),
            DomainEvent::AuctionEnded(e) => Some(&e.auction_id),
            DomainEvent::ChatMessage(_) => None,
        }
    }

    pub fn to_outbound(&self) -> Result<OutboundEvent, serde_json::Error> {
        let data = match self {
            DomainEvent::BidPlaced(e) => serde_json::to_value(e)?,
            DomainEvent::AuctionCreated(e) => serde_json::to_value(e)?,
            DomainEvent::AuctionEnded(e) => serde_json::to_value(e)?,
            DomainEvent::ChatMessage(e) => serde_json::to_value(e)?,
        };
        Ok(OutboundEvent {
            kind: self.kind().as_str().to_string(),
            data,
        })
    }
}

/// A domain event together with the topic it arrived on.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerEvent {
    pub topic: Topic,
    pub event: DomainEvent,
}

impl ServerEvent {
    pub fn kind(&self) -> EventKind {
        self.event.kind()
    }
}

// ─── Events to consumers ─────────────────────────────────────────────────────

/// High-level events emitted by the WS client to its owner.
#[derive(Debug, Clone)]
pub enum WsEvent {
    /// Handshake acknowledged; subscriptions have been re-issued.
    Connected,
    /// Transport lost. Diagnostic only.
    Disconnected { reason: DisconnectReason },
    /// A parsed message from the server.
    Message(MessageIn),
    /// A connect failure or undecodable frame.
    Error(String),
    /// Retry budget exhausted; the client stays disconnected.
    MaxReconnectReached,
}

/// What a view's feed delivers to its reconciler.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedItem {
    Event(ServerEvent),
    /// A fresh connection was established; missed events are not replayed,
    /// so the view must re-fetch what it displays.
    Resync,
}

// ─── Connection state ────────────────────────────────────────────────────────

/// Connection lifecycle state, owned by the connection manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectionState {
    Disconnected = 0,
    Connecting = 1,
    Connected = 2,
    Reconnecting = 3,
}

impl From<u8> for ConnectionState {
    fn from(v: u8) -> Self {
        match v {
            1 => ConnectionState::Connecting,
            2 => ConnectionState::Connected,
            3 => ConnectionState::Reconnecting,
            _ => ConnectionState::Disconnected,
        }
    }
}

// ─── Config ──────────────────────────────────────────────────────────────────

/// Configuration for the WS client.
#[derive(Debug, Clone)]
pub struct WsConfig {
    pub url: String,
    pub reconnect: bool,
    pub base_reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub backoff_factor: f64,
    pub max_reconnect_attempts: u32,
    pub handshake_timeout_ms: u64,
    pub ping_interval_ms: u64,
    pub pong_timeout_ms: u64,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            url: crate::network::DEFAULT_WS_URL.to_string(),
            reconnect: true,
            base_reconnect_delay_ms: 1000,
            max_reconnect_delay_ms: 30_000,
            backoff_factor: 1.5,
            max_reconnect_attempts: 10,
            handshake_timeout_ms: 30_000,
            ping_interval_ms: 25_000,
            pong_timeout_ms: 20_000,
        }
    }
}

impl WsConfig {
    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            enabled: self.reconnect,
            base_delay_ms: self.base_reconnect_delay_ms,
            max_delay_ms: self.max_reconnect_delay_ms,
            factor: self.backoff_factor,
            max_attempts: self.max_reconnect_attempts,
        }
    }
}
