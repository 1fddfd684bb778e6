//! Topic naming — canonical topic strings for subscribable resources.
//!
//! `"<resource>"` for a global resource, `"<resource>:<instance>"` for a
//! scoped one (`"auctions"`, `"auction:42"`, `"chat"`).

use crate::shared::AuctionId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of subscribable resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// The global auction house stream (created / ended / all bids).
    AuctionHouse,
    /// One specific auction.
    Auction,
    /// Chat, global or per room.
    Chat,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceKind::AuctionHouse => "auctions",
            ResourceKind::Auction => "auction",
            ResourceKind::Chat => "chat",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "auctions" => Some(ResourceKind::AuctionHouse),
            "auction" => Some(ResourceKind::Auction),
            "chat" => Some(ResourceKind::Chat),
            _ => None,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical topic string used both on the wire and for local filtering.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Topic(String);

impl Topic {
    /// Build the canonical topic for a resource and optional instance id.
    pub fn new(resource: ResourceKind, instance: Option<&str>) -> Self {
        match instance {
            Some(id) => Topic(format!("{}:{}", resource.as_str(), id)),
            None => Topic(resource.as_str().to_string()),
        }
    }

    pub fn auction_house() -> Self {
        Self::new(ResourceKind::AuctionHouse, None)
    }

    pub fn auction(id: &AuctionId) -> Self {
        Self::new(ResourceKind::Auction, Some(id.as_str()))
    }

    pub fn chat(room: Option<&str>) -> Self {
        Self::new(ResourceKind::Chat, room)
    }

    /// Wrap a raw topic string as received from the server.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Topic(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The resource part, if it is one this client knows.
    pub fn resource(&self) -> Option<ResourceKind> {
        let head = self.0.split_once(':').map_or(self.0.as_str(), |(head, _)| head);
        ResourceKind::parse(head)
    }

    /// The instance part of a scoped topic.
    pub fn instance(&self) -> Option<&str> {
        self.0.split_once(':').map(|(_, id)| id)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
