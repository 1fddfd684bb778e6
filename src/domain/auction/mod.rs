//! Auction domain — auction views, bids, lifecycle status.

#[cfg(feature = "http")]
pub mod client;
mod convert;
pub mod reconciler;
pub mod rules;
pub mod state;
pub mod wire;

use crate::shared::{AuctionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub use reconciler::{auction_interests, house_interests, AuctionApi, Reconciler, StagedBid};
pub use state::{AuctionViews, MergeOutcome};

// ─── Status ──────────────────────────────────────────────────────────────────

/// Auction lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionStatus {
    Scheduled,
    InProgress,
    Ended,
    Cancelled,
}

impl AuctionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuctionStatus::Scheduled => "scheduled",
            AuctionStatus::InProgress => "in_progress",
            AuctionStatus::Ended => "ended",
            AuctionStatus::Cancelled => "cancelled",
        }
    }

    /// Ended or cancelled: no further bids are accepted.
    pub fn is_terminal(&self) -> bool {
        matches!(self, AuctionStatus::Ended | AuctionStatus::Cancelled)
    }
}

impl std::fmt::Display for AuctionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How the auction is run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuctionType {
    #[default]
    Timed,
    BuyNow,
}

// ─── Bid ─────────────────────────────────────────────────────────────────────

/// One bid in an auction's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bid {
    pub bidder_id: UserId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    /// Applied locally before the server confirmed it.
    pub is_optimistic: bool,
}

impl Bid {
    /// A confirmed bid as reported by the server.
    pub fn confirmed(bidder_id: UserId, amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            bidder_id,
            amount,
            timestamp,
            is_optimistic: false,
        }
    }

    /// A locally applied, not yet confirmed bid.
    pub fn optimistic(bidder_id: UserId, amount: Decimal, timestamp: DateTime<Utc>) -> Self {
        Self {
            bidder_id,
            amount,
            timestamp,
            is_optimistic: true,
        }
    }

    /// Reconciliation key: the same physical bid has the same bidder and amount.
    pub fn same_bid(&self, bidder_id: &UserId, amount: Decimal) -> bool {
        &self.bidder_id == bidder_id && self.amount == amount
    }
}

// ─── AuctionView ─────────────────────────────────────────────────────────────

/// Locally cached view of one auction.
///
/// `current_price` always equals the highest bid amount, or `starting_price`
/// when there are no bids. Every mutation in [`state`] keeps that true.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionView {
    pub id: AuctionId,
    pub title: String,
    pub seller_id: Option<UserId>,
    pub tile_ids: Vec<String>,
    pub auction_type: AuctionType,
    pub status: AuctionStatus,
    pub starting_price: Decimal,
    pub current_price: Decimal,
    pub min_increment: Decimal,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub bids: Vec<Bid>,
}

impl AuctionView {
    /// Recompute `current_price` from the bid history.
    pub fn recompute_price(&mut self) {
        self.current_price = rules::highest_bid(&self.bids)
            .map(|b| b.amount)
            .unwrap_or(self.starting_price);
    }

    pub fn highest_bid(&self) -> Option<&Bid> {
        rules::highest_bid(&self.bids)
    }

    pub fn minimum_valid_bid(&self) -> Decimal {
        rules::minimum_valid_bid(self)
    }

    pub fn has_optimistic_bids(&self) -> bool {
        self.bids.iter().any(|b| b.is_optimistic)
    }
}

// ─── MyBid ───────────────────────────────────────────────────────────────────

/// One of the current user's bids, as returned by the "my bids" endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MyBid {
    pub auction_id: AuctionId,
    pub auction_title: Option<String>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    pub is_winning: bool,
}
