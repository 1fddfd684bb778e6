//! Wire types for auction responses (REST) and auction events (WS).

use crate::domain::auction::{AuctionStatus, AuctionType};
use crate::shared::{AuctionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ─── REST ────────────────────────────────────────────────────────────────────

/// Raw bid as embedded in an auction response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidResponse {
    pub bidder_id: UserId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// REST response for a single auction.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionResponse {
    pub id: AuctionId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seller_id: Option<UserId>,
    #[serde(default)]
    pub tile_ids: Vec<String>,
    #[serde(rename = "type", default)]
    pub auction_type: AuctionType,
    pub status: AuctionStatus,
    pub starting_price: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_price: Option<Decimal>,
    pub min_increment: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_time: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub bids: Vec<BidResponse>,
}

/// REST response for the active auctions list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionsResponse {
    pub auctions: Vec<AuctionResponse>,
}

/// REST response for one of the current user's bids.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MyBidResponse {
    pub auction_id: AuctionId,
    #[serde(default)]
    pub auction_title: Option<String>,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub is_winning: bool,
}

/// REST response for the "my bids" list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyBidsResponse {
    pub bids: Vec<MyBidResponse>,
}

/// `POST /api/auctions/{id}/bids` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceBidRequest {
    pub amount: Decimal,
}

/// `POST /api/auctions` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CreateAuctionRequest {
    pub title: String,
    pub tile_ids: Vec<String>,
    #[serde(rename = "type")]
    pub auction_type: AuctionType,
    pub starting_price: Decimal,
    pub min_increment: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

// ─── WS events ───────────────────────────────────────────────────────────────

/// `auction:bid-placed` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidPlacedEvent {
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub amount: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// `auction:created` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionCreatedEvent {
    pub auction_id: AuctionId,
}

/// `auction:ended` payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionEndedEvent {
    pub auction_id: AuctionId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub winner_id: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_price: Option<Decimal>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auction_response_minimal() {
        let json = r#"{
            "id": 42,
            "title": "North ridge",
            "status": "in_progress",
            "startingPrice": "100",
            "minIncrement": "10"
        }"#;
        let resp: AuctionResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.id.as_str(), "42");
        assert_eq!(resp.auction_type, AuctionType::Timed);
        assert!(resp.bids.is_empty());
        assert!(resp.current_price.is_none());
    }

    #[test]
    fn test_bid_placed_event_camel_case() {
        let json = r#"{
            "auctionId": "A1",
            "bidderId": "U1",
            "amount": "110",
            "timestamp": "2026-01-01T00:00:00Z"
        }"#;
        let ev: BidPlacedEvent = serde_json::from_str(json).unwrap();
        assert_eq!(ev.bidder_id.as_str(), "U1");
        assert_eq!(ev.amount, Decimal::from(110));
    }

    #[test]
    fn test_create_auction_request_uses_type_key() {
        let req = CreateAuctionRequest {
            title: "t".into(),
            tile_ids: vec!["3_4".into()],
            auction_type: AuctionType::BuyNow,
            starting_price: Decimal::from(5),
            min_increment: Decimal::from(1),
            start_time: Utc::now(),
            end_time: Utc::now(),
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["type"], "buy_now");
        assert_eq!(value["tileIds"][0], "3_4");
        assert!(value.get("auction_type").is_none());
    }
}
