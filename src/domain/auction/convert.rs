//! Conversions from wire types to domain types for auctions.

use super::wire::{AuctionResponse, BidPlacedEvent, BidResponse, MyBidResponse};
use super::{AuctionView, Bid, MyBid};

impl From<BidResponse> for Bid {
    fn from(b: BidResponse) -> Self {
        Bid::confirmed(b.bidder_id, b.amount, b.timestamp)
    }
}

impl From<&BidPlacedEvent> for Bid {
    fn from(e: &BidPlacedEvent) -> Self {
        Bid::confirmed(e.bidder_id.clone(), e.amount, e.timestamp)
    }
}

impl From<AuctionResponse> for AuctionView {
    fn from(a: AuctionResponse) -> Self {
        if let Some(reported) = a.current_price {
            tracing::trace!(auction = %a.id, %reported, "ignoring server current price, recomputing from bids");
        }

        let mut view = Self {
            id: a.id,
            title: a.title,
            seller_id: a.seller_id,
            tile_ids: a.tile_ids,
            auction_type: a.auction_type,
            status: a.status,
            starting_price: a.starting_price,
            current_price: a.starting_price,
            min_increment: a.min_increment,
            start_time: a.start_time,
            end_time: a.end_time,
            bids: a.bids.into_iter().map(Bid::from).collect(),
        };
        view.recompute_price();
        view
    }
}

impl From<MyBidResponse> for MyBid {
    fn from(b: MyBidResponse) -> Self {
        Self {
            auction_id: b.auction_id,
            auction_title: b.auction_title,
            amount: b.amount,
            timestamp: b.timestamp,
            is_winning: b.is_winning,
        }
    }
}
