//! Auctions sub-client — REST reads and writes, converted to domain types.

use crate::client::AuctionClient;
use crate::domain::auction::wire::CreateAuctionRequest;
use crate::domain::auction::{AuctionView, MyBid};
use crate::error::SdkError;
use crate::shared::AuctionId;
use rust_decimal::Decimal;

/// Sub-client for auction operations.
pub struct Auctions<'a> {
    pub(crate) client: &'a AuctionClient,
}

impl<'a> Auctions<'a> {
    /// Every auction currently open for bidding.
    pub async fn active(&self) -> Result<Vec<AuctionView>, SdkError> {
        let resp = self.client.http.get_active_auctions().await?;
        Ok(resp.auctions.into_iter().map(AuctionView::from).collect())
    }

    pub async fn get(&self, id: &AuctionId) -> Result<AuctionView, SdkError> {
        let resp = self.client.http.get_auction(id).await?;
        Ok(resp.into())
    }

    /// Place a bid without any local bookkeeping.
    ///
    /// Views should go through a `Reconciler`, which applies the bid
    /// optimistically and rolls it back on failure.
    pub async fn place_bid(&self, id: &AuctionId, amount: Decimal) -> Result<AuctionView, SdkError> {
        let resp = self.client.http.place_bid(id, amount).await?;
        Ok(resp.into())
    }

    /// The current user's bids.
    pub async fn my_bids(&self) -> Result<Vec<MyBid>, SdkError> {
        let resp = self.client.http.get_my_bids().await?;
        Ok(resp.bids.into_iter().map(MyBid::from).collect())
    }

    pub async fn create(&self, request: &CreateAuctionRequest) -> Result<AuctionView, SdkError> {
        if request.end_time <= request.start_time {
            return Err(SdkError::Validation(
                "auction must end after it starts".to_string(),
            ));
        }
        if request.tile_ids.is_empty() {
            return Err(SdkError::Validation(
                "auction needs at least one tile".to_string(),
            ));
        }
        let resp = self.client.http.create_auction(request).await?;
        Ok(resp.into())
    }
}
