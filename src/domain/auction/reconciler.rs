//! View reconciler — one per UI consumer.
//!
//! Holds an [`AuctionViews`] cache, applies the local user's bids
//! optimistically and merges server events into the same cache.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;

use super::wire::CreateAuctionRequest;
use super::{rules, AuctionStatus, AuctionView, AuctionViews, Bid, MergeOutcome, MyBid};
use crate::error::{BidError, SdkError};
use crate::shared::{AuctionId, UserId};
use crate::ws::{DomainEvent, EventKind, FeedItem, Topic};

/// REST operations a reconciler needs.
#[allow(async_fn_in_trait)]
pub trait AuctionApi {
    async fn fetch_active_auctions(&self) -> Result<Vec<AuctionView>, SdkError>;
    async fn fetch_auction(&self, id: &AuctionId) -> Result<AuctionView, SdkError>;
    async fn fetch_my_bids(&self) -> Result<Vec<MyBid>, SdkError>;
    async fn place_bid(&self, id: &AuctionId, amount: Decimal) -> Result<AuctionView, SdkError>;
    async fn create_auction(&self, request: &CreateAuctionRequest) -> Result<AuctionView, SdkError>;
}

impl<T: AuctionApi> AuctionApi for &T {
    async fn fetch_active_auctions(&self) -> Result<Vec<AuctionView>, SdkError> {
        (**self).fetch_active_auctions().await
    }

    async fn fetch_auction(&self, id: &AuctionId) -> Result<AuctionView, SdkError> {
        (**self).fetch_auction(id).await
    }

    async fn fetch_my_bids(&self) -> Result<Vec<MyBid>, SdkError> {
        (**self).fetch_my_bids().await
    }

    async fn place_bid(&self, id: &AuctionId, amount: Decimal) -> Result<AuctionView, SdkError> {
        (**self).place_bid(id, amount).await
    }

    async fn create_auction(&self, request: &CreateAuctionRequest) -> Result<AuctionView, SdkError> {
        (**self).create_auction(request).await
    }
}

/// Feed interests of a view listing the whole auction house.
pub fn house_interests() -> Vec<(Topic, EventKind)> {
    let topic = Topic::auction_house();
    vec![
        (topic.clone(), EventKind::BidPlaced),
        (topic.clone(), EventKind::AuctionCreated),
        (topic, EventKind::AuctionEnded),
    ]
}

/// Feed interests of a view showing one auction.
pub fn auction_interests(id: &AuctionId) -> Vec<(Topic, EventKind)> {
    let topic = Topic::auction(id);
    vec![
        (topic.clone(), EventKind::BidPlaced),
        (topic, EventKind::AuctionEnded),
    ]
}

/// A bid applied locally but not yet confirmed by the server.
#[derive(Debug, Clone, PartialEq)]
pub struct StagedBid {
    pub auction_id: AuctionId,
    pub bidder_id: UserId,
    pub amount: Decimal,
    /// The auction as it looks with the bid applied.
    pub view: AuctionView,
}

/// Cache owner for one view. Instances share nothing.
pub struct Reconciler<A> {
    api: A,
    views: AuctionViews,
    pinned: HashSet<AuctionId>,
    actor: Option<UserId>,
    label: String,
}

impl<A: AuctionApi> Reconciler<A> {
    pub fn new(api: A, label: impl Into<String>) -> Self {
        Self {
            api,
            views: AuctionViews::new(),
            pinned: HashSet::new(),
            actor: None,
            label: label.into(),
        }
    }

    /// Set the acting user for optimistic bids.
    pub fn with_actor(mut self, actor: UserId) -> Self {
        self.actor = Some(actor);
        self
    }

    pub fn set_actor(&mut self, actor: Option<UserId>) {
        self.actor = actor;
    }

    pub fn actor(&self) -> Option<&UserId> {
        self.actor.as_ref()
    }

    pub fn views(&self) -> &AuctionViews {
        &self.views
    }

    pub fn get(&self, id: &AuctionId) -> Option<&AuctionView> {
        self.views.get(id)
    }

    /// Owned copy of the current collection.
    pub fn snapshot(&self) -> Vec<AuctionView> {
        self.views.snapshot()
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    /// Keep `id` on `auction ended`, marked as ended, instead of dropping it.
    pub fn pin(&mut self, id: AuctionId) {
        self.pinned.insert(id);
    }

    pub fn unpin(&mut self, id: &AuctionId) {
        self.pinned.remove(id);
    }

    // ── Loading ──────────────────────────────────────────────────────────

    /// Fetch every active auction and replace the cache.
    ///
    /// Pinned auctions missing from the response stay as they are; optimistic
    /// bids still in flight are carried over.
    pub async fn resync(&mut self) -> Result<(), SdkError> {
        let fetched = self.api.fetch_active_auctions().await?;
        tracing::debug!(view = %self.label, count = fetched.len(), "resync");
        self.views.replace_all(fetched, &self.pinned);
        for id in self.pinned.clone() {
            if !self.views.contains(&id) {
                self.backfill(&id).await;
            }
        }
        Ok(())
    }

    /// Fetch a single auction into the cache (detail pages).
    pub async fn load(&mut self, id: &AuctionId) -> Result<&AuctionView, SdkError> {
        let view = self.api.fetch_auction(id).await?;
        self.views.upsert(view);
        self.views
            .get(id)
            .ok_or_else(|| SdkError::Other(format!("auction {} vanished after load", id)))
    }

    // ── Bids ─────────────────────────────────────────────────────────────

    /// Validate and apply a bid locally. The returned [`StagedBid`] carries
    /// the updated view and is what `commit_bid` sends.
    pub fn stage_bid(&mut self, id: &AuctionId, amount: Decimal) -> Result<StagedBid, BidError> {
        let view = self
            .views
            .get(id)
            .ok_or_else(|| BidError::UnknownAuction(id.to_string()))?;
        rules::check_bid(view, amount, self.actor.as_ref())?;

        let bidder_id = self.actor.clone().ok_or(BidError::NotAuthenticated)?;
        let view = self
            .views
            .push_optimistic(id, bidder_id.clone(), amount, Utc::now())
            .cloned()
            .ok_or_else(|| BidError::UnknownAuction(id.to_string()))?;
        Ok(StagedBid {
            auction_id: id.clone(),
            bidder_id,
            amount,
            view,
        })
    }

    /// Send a staged bid to the server. Rolls the local entry back on failure.
    pub async fn commit_bid(&mut self, staged: &StagedBid) -> Result<AuctionView, BidError> {
        let id = &staged.auction_id;

        match self.api.place_bid(id, staged.amount).await {
            Ok(updated) => {
                self.views.upsert(updated);
                self.views
                    .get(id)
                    .cloned()
                    .ok_or_else(|| BidError::UnknownAuction(id.to_string()))
            }
            Err(e) => {
                let err = BidError::from(e);
                let rolled_back =
                    self.views
                        .rollback_optimistic(id, &staged.bidder_id, staged.amount);
                tracing::warn!(
                    view = %self.label,
                    auction = %id,
                    amount = %staged.amount,
                    rolled_back,
                    error = %err,
                    "bid rejected"
                );
                Err(err)
            }
        }
    }

    /// `stage_bid` followed by `commit_bid`.
    pub async fn place_bid_optimistic(
        &mut self,
        id: &AuctionId,
        amount: Decimal,
    ) -> Result<AuctionView, BidError> {
        let staged = self.stage_bid(id, amount)?;
        self.commit_bid(&staged).await
    }

    pub async fn my_bids(&self) -> Result<Vec<MyBid>, SdkError> {
        self.api.fetch_my_bids().await
    }

    pub async fn create_auction(&mut self, request: &CreateAuctionRequest) -> Result<AuctionView, SdkError> {
        let view = self.api.create_auction(request).await?;
        self.views.upsert(view.clone());
        Ok(view)
    }

    // ── Events ───────────────────────────────────────────────────────────

    /// Route one feed item.
    pub async fn handle(&mut self, item: FeedItem) {
        match item {
            FeedItem::Event(event) => self.apply_event(&event.event).await,
            FeedItem::Resync => {
                if let Err(e) = self.resync().await {
                    tracing::warn!(view = %self.label, error = %e, "resync failed");
                }
            }
        }
    }

    /// Merge one server event into the cache, in arrival order.
    pub async fn apply_event(&mut self, event: &DomainEvent) {
        match event {
            DomainEvent::BidPlaced(e) => {
                let bid = Bid::from(e);
                match self.views.merge_bid(&e.auction_id, bid.clone()) {
                    MergeOutcome::UnknownAuction => {
                        if self.backfill(&e.auction_id).await {
                            self.views.merge_bid(&e.auction_id, bid);
                        }
                    }
                    outcome => tracing::trace!(
                        view = %self.label,
                        auction = %e.auction_id,
                        ?outcome,
                        "bid merged"
                    ),
                }
            }
            DomainEvent::AuctionCreated(e) => {
                self.backfill(&e.auction_id).await;
            }
            DomainEvent::AuctionEnded(e) => {
                if self.pinned.contains(&e.auction_id) {
                    self.views.set_status(&e.auction_id, AuctionStatus::Ended);
                } else {
                    self.views.remove(&e.auction_id);
                }
            }
            DomainEvent::ChatMessage(_) => {}
        }
    }

    /// Fetch one auction into the cache. A failure leaves it absent, and so
    /// does a terminal auction this view has not pinned.
    async fn backfill(&mut self, id: &AuctionId) -> bool {
        match self.api.fetch_auction(id).await {
            Ok(view) if view.status.is_terminal() && !self.pinned.contains(id) => {
                tracing::debug!(view = %self.label, auction = %id, status = %view.status, "backfill skipped");
                false
            }
            Ok(view) => {
                self.views.upsert(view);
                true
            }
            Err(e) => {
                tracing::warn!(view = %self.label, auction = %id, error = %e, "backfill fetch failed");
                false
            }
        }
    }
}
