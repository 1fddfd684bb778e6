//! Auction view cache — consumer-owned, SDK-provided merge logic.

use super::{AuctionStatus, AuctionView, Bid};
use crate::shared::{AuctionId, UserId};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashSet};

/// Result of merging a server bid into the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// The auction is not in the cache.
    UnknownAuction,
    /// A new bid entry was appended.
    Appended,
    /// A matching optimistic entry was confirmed in place.
    Confirmed,
    /// The bid was already present and confirmed; nothing changed.
    Duplicate,
}

/// The collection of auctions one view displays.
///
/// Each UI consumer owns its own instance. Nothing is shared between
/// instances; they converge because they apply the same event stream.
#[derive(Debug, Clone, Default)]
pub struct AuctionViews {
    auctions: BTreeMap<AuctionId, AuctionView>,
}

impl AuctionViews {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &AuctionId) -> Option<&AuctionView> {
        self.auctions.get(id)
    }

    pub fn contains(&self, id: &AuctionId) -> bool {
        self.auctions.contains_key(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AuctionView> {
        self.auctions.values()
    }

    /// Owned copy of every cached auction.
    pub fn snapshot(&self) -> Vec<AuctionView> {
        self.auctions.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.auctions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.auctions.is_empty()
    }

    pub fn clear(&mut self) {
        self.auctions.clear();
    }

    /// Insert or replace an auction from a fresh fetch.
    ///
    /// Optimistic bids still in flight for that auction are carried over
    /// unless the fetched history already contains them.
    pub fn upsert(&mut self, mut view: AuctionView) {
        if let Some(previous) = self.auctions.remove(&view.id) {
            carry_over_optimistic(&previous, &mut view);
        }
        view.recompute_price();
        self.auctions.insert(view.id.clone(), view);
    }

    /// Replace the whole collection after a full re-fetch.
    ///
    /// Auctions in `retain` that are missing from `fetched` are kept as they
    /// are (e.g. a detail page still showing an auction that just ended).
    pub fn replace_all(&mut self, fetched: Vec<AuctionView>, retain: &HashSet<AuctionId>) {
        let mut previous = std::mem::take(&mut self.auctions);

        for mut view in fetched {
            if let Some(old) = previous.remove(&view.id) {
                carry_over_optimistic(&old, &mut view);
            }
            view.recompute_price();
            self.auctions.insert(view.id.clone(), view);
        }

        for (id, view) in previous {
            if retain.contains(&id) {
                self.auctions.insert(id, view);
            }
        }
    }

    /// Append an optimistic bid and return the updated view.
    pub fn push_optimistic(
        &mut self,
        id: &AuctionId,
        bidder_id: UserId,
        amount: Decimal,
        at: DateTime<Utc>,
    ) -> Option<&AuctionView> {
        let view = self.auctions.get_mut(id)?;
        view.bids.push(Bid::optimistic(bidder_id, amount, at));
        view.recompute_price();
        Some(&*view)
    }

    /// Remove an optimistic bid that the server rejected.
    ///
    /// Confirmed entries are never removed. Returns whether an entry was removed.
    pub fn rollback_optimistic(&mut self, id: &AuctionId, bidder_id: &UserId, amount: Decimal) -> bool {
        let Some(view) = self.auctions.get_mut(id) else {
            return false;
        };
        let Some(pos) = view
            .bids
            .iter()
            .position(|b| b.is_optimistic && b.same_bid(bidder_id, amount))
        else {
            return false;
        };
        view.bids.remove(pos);
        view.recompute_price();
        true
    }

    /// Merge an authoritative bid, keyed by `(bidder_id, amount)`.
    pub fn merge_bid(&mut self, id: &AuctionId, bid: Bid) -> MergeOutcome {
        let Some(view) = self.auctions.get_mut(id) else {
            return MergeOutcome::UnknownAuction;
        };

        let found = view
            .bids
            .iter()
            .position(|b| b.same_bid(&bid.bidder_id, bid.amount));

        let outcome = match found {
            Some(pos) if view.bids[pos].is_optimistic => {
                let existing = &mut view.bids[pos];
                existing.is_optimistic = false;
                existing.timestamp = bid.timestamp;
                MergeOutcome::Confirmed
            }
            Some(_) => MergeOutcome::Duplicate,
            None => {
                view.bids.push(Bid {
                    is_optimistic: false,
                    ..bid
                });
                MergeOutcome::Appended
            }
        };

        view.recompute_price();
        outcome
    }

    pub fn set_status(&mut self, id: &AuctionId, status: AuctionStatus) -> bool {
        match self.auctions.get_mut(id) {
            Some(view) => {
                view.status = status;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, id: &AuctionId) -> Option<AuctionView> {
        self.auctions.remove(id)
    }
}

fn carry_over_optimistic(previous: &AuctionView, fresh: &mut AuctionView) {
    for bid in previous.bids.iter().filter(|b| b.is_optimistic) {
        if !fresh.bids.iter().any(|b| b.same_bid(&bid.bidder_id, bid.amount)) {
            fresh.bids.push(bid.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auction::AuctionType;
    use chrono::TimeZone;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn auction(id: &str, starting: i64) -> AuctionView {
        AuctionView {
            id: AuctionId::from(id),
            title: format!("auction {id}"),
            seller_id: None,
            tile_ids: vec![],
            auction_type: AuctionType::Timed,
            status: AuctionStatus::InProgress,
            starting_price: Decimal::from(starting),
            current_price: Decimal::from(starting),
            min_increment: Decimal::from(10),
            start_time: None,
            end_time: None,
            bids: vec![],
        }
    }

    fn server_bid(user: &str, amount: i64, t: i64) -> Bid {
        Bid::confirmed(UserId::from(user), Decimal::from(amount), at(t))
    }

    #[test]
    fn test_merge_unknown_auction() {
        let mut views = AuctionViews::new();
        let outcome = views.merge_bid(&AuctionId::from("nope"), server_bid("u1", 10, 1));
        assert_eq!(outcome, MergeOutcome::UnknownAuction);
    }

    #[test]
    fn test_increasing_bids_converge() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        let id = AuctionId::from("A");

        for (i, amount) in [110, 125, 150, 151].into_iter().enumerate() {
            let user = if i % 2 == 0 { "u1" } else { "u2" };
            assert_eq!(
                views.merge_bid(&id, server_bid(user, amount, i as i64)),
                MergeOutcome::Appended
            );
        }

        let view = views.get(&id).unwrap();
        assert_eq!(view.current_price, Decimal::from(151));
        assert_eq!(view.bids.len(), 4);
    }

    #[test]
    fn test_server_echo_confirms_optimistic_in_place() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        let id = AuctionId::from("A");

        let view = views
            .push_optimistic(&id, UserId::from("u1"), Decimal::from(110), at(1))
            .unwrap();
        assert_eq!(view.current_price, Decimal::from(110));
        assert!(view.bids[0].is_optimistic);

        let outcome = views.merge_bid(&id, server_bid("u1", 110, 2));
        assert_eq!(outcome, MergeOutcome::Confirmed);

        let view = views.get(&id).unwrap();
        assert_eq!(view.bids.len(), 1);
        assert!(!view.bids[0].is_optimistic);
        assert_eq!(view.bids[0].timestamp, at(2));
        assert_eq!(view.current_price, Decimal::from(110));
    }

    #[test]
    fn test_repeated_server_event_is_duplicate() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        let id = AuctionId::from("A");

        views.merge_bid(&id, server_bid("u1", 110, 1));
        assert_eq!(views.merge_bid(&id, server_bid("u1", 110, 1)), MergeOutcome::Duplicate);
        assert_eq!(views.get(&id).unwrap().bids.len(), 1);
    }

    #[test]
    fn test_rollback_restores_pre_bid_state() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        let id = AuctionId::from("A");
        views.merge_bid(&id, server_bid("u2", 120, 1));
        let before = views.get(&id).unwrap().clone();

        views.push_optimistic(&id, UserId::from("u1"), Decimal::from(130), at(2));
        assert!(views.rollback_optimistic(&id, &UserId::from("u1"), Decimal::from(130)));

        assert_eq!(views.get(&id).unwrap(), &before);
    }

    #[test]
    fn test_rollback_never_removes_confirmed_bid() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        let id = AuctionId::from("A");
        views.push_optimistic(&id, UserId::from("u1"), Decimal::from(110), at(1));
        views.merge_bid(&id, server_bid("u1", 110, 2));

        assert!(!views.rollback_optimistic(&id, &UserId::from("u1"), Decimal::from(110)));
        assert_eq!(views.get(&id).unwrap().bids.len(), 1);
    }

    #[test]
    fn test_upsert_keeps_in_flight_optimistic_bids() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        let id = AuctionId::from("A");
        views.push_optimistic(&id, UserId::from("u1"), Decimal::from(110), at(1));

        views.upsert(auction("A", 100));
        let view = views.get(&id).unwrap();
        assert_eq!(view.bids.len(), 1);
        assert_eq!(view.current_price, Decimal::from(110));
    }

    #[test]
    fn test_replace_all_drops_missing_unless_retained() {
        let mut views = AuctionViews::new();
        views.upsert(auction("A", 100));
        views.upsert(auction("B", 100));
        views.upsert(auction("C", 100));

        let retain: HashSet<_> = [AuctionId::from("B")].into_iter().collect();
        views.replace_all(vec![auction("C", 100), auction("D", 50)], &retain);

        let ids: Vec<_> = views.iter().map(|v| v.id.as_str().to_string()).collect();
        assert_eq!(ids, ["B", "C", "D"]);
    }
}
