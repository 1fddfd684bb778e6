//! Pure auction rules shared by every view: highest bidder, minimum bid,
//! bid validity.

use super::{AuctionStatus, AuctionView, Bid};
use crate::error::BidError;
use crate::shared::UserId;
use rust_decimal::Decimal;

/// The winning bid: highest amount, ties go to the earliest timestamp, and a
/// full tie goes to the bid that appears first.
pub fn highest_bid(bids: &[Bid]) -> Option<&Bid> {
    bids.iter().fold(None, |best: Option<&Bid>, bid| match best {
        None => Some(bid),
        Some(b) if bid.amount > b.amount => Some(bid),
        Some(b) if bid.amount == b.amount && bid.timestamp < b.timestamp => Some(bid),
        keep => keep,
    })
}

/// `current_price + min_increment`.
pub fn minimum_valid_bid(view: &AuctionView) -> Decimal {
    view.current_price + view.min_increment
}

/// Check a prospective bid and report the first rule it breaks.
pub fn check_bid(view: &AuctionView, amount: Decimal, actor: Option<&UserId>) -> Result<(), BidError> {
    let actor = actor.ok_or(BidError::NotAuthenticated)?;

    if view.status != AuctionStatus::InProgress {
        return Err(BidError::AuctionNotActive);
    }

    if highest_bid(&view.bids).is_some_and(|b| &b.bidder_id == actor) {
        return Err(BidError::AlreadyHighestBidder);
    }

    let minimum = minimum_valid_bid(view);
    if amount < minimum {
        return Err(BidError::BelowMinimum { amount, minimum });
    }

    Ok(())
}

pub fn is_valid_bid(view: &AuctionView, amount: Decimal, actor: Option<&UserId>) -> bool {
    check_bid(view, amount, actor).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auction::AuctionType;
    use crate::shared::AuctionId;
    use chrono::{TimeZone, Utc};

    fn bid(user: &str, amount: i64, t: i64) -> Bid {
        Bid::confirmed(
            UserId::from(user),
            Decimal::from(amount),
            Utc.timestamp_opt(t, 0).unwrap(),
        )
    }

    fn view(bids: Vec<Bid>) -> AuctionView {
        let mut v = AuctionView {
            id: AuctionId::from("A1"),
            title: "Tile block".into(),
            seller_id: None,
            tile_ids: vec![],
            auction_type: AuctionType::Timed,
            status: AuctionStatus::InProgress,
            starting_price: Decimal::from(100),
            current_price: Decimal::from(100),
            min_increment: Decimal::from(10),
            start_time: None,
            end_time: None,
            bids,
        };
        v.recompute_price();
        v
    }

    #[test]
    fn test_highest_bid_empty() {
        assert!(highest_bid(&[]).is_none());
    }

    #[test]
    fn test_highest_bid_by_amount() {
        let bids = vec![bid("u1", 100, 1), bid("u2", 130, 2), bid("u3", 120, 3)];
        assert_eq!(highest_bid(&bids).unwrap().bidder_id, UserId::from("u2"));
    }

    #[test]
    fn test_highest_bid_tie_goes_to_earliest() {
        let bids = vec![bid("u1", 100, 1), bid("u2", 100, 2)];
        assert_eq!(highest_bid(&bids).unwrap().bidder_id, UserId::from("u1"));

        // order in the slice does not matter, the timestamp does
        let bids = vec![bid("u2", 100, 2), bid("u1", 100, 1)];
        assert_eq!(highest_bid(&bids).unwrap().bidder_id, UserId::from("u1"));
    }

    #[test]
    fn test_highest_bid_full_tie_keeps_first() {
        let bids = vec![bid("u1", 100, 5), bid("u2", 100, 5)];
        assert_eq!(highest_bid(&bids).unwrap().bidder_id, UserId::from("u1"));
    }

    #[test]
    fn test_minimum_valid_bid() {
        let v = view(vec![bid("u1", 150, 1)]);
        assert_eq!(minimum_valid_bid(&v), Decimal::from(160));
        assert_eq!(minimum_valid_bid(&view(vec![])), Decimal::from(110));
    }

    #[test]
    fn test_check_bid_requires_actor() {
        let v = view(vec![]);
        assert_eq!(check_bid(&v, Decimal::from(200), None), Err(BidError::NotAuthenticated));
    }

    #[test]
    fn test_check_bid_requires_in_progress() {
        let mut v = view(vec![]);
        v.status = AuctionStatus::Ended;
        let actor = UserId::from("u1");
        assert_eq!(
            check_bid(&v, Decimal::from(200), Some(&actor)),
            Err(BidError::AuctionNotActive)
        );
    }

    #[test]
    fn test_check_bid_rejects_current_leader() {
        let v = view(vec![bid("u1", 120, 1)]);
        let actor = UserId::from("u1");
        assert_eq!(
            check_bid(&v, Decimal::from(200), Some(&actor)),
            Err(BidError::AlreadyHighestBidder)
        );
    }

    #[test]
    fn test_check_bid_minimum_is_inclusive() {
        let v = view(vec![]);
        let actor = UserId::from("u1");
        assert!(is_valid_bid(&v, Decimal::from(110), Some(&actor)));
        assert_eq!(
            check_bid(&v, Decimal::from(109), Some(&actor)),
            Err(BidError::BelowMinimum {
                amount: Decimal::from(109),
                minimum: Decimal::from(110),
            })
        );
    }
}
