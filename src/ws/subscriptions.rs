//! Subscription registry — `(topic, event kind, handler)` entries and dispatch.

use std::collections::BTreeSet;
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::HandlerError;
use crate::ws::{EventKind, ServerEvent, Topic};

/// Callback invoked for every matching inbound event.
pub type Handler = Box<dyn FnMut(&ServerEvent) -> Result<(), HandlerError> + Send>;

/// Opaque id of one registered handler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

/// Capability returned by `add`. Removing through it only ever affects the
/// one entry it was issued for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SubscriptionHandle {
    pub id: SubscriptionId,
    pub topic: Topic,
    pub kind: EventKind,
}

struct Entry {
    id: SubscriptionId,
    topic: Topic,
    kind: EventKind,
    handler: Handler,
}

/// In-memory table of subscriptions for one connection.
///
/// Duplicate `(topic, kind)` pairs are legal; each entry fires independently.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: Vec<Entry>,
    next_id: u64,
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add<F>(&mut self, topic: Topic, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: FnMut(&ServerEvent) -> Result<(), HandlerError> + Send + 'static,
    {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        tracing::debug!(topic = %topic, kind = %kind, id = id.0, "subscription added");
        self.entries.push(Entry {
            id,
            topic: topic.clone(),
            kind,
            handler: Box::new(handler),
        });
        SubscriptionHandle { id, topic, kind }
    }

    /// Remove exactly the entry behind `handle`.
    pub fn remove(&mut self, handle: &SubscriptionHandle) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != handle.id);
        before != self.entries.len()
    }

    /// Remove every entry on `topic`, whatever its kind or owner.
    pub fn remove_by_topic(&mut self, topic: &Topic) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| &e.topic != topic);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(topic = %topic, removed, "subscriptions removed by topic");
        }
        removed
    }

    pub fn remove_by_topic_and_kind(&mut self, topic: &Topic, kind: EventKind) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| !(&e.topic == topic && e.kind == kind));
        before - self.entries.len()
    }

    /// Invoke every handler whose `(topic, kind)` matches the event.
    ///
    /// Handler errors and panics are logged and never stop delivery to the
    /// remaining handlers. Returns the number of handlers that succeeded.
    pub fn dispatch(&mut self, event: &ServerEvent) -> usize {
        let kind = event.kind();
        let mut delivered = 0;

        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.kind == kind && e.topic == event.topic)
        {
            let handler = &mut entry.handler;
            let result = catch_unwind(AssertUnwindSafe(|| handler(event)))
                .unwrap_or_else(|payload| Err(HandlerError::Panicked(panic_message(&*payload))));

            match result {
                Ok(()) => delivered += 1,
                Err(e) => tracing::warn!(
                    topic = %entry.topic,
                    kind = %kind,
                    id = entry.id.0,
                    error = %e,
                    "subscription handler failed"
                ),
            }
        }

        delivered
    }

    /// Distinct topics with at least one entry.
    pub fn topics(&self) -> BTreeSet<Topic> {
        self.entries.iter().map(|e| e.topic.clone()).collect()
    }

    pub fn contains_topic(&self, topic: &Topic) -> bool {
        self.entries.iter().any(|e| &e.topic == topic)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl std::fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("entries", &self.entries.len())
            .field("topics", &self.topics())
            .finish()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auction::wire::{AuctionEndedEvent, BidPlacedEvent};
    use crate::shared::{AuctionId, UserId};
    use crate::ws::DomainEvent;
    use chrono::Utc;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn bid_on(topic: &str) -> ServerEvent {
        ServerEvent {
            topic: Topic::from_raw(topic),
            event: DomainEvent::BidPlaced(BidPlacedEvent {
                auction_id: AuctionId::from("1"),
                bidder_id: UserId::from("u1"),
                amount: Decimal::from(110),
                timestamp: Utc::now(),
            }),
        }
    }

    fn ended_on(topic: &str) -> ServerEvent {
        ServerEvent {
            topic: Topic::from_raw(topic),
            event: DomainEvent::AuctionEnded(AuctionEndedEvent {
                auction_id: AuctionId::from("1"),
                winner_id: None,
                final_price: None,
            }),
        }
    }

    fn counter(hits: &Arc<AtomicUsize>) -> impl FnMut(&ServerEvent) -> Result<(), HandlerError> {
        let hits = Arc::clone(hits);
        move |_| {
            hits.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[test]
    fn test_dispatch_matches_topic_and_kind() {
        let mut reg = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        reg.add(Topic::from_raw("auction:1"), EventKind::BidPlaced, counter(&hits));

        assert_eq!(reg.dispatch(&bid_on("auction:1")), 1);
        assert_eq!(reg.dispatch(&bid_on("auction:2")), 0);
        assert_eq!(reg.dispatch(&ended_on("auction:1")), 0);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_duplicate_adds_both_fire() {
        let mut reg = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let topic = Topic::from_raw("auction:1");
        reg.add(topic.clone(), EventKind::BidPlaced, counter(&hits));
        reg.add(topic, EventKind::BidPlaced, counter(&hits));

        assert_eq!(reg.dispatch(&bid_on("auction:1")), 2);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_failing_and_panicking_handlers_do_not_block_others() {
        let mut reg = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let topic = Topic::from_raw("auction:1");
        reg.add(topic.clone(), EventKind::BidPlaced, |_| {
            Err(HandlerError::Failed("boom".into()))
        });
        reg.add(topic.clone(), EventKind::BidPlaced, |_| panic!("handler bug"));
        reg.add(topic, EventKind::BidPlaced, counter(&hits));

        assert_eq!(reg.dispatch(&bid_on("auction:1")), 1);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_remove_by_handle_is_scoped() {
        let mut reg = SubscriptionRegistry::new();
        let mine = Arc::new(AtomicUsize::new(0));
        let theirs = Arc::new(AtomicUsize::new(0));
        let topic = Topic::from_raw("auction:1");
        let handle = reg.add(topic.clone(), EventKind::BidPlaced, counter(&mine));
        reg.add(topic, EventKind::BidPlaced, counter(&theirs));

        assert!(reg.remove(&handle));
        assert!(!reg.remove(&handle));
        reg.dispatch(&bid_on("auction:1"));
        assert_eq!(mine.load(Ordering::SeqCst), 0);
        assert_eq!(theirs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_remove_by_topic_and_kind() {
        let mut reg = SubscriptionRegistry::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let topic = Topic::from_raw("auction:1");
        reg.add(topic.clone(), EventKind::BidPlaced, counter(&hits));
        reg.add(topic.clone(), EventKind::AuctionEnded, counter(&hits));

        assert_eq!(reg.remove_by_topic_and_kind(&topic, EventKind::BidPlaced), 1);
        assert!(reg.contains_topic(&topic));
        assert_eq!(reg.remove_by_topic(&topic), 1);
        assert!(reg.is_empty());
    }

    #[test]
    fn test_topics_are_distinct() {
        let mut reg = SubscriptionRegistry::new();
        reg.add(Topic::from_raw("auction:1"), EventKind::BidPlaced, |_| Ok(()));
        reg.add(Topic::from_raw("auction:1"), EventKind::AuctionEnded, |_| Ok(()));
        reg.add(Topic::from_raw("auction:2"), EventKind::AuctionEnded, |_| Ok(()));

        let topics: Vec<_> = reg.topics().into_iter().map(|t| t.to_string()).collect();
        assert_eq!(topics, ["auction:1", "auction:2"]);
    }
}
