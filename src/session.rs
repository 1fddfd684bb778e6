//! Sync session — one connection, one subscription registry.
//!
//! UI consumers never touch the registry directly. They hold the
//! [`SubscriptionHandle`]s (or the [`ViewFeed`]) the session gave them and
//! hand them back on teardown.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::auth::{Credential, CredentialStore};
use crate::error::{ConnectError, HandlerError, SubscribeError, WsError};
use crate::ws::native::WsClient;
use crate::ws::{
    ConnectionState, DomainEvent, EventKind, FeedItem, MessageIn, ResourceKind, ServerEvent,
    SubscriptionHandle, SubscriptionRegistry, Topic, WsConfig, WsEvent,
};

/// Owns the connection manager and the registry for one connection.
pub struct SyncSession {
    ws: WsClient,
    credentials: CredentialStore,
    registry: SubscriptionRegistry,
    feeds: HashMap<u64, mpsc::UnboundedSender<FeedItem>>,
    next_feed: u64,
}

impl SyncSession {
    pub fn new(config: WsConfig, credentials: CredentialStore) -> Self {
        Self {
            ws: WsClient::new(config, credentials.clone()),
            credentials,
            registry: SubscriptionRegistry::new(),
            feeds: HashMap::new(),
            next_feed: 0,
        }
    }

    /// Store `credential` and connect with it.
    pub async fn initialize(&mut self, credential: Credential) -> Result<(), ConnectError> {
        self.credentials.set(credential).await;
        self.connect().await
    }

    /// Connect with whatever credential the store currently holds.
    pub async fn connect(&mut self) -> Result<(), ConnectError> {
        self.ws.connect(self.registry.topics()).await
    }

    /// Re-initialize after the retry budget ran out.
    pub async fn restart(&mut self) -> Result<(), ConnectError> {
        self.ws.restart(self.registry.topics()).await
    }

    pub async fn disconnect(&mut self) -> Result<(), WsError> {
        self.ws.disconnect().await
    }

    pub fn is_connected(&self) -> bool {
        self.ws.is_connected()
    }

    pub fn state(&self) -> ConnectionState {
        self.ws.state()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }

    // ── Subscriptions ────────────────────────────────────────────────────

    /// Register `handler` for `kind` events on a resource.
    pub fn subscribe<F>(
        &mut self,
        resource: ResourceKind,
        instance: Option<&str>,
        kind: EventKind,
        handler: F,
    ) -> SubscriptionHandle
    where
        F: FnMut(&ServerEvent) -> Result<(), HandlerError> + Send + 'static,
    {
        self.subscribe_topic(Topic::new(resource, instance), kind, handler)
    }

    pub fn subscribe_topic<F>(&mut self, topic: Topic, kind: EventKind, handler: F) -> SubscriptionHandle
    where
        F: FnMut(&ServerEvent) -> Result<(), HandlerError> + Send + 'static,
    {
        let first = !self.registry.contains_topic(&topic);
        let handle = self.registry.add(topic.clone(), kind, handler);
        if first {
            self.transport_subscribe(topic);
        }
        handle
    }

    /// Remove exactly the subscription behind `handle`.
    pub fn unsubscribe(&mut self, handle: &SubscriptionHandle) -> bool {
        let removed = self.registry.remove(handle);
        if removed {
            self.release_topic_if_unused(&handle.topic);
        }
        removed
    }

    /// Remove every subscription on a resource, including other consumers'.
    pub fn unsubscribe_topic(&mut self, resource: ResourceKind, instance: Option<&str>) -> usize {
        let topic = Topic::new(resource, instance);
        let removed = self.registry.remove_by_topic(&topic);
        self.release_topic_if_unused(&topic);
        removed
    }

    /// Remove every subscription of one kind on a resource.
    pub fn unsubscribe_kind(
        &mut self,
        resource: ResourceKind,
        instance: Option<&str>,
        kind: EventKind,
    ) -> usize {
        let topic = Topic::new(resource, instance);
        let removed = self.registry.remove_by_topic_and_kind(&topic, kind);
        self.release_topic_if_unused(&topic);
        removed
    }

    // ── Feeds ────────────────────────────────────────────────────────────

    /// Open a feed for a view: every listed `(topic, kind)` is forwarded to
    /// it, plus a [`FeedItem::Resync`] on every fresh connect.
    pub fn feed(&mut self, interests: &[(Topic, EventKind)]) -> ViewFeed {
        let (tx, rx) = mpsc::unbounded_channel();
        self.next_feed += 1;
        let id = self.next_feed;

        let handles = interests
            .iter()
            .map(|(topic, kind)| {
                let tx = tx.clone();
                self.subscribe_topic(topic.clone(), *kind, move |event| {
                    tx.send(FeedItem::Event(event.clone()))
                        .map_err(|_| HandlerError::Closed)
                })
            })
            .collect();

        self.feeds.insert(id, tx);
        ViewFeed { id, handles, rx }
    }

    /// Tear down every subscription a feed holds.
    pub fn release(&mut self, feed: ViewFeed) {
        for handle in &feed.handles {
            self.unsubscribe(handle);
        }
        self.feeds.remove(&feed.id);
    }

    /// Publish a domain event (service credential).
    pub fn publish(&self, topic: Topic, event: &DomainEvent) -> Result<(), WsError> {
        self.ws.publish(topic, event)
    }

    // ── Event loop ───────────────────────────────────────────────────────

    /// Receive the next event from the connection and route it.
    pub async fn pump(&mut self) -> Option<WsEvent> {
        let event = self.ws.recv().await?;
        self.route(&event);
        Some(event)
    }

    fn route(&mut self, event: &WsEvent) {
        match event {
            WsEvent::Connected => {
                tracing::info!(feeds = self.feeds.len(), "Connected, requesting view resync");
                self.feeds
                    .retain(|_, tx| tx.send(FeedItem::Resync).is_ok());
            }
            WsEvent::Message(msg) => match msg {
                MessageIn::Subscribed { topic } => tracing::debug!(topic = %topic, "subscribed"),
                MessageIn::Unsubscribed { topic } => tracing::debug!(topic = %topic, "unsubscribed"),
                other => {
                    if let Some(server_event) = other.clone().into_server_event() {
                        let delivered = self.registry.dispatch(&server_event);
                        tracing::trace!(
                            topic = %server_event.topic,
                            kind = %server_event.kind(),
                            delivered,
                            "dispatched"
                        );
                    }
                }
            },
            WsEvent::Disconnected { reason } => {
                tracing::info!(reason = %reason, "Disconnected");
            }
            WsEvent::MaxReconnectReached => {
                tracing::warn!("Live updates stopped; call restart() to reconnect");
            }
            WsEvent::Error(message) => tracing::warn!("{}", message),
        }
    }

    fn transport_subscribe(&self, topic: Topic) {
        if let Err(e) = self.ws.subscribe(topic.clone()) {
            let err = SubscribeError {
                topic: Some(topic.to_string()),
                message: e.to_string(),
            };
            tracing::warn!("{}", err);
        }
    }

    fn release_topic_if_unused(&self, topic: &Topic) {
        if self.registry.contains_topic(topic) {
            return;
        }
        if let Err(e) = self.ws.unsubscribe(topic.clone()) {
            let err = SubscribeError {
                topic: Some(topic.to_string()),
                message: e.to_string(),
            };
            tracing::warn!("{}", err);
        }
    }
}

/// A view's inbound stream: its matching events plus resync requests.
#[derive(Debug)]
pub struct ViewFeed {
    id: u64,
    handles: Vec<SubscriptionHandle>,
    rx: mpsc::UnboundedReceiver<FeedItem>,
}

impl ViewFeed {
    pub async fn next(&mut self) -> Option<FeedItem> {
        self.rx.recv().await
    }

    /// Next item if one is already queued.
    pub fn try_next(&mut self) -> Option<FeedItem> {
        self.rx.try_recv().ok()
    }

    pub fn handles(&self) -> &[SubscriptionHandle] {
        &self.handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::auction::wire::{AuctionCreatedEvent, BidPlacedEvent};
    use crate::shared::{AuctionId, UserId};
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn session() -> SyncSession {
        SyncSession::new(WsConfig::default(), CredentialStore::default())
    }

    fn created(id: &str) -> WsEvent {
        WsEvent::Message(MessageIn::AuctionCreated {
            topic: Topic::auction_house(),
            data: AuctionCreatedEvent {
                auction_id: AuctionId::from(id),
            },
        })
    }

    fn bid(topic: Topic) -> WsEvent {
        WsEvent::Message(MessageIn::BidPlaced {
            topic,
            data: BidPlacedEvent {
                auction_id: AuctionId::from("1"),
                bidder_id: UserId::from("u1"),
                amount: Decimal::from(5),
                timestamp: Utc::now(),
            },
        })
    }

    #[test]
    fn test_feeds_receive_their_events_and_resync() {
        let mut session = session();
        let mut a = session.feed(&[(Topic::auction_house(), EventKind::AuctionCreated)]);
        let mut b = session.feed(&[(Topic::auction_house(), EventKind::AuctionCreated)]);

        session.route(&WsEvent::Connected);
        session.route(&created("9"));

        for feed in [&mut a, &mut b] {
            assert_eq!(feed.try_next(), Some(FeedItem::Resync));
            assert!(matches!(feed.try_next(), Some(FeedItem::Event(ev)) if ev.kind() == EventKind::AuctionCreated));
            assert_eq!(feed.try_next(), None);
        }
    }

    #[test]
    fn test_release_only_removes_own_subscriptions() {
        let mut session = session();
        let topic = Topic::auction(&AuctionId::from("1"));
        let mine = session.feed(&[(topic.clone(), EventKind::BidPlaced)]);
        let mut theirs = session.feed(&[(topic.clone(), EventKind::BidPlaced)]);
        assert_eq!(session.registry().len(), 2);

        session.release(mine);
        assert_eq!(session.registry().len(), 1);

        session.route(&bid(topic));
        assert!(matches!(theirs.try_next(), Some(FeedItem::Event(_))));
    }

    #[test]
    fn test_legacy_topic_wide_unsubscribe() {
        let mut session = session();
        session.subscribe(ResourceKind::Auction, Some("1"), EventKind::BidPlaced, |_| Ok(()));
        session.subscribe(ResourceKind::Auction, Some("1"), EventKind::AuctionEnded, |_| Ok(()));
        session.subscribe(ResourceKind::Auction, Some("2"), EventKind::BidPlaced, |_| Ok(()));

        assert_eq!(
            session.unsubscribe_kind(ResourceKind::Auction, Some("1"), EventKind::BidPlaced),
            1
        );
        assert_eq!(session.unsubscribe_topic(ResourceKind::Auction, Some("1")), 1);
        assert_eq!(session.registry().topics().len(), 1);
    }

    #[test]
    fn test_dropped_feed_is_pruned_on_connect() {
        let mut session = session();
        let feed = session.feed(&[(Topic::auction_house(), EventKind::AuctionCreated)]);
        drop(feed);
        session.route(&WsEvent::Connected);
        assert!(session.feeds.is_empty());
    }
}
