//! The polling contract of the message feed, driven against an in-memory
//! source with paused time: fetch on subscribe, one fetch per interval,
//! full replacement on every poll, optimistic append on send, and a hard
//! stop on teardown.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

use deskserver::feed::{FeedError, FeedMessage, MessageFeed, MessageSource};

struct InMemorySource {
    store: Mutex<Vec<FeedMessage>>,
    fetches: AtomicUsize,
}

impl InMemorySource {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            store: Mutex::new(Vec::new()),
            fetches: AtomicUsize::new(0),
        })
    }

    fn push(&self, message: FeedMessage) {
        self.store.lock().unwrap().push(message);
    }

    fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn fetch(&self, ticket_id: Uuid) -> Result<Vec<FeedMessage>, FeedError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let mut messages: Vec<FeedMessage> = self
            .store
            .lock()
            .unwrap()
            .iter()
            .filter(|m| m.ticket_id == ticket_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.created_at);
        Ok(messages)
    }

    async fn send(&self, ticket_id: Uuid, body: &str) -> Result<FeedMessage, FeedError> {
        let message = FeedMessage {
            id: Uuid::new_v4(),
            ticket_id,
            user_id: Uuid::new_v4(),
            message: body.to_string(),
            created_at: Utc::now(),
        };
        self.push(message.clone());
        Ok(message)
    }
}

fn message_at(ticket_id: Uuid, offset_secs: i64, body: &str) -> FeedMessage {
    FeedMessage {
        id: Uuid::new_v4(),
        ticket_id,
        user_id: Uuid::new_v4(),
        message: body.to_string(),
        created_at: Utc.timestamp_opt(1_700_000_000 + offset_secs, 0).unwrap(),
    }
}

/// Give the spawned poller a chance to run any due tick.
async fn settle() {
    for _ in 0..10 {
        tokio::task::yield_now().await;
    }
}

#[tokio::test(start_paused = true)]
async fn messages_arrive_in_creation_order() {
    let source = InMemorySource::new();
    let ticket_id = Uuid::new_v4();

    // Stored out of order; the feed must still observe creation order,
    // however many polls it takes.
    let first = message_at(ticket_id, 0, "hello");
    let second = message_at(ticket_id, 1, "anyone there?");
    source.push(second.clone());
    source.push(first.clone());

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let sub = feed.subscribe(ticket_id);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(sub.messages(), vec![first.clone(), second.clone()]);

    // Several more polls change nothing.
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(sub.messages(), vec![first, second]);
}

#[tokio::test(start_paused = true)]
async fn poll_replaces_the_local_list_instead_of_appending() {
    let source = InMemorySource::new();
    let ticket_id = Uuid::new_v4();
    let first = message_at(ticket_id, 0, "hello");
    source.push(first.clone());

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let sub = feed.subscribe(ticket_id);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(sub.messages().len(), 1);

    // Three more intervals over an unchanged store: still exactly one copy.
    tokio::time::sleep(Duration::from_secs(10)).await;
    settle().await;
    assert_eq!(sub.messages(), vec![first.clone()]);

    let second = message_at(ticket_id, 5, "an update");
    source.push(second.clone());
    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;
    assert_eq!(sub.messages(), vec![first, second]);
}

#[tokio::test(start_paused = true)]
async fn send_appends_locally_before_the_next_poll() {
    let source = InMemorySource::new();
    let ticket_id = Uuid::new_v4();
    source.push(message_at(ticket_id, 0, "hello"));

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let sub = feed.subscribe(ticket_id);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(sub.messages().len(), 1);

    // Well inside the 3s window: the sent message must be visible at the
    // tail without waiting for a tick.
    let sent = sub.send("on my way").await.unwrap();
    let snapshot = sub.messages();
    assert_eq!(snapshot.len(), 2);
    assert_eq!(snapshot[1], sent);

    // The reconciling poll keeps exactly one copy.
    tokio::time::sleep(Duration::from_secs(4)).await;
    settle().await;
    assert_eq!(sub.messages().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn no_second_fetch_before_the_interval_elapses() {
    let source = InMemorySource::new();
    let ticket_id = Uuid::new_v4();

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let _sub = feed.subscribe(ticket_id);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    assert_eq!(source.fetch_count(), 1);

    tokio::time::sleep(Duration::from_millis(2900)).await;
    settle().await;
    assert_eq!(source.fetch_count(), 1);

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;
    assert_eq!(source.fetch_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn stopping_the_subscription_halts_polling() {
    let source = InMemorySource::new();
    let ticket_id = Uuid::new_v4();

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let sub = feed.subscribe(ticket_id);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    let polls_before = source.fetch_count();
    assert!(polls_before >= 1);

    sub.stop();
    assert!(sub.is_stopped());
    settle().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(source.fetch_count(), polls_before);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_subscription_halts_polling() {
    let source = InMemorySource::new();
    let ticket_id = Uuid::new_v4();

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let sub = feed.subscribe(ticket_id);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    let polls_before = source.fetch_count();
    drop(sub);
    settle().await;

    tokio::time::sleep(Duration::from_secs(30)).await;
    settle().await;
    assert_eq!(source.fetch_count(), polls_before);
}

#[tokio::test(start_paused = true)]
async fn subscriptions_poll_only_their_own_ticket() {
    let source = InMemorySource::new();
    let watched = Uuid::new_v4();
    let other = Uuid::new_v4();
    source.push(message_at(watched, 0, "mine"));
    source.push(message_at(other, 1, "not mine"));

    let feed = MessageFeed::new(source.clone() as Arc<dyn MessageSource>);
    let sub = feed.subscribe(watched);

    tokio::time::sleep(Duration::from_millis(10)).await;
    settle().await;
    let snapshot = sub.messages();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].message, "mine");
    assert_eq!(sub.ticket_id(), watched);
}
