//! Integration tests for the subscription registry.

use feedwatch::{
    FeedMeta, FileStore, KvStore, MemoryStore, Outcome, Registry, Subscription, SubscriptionKey,
    SubscriptionSet, SUBSCRIPTIONS_KEY,
};
use std::sync::Arc;
use std::thread;
use tempfile::TempDir;

const FEED: &str = "http://example.com/feed";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::TRACE)
        .with_test_writer()
        .try_init();
}

fn stored_set<S: KvStore>(store: &S) -> SubscriptionSet {
    let bytes = store.get(SUBSCRIPTIONS_KEY).unwrap();
    SubscriptionSet::decode(bytes.as_deref()).unwrap()
}

// --- Realistic Workflow Tests ---

#[test]
fn test_subscribe_update_unsubscribe_scenario() {
    init_tracing();
    let registry = Registry::new(MemoryStore::new());

    registry.subscribe("chan1", FEED).unwrap();
    let set = stored_set(registry.store());
    assert_eq!(set.len(), 1);
    let sub = set.get(&SubscriptionKey::new("chan1", FEED)).unwrap();
    assert_eq!(sub.channel_id, "chan1");
    assert_eq!(sub.url, FEED);
    assert!(sub.feed_meta.is_empty());

    registry
        .update_subscription(Subscription::new("chan1", FEED).with_feed_meta(FeedMeta {
            title: "Example".into(),
            ..Default::default()
        }))
        .unwrap();
    let set = stored_set(registry.store());
    let sub = set.get(&SubscriptionKey::new("chan1", FEED)).unwrap();
    assert_eq!(sub.feed_meta.title, "Example");

    registry.unsubscribe("chan1", FEED).unwrap();
    assert!(stored_set(registry.store()).is_empty());

    let outcome = registry.unsubscribe("chan1", FEED).unwrap();
    assert_eq!(outcome, Outcome::Unchanged);
    assert!(stored_set(registry.store()).is_empty());
}

#[test]
fn test_poller_round() {
    init_tracing();
    let registry = Registry::new(MemoryStore::new());
    registry.subscribe("news", "http://a.example/rss").unwrap();
    registry.subscribe("news", "http://b.example/atom").unwrap();
    registry.subscribe("dev", "http://a.example/rss").unwrap();

    // A poller walks every subscription and writes back what it saw.
    for (_, mut sub) in registry.list_subscriptions().unwrap() {
        sub.feed_meta = FeedMeta {
            guid: format!("{}#latest", sub.url),
            pub_date: "Mon, 19 Oct 2026 10:00:00 GMT".into(),
            ..Default::default()
        };
        assert!(registry.update_subscription(sub).unwrap().is_applied());
    }

    let set = registry.list_subscriptions().unwrap();
    assert_eq!(set.len(), 3);
    for (_, sub) in set.iter() {
        assert_eq!(sub.feed_meta.guid, format!("{}#latest", sub.url));
    }
}

#[test]
fn test_update_after_unsubscribe_is_dropped() {
    let registry = Registry::new(MemoryStore::new());
    registry.subscribe("chan1", FEED).unwrap();

    // Poll result captured before the channel unsubscribed.
    let mut polled = registry.get_subscription("chan1", FEED).unwrap().unwrap();
    polled.feed_meta.id = "entry-1".into();

    registry.unsubscribe("chan1", FEED).unwrap();

    let outcome = registry.update_subscription(polled).unwrap();
    assert_eq!(outcome, Outcome::Unchanged);
    assert!(registry.list_subscriptions().unwrap().is_empty());
}

#[test]
fn test_same_url_for_different_channels() {
    let registry = Registry::new(MemoryStore::new());
    registry.subscribe("chan1", FEED).unwrap();
    registry.subscribe("chan2", FEED).unwrap();

    assert_eq!(registry.list_subscriptions().unwrap().len(), 2);

    registry.unsubscribe("chan1", FEED).unwrap();
    let remaining = registry.subscriptions_for_channel("chan2").unwrap();
    assert_eq!(remaining.len(), 1);
    assert!(registry.subscriptions_for_channel("chan1").unwrap().is_empty());
}

// --- Persistence ---

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();

    {
        let registry = Registry::new(FileStore::open(dir.path().join("kv")).unwrap());
        registry.subscribe("chan1", FEED).unwrap();
        registry
            .update_subscription(Subscription::new("chan1", FEED).with_feed_meta(FeedMeta {
                id: "42".into(),
                ..Default::default()
            }))
            .unwrap();
    }

    let registry = Registry::new(FileStore::open(dir.path().join("kv")).unwrap());
    let sub = registry.get_subscription("chan1", FEED).unwrap().unwrap();
    assert_eq!(sub.feed_meta.id, "42");
}

#[test]
fn test_reads_blob_written_by_another_writer() {
    let store = MemoryStore::new();
    store
        .set(
            SUBSCRIPTIONS_KEY,
            br#"{"Subscriptions":{"chan1/http://example.com/feed":{"ChannelID":"chan1","URL":"http://example.com/feed","XMLInfo":{"ID":"1","GUID":"g","PubDate":"today"}},"chan2/http://x":{"ChannelID":"chan2","URL":"http://x","XMLInfo":null}}}"#,
        )
        .unwrap();

    let registry = Registry::new(store);
    let set = registry.list_subscriptions().unwrap();
    assert_eq!(set.len(), 2);

    let sub = set.get(&SubscriptionKey::new("chan1", FEED)).unwrap();
    assert_eq!(sub.feed_meta.guid, "g");
    assert_eq!(sub.feed_meta.pub_date, "today");
    assert!(sub.feed_meta.title.is_empty());

    assert!(set
        .get(&SubscriptionKey::new("chan2", "http://x"))
        .unwrap()
        .feed_meta
        .is_empty());
}

// --- Concurrency ---

#[test]
fn test_shared_registry_does_not_lose_updates() {
    let registry = Arc::new(Registry::new(MemoryStore::new()));

    let handles: Vec<_> = (0..8)
        .map(|t| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for i in 0..25 {
                    registry
                        .subscribe(&format!("chan{t}"), &format!("http://feed/{i}"))
                        .unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(registry.list_subscriptions().unwrap().len(), 200);
}
