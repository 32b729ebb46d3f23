//! # Feed Subscription Registry
//!
//! Tracks which feed URLs are watched on behalf of which channels, persisted
//! as a single JSON blob in a key-value store.
//!
//! ## Core Concepts
//!
//! - **Subscriptions**: one channel watching one feed URL, plus the last seen
//!   feed item
//! - **Keys**: `"<channel>/<url>"`, at most one subscription per pair
//! - **Stores**: anything offering whole-value `get` and `set` by key
//!
//! ## Example
//!
//! ```ignore
//! use feedwatch::{FeedMeta, FileStore, Registry, Subscription};
//!
//! let registry = Registry::new(FileStore::open("./feeds")?);
//!
//! registry.subscribe("town-square", "https://example.com/feed.xml")?;
//!
//! // After polling, record the newest item
//! registry.update_subscription(
//!     Subscription::new("town-square", "https://example.com/feed.xml").with_feed_meta(
//!         FeedMeta { guid: "item-42".into(), ..Default::default() },
//!     ),
//! )?;
//!
//! for (key, sub) in registry.list_subscriptions()?.iter() {
//!     println!("{key}: {}", sub.feed_meta.guid);
//! }
//! ```

pub mod error;
pub mod kv;
pub mod registry;
pub mod types;

// Re-exports
pub use error::{KvError, RegistryError, Result};
pub use kv::{FileStore, KvResult, KvStore, MemoryStore};
pub use registry::{Outcome, Registry, RegistryConfig, SUBSCRIPTIONS_KEY};
pub use types::*;
