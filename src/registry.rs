//! Subscription registry over a key-value store.

use crate::error::{RegistryError, Result};
use crate::kv::KvStore;
use crate::types::{Subscription, SubscriptionKey, SubscriptionSet, KEY_SEPARATOR};
use parking_lot::Mutex;
use tracing::{debug, trace};

/// Store key holding the encoded subscription set.
pub const SUBSCRIPTIONS_KEY: &str = "subscriptions";

/// Registry configuration.
#[derive(Clone, Debug)]
pub struct RegistryConfig {
    /// Store key the whole subscription set lives under.
    pub store_key: String,

    /// Reject channel IDs that contain the key separator.
    pub validate_channel_ids: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            store_key: SUBSCRIPTIONS_KEY.to_string(),
            validate_channel_ids: true,
        }
    }
}

/// What a mutating registry call did to the persisted set.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// The set changed and was saved.
    Applied,
    /// Nothing changed and nothing was written.
    Unchanged,
}

impl Outcome {
    pub fn is_applied(self) -> bool {
        self == Outcome::Applied
    }
}

/// Tracks which feed URLs are watched on behalf of which channels.
///
/// Every operation loads the whole set from the store, works on its own
/// decoded copy and saves the whole set back. A failed load, encode or save
/// never leaves a partially applied change behind.
///
/// Mutations through one `Registry` are serialized by an internal lock. The
/// store offers no transactions, so two registries (or processes) sharing a
/// store can still interleave their load and save and lose an update. Route
/// all writers through a single `Registry` if that matters.
pub struct Registry<S> {
    /// Backing store.
    store: S,

    /// Registry configuration.
    config: RegistryConfig,

    /// Lock for read-modify-write cycles.
    write_lock: Mutex<()>,
}

impl<S: KvStore> Registry<S> {
    /// Create a registry with the default configuration.
    pub fn new(store: S) -> Self {
        Self::with_config(store, RegistryConfig::default())
    }

    pub fn with_config(store: S, config: RegistryConfig) -> Self {
        Self {
            store,
            config,
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    // --- Mutations ---

    /// Subscribe a channel to a feed URL.
    ///
    /// Re-subscribing an existing pair is a no-op and keeps its feed metadata.
    pub fn subscribe(&self, channel_id: &str, url: &str) -> Result<Outcome> {
        self.check_channel_id(channel_id)?;
        let subscription = Subscription::new(channel_id, url);

        self.modify(|set| {
            let key = subscription.key();
            if set.insert_if_absent(subscription) {
                debug!(%key, "subscribed");
                true
            } else {
                trace!(%key, "already subscribed");
                false
            }
        })
    }

    /// Remove a channel's subscription to a feed URL, if there is one.
    pub fn unsubscribe(&self, channel_id: &str, url: &str) -> Result<Outcome> {
        self.check_channel_id(channel_id)?;
        let key = SubscriptionKey::new(channel_id, url);

        self.modify(|set| {
            if set.remove(&key).is_some() {
                debug!(%key, "unsubscribed");
                true
            } else {
                trace!(%key, "not subscribed");
                false
            }
        })
    }

    /// Replace a stored subscription, typically with fresh feed metadata.
    ///
    /// If the subscription is no longer present the update is dropped, so a
    /// late poll result never brings back a removed subscription.
    pub fn update_subscription(&self, subscription: Subscription) -> Result<Outcome> {
        self.check_channel_id(&subscription.channel_id)?;

        self.modify(|set| {
            let key = subscription.key();
            if set.replace_existing(subscription) {
                debug!(%key, "subscription updated");
                true
            } else {
                trace!(%key, "update dropped for missing subscription");
                false
            }
        })
    }

    // --- Queries ---

    /// Load the full current subscription set.
    pub fn list_subscriptions(&self) -> Result<SubscriptionSet> {
        self.load()
    }

    /// Look up one subscription.
    pub fn get_subscription(&self, channel_id: &str, url: &str) -> Result<Option<Subscription>> {
        let mut set = self.load()?;
        Ok(set.remove(&SubscriptionKey::new(channel_id, url)))
    }

    /// All subscriptions of one channel, in key order.
    pub fn subscriptions_for_channel(&self, channel_id: &str) -> Result<Vec<Subscription>> {
        let set = self.load()?;
        Ok(set.for_channel(channel_id).cloned().collect())
    }

    // --- Internals ---

    /// Load, apply `mutate`, and save only if it reports a change.
    fn modify<F>(&self, mutate: F) -> Result<Outcome>
    where
        F: FnOnce(&mut SubscriptionSet) -> bool,
    {
        let _lock = self.write_lock.lock();

        let mut set = self.load()?;
        if !mutate(&mut set) {
            return Ok(Outcome::Unchanged);
        }

        self.save(&set)?;
        Ok(Outcome::Applied)
    }

    fn load(&self) -> Result<SubscriptionSet> {
        let key = &self.config.store_key;
        let value = self
            .store
            .get(key)
            .map_err(|source| RegistryError::StoreRead {
                key: key.clone(),
                source,
            })?;

        if value.is_none() {
            debug!(store_key = %key, "no stored subscriptions, starting empty");
        }

        SubscriptionSet::decode(value.as_deref())
    }

    fn save(&self, set: &SubscriptionSet) -> Result<()> {
        let key = &self.config.store_key;
        let encoded = set.encode()?;

        self.store
            .set(key, &encoded)
            .map_err(|source| RegistryError::StoreWrite {
                key: key.clone(),
                source,
            })
    }

    fn check_channel_id(&self, channel_id: &str) -> Result<()> {
        if self.config.validate_channel_ids && channel_id.contains(KEY_SEPARATOR) {
            return Err(RegistryError::InvalidChannelId(channel_id.to_string()));
        }
        Ok(())
    }
}
