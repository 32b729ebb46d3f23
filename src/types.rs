//! Core types for the subscription registry.

use crate::error::{RegistryError, Result};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::ser::Formatter;
use std::collections::BTreeMap;
use std::fmt;
use std::io;

/// Separator placed between the channel ID and the URL in a [`SubscriptionKey`].
pub const KEY_SEPARATOR: char = '/';

/// Snapshot of the most recently seen feed item.
///
/// Every field uses the empty string for "absent". Empty fields are left out
/// of the encoded blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedMeta {
    #[serde(rename = "ID", default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(rename = "Title", default, skip_serializing_if = "String::is_empty")]
    pub title: String,

    #[serde(rename = "GUID", default, skip_serializing_if = "String::is_empty")]
    pub guid: String,

    #[serde(rename = "PubDate", default, skip_serializing_if = "String::is_empty")]
    pub pub_date: String,
}

impl FeedMeta {
    /// True when no field has been recorded yet.
    pub fn is_empty(&self) -> bool {
        self.id.is_empty()
            && self.title.is_empty()
            && self.guid.is_empty()
            && self.pub_date.is_empty()
    }
}

/// One watched feed for one channel.
///
/// `channel_id` and `url` form the identity of a subscription. Changing
/// either is a remove followed by a new subscribe, never an update.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(rename = "ChannelID")]
    pub channel_id: String,

    #[serde(rename = "URL")]
    pub url: String,

    #[serde(rename = "XMLInfo", default, deserialize_with = "null_as_default")]
    pub feed_meta: FeedMeta,
}

impl Subscription {
    /// Create a subscription with no feed metadata recorded.
    pub fn new(channel_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            channel_id: channel_id.into(),
            url: url.into(),
            feed_meta: FeedMeta::default(),
        }
    }

    /// Replace the recorded feed metadata.
    pub fn with_feed_meta(mut self, feed_meta: FeedMeta) -> Self {
        self.feed_meta = feed_meta;
        self
    }

    /// Derive the lookup key for this subscription.
    pub fn key(&self) -> SubscriptionKey {
        SubscriptionKey::new(&self.channel_id, &self.url)
    }
}

/// Deduplication key: `"<channel_id>/<url>"`.
///
/// The separator is not escaped. A channel ID containing `/` can produce the
/// same key as a different pair, so the registry rejects such IDs unless
/// validation is turned off.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionKey(String);

impl SubscriptionKey {
    pub fn new(channel_id: &str, url: &str) -> Self {
        let mut key = String::with_capacity(channel_id.len() + url.len() + 1);
        key.push_str(channel_id);
        key.push(KEY_SEPARATOR);
        key.push_str(url);
        SubscriptionKey(key)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SubscriptionKey({:?})", self.0)
    }
}

impl fmt::Display for SubscriptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The full persisted state, stored as one blob under one store key.
///
/// Backed by a sorted map so that encoding the same set always yields the
/// same bytes.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionSet {
    #[serde(rename = "Subscriptions", default, deserialize_with = "null_as_default")]
    subscriptions: BTreeMap<SubscriptionKey, Subscription>,
}

impl SubscriptionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    pub fn get(&self, key: &SubscriptionKey) -> Option<&Subscription> {
        self.subscriptions.get(key)
    }

    pub fn contains(&self, key: &SubscriptionKey) -> bool {
        self.subscriptions.contains_key(key)
    }

    /// Insert a subscription unless its key is already taken.
    ///
    /// Returns false, leaving the existing entry untouched, on a duplicate.
    pub fn insert_if_absent(&mut self, subscription: Subscription) -> bool {
        use std::collections::btree_map::Entry;

        match self.subscriptions.entry(subscription.key()) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(subscription);
                true
            }
        }
    }

    /// Replace the entry under the subscription's key if one exists.
    ///
    /// Returns false and drops the subscription when the key is absent.
    pub fn replace_existing(&mut self, subscription: Subscription) -> bool {
        match self.subscriptions.get_mut(&subscription.key()) {
            Some(existing) => {
                *existing = subscription;
                true
            }
            None => false,
        }
    }

    pub fn remove(&mut self, key: &SubscriptionKey) -> Option<Subscription> {
        self.subscriptions.remove(key)
    }

    /// Iterate entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&SubscriptionKey, &Subscription)> {
        self.subscriptions.iter()
    }

    /// All subscriptions held by one channel, in key order.
    pub fn for_channel<'a>(&'a self, channel_id: &'a str) -> impl Iterator<Item = &'a Subscription> {
        self.subscriptions
            .values()
            .filter(move |sub| sub.channel_id == channel_id)
    }

    /// Encode the set into the persisted JSON blob.
    ///
    /// Strings are written with [`HtmlSafeFormatter`], so a blob produced by
    /// earlier deployments re-encodes to the same bytes.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::new();
        let mut ser = serde_json::Serializer::with_formatter(&mut out, HtmlSafeFormatter);
        self.serialize(&mut ser)
            .map_err(|e| RegistryError::Encode(e.to_string()))?;
        Ok(out)
    }

    /// Decode a persisted blob. An absent value is an empty set.
    pub fn decode(bytes: Option<&[u8]>) -> Result<Self> {
        match bytes {
            None => Ok(Self::new()),
            Some(bytes) => {
                serde_json::from_slice(bytes).map_err(|e| RegistryError::Decode(e.to_string()))
            }
        }
    }
}

impl IntoIterator for SubscriptionSet {
    type Item = (SubscriptionKey, Subscription);
    type IntoIter = std::collections::btree_map::IntoIter<SubscriptionKey, Subscription>;

    fn into_iter(self) -> Self::IntoIter {
        self.subscriptions.into_iter()
    }
}

impl FromIterator<Subscription> for SubscriptionSet {
    /// Later duplicates of a key are ignored, as with repeated subscribes.
    fn from_iter<I: IntoIterator<Item = Subscription>>(iter: I) -> Self {
        let mut set = SubscriptionSet::new();
        for sub in iter {
            set.insert_if_absent(sub);
        }
        set
    }
}

/// Compact JSON formatter that also escapes `&`, `<`, `>`, U+2028 and U+2029
/// as lowercase `\uXXXX` sequences inside strings.
#[derive(Clone, Copy, Debug, Default)]
pub struct HtmlSafeFormatter;

impl Formatter for HtmlSafeFormatter {
    fn write_string_fragment<W>(&mut self, writer: &mut W, fragment: &str) -> io::Result<()>
    where
        W: ?Sized + io::Write,
    {
        let mut start = 0;
        for (i, ch) in fragment.char_indices() {
            let escaped = match ch {
                '&' => "\\u0026",
                '<' => "\\u003c",
                '>' => "\\u003e",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                _ => continue,
            };
            writer.write_all(fragment[start..i].as_bytes())?;
            writer.write_all(escaped.as_bytes())?;
            start = i + ch.len_utf8();
        }
        writer.write_all(fragment[start..].as_bytes())
    }
}

/// Treat an explicit JSON `null` the same as a missing member.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}
