//! Key-value store adapters consumed by the registry.
//!
//! The registry needs only whole-value `get` and `set` by key. No
//! transactions are assumed: a `set` replaces the value atomically, and two
//! callers that read-modify-write the same key can lose each other's
//! updates.
//!
//! Two adapters ship with the crate:
//! - [`MemoryStore`]: an in-process map
//! - [`FileStore`]: one checksummed file per key in a locked directory

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use crate::error::KvError;
use std::sync::Arc;

/// Result type for store adapters.
pub type KvResult<T> = std::result::Result<T, KvError>;

/// Minimal contract the registry requires from a persistent store.
pub trait KvStore: Send + Sync {
    /// Fetch the value under `key`, or `None` if nothing was ever set.
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>>;

    /// Replace the value under `key` as a whole.
    fn set(&self, key: &str, value: &[u8]) -> KvResult<()>;
}

impl<S: KvStore + ?Sized> KvStore for Arc<S> {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        (**self).set(key, value)
    }
}

impl<S: KvStore + ?Sized> KvStore for &S {
    fn get(&self, key: &str) -> KvResult<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &[u8]) -> KvResult<()> {
        (**self).set(key, value)
    }
}
