//! Error types for the subscription registry and its store adapters.

use thiserror::Error;

/// Errors raised by a [`KvStore`](crate::kv::KvStore) adapter.
#[derive(Debug, Error)]
pub enum KvError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Store is locked by another process")]
    Locked,

    #[error("Invalid value format: {0}")]
    InvalidFormat(String),

    #[error("Checksum mismatch: expected {expected}, got {got}")]
    ChecksumMismatch { expected: u32, got: u32 },

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Main error type for registry operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Failed to read store key {key:?}: {source}")]
    StoreRead {
        key: String,
        #[source]
        source: KvError,
    },

    #[error("Failed to write store key {key:?}: {source}")]
    StoreWrite {
        key: String,
        #[source]
        source: KvError,
    },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Encode error: {0}")]
    Encode(String),

    #[error("Invalid channel ID: {0:?}")]
    InvalidChannelId(String),
}

impl RegistryError {
    /// True for failures of the underlying store rather than of the data.
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            RegistryError::StoreRead { .. } | RegistryError::StoreWrite { .. }
        )
    }
}

/// Result type for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
