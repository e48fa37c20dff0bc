//! Key/value cache stores with per-entry expiry.
//!
//! Facet resolution treats caching as an optimization only: every store here
//! may lose entries at any time, and callers fall back to recomputing when a
//! store misses or fails.

mod error;
mod file;
mod kind;
mod memory;

use std::time::Duration;

pub use error::CacheError;
pub use error::Result;
pub use file::FileCacheStore;
pub use kind::CacheStoreKind;
pub use kind::open_store;
pub use memory::MemoryCacheStore;

/// A byte-oriented cache backend.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    fn put(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    fn forget(&self, key: &str) -> Result<()>;

    /// Removes every entry whose key starts with `prefix` and returns how many
    /// entries were dropped.
    fn forget_by_prefix(&self, prefix: &str) -> Result<usize>;
}

/// A store that never remembers anything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCacheStore;

impl CacheStore for NullCacheStore {
    fn get(&self, _key: &str) -> Result<Option<Vec<u8>>> {
        Ok(None)
    }

    fn put(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<()> {
        Ok(())
    }

    fn forget(&self, _key: &str) -> Result<()> {
        Ok(())
    }

    fn forget_by_prefix(&self, _prefix: &str) -> Result<usize> {
        Ok(0)
    }
}
