use crate::CacheStore;
use crate::NullCacheStore;
use crate::file::FileCacheStore;
use crate::memory::MemoryCacheStore;
use serde::Deserialize;
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// Which backend a configuration names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStoreKind {
    /// The process default, currently the in-memory store.
    #[default]
    Default,
    Memory,
    File,
    None,
}

impl CacheStoreKind {
    /// Parses a store name. `array` is accepted as an alias for the memory
    /// store; unknown names fall back to memory.
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "" | "default" => Self::Default,
            "memory" | "array" => Self::Memory,
            "file" => Self::File,
            "none" | "null" | "off" => Self::None,
            other => {
                warn!("unknown cache store `{other}`; falling back to the memory store");
                Self::Memory
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Memory => "memory",
            Self::File => "file",
            Self::None => "none",
        }
    }
}

pub fn open_store(kind: CacheStoreKind, dir: &Path) -> Arc<dyn CacheStore> {
    match kind {
        CacheStoreKind::Default | CacheStoreKind::Memory => Arc::new(MemoryCacheStore::new()),
        CacheStoreKind::File => Arc::new(FileCacheStore::new(dir)),
        CacheStoreKind::None => Arc::new(NullCacheStore),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    #[test]
    fn parses_known_names_and_aliases() {
        assert_eq!(CacheStoreKind::parse("default"), CacheStoreKind::Default);
        assert_eq!(CacheStoreKind::parse("Array"), CacheStoreKind::Memory);
        assert_eq!(CacheStoreKind::parse(" file "), CacheStoreKind::File);
        assert_eq!(CacheStoreKind::parse("none"), CacheStoreKind::None);
    }

    #[test]
    fn unknown_names_fall_back_to_memory() {
        assert_eq!(CacheStoreKind::parse("redis"), CacheStoreKind::Memory);
    }

    #[test]
    fn none_store_never_hits() {
        let store = open_store(CacheStoreKind::None, Path::new("."));
        store
            .put("k", b"v".to_vec(), Duration::from_secs(10))
            .unwrap();
        assert_eq!(store.get("k").unwrap(), None);
    }
}
