use crate::config::CacheConfig;
use crate::error::Result;
use crate::facet::FacetValues;
use crate::filter::CanonicalFilter;
use facet_index::IndexObserver;
use facet_index::IndexStore;
use facet_utils_cache::CacheStore;
use facet_utils_cache::NullCacheStore;
use facet_utils_cache::open_store;
use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::debug;
use tracing::warn;

pub const FACET_ROWS: &str = "facetRows";
pub const IDS_IN_FILTERED_QUERY: &str = "idsInFilteredQuery";
pub const COUNT_FOR_PAGINATION: &str = "countForPagination";
pub const ALL_BUCKETS: [&str; 3] = [FACET_ROWS, IDS_IN_FILTERED_QUERY, COUNT_FOR_PAGINATION];

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

type Bucket = BTreeMap<String, Entry>;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Entry {
    value: Value,
    /// Unix seconds.
    expires_at: i64,
}

impl Entry {
    fn is_live(&self, now: i64) -> bool {
        self.expires_at > now
    }
}

/// Namespaced buckets of sub-keyed values on top of a [`CacheStore`].
///
/// Each bucket is one store entry (`{namespace}.{bucket}`) holding a map of
/// sub-keys. The store entry's TTL is refreshed on every write, so each
/// sub-key carries its own expiry; expired sub-keys read as misses and are
/// pruned whenever the bucket is written. Store failures are logged and read
/// as misses.
#[derive(Clone)]
pub struct FacetCache {
    store: Arc<dyn CacheStore>,
    namespace: String,
    ttl: Duration,
}

impl FacetCache {
    pub fn new(store: Arc<dyn CacheStore>, namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            ttl,
        }
    }

    pub fn from_config(config: &CacheConfig) -> Self {
        Self::new(
            open_store(config.store, &config.dir),
            config.key.clone(),
            config.expiration_time,
        )
    }

    /// A cache that never hits.
    pub fn disabled() -> Self {
        Self::new(Arc::new(NullCacheStore), "facet-filter.cache", DEFAULT_TTL)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn get<T: DeserializeOwned>(&self, bucket: &str, subkey: &str) -> Option<T> {
        let entry = self.load(bucket).remove(subkey)?;
        match serde_json::from_value(entry.value) {
            Ok(decoded) => Some(decoded),
            Err(err) => {
                warn!("discarding undecodable cache entry {bucket}/{subkey}: {err}");
                None
            }
        }
    }

    pub fn put<T: Serialize>(&self, bucket: &str, subkey: &str, value: &T) {
        let value = match serde_json::to_value(value) {
            Ok(value) => value,
            Err(err) => {
                warn!("cannot encode cache entry {bucket}/{subkey}: {err}");
                return;
            }
        };
        let expires_at = unix_now().saturating_add(ttl_seconds(self.ttl));
        let mut entries = self.load(bucket);
        entries.insert(subkey.to_string(), Entry { value, expires_at });
        self.save(bucket, &mut entries);
    }

    /// Drops the sub-keys of `buckets` that start with `prefix`, or the whole
    /// buckets when no prefix is given.
    pub fn forget(&self, buckets: &[&str], prefix: Option<&str>) {
        match prefix {
            Some(prefix) => self.forget_where(buckets, |subkey| subkey.starts_with(prefix)),
            None => {
                for bucket in buckets {
                    if let Err(err) = self.store.forget(&self.bucket_key(bucket)) {
                        warn!("failed to forget cache bucket {bucket}: {err}");
                    }
                }
            }
        }
    }

    /// Drops every entry of one subject type in all buckets.
    pub fn forget_subject(&self, subject_type: &str) {
        let dotted = format!("{subject_type}.");
        self.forget_where(&ALL_BUCKETS, |subkey| {
            subkey == subject_type || subkey.starts_with(&dotted)
        });
    }

    pub fn forget_all(&self) {
        match self.store.forget_by_prefix(&format!("{}.", self.namespace)) {
            Ok(removed) => debug!("forgot {removed} cache buckets"),
            Err(err) => warn!("failed to clear facet cache: {err}"),
        }
    }

    fn forget_where(&self, buckets: &[&str], matches: impl Fn(&str) -> bool) {
        for bucket in buckets {
            let mut entries = self.load(bucket);
            let before = entries.len();
            entries.retain(|subkey, _| !matches(subkey.as_str()));
            if entries.len() != before {
                self.save(bucket, &mut entries);
            }
        }
    }

    fn bucket_key(&self, bucket: &str) -> String {
        format!("{}.{bucket}", self.namespace)
    }

    fn load(&self, bucket: &str) -> Bucket {
        let bytes = match self.store.get(&self.bucket_key(bucket)) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Bucket::new(),
            Err(err) => {
                warn!("cache store unavailable, treating {bucket} as empty: {err}");
                return Bucket::new();
            }
        };
        let mut entries: Bucket = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("discarding corrupt cache bucket {bucket}: {err}");
                return Bucket::new();
            }
        };
        let now = unix_now();
        entries.retain(|_, entry| entry.is_live(now));
        entries
    }

    fn save(&self, bucket: &str, entries: &mut Bucket) {
        let now = unix_now();
        entries.retain(|_, entry| entry.is_live(now));
        let bytes = match serde_json::to_vec(&*entries) {
            Ok(bytes) => bytes,
            Err(err) => {
                warn!("cannot encode cache bucket {bucket}: {err}");
                return;
            }
        };
        if let Err(err) = self.store.put(&self.bucket_key(bucket), bytes, self.ttl) {
            warn!("failed to write cache bucket {bucket}: {err}");
        }
    }
}

fn unix_now() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

fn ttl_seconds(ttl: Duration) -> i64 {
    i64::try_from(ttl.as_secs()).unwrap_or(i64::MAX)
}

/// Rows of every facet of a subject type, keyed by facet slug.
pub type FacetRowMap = BTreeMap<String, FacetValues>;

/// Loads facet rows in one bulk fetch per subject type and keeps them in the
/// `facetRows` bucket.
pub struct RowCache {
    index: Arc<dyn IndexStore>,
    cache: FacetCache,
    warned_empty: Mutex<HashSet<String>>,
}

impl RowCache {
    pub fn new(index: Arc<dyn IndexStore>, cache: FacetCache) -> Self {
        Self {
            index,
            cache,
            warned_empty: Mutex::new(HashSet::new()),
        }
    }

    pub fn cache(&self) -> &FacetCache {
        &self.cache
    }

    /// Every requested slug is present in the result, with no rows when the
    /// index has none.
    pub fn get_rows(&self, subject_type: &str, slugs: &[String]) -> Result<FacetRowMap> {
        if let Some(rows) = self.cache.get::<FacetRowMap>(FACET_ROWS, subject_type)
            && slugs.iter().all(|slug| rows.contains_key(slug))
        {
            return Ok(rows);
        }

        let fetched = self.index.fetch_rows(slugs)?;
        if fetched.is_empty() && !slugs.is_empty() && self.first_empty_warning(subject_type) {
            warn!("no facet rows for `{subject_type}`; has the index been built?");
        }

        let mut rows: FacetRowMap = slugs
            .iter()
            .map(|slug| (slug.clone(), FacetValues::new()))
            .collect();
        for row in fetched {
            if let Some(values) = rows.get_mut(&row.facet_slug) {
                values.push((row.subject_id, row.value));
            }
        }
        debug!("loaded rows for {} facets of `{subject_type}`", rows.len());
        self.cache.put(FACET_ROWS, subject_type, &rows);
        Ok(rows)
    }

    /// Drops every bucket of the namespace, id sets included, and re-arms the
    /// empty-index warning.
    pub fn forget(&self) {
        self.cache.forget_all();
        self.lock_warned().clear();
    }

    fn first_empty_warning(&self, subject_type: &str) -> bool {
        self.lock_warned().insert(subject_type.to_string())
    }

    fn lock_warned(&self) -> MutexGuard<'_, HashSet<String>> {
        match self.warned_empty.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl IndexObserver for RowCache {
    fn index_changed(&self) {
        self.forget();
    }
}

/// Identity of a cached resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdSetKey {
    pub subject_type: String,
    /// Separates queries on the same subject type with different base
    /// constraints.
    pub cache_tag: Option<String>,
    pub filter: CanonicalFilter,
}

impl IdSetKey {
    pub fn new(subject_type: impl Into<String>, filter: CanonicalFilter) -> Self {
        Self {
            subject_type: subject_type.into(),
            cache_tag: None,
            filter,
        }
    }

    pub fn with_tag(mut self, cache_tag: Option<String>) -> Self {
        self.cache_tag = cache_tag;
        self
    }

    pub fn subkey(&self) -> Result<String> {
        Ok(format!(
            "{}.{}.{}",
            self.subject_type,
            self.cache_tag.as_deref().unwrap_or_default(),
            self.filter.cache_key()?
        ))
    }
}

/// Best-effort memoization of resolutions and counts. Concurrent callers may
/// both compute; the last write wins.
#[derive(Clone)]
pub struct IdSetCache {
    cache: FacetCache,
}

impl IdSetCache {
    pub fn new(cache: FacetCache) -> Self {
        Self { cache }
    }

    pub fn get_or_compute<T, F>(&self, key: &IdSetKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        self.remember(IDS_IN_FILTERED_QUERY, key, compute)
    }

    pub fn count_or_compute<F>(&self, key: &IdSetKey, compute: F) -> Result<u64>
    where
        F: FnOnce() -> Result<u64>,
    {
        self.remember(COUNT_FOR_PAGINATION, key, compute)
    }

    fn remember<T, F>(&self, bucket: &str, key: &IdSetKey, compute: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T>,
    {
        let subkey = match key.subkey() {
            Ok(subkey) => subkey,
            Err(err) => {
                warn!("uncacheable filter for `{}`: {err}", key.subject_type);
                return compute();
            }
        };
        if let Some(hit) = self.cache.get(bucket, &subkey) {
            debug!("cache hit {bucket}/{subkey}");
            return Ok(hit);
        }
        let value = compute()?;
        self.cache.put(bucket, &subkey, &value);
        Ok(value)
    }
}
