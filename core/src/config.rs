use crate::cache::DEFAULT_TTL;
use crate::definition::FacetDefinition;
use crate::error::FacetError;
use crate::error::Result;
use facet_index::DEFAULT_INSERT_CHUNK_SIZE;
use facet_utils_cache::CacheStoreKind;
use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_with::DurationSeconds;
use serde_with::serde_as;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub const CACHE_STORE_ENV: &str = "FACET_FILTER_CACHE_STORE";
pub const CACHE_TTL_ENV: &str = "FACET_FILTER_CACHE_TTL";

/// Top-level configuration, usually read from `facet-filter.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetFilterConfig {
    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub index: IndexConfig,

    /// Facet definitions; each names its subject type.
    #[serde(default)]
    pub facets: Vec<FacetDefinition>,
}

#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Backend; unknown names fall back to the memory store.
    #[serde(default, deserialize_with = "deserialize_store_kind")]
    pub store: CacheStoreKind,

    /// Namespace prefix of every cache key.
    #[serde(default = "default_cache_key")]
    pub key: String,

    /// Entry lifetime in seconds.
    #[serde_as(as = "DurationSeconds<u64>")]
    #[serde(default = "default_expiration_time")]
    pub expiration_time: Duration,

    /// Directory used by the file store.
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Table name for the facet rows.
    #[serde(default = "default_table")]
    pub table: String,

    /// File backing the JSON index store.
    #[serde(default = "default_index_path")]
    pub path: PathBuf,

    /// Rows per insert batch.
    #[serde(default = "default_insert_chunk_size")]
    pub insert_chunk_size: usize,
}

fn default_cache_key() -> String {
    "facet-filter.cache".to_string()
}

fn default_expiration_time() -> Duration {
    DEFAULT_TTL
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".facet-cache")
}

fn default_table() -> String {
    "facetrows".to_string()
}

fn default_index_path() -> PathBuf {
    PathBuf::from("facetrows.json")
}

fn default_insert_chunk_size() -> usize {
    DEFAULT_INSERT_CHUNK_SIZE
}

fn deserialize_store_kind<'de, D>(deserializer: D) -> std::result::Result<CacheStoreKind, D::Error>
where
    D: Deserializer<'de>,
{
    let name = String::deserialize(deserializer)?;
    Ok(CacheStoreKind::parse(&name))
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            store: CacheStoreKind::Default,
            key: default_cache_key(),
            expiration_time: default_expiration_time(),
            dir: default_cache_dir(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            path: default_index_path(),
            insert_chunk_size: default_insert_chunk_size(),
        }
    }
}

impl FacetFilterConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate().map_err(FacetError::Config)?;
        Ok(config)
    }

    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Applies cache overrides from `lookup`, keyed by environment variable
    /// name. Unparseable values are ignored with a warning.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(store) = lookup(CACHE_STORE_ENV) {
            self.cache.store = CacheStoreKind::parse(&store);
        }
        if let Some(ttl) = lookup(CACHE_TTL_ENV) {
            match ttl.trim().parse::<u64>() {
                Ok(seconds) if seconds > 0 => {
                    self.cache.expiration_time = Duration::from_secs(seconds);
                }
                _ => warn!("ignoring invalid {CACHE_TTL_ENV} value `{ttl}`"),
            }
        }
    }

    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.cache.key.trim().is_empty() {
            return Err("Cache key must not be empty".to_string());
        }

        if self.cache.expiration_time.is_zero() {
            return Err("Cache expiration time must be > 0".to_string());
        }

        if self.index.table.trim().is_empty() {
            return Err("Index table must not be empty".to_string());
        }

        if self.index.insert_chunk_size == 0 {
            return Err("Insert chunk size must be > 0".to_string());
        }

        if let Some(facet) = self
            .facets
            .iter()
            .find(|facet| facet.subject_type.trim().is_empty())
        {
            return Err(format!(
                "Facet `{}` has no subject_type",
                facet.display_title()
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_documented_values() {
        let config = FacetFilterConfig::default();
        assert_eq!(config.cache.store, CacheStoreKind::Default);
        assert_eq!(config.cache.key, "facet-filter.cache");
        assert_eq!(config.cache.expiration_time, Duration::from_secs(86_400));
        assert_eq!(config.index.table, "facetrows");
        assert_eq!(config.index.insert_chunk_size, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("facet-filter.toml");
        fs::write(
            &path,
            r#"
[cache]
store = "array"
expiration_time = 60

[index]
table = "product_rows"

[[facets]]
subject_type = "Product"
field_name = "color"
title = "Color"

[[facets]]
subject_type = "Product"
field_name = "brand.name"
"#,
        )
        .unwrap();

        let config = FacetFilterConfig::load(&path).unwrap();
        assert_eq!(config.cache.store, CacheStoreKind::Memory);
        assert_eq!(config.cache.expiration_time, Duration::from_secs(60));
        assert_eq!(config.cache.key, "facet-filter.cache");
        assert_eq!(config.index.table, "product_rows");
        assert_eq!(config.index.insert_chunk_size, 1000);
        assert_eq!(
            config.facets,
            vec![
                FacetDefinition::new("Product", "color").with_title("Color"),
                FacetDefinition::new("Product", "brand.name"),
            ]
        );
    }

    #[test]
    fn unknown_store_falls_back_to_memory() {
        let config = FacetFilterConfig::from_toml_str("[cache]\nstore = \"redis\"\n").unwrap();
        assert_eq!(config.cache.store, CacheStoreKind::Memory);
    }

    #[test]
    fn rejects_invalid_values() {
        let zero_ttl = FacetFilterConfig::from_toml_str("[cache]\nexpiration_time = 0\n");
        assert!(matches!(zero_ttl, Err(FacetError::Config(_))));

        let zero_chunk = FacetFilterConfig::from_toml_str("[index]\ninsert_chunk_size = 0\n");
        assert!(matches!(zero_chunk, Err(FacetError::Config(_))));

        let orphan = FacetFilterConfig::from_toml_str("[[facets]]\nfield_name = \"color\"\n");
        assert!(matches!(orphan, Err(FacetError::Config(_))));

        let malformed = FacetFilterConfig::from_toml_str("[cache\n");
        assert!(matches!(malformed, Err(FacetError::Toml(_))));
    }

    #[test]
    fn overrides_replace_cache_settings() {
        let env: HashMap<&str, &str> = HashMap::from([
            (CACHE_STORE_ENV, "none"),
            (CACHE_TTL_ENV, "120"),
        ]);
        let mut config = FacetFilterConfig::default();
        config.apply_overrides(|name| env.get(name).map(ToString::to_string));
        assert_eq!(config.cache.store, CacheStoreKind::None);
        assert_eq!(config.cache.expiration_time, Duration::from_secs(120));

        config.apply_overrides(|name| (name == CACHE_TTL_ENV).then(|| "soon".to_string()));
        assert_eq!(config.cache.expiration_time, Duration::from_secs(120));
    }
}
