/*!
# Facet Core

Faceted filtering over an inverted facet index: the final subject set for a
filter, plus per-facet option counts that honour every other facet's
selection but not the facet's own.

## Features

- **Canonical filters**: unknown keys dropped, values sorted, select-all
  collapsed to select-none
- **Exclusion resolution**: one pass yields the final ids and every facet's
  counting set
- **Caching**: rows, resolutions and pagination counts kept in namespaced
  buckets of a pluggable cache store
- **Query adapter**: constrain any [`SubjectQuery`] and count it across pages

## Example

```rust,no_run
use facet_core::{
    FacetCache, FacetDefinition, FacetQuery, FacetRegistry, MemoryQuery, ResolutionContext,
    RowCache, raw_filter_from_json,
};
use facet_index::MemoryIndexStore;
use serde_json::json;
use std::sync::Arc;

fn main() -> facet_core::Result<()> {
    let mut registry = FacetRegistry::new();
    registry.define("Product", [FacetDefinition::new("Product", "color")])?;
    let rows = Arc::new(RowCache::new(
        Arc::new(MemoryIndexStore::new()),
        FacetCache::disabled(),
    ));
    let mut ctx = ResolutionContext::new(Arc::new(registry), rows);

    let products = vec![json!({"id": 1, "color": "red"})];
    let mut query = FacetQuery::new(MemoryQuery::new("Product", products))
        .facet_filter(raw_filter_from_json(&json!({"color": "red"})));
    println!("ids: {:?}", query.get(&mut ctx)?);

    for facet in ctx.facets("Product", &Default::default())? {
        for option in facet.options() {
            println!("{} {} ({})", facet.title(), option.value, option.total);
        }
    }
    Ok(())
}
```
*/

mod cache;
mod collection;
mod config;
mod context;
mod definition;
mod engine;
mod error;
mod facet;
mod filter;
mod query;
mod registry;

pub use cache::ALL_BUCKETS;
pub use cache::COUNT_FOR_PAGINATION;
pub use cache::DEFAULT_TTL;
pub use cache::FACET_ROWS;
pub use cache::FacetCache;
pub use cache::FacetRowMap;
pub use cache::IDS_IN_FILTERED_QUERY;
pub use cache::IdSetCache;
pub use cache::IdSetKey;
pub use cache::RowCache;
pub use collection::FilteredCollection;
pub use collection::filter_collection;
pub use config::CACHE_STORE_ENV;
pub use config::CACHE_TTL_ENV;
pub use config::CacheConfig;
pub use config::FacetFilterConfig;
pub use config::IndexConfig;
pub use context::ResolutionContext;
pub use context::ResolveOptions;
pub use definition::FacetDefinition;
pub use definition::slugify;
pub use engine::IdConstraint;
pub use engine::IdSet;
pub use engine::Resolution;
pub use engine::resolve;
pub use error::FacetError;
pub use error::Result;
pub use facet::Facet;
pub use facet::FacetOption;
pub use facet::FacetValues;
pub use filter::CanonicalFilter;
pub use filter::FilterNormalizer;
pub use filter::RawFilter;
pub use filter::RawValue;
pub use filter::raw_filter_from_json;
pub use query::FacetQuery;
pub use query::MemoryQuery;
pub use query::SubjectQuery;
pub use registry::FacetRegistry;
