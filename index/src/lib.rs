/*!
# Facet Index

The inverted index behind faceted filtering: one `(facet_slug, subject_id,
value)` row per value a subject carries for a facet.

- **Stores**: [`MemoryIndexStore`] for tests and single-process use,
  [`JsonIndexStore`] for a persisted table.
- **Extraction**: [`ValueExtractor`] turns a subject into facet values;
  [`JsonFieldExtractor`] follows dot-separated paths through JSON documents.
- **Indexer**: builds and resets rows, then tells every [`IndexObserver`] that
  cached rows are stale.

## Example

```rust,no_run
use facet_index::{IndexedField, Indexer, JsonFieldExtractor, MemoryIndexStore};
use serde_json::json;
use std::sync::Arc;

fn main() -> facet_index::Result<()> {
    let store = Arc::new(MemoryIndexStore::new());
    let indexer = Indexer::new(store);
    let fields = vec![IndexedField::new("Product", "color")];
    let subjects = vec![json!({"id": 1, "color": "red"})];
    let stats = indexer.build_index(&fields, &subjects, &JsonFieldExtractor::default())?;
    println!("inserted {} rows", stats.rows_inserted);
    Ok(())
}
```
*/

mod error;
mod extract;
mod indexer;
mod json_store;
mod row;
mod store;

pub use error::IndexError;
pub use error::Result;
pub use extract::JsonFieldExtractor;
pub use extract::ValueExtractor;
pub use indexer::DEFAULT_INSERT_CHUNK_SIZE;
pub use indexer::IndexObserver;
pub use indexer::IndexStats;
pub use indexer::IndexedField;
pub use indexer::Indexer;
pub use indexer::build_rows;
pub use json_store::JsonIndexStore;
pub use row::FacetRow;
pub use row::SubjectId;
pub use store::IndexStore;
pub use store::MemoryIndexStore;
