use crate::error::IndexError;
use crate::error::Result;
use crate::extract::ValueExtractor;
use crate::row::FacetRow;
use crate::row::SubjectId;
use crate::store::IndexStore;
use std::collections::HashSet;
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 1000;

/// Notified after every index mutation so cached rows can be dropped.
pub trait IndexObserver: Send + Sync {
    fn index_changed(&self);
}

/// The part of a facet the indexer needs: where rows go and which field
/// feeds them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedField {
    pub slug: String,
    pub field_name: String,
}

impl IndexedField {
    pub fn new(subject_type: &str, field_name: &str) -> Self {
        Self {
            slug: format!("{subject_type}.{field_name}"),
            field_name: field_name.to_string(),
        }
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IndexStats {
    pub subjects_indexed: usize,
    pub subjects_skipped: usize,
    pub rows_inserted: usize,
}

pub struct Indexer {
    store: Arc<dyn IndexStore>,
    observers: Vec<Arc<dyn IndexObserver>>,
    chunk_size: usize,
}

impl Indexer {
    pub fn new(store: Arc<dyn IndexStore>) -> Self {
        Self {
            store,
            observers: Vec::new(),
            chunk_size: DEFAULT_INSERT_CHUNK_SIZE,
        }
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(IndexError::InvalidChunkSize(chunk_size));
        }
        self.chunk_size = chunk_size;
        Ok(self)
    }

    pub fn observe(mut self, observer: Arc<dyn IndexObserver>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn store(&self) -> &Arc<dyn IndexStore> {
        &self.store
    }

    /// Extracts rows for `subjects` and appends them to the store.
    pub fn build_index<S, E>(
        &self,
        fields: &[IndexedField],
        subjects: &[S],
        extractor: &E,
    ) -> Result<IndexStats>
    where
        E: ValueExtractor<S>,
    {
        let (rows, mut stats) = build_rows(fields, subjects, extractor);
        let created_at = OffsetDateTime::now_utc();
        let rows: Vec<FacetRow> = rows
            .into_iter()
            .map(|row| row.created_at(created_at))
            .collect();
        let inserted = self.insert_chunks(&rows, &mut stats);
        if let Err(err) = inserted {
            warn!(
                "indexing stopped after {} of {} rows: {err}",
                stats.rows_inserted,
                rows.len()
            );
            if stats.rows_inserted > 0 {
                self.notify();
            }
            return Err(err);
        }
        info!(
            "indexed {} subjects into {} rows ({} skipped)",
            stats.subjects_indexed, stats.rows_inserted, stats.subjects_skipped
        );
        self.notify();
        Ok(stats)
    }

    fn insert_chunks(&self, rows: &[FacetRow], stats: &mut IndexStats) -> Result<()> {
        for chunk in rows.chunks(self.chunk_size) {
            self.store.insert_rows(chunk.to_vec())?;
            stats.rows_inserted += chunk.len();
        }
        Ok(())
    }

    /// Drops the rows of the given subjects for `fields`. An empty subject
    /// list resets the whole index.
    pub fn reset_rows(
        &self,
        fields: &[IndexedField],
        subject_ids: &[SubjectId],
    ) -> Result<usize> {
        if subject_ids.is_empty() {
            let before = self.store.len()?;
            self.reset_index()?;
            return Ok(before);
        }
        let mut removed = 0;
        let deleted = self.delete_subjects(fields, subject_ids, &mut removed);
        if let Err(err) = deleted {
            warn!("row reset stopped after removing {removed} rows: {err}");
            if removed > 0 {
                self.notify();
            }
            return Err(err);
        }
        debug!("removed {removed} rows for {} subjects", subject_ids.len());
        self.notify();
        Ok(removed)
    }

    fn delete_subjects(
        &self,
        fields: &[IndexedField],
        subject_ids: &[SubjectId],
        removed: &mut usize,
    ) -> Result<()> {
        for subject_id in subject_ids {
            for field in fields {
                *removed += self.store.delete_rows(&field.slug, *subject_id)?;
            }
        }
        Ok(())
    }

    pub fn reset_index(&self) -> Result<()> {
        self.store.truncate()?;
        info!("facet index truncated");
        self.notify();
        Ok(())
    }

    fn notify(&self) {
        for observer in &self.observers {
            observer.index_changed();
        }
    }
}

/// Builds deduplicated rows without touching a store. Subjects without an id
/// are skipped.
pub fn build_rows<S, E>(
    fields: &[IndexedField],
    subjects: &[S],
    extractor: &E,
) -> (Vec<FacetRow>, IndexStats)
where
    E: ValueExtractor<S>,
{
    let mut stats = IndexStats::default();
    let mut seen: HashSet<(String, SubjectId, String)> = HashSet::new();
    let mut rows = Vec::new();
    for (position, subject) in subjects.iter().enumerate() {
        let Some(subject_id) = extractor.subject_id(subject) else {
            warn!("subject at position {position} has no usable id; skipping");
            stats.subjects_skipped += 1;
            continue;
        };
        stats.subjects_indexed += 1;
        for field in fields {
            for value in extractor.extract_values(subject, &field.field_name) {
                if seen.insert((field.slug.clone(), subject_id, value.clone())) {
                    rows.push(FacetRow::new(field.slug.clone(), subject_id, value));
                }
            }
        }
    }
    (rows, stats)
}
