use crate::error::Result;
use crate::row::FacetRow;
use crate::row::SubjectId;
use std::collections::BTreeMap;
use std::collections::HashSet;
use std::sync::RwLock;
use std::sync::RwLockReadGuard;
use std::sync::RwLockWriteGuard;

/// Row storage for the inverted index.
///
/// `fetch_rows` must answer for any number of slugs in one call; callers rely
/// on it to load every facet of a subject type with a single round trip.
pub trait IndexStore: Send + Sync {
    fn fetch_rows(&self, facet_slugs: &[String]) -> Result<Vec<FacetRow>>;

    fn insert_rows(&self, rows: Vec<FacetRow>) -> Result<()>;

    /// Deletes every row of `subject_id` under `facet_slug`, returning the
    /// number of rows removed.
    fn delete_rows(&self, facet_slug: &str, subject_id: SubjectId) -> Result<usize>;

    fn truncate(&self) -> Result<()>;

    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

pub(crate) type RowsBySlug = BTreeMap<String, Vec<FacetRow>>;

#[derive(Default)]
pub struct MemoryIndexStore {
    rows: RwLock<RowsBySlug>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<FacetRow>) -> Self {
        let store = Self::new();
        insert_grouped(&mut store.write(), rows);
        store
    }

    fn read(&self) -> RwLockReadGuard<'_, RowsBySlug> {
        match self.rows.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, RowsBySlug> {
        match self.rows.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl IndexStore for MemoryIndexStore {
    fn fetch_rows(&self, facet_slugs: &[String]) -> Result<Vec<FacetRow>> {
        Ok(select_rows(&self.read(), facet_slugs))
    }

    fn insert_rows(&self, rows: Vec<FacetRow>) -> Result<()> {
        insert_grouped(&mut self.write(), rows);
        Ok(())
    }

    fn delete_rows(&self, facet_slug: &str, subject_id: SubjectId) -> Result<usize> {
        Ok(delete_subject(&mut self.write(), facet_slug, subject_id))
    }

    fn truncate(&self) -> Result<()> {
        self.write().clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.read().values().map(Vec::len).sum())
    }
}

pub(crate) fn select_rows(rows: &RowsBySlug, facet_slugs: &[String]) -> Vec<FacetRow> {
    let wanted: HashSet<&str> = facet_slugs.iter().map(String::as_str).collect();
    rows.iter()
        .filter(|(slug, _)| wanted.contains(slug.as_str()))
        .flat_map(|(_, rows)| rows.iter().cloned())
        .collect()
}

pub(crate) fn insert_grouped(target: &mut RowsBySlug, rows: Vec<FacetRow>) {
    for row in rows {
        target.entry(row.facet_slug.clone()).or_default().push(row);
    }
}

pub(crate) fn delete_subject(
    target: &mut RowsBySlug,
    facet_slug: &str,
    subject_id: SubjectId,
) -> usize {
    let Some(rows) = target.get_mut(facet_slug) else {
        return 0;
    };
    let before = rows.len();
    rows.retain(|row| row.subject_id != subject_id);
    let removed = before - rows.len();
    if rows.is_empty() {
        target.remove(facet_slug);
    }
    removed
}
