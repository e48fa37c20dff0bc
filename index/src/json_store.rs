use crate::error::Result;
use crate::row::FacetRow;
use crate::row::SubjectId;
use crate::store::IndexStore;
use crate::store::RowsBySlug;
use crate::store::delete_subject;
use crate::store::insert_grouped;
use crate::store::select_rows;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::MutexGuard;
use tracing::info;
use tracing::warn;

const TMP_SUFFIX: &str = "tmp";

/// On-disk layout: every table keeps its own rows so several indexes can
/// share one file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct IndexFile {
    #[serde(default)]
    tables: BTreeMap<String, Vec<FacetRow>>,
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    tables: BTreeMap<&'a str, Vec<&'a FacetRow>>,
}

struct State {
    file: IndexFile,
    rows: RowsBySlug,
}

/// A persisted index table. Each mutation rewrites the file through a
/// temporary sibling and an atomic rename.
pub struct JsonIndexStore {
    path: PathBuf,
    table: String,
    state: Mutex<State>,
}

impl JsonIndexStore {
    pub fn open(path: impl Into<PathBuf>, table: impl Into<String>) -> Result<Self> {
        let path = path.into();
        let table = table.into();
        let mut file = load_file(&path)?;
        let mut rows = RowsBySlug::new();
        insert_grouped(&mut rows, file.tables.remove(&table).unwrap_or_default());
        info!(
            "opened index table `{table}` at {} ({} slugs)",
            path.display(),
            rows.len()
        );
        Ok(Self {
            path,
            table,
            state: Mutex::new(State { file, rows }),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Writes `rows` as this table's contents. Callers commit `rows` to the
    /// in-memory state only once this succeeds.
    fn persist(&self, file: &IndexFile, rows: &RowsBySlug) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent)?;
        }
        let mut tables: BTreeMap<&str, Vec<&FacetRow>> = file
            .tables
            .iter()
            .map(|(name, rows)| (name.as_str(), rows.iter().collect()))
            .collect();
        tables.insert(
            self.table.as_str(),
            rows.values().flatten().collect(),
        );
        let data = serde_json::to_vec(&IndexFileRef { tables })?;
        let tmp_path = self.path.with_extension(TMP_SUFFIX);
        fs::write(&tmp_path, data)?;
        fs::rename(tmp_path, &self.path)?;
        Ok(())
    }
}

impl IndexStore for JsonIndexStore {
    fn fetch_rows(&self, facet_slugs: &[String]) -> Result<Vec<FacetRow>> {
        Ok(select_rows(&self.lock().rows, facet_slugs))
    }

    fn insert_rows(&self, rows: Vec<FacetRow>) -> Result<()> {
        let mut state = self.lock();
        let mut next = state.rows.clone();
        insert_grouped(&mut next, rows);
        self.persist(&state.file, &next)?;
        state.rows = next;
        Ok(())
    }

    fn delete_rows(&self, facet_slug: &str, subject_id: SubjectId) -> Result<usize> {
        let mut state = self.lock();
        let present = state
            .rows
            .get(facet_slug)
            .is_some_and(|rows| rows.iter().any(|row| row.subject_id == subject_id));
        if !present {
            return Ok(0);
        }
        let mut next = state.rows.clone();
        let removed = delete_subject(&mut next, facet_slug, subject_id);
        if removed > 0 {
            self.persist(&state.file, &next)?;
            state.rows = next;
        }
        Ok(removed)
    }

    fn truncate(&self) -> Result<()> {
        let mut state = self.lock();
        self.persist(&state.file, &RowsBySlug::new())?;
        state.rows.clear();
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.lock().rows.values().map(Vec::len).sum())
    }
}

fn load_file(path: &Path) -> Result<IndexFile> {
    let data = match fs::read(path) {
        Ok(data) => data,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(IndexFile::default()),
        Err(err) => return Err(err.into()),
    };
    match serde_json::from_slice(&data) {
        Ok(file) => Ok(file),
        Err(err) => {
            warn!("index file at {path:?} is unreadable ({err}); starting from an empty index");
            Ok(IndexFile::default())
        }
    }
}
