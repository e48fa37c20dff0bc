use crate::cache::FacetRowMap;
use crate::cache::IdSetCache;
use crate::cache::IdSetKey;
use crate::cache::RowCache;
use crate::engine;
use crate::engine::IdSet;
use crate::engine::Resolution;
use crate::error::Result;
use crate::facet::Facet;
use crate::filter::CanonicalFilter;
use crate::filter::FilterNormalizer;
use crate::filter::RawFilter;
use crate::registry::FacetRegistry;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::debug;

/// How a resolution interacts with the id-set cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveOptions {
    pub cache_tag: Option<String>,
    pub use_cache: bool,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            cache_tag: None,
            use_cache: true,
        }
    }
}

/// Per-request (or per-job) state for facet resolution.
///
/// Rows are loaded at most once per subject type for the lifetime of the
/// context. The registry and row cache are shared; everything else is
/// dropped with the context.
pub struct ResolutionContext {
    registry: Arc<FacetRegistry>,
    rows: Arc<RowCache>,
    id_sets: IdSetCache,
    loaded: HashMap<String, FacetRowMap>,
    last_resolutions: HashMap<String, Resolution>,
}

impl ResolutionContext {
    pub fn new(registry: Arc<FacetRegistry>, rows: Arc<RowCache>) -> Self {
        let id_sets = IdSetCache::new(rows.cache().clone());
        Self {
            registry,
            rows,
            id_sets,
            loaded: HashMap::new(),
            last_resolutions: HashMap::new(),
        }
    }

    pub fn registry(&self) -> &FacetRegistry {
        &self.registry
    }

    pub fn row_cache(&self) -> &Arc<RowCache> {
        &self.rows
    }

    /// Facets of `subject_type` with their rows loaded.
    pub fn load_facets(&mut self, subject_type: &str) -> Result<Vec<Facet>> {
        let mut facets = self.registry.make_facets(subject_type)?;
        let rows = match self.loaded.entry(subject_type.to_string()) {
            Entry::Occupied(entry) => entry.into_mut(),
            Entry::Vacant(entry) => {
                let slugs = self.registry.slugs(subject_type)?;
                entry.insert(self.rows.get_rows(subject_type, &slugs)?)
            }
        };
        for facet in &mut facets {
            facet.set_rows(rows.get(facet.slug()).cloned().unwrap_or_default());
        }
        Ok(facets)
    }

    /// Facets ready for rendering: rows loaded, `raw` normalized onto every
    /// facet, and option counts taken from the last query applied to this
    /// subject type. Without such a query every count is zero.
    pub fn facets(&mut self, subject_type: &str, raw: &RawFilter) -> Result<Vec<Facet>> {
        let mut facets = self.load_facets(subject_type)?;
        let filter = FilterNormalizer::new(&facets).normalize(raw);
        let last = self.last_resolutions.get(subject_type);
        for facet in &mut facets {
            facet.set_filter(filter.clone());
            let ids = last
                .and_then(|resolution| resolution.ids_for(facet.slug()))
                .cloned()
                .unwrap_or_default();
            facet.set_ids_in_filter(ids);
        }
        Ok(facets)
    }

    pub fn normalize(&mut self, subject_type: &str, raw: &RawFilter) -> Result<CanonicalFilter> {
        let facets = self.load_facets(subject_type)?;
        Ok(FilterNormalizer::new(&facets).normalize(raw))
    }

    pub fn empty_filter(&self, subject_type: &str) -> Result<CanonicalFilter> {
        let definitions = self.registry.definitions(subject_type)?;
        Ok(CanonicalFilter::empty_for(
            definitions.iter().map(|definition| definition.param_name()),
        ))
    }

    pub fn resolve(
        &mut self,
        subject_type: &str,
        filter: &CanonicalFilter,
        candidates: &IdSet,
        options: &ResolveOptions,
    ) -> Result<Resolution> {
        let facets = self.load_facets(subject_type)?;
        if !options.use_cache {
            return Ok(engine::resolve(&facets, filter, candidates));
        }
        let key = IdSetKey::new(subject_type, filter.clone()).with_tag(options.cache_tag.clone());
        self.id_sets
            .get_or_compute(&key, || Ok(engine::resolve(&facets, filter, candidates)))
    }

    /// Size of the final id set, cached separately so a page and its total
    /// share one resolution.
    pub fn count(
        &mut self,
        subject_type: &str,
        filter: &CanonicalFilter,
        candidates: &IdSet,
        options: &ResolveOptions,
    ) -> Result<u64> {
        if !options.use_cache {
            let resolution = self.resolve(subject_type, filter, candidates, options)?;
            return Ok(resolution.final_ids.len() as u64);
        }
        let facets = self.load_facets(subject_type)?;
        let key = IdSetKey::new(subject_type, filter.clone()).with_tag(options.cache_tag.clone());
        let id_sets = &self.id_sets;
        id_sets.count_or_compute(&key, || {
            let resolution: Resolution = id_sets
                .get_or_compute(&key, || Ok(engine::resolve(&facets, filter, candidates)))?;
            Ok(resolution.final_ids.len() as u64)
        })
    }

    /// Remembers the resolution behind the last applied query so
    /// [`ResolutionContext::facets`] can count options against it.
    pub fn remember_resolution(&mut self, subject_type: &str, resolution: Resolution) {
        debug!(
            "remembering resolution for `{subject_type}` ({} ids)",
            resolution.final_ids.len()
        );
        self.last_resolutions
            .insert(subject_type.to_string(), resolution);
    }

    pub fn last_resolution(&self, subject_type: &str) -> Option<&Resolution> {
        self.last_resolutions.get(subject_type)
    }

    /// Clears every cached bucket and the rows this context loaded.
    pub fn forget_cache(&mut self) {
        self.rows.forget();
        self.loaded.clear();
    }

    /// Clears cached rows and id sets of one subject type.
    pub fn forget_cache_for(&mut self, subject_type: &str) {
        self.rows.cache().forget_subject(subject_type);
        self.loaded.remove(subject_type);
    }
}
