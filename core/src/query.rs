use crate::context::ResolutionContext;
use crate::context::ResolveOptions;
use crate::engine::IdSet;
use crate::error::Result;
use crate::filter::RawFilter;
use facet_index::JsonFieldExtractor;
use facet_index::SubjectId;
use facet_index::ValueExtractor;
use serde_json::Value;
use serde_json::json;
use sha1::Digest;
use sha1::Sha1;
use std::sync::Arc;
use tracing::debug;

/// The slice of a query API facet filtering needs.
pub trait SubjectQuery: Clone {
    fn subject_type(&self) -> &str;

    /// Ids this query returns, in its order and honouring its pagination.
    fn ids(&self) -> Vec<SubjectId>;

    /// A copy with limit and offset removed.
    fn without_pagination(&self) -> Self;

    /// Narrows the query to `ids`, on top of its own constraints.
    fn restrict_to_ids(&mut self, ids: &IdSet);

    /// Distinguishes queries whose own constraints differ, so their cached id
    /// sets do not collide.
    fn cache_tag(&self) -> Option<String> {
        None
    }

    fn candidate_ids(&self) -> IdSet {
        self.ids().into_iter().collect()
    }
}

/// A query with a facet filter attached.
///
/// The base query is kept as given; [`FacetQuery::apply_filter`] derives the
/// constrained copy once and later calls reuse it.
#[derive(Debug, Clone)]
pub struct FacetQuery<Q> {
    base: Q,
    raw_filter: RawFilter,
    cache_tag: Option<String>,
    use_cache: bool,
    constrained: Option<Q>,
}

impl<Q: SubjectQuery> FacetQuery<Q> {
    pub fn new(base: Q) -> Self {
        Self {
            base,
            raw_filter: RawFilter::new(),
            cache_tag: None,
            use_cache: true,
            constrained: None,
        }
    }

    pub fn facet_filter(mut self, raw: RawFilter) -> Self {
        self.raw_filter = raw;
        self.constrained = None;
        self
    }

    pub fn facets_match_filter(self, raw: RawFilter) -> Self {
        self.facet_filter(raw)
    }

    pub fn cache_tag(mut self, cache_tag: impl Into<String>) -> Self {
        self.cache_tag = Some(cache_tag.into());
        self
    }

    pub fn with_cache(mut self, use_cache: bool) -> Self {
        self.use_cache = use_cache;
        self
    }

    pub fn base(&self) -> &Q {
        &self.base
    }

    pub fn is_constrained(&self) -> bool {
        self.constrained.is_some()
    }

    /// The base query narrowed to the filter's final ids, once applied.
    pub fn constrained(&self) -> Option<&Q> {
        self.constrained.as_ref()
    }

    fn options(&self) -> ResolveOptions {
        ResolveOptions {
            cache_tag: self.cache_tag.clone().or_else(|| self.base.cache_tag()),
            use_cache: self.use_cache,
        }
    }

    /// Resolves the filter against every id the base query matches, ignoring
    /// its pagination, and restricts a copy of the base query to the result.
    /// Also records the resolution on `ctx` for option counts.
    pub fn apply_filter(&mut self, ctx: &mut ResolutionContext) -> Result<()> {
        if self.constrained.is_some() {
            return Ok(());
        }
        let subject_type = self.base.subject_type().to_string();
        let filter = ctx.normalize(&subject_type, &self.raw_filter)?;
        let candidates = self.base.without_pagination().candidate_ids();
        let resolution = ctx.resolve(&subject_type, &filter, &candidates, &self.options())?;
        debug!(
            "facet filter on `{subject_type}` kept {} of {} candidates",
            resolution.final_ids.len(),
            candidates.len()
        );
        let mut constrained = self.base.clone();
        constrained.restrict_to_ids(&resolution.final_ids);
        ctx.remember_resolution(&subject_type, resolution);
        self.constrained = Some(constrained);
        Ok(())
    }

    /// Total matches across all pages.
    pub fn count_for_pagination(&self, ctx: &mut ResolutionContext) -> Result<u64> {
        let subject_type = self.base.subject_type();
        let filter = ctx.normalize(subject_type, &self.raw_filter)?;
        let candidates = self.base.without_pagination().candidate_ids();
        ctx.count(subject_type, &filter, &candidates, &self.options())
    }

    /// Ids of the current page.
    pub fn get(&mut self, ctx: &mut ResolutionContext) -> Result<Vec<SubjectId>> {
        self.apply_filter(ctx)?;
        Ok(self.constrained.as_ref().map(Q::ids).unwrap_or_default())
    }

    /// Ids of every page.
    pub fn all_ids(&mut self, ctx: &mut ResolutionContext) -> Result<Vec<SubjectId>> {
        self.apply_filter(ctx)?;
        Ok(self
            .constrained
            .as_ref()
            .map(|query| query.without_pagination().ids())
            .unwrap_or_default())
    }
}

/// A [`SubjectQuery`] over JSON documents held in memory.
#[derive(Debug, Clone)]
pub struct MemoryQuery {
    subject_type: String,
    subjects: Arc<Vec<Value>>,
    fingerprint: String,
    extractor: JsonFieldExtractor,
    conditions: Vec<(String, String)>,
    restriction: Option<IdSet>,
    limit: Option<usize>,
    offset: usize,
}

impl MemoryQuery {
    pub fn new(subject_type: impl Into<String>, subjects: impl Into<Arc<Vec<Value>>>) -> Self {
        let subjects = subjects.into();
        Self {
            subject_type: subject_type.into(),
            fingerprint: fingerprint(&subjects),
            subjects,
            extractor: JsonFieldExtractor::default(),
            conditions: Vec::new(),
            restriction: None,
            limit: None,
            offset: 0,
        }
    }

    pub fn with_extractor(mut self, extractor: JsonFieldExtractor) -> Self {
        self.extractor = extractor;
        self
    }

    /// Keeps subjects where `field` carries `value`.
    pub fn where_eq(mut self, field: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push((field.into(), value.into()));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    /// Matching subjects of the current page.
    pub fn subjects(&self) -> Vec<&Value> {
        self.page().map(|(_, subject)| subject).collect()
    }

    fn page(&self) -> impl Iterator<Item = (SubjectId, &Value)> {
        self.subjects
            .iter()
            .filter_map(|subject| Some((self.extractor.subject_id(subject)?, subject)))
            .filter(|(id, subject)| self.matches(*id, subject))
            .skip(self.offset)
            .take(self.limit.unwrap_or(usize::MAX))
    }

    fn matches(&self, id: SubjectId, subject: &Value) -> bool {
        if let Some(restriction) = &self.restriction
            && !restriction.contains(&id)
        {
            return false;
        }
        self.conditions.iter().all(|(field, value)| {
            self.extractor
                .extract_values(subject, field)
                .iter()
                .any(|candidate| candidate == value)
        })
    }
}

impl SubjectQuery for MemoryQuery {
    fn subject_type(&self) -> &str {
        &self.subject_type
    }

    fn ids(&self) -> Vec<SubjectId> {
        self.page().map(|(id, _)| id).collect()
    }

    fn without_pagination(&self) -> Self {
        let mut query = self.clone();
        query.limit = None;
        query.offset = 0;
        query
    }

    fn restrict_to_ids(&mut self, ids: &IdSet) {
        match &mut self.restriction {
            Some(existing) => existing.retain(|id| ids.contains(id)),
            None => self.restriction = Some(ids.clone()),
        }
    }

    /// Identifies the collection, the id field and the `where` conditions,
    /// so id sets are never shared between different base queries.
    fn cache_tag(&self) -> Option<String> {
        let tag = json!({
            "collection": self.fingerprint,
            "id": self.extractor.id_field(),
            "where": self.conditions,
        });
        Some(tag.to_string())
    }
}

/// Hex sha1 over the compact JSON of every subject, in order.
fn fingerprint(subjects: &[Value]) -> String {
    let mut hasher = Sha1::new();
    for subject in subjects {
        hasher.update(subject.to_string().as_bytes());
        hasher.update(b"\n");
    }
    hasher
        .finalize()
        .iter()
        .map(|byte| format!("{byte:02x}"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn products() -> Vec<Value> {
        vec![
            json!({"id": 1, "color": "red", "stock": "yes"}),
            json!({"id": 2, "color": "blue", "stock": "no"}),
            json!({"id": 3, "color": "red", "stock": "yes"}),
            json!({"id": 4, "color": "green", "stock": "yes"}),
            json!({"color": "orphan"}),
        ]
    }

    #[test]
    fn memory_query_filters_and_paginates() {
        let query = MemoryQuery::new("Product", products())
            .where_eq("stock", "yes")
            .offset(1)
            .limit(1);
        assert_eq!(query.ids(), vec![3]);
        assert_eq!(query.without_pagination().ids(), vec![1, 3, 4]);
        assert_eq!(query.subjects()[0]["color"], "red");
    }

    #[test]
    fn restrictions_intersect() {
        let mut query = MemoryQuery::new("Product", products());
        query.restrict_to_ids(&[1, 2, 3].into_iter().collect());
        query.restrict_to_ids(&[2, 3, 4].into_iter().collect());
        assert_eq!(query.ids(), vec![2, 3]);
    }

    #[test]
    fn cache_tag_separates_conditions_that_would_join_alike() {
        let merged = MemoryQuery::new("Product", products()).where_eq("a", "b&c=d");
        let split = MemoryQuery::new("Product", products())
            .where_eq("a", "b")
            .where_eq("c", "d");
        assert_ne!(merged.cache_tag(), split.cache_tag());
        assert_eq!(
            split.cache_tag(),
            MemoryQuery::new("Product", products())
                .where_eq("a", "b")
                .where_eq("c", "d")
                .limit(2)
                .cache_tag()
        );
    }

    #[test]
    fn cache_tag_tracks_the_collection() {
        let all = MemoryQuery::new("Product", products());
        let fewer = MemoryQuery::new("Product", products()[..2].to_vec());
        let other_id = MemoryQuery::new("Product", products())
            .with_extractor(JsonFieldExtractor::new("sku"));
        assert_ne!(all.cache_tag(), fewer.cache_tag());
        assert_ne!(all.cache_tag(), other_id.cache_tag());
        assert_eq!(all.cache_tag(), MemoryQuery::new("Product", products()).cache_tag());
    }
}
