use crate::engine;
use crate::engine::IdSet;
use crate::engine::Resolution;
use crate::error::Result;
use crate::facet::Facet;
use crate::facet::FacetValues;
use crate::filter::CanonicalFilter;
use crate::filter::FilterNormalizer;
use crate::filter::RawFilter;
use crate::registry::FacetRegistry;
use facet_index::ValueExtractor;
use facet_index::build_rows;
use std::collections::HashMap;

/// Result of filtering subjects that were never indexed.
#[derive(Debug)]
pub struct FilteredCollection<'a, S> {
    pub subjects: Vec<&'a S>,
    pub facets: Vec<Facet>,
    pub filter: CanonicalFilter,
    pub resolution: Resolution,
}

/// Filters an in-memory collection, building facet rows on the fly instead
/// of reading the index. Matching subjects keep their input order.
pub fn filter_collection<'a, S, E>(
    registry: &FacetRegistry,
    subject_type: &str,
    subjects: &'a [S],
    raw: &RawFilter,
    extractor: &E,
) -> Result<FilteredCollection<'a, S>>
where
    E: ValueExtractor<S>,
{
    let fields = registry.indexed_fields(subject_type)?;
    let (rows, _) = build_rows(&fields, subjects, extractor);
    let mut by_slug: HashMap<String, FacetValues> = HashMap::new();
    for row in rows {
        by_slug
            .entry(row.facet_slug)
            .or_default()
            .push((row.subject_id, row.value));
    }

    let mut facets = registry.make_facets(subject_type)?;
    for facet in &mut facets {
        facet.set_rows(by_slug.remove(facet.slug()).unwrap_or_default());
    }

    let filter = FilterNormalizer::new(&facets).normalize(raw);
    let candidates: IdSet = subjects
        .iter()
        .filter_map(|subject| extractor.subject_id(subject))
        .collect();
    let resolution = engine::resolve(&facets, &filter, &candidates);
    for facet in &mut facets {
        facet.set_filter(filter.clone());
    }
    resolution.apply_to(&mut facets);

    let matching = subjects
        .iter()
        .filter(|subject| {
            extractor
                .subject_id(subject)
                .is_some_and(|id| resolution.final_ids.contains(&id))
        })
        .collect();

    Ok(FilteredCollection {
        subjects: matching,
        facets,
        filter,
        resolution,
    })
}
