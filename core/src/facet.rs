use crate::definition::FacetDefinition;
use crate::definition::slugify;
use crate::engine::IdSet;
use crate::filter::CanonicalFilter;
use facet_index::SubjectId;
use serde::Serialize;
use std::collections::BTreeSet;
use std::collections::HashMap;

/// The `(subject_id, value)` pairs of one facet, in index order.
pub type FacetValues = Vec<(SubjectId, String)>;

/// One selectable value of a facet together with its would-match count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FacetOption {
    pub value: String,
    pub selected: bool,
    pub total: usize,
    pub slug: String,
}

/// A facet bound to its rows and to the filter of the current resolution.
#[derive(Debug, Clone)]
pub struct Facet {
    definition: FacetDefinition,
    slug: String,
    param_name: String,
    rows: Option<FacetValues>,
    filter: CanonicalFilter,
    ids_in_filter: Option<IdSet>,
}

impl Facet {
    pub fn new(definition: FacetDefinition) -> Self {
        Self {
            slug: definition.slug(),
            param_name: definition.param_name(),
            definition,
            rows: None,
            filter: CanonicalFilter::default(),
            ids_in_filter: None,
        }
    }

    pub fn definition(&self) -> &FacetDefinition {
        &self.definition
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn param_name(&self) -> &str {
        &self.param_name
    }

    pub fn title(&self) -> &str {
        self.definition.display_title()
    }

    pub fn field_name(&self) -> &str {
        &self.definition.field_name
    }

    pub fn subject_type(&self) -> &str {
        &self.definition.subject_type
    }

    pub fn has_rows(&self) -> bool {
        self.rows.is_some()
    }

    /// Loaded rows; empty until [`Facet::set_rows`] is called.
    pub fn rows(&self) -> &[(SubjectId, String)] {
        self.rows.as_deref().unwrap_or_default()
    }

    pub fn set_rows(&mut self, rows: FacetValues) {
        self.rows = Some(rows);
    }

    pub fn filter(&self) -> &CanonicalFilter {
        &self.filter
    }

    pub fn set_filter(&mut self, filter: CanonicalFilter) {
        self.filter = filter;
    }

    /// Values selected for this facet in its filter.
    pub fn selection(&self) -> BTreeSet<String> {
        self.filter
            .selected(&self.param_name)
            .cloned()
            .unwrap_or_default()
    }

    /// Subjects the options are counted against: every other facet's
    /// constraint applied, this one's lifted.
    pub fn ids_in_filter(&self) -> Option<&IdSet> {
        self.ids_in_filter.as_ref()
    }

    pub fn set_ids_in_filter(&mut self, ids: IdSet) {
        self.ids_in_filter = Some(ids);
    }

    pub fn distinct_values(&self) -> BTreeSet<String> {
        self.rows()
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(_, value)| value.clone())
            .collect()
    }

    /// Options in the order their values first appear in the rows.
    pub fn options(&self) -> Vec<FacetOption> {
        let empty = IdSet::new();
        let counted = self.ids_in_filter.as_ref().unwrap_or(&empty);
        let field_slug = slugify(self.field_name());
        let mut positions: HashMap<&str, usize> = HashMap::new();
        let mut options: Vec<FacetOption> = Vec::new();
        for (subject_id, value) in self.rows() {
            if value.is_empty() {
                continue;
            }
            let position = *positions.entry(value.as_str()).or_insert_with(|| {
                options.push(FacetOption {
                    value: value.clone(),
                    selected: self.filter.is_selected(&self.param_name, value),
                    total: 0,
                    slug: format!("{field_slug}_{}", slugify(value)),
                });
                options.len() - 1
            });
            if counted.contains(subject_id) {
                options[position].total += 1;
            }
        }
        options
    }

    pub fn non_missing_options(&self) -> Vec<FacetOption> {
        self.options()
            .into_iter()
            .filter(|option| option.total > 0)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::FilterNormalizer;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn color_facet() -> Facet {
        let mut facet = Facet::new(FacetDefinition::new("Product", "color"));
        facet.set_rows(vec![
            (1, "red".to_string()),
            (2, "Light Blue".to_string()),
            (3, "red".to_string()),
            (4, String::new()),
        ]);
        facet
    }

    #[test]
    fn options_count_against_ids_in_filter() {
        let mut facet = color_facet();
        let filter = FilterNormalizer::new(std::slice::from_ref(&facet))
            .normalize_json(&json!({"color": "red"}));
        facet.set_filter(filter);
        facet.set_ids_in_filter([1, 2].into_iter().collect());

        assert_eq!(
            facet.options(),
            vec![
                FacetOption {
                    value: "red".to_string(),
                    selected: true,
                    total: 1,
                    slug: "color_red".to_string(),
                },
                FacetOption {
                    value: "Light Blue".to_string(),
                    selected: false,
                    total: 1,
                    slug: "color_light-blue".to_string(),
                },
            ]
        );
    }

    #[test]
    fn unresolved_facet_reports_zero_totals() {
        let facet = color_facet();
        assert!(facet.options().iter().all(|option| option.total == 0));
        assert!(facet.non_missing_options().is_empty());
        assert_eq!(
            facet.distinct_values().into_iter().collect::<Vec<_>>(),
            vec!["Light Blue".to_string(), "red".to_string()]
        );
    }
}
