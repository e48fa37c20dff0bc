//! Facet resolution: the final subject set plus, for every facet, the subject
//! set with that facet's own constraint lifted.

use crate::facet::Facet;
use crate::filter::CanonicalFilter;
use facet_index::SubjectId;
use serde::Deserialize;
use serde::Serialize;
use std::collections::BTreeMap;
use std::collections::BTreeSet;

pub type IdSet = BTreeSet<SubjectId>;

/// What one facet's selection allows. `Unconstrained` never narrows a result,
/// while `Ids` of an empty set matches nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdConstraint {
    Unconstrained,
    Ids(IdSet),
}

impl IdConstraint {
    pub fn is_unconstrained(&self) -> bool {
        matches!(self, Self::Unconstrained)
    }

    pub fn intersect(self, other: &IdConstraint) -> IdConstraint {
        match (self, other) {
            (constraint, Self::Unconstrained) => constraint,
            (Self::Unconstrained, Self::Ids(ids)) => Self::Ids(ids.clone()),
            (Self::Ids(mut ids), Self::Ids(other)) => {
                ids.retain(|id| other.contains(id));
                Self::Ids(ids)
            }
        }
    }

    /// Concrete ids, reading `Unconstrained` as every candidate.
    pub fn or_candidates(self, candidates: &IdSet) -> IdSet {
        match self {
            Self::Unconstrained => candidates.clone(),
            Self::Ids(ids) => ids,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    pub final_ids: IdSet,
    /// Keyed by facet slug.
    pub per_facet_ids: BTreeMap<String, IdSet>,
}

impl Resolution {
    pub fn ids_for(&self, slug: &str) -> Option<&IdSet> {
        self.per_facet_ids.get(slug)
    }

    /// Hands each facet the ids its options are counted against.
    pub fn apply_to(&self, facets: &mut [Facet]) {
        for facet in facets {
            if let Some(ids) = self.per_facet_ids.get(facet.slug()) {
                facet.set_ids_in_filter(ids.clone());
            }
        }
    }
}

/// Resolves `filter` over `facets`, restricted to `candidates`.
///
/// Facets must already carry their rows; a facet without rows matches
/// nothing when it has a selection.
pub fn resolve(facets: &[Facet], filter: &CanonicalFilter, candidates: &IdSet) -> Resolution {
    if filter.is_unconstrained() {
        return Resolution {
            final_ids: candidates.clone(),
            per_facet_ids: facets
                .iter()
                .map(|facet| (facet.slug().to_string(), candidates.clone()))
                .collect(),
        };
    }

    let matched: Vec<IdConstraint> = facets
        .iter()
        .map(|facet| matched_ids(facet, filter, candidates))
        .collect();

    let per_facet_ids = facets
        .iter()
        .enumerate()
        .map(|(excluded, facet)| {
            let others = matched
                .iter()
                .enumerate()
                .filter(|(position, _)| *position != excluded)
                .map(|(_, constraint)| constraint);
            let ids = intersect_all(others).or_candidates(candidates);
            (facet.slug().to_string(), ids)
        })
        .collect();

    Resolution {
        final_ids: intersect_all(matched.iter()).or_candidates(candidates),
        per_facet_ids,
    }
}

fn matched_ids(facet: &Facet, filter: &CanonicalFilter, candidates: &IdSet) -> IdConstraint {
    let Some(selection) = filter
        .selected(facet.param_name())
        .filter(|selection| !selection.is_empty())
    else {
        return IdConstraint::Unconstrained;
    };
    IdConstraint::Ids(
        facet
            .rows()
            .iter()
            .filter(|(subject_id, value)| {
                selection.contains(value) && candidates.contains(subject_id)
            })
            .map(|(subject_id, _)| *subject_id)
            .collect(),
    )
}

fn intersect_all<'a>(constraints: impl Iterator<Item = &'a IdConstraint>) -> IdConstraint {
    constraints.fold(IdConstraint::Unconstrained, IdConstraint::intersect)
}
