use crate::config::FacetFilterConfig;
use crate::definition::FacetDefinition;
use crate::error::FacetError;
use crate::error::Result;
use crate::facet::Facet;
use facet_index::IndexedField;
use std::collections::BTreeMap;
use std::collections::HashSet;
use tracing::debug;

/// Facet definitions per subject type.
#[derive(Debug, Clone, Default)]
pub struct FacetRegistry {
    definitions: BTreeMap<String, Vec<FacetDefinition>>,
}

impl FacetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Groups the configured `[[facets]]` by subject type, keeping file order.
    pub fn from_config(config: &FacetFilterConfig) -> Result<Self> {
        let mut grouped: BTreeMap<String, Vec<FacetDefinition>> = BTreeMap::new();
        for definition in &config.facets {
            grouped
                .entry(definition.subject_type.clone())
                .or_default()
                .push(definition.clone());
        }
        let mut registry = Self::new();
        for (subject_type, definitions) in grouped {
            registry.define(&subject_type, definitions)?;
        }
        Ok(registry)
    }

    /// Replaces the facets of `subject_type`.
    pub fn define(
        &mut self,
        subject_type: &str,
        definitions: impl IntoIterator<Item = FacetDefinition>,
    ) -> Result<()> {
        let mut seen = HashSet::new();
        let mut accepted = Vec::new();
        for mut definition in definitions {
            if definition.field_name.trim().is_empty() {
                return Err(FacetError::MissingFieldName {
                    subject_type: subject_type.to_string(),
                });
            }
            definition.subject_type = subject_type.to_string();
            let param_name = definition.param_name();
            if param_name.is_empty() {
                return Err(FacetError::Config(format!(
                    "facet title `{}` of `{subject_type}` has no usable parameter name",
                    definition.display_title()
                )));
            }
            if !seen.insert(param_name.clone()) {
                return Err(FacetError::DuplicateParamName {
                    subject_type: subject_type.to_string(),
                    param_name,
                });
            }
            accepted.push(definition);
        }
        debug!("defined {} facets for `{subject_type}`", accepted.len());
        self.definitions.insert(subject_type.to_string(), accepted);
        Ok(())
    }

    pub fn subject_types(&self) -> impl Iterator<Item = &str> {
        self.definitions.keys().map(String::as_str)
    }

    pub fn definitions(&self, subject_type: &str) -> Result<&[FacetDefinition]> {
        self.definitions
            .get(subject_type)
            .map(Vec::as_slice)
            .ok_or_else(|| FacetError::UnknownSubjectType(subject_type.to_string()))
    }

    /// Fresh facets without rows or filter.
    pub fn make_facets(&self, subject_type: &str) -> Result<Vec<Facet>> {
        Ok(self
            .definitions(subject_type)?
            .iter()
            .cloned()
            .map(Facet::new)
            .collect())
    }

    pub fn slugs(&self, subject_type: &str) -> Result<Vec<String>> {
        Ok(self
            .definitions(subject_type)?
            .iter()
            .map(FacetDefinition::slug)
            .collect())
    }

    pub fn indexed_fields(&self, subject_type: &str) -> Result<Vec<IndexedField>> {
        Ok(self
            .definitions(subject_type)?
            .iter()
            .map(FacetDefinition::indexed_field)
            .collect())
    }
}
