use facet_index::IndexedField;
use serde::Deserialize;
use serde::Serialize;

/// Static description of one facet: which field of a subject feeds it and how
/// it is labelled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetDefinition {
    #[serde(default)]
    pub subject_type: String,

    /// Dot-separated path into the subject, e.g. `brand.name`.
    #[serde(default)]
    pub field_name: String,

    /// Display label; the field name is used when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl FacetDefinition {
    pub fn new(subject_type: impl Into<String>, field_name: impl Into<String>) -> Self {
        Self {
            subject_type: subject_type.into(),
            field_name: field_name.into(),
            title: None,
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Index partition key. Stays stable when the title is edited.
    pub fn slug(&self) -> String {
        format!("{}.{}", self.subject_type, self.field_name)
    }

    /// The key this facet answers to in a filter.
    pub fn param_name(&self) -> String {
        slugify(self.display_title())
    }

    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.field_name)
    }

    pub fn indexed_field(&self) -> IndexedField {
        IndexedField::new(&self.subject_type, &self.field_name)
    }
}

/// Lowercases `text` and joins its alphanumeric runs with `-`.
pub fn slugify(text: &str) -> String {
    let mut slug = String::with_capacity(text.len());
    let mut pending_separator = false;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if pending_separator && !slug.is_empty() {
                slug.push('-');
            }
            pending_separator = false;
            slug.extend(ch.to_lowercase());
        } else {
            pending_separator = true;
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn slugify_collapses_separators() {
        assert_eq!(slugify("Color"), "color");
        assert_eq!(slugify("  Brand / Name!! "), "brand-name");
        assert_eq!(slugify("brand.name"), "brand-name");
        assert_eq!(slugify("Größe"), "größe");
        assert_eq!(slugify("--"), "");
    }

    #[test]
    fn param_name_prefers_title() {
        let plain = FacetDefinition::new("Product", "color");
        assert_eq!(plain.slug(), "Product.color");
        assert_eq!(plain.param_name(), "color");

        let titled = FacetDefinition::new("Product", "brand.name").with_title("Brand Name");
        assert_eq!(titled.slug(), "Product.brand.name");
        assert_eq!(titled.param_name(), "brand-name");
        assert_eq!(titled.indexed_field().slug, "Product.brand.name");
    }
}
