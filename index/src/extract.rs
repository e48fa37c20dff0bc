use crate::row::SubjectId;
use serde_json::Value;

/// Reads facet values out of a subject.
///
/// Resolved once per subject type at index-build time; the resolution engine
/// only ever sees the rows an extractor produced.
pub trait ValueExtractor<S>: Send + Sync {
    fn subject_id(&self, subject: &S) -> Option<SubjectId>;

    /// Every value `subject` carries for the dot-separated `field_name`.
    fn extract_values(&self, subject: &S, field_name: &str) -> Vec<String>;
}

/// Walks JSON documents. Intermediate arrays fan out, so `tags.name` over
/// `{"tags": [{"name": "a"}, {"name": "b"}]}` yields `["a", "b"]`.
#[derive(Debug, Clone)]
pub struct JsonFieldExtractor {
    id_field: String,
}

impl JsonFieldExtractor {
    pub fn new(id_field: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
        }
    }

    pub fn id_field(&self) -> &str {
        &self.id_field
    }
}

impl Default for JsonFieldExtractor {
    fn default() -> Self {
        Self::new("id")
    }
}

impl ValueExtractor<Value> for JsonFieldExtractor {
    fn subject_id(&self, subject: &Value) -> Option<SubjectId> {
        match subject.get(&self.id_field)? {
            Value::Number(number) => number.as_u64(),
            Value::String(text) => text.trim().parse().ok(),
            _ => None,
        }
    }

    fn extract_values(&self, subject: &Value, field_name: &str) -> Vec<String> {
        let mut current: Vec<&Value> = vec![subject];
        for field in field_name.split('.').filter(|part| !part.is_empty()) {
            current = current
                .into_iter()
                .filter_map(|value| value.get(field))
                .flat_map(|value| match value {
                    Value::Array(items) => items.iter().collect::<Vec<_>>(),
                    other => vec![other],
                })
                .collect();
        }
        current.into_iter().filter_map(scalar_to_string).collect()
    }
}

/// Stringifies scalars; `null`, objects and nested arrays carry no value.
fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn reads_plain_fields() {
        let extractor = JsonFieldExtractor::default();
        let product = json!({"id": 4, "color": "green", "price": 10, "sale": true});
        assert_eq!(extractor.subject_id(&product), Some(4));
        assert_eq!(extractor.extract_values(&product, "color"), vec!["green"]);
        assert_eq!(extractor.extract_values(&product, "price"), vec!["10"]);
        assert_eq!(extractor.extract_values(&product, "sale"), vec!["true"]);
    }

    #[test]
    fn nested_paths_fan_out_over_arrays() {
        let extractor = JsonFieldExtractor::default();
        let product = json!({
            "id": "12",
            "brand": {"name": "Acme"},
            "tags": [{"name": "new"}, {"name": "sale"}, {"other": 1}],
            "sizes": ["S", "M", null],
        });
        assert_eq!(extractor.subject_id(&product), Some(12));
        assert_eq!(extractor.extract_values(&product, "brand.name"), vec!["Acme"]);
        assert_eq!(
            extractor.extract_values(&product, "tags.name"),
            vec!["new", "sale"]
        );
        assert_eq!(extractor.extract_values(&product, "sizes"), vec!["S", "M"]);
    }

    #[test]
    fn missing_fields_and_nulls_yield_nothing() {
        let extractor = JsonFieldExtractor::new("sku");
        let product = json!({"id": 1, "color": null});
        assert_eq!(extractor.subject_id(&product), None);
        assert!(extractor.extract_values(&product, "color").is_empty());
        assert!(extractor.extract_values(&product, "brand.name").is_empty());
    }
}
