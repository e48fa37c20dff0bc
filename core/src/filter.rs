use crate::error::Result;
use crate::facet::Facet;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::collections::BTreeSet;
use tracing::debug;

/// A filter as it arrives from a caller: any keys, scalar-or-list values.
pub type RawFilter = BTreeMap<String, RawValue>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Many(Vec<Value>),
    One(Value),
}

impl RawValue {
    /// Coerces to a set of strings. Scalars become singletons; `null`, empty
    /// strings and nested containers are dropped.
    pub fn selection(&self) -> BTreeSet<String> {
        match self {
            Self::One(value) => scalar(value).into_iter().collect(),
            Self::Many(values) => values.iter().filter_map(scalar).collect(),
        }
    }
}

impl From<&str> for RawValue {
    fn from(value: &str) -> Self {
        Self::One(Value::String(value.to_string()))
    }
}

impl From<Vec<&str>> for RawValue {
    fn from(values: Vec<&str>) -> Self {
        Self::Many(
            values
                .into_iter()
                .map(|value| Value::String(value.to_string()))
                .collect(),
        )
    }
}

fn scalar(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null | Value::Array(_) | Value::Object(_) => return None,
    };
    (!text.is_empty()).then_some(text)
}

/// Reads a JSON object into a [`RawFilter`]. Anything else is an empty filter.
pub fn raw_filter_from_json(value: &Value) -> RawFilter {
    let Value::Object(map) = value else {
        debug!("ignoring non-object filter input");
        return RawFilter::new();
    };
    map.iter()
        .map(|(key, value)| {
            let raw = match value {
                Value::Array(items) => RawValue::Many(items.clone()),
                other => RawValue::One(other.clone()),
            };
            (key.clone(), raw)
        })
        .collect()
}

/// A normalized filter: one entry per facet parameter of a subject type,
/// keys and values sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalFilter(BTreeMap<String, BTreeSet<String>>);

impl CanonicalFilter {
    /// Every parameter present with nothing selected.
    pub fn empty_for<I, S>(param_names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            param_names
                .into_iter()
                .map(|name| (name.into(), BTreeSet::new()))
                .collect(),
        )
    }

    pub fn from_cache_key(key: &str) -> Result<Self> {
        Ok(serde_json::from_str(key)?)
    }

    /// Stable serialization; identical selections give identical keys.
    pub fn cache_key(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn is_unconstrained(&self) -> bool {
        self.0.values().all(BTreeSet::is_empty)
    }

    pub fn selected(&self, param_name: &str) -> Option<&BTreeSet<String>> {
        self.0.get(param_name)
    }

    pub fn is_selected(&self, param_name: &str, value: &str) -> bool {
        self.selected(param_name)
            .is_some_and(|values| values.contains(value))
    }

    pub fn with_cleared(&self, param_name: &str) -> Self {
        let mut cleared = self.clone();
        if let Some(values) = cleared.0.get_mut(param_name) {
            values.clear();
        }
        cleared
    }

    pub fn params(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &BTreeSet<String>)> {
        self.0.iter().map(|(name, values)| (name.as_str(), values))
    }

    /// Back to the caller-facing shape, for re-normalization.
    pub fn to_raw(&self) -> RawFilter {
        self.0
            .iter()
            .map(|(name, values)| {
                let values = values.iter().cloned().map(Value::String).collect();
                (name.clone(), RawValue::Many(values))
            })
            .collect()
    }
}

/// Turns raw input into the [`CanonicalFilter`] of a set of facets.
pub struct FilterNormalizer<'a> {
    facets: &'a [Facet],
}

impl<'a> FilterNormalizer<'a> {
    pub fn new(facets: &'a [Facet]) -> Self {
        Self { facets }
    }

    pub fn empty(&self) -> CanonicalFilter {
        CanonicalFilter::empty_for(self.facets.iter().map(Facet::param_name))
    }

    pub fn normalize(&self, raw: &RawFilter) -> CanonicalFilter {
        let mut filter = self.empty();
        for (key, value) in raw {
            let Some(facet) = self.facets.iter().find(|facet| facet.param_name() == key) else {
                debug!("ignoring unknown filter key `{key}`");
                continue;
            };
            let selection = value.selection();
            if selection.is_empty() {
                continue;
            }
            let available = facet.distinct_values();
            if !available.is_empty() && selection == available {
                debug!("every value of `{key}` selected; treating as no selection");
                continue;
            }
            filter.0.insert(key.clone(), selection);
        }
        filter
    }

    pub fn normalize_json(&self, raw: &Value) -> CanonicalFilter {
        self.normalize(&raw_filter_from_json(raw))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::FacetDefinition;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn facets() -> Vec<Facet> {
        let mut color = Facet::new(FacetDefinition::new("Product", "color"));
        color.set_rows(vec![
            (1, "red".to_string()),
            (2, "blue".to_string()),
            (3, "red".to_string()),
            (4, "green".to_string()),
        ]);
        let mut size = Facet::new(FacetDefinition::new("Product", "size").with_title("Size"));
        size.set_rows(vec![(1, "S".to_string()), (3, "M".to_string())]);
        vec![color, size]
    }

    fn selection(values: &[&str]) -> BTreeSet<String> {
        values.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn fills_every_param_and_drops_unknown_keys() {
        let facets = facets();
        let filter = FilterNormalizer::new(&facets).normalize_json(&json!({
            "color": "red",
            "weight": ["heavy"],
        }));
        assert_eq!(
            filter.iter().collect::<Vec<_>>(),
            vec![
                ("color", &selection(&["red"])),
                ("size", &BTreeSet::new()),
            ]
        );
    }

    #[test]
    fn coerces_scalars_and_drops_blanks() {
        let facets = facets();
        let filter = FilterNormalizer::new(&facets).normalize_json(&json!({
            "color": ["blue", "", null, "red", "blue"],
            "size": 42,
        }));
        assert_eq!(filter.selected("color"), Some(&selection(&["blue", "red"])));
        assert_eq!(filter.selected("size"), Some(&selection(&["42"])));

        let blanks = FilterNormalizer::new(&facets).normalize_json(&json!({"color": ""}));
        assert!(blanks.is_unconstrained());
    }

    #[test]
    fn selecting_every_value_collapses_to_none() {
        let facets = facets();
        let mut raw = RawFilter::new();
        raw.insert("color".to_string(), vec!["green", "red", "blue"].into());
        raw.insert("size".to_string(), "M".into());
        let filter = FilterNormalizer::new(&facets).normalize(&raw);
        assert_eq!(filter.selected("color"), Some(&BTreeSet::new()));
        assert_eq!(filter.selected("size"), Some(&selection(&["M"])));
    }

    #[test]
    fn key_order_does_not_change_cache_key() {
        let facets = facets();
        let normalizer = FilterNormalizer::new(&facets);
        let first = normalizer.normalize_json(&json!({"size": ["M"], "color": ["red", "blue"]}));
        let second = normalizer.normalize_json(&json!({"color": ["blue", "red"], "size": "M"}));
        assert_eq!(first.cache_key().unwrap(), second.cache_key().unwrap());
        assert_eq!(
            first.cache_key().unwrap(),
            r#"{"color":["blue","red"],"size":["M"]}"#
        );
    }

    #[test]
    fn with_cleared_only_touches_one_param() {
        let facets = facets();
        let filter = FilterNormalizer::new(&facets).normalize_json(&json!({
            "color": "red",
            "size": "S",
        }));
        let cleared = filter.with_cleared("color");
        assert_eq!(cleared.selected("color"), Some(&BTreeSet::new()));
        assert!(cleared.is_selected("size", "S"));
    }
}
