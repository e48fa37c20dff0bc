use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

pub type SubjectId = u64;

/// One entry of the inverted index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FacetRow {
    pub facet_slug: String,
    pub subject_id: SubjectId,
    pub value: String,
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub created_at: Option<OffsetDateTime>,
}

impl FacetRow {
    pub fn new(
        facet_slug: impl Into<String>,
        subject_id: SubjectId,
        value: impl Into<String>,
    ) -> Self {
        Self {
            facet_slug: facet_slug.into(),
            subject_id,
            value: value.into(),
            created_at: None,
        }
    }

    pub fn created_at(mut self, at: OffsetDateTime) -> Self {
        self.created_at = Some(at);
        self
    }
}
