use facet_index::IndexError;
use facet_utils_cache::CacheError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum FacetError {
    #[error("Missing key `field_name` in a facet definition for `{subject_type}`")]
    MissingFieldName { subject_type: String },

    #[error("Duplicate facet parameter `{param_name}` for `{subject_type}`")]
    DuplicateParamName {
        subject_type: String,
        param_name: String,
    },

    #[error("No facets defined for subject type `{0}`")]
    UnknownSubjectType(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Index error: {0}")]
    Index(#[from] IndexError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FacetError>;
