use thiserror::Error;

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Invalid chunk size: {0}")]
    InvalidChunkSize(usize),

    #[error("Index store error: {0}")]
    Store(String),
}

pub type Result<T> = std::result::Result<T, IndexError>;
