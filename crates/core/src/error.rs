use std::path::PathBuf;
use thiserror::Error;

/// Failures raised by the remote embedding, generation and parse services.
#[derive(Debug, Error)]
pub enum CapabilityError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("invalid response from {service}: {details}")]
    Backend {
        service: &'static str,
        details: String,
    },
}

/// Failures raised while extracting documents or building and persisting an index.
#[derive(Debug, Error)]
pub enum BuildError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("extraction failed for {}: {reason}", .path.display())]
    Extraction { path: PathBuf, reason: String },

    #[error("no data found in the data folder")]
    EmptyCorpus,

    #[error("embedding failed: {0}")]
    Embedding(CapabilityError),

    #[error("index build failed: {0}")]
    Failure(String),

    #[error("regex error: {0}")]
    Regex(#[from] regex::Error),

    #[error("serialize error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failures raised while loading an index or answering a question against it.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("no persisted index for collection '{collection}' under {}", .path.display())]
    NotFound { path: PathBuf, collection: String },

    #[error("index storage is unreadable: {0}")]
    Storage(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),

    #[error("embedding failed: {0}")]
    Embedding(CapabilityError),

    #[error("generation failed: {0}")]
    Generation(CapabilityError),

    #[error("generation output is not a valid structured answer: {0}")]
    MalformedResponse(String),
}

pub type Result<T, E = BuildError> = std::result::Result<T, E>;
