use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Operation failed: {0}")]
    Operation(String),

    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    #[error("Failed to read document {path}: {message}")]
    DocumentRead { path: String, message: String },

    #[error("Index load failed: {0}")]
    IndexLoad(String),

    #[error("Index has not been loaded")]
    NotLoaded,

    #[error("Embedding service error: {0}")]
    Embedding(String),

    #[error("Completion service error: {0}")]
    Completion(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Agent made {0} tool-calling rounds without producing a final answer")]
    MaxStepsExceeded(usize),

    #[error("Corpus produced no chunks: {0}")]
    EmptyCorpus(String),
}

impl Error {
    /// Stable machine-readable name, reported to callers next to the message.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::InvalidConfig(_) => "invalid_config",
            Error::NotFound(_) => "not_found",
            Error::Operation(_) => "operation",
            Error::UnsupportedFormat(_) => "unsupported_format",
            Error::DocumentRead { .. } => "document_read",
            Error::IndexLoad(_) => "index_load",
            Error::NotLoaded => "not_loaded",
            Error::Embedding(_) => "embedding_service",
            Error::Completion(_) => "completion_service",
            Error::InvalidRequest(_) => "invalid_request",
            Error::MaxStepsExceeded(_) => "max_steps_exceeded",
            Error::EmptyCorpus(_) => "empty_corpus",
        }
    }

    pub fn operation<E: std::fmt::Display>(err: E) -> Self {
        Error::Operation(err.to_string())
    }

    pub fn document_read<P: AsRef<std::path::Path>, E: std::fmt::Display>(path: P, err: E) -> Self {
        Error::DocumentRead { path: path.as_ref().display().to_string(), message: err.to_string() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
