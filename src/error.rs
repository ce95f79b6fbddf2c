use thiserror::Error;

/// Integrity violations reported by the relationship graph
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GraphError {
    /// One or both relation endpoints are not entities of the graph
    #[error("cannot relate '{from}' -> '{to}': unknown entities {missing:?}")]
    UnknownEntities {
        from: String,
        to: String,
        missing: Vec<String>,
    },

    /// Snapshot data failed validation
    #[error("invalid graph data: {0}")]
    Invalid(String),
}

/// Failures of the external text generation service
#[derive(Debug, Error)]
pub enum GeneratorError {
    #[error("API key not configured (environment variable {0})")]
    NoApiKey(String),

    #[error("API key is not a valid HTTP header value")]
    InvalidApiKey,

    #[error("Network error: {0}")]
    Network(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Service returned no text")]
    Empty,
}

/// Errors from reading or writing newline-delimited JSON datasets
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("line {line}: malformed JSON: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: record is not a JSON object")]
    NotAnObject { line: usize },

    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors that abort an annotation or summarization run
///
/// External service failures never surface here; they are recorded on the
/// affected examples instead.
#[derive(Debug, Error)]
pub enum AnnotationError {
    #[error("batch size must be at least 1")]
    InvalidBatchSize,

    #[error("failed to write batch: {0}")]
    Sink(#[from] DatasetError),
}

/// Positional response shape mismatch (strict parsing only)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("expected {expected} labels, response had {actual}")]
pub struct ShapeMismatch {
    pub expected: usize,
    pub actual: usize,
}
