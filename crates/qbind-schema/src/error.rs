/// Errors that can occur during schema validation.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    /// The schema could not be compiled.
    #[error("failed to compile schema: {0}")]
    CompileFailed(String),

    /// The payload failed schema validation.
    #[error("validation failed on queue {queue:?}: {message}")]
    ValidationFailed { queue: String, message: String },

    /// The payload is not valid JSON.
    #[error("payload is not valid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// No schema registered for the given queue.
    #[error("no schema registered for queue {0:?}")]
    NoSchema(String),
}

pub type Result<T> = std::result::Result<T, SchemaError>;
