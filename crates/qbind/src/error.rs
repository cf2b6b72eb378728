/// Errors that can occur in queue binding and dispatch operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// Transport-level error, passed through from the broker unchanged.
    #[error("transport error: {0}")]
    Transport(#[from] qbind_transport::TransportError),

    /// An instance could not be serialized for publishing.
    #[error("failed to serialize {type_name}: {source}")]
    Serialize {
        type_name: &'static str,
        source: serde_json::Error,
    },

    /// A payload could not be deserialized into its message type.
    #[error("failed to deserialize {type_name}: {source}")]
    Deserialize {
        type_name: &'static str,
        source: serde_json::Error,
    },

    /// An instance violated its own schema rules.
    #[error("validation failed for {type_name}: {message}")]
    Validation {
        type_name: &'static str,
        message: String,
    },

    /// A queue name is already taken by an incompatible binding.
    #[error(
        "queue binding conflict: {requested} -> {queue:?} collides with \
         existing {existing_type} -> {existing_queue:?}"
    )]
    BindingConflict {
        requested: &'static str,
        queue: String,
        existing_type: &'static str,
        existing_queue: String,
    },

    /// A callback is already registered for this message type.
    #[error("consumer already registered for {0}")]
    DuplicateConsumer(&'static str),

    /// A dispatch loop died from a panic in user code.
    #[error("dispatch loop panicked for queue {0:?}")]
    LoopPanicked(String),

    /// JSON Schema validation error at the queue boundary.
    #[cfg(feature = "schema")]
    #[error("schema validation error: {0}")]
    Schema(#[from] qbind_schema::SchemaError),
}

pub type Result<T> = std::result::Result<T, QueueError>;
