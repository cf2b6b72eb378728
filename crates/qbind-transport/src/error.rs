/// Errors that can occur in broker transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport has been closed and can no longer move messages.
    #[error("transport closed")]
    Closed,

    /// The named queue has not been declared on this transport.
    #[error("unknown queue: {0}")]
    UnknownQueue(String),

    /// The delivery tag does not belong to an un-acked delivery of this
    /// subscription.
    #[error("unknown delivery tag: {0}")]
    UnknownDelivery(u64),

    /// An I/O error occurred on the broker connection.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, TransportError>;
