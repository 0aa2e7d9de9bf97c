use crate::relay::ConnectionId;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("chatroom {0} not found")]
    RoomNotFound(String),

    #[error("failed to persist message: {0}")]
    PersistFailure(#[source] sqlx::Error),

    #[error("delivery to connection {0} failed")]
    DeliveryFailure(ConnectionId),

    #[error("transport read failed: {0}")]
    TransportReadFailure(#[source] BoxError),

    #[error("transport write failed: {0}")]
    TransportWriteFailure(#[source] BoxError),

    #[error("store error: {0}")]
    Store(#[from] sqlx::Error),

    #[error("encoding error: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type RelayResult<T> = Result<T, RelayError>;
