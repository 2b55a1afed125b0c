use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Push delivery failed: {0}")]
    NotificationDeliveryFailed(String),

    #[error("Push token rejected by provider")]
    InvalidToken,

    #[error("Push provider not configured")]
    NotConfigured,

    #[error("Notification I/O timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("Fallback in-app record could not be written: {0}")]
    FallbackWriteFailed(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}
