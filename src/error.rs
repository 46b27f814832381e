//! Error types for voice session operations

use tokio_tungstenite::tungstenite::Error as WsError;

/// Errors surfaced by the voice session and its components.
///
/// `Device` and `Transport` end the session; `Decode` and `Protocol` are
/// logged at the point of failure and the offending message is skipped.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("audio device error: {0}")]
    Device(String),

    #[error("transport error: {0}")]
    Transport(#[from] WsError),

    #[error("malformed audio frame: {0}")]
    Decode(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
