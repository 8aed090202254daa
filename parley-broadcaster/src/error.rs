use thiserror::Error;

#[derive(Error, Debug)]
pub enum BroadcasterError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Server not started")]
    NotStarted,

    #[error("Server already running")]
    AlreadyRunning,
}

/// Protocol-usage and validation failures of a single connection.
///
/// None of these touch shared room state; the server reports them back
/// to the offending client as an `error` event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("join first")]
    NotJoined,

    #[error("already joined")]
    AlreadyJoined,

    #[error("session has ended")]
    Disconnected,

    #[error("username must not be empty")]
    EmptyUsername,

    #[error("message must not be empty")]
    EmptyMessage,

    #[error("voice message must carry audio")]
    EmptyVoice,
}

pub type Result<T> = std::result::Result<T, BroadcasterError>;
