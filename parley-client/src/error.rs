//! Error types for the chat client

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ClientError>;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out connecting to {0}")]
    ConnectTimeout(String),

    #[error("Connection to server lost")]
    Disconnected,

    #[error("Username must not be blank")]
    EmptyUsername,

    #[error("Message must not be blank")]
    EmptyMessage,

    #[error("Voice clip is empty")]
    EmptyVoice,

    #[error("Join the room first")]
    NotJoined,

    #[error("Already joined as {0}")]
    AlreadyJoined(String),
}
