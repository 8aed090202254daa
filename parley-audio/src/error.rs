//! Error types for voice capture

use thiserror::Error;

pub type Result<T> = std::result::Result<T, AudioError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AudioError {
    #[error("Microphone unavailable: {0}")]
    CaptureFailed(String),

    #[error("Audio device error: {0}")]
    DeviceError(String),

    #[error("Audio stream error: {0}")]
    StreamError(String),

    #[error("Voice clip encoding error: {0}")]
    Encoding(String),

    #[error("Voice transport error: {0}")]
    Transport(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AudioError {
    pub fn capture<S: Into<String>>(msg: S) -> Self {
        Self::CaptureFailed(msg.into())
    }

    pub fn device<S: Into<String>>(msg: S) -> Self {
        Self::DeviceError(msg.into())
    }

    pub fn stream<S: Into<String>>(msg: S) -> Self {
        Self::StreamError(msg.into())
    }

    pub fn encoding<S: Into<String>>(msg: S) -> Self {
        Self::Encoding(msg.into())
    }

    pub fn transport<S: Into<String>>(msg: S) -> Self {
        Self::Transport(msg.into())
    }
}
