//! Per-connection lifecycle: `Unjoined -> Joined -> Disconnected`

use std::sync::Arc;

use crate::broadcaster::ChatRoom;
use crate::client::ClientHandle;
use crate::error::SessionError;
use crate::events::{ChatEvent, ClientRequest};
use crate::registry::{ConnectionId, SessionHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unjoined,
    Joined(SessionHandle),
    /// Terminal
    Disconnected,
}

/// Drives one connection through the room.
///
/// Requests outside `Joined` are rejected without touching the room.
pub struct SessionController {
    room: Arc<ChatRoom>,
    connection_id: ConnectionId,
    client: ClientHandle,
    state: SessionState,
}

impl SessionController {
    pub fn new(room: Arc<ChatRoom>, client: ClientHandle) -> Self {
        Self {
            room,
            connection_id: ConnectionId::new(),
            client,
            state: SessionState::Unjoined,
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    /// Route one inbound request to its transition
    pub fn dispatch(&mut self, request: ClientRequest) -> Result<(), SessionError> {
        match request {
            ClientRequest::Join { username } => self.join(&username).map(|_| ()),
            ClientRequest::ChatMessage { message } => self.send_message(message).map(|_| ()),
            ClientRequest::VoiceMessage { audio } => self.send_voice(audio).map(|_| ()),
        }
    }

    /// `Unjoined -> Joined`. Any non-empty name is accepted; trimming and
    /// whitespace checks are the client's job.
    pub fn join(&mut self, username: &str) -> Result<SessionHandle, SessionError> {
        match self.state {
            SessionState::Unjoined => {}
            SessionState::Joined(_) => return Err(SessionError::AlreadyJoined),
            SessionState::Disconnected => return Err(SessionError::Disconnected),
        }
        if username.is_empty() {
            return Err(SessionError::EmptyUsername);
        }

        let session = self
            .room
            .join(self.connection_id, username, self.client.clone());
        self.state = SessionState::Joined(session.clone());
        Ok(session)
    }

    /// Broadcast a text message; blank text is rejected
    pub fn send_message(&mut self, message: String) -> Result<ChatEvent, SessionError> {
        let session = self.joined()?;
        if message.trim().is_empty() {
            return Err(SessionError::EmptyMessage);
        }
        Ok(self.room.send_text(session, message))
    }

    /// Broadcast a voice clip; the payload is opaque but must not be empty
    pub fn send_voice(&mut self, audio: Vec<u8>) -> Result<ChatEvent, SessionError> {
        let session = self.joined()?;
        if audio.is_empty() {
            return Err(SessionError::EmptyVoice);
        }
        tracing::debug!(
            connection = %session.connection_id,
            bytes = audio.len(),
            "Voice message accepted"
        );
        Ok(self.room.send_voice(session, audio))
    }

    /// Move to `Disconnected`, leaving the room if joined. Safe to call twice.
    pub fn disconnect(&mut self) {
        let previous = std::mem::replace(&mut self.state, SessionState::Disconnected);
        if let SessionState::Joined(session) = previous {
            self.room.leave(&session.connection_id);
        }
    }

    fn joined(&self) -> Result<&SessionHandle, SessionError> {
        match &self.state {
            SessionState::Joined(session) => Ok(session),
            SessionState::Unjoined => Err(SessionError::NotJoined),
            SessionState::Disconnected => Err(SessionError::Disconnected),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.disconnect();
    }
}
