use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One unit of room content, as stored in history and sent to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "type")]
pub enum ChatEvent {
    /// Server-generated notice (join/leave)
    #[serde(rename = "system")]
    System {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Text message from a participant
    #[serde(rename = "message")]
    Text {
        username: String,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Voice clip from a participant, opaque bytes
    #[serde(rename = "voice")]
    Voice {
        username: String,
        #[serde(rename = "audio_data", with = "audio_base64")]
        audio: Vec<u8>,
        timestamp: DateTime<Utc>,
    },
}

impl ChatEvent {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::System { timestamp, .. }
            | Self::Text { timestamp, .. }
            | Self::Voice { timestamp, .. } => *timestamp,
        }
    }

    /// Sender name, `None` for system notices
    pub fn username(&self) -> Option<&str> {
        match self {
            Self::System { .. } => None,
            Self::Text { username, .. } | Self::Voice { username, .. } => Some(username),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System { .. })
    }
}

/// A chat event before the room has accepted it.
///
/// The timestamp is never taken from the client; the room stamps the draft
/// when it accepts it.
#[derive(Debug, Clone, PartialEq)]
pub enum EventDraft {
    System { message: String },
    Text { username: String, message: String },
    Voice { username: String, audio: Vec<u8> },
}

impl EventDraft {
    pub fn stamp(self, timestamp: DateTime<Utc>) -> ChatEvent {
        match self {
            Self::System { message } => ChatEvent::System { message, timestamp },
            Self::Text { username, message } => ChatEvent::Text {
                username,
                message,
                timestamp,
            },
            Self::Voice { username, audio } => ChatEvent::Voice {
                username,
                audio,
                timestamp,
            },
        }
    }
}

/// Requests sent by clients, one JSON text frame each
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientRequest {
    Join {
        username: String,
    },
    ChatMessage {
        message: String,
    },
    VoiceMessage {
        #[serde(rename = "audio_data", with = "audio_base64")]
        audio: Vec<u8>,
    },
}

/// Events pushed by the server to clients
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ServerEvent {
    /// Retained history, sent once right after a successful join
    ChatHistory { history: Vec<ChatEvent> },

    /// Current roster in join order, sent on every join/leave
    UserList { users: Vec<String> },

    /// Text or system event
    ChatMessage(ChatEvent),

    /// Voice event
    VoiceMessage(ChatEvent),

    /// Rejected request (protocol-usage or malformed frame)
    Error { message: String },
}

impl ServerEvent {
    /// Wrap a chat event in the frame kind clients expect for it
    pub fn for_chat(event: ChatEvent) -> Self {
        match event {
            ChatEvent::Voice { .. } => Self::VoiceMessage(event),
            other => Self::ChatMessage(other),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

impl ClientRequest {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Audio bytes travel as standard base64 text
mod audio_base64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        STANDARD.decode(text.as_bytes()).map_err(de::Error::custom)
    }
}
