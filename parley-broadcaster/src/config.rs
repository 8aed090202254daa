//! Room tuning knobs

use serde::{Deserialize, Serialize};

use crate::error::{BroadcasterError, Result};

/// Room and per-connection settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoomConfig {
    /// Events retained for late joiners
    pub history_capacity: usize,

    /// Frames queued per connection before new frames are dropped for it
    pub outbound_queue: usize,

    /// Dropped frames after which a stalled client is disconnected
    pub max_send_drops: u64,

    /// Largest inbound text frame accepted, in bytes
    pub max_frame_bytes: usize,

    /// Send a participant's own text messages back to them
    pub echo_text: bool,

    /// Send a participant's own voice clips back to them
    pub echo_voice: bool,
}

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            history_capacity: 50,
            outbound_queue: 256,
            max_send_drops: 100,
            max_frame_bytes: 16 * 1024 * 1024,
            echo_text: false,
            echo_voice: true,
        }
    }
}

impl RoomConfig {
    pub fn validate(&self) -> Result<()> {
        if self.history_capacity == 0 {
            return Err(BroadcasterError::InvalidConfig(
                "history_capacity must be at least 1".to_string(),
            ));
        }
        // A joiner is handed history and roster back to back.
        if self.outbound_queue < 2 {
            return Err(BroadcasterError::InvalidConfig(
                "outbound_queue must be at least 2".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(BroadcasterError::InvalidConfig(
                "max_frame_bytes must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    /// Size at which the transport stops reading a frame and drops the
    /// connection. Frames between `max_frame_bytes` and this limit get an
    /// error reply instead.
    pub fn hard_frame_limit(&self) -> usize {
        self.max_frame_bytes.saturating_mul(2)
    }
}
