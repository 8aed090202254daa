//! Parley Voice Capture
//!
//! Push-to-talk voice clips for Parley chat clients.
//!
//! ## Features
//!
//! - Idempotent `start()`/`stop()` guarded by a single state machine
//! - At most one capture stream per client session
//! - Microphone failures surface to the caller and leave the recorder idle
//! - Native PipeWire/ALSA input via cpal (`microphone` feature)
//!
//! ## Architecture
//!
//! ```text
//! Microphone (cpal or test double)
//!   │
//!   ├─> ChunkSink (ordered PCM chunks, bounded clip size)
//!   │
//!   └─> VoiceRecorder ── stop() ──> ActiveCapture::finish (WAV via hound)
//!                                     └─> VoiceTransport::send_voice(clip)
//! ```

#[cfg(feature = "microphone")]
pub mod capture;
pub mod chunks;
pub mod error;
pub mod recorder;
pub mod wav;

#[cfg(feature = "microphone")]
pub use capture::{list_input_devices, CpalMicrophone, DeviceInfo};
pub use chunks::ChunkSink;
pub use error::{AudioError, Result};
pub use recorder::{
    ActiveCapture, Microphone, RecorderState, StartOutcome, StopOutcome, VoiceRecorder,
    VoiceTransport,
};

/// Default upper bound for one clip (8 MiB)
pub const DEFAULT_MAX_CLIP_BYTES: usize = 8 * 1024 * 1024;

/// Audio configuration
#[derive(Debug, Clone)]
pub struct AudioConfig {
    /// Device index (None = default device)
    pub device_index: Option<usize>,
    /// Frames per callback (None = backend default)
    pub blocksize: Option<u32>,
    /// Bytes kept per clip; later chunks are dropped
    pub max_clip_bytes: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            device_index: None,
            blocksize: None,
            max_clip_bytes: DEFAULT_MAX_CLIP_BYTES,
        }
    }
}

impl AudioConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_clip_bytes == 0 {
            return Err(AudioError::InvalidConfig(
                "max_clip_bytes must be greater than zero".to_string(),
            ));
        }
        if self.blocksize == Some(0) {
            return Err(AudioError::InvalidConfig(
                "blocksize must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
