//! Voice clip lifecycle: `Idle -> Recording -> Idle`
//!
//! `start()` acquires the microphone (the only suspension point before
//! recording) and `stop()` finalizes the clip and hands it to the transport.
//! Duplicate signals from overlapping input events are harmless: a second
//! `start()` never opens a second stream and `stop()` while idle does nothing.

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::chunks::ChunkSink;
use crate::error::{AudioError, Result};
use crate::AudioConfig;

/// Microphone collaborator
#[async_trait]
pub trait Microphone: Send + Sync {
    /// Acquire the input and start pushing encoded chunks into `sink`.
    ///
    /// Fails when permission is denied or no device is usable.
    async fn open(&self, sink: ChunkSink) -> Result<Box<dyn ActiveCapture>>;
}

/// A running capture stream
pub trait ActiveCapture: Send {
    /// Stop capturing. Any trailing chunk must be in the sink on return.
    fn close(&mut self);

    /// Turn the collected chunks into the clip sent over the wire
    fn finish(self: Box<Self>, payload: Vec<u8>) -> Result<Vec<u8>> {
        Ok(payload)
    }
}

/// Where finished clips go
#[async_trait]
pub trait VoiceTransport: Send + Sync {
    async fn send_voice(&self, payload: Vec<u8>) -> Result<()>;
}

/// Observable recorder state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    /// `start()` is waiting on the microphone
    Acquiring,
    Recording,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A recording is already running or being acquired
    AlreadyActive,
    /// `stop()` arrived while the microphone was being acquired
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopOutcome {
    /// Nothing was recording
    NotRecording,
    /// Cancelled a pending acquisition; nothing was sent
    Cancelled,
    /// Recorded no audio; nothing was sent
    Empty,
    /// Clip handed to the transport
    Sent { bytes: usize },
}

enum Phase {
    Idle,
    Acquiring {
        cancelled: bool,
    },
    Recording {
        capture: Box<dyn ActiveCapture>,
        sink: ChunkSink,
    },
}

/// Push-to-talk recorder for one client session
pub struct VoiceRecorder<M, T> {
    microphone: M,
    transport: T,
    max_clip_bytes: usize,
    phase: Mutex<Phase>,
}

impl<M: Microphone, T: VoiceTransport> VoiceRecorder<M, T> {
    pub fn new(microphone: M, transport: T, config: &AudioConfig) -> Self {
        Self {
            microphone,
            transport,
            max_clip_bytes: config.max_clip_bytes,
            phase: Mutex::new(Phase::Idle),
        }
    }

    pub fn state(&self) -> RecorderState {
        match *self.phase.lock() {
            Phase::Idle => RecorderState::Idle,
            Phase::Acquiring { .. } => RecorderState::Acquiring,
            Phase::Recording { .. } => RecorderState::Recording,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.state() == RecorderState::Recording
    }

    /// Begin a clip.
    ///
    /// On microphone failure the recorder is back in `Idle` and the error is
    /// returned; no event is ever sent for a failed capture.
    pub async fn start(&self) -> Result<StartOutcome> {
        {
            let mut phase = self.phase.lock();
            match &mut *phase {
                Phase::Idle => *phase = Phase::Acquiring { cancelled: false },
                Phase::Acquiring { cancelled } => {
                    // A start after a cancelling stop revives the pending acquisition.
                    *cancelled = false;
                    return Ok(StartOutcome::AlreadyActive);
                }
                Phase::Recording { .. } => return Ok(StartOutcome::AlreadyActive),
            }
        }

        // Dropping this future mid-acquisition must not leave `Acquiring` behind.
        let mut guard = AcquireGuard {
            phase: &self.phase,
            armed: true,
        };

        let sink = ChunkSink::new(self.max_clip_bytes);
        let opened = self.microphone.open(sink.clone()).await;

        guard.armed = false;
        let mut phase = self.phase.lock();
        let cancelled = matches!(*phase, Phase::Acquiring { cancelled: true });
        match opened {
            Err(e) => {
                *phase = Phase::Idle;
                tracing::warn!("Voice capture failed: {}", e);
                Err(match e {
                    AudioError::CaptureFailed(_) => e,
                    other => AudioError::capture(other.to_string()),
                })
            }
            Ok(mut capture) if cancelled => {
                *phase = Phase::Idle;
                drop(phase);
                capture.close();
                tracing::debug!("Voice capture cancelled during acquisition");
                Ok(StartOutcome::Cancelled)
            }
            Ok(capture) => {
                *phase = Phase::Recording { capture, sink };
                tracing::info!("Voice recording started");
                Ok(StartOutcome::Started)
            }
        }
    }

    /// Finish the clip and send it.
    ///
    /// The recorder is `Idle` again before the transport is awaited, so a new
    /// clip can start while this one is in flight.
    pub async fn stop(&self) -> Result<StopOutcome> {
        let (mut capture, sink) = {
            let mut phase = self.phase.lock();
            match std::mem::replace(&mut *phase, Phase::Idle) {
                Phase::Idle => return Ok(StopOutcome::NotRecording),
                Phase::Acquiring { .. } => {
                    *phase = Phase::Acquiring { cancelled: true };
                    return Ok(StopOutcome::Cancelled);
                }
                Phase::Recording { capture, sink } => (capture, sink),
            }
        };

        capture.close();
        if sink.dropped_bytes() > 0 {
            tracing::warn!(
                dropped = sink.dropped_bytes(),
                "Voice clip hit size limit, tail dropped"
            );
        }
        let payload = sink.take_payload();
        if payload.is_empty() {
            tracing::debug!("Voice recording stopped with no audio");
            return Ok(StopOutcome::Empty);
        }

        let payload = capture.finish(payload)?;
        let bytes = payload.len();
        self.transport.send_voice(payload).await?;
        tracing::info!(bytes, "Voice message sent");
        Ok(StopOutcome::Sent { bytes })
    }
}

/// Puts an abandoned acquisition back to `Idle`
struct AcquireGuard<'a> {
    phase: &'a Mutex<Phase>,
    armed: bool,
}

impl Drop for AcquireGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut phase = self.phase.lock();
        if matches!(*phase, Phase::Acquiring { .. }) {
            *phase = Phase::Idle;
            tracing::debug!("Voice capture abandoned during acquisition");
        }
    }
}
