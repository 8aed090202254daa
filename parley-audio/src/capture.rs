//! Microphone capture with cpal
//!
//! `cpal::Stream` is not `Send`, so each recording owns a dedicated thread
//! that builds the stream, reports readiness, and parks until told to stop.

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::StreamConfig;
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use tokio::sync::oneshot;

use crate::chunks::ChunkSink;
use crate::error::{AudioError, Result};
use crate::recorder::{ActiveCapture, Microphone};
use crate::wav;
use crate::AudioConfig;

/// Audio input device information
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub index: usize,
    pub name: String,
    pub is_default: bool,
    pub max_input_channels: u16,
    pub default_sample_rate: u32,
}

/// List available input devices
pub fn list_input_devices() -> Result<Vec<DeviceInfo>> {
    let host = cpal::default_host();
    let default_name = host.default_input_device().and_then(|d| d.name().ok());

    let mut devices = Vec::new();
    for (index, device) in host
        .input_devices()
        .map_err(|e| AudioError::device(format!("Failed to enumerate devices: {}", e)))?
        .enumerate()
    {
        let name = device
            .name()
            .unwrap_or_else(|_| format!("Unknown Device {}", index));
        let (max_input_channels, default_sample_rate) = device
            .default_input_config()
            .map(|c| (c.channels(), c.sample_rate().0))
            .unwrap_or((0, 0));

        devices.push(DeviceInfo {
            index,
            is_default: default_name.as_deref() == Some(name.as_str()),
            name,
            max_input_channels,
            default_sample_rate,
        });
    }

    Ok(devices)
}

/// The system microphone, or the device at `AudioConfig::device_index`
#[derive(Debug, Clone)]
pub struct CpalMicrophone {
    device_index: Option<usize>,
    blocksize: Option<u32>,
}

impl CpalMicrophone {
    pub fn new(config: &AudioConfig) -> Self {
        Self {
            device_index: config.device_index,
            blocksize: config.blocksize,
        }
    }
}

struct CpalCapture {
    stop_tx: std_mpsc::Sender<()>,
    thread: Option<JoinHandle<()>>,
    sample_rate: u32,
}

impl ActiveCapture for CpalCapture {
    fn close(&mut self) {
        let _ = self.stop_tx.send(());
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Audio capture thread panicked");
            }
        }
    }

    fn finish(self: Box<Self>, payload: Vec<u8>) -> Result<Vec<u8>> {
        wav::encode_wav(&payload, self.sample_rate)
    }
}

impl Drop for CpalCapture {
    fn drop(&mut self) {
        self.close();
    }
}

#[async_trait]
impl Microphone for CpalMicrophone {
    async fn open(&self, sink: ChunkSink) -> Result<Box<dyn ActiveCapture>> {
        let (ready_tx, ready_rx) = oneshot::channel();
        let (stop_tx, stop_rx) = std_mpsc::channel();
        let device_index = self.device_index;
        let blocksize = self.blocksize;

        let thread = std::thread::Builder::new()
            .name("parley-capture".to_string())
            .spawn(move || {
                let (stream, sample_rate) = match build_stream(device_index, blocksize, sink) {
                    Ok(built) => built,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                if ready_tx.send(Ok(sample_rate)).is_err() {
                    return;
                }
                let _ = stop_rx.recv();
                drop(stream);
            })
            .map_err(|e| AudioError::capture(format!("Failed to spawn capture thread: {}", e)))?;

        match ready_rx.await {
            Ok(Ok(sample_rate)) => Ok(Box::new(CpalCapture {
                stop_tx,
                thread: Some(thread),
                sample_rate,
            })),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(AudioError::capture("Capture thread exited before ready"))
            }
        }
    }
}

fn build_stream(
    device_index: Option<usize>,
    blocksize: Option<u32>,
    sink: ChunkSink,
) -> Result<(cpal::Stream, u32)> {
    let host = cpal::default_host();

    let device = if let Some(index) = device_index {
        tracing::info!("Selecting input device index: {}", index);
        host.input_devices()
            .map_err(|e| AudioError::device(format!("Failed to enumerate devices: {}", e)))?
            .nth(index)
            .ok_or_else(|| AudioError::capture(format!("Device index {} not found", index)))?
    } else {
        host.default_input_device()
            .ok_or_else(|| AudioError::capture("No default input device found"))?
    };

    let device_name = device.name().unwrap_or_else(|_| "Unknown".to_string());
    let supported = device
        .default_input_config()
        .map_err(|e| AudioError::capture(format!("Failed to get device config: {}", e)))?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();

    tracing::info!(
        "🎤 Capturing from {} ({} Hz, {} ch -> mono)",
        device_name,
        sample_rate,
        channels
    );

    let stream_config = StreamConfig {
        channels,
        sample_rate: cpal::SampleRate(sample_rate),
        buffer_size: blocksize
            .map(cpal::BufferSize::Fixed)
            .unwrap_or(cpal::BufferSize::Default),
    };

    let stream = device
        .build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = wav::first_channel(data, channels);
                sink.push(wav::encode_pcm16(&mono));
            },
            |err| {
                tracing::error!("Audio stream error: {}", err);
            },
            None,
        )
        .map_err(|e| AudioError::capture(format!("Failed to build stream: {}", e)))?;

    stream
        .play()
        .map_err(|e| AudioError::stream(format!("Failed to start stream: {}", e)))?;

    Ok((stream, sample_rate))
}
