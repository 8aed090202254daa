//! PCM and WAV encoding for voice clips
//!
//! Capture pushes raw 16-bit little-endian mono PCM while recording; the
//! finished clip is wrapped in a WAV container once its length is known.

use std::io::Cursor;

use crate::error::{AudioError, Result};

/// Convert float samples in `[-1.0, 1.0]` to 16-bit little-endian PCM.
///
/// Out-of-range input is clipped.
pub fn encode_pcm16(samples: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        out.extend_from_slice(&value.to_le_bytes());
    }
    out
}

/// Keep the first channel of each interleaved frame.
///
/// Averaging would halve the amplitude of a mic wired to one channel.
pub fn first_channel(data: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return data.to_vec();
    }
    data.chunks(channels as usize).map(|frame| frame[0]).collect()
}

/// Wrap mono 16-bit PCM in a finalized WAV file
pub fn encode_wav(pcm: &[u8], sample_rate: u32) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::with_capacity(pcm.len() + 44));
    let mut writer = hound::WavWriter::new(&mut cursor, spec)
        .map_err(|e| AudioError::encoding(format!("Failed to start WAV clip: {}", e)))?;
    for pair in pcm.chunks_exact(2) {
        writer
            .write_sample(i16::from_le_bytes([pair[0], pair[1]]))
            .map_err(|e| AudioError::encoding(format!("Failed to write sample: {}", e)))?;
    }
    writer
        .finalize()
        .map_err(|e| AudioError::encoding(format!("Failed to finalize WAV clip: {}", e)))?;

    Ok(cursor.into_inner())
}
