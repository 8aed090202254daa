//! Archiving received voice clips to disk

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parley_broadcaster::ChatEvent;
use tokio::io::AsyncWriteExt;

use crate::error::Result;

/// File name for a clip: `<timestamp>-<sender>.wav`, safe on any filesystem
pub fn clip_file_name(event: &ChatEvent) -> Option<String> {
    let ChatEvent::Voice {
        username,
        timestamp,
        ..
    } = event
    else {
        return None;
    };

    let sender: String = username
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    Some(format!(
        "{}-{}.wav",
        timestamp.format("%Y%m%dT%H%M%S%.3fZ"),
        sender
    ))
}

/// Write a voice clip into `dir`. Non-voice events are ignored.
///
/// Existing files are never overwritten: a clip whose name is taken is
/// saved as `<name>-1.wav`, `<name>-2.wav` and so on.
pub async fn save_clip(dir: &Path, event: &ChatEvent) -> Result<Option<PathBuf>> {
    let (Some(name), ChatEvent::Voice { audio, .. }) = (clip_file_name(event), event) else {
        return Ok(None);
    };

    tokio::fs::create_dir_all(dir).await?;
    let stem = name.trim_end_matches(".wav");
    let mut attempt = 0u32;
    loop {
        let path = if attempt == 0 {
            dir.join(&name)
        } else {
            dir.join(format!("{}-{}.wav", stem, attempt))
        };

        let opened = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await;
        match opened {
            Ok(mut file) => {
                file.write_all(audio).await?;
                file.flush().await?;
                tracing::debug!("Saved voice clip to {}", path.display());
                return Ok(Some(path));
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}
