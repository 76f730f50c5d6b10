//! Native host helpers: file loading and WAV export off the async runtime.

use std::path::Path;
use std::sync::Arc;

use tracing::info;

use crate::config::StudioConfig;
use crate::controls::ControlState;
use crate::decode::decode;
use crate::dsp::buffer::AudioBuffer;
use crate::dsp::renderer::render_wav;
use crate::error::StudioError;

/// Read and decode an audio file. Decoding runs on the blocking pool.
pub async fn load_path(path: impl AsRef<Path>) -> Result<AudioBuffer, StudioError> {
    let path = path.as_ref();
    let bytes = tokio::fs::read(path).await?;
    info!(path = %path.display(), bytes = bytes.len(), "loading audio file");
    tokio::task::spawn_blocking(move || decode(&bytes))
        .await
        .map_err(|e| StudioError::Task(e.to_string()))?
}

/// Render the processed source and write it as a WAV file.
///
/// Returns `Ok(false)` without touching the file system when the trim
/// window is empty.
pub async fn export_to_path(
    source: Arc<AudioBuffer>,
    controls: ControlState,
    config: StudioConfig,
    path: impl AsRef<Path>,
) -> Result<bool, StudioError> {
    let wav = tokio::task::spawn_blocking(move || render_wav(&source, &controls, &config))
        .await
        .map_err(|e| StudioError::Task(e.to_string()))?;
    let Some(wav) = wav else {
        return Ok(false);
    };
    let path = path.as_ref();
    tokio::fs::write(path, &wav).await?;
    info!(path = %path.display(), bytes = wav.len(), "export written");
    Ok(true)
}
