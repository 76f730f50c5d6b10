//! Offline renderer — runs the processing graph over the trimmed source
//! faster than realtime and encodes the result as WAV bytes.

use std::sync::Arc;

use tracing::{debug, instrument};

use crate::config::StudioConfig;
use crate::controls::ControlState;

use super::buffer::AudioBuffer;
use super::graph::{GraphContext, OutputTarget, PlaybackWindow, ProcessingGraph, RENDER_QUANTUM};

/// Channels of every export.
pub const EXPORT_CHANNELS: usize = 2;

/// Render the trimmed, processed source at `config.export_sample_rate`.
///
/// Returns `None` when the trim window is empty.
#[instrument(skip_all, fields(duration = source.duration()))]
pub fn render(
    source: &Arc<AudioBuffer>,
    controls: &ControlState,
    config: &StudioConfig,
) -> Option<AudioBuffer> {
    let window = controls.trim_window(source.duration());
    let rate = config.export_sample_rate;
    let frames = (window.len() * rate as f64).round() as usize;
    if frames == 0 {
        debug!(start = window.start, end = window.end, "empty trim window, nothing to render");
        return None;
    }

    let mut graph = ProcessingGraph::build(
        source.clone(),
        PlaybackWindow {
            offset: window.start,
            length: window.len(),
        },
        controls,
        GraphContext {
            sample_rate: rate as f64,
            target: OutputTarget::Offline,
        },
        config,
    );

    let mut left = vec![0.0_f32; frames];
    let mut right = vec![0.0_f32; frames];
    let mut done = 0;
    while done < frames {
        let end = (done + RENDER_QUANTUM).min(frames);
        let time = done as f64 / rate as f64;
        graph.process(time, &mut left[done..end], &mut right[done..end]);
        done = end;
    }
    debug!(frames, rate, "offline render complete");

    Some(AudioBuffer::new(vec![left, right], rate))
}

/// Render and encode in one step.
pub fn render_wav(
    source: &Arc<AudioBuffer>,
    controls: &ControlState,
    config: &StudioConfig,
) -> Option<Vec<u8>> {
    render(source, controls, config).map(|buffer| encode_wav(&buffer))
}

/// Convert a float sample to 16-bit PCM: clamp to [-1, 1], scale negatives
/// by 32768 and the rest by 32767, truncating toward zero.
#[inline]
pub fn sample_to_i16(sample: f32) -> i16 {
    let s = if sample.is_nan() { 0.0 } else { sample.clamp(-1.0, 1.0) };
    if s < 0.0 {
        (s * 32768.0) as i16
    } else {
        (s * 32767.0) as i16
    }
}

/// Encode a buffer as an interleaved 16-bit PCM WAV file.
pub fn encode_wav(buffer: &AudioBuffer) -> Vec<u8> {
    let channels = buffer.channel_count() as u16;
    let sample_rate = buffer.sample_rate();
    let bits_per_sample: u16 = 16;
    let byte_rate = sample_rate * channels as u32 * (bits_per_sample as u32 / 8);
    let block_align = channels * (bits_per_sample / 8);
    let data_size = (buffer.len() * channels as usize * 2) as u32;
    let file_size = 36 + data_size;

    let mut buf = Vec::with_capacity(44 + data_size as usize);

    // RIFF header
    buf.extend_from_slice(b"RIFF");
    buf.extend_from_slice(&file_size.to_le_bytes());
    buf.extend_from_slice(b"WAVE");

    // fmt chunk
    buf.extend_from_slice(b"fmt ");
    buf.extend_from_slice(&16u32.to_le_bytes()); // chunk size
    buf.extend_from_slice(&1u16.to_le_bytes()); // PCM format
    buf.extend_from_slice(&channels.to_le_bytes());
    buf.extend_from_slice(&sample_rate.to_le_bytes());
    buf.extend_from_slice(&byte_rate.to_le_bytes());
    buf.extend_from_slice(&block_align.to_le_bytes());
    buf.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    buf.extend_from_slice(b"data");
    buf.extend_from_slice(&data_size.to_le_bytes());
    for sample in buffer.interleaved() {
        buf.extend_from_slice(&sample_to_i16(sample).to_le_bytes());
    }

    buf
}
