//! Decoding uploaded files into an [`AudioBuffer`].
//!
//! RIFF/WAVE is always available through `hound`. MP3 needs the `native`
//! feature; browser hosts decode compressed formats themselves and hand the
//! PCM over instead.

use std::io::Cursor;

use tracing::{debug, warn};

use crate::dsp::buffer::AudioBuffer;
use crate::error::StudioError;

/// Decode the bytes of an uploaded file.
///
/// Nothing is kept on failure: the caller either gets a complete buffer or
/// a [`StudioError::DecodeFailure`].
pub fn decode(bytes: &[u8]) -> Result<AudioBuffer, StudioError> {
    let result = if bytes.is_empty() {
        Err(StudioError::DecodeFailure("empty file".to_string()))
    } else if is_wav(bytes) {
        decode_wav(bytes)
    } else {
        decode_compressed(bytes)
    };
    match result {
        Ok(buffer) if buffer.is_empty() => {
            warn!("decoded file contains no audio frames");
            Err(StudioError::DecodeFailure("no audio frames".to_string()))
        }
        Ok(buffer) => {
            debug!(
                channels = buffer.channel_count(),
                sample_rate = buffer.sample_rate(),
                seconds = buffer.duration(),
                "decoded source"
            );
            Ok(buffer)
        }
        Err(e) => {
            warn!(error = %e, "decode failed");
            Err(e)
        }
    }
}

fn is_wav(bytes: &[u8]) -> bool {
    bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WAVE"
}

fn decode_wav(bytes: &[u8]) -> Result<AudioBuffer, StudioError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|e| StudioError::DecodeFailure(e.to_string()))?;
    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        return Err(StudioError::DecodeFailure("WAV declares zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Int => {
            if !(1..=32).contains(&spec.bits_per_sample) {
                return Err(StudioError::DecodeFailure(format!(
                    "unsupported bit depth: {}",
                    spec.bits_per_sample
                )));
            }
            let scale = 1.0 / (1_i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>(),
    }
    .map_err(|e| StudioError::DecodeFailure(e.to_string()))?;

    Ok(AudioBuffer::from_interleaved(&interleaved, channels, spec.sample_rate))
}

#[cfg(feature = "native")]
fn decode_compressed(bytes: &[u8]) -> Result<AudioBuffer, StudioError> {
    use minimp3::{Decoder, Error, Frame};

    let mut decoder = Decoder::new(Cursor::new(bytes));
    let mut interleaved: Vec<f32> = Vec::new();
    let mut format: Option<(usize, u32)> = None;
    loop {
        match decoder.next_frame() {
            Ok(Frame {
                data,
                sample_rate,
                channels,
                ..
            }) => {
                // Later frames must match the first.
                let this = (channels, sample_rate.max(0) as u32);
                if *format.get_or_insert(this) != this {
                    return Err(StudioError::DecodeFailure(
                        "MP3 stream changes channel layout or sample rate".to_string(),
                    ));
                }
                interleaved.extend(data.iter().map(|&s| s as f32 / 32768.0));
            }
            Err(Error::Eof) => break,
            Err(Error::SkippedData) => continue,
            Err(e) => return Err(StudioError::DecodeFailure(e.to_string())),
        }
    }
    match format {
        Some((channels, sample_rate)) if channels > 0 => Ok(AudioBuffer::from_interleaved(
            &interleaved,
            channels,
            sample_rate,
        )),
        _ => Err(StudioError::DecodeFailure("unrecognized audio format".to_string())),
    }
}

#[cfg(not(feature = "native"))]
fn decode_compressed(_bytes: &[u8]) -> Result<AudioBuffer, StudioError> {
    Err(StudioError::DecodeFailure(
        "unrecognized audio format (only WAV is built in)".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsp::renderer::encode_wav;

    #[test]
    fn decodes_16_bit_pcm() {
        let original = AudioBuffer::new(vec![vec![0.5, -0.5, 0.0], vec![0.25, 1.0, -1.0]], 22050);
        let decoded = decode(&encode_wav(&original)).expect("valid WAV");
        assert_eq!(decoded.channel_count(), 2);
        assert_eq!(decoded.sample_rate(), 22050);
        assert_eq!(decoded.len(), 3);
        let left = decoded.channel(0).unwrap_or_default();
        assert!((left[0] - 0.5).abs() < 1e-3);
        assert!((left[1] + 0.5).abs() < 1e-3);
        let right = decoded.channel(1).unwrap_or_default();
        assert_eq!(right[2], -1.0);
    }

    #[test]
    fn decodes_float_wav() {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 48_000,
            bits_per_sample: 32,
            sample_format: hound::SampleFormat::Float,
        };
        let mut cursor = Cursor::new(Vec::new());
        {
            let mut writer = hound::WavWriter::new(&mut cursor, spec).expect("writer");
            for s in [0.1_f32, -0.7, 0.3] {
                writer.write_sample(s).expect("write");
            }
            writer.finalize().expect("finalize");
        }
        let decoded = decode(cursor.get_ref()).expect("valid float WAV");
        assert_eq!(decoded.channel(0), Some(&[0.1_f32, -0.7, 0.3][..]));
        assert_eq!(decoded.sample_rate(), 48_000);
    }

    #[test]
    fn empty_and_garbage_input_fail() {
        assert!(matches!(decode(&[]), Err(StudioError::DecodeFailure(_))));
        assert!(matches!(
            decode(b"definitely not audio at all"),
            Err(StudioError::DecodeFailure(_))
        ));
    }

    #[test]
    fn truncated_wav_fails() {
        let wav = encode_wav(&AudioBuffer::new(vec![vec![0.1; 64]], 8000));
        assert!(matches!(decode(&wav[..20]), Err(StudioError::DecodeFailure(_))));
    }

    #[test]
    fn wav_without_frames_fails() {
        let wav = encode_wav(&AudioBuffer::new(vec![Vec::new()], 8000));
        assert!(matches!(decode(&wav), Err(StudioError::DecodeFailure(_))));
    }
}
