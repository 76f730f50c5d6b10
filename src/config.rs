//! Studio configuration — timing, export format, reverb, and analyser knobs.
//!
//! Every field has a default, so hosts only send the values they override:
//!
//! ```json
//! { "rampSeconds": 0.05, "reverb": { "seconds": 3.0 } }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

/// Top-level configuration for a [`Session`](crate::session::Session).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StudioConfig {
    /// Length of the linear ramp used for live parameter changes, in seconds.
    pub ramp_seconds: f64,
    /// Interval between transport position polls, in seconds.
    pub poll_interval: f64,
    /// Sample rate of exported audio.
    pub export_sample_rate: u32,
    pub reverb: ReverbSettings,
    pub analyser: AnalyserSettings,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            ramp_seconds: 0.1,
            poll_interval: 0.05,
            export_sample_rate: 44_100,
            reverb: ReverbSettings::default(),
            analyser: AnalyserSettings::default(),
        }
    }
}

/// Shape of the synthesized reverb impulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ReverbSettings {
    /// Impulse length in seconds.
    pub seconds: f64,
    /// Exponent of the `(1 - t)^decay` envelope.
    pub decay: f64,
    /// Noise seed. Preview and export share it so both hear the same room.
    pub seed: u64,
}

impl Default for ReverbSettings {
    fn default() -> Self {
        Self {
            seconds: 2.0,
            decay: 4.0,
            seed: 0x5EED_0F_B0A7,
        }
    }
}

/// Spectrum analyser settings, mirroring WebAudio's `AnalyserNode`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnalyserSettings {
    pub fft_size: usize,
    /// Temporal smoothing between snapshots (0 = none, 1 = frozen).
    pub smoothing: f64,
    pub min_decibels: f64,
    pub max_decibels: f64,
}

impl Default for AnalyserSettings {
    fn default() -> Self {
        Self {
            fft_size: 2048,
            smoothing: 0.8,
            min_decibels: -100.0,
            max_decibels: -30.0,
        }
    }
}

impl StudioConfig {
    /// Parse a JSON configuration, filling omitted fields with defaults.
    pub fn from_json(json: &str) -> Result<Self, StudioError> {
        let config: StudioConfig =
            serde_json::from_str(json).map_err(|e| StudioError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the processing graph cannot run with.
    pub fn validate(&self) -> Result<(), StudioError> {
        let fft_size = self.analyser.fft_size;
        if !fft_size.is_power_of_two() || !(32..=32_768).contains(&fft_size) {
            return Err(StudioError::Config(format!(
                "analyser fftSize must be a power of two in 32..=32768, got {fft_size}"
            )));
        }
        if !(0.0..=1.0).contains(&self.analyser.smoothing) {
            return Err(StudioError::Config(format!(
                "analyser smoothing must be within 0..=1, got {}",
                self.analyser.smoothing
            )));
        }
        if self.analyser.min_decibels >= self.analyser.max_decibels {
            return Err(StudioError::Config(
                "analyser minDecibels must be below maxDecibels".to_string(),
            ));
        }
        if !(self.reverb.seconds > 0.0 && self.reverb.seconds <= 10.0) {
            return Err(StudioError::Config(format!(
                "reverb seconds must be within (0, 10], got {}",
                self.reverb.seconds
            )));
        }
        if !(3_000..=768_000).contains(&self.export_sample_rate) {
            return Err(StudioError::Config(format!(
                "exportSampleRate {} is outside 3000..=768000",
                self.export_sample_rate
            )));
        }
        if self.ramp_seconds < 0.0 || self.poll_interval <= 0.0 {
            return Err(StudioError::Config(
                "rampSeconds must be >= 0 and pollInterval > 0".to_string(),
            ));
        }
        Ok(())
    }
}
