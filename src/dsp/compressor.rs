//! Compressor effect — dynamics processing for vocal leveling.
//!
//! Implements a feed-forward compressor with threshold, ratio and knee
//! matching the WebAudio DynamicsCompressorNode; attack and release stay at
//! its defaults.

/// The discrete settings a compressor preset selects.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressorPreset {
    /// Threshold in dB.
    pub threshold: f64,
    /// Compression ratio (e.g., 12.0 = 12:1).
    pub ratio: f64,
    /// Knee width in dB.
    pub knee: f64,
}

impl CompressorPreset {
    /// Ratio 1 at 0 dB: the signal passes untouched.
    pub const BYPASS: CompressorPreset = CompressorPreset {
        threshold: 0.0,
        ratio: 1.0,
        knee: 30.0,
    };
}

/// A stereo dynamics compressor.
#[derive(Debug, Clone)]
pub struct Compressor {
    /// Threshold in dB (-100 to 0).
    pub threshold: f64,
    /// Compression ratio (1 to 20).
    pub ratio: f64,
    /// Knee width in dB (0 = hard knee, up to 40).
    pub knee: f64,

    attack_coef: f64,
    release_coef: f64,
    envelope: f64, // Current envelope level (linear)
}

/// WebAudio's fixed attack and release, in seconds. Presets never change them.
pub const ATTACK_SECONDS: f64 = 0.003;
pub const RELEASE_SECONDS: f64 = 0.25;

impl Compressor {
    /// Create a compressor with WebAudio's default settings.
    pub fn new(sample_rate: f64) -> Self {
        Self {
            threshold: -24.0,
            ratio: 12.0,
            knee: 30.0,
            attack_coef: (-1.0 / (ATTACK_SECONDS * sample_rate)).exp(),
            release_coef: (-1.0 / (RELEASE_SECONDS * sample_rate)).exp(),
            envelope: 0.0,
        }
    }

    /// Apply a preset, clamped to the ranges WebAudio allows.
    pub fn set_preset(&mut self, preset: CompressorPreset) {
        self.threshold = preset.threshold.clamp(-100.0, 0.0);
        self.ratio = preset.ratio.clamp(1.0, 20.0);
        self.knee = preset.knee.clamp(0.0, 40.0);
    }

    pub fn preset(&self) -> CompressorPreset {
        CompressorPreset {
            threshold: self.threshold,
            ratio: self.ratio,
            knee: self.knee,
        }
    }

    /// Convert linear amplitude to dB.
    #[inline]
    fn linear_to_db(linear: f64) -> f64 {
        if linear <= 0.0 {
            -120.0
        } else {
            20.0 * linear.log10()
        }
    }

    /// Convert dB to linear amplitude.
    #[inline]
    fn db_to_linear(db: f64) -> f64 {
        10.0_f64.powf(db / 20.0)
    }

    /// Compute gain reduction for a given input level (in dB).
    #[inline]
    fn compute_gain(&self, input_db: f64) -> f64 {
        let threshold = self.threshold;
        let slope = 1.0 - 1.0 / self.ratio;
        let knee = self.knee;

        if knee <= 0.0 {
            if input_db <= threshold {
                0.0
            } else {
                (threshold - input_db) * slope
            }
        } else {
            let half_knee = knee / 2.0;
            let knee_start = threshold - half_knee;
            let knee_end = threshold + half_knee;

            if input_db <= knee_start {
                0.0
            } else if input_db >= knee_end {
                (threshold - input_db) * slope
            } else {
                // In the knee region - quadratic interpolation
                let x = input_db - knee_start;
                let knee_factor = x / knee;
                -knee_factor * knee_factor * slope * half_knee
            }
        }
    }

    /// Process a stereo sample pair.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        // Peak of L/R drives a single linked envelope
        let input_level = left.abs().max(right.abs()) as f64;

        let coef = if input_level > self.envelope {
            self.attack_coef
        } else {
            self.release_coef
        };
        self.envelope = coef * self.envelope + (1.0 - coef) * input_level;

        let reduction_db = self.compute_gain(Self::linear_to_db(self.envelope));
        if reduction_db == 0.0 {
            return (left, right);
        }
        let gain = Self::db_to_linear(reduction_db) as f32;
        (left * gain, right * gain)
    }

    /// Process a block of stereo audio in-place.
    pub fn process_block(&mut self, left: &mut [f32], right: &mut [f32]) {
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            let (out_l, out_r) = self.process(*l, *r);
            *l = out_l;
            *r = out_r;
        }
    }
}
