//! Analysis tap — a pass-through stage that keeps the most recent samples
//! and answers spectrum and waveform queries on demand.
//!
//! Matches WebAudio's `AnalyserNode`: Blackman window, magnitude `|X| / N`,
//! temporal smoothing, then decibels mapped onto `0..=255`.

use std::f64::consts::PI;
use std::sync::Arc;

use realfft::num_complex::Complex;
use realfft::{RealFftPlanner, RealToComplex};

use crate::config::AnalyserSettings;

pub struct Analyser {
    settings: AnalyserSettings,
    /// Ring buffer of mono samples, `fft_size` long.
    history: Vec<f32>,
    write_pos: usize,
    window: Vec<f64>,
    smoothed: Vec<f64>,
    fft: Arc<dyn RealToComplex<f64>>,
    time_scratch: Vec<f64>,
    spectrum: Vec<Complex<f64>>,
}

impl std::fmt::Debug for Analyser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Analyser")
            .field("fft_size", &self.settings.fft_size)
            .field("smoothing", &self.settings.smoothing)
            .finish()
    }
}

/// Blackman window with WebAudio's alpha of 0.16.
fn blackman(n: usize) -> Vec<f64> {
    let alpha = 0.16;
    let a0 = 0.5 * (1.0 - alpha);
    let a1 = 0.5;
    let a2 = 0.5 * alpha;
    (0..n)
        .map(|i| {
            let x = i as f64 / n as f64;
            a0 - a1 * (2.0 * PI * x).cos() + a2 * (4.0 * PI * x).cos()
        })
        .collect()
}

impl Analyser {
    pub fn new(settings: AnalyserSettings) -> Self {
        let n = settings.fft_size.max(2);
        let fft = RealFftPlanner::<f64>::new().plan_fft_forward(n);
        Analyser {
            history: vec![0.0; n],
            write_pos: 0,
            window: blackman(n),
            smoothed: vec![0.0; n / 2],
            time_scratch: vec![0.0; n],
            spectrum: vec![Complex::new(0.0, 0.0); n / 2 + 1],
            fft,
            settings,
        }
    }

    pub fn fft_size(&self) -> usize {
        self.history.len()
    }

    /// Number of spectrum bins, half the FFT size.
    pub fn frequency_bin_count(&self) -> usize {
        self.history.len() / 2
    }

    /// Record a block. The audio passes through untouched.
    pub fn tap(&mut self, left: &[f32], right: &[f32]) {
        let n = self.history.len();
        for (&l, &r) in left.iter().zip(right) {
            self.history[self.write_pos] = 0.5 * (l + r);
            self.write_pos = (self.write_pos + 1) % n;
        }
    }

    /// Oldest-first iterator over the ring buffer.
    fn recent(&self) -> impl Iterator<Item = f32> + '_ {
        let (newer, older) = self.history.split_at(self.write_pos);
        older.iter().chain(newer.iter()).copied()
    }

    /// Fill `out` with byte-scaled spectrum magnitudes, one per bin.
    pub fn frequency_data(&mut self, out: &mut [u8]) {
        let n = self.history.len();
        let samples: Vec<f32> = self.recent().collect();
        for ((dst, &s), &w) in self.time_scratch.iter_mut().zip(&samples).zip(&self.window) {
            *dst = s as f64 * w;
        }
        let done = self.fft.process(&mut self.time_scratch, &mut self.spectrum);
        debug_assert!(done.is_ok(), "analysis buffers must match the plan");

        let tau = self.settings.smoothing;
        let scale = 1.0 / n as f64;
        for (prev, bin) in self.smoothed.iter_mut().zip(&self.spectrum) {
            let magnitude = bin.norm() * scale;
            let next = tau * *prev + (1.0 - tau) * magnitude;
            *prev = if next.is_finite() { next } else { 0.0 };
        }

        let min_db = self.settings.min_decibels;
        let range = self.settings.max_decibels - min_db;
        for (byte, &magnitude) in out.iter_mut().zip(&self.smoothed) {
            let db = if magnitude > 0.0 {
                20.0 * magnitude.log10()
            } else {
                f64::NEG_INFINITY
            };
            let scaled = (255.0 / range * (db - min_db)).floor();
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }

    /// Fill `out` with the most recent waveform as bytes, 128 being silence.
    pub fn time_domain_data(&self, out: &mut [u8]) {
        let n = self.history.len();
        let skip = n.saturating_sub(out.len());
        for (byte, s) in out.iter_mut().zip(self.recent().skip(skip)) {
            let scaled = (128.0 * (1.0 + s as f64)).floor();
            *byte = scaled.clamp(0.0, 255.0) as u8;
        }
    }
}
