//! User-facing control values and the trim window derived from them.

use serde::{Deserialize, Serialize};

/// Number of graphic equalizer bands.
pub const EQ_BAND_COUNT: usize = 23;

/// Center frequency of each equalizer band, in Hz. `eq_bands[i]` always
/// drives `FREQS[i]`.
pub const FREQS: [f64; EQ_BAND_COUNT] = [
    20.0, 25.0, 31.5, 40.0, 50.0, 63.0, 80.0, 100.0, 125.0, 160.0, 200.0, 250.0, 315.0, 400.0,
    500.0, 630.0, 800.0, 1000.0, 1250.0, 1600.0, 2000.0, 2500.0, 3150.0,
];

/// Neutral position of every 0–100 slider.
pub const NEUTRAL: f64 = 50.0;

/// Snapshot of every control on the studio surface.
///
/// Owned by the UI and passed by value into the core. Sliders are nominally
/// `0..=100`; the mapper clamps them again since a stale snapshot can race
/// an in-flight play.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlState {
    /// 50 = no pitch shift.
    pub pitch: f64,
    pub booster: bool,
    pub room_size: f64,
    pub full_room: bool,
    /// 50 = flat.
    pub bass: f64,
    /// 50 = flat.
    pub treble: f64,
    pub beautify: bool,
    /// Stronger compression preset; wins over `beautify`.
    pub mastered: bool,
    pub eq_bands: [f64; EQ_BAND_COUNT],
    /// Trim start as a percentage of the source duration.
    pub cut_start: f64,
    /// Trim end as a percentage of the source duration.
    pub cut_end: f64,
}

impl Default for ControlState {
    fn default() -> Self {
        Self {
            pitch: NEUTRAL,
            booster: false,
            room_size: 0.0,
            full_room: false,
            bass: NEUTRAL,
            treble: NEUTRAL,
            beautify: false,
            mastered: false,
            eq_bands: [NEUTRAL; EQ_BAND_COUNT],
            cut_start: 0.0,
            cut_end: 100.0,
        }
    }
}

impl ControlState {
    /// Copy with every slider forced into `0..=100`. NaN collapses to neutral.
    pub fn clamped(&self) -> Self {
        let mut c = self.clone();
        c.pitch = clamp_percent(c.pitch, NEUTRAL);
        c.room_size = clamp_percent(c.room_size, 0.0);
        c.bass = clamp_percent(c.bass, NEUTRAL);
        c.treble = clamp_percent(c.treble, NEUTRAL);
        for band in c.eq_bands.iter_mut() {
            *band = clamp_percent(*band, NEUTRAL);
        }
        c.cut_start = clamp_percent(c.cut_start, 0.0);
        c.cut_end = clamp_percent(c.cut_end, 100.0);
        c
    }

    /// The trim window in seconds of a source lasting `duration` seconds.
    pub fn trim_window(&self, duration: f64) -> TrimWindow {
        let c = self.clamped();
        TrimWindow {
            start: c.cut_start / 100.0 * duration,
            end: c.cut_end / 100.0 * duration,
        }
    }
}

fn clamp_percent(value: f64, fallback: f64) -> f64 {
    if value.is_nan() {
        fallback
    } else {
        value.clamp(0.0, 100.0)
    }
}

/// Trimmed region of the source, in full-source seconds.
///
/// `start < end` is not guaranteed: an inverted cut produces a window whose
/// [`len`](Self::len) is zero.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrimWindow {
    pub start: f64,
    pub end: f64,
}

impl TrimWindow {
    /// Length of the window, never negative.
    pub fn len(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 0.0
    }

    /// Where playback resumes given the last paused position: the paused
    /// position itself if it lies in `[start, end)`, otherwise `start`.
    pub fn resume_offset(&self, paused_at: f64) -> f64 {
        if paused_at >= self.start && paused_at < self.end {
            paused_at
        } else {
            self.start
        }
    }

    /// Playable length from `offset` to the end of the window.
    pub fn length_from(&self, offset: f64) -> f64 {
        (self.end - offset).max(0.0)
    }
}
