//! Buffer source reader — plays a window of the decoded upload.
//!
//! Reads the shared buffer with linear interpolation at a rate set by the
//! detune parameter and the buffer/context sample-rate ratio.

use std::sync::Arc;

use super::buffer::AudioBuffer;
use super::param::AudioParam;

/// Lifecycle of a reader. Once it leaves `Playing` it never plays again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderState {
    Idle,
    Playing,
    /// Ran off the end of its window on its own.
    Ended,
    /// Stopped from outside before reaching the end.
    Halted,
}

#[derive(Debug, Clone)]
pub struct SourceReader {
    buffer: Arc<AudioBuffer>,
    /// Pitch shift in cents (±2400 allowed).
    pub detune: AudioParam,
    /// Read position in buffer frames (fractional).
    position: f64,
    /// Position at which the window ends, in buffer frames.
    end: f64,
    /// Buffer sample rate / context sample rate.
    rate_ratio: f64,
    state: ReaderState,
}

impl SourceReader {
    pub fn new(buffer: Arc<AudioBuffer>, context_rate: f64) -> Self {
        let rate_ratio = if context_rate > 0.0 {
            buffer.sample_rate() as f64 / context_rate
        } else {
            1.0
        };
        SourceReader {
            buffer,
            detune: AudioParam::new(0.0, -2400.0, 2400.0),
            position: 0.0,
            end: 0.0,
            rate_ratio,
            state: ReaderState::Idle,
        }
    }

    pub fn state(&self) -> ReaderState {
        self.state
    }

    /// True only if the reader finished its window by itself.
    pub fn has_ended(&self) -> bool {
        self.state == ReaderState::Ended
    }

    /// Start reading at `offset` seconds for at most `duration` seconds of
    /// buffer time. Only an idle reader can start.
    pub fn start(&mut self, offset: f64, duration: f64) {
        if self.state != ReaderState::Idle {
            return;
        }
        let rate = self.buffer.sample_rate() as f64;
        let len = self.buffer.len() as f64;
        self.position = (offset.max(0.0) * rate).min(len);
        self.end = ((offset.max(0.0) + duration.max(0.0)) * rate).min(len);
        self.state = if self.position >= self.end {
            ReaderState::Ended
        } else {
            ReaderState::Playing
        };
    }

    /// Stop the reader. Safe to call in any state.
    pub fn halt(&mut self) {
        if matches!(self.state, ReaderState::Idle | ReaderState::Playing) {
            self.state = ReaderState::Halted;
        }
    }

    /// Fill a block; silence once the reader is not playing.
    pub fn render(&mut self, time: f64, left: &mut [f32], right: &mut [f32]) {
        if self.state != ReaderState::Playing {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }
        let step = 2.0_f64.powf(self.detune.value_at(time) / 1200.0) * self.rate_ratio;
        for (l, r) in left.iter_mut().zip(right.iter_mut()) {
            if self.state != ReaderState::Playing {
                *l = 0.0;
                *r = 0.0;
                continue;
            }
            let (a, b) = self.buffer.frame_at(self.position);
            *l = a;
            *r = b;
            self.position += step;
            if self.position >= self.end {
                self.state = ReaderState::Ended;
            }
        }
    }
}
