//! Planar sample buffers — the decoded upload and the rendered export.

/// An immutable, fully decoded multichannel buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    channels: Vec<Vec<f32>>,
    sample_rate: u32,
}

impl AudioBuffer {
    /// Build from planar channels. Channels are truncated to the shortest one.
    pub fn new(mut channels: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let frames = channels.iter().map(Vec::len).min().unwrap_or(0);
        for c in channels.iter_mut() {
            c.truncate(frames);
        }
        AudioBuffer {
            channels,
            sample_rate,
        }
    }

    /// Split interleaved samples into planar channels.
    pub fn from_interleaved(samples: &[f32], channel_count: usize, sample_rate: u32) -> Self {
        if channel_count == 0 {
            return Self::new(Vec::new(), sample_rate);
        }
        let frames = samples.len() / channel_count;
        let mut channels = vec![Vec::with_capacity(frames); channel_count];
        for frame in samples.chunks_exact(channel_count) {
            for (channel, &s) in channels.iter_mut().zip(frame) {
                channel.push(s);
            }
        }
        Self::new(channels, sample_rate)
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Frames per channel.
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        if self.sample_rate == 0 {
            0.0
        } else {
            self.len() as f64 / self.sample_rate as f64
        }
    }

    /// Read a stereo frame with linear interpolation at a fractional position.
    ///
    /// Mono is duplicated to both sides; beyond two channels only the first
    /// two are heard.
    pub fn frame_at(&self, position: f64) -> (f32, f32) {
        let len = self.len();
        if len == 0 || position < 0.0 {
            return (0.0, 0.0);
        }
        let idx = position as usize;
        if idx >= len {
            return (0.0, 0.0);
        }
        let frac = (position - idx as f64) as f32;
        let read = |c: &[f32]| {
            if idx + 1 < len {
                c[idx] * (1.0 - frac) + c[idx + 1] * frac
            } else {
                c[idx]
            }
        };
        let left = read(self.channels[0].as_slice());
        let right = self.channels.get(1).map_or(left, |c| read(c.as_slice()));
        (left, right)
    }

    /// Peak magnitude per bucket across all channels, for waveform overviews.
    pub fn peaks(&self, buckets: usize) -> Vec<f32> {
        let len = self.len();
        if buckets == 0 || len == 0 {
            return vec![0.0; buckets];
        }
        (0..buckets)
            .map(|b| {
                let start = b * len / buckets;
                let end = ((b + 1) * len / buckets).max(start + 1).min(len);
                self.channels
                    .iter()
                    .flat_map(|c| c[start..end].iter())
                    .fold(0.0_f32, |m, &s| m.max(s.abs()))
            })
            .collect()
    }

    /// Interleave into one frame-ordered vector.
    pub fn interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.channel_count());
        for i in 0..self.len() {
            for c in &self.channels {
                out.push(c[i]);
            }
        }
        out
    }
}
