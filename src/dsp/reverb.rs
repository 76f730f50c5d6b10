//! Reverb effect — convolution with a synthesized room impulse.
//!
//! The impulse is decaying white noise. The convolver is a uniformly
//! partitioned overlap-add FFT engine with a fixed latency of one partition.

use std::sync::Arc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use realfft::num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

/// Samples per convolution partition; also the convolver's latency.
pub const PARTITION_SIZE: usize = 512;

// WebAudio ConvolverNode normalization constants
const GAIN_CALIBRATION: f32 = 0.001_25;
const GAIN_CALIBRATION_SAMPLE_RATE: f32 = 44_100.0;
const MIN_POWER: f32 = 0.000_125;

/// A multichannel impulse response.
#[derive(Debug, Clone, PartialEq)]
pub struct ImpulseBuffer {
    pub channels: Vec<Vec<f32>>,
    pub sample_rate: u32,
}

impl ImpulseBuffer {
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Scale applied when the convolver normalizes this impulse, matching
    /// WebAudio's `normalize = true` behavior.
    pub fn normalization_scale(&self) -> f32 {
        let len = self.len();
        if len == 0 || self.channels.is_empty() {
            return 1.0;
        }
        let energy: f32 = self
            .channels
            .iter()
            .flat_map(|c| c.iter())
            .map(|&s| s * s)
            .sum();
        let mut power = (energy / (self.channels.len() * len) as f32).sqrt();
        if !power.is_finite() || power < MIN_POWER {
            power = MIN_POWER;
        }
        let mut scale = GAIN_CALIBRATION / power;
        if self.sample_rate > 0 {
            scale *= GAIN_CALIBRATION_SAMPLE_RATE / self.sample_rate as f32;
        }
        if self.channels.len() == 4 {
            scale *= 0.5;
        }
        scale
    }
}

/// Synthesize a reverb impulse: per channel, `len = sample_rate * seconds`
/// samples of uniform noise in `[-1, 1)` shaped by `(1 - i/len)^decay`.
///
/// The noise comes from `seed`, so equal arguments give equal impulses.
pub fn impulse_response(
    seconds: f64,
    sample_rate: u32,
    channels: usize,
    decay: f64,
    seed: u64,
) -> ImpulseBuffer {
    let len = (sample_rate as f64 * seconds.max(0.0)).round() as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    let channels = (0..channels)
        .map(|_| {
            (0..len)
                .map(|i| {
                    let envelope = (1.0 - i as f64 / len as f64).powf(decay);
                    rng.gen_range(-1.0_f32..1.0) * envelope as f32
                })
                .collect()
        })
        .collect();
    ImpulseBuffer {
        channels,
        sample_rate,
    }
}

/// One channel of partitioned convolution.
struct ConvolutionChannel {
    /// Spectrum of each impulse partition (zero-padded to 2 * PARTITION_SIZE).
    partitions: Vec<Vec<Complex<f32>>>,
    /// Frequency-domain delay line of past input blocks.
    history: Vec<Vec<Complex<f32>>>,
    history_pos: usize,
    input: Vec<f32>,
    output: Vec<f32>,
    overlap: Vec<f32>,
    fill: usize,
    time_scratch: Vec<f32>,
    accum: Vec<Complex<f32>>,
    forward: Arc<dyn RealToComplex<f32>>,
    inverse: Arc<dyn ComplexToReal<f32>>,
}

impl ConvolutionChannel {
    fn new(
        impulse: &[f32],
        scale: f32,
        forward: Arc<dyn RealToComplex<f32>>,
        inverse: Arc<dyn ComplexToReal<f32>>,
    ) -> Self {
        let fft_size = PARTITION_SIZE * 2;
        let bins = fft_size / 2 + 1;
        let mut time_scratch = vec![0.0_f32; fft_size];

        let partitions: Vec<Vec<Complex<f32>>> = impulse
            .chunks(PARTITION_SIZE)
            .map(|segment| {
                time_scratch.fill(0.0);
                for (dst, &src) in time_scratch.iter_mut().zip(segment) {
                    *dst = src * scale;
                }
                let mut spectrum = vec![Complex::new(0.0, 0.0); bins];
                let done = forward.process(&mut time_scratch, &mut spectrum);
                debug_assert!(done.is_ok(), "partition buffers must match the plan");
                spectrum
            })
            .collect();

        let history = vec![vec![Complex::new(0.0, 0.0); bins]; partitions.len().max(1)];

        Self {
            partitions,
            history,
            history_pos: 0,
            input: vec![0.0; PARTITION_SIZE],
            output: vec![0.0; PARTITION_SIZE],
            overlap: vec![0.0; PARTITION_SIZE],
            fill: 0,
            time_scratch,
            accum: vec![Complex::new(0.0, 0.0); bins],
            forward,
            inverse,
        }
    }

    #[inline]
    fn process(&mut self, x: f32) -> f32 {
        let y = self.output[self.fill];
        self.input[self.fill] = x;
        self.fill += 1;
        if self.fill == PARTITION_SIZE {
            self.fill = 0;
            self.run_block();
        }
        y
    }

    fn run_block(&mut self) {
        if self.partitions.is_empty() {
            self.output.fill(0.0);
            return;
        }

        self.time_scratch[..PARTITION_SIZE].copy_from_slice(&self.input);
        self.time_scratch[PARTITION_SIZE..].fill(0.0);
        let done = self
            .forward
            .process(&mut self.time_scratch, &mut self.history[self.history_pos]);
        debug_assert!(done.is_ok(), "input block must match the plan");

        let count = self.partitions.len();
        self.accum.fill(Complex::new(0.0, 0.0));
        for (p, partition) in self.partitions.iter().enumerate() {
            let block = &self.history[(self.history_pos + count - p) % count];
            for ((acc, &x), &h) in self.accum.iter_mut().zip(block).zip(partition) {
                *acc += x * h;
            }
        }
        self.history_pos = (self.history_pos + 1) % count;

        // DC and Nyquist bins must be purely real for the inverse transform
        let last = self.accum.len() - 1;
        self.accum[0].im = 0.0;
        self.accum[last].im = 0.0;
        let done = self.inverse.process(&mut self.accum, &mut self.time_scratch);
        debug_assert!(done.is_ok(), "accumulator must match the plan");

        let norm = 1.0 / (PARTITION_SIZE * 2) as f32;
        for i in 0..PARTITION_SIZE {
            self.output[i] = self.time_scratch[i] * norm + self.overlap[i];
            self.overlap[i] = self.time_scratch[PARTITION_SIZE + i] * norm;
        }
    }
}

/// Stereo convolution reverb: left input through impulse channel 0, right
/// input through impulse channel 1 (or channel 0 again for a mono impulse).
pub struct Convolver {
    left: ConvolutionChannel,
    right: ConvolutionChannel,
}

impl std::fmt::Debug for Convolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Convolver")
            .field("partitions", &self.left.partitions.len())
            .finish()
    }
}

impl Convolver {
    /// Build a convolver; `normalize` applies WebAudio's loudness calibration.
    pub fn new(impulse: &ImpulseBuffer, normalize: bool) -> Self {
        let mut planner = RealFftPlanner::<f32>::new();
        let forward = planner.plan_fft_forward(PARTITION_SIZE * 2);
        let inverse = planner.plan_fft_inverse(PARTITION_SIZE * 2);
        let scale = if normalize {
            impulse.normalization_scale()
        } else {
            1.0
        };

        let empty = Vec::new();
        let ir_left = impulse.channels.first().unwrap_or(&empty);
        let ir_right = impulse.channels.get(1).unwrap_or(ir_left);

        Self {
            left: ConvolutionChannel::new(ir_left, scale, forward.clone(), inverse.clone()),
            right: ConvolutionChannel::new(ir_right, scale, forward, inverse),
        }
    }

    /// Convolve one stereo frame, returning the wet frame.
    #[inline]
    pub fn process(&mut self, left: f32, right: f32) -> (f32, f32) {
        (self.left.process(left), self.right.process(right))
    }

    /// Latency of the wet signal, in samples.
    pub fn latency(&self) -> usize {
        PARTITION_SIZE
    }
}
