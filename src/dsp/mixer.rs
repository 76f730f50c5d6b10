//! Mixer — gain stages and the dry/wet reverb send.

use super::param::AudioParam;
use super::reverb::Convolver;

/// A gain stage with an automatable linear gain.
#[derive(Debug, Clone)]
pub struct Gain {
    pub gain: AudioParam,
}

impl Gain {
    pub fn new(initial: f64) -> Self {
        Gain {
            gain: AudioParam::new(initial, 0.0, 10.0),
        }
    }

    /// Apply the gain in place. Evaluated per sample so ramps stay smooth.
    pub fn process(&self, time: f64, sample_rate: f64, left: &mut [f32], right: &mut [f32]) {
        if !self.gain.is_ramping(time) && !self.gain.is_ramping(time + left.len() as f64 / sample_rate) {
            let g = self.gain.value_at(time) as f32;
            if g == 1.0 {
                return;
            }
            for s in left.iter_mut().chain(right.iter_mut()) {
                *s *= g;
            }
            return;
        }
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let g = self.gain.value_at(time + i as f64 / sample_rate) as f32;
            *l *= g;
            *r *= g;
        }
    }
}

/// Parallel reverb path: the dry signal passes unchanged while a copy runs
/// through the convolver and the wet gain; both are summed.
#[derive(Debug)]
pub struct ReverbSend {
    pub convolver: Convolver,
    pub wet: Gain,
}

impl ReverbSend {
    pub fn new(convolver: Convolver) -> Self {
        ReverbSend {
            convolver,
            wet: Gain::new(0.0),
        }
    }

    pub fn process(&mut self, time: f64, sample_rate: f64, left: &mut [f32], right: &mut [f32]) {
        for (i, (l, r)) in left.iter_mut().zip(right.iter_mut()).enumerate() {
            let (wet_l, wet_r) = self.convolver.process(*l, *r);
            let g = self.wet.gain.value_at(time + i as f64 / sample_rate) as f32;
            *l += wet_l * g;
            *r += wet_r * g;
        }
    }
}
