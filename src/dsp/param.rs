//! Automatable parameter — a value with an optional linear ramp, in the
//! spirit of WebAudio's `AudioParam`.

/// How a new parameter value should take effect.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Automation {
    /// Jump straight to the value.
    Instant,
    /// Glide linearly from the value at `now` to the target over `window`
    /// seconds.
    Ramp { now: f64, window: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct LinearRamp {
    start_time: f64,
    start_value: f64,
    end_time: f64,
}

/// A parameter evaluated against the context clock.
///
/// `value` always holds the settled target; an active ramp only affects
/// what [`value_at`](Self::value_at) reports before it finishes.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioParam {
    value: f64,
    min: f64,
    max: f64,
    ramp: Option<LinearRamp>,
}

impl AudioParam {
    pub fn new(value: f64, min: f64, max: f64) -> Self {
        AudioParam {
            value: value.clamp(min, max),
            min,
            max,
            ramp: None,
        }
    }

    /// The value the parameter settles at once any ramp completes.
    pub fn target(&self) -> f64 {
        self.value
    }

    /// Value at context time `time`.
    pub fn value_at(&self, time: f64) -> f64 {
        match self.ramp {
            Some(r) if time < r.end_time => {
                if time <= r.start_time {
                    r.start_value
                } else {
                    let t = (time - r.start_time) / (r.end_time - r.start_time);
                    r.start_value + (self.value - r.start_value) * t
                }
            }
            _ => self.value,
        }
    }

    /// Whether a ramp is still running at `time`.
    pub fn is_ramping(&self, time: f64) -> bool {
        matches!(self.ramp, Some(r) if time < r.end_time)
    }

    /// Set the value immediately, cancelling any ramp.
    pub fn set_value(&mut self, value: f64) {
        self.value = self.clamp(value);
        self.ramp = None;
    }

    /// Ramp linearly from wherever the parameter is at `now` to `target`.
    pub fn linear_ramp_to(&mut self, target: f64, now: f64, window: f64) {
        if window <= 0.0 {
            self.set_value(target);
            return;
        }
        let start_value = self.value_at(now);
        self.value = self.clamp(target);
        self.ramp = Some(LinearRamp {
            start_time: now,
            start_value,
            end_time: now + window,
        });
    }

    pub fn apply(&mut self, target: f64, automation: Automation) {
        match automation {
            Automation::Instant => self.set_value(target),
            Automation::Ramp { now, window } => self.linear_ramp_to(target, now, window),
        }
    }

    fn clamp(&self, v: f64) -> f64 {
        if v.is_nan() { self.value } else { v.clamp(self.min, self.max) }
    }
}
