//! Output device — the clock and sink the realtime graph plays into.
//!
//! The host owns the real audio callback (an AudioWorklet in the browser).
//! [`LiveOutput`] is the core's view of it: a clock that advances as the
//! host pulls frames through [`Session::process`](crate::session::Session::process).

use tracing::debug;

use crate::error::StudioError;

/// Sample rates a device may run at, as WebAudio allows.
pub const SAMPLE_RATE_RANGE: std::ops::RangeInclusive<u32> = 3_000..=768_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    Suspended,
    Running,
    Closed,
}

/// What the transport needs from an output device.
pub trait OutputDevice {
    fn sample_rate(&self) -> u32;

    /// Device clock in seconds.
    fn current_time(&self) -> f64;

    fn state(&self) -> DeviceState;

    /// Start the clock if suspended. Fails once the device is closed.
    fn resume(&mut self) -> Result<(), StudioError>;

    /// Account for `frames` frames delivered to the hardware.
    fn advance(&mut self, frames: usize);

    /// Release the device. Further calls are no-ops.
    fn close(&mut self);
}

/// A pull-driven device: its clock is the number of frames the host has
/// pulled, divided by the sample rate.
#[derive(Debug)]
pub struct LiveOutput {
    sample_rate: u32,
    frames: u64,
    state: DeviceState,
}

impl LiveOutput {
    pub fn open(sample_rate: u32) -> Result<Self, StudioError> {
        if !SAMPLE_RATE_RANGE.contains(&sample_rate) {
            return Err(StudioError::DeviceUnavailable(format!(
                "sample rate {sample_rate} Hz is outside {}..={}",
                SAMPLE_RATE_RANGE.start(),
                SAMPLE_RATE_RANGE.end()
            )));
        }
        debug!(sample_rate, "output device opened");
        Ok(LiveOutput {
            sample_rate,
            frames: 0,
            state: DeviceState::Suspended,
        })
    }
}

impl OutputDevice for LiveOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.frames as f64 / self.sample_rate as f64
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn resume(&mut self) -> Result<(), StudioError> {
        match self.state {
            DeviceState::Closed => Err(StudioError::DeviceUnavailable(
                "device already closed".to_string(),
            )),
            DeviceState::Suspended => {
                self.state = DeviceState::Running;
                Ok(())
            }
            DeviceState::Running => Ok(()),
        }
    }

    fn advance(&mut self, frames: usize) {
        if self.state == DeviceState::Running {
            self.frames += frames as u64;
        }
    }

    fn close(&mut self) {
        if self.state != DeviceState::Closed {
            debug!("output device closed");
            self.state = DeviceState::Closed;
        }
    }
}

/// A device whose clock tests set directly.
#[cfg(test)]
#[derive(Debug)]
pub struct ManualDevice {
    pub sample_rate: u32,
    pub time: f64,
    pub state: DeviceState,
}

#[cfg(test)]
impl ManualDevice {
    pub fn new(sample_rate: u32) -> Self {
        ManualDevice {
            sample_rate,
            time: 0.0,
            state: DeviceState::Suspended,
        }
    }
}

#[cfg(test)]
impl OutputDevice for ManualDevice {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn current_time(&self) -> f64 {
        self.time
    }

    fn state(&self) -> DeviceState {
        self.state
    }

    fn resume(&mut self) -> Result<(), StudioError> {
        if self.state == DeviceState::Closed {
            return Err(StudioError::DeviceUnavailable("closed".to_string()));
        }
        self.state = DeviceState::Running;
        Ok(())
    }

    fn advance(&mut self, frames: usize) {
        self.time += frames as f64 / self.sample_rate as f64;
    }

    fn close(&mut self) {
        self.state = DeviceState::Closed;
    }
}
