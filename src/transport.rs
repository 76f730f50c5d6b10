//! Transport — play, pause, stop and seek over the loaded source.
//!
//! The transport owns at most one [`ProcessingGraph`]. Every play builds a
//! fresh one and play, pause and stop drop the previous one. Reaching the
//! trim boundary or the end of the source only halts the reader; the graph
//! is kept until then, so the reverb tail and the analysis tap keep running.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use crate::config::StudioConfig;
use crate::controls::{ControlState, TrimWindow};
use crate::device::OutputDevice;
use crate::dsp::analyser::Analyser;
use crate::dsp::buffer::AudioBuffer;
use crate::dsp::graph::{GraphContext, OutputTarget, PlaybackWindow, ProcessingGraph};
use crate::dsp::param::Automation;
use crate::error::StudioError;
use crate::mapper;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

/// Snapshot handed to the host after every transport call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransportState {
    pub position: PlaybackState,
    /// Playhead in full-source seconds, within `[0, duration]`.
    pub current_time: f64,
    pub duration: f64,
    pub resume_at: f64,
    pub is_playing: bool,
    /// Seconds until the host should call `tick` again; `None` when idle.
    pub next_poll_in: Option<f64>,
}

/// A cancellable periodic poll. Each completed poll arms exactly one next
/// due time; cancelling disarms it.
#[derive(Debug, Clone, PartialEq)]
pub struct PositionPoller {
    interval: f64,
    next_due: Option<f64>,
}

impl PositionPoller {
    pub fn new(interval: f64) -> Self {
        PositionPoller {
            interval,
            next_due: None,
        }
    }

    pub fn start(&mut self, now: f64) {
        self.next_due = Some(now + self.interval);
    }

    pub fn cancel(&mut self) {
        self.next_due = None;
    }

    pub fn is_armed(&self) -> bool {
        self.next_due.is_some()
    }

    pub fn is_due(&self, now: f64) -> bool {
        self.next_due.is_some_and(|due| now >= due)
    }

    /// Mark the current poll done and schedule the next one.
    pub fn complete(&mut self, now: f64) {
        if self.next_due.is_some() {
            self.next_due = Some(now + self.interval);
        }
    }

    pub fn time_until(&self, now: f64) -> Option<f64> {
        self.next_due.map(|due| (due - now).max(0.0))
    }
}

#[derive(Debug)]
pub struct Transport {
    state: PlaybackState,
    graph: Option<ProcessingGraph>,
    window: TrimWindow,
    duration: f64,
    started_at: f64,
    resume_at: f64,
    current_time: f64,
    poller: PositionPoller,
}

impl Transport {
    pub fn new(poll_interval: f64) -> Self {
        Transport {
            state: PlaybackState::Stopped,
            graph: None,
            window: TrimWindow { start: 0.0, end: 0.0 },
            duration: 0.0,
            started_at: 0.0,
            resume_at: 0.0,
            current_time: 0.0,
            poller: PositionPoller::new(poll_interval),
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn has_graph(&self) -> bool {
        self.graph.is_some()
    }

    pub fn window(&self) -> TrimWindow {
        self.window
    }

    /// The live graph, if one is built.
    pub fn graph(&self) -> Option<&ProcessingGraph> {
        self.graph.as_ref()
    }

    /// Reset for a newly loaded source of `duration` seconds.
    pub fn load(&mut self, duration: f64) {
        self.stop();
        self.duration = duration;
    }

    /// Start playback from the resume point, or from the trim start when
    /// the resume point lies outside the trim window.
    pub fn play<D: OutputDevice>(
        &mut self,
        device: &mut D,
        source: Option<&Arc<AudioBuffer>>,
        controls: &ControlState,
        config: &StudioConfig,
    ) -> Result<(), StudioError> {
        let Some(source) = source else {
            debug!("play ignored: no source loaded");
            return Ok(());
        };
        device.resume()?;
        self.release_graph();

        self.duration = source.duration();
        self.window = controls.trim_window(self.duration);
        if self.window.is_empty() {
            debug!(start = self.window.start, end = self.window.end, "play ignored: empty trim window");
            self.state = PlaybackState::Stopped;
            self.resume_at = self.window.start;
            self.poller.cancel();
            return Ok(());
        }

        let offset = self.window.resume_offset(self.resume_at);
        let length = self.window.length_from(offset);
        let graph = ProcessingGraph::build(
            source.clone(),
            PlaybackWindow { offset, length },
            controls,
            GraphContext {
                sample_rate: device.sample_rate() as f64,
                target: OutputTarget::Device,
            },
            config,
        );

        let now = device.current_time();
        self.started_at = now - offset;
        self.current_time = offset;
        self.graph = Some(graph);
        self.state = PlaybackState::Playing;
        self.poller.start(now);
        info!(offset, length, "playback started");
        Ok(())
    }

    /// Freeze the playhead. Only meaningful while playing.
    pub fn pause<D: OutputDevice>(&mut self, device: &D) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let position = self.elapsed(device.current_time());
        self.resume_at = position;
        self.current_time = position;
        self.release_graph();
        self.state = PlaybackState::Paused;
        self.poller.cancel();
        info!(position, "playback paused");
    }

    /// Stop and rewind to zero. Safe to call in any state.
    pub fn stop(&mut self) {
        if self.state != PlaybackState::Stopped {
            info!("playback stopped");
        }
        self.release_graph();
        self.resume_at = 0.0;
        self.current_time = 0.0;
        self.state = PlaybackState::Stopped;
        self.poller.cancel();
    }

    /// Move the playhead; a playing transport restarts from there.
    pub fn seek<D: OutputDevice>(
        &mut self,
        device: &mut D,
        source: Option<&Arc<AudioBuffer>>,
        controls: &ControlState,
        config: &StudioConfig,
        position: f64,
    ) -> Result<(), StudioError> {
        let Some(buffer) = source else {
            debug!("seek ignored: no source loaded");
            return Ok(());
        };
        self.duration = buffer.duration();
        let position = if position.is_nan() {
            0.0
        } else {
            position.clamp(0.0, self.duration)
        };
        self.resume_at = position;
        self.current_time = position;
        debug!(position, "seek");
        if self.state == PlaybackState::Playing {
            self.play(device, source, controls, config)?;
        }
        Ok(())
    }

    /// Follow a control change while playing: parameters glide over
    /// `ramp_seconds` and the trim boundary moves at once.
    pub fn update_controls(&mut self, now: f64, controls: &ControlState, ramp_seconds: f64) {
        if self.state != PlaybackState::Playing {
            return;
        }
        if let Some(graph) = self.graph.as_mut() {
            mapper::apply(graph, controls, Automation::Ramp { now, window: ramp_seconds });
        }
        self.window = controls.trim_window(self.duration);
    }

    /// Run a due position poll: advance the playhead and stop at the trim
    /// boundary or when the source has run out.
    pub fn tick<D: OutputDevice>(&mut self, device: &D) -> TransportState {
        let now = device.current_time();
        if self.state == PlaybackState::Playing && self.poller.is_due(now) {
            self.current_time = self.elapsed(now);
            if self.current_time >= self.window.end {
                if let Some(graph) = self.graph.as_mut() {
                    graph.halt();
                }
                self.current_time = self.window.end;
                self.resume_at = self.window.start;
                self.state = PlaybackState::Stopped;
                self.poller.cancel();
                info!(end = self.window.end, "reached end of trim window");
            } else if self.graph.as_ref().is_some_and(ProcessingGraph::source_ended) {
                if let Some(graph) = self.graph.as_mut() {
                    graph.halt();
                }
                self.resume_at = self.window.start;
                self.state = PlaybackState::Stopped;
                self.poller.cancel();
                info!(position = self.current_time, "source ended");
            } else {
                self.poller.complete(now);
            }
        }
        self.status(now)
    }

    pub fn status(&self, now: f64) -> TransportState {
        TransportState {
            position: self.state,
            current_time: self.current_time.clamp(0.0, self.duration.max(0.0)),
            duration: self.duration,
            resume_at: self.resume_at,
            is_playing: self.state == PlaybackState::Playing,
            next_poll_in: self.poller.time_until(now),
        }
    }

    /// Render the live graph into the sink buffers, or silence when idle.
    pub fn process(&mut self, time: f64, left: &mut [f32], right: &mut [f32]) {
        match self.graph.as_mut() {
            Some(graph) => graph.process(time, left, right),
            None => {
                left.fill(0.0);
                right.fill(0.0);
            }
        }
    }

    pub fn analyser(&self) -> Option<&Analyser> {
        self.graph.as_ref().and_then(ProcessingGraph::analyser)
    }

    pub fn analyser_mut(&mut self) -> Option<&mut Analyser> {
        self.graph.as_mut().and_then(ProcessingGraph::analyser_mut)
    }

    fn elapsed(&self, now: f64) -> f64 {
        (now - self.started_at).clamp(0.0, self.duration.max(0.0))
    }

    fn release_graph(&mut self) {
        if let Some(mut graph) = self.graph.take() {
            graph.halt();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReverbSettings;
    use crate::device::{DeviceState, ManualDevice};
    use crate::dsp::source::ReaderState;

    const RATE: u32 = 8000;

    fn config() -> StudioConfig {
        StudioConfig {
            reverb: ReverbSettings {
                seconds: 0.05,
                ..ReverbSettings::default()
            },
            ..StudioConfig::default()
        }
    }

    fn source(seconds: f64) -> Arc<AudioBuffer> {
        let frames = (seconds * RATE as f64) as usize;
        Arc::new(AudioBuffer::new(vec![vec![0.25; frames]; 2], RATE))
    }

    fn cut(start: f64, end: f64) -> ControlState {
        ControlState {
            cut_start: start,
            cut_end: end,
            ..ControlState::default()
        }
    }

    #[test]
    fn poller_arms_completes_and_cancels() {
        let mut poller = PositionPoller::new(0.05);
        assert!(!poller.is_armed());
        assert!(!poller.is_due(100.0));
        poller.start(1.0);
        assert!(!poller.is_due(1.04));
        assert!(poller.is_due(1.06));
        poller.complete(1.2);
        assert!(!poller.is_due(1.24));
        let wait = poller.time_until(1.2).unwrap_or_default();
        assert!((wait - 0.05).abs() < 1e-9, "next poll in {wait}");
        poller.cancel();
        poller.complete(2.0);
        assert!(!poller.is_armed(), "a cancelled poller stays cancelled");
    }

    #[test]
    fn play_without_source_is_a_no_op() -> Result<(), StudioError> {
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.play(&mut dev, None, &ControlState::default(), &config())?;
        assert_eq!(t.state(), PlaybackState::Stopped);
        assert!(!t.has_graph());
        assert_eq!(dev.state, DeviceState::Suspended, "device untouched");
        Ok(())
    }

    #[test]
    fn play_pause_resume_scenario() -> Result<(), StudioError> {
        let src = source(10.0);
        let controls = ControlState::default();
        let cfg = config();
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);

        t.play(&mut dev, Some(&src), &controls, &cfg)?;
        assert_eq!(t.state(), PlaybackState::Playing);
        assert_eq!(dev.state, DeviceState::Running);
        let target = t.graph().map(|g| g.context().target);
        assert_eq!(target, Some(OutputTarget::Device));

        dev.time = 5.0;
        let s = t.tick(&dev);
        assert!((s.current_time - 5.0).abs() < 1e-9);
        assert!(s.is_playing);

        t.pause(&dev);
        let s = t.status(dev.time);
        assert_eq!(s.position, PlaybackState::Paused);
        assert!((s.resume_at - 5.0).abs() < 1e-9);
        assert!(!t.has_graph());
        assert_eq!(s.next_poll_in, None);

        dev.time = 7.0;
        t.play(&mut dev, Some(&src), &controls, &cfg)?;
        assert!((t.status(dev.time).current_time - 5.0).abs() < 1e-9, "resumes where it paused");
        dev.time = 8.0;
        let s = t.tick(&dev);
        assert!((s.current_time - 6.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn stop_is_idempotent_from_every_state() -> Result<(), StudioError> {
        let src = source(2.0);
        let cfg = config();
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);

        t.stop();
        t.stop();
        t.play(&mut dev, Some(&src), &ControlState::default(), &cfg)?;
        dev.time = 1.0;
        t.pause(&dev);
        t.stop();
        let first = t.status(dev.time);
        t.stop();
        assert_eq!(t.status(dev.time), first);
        assert_eq!(first.position, PlaybackState::Stopped);
        assert_eq!(first.current_time, 0.0);
        assert_eq!(first.resume_at, 0.0);
        assert!(!t.has_graph());
        Ok(())
    }

    #[test]
    fn pause_outside_playing_does_nothing() {
        let dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.pause(&dev);
        assert_eq!(t.state(), PlaybackState::Stopped);
    }

    #[test]
    fn trim_boundary_stops_and_rewinds_to_window_start() -> Result<(), StudioError> {
        let src = source(10.0);
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.play(&mut dev, Some(&src), &cut(20.0, 50.0), &config())?;
        assert!((t.status(0.0).current_time - 2.0).abs() < 1e-9, "starts at the trim start");

        dev.time = 3.5;
        let s = t.tick(&dev);
        assert_eq!(s.position, PlaybackState::Stopped);
        assert!((s.current_time - 5.0).abs() < 1e-9);
        assert!((s.resume_at - 2.0).abs() < 1e-9);
        let reader = t.graph().and_then(ProcessingGraph::source).map(|r| r.state());
        assert_eq!(reader, Some(ReaderState::Halted));
        Ok(())
    }

    #[test]
    fn resume_outside_new_window_starts_at_window_start() -> Result<(), StudioError> {
        let src = source(10.0);
        let cfg = config();
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.play(&mut dev, Some(&src), &ControlState::default(), &cfg)?;
        dev.time = 1.0;
        t.pause(&dev);

        t.play(&mut dev, Some(&src), &cut(40.0, 60.0), &cfg)?;
        let s = t.status(dev.time);
        assert!((s.current_time - 4.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn empty_window_goes_straight_to_stopped() -> Result<(), StudioError> {
        let src = source(10.0);
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.play(&mut dev, Some(&src), &cut(60.0, 40.0), &config())?;
        let s = t.status(dev.time);
        assert_eq!(s.position, PlaybackState::Stopped);
        assert!(!t.has_graph());
        assert!((s.resume_at - 6.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn natural_end_stops_playback() -> Result<(), StudioError> {
        let src = source(0.1);
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.01);
        t.play(&mut dev, Some(&src), &ControlState::default(), &config())?;

        let mut l = vec![0.0; 1024];
        let mut r = vec![0.0; 1024];
        t.process(dev.time, &mut l, &mut r);
        // Clock lags behind the rendered audio, so only the reader knows.
        dev.time = 0.05;
        let s = t.tick(&dev);
        assert_eq!(s.position, PlaybackState::Stopped);
        assert!(!s.is_playing);
        assert_eq!(s.resume_at, 0.0);
        assert_eq!(s.next_poll_in, None);
        assert!(t.has_graph(), "the graph outlives the source until the next stop");

        t.stop();
        assert!(!t.has_graph());
        Ok(())
    }

    #[test]
    fn closed_device_fails_play() {
        let src = source(1.0);
        let mut dev = ManualDevice::new(RATE);
        dev.state = DeviceState::Closed;
        let mut t = Transport::new(0.05);
        let err = t.play(&mut dev, Some(&src), &ControlState::default(), &config());
        assert!(matches!(err, Err(StudioError::DeviceUnavailable(_))));
        assert_eq!(t.state(), PlaybackState::Stopped);
    }

    #[test]
    fn seek_while_playing_restarts_from_position() -> Result<(), StudioError> {
        let src = source(10.0);
        let cfg = config();
        let controls = ControlState::default();
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.play(&mut dev, Some(&src), &controls, &cfg)?;
        dev.time = 1.0;
        t.seek(&mut dev, Some(&src), &controls, &cfg, 7.5)?;
        assert_eq!(t.state(), PlaybackState::Playing);
        dev.time = 2.0;
        let s = t.tick(&dev);
        assert!((s.current_time - 8.5).abs() < 1e-9);

        t.seek(&mut dev, Some(&src), &controls, &cfg, 99.0)?;
        assert_eq!(t.status(dev.time).resume_at, 10.0, "seek clamps to the duration");
        Ok(())
    }

    #[test]
    fn live_retrim_moves_the_boundary() -> Result<(), StudioError> {
        let src = source(10.0);
        let mut dev = ManualDevice::new(RATE);
        let mut t = Transport::new(0.05);
        t.play(&mut dev, Some(&src), &ControlState::default(), &config())?;
        dev.time = 3.0;
        t.update_controls(dev.time, &cut(0.0, 25.0), 0.1);
        assert!((t.window().end - 2.5).abs() < 1e-9);
        let s = t.tick(&dev);
        assert_eq!(s.position, PlaybackState::Stopped);
        assert!((s.current_time - 2.5).abs() < 1e-9);
        Ok(())
    }
}
