//! Session — one studio: a device, the loaded source, the controls, and the
//! transport that plays them.
//!
//! All mutation goes through `&mut Session`, so at most one decode, play or
//! export is in flight at any time.

use std::sync::Arc;

use tracing::{debug, info};

use crate::config::StudioConfig;
use crate::controls::ControlState;
use crate::decode::decode;
use crate::device::{DeviceState, LiveOutput, OutputDevice};
use crate::dsp::buffer::AudioBuffer;
use crate::dsp::renderer;
use crate::error::StudioError;
use crate::timecode;
use crate::transport::{Transport, TransportState};

#[derive(Debug)]
pub struct Session<D: OutputDevice = LiveOutput> {
    config: StudioConfig,
    device: D,
    source: Option<Arc<AudioBuffer>>,
    controls: ControlState,
    transport: Transport,
}

impl Session<LiveOutput> {
    /// Open the output device and start an empty session.
    pub fn open(sample_rate: u32, config: StudioConfig) -> Result<Self, StudioError> {
        config.validate()?;
        let device = LiveOutput::open(sample_rate)?;
        info!(sample_rate, "studio session opened");
        Ok(Self::with_device(device, config))
    }
}

impl<D: OutputDevice> Session<D> {
    pub fn with_device(device: D, config: StudioConfig) -> Self {
        Session {
            transport: Transport::new(config.poll_interval),
            config,
            device,
            source: None,
            controls: ControlState::default(),
        }
    }

    pub fn config(&self) -> &StudioConfig {
        &self.config
    }

    pub fn controls(&self) -> &ControlState {
        &self.controls
    }

    pub fn device(&self) -> &D {
        &self.device
    }

    /// Shared handle to the decoded source, if any.
    pub fn source_handle(&self) -> Option<Arc<AudioBuffer>> {
        self.source.clone()
    }

    /// Decode `bytes` and make them the new source. On failure the previous
    /// source, controls and transport are left exactly as they were.
    pub fn load_file(&mut self, bytes: &[u8]) -> Result<(), StudioError> {
        let buffer = decode(bytes)?;
        self.replace_source(buffer);
        Ok(())
    }

    /// Swap in an already decoded source, stopping any playback.
    pub fn replace_source(&mut self, buffer: AudioBuffer) {
        info!(
            seconds = buffer.duration(),
            channels = buffer.channel_count(),
            "source loaded"
        );
        self.transport.load(buffer.duration());
        self.source = Some(Arc::new(buffer));
    }

    /// Take a new control snapshot. A playing graph glides to it.
    pub fn set_controls(&mut self, controls: ControlState) {
        self.transport
            .update_controls(self.device.current_time(), &controls, self.config.ramp_seconds);
        self.controls = controls;
    }

    /// Apply a `m:ss-m:ss` cut typed by the user. Returns whether the text
    /// was accepted; rejected text leaves the previous cut in place.
    pub fn set_cut_range(&mut self, text: &str) -> bool {
        let duration = self.source.as_ref().map_or(0.0, |s| s.duration());
        match timecode::parse_time_range(text, duration) {
            Ok((cut_start, cut_end)) => {
                let controls = ControlState {
                    cut_start,
                    cut_end,
                    ..self.controls.clone()
                };
                self.set_controls(controls);
                true
            }
            Err(e) => {
                debug!(error = %e, "cut range ignored");
                false
            }
        }
    }

    pub fn play(&mut self) -> Result<(), StudioError> {
        self.transport
            .play(&mut self.device, self.source.as_ref(), &self.controls, &self.config)
    }

    pub fn pause(&mut self) {
        self.transport.pause(&self.device);
    }

    pub fn stop(&mut self) {
        self.transport.stop();
    }

    pub fn seek(&mut self, position: f64) -> Result<(), StudioError> {
        self.transport.seek(
            &mut self.device,
            self.source.as_ref(),
            &self.controls,
            &self.config,
            position,
        )
    }

    /// Run the position poll if it is due and report the transport.
    pub fn tick(&mut self) -> TransportState {
        self.transport.tick(&self.device)
    }

    pub fn status(&self) -> TransportState {
        self.transport.status(self.device.current_time())
    }

    /// Fill one device buffer and advance the device clock past it.
    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        let frames = left.len().min(right.len());
        if self.device.state() != DeviceState::Running {
            left.fill(0.0);
            right.fill(0.0);
            return;
        }
        let now = self.device.current_time();
        self.transport
            .process(now, &mut left[..frames], &mut right[..frames]);
        self.device.advance(frames);
    }

    /// Spectrum bytes of the live output; zeros when nothing is playing.
    pub fn frequency_data(&mut self, out: &mut [u8]) {
        match self.transport.analyser_mut() {
            Some(analyser) => analyser.frequency_data(out),
            None => out.fill(0),
        }
    }

    /// Waveform bytes of the live output; the 128 midline when idle.
    pub fn time_domain_data(&self, out: &mut [u8]) {
        match self.transport.analyser() {
            Some(analyser) => analyser.time_domain_data(out),
            None => out.fill(128),
        }
    }

    /// Number of spectrum bins `frequency_data` fills.
    pub fn frequency_bin_count(&self) -> usize {
        self.config.analyser.fft_size / 2
    }

    /// Render the processed, trimmed source offline. `None` without a
    /// source or with an empty trim window.
    pub fn export(&self) -> Option<AudioBuffer> {
        let Some(source) = self.source.as_ref() else {
            debug!("export ignored: no source loaded");
            return None;
        };
        let out = renderer::render(source, &self.controls, &self.config);
        if let Some(buffer) = out.as_ref() {
            info!(frames = buffer.len(), "export rendered");
        }
        out
    }

    pub fn export_wav(&self) -> Option<Vec<u8>> {
        self.export().map(|buffer| renderer::encode_wav(&buffer))
    }

    /// Stop playback and close the device. Safe to call twice.
    pub fn dispose(&mut self) {
        if self.device.state() == DeviceState::Closed {
            return;
        }
        self.transport.stop();
        self.device.close();
        info!("studio session disposed");
    }
}

impl<D: OutputDevice> Drop for Session<D> {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReverbSettings;
    use crate::device::ManualDevice;
    use crate::dsp::graph::RENDER_QUANTUM;
    use crate::transport::PlaybackState;

    fn config() -> StudioConfig {
        StudioConfig {
            reverb: ReverbSettings {
                seconds: 0.1,
                ..ReverbSettings::default()
            },
            ..StudioConfig::default()
        }
    }

    fn tone(seconds: f64, rate: u32) -> AudioBuffer {
        let frames = (seconds * rate as f64) as usize;
        let data: Vec<f32> = (0..frames)
            .map(|i| 0.4 * (i as f32 * 0.05).sin())
            .collect();
        AudioBuffer::new(vec![data.clone(), data], rate)
    }

    fn session(rate: u32) -> Session<ManualDevice> {
        Session::with_device(ManualDevice::new(rate), config())
    }

    #[test]
    fn open_rejects_bad_sample_rate() {
        assert!(matches!(
            Session::open(10, StudioConfig::default()),
            Err(StudioError::DeviceUnavailable(_))
        ));
    }

    #[test]
    fn failed_load_keeps_previous_source() -> Result<(), StudioError> {
        let mut s = session(8000);
        s.load_file(&renderer::encode_wav(&tone(1.0, 8000)))?;
        let before = s.source_handle();
        assert!(s.load_file(b"garbage").is_err());
        let after = s.source_handle();
        assert!(before.is_some());
        assert!(matches!((before, after), (Some(a), Some(b)) if Arc::ptr_eq(&a, &b)));
        Ok(())
    }

    #[test]
    fn loading_stops_playback() -> Result<(), StudioError> {
        let mut s = session(8000);
        s.replace_source(tone(2.0, 8000));
        s.play()?;
        assert!(s.status().is_playing);
        s.replace_source(tone(3.0, 8000));
        let status = s.status();
        assert_eq!(status.position, PlaybackState::Stopped);
        assert!((status.duration - 3.0).abs() < 1e-9);
        Ok(())
    }

    #[test]
    fn play_and_export_without_source_are_no_ops() -> Result<(), StudioError> {
        let mut s = session(8000);
        s.play()?;
        assert_eq!(s.status().position, PlaybackState::Stopped);
        assert!(s.export().is_none());
        assert!(s.export_wav().is_none());
        Ok(())
    }

    #[test]
    fn cut_range_text_updates_controls() {
        let mut s = session(8000);
        s.replace_source(tone(10.0, 8000));
        assert!(s.set_cut_range("0:02-0:08"));
        assert!((s.controls().cut_start - 20.0).abs() < 1e-9);
        assert!((s.controls().cut_end - 80.0).abs() < 1e-9);

        assert!(!s.set_cut_range("0:09-0:03"));
        assert!(!s.set_cut_range("nonsense"));
        assert!((s.controls().cut_start - 20.0).abs() < 1e-9, "rejected text keeps the cut");
    }

    #[test]
    fn processing_advances_the_clock_and_reaches_the_boundary() -> Result<(), StudioError> {
        let mut s = session(8000);
        s.replace_source(tone(1.0, 8000));
        s.set_controls(ControlState {
            cut_end: 50.0,
            ..ControlState::default()
        });
        s.play()?;
        let mut l = vec![0.0; RENDER_QUANTUM];
        let mut r = vec![0.0; RENDER_QUANTUM];
        let mut heard = false;
        // 0.75 s of callbacks, ticking like a host would
        for _ in 0..(6000 / RENDER_QUANTUM) {
            s.process(&mut l, &mut r);
            heard |= l.iter().any(|&x| x != 0.0);
            s.tick();
        }
        assert!(heard);
        let status = s.status();
        assert_eq!(status.position, PlaybackState::Stopped);
        assert!((status.current_time - 0.5).abs() < 1e-9);
        assert_eq!(status.resume_at, 0.0);
        Ok(())
    }

    #[test]
    fn realtime_matches_offline_render() -> Result<(), StudioError> {
        // Same rate for device and export, no live ramps: identical samples
        let cfg = StudioConfig {
            export_sample_rate: 8000,
            ..config()
        };
        let mut s = Session::with_device(ManualDevice::new(8000), cfg);
        s.replace_source(tone(0.5, 8000));
        s.set_controls(ControlState {
            pitch: 58.0,
            bass: 80.0,
            treble: 30.0,
            room_size: 60.0,
            beautify: true,
            booster: true,
            cut_start: 10.0,
            cut_end: 90.0,
            ..ControlState::default()
        });

        let offline = s.export().expect("non-empty window");
        s.play()?;
        let frames = offline.len();
        let mut live_l = vec![0.0; frames];
        let mut live_r = vec![0.0; frames];
        for (l, r) in live_l
            .chunks_mut(RENDER_QUANTUM)
            .zip(live_r.chunks_mut(RENDER_QUANTUM))
        {
            s.process(l, r);
        }
        assert_eq!(offline.channel(0), Some(live_l.as_slice()));
        assert_eq!(offline.channel(1), Some(live_r.as_slice()));
        Ok(())
    }

    #[test]
    fn reverb_tail_rings_after_source_ends() -> Result<(), StudioError> {
        let mut s = Session::with_device(
            ManualDevice::new(8000),
            StudioConfig {
                poll_interval: 0.01,
                reverb: ReverbSettings {
                    seconds: 0.5,
                    ..ReverbSettings::default()
                },
                ..StudioConfig::default()
            },
        );
        s.replace_source(tone(0.1, 8000));
        // An octave up drains the 0.1 s source in half the time, well
        // before the clock reaches the end of the window.
        s.set_controls(ControlState {
            pitch: 100.0,
            room_size: 100.0,
            full_room: true,
            ..ControlState::default()
        });
        s.play()?;

        let mut l = vec![0.0; RENDER_QUANTUM];
        let mut r = vec![0.0; RENDER_QUANTUM];
        while s.status().is_playing {
            s.process(&mut l, &mut r);
            s.tick();
        }
        let status = s.status();
        assert_eq!(status.position, PlaybackState::Stopped);
        assert!(status.current_time < 0.1, "stopped by the source, not the boundary");

        let mut energy = 0.0_f64;
        for _ in 0..10 {
            s.process(&mut l, &mut r);
            energy += l.iter().chain(&r).map(|&x| (x as f64).powi(2)).sum::<f64>();
        }
        assert!(energy > 0.0, "wet signal keeps ringing after the source ends");
        let mut wave = vec![0u8; 256];
        s.time_domain_data(&mut wave);
        assert!(wave.iter().any(|&b| b != 128), "analysis still follows the tail");

        s.stop();
        s.process(&mut l, &mut r);
        assert!(l.iter().chain(&r).all(|&x| x == 0.0));
        Ok(())
    }

    #[test]
    fn live_control_changes_glide() -> Result<(), StudioError> {
        let mut s = session(8000);
        s.replace_source(tone(2.0, 8000));
        s.play()?;
        let mut l = vec![0.0; RENDER_QUANTUM];
        let mut r = vec![0.0; RENDER_QUANTUM];
        for _ in 0..8 {
            s.process(&mut l, &mut r);
        }
        let now = s.device().current_time();
        s.set_controls(ControlState {
            pitch: 100.0,
            ..ControlState::default()
        });

        let detune = s
            .transport
            .graph()
            .and_then(|g| g.source())
            .map(|reader| reader.detune.clone())
            .expect("playing session has a graph");
        assert_eq!(detune.value_at(now), 0.0, "old value holds at the change");
        let ramp = s.config().ramp_seconds;
        assert!((detune.value_at(now + ramp / 2.0) - 600.0).abs() < 1e-9);
        assert_eq!(detune.value_at(now + ramp), 1200.0);
        assert_eq!(detune.target(), 1200.0);
        Ok(())
    }

    #[test]
    fn analysis_is_idle_without_playback() {
        let mut s = session(8000);
        let mut freq = vec![9u8; s.frequency_bin_count()];
        s.frequency_data(&mut freq);
        assert!(freq.iter().all(|&b| b == 0));
        let mut wave = vec![0u8; 16];
        s.time_domain_data(&mut wave);
        assert!(wave.iter().all(|&b| b == 128));
    }

    #[test]
    fn dispose_closes_device_and_blocks_play() {
        let mut s = session(8000);
        s.replace_source(tone(1.0, 8000));
        s.dispose();
        s.dispose();
        assert_eq!(s.device().state, DeviceState::Closed);
        assert!(matches!(s.play(), Err(StudioError::DeviceUnavailable(_))));
    }
}
