pub mod config;
pub mod controls;
pub mod decode;
pub mod device;
pub mod dsp;
pub mod error;
pub mod mapper;
#[cfg(feature = "native")]
pub mod native;
pub mod session;
pub mod timecode;
pub mod transport;

use crate::config::StudioConfig;
use crate::controls::ControlState;
use crate::device::LiveOutput;
use crate::dsp::buffer::AudioBuffer;
use crate::error::StudioError;
use crate::session::Session;
use wasm_bindgen::prelude::*;

/// The crate version, read from Cargo.toml at compile time.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// WASM-exposed: return the vocal-studio-core version string.
#[wasm_bindgen]
pub fn core_version() -> String {
    VERSION.to_string()
}

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&format!("{e}"))
}

/// WASM-exposed studio: one session bound to the page's audio output.
///
/// The AudioWorklet calls [`process`](Studio::process) for every render
/// quantum; the UI thread drives everything else.
#[wasm_bindgen]
pub struct Studio {
    session: Session<LiveOutput>,
}

#[wasm_bindgen]
impl Studio {
    /// Open a studio at the output's sample rate. `config` is optional
    /// JSON overriding [`StudioConfig`] defaults.
    #[wasm_bindgen(constructor)]
    pub fn new(sample_rate: u32, config: Option<String>) -> Result<Studio, JsValue> {
        let config = match config {
            Some(json) => StudioConfig::from_json(&json).map_err(js_error)?,
            None => StudioConfig::default(),
        };
        let session = Session::open(sample_rate, config).map_err(js_error)?;
        Ok(Studio { session })
    }

    /// Decode an uploaded file (WAV, plus MP3 on native builds).
    pub fn load_file(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.session.load_file(bytes).map_err(js_error)
    }

    /// Load PCM the browser already decoded, interleaved by channel.
    pub fn load_pcm(&mut self, samples: &[f32], channels: usize, sample_rate: u32) -> Result<(), JsValue> {
        let buffer = AudioBuffer::from_interleaved(samples, channels, sample_rate);
        if buffer.is_empty() {
            return Err(js_error(StudioError::DecodeFailure("no audio frames".to_string())));
        }
        self.session.replace_source(buffer);
        Ok(())
    }

    /// Replace the control snapshot with a `ControlState`-shaped object.
    pub fn set_controls(&mut self, controls: JsValue) -> Result<(), JsValue> {
        let controls: ControlState = serde_wasm_bindgen::from_value(controls).map_err(js_error)?;
        self.session.set_controls(controls);
        Ok(())
    }

    pub fn set_cut_range(&mut self, text: &str) -> bool {
        self.session.set_cut_range(text)
    }

    pub fn play(&mut self) -> Result<(), JsValue> {
        self.session.play().map_err(js_error)
    }

    pub fn pause(&mut self) {
        self.session.pause();
    }

    pub fn stop(&mut self) {
        self.session.stop();
    }

    pub fn seek(&mut self, position: f64) -> Result<(), JsValue> {
        self.session.seek(position).map_err(js_error)
    }

    /// Poll the transport; returns the `TransportState` as a JS object.
    pub fn tick(&mut self) -> Result<JsValue, JsValue> {
        let state = self.session.tick();
        serde_wasm_bindgen::to_value(&state).map_err(js_error)
    }

    pub fn process(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.session.process(left, right);
    }

    pub fn frequency_data(&mut self) -> Vec<u8> {
        let mut out = vec![0; self.session.frequency_bin_count()];
        self.session.frequency_data(&mut out);
        out
    }

    pub fn time_domain_data(&self) -> Vec<u8> {
        let mut out = vec![128; self.session.config().analyser.fft_size];
        self.session.time_domain_data(&mut out);
        out
    }

    /// Peak level per bucket of the loaded source, for the waveform view.
    pub fn waveform_peaks(&self, buckets: usize) -> Vec<f32> {
        self.session
            .source_handle()
            .map(|s| s.peaks(buckets))
            .unwrap_or_default()
    }

    /// Render the processed, trimmed source to WAV bytes.
    pub fn export_wav(&self) -> Result<Vec<u8>, JsValue> {
        if self.session.source_handle().is_none() {
            return Err(js_error(StudioError::NoSourceLoaded));
        }
        self.session
            .export_wav()
            .ok_or_else(|| js_error("trim window is empty"))
    }

    pub fn dispose(&mut self) {
        self.session.dispose();
    }
}
