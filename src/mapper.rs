//! Parameter mapper — turns UI control values into stage parameters.
//!
//! The same mapping drives fresh graphs (instant writes) and live graphs
//! (short linear ramps), so a slider move while playing lands exactly where
//! a fresh play with the same controls would start.

use crate::controls::{ControlState, EQ_BAND_COUNT, NEUTRAL};
use crate::dsp::compressor::CompressorPreset;
use crate::dsp::graph::{ProcessingGraph, Stage};
use crate::dsp::param::Automation;

/// Pitch shift in cents: ±1200 (one octave each way) across the slider.
pub fn detune_cents(pitch: f64) -> f64 {
    (pitch - NEUTRAL) * 24.0
}

/// Shelf or band gain in dB: ±25 across the slider.
pub fn slider_db(value: f64) -> f64 {
    (value - NEUTRAL) / 2.0
}

pub fn master_gain(booster: bool) -> f64 {
    if booster { 2.5 } else { 1.0 }
}

pub fn wet_gain(room_size: f64, full_room: bool) -> f64 {
    room_size / 100.0 * if full_room { 1.0 } else { 0.5 }
}

/// `mastered` wins over `beautify`; neither leaves the compressor at ratio 1.
pub fn compressor_preset(beautify: bool, mastered: bool) -> CompressorPreset {
    if mastered {
        CompressorPreset {
            threshold: -20.0,
            ratio: 20.0,
            knee: 30.0,
        }
    } else if beautify {
        CompressorPreset {
            threshold: -24.0,
            ratio: 12.0,
            knee: 30.0,
        }
    } else {
        CompressorPreset::BYPASS
    }
}

/// Every parameter the mapper writes, in stage units.
#[derive(Debug, Clone, PartialEq)]
pub struct StageSettings {
    pub detune: f64,
    pub band_gains: [f64; EQ_BAND_COUNT],
    pub bass: f64,
    pub treble: f64,
    pub compressor: CompressorPreset,
    pub wet: f64,
    pub master: f64,
}

impl StageSettings {
    pub fn from_controls(controls: &ControlState) -> Self {
        let c = controls.clamped();
        StageSettings {
            detune: detune_cents(c.pitch),
            band_gains: c.eq_bands.map(slider_db),
            bass: slider_db(c.bass),
            treble: slider_db(c.treble),
            compressor: compressor_preset(c.beautify, c.mastered),
            wet: wet_gain(c.room_size, c.full_room),
            master: master_gain(c.booster),
        }
    }

    /// Read back the targets currently set on a graph's stages.
    pub fn from_graph(graph: &ProcessingGraph) -> Self {
        let mut s = StageSettings {
            detune: 0.0,
            band_gains: [0.0; EQ_BAND_COUNT],
            bass: 0.0,
            treble: 0.0,
            compressor: CompressorPreset::BYPASS,
            wet: 0.0,
            master: 1.0,
        };
        for stage in graph.stages() {
            match stage {
                Stage::Source(reader) => s.detune = reader.detune.target(),
                Stage::Peaking { band, eq } => s.band_gains[*band] = eq.gain.target(),
                Stage::LowShelf(eq) => s.bass = eq.gain.target(),
                Stage::HighShelf(eq) => s.treble = eq.gain.target(),
                Stage::Compressor(comp) => s.compressor = comp.preset(),
                Stage::ReverbSend(send) => s.wet = send.wet.gain.target(),
                Stage::MasterGain(gain) => s.master = gain.gain.target(),
                Stage::AnalysisTap(_) => {}
            }
        }
        s
    }
}

/// Write `controls` into every stage of `graph`.
///
/// Compressor settings always switch instantly; everything else follows
/// `automation`.
pub fn apply(graph: &mut ProcessingGraph, controls: &ControlState, automation: Automation) {
    let settings = StageSettings::from_controls(controls);
    for stage in graph.stages_mut() {
        match stage {
            Stage::Source(reader) => reader.detune.apply(settings.detune, automation),
            Stage::Peaking { band, eq } => eq.gain.apply(settings.band_gains[*band], automation),
            Stage::LowShelf(eq) => eq.gain.apply(settings.bass, automation),
            Stage::HighShelf(eq) => eq.gain.apply(settings.treble, automation),
            Stage::Compressor(comp) => comp.set_preset(settings.compressor),
            Stage::ReverbSend(send) => send.wet.gain.apply(settings.wet, automation),
            Stage::MasterGain(gain) => gain.gain.apply(settings.master, automation),
            Stage::AnalysisTap(_) => {}
        }
    }
}
