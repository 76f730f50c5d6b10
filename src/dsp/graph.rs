//! Processing graph — the fixed vocal chain, built fresh for every play and
//! for every export.
//!
//! The topology is listed once in [`signal_chain`]; [`ProcessingGraph::build`]
//! walks that list so realtime and offline graphs are wired identically.

use std::sync::Arc;

use crate::config::StudioConfig;
use crate::controls::{ControlState, EQ_BAND_COUNT, FREQS};
use crate::mapper;

use super::analyser::Analyser;
use super::buffer::AudioBuffer;
use super::compressor::Compressor;
use super::filter::{BiquadFilter, FilterType};
use super::mixer::{Gain, ReverbSend};
use super::param::{AudioParam, Automation};
use super::reverb::{impulse_response, Convolver};
use super::source::SourceReader;

/// Frames per processing block. Filter gains and detune are read once per
/// block; gain stages are read per sample.
pub const RENDER_QUANTUM: usize = 128;

/// Q of every graphic equalizer band.
pub const EQ_Q: f64 = 1.5;
pub const BASS_FREQUENCY: f64 = 200.0;
pub const TREBLE_FREQUENCY: f64 = 3000.0;

/// One position in the signal chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageKind {
    Source,
    /// Graphic EQ band, indexing [`FREQS`].
    Peaking(usize),
    LowShelf,
    HighShelf,
    Compressor,
    ReverbSend,
    MasterGain,
    AnalysisTap,
    /// The buffers handed to [`ProcessingGraph::process`].
    Sink,
}

/// Connection order of the chain, source first, sink last.
pub fn signal_chain() -> Vec<StageKind> {
    let mut chain = Vec::with_capacity(EQ_BAND_COUNT + 8);
    chain.push(StageKind::Source);
    chain.extend((0..EQ_BAND_COUNT).map(StageKind::Peaking));
    chain.extend([
        StageKind::LowShelf,
        StageKind::HighShelf,
        StageKind::Compressor,
        StageKind::ReverbSend,
        StageKind::MasterGain,
        StageKind::AnalysisTap,
        StageKind::Sink,
    ]);
    chain
}

/// Where the sink's samples end up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputTarget {
    /// Pulled by the output device callback.
    Device,
    /// Collected into an export buffer.
    Offline,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GraphContext {
    pub sample_rate: f64,
    pub target: OutputTarget,
}

/// Portion of the source a graph plays, in source seconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlaybackWindow {
    pub offset: f64,
    pub length: f64,
}

/// A stereo biquad whose gain is an automatable parameter in dB.
#[derive(Debug, Clone)]
pub struct EqStage {
    pub gain: AudioParam,
    left: BiquadFilter,
    right: BiquadFilter,
}

impl EqStage {
    fn new(filter_type: FilterType, sample_rate: f64, frequency: f64, q: f64) -> Self {
        let filter = BiquadFilter::with_params(filter_type, sample_rate, frequency, q);
        EqStage {
            gain: AudioParam::new(0.0, -40.0, 40.0),
            left: filter.clone(),
            right: filter,
        }
    }

    pub fn filter_type(&self) -> FilterType {
        self.left.filter_type
    }

    pub fn frequency(&self) -> f64 {
        self.left.frequency
    }

    pub fn q(&self) -> f64 {
        self.left.q
    }

    fn process(&mut self, time: f64, left: &mut [f32], right: &mut [f32]) {
        let gain_db = self.gain.value_at(time);
        self.left.set_gain_db(gain_db);
        self.right.set_gain_db(gain_db);
        self.left.process_block(left);
        self.right.process_block(right);
    }
}

/// A live stage of the graph.
#[derive(Debug)]
pub enum Stage {
    Source(SourceReader),
    Peaking { band: usize, eq: EqStage },
    LowShelf(EqStage),
    HighShelf(EqStage),
    Compressor(Compressor),
    ReverbSend(ReverbSend),
    MasterGain(Gain),
    AnalysisTap(Analyser),
}

impl Stage {
    pub fn kind(&self) -> StageKind {
        match self {
            Stage::Source(_) => StageKind::Source,
            Stage::Peaking { band, .. } => StageKind::Peaking(*band),
            Stage::LowShelf(_) => StageKind::LowShelf,
            Stage::HighShelf(_) => StageKind::HighShelf,
            Stage::Compressor(_) => StageKind::Compressor,
            Stage::ReverbSend(_) => StageKind::ReverbSend,
            Stage::MasterGain(_) => StageKind::MasterGain,
            Stage::AnalysisTap(_) => StageKind::AnalysisTap,
        }
    }

    fn process(&mut self, time: f64, sample_rate: f64, left: &mut [f32], right: &mut [f32]) {
        match self {
            Stage::Source(reader) => reader.render(time, left, right),
            Stage::Peaking { eq, .. } | Stage::LowShelf(eq) | Stage::HighShelf(eq) => {
                eq.process(time, left, right)
            }
            Stage::Compressor(comp) => comp.process_block(left, right),
            Stage::ReverbSend(send) => send.process(time, sample_rate, left, right),
            Stage::MasterGain(gain) => gain.process(time, sample_rate, left, right),
            Stage::AnalysisTap(analyser) => analyser.tap(left, right),
        }
    }
}

/// One instantiation of the signal chain, rooted at its own source reader.
#[derive(Debug)]
pub struct ProcessingGraph {
    stages: Vec<Stage>,
    context: GraphContext,
}

impl ProcessingGraph {
    /// Instantiate the chain for `window` of `source` and apply `controls`
    /// instantly. Nothing is audible before the first `process` call, so
    /// there is nothing to ramp from.
    pub fn build(
        source: Arc<AudioBuffer>,
        window: PlaybackWindow,
        controls: &ControlState,
        context: GraphContext,
        config: &StudioConfig,
    ) -> Self {
        let sr = context.sample_rate;
        let stages = signal_chain()
            .into_iter()
            .filter_map(|kind| match kind {
                StageKind::Source => {
                    let mut reader = SourceReader::new(source.clone(), sr);
                    reader.start(window.offset, window.length);
                    Some(Stage::Source(reader))
                }
                StageKind::Peaking(band) => Some(Stage::Peaking {
                    band,
                    eq: EqStage::new(FilterType::Peaking, sr, FREQS[band], EQ_Q),
                }),
                StageKind::LowShelf => Some(Stage::LowShelf(EqStage::new(
                    FilterType::LowShelf,
                    sr,
                    BASS_FREQUENCY,
                    1.0,
                ))),
                StageKind::HighShelf => Some(Stage::HighShelf(EqStage::new(
                    FilterType::HighShelf,
                    sr,
                    TREBLE_FREQUENCY,
                    1.0,
                ))),
                StageKind::Compressor => Some(Stage::Compressor(Compressor::new(sr))),
                StageKind::ReverbSend => {
                    let reverb = &config.reverb;
                    let impulse =
                        impulse_response(reverb.seconds, sr as u32, 2, reverb.decay, reverb.seed);
                    Some(Stage::ReverbSend(ReverbSend::new(Convolver::new(&impulse, true))))
                }
                StageKind::MasterGain => Some(Stage::MasterGain(Gain::new(1.0))),
                StageKind::AnalysisTap => {
                    Some(Stage::AnalysisTap(Analyser::new(config.analyser.clone())))
                }
                StageKind::Sink => None,
            })
            .collect();

        let mut graph = ProcessingGraph { stages, context };
        mapper::apply(&mut graph, controls, Automation::Instant);
        graph
    }

    pub fn context(&self) -> GraphContext {
        self.context
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stages_mut(&mut self) -> &mut [Stage] {
        &mut self.stages
    }

    /// Kinds of the instantiated stages in connection order, ending at the sink.
    pub fn stage_kinds(&self) -> Vec<StageKind> {
        self.stages
            .iter()
            .map(Stage::kind)
            .chain(std::iter::once(StageKind::Sink))
            .collect()
    }

    /// Render `left.len()` frames starting at context time `time` into the
    /// sink buffers, one quantum at a time.
    pub fn process(&mut self, time: f64, left: &mut [f32], right: &mut [f32]) {
        let sr = self.context.sample_rate;
        let frames = left.len().min(right.len());
        let mut start = 0;
        while start < frames {
            let end = (start + RENDER_QUANTUM).min(frames);
            let t = time + start as f64 / sr;
            let l = &mut left[start..end];
            let r = &mut right[start..end];
            for stage in self.stages.iter_mut() {
                stage.process(t, sr, l, r);
            }
            start = end;
        }
    }

    pub fn source(&self) -> Option<&SourceReader> {
        self.stages.iter().find_map(|s| match s {
            Stage::Source(reader) => Some(reader),
            _ => None,
        })
    }

    /// True once the source reader ran off the end of its window by itself.
    pub fn source_ended(&self) -> bool {
        self.source().is_some_and(SourceReader::has_ended)
    }

    /// Stop the source reader. Repeated calls are no-ops.
    pub fn halt(&mut self) {
        for stage in self.stages.iter_mut() {
            if let Stage::Source(reader) = stage {
                reader.halt();
            }
        }
    }

    pub fn analyser(&self) -> Option<&Analyser> {
        self.stages.iter().find_map(|s| match s {
            Stage::AnalysisTap(a) => Some(a),
            _ => None,
        })
    }

    pub fn analyser_mut(&mut self) -> Option<&mut Analyser> {
        self.stages.iter_mut().find_map(|s| match s {
            Stage::AnalysisTap(a) => Some(a),
            _ => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReverbSettings;
    use crate::dsp::source::ReaderState;

    fn short_reverb() -> StudioConfig {
        StudioConfig {
            reverb: ReverbSettings {
                seconds: 0.1,
                ..ReverbSettings::default()
            },
            ..StudioConfig::default()
        }
    }

    fn noise_source(frames: usize, rate: u32) -> Arc<AudioBuffer> {
        let left: Vec<f32> = (0..frames).map(|i| ((i * 7919) % 200) as f32 / 100.0 - 1.0).collect();
        let right: Vec<f32> = left.iter().map(|s| -s * 0.5).collect();
        Arc::new(AudioBuffer::new(vec![left, right], rate))
    }

    fn build(source: Arc<AudioBuffer>, window: PlaybackWindow, controls: &ControlState) -> ProcessingGraph {
        let rate = source.sample_rate() as f64;
        ProcessingGraph::build(
            source,
            window,
            controls,
            GraphContext {
                sample_rate: rate,
                target: OutputTarget::Offline,
            },
            &short_reverb(),
        )
    }

    #[test]
    fn chain_order_is_fixed() {
        let chain = signal_chain();
        assert_eq!(chain.len(), 1 + EQ_BAND_COUNT + 7);
        assert_eq!(chain[0], StageKind::Source);
        assert_eq!(chain[1], StageKind::Peaking(0));
        assert_eq!(chain[EQ_BAND_COUNT], StageKind::Peaking(EQ_BAND_COUNT - 1));
        assert_eq!(
            &chain[EQ_BAND_COUNT + 1..],
            &[
                StageKind::LowShelf,
                StageKind::HighShelf,
                StageKind::Compressor,
                StageKind::ReverbSend,
                StageKind::MasterGain,
                StageKind::AnalysisTap,
                StageKind::Sink,
            ]
        );
    }

    #[test]
    fn built_graph_follows_chain() {
        let graph = build(
            noise_source(1000, 8000),
            PlaybackWindow { offset: 0.0, length: 0.1 },
            &ControlState::default(),
        );
        assert_eq!(graph.stage_kinds(), signal_chain());
        assert_eq!(graph.context().target, OutputTarget::Offline);
        assert_eq!(graph.context().sample_rate, 8000.0);
        for stage in graph.stages() {
            match stage {
                Stage::Peaking { band, eq } => {
                    assert_eq!(eq.frequency(), FREQS[*band], "band {band} frequency");
                    assert_eq!(eq.q(), EQ_Q);
                    assert_eq!(eq.filter_type(), FilterType::Peaking);
                }
                Stage::LowShelf(eq) => assert_eq!(eq.frequency(), BASS_FREQUENCY),
                Stage::HighShelf(eq) => assert_eq!(eq.frequency(), TREBLE_FREQUENCY),
                _ => {}
            }
        }
    }

    #[test]
    fn neutral_controls_pass_source_through() {
        let source = noise_source(1000, 8000);
        let mut graph = build(
            source.clone(),
            PlaybackWindow { offset: 0.0, length: 1.0 },
            &ControlState::default(),
        );
        let mut l = vec![0.0; 1000];
        let mut r = vec![0.0; 1000];
        graph.process(0.0, &mut l, &mut r);
        assert_eq!(Some(l.as_slice()), source.channel(0));
        assert_eq!(Some(r.as_slice()), source.channel(1));
    }

    #[test]
    fn window_bounds_the_source() {
        let source = noise_source(8000, 8000);
        let mut graph = build(
            source.clone(),
            PlaybackWindow { offset: 0.25, length: 0.25 },
            &ControlState::default(),
        );
        let mut l = vec![0.0; 4000];
        let mut r = vec![0.0; 4000];
        graph.process(0.0, &mut l, &mut r);
        let original = source.channel(0).unwrap_or_default();
        assert_eq!(&l[..2000], &original[2000..4000]);
        assert!(l[2000..].iter().all(|&s| s == 0.0));
        assert!(graph.source_ended());
    }

    #[test]
    fn halt_silences_and_is_repeatable() {
        let mut graph = build(
            noise_source(8000, 8000),
            PlaybackWindow { offset: 0.0, length: 1.0 },
            &ControlState::default(),
        );
        graph.halt();
        graph.halt();
        assert_eq!(graph.source().map(SourceReader::state), Some(ReaderState::Halted));
        assert!(!graph.source_ended());
        let mut l = vec![1.0; 256];
        let mut r = vec![1.0; 256];
        graph.process(0.0, &mut l, &mut r);
        assert!(l.iter().all(|&s| s == 0.0));
    }

    #[test]
    fn analysis_tap_sees_output() {
        let mut graph = build(
            noise_source(4096, 8000),
            PlaybackWindow { offset: 0.0, length: 1.0 },
            &ControlState::default(),
        );
        let mut l = vec![0.0; 2048];
        let mut r = vec![0.0; 2048];
        graph.process(0.0, &mut l, &mut r);
        let mut wave = vec![0u8; 2048];
        if let Some(a) = graph.analyser() {
            a.time_domain_data(&mut wave);
        }
        assert!(wave.iter().any(|&b| b != 128), "analyser should have recorded audio");
    }
}
