//! DSP Engine — the vocal processing chain in pure Rust.
//!
//! The same graph code drives both realtime playback (pulled by the host's
//! audio callback) and offline WAV export, so the two always sound alike.

pub mod analyser;
pub mod buffer;
pub mod compressor;
pub mod filter;
pub mod graph;
pub mod mixer;
pub mod param;
pub mod renderer;
pub mod reverb;
pub mod source;
