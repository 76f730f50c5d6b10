use thiserror::Error;

/// Every failure the studio core can report to its caller.
///
/// Most transport operations treat missing state as a no-op instead of
/// returning one of these; see the individual operations.
#[derive(Debug, Error)]
pub enum StudioError {
    /// The uploaded bytes are not audio this build can decode.
    #[error("could not decode audio: {0}")]
    DecodeFailure(String),

    /// Playback or export was requested before any audio was loaded.
    #[error("no audio source loaded")]
    NoSourceLoaded,

    /// A trim range that is inverted or falls outside the source.
    #[error("invalid trim window {start:.2}s..{end:.2}s")]
    InvalidTrimWindow { start: f64, end: f64 },

    /// Time-range text that does not read as `m:ss-m:ss`.
    #[error("malformed time range {0:?}")]
    MalformedTimeRange(String),

    /// The output device could not be opened, or was already closed.
    #[error("output device unavailable: {0}")]
    DeviceUnavailable(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[cfg(feature = "native")]
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "native")]
    #[error("background task failed: {0}")]
    Task(String),
}
