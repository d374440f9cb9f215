//! Error types for livemidi-core

use thiserror::Error;

/// Result type alias for livemidi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the scheduler and its authoring surface.
///
/// Everything except `Midi`, `Config`, `Io` and `Toml*` is a
/// configuration error: it is raised at the authoring call site and is
/// meant to be fixed before playback starts.
#[derive(Debug, Error)]
pub enum Error {
    /// Focus/section bounds that do not parse or are inverted
    #[error("Invalid bounds: {start} - {end}")]
    InvalidBounds { start: String, end: String },

    /// Event type outside noteon/noteoff/sustainon/sustainoff
    #[error("Midi event {0} is not supported.")]
    UnsupportedEvent(String),

    /// Rest start that is not three integers
    #[error("Invalid starting position: {0}.")]
    InvalidStartPosition(String),

    /// Rest end that is not three integers
    #[error("Invalid ending position: {0}.")]
    InvalidEndPosition(String),

    /// Rest range whose start lies after its end
    #[error("Invalid range: {start} - {end}.")]
    InvalidRange { start: String, end: String },

    /// A position or coordinate that cannot be used where it was given
    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    /// `sequence` needs a concrete starting beat
    #[error("Wildcard \"*\" not allowed for beats in sequence.")]
    WildcardBeat,

    /// `pattern` computes its own offsets
    #[error("After is not allowed in a pattern action: {0}")]
    AfterInPattern(f64),

    /// Note name the theory lookup does not know
    #[error("Unknown note: {0}")]
    UnknownNote(String),

    /// Chord name the theory lookup does not know
    #[error("Unknown chord: {0}")]
    UnknownChord(String),

    /// MIDI backend error
    #[error("MIDI error: {0}")]
    Midi(String),

    /// Configuration file error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),
}
