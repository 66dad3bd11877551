use std::num::{ParseFloatError, ParseIntError};
use thiserror::Error;

/// Errors produced by playback sessions and decoding backends.
#[derive(Error, Debug)]
pub enum PlayerError {
    /// I/O failure while reading a source or config file
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// The named source does not exist
    #[error("source not found: {0}")]
    NotFound(String),

    /// Container or codec the backend cannot handle
    #[error("unsupported codec: {0}")]
    UnsupportedCodec(String),

    /// Source exists but cannot be parsed
    #[error("corrupt source: {0}")]
    Corrupt(String),

    /// A packet failed to decode
    #[error("decode failure: {0}")]
    DecodeFailure(String),

    /// The backend cannot reposition this source
    #[error("unseekable: {0}")]
    Unseekable(String),

    /// Operation not legal in the current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// `open` called before [`crate::init`]
    #[error("runtime not initialized, call vdkplay::init() first")]
    NotInitialized,

    /// Cue bounds outside the media or out of order
    #[error("invalid cue range: in={cue_in} out={cue_out}")]
    InvalidCueRange {
        /// Requested first frame
        cue_in: u64,
        /// Requested last frame
        cue_out: u64,
    },

    /// Malformed configuration value or file
    #[error("config error: {0}")]
    Config(String),

    /// Integer setting that does not parse
    #[error("parse int error: {0}")]
    ParseInt(#[from] ParseIntError),

    /// Floating-point setting that does not parse
    #[error("parse float error: {0}")]
    ParseFloat(#[from] ParseFloatError),
}

/// Coarse classification of a [`PlayerError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The source could not be opened (missing, unsupported, corrupt).
    OpenFailure,
    /// A packet could not be decoded.
    DecodeFailure,
    /// The backend could not honor a seek.
    SeekFailure,
    /// The call is not legal in the current state or got bad arguments.
    Usage,
    /// Anything else (configuration, io).
    Other,
}

impl PlayerError {
    /// Returns the taxonomy bucket of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            PlayerError::NotFound(_)
            | PlayerError::UnsupportedCodec(_)
            | PlayerError::Corrupt(_)
            | PlayerError::NotInitialized => ErrorKind::OpenFailure,
            PlayerError::DecodeFailure(_) => ErrorKind::DecodeFailure,
            PlayerError::Unseekable(_) => ErrorKind::SeekFailure,
            PlayerError::InvalidState(_) | PlayerError::InvalidCueRange { .. } => ErrorKind::Usage,
            PlayerError::Io(_)
            | PlayerError::Config(_)
            | PlayerError::ParseInt(_)
            | PlayerError::ParseFloat(_) => ErrorKind::Other,
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, PlayerError>;
