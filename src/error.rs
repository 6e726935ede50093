//! Error type shared by the whole crate.

use thiserror::Error;

/// Boxed error raised by an external collaborator (detector or tracker).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum Error {
    /// The frame source could not be opened.
    #[error("unable to open video source: {0}")]
    SourceUnavailable(String),

    /// A required collaborator (detector or tracker) is missing at startup.
    #[error("{role} unavailable: {reason}")]
    CollaboratorUnavailable { role: &'static str, reason: String },

    #[error("detector failed: {0}")]
    Detector(#[source] BoxError),

    #[error("tracker failed: {0}")]
    Tracker(#[source] BoxError),

    /// The source reported a genuine read failure (not end of stream).
    #[error("failed to read frame: {0}")]
    FrameRead(String),

    #[error("failed to write frame: {0}")]
    FrameWrite(String),

    /// A frame does not match the dimensions the session was initialised with.
    #[error("frame is {got_width}x{got_height}, session expects {width}x{height}")]
    FrameSize {
        width: u32,
        height: u32,
        got_width: u32,
        got_height: u32,
    },

    /// `run` was called on a session that already stopped after a failure.
    #[error("session already stopped")]
    SessionStopped,

    #[error("invalid configuration: {0}")]
    Config(String),

    /// A line of a detection/track dump could not be parsed.
    #[error("malformed dump at line {line}: {source}")]
    Dump {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Image(#[from] image::ImageError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
