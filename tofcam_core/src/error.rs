use thiserror::Error;

/// Runtime faults of an acquisition session.
#[derive(Debug, Error, Clone)]
pub enum CamError {
    /// The serial device could not be opened or configured.
    #[error("camera unavailable: {0}")]
    Unavailable(String),
    /// The framer lost the byte stream (timeout or no packet prefix found).
    #[error("stream lost: {0}")]
    StreamLost(&'static str),
    /// Blocking latch exceeded its budget without a fresh frame.
    #[error("timed out waiting for a frame")]
    Timeout,
    /// An operation was called in the wrong lifecycle state.
    #[error("invalid state: {0}")]
    State(&'static str),
    #[error("io error: {0}")]
    Io(String),
}

/// Construction-time validation failures.
#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing transport")]
    MissingTransport,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
