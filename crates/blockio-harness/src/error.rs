//! Harness error type.

use blockio_core::BlockIoError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("block io: {0}")]
    Block(#[from] BlockIoError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{command} needs a regular file with a known size")]
    Unsized { command: &'static str },
    #[error("short write: {written} of {wanted} bytes accepted")]
    ShortWrite { wanted: usize, written: usize },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl HarnessError {
    /// errno to attach to a log record, when the failure came from the stream.
    #[must_use]
    pub fn errno(&self) -> Option<i32> {
        match self {
            Self::Block(e) => Some(e.errno()),
            Self::Io(e) => e.raw_os_error(),
            _ => None,
        }
    }
}
