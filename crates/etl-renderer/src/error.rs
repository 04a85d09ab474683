//! Error types returned by the back end.

use thiserror::Error;

/// Malformed command buffer.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("unknown render command tag {tag} at offset {offset}")]
    UnknownTag { tag: i32, offset: usize },

    #[error("render command {tag} at offset {offset} needs {needed} bytes, {available} available")]
    Truncated {
        tag: i32,
        offset: usize,
        needed: usize,
        available: usize,
    },

    #[error("{kind} payload {index} missing from command buffer")]
    MissingPayload { kind: &'static str, index: usize },
}

/// Frame capture failure (screenshot or video frame).
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("capture I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("image encoding failed: {0}")]
    Image(#[from] image::ImageError),

    #[error("capture region is empty")]
    EmptyRegion,
}

#[derive(Debug, Error)]
pub enum BackendError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Capture(#[from] CaptureError),
}

pub type BackendResult<T> = Result<T, BackendError>;
