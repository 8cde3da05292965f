use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the recognition pipeline.
///
/// Per-frame outcomes such as "no face" or "below threshold" are not errors;
/// they are reported through [`crate::Decision`] and [`crate::Tick`].
#[derive(Debug, Error)]
pub enum Error {
    #[error("directory not found: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    #[error("no faces found for training")]
    EmptyTrainingSet,

    #[error("label {0} is not present in the label index")]
    UnknownLabel(u32),

    #[error("face detection failed: {0}")]
    DetectionFailure(String),

    #[error("training failed: {0}")]
    TrainingFailure(String),

    #[error("failed to load model from {}: {reason}", .path.display())]
    ModelLoadFailure { path: PathBuf, reason: String },

    #[error("failed to save model to {}: {reason}", .path.display())]
    ModelSaveFailure { path: PathBuf, reason: String },

    #[error("camera {device} unavailable: {reason}")]
    CameraUnavailable { device: String, reason: String },

    #[error("failed to decode {}: {reason}", .path.display())]
    Decode { path: PathBuf, reason: String },

    #[error("recognition session is closed")]
    SessionClosed,

    #[error("invalid face image: {0}")]
    InvalidFace(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
