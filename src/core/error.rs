use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PrepError {
    #[error("input path {0} is not a directory")]
    NotADirectory(PathBuf),
    #[error("modification {0} is not registered")]
    UnregisteredModification(String),
    #[error("modification {0} is not unique")]
    DuplicateModification(String),
    #[error("modification {modification}: option {option} {reason}")]
    InvalidOption {
        modification: &'static str,
        option: String,
        reason: String,
    },
    #[error("incorrect bounds, {lower} > {upper}")]
    MalformedBounds { lower: i64, upper: i64 },
    #[error("no modification range covers permuted index {0}")]
    UnassignedFrame(usize),
    #[error("split ratios must add up to one, got {0}")]
    InvalidSplitRatios(f64),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("image error: {0}")]
    Image(#[from] image::error::ImageError),
    #[error("settings error: {0}")]
    Settings(#[from] serde_json::Error),
}
