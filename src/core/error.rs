use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),
    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),
    #[error("Could not open video: {0}")]
    OpenFailed(PathBuf),
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Failed to read first frame during analysis")]
    FirstFrameUnreadable,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Invalid frame range: {0}")]
    InvalidRange(String),
}
