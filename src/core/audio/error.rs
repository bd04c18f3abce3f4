use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AudioError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[cfg(feature = "audio")]
    #[error("WAV format error: {0}")]
    Wav(#[from] hound::Error),
    #[error("Resample error: {0}")]
    Resample(String),
    #[error("Audio support unavailable: {0}")]
    Unavailable(String),
    #[error("No audio track found for {0}")]
    NoAudioTrack(PathBuf),
    #[error("Video probe failed: {0}")]
    Probe(String),
}
