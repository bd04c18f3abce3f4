//! Audio extraction and the capability handle that carries it.

use super::error::AudioError;
use log::{debug, info, warn};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

/// Pulls a mono audio track out of a video at a fixed sample rate.
pub trait AudioExtractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract_mono(&self, video_path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError>;
}

/// 音频能力：启动时解析一次，之后注入到检测器
#[derive(Clone)]
pub enum AudioCapability {
    Available(Arc<dyn AudioExtractor>),
    Unavailable(String),
}

impl AudioCapability {
    /// Prefer ffmpeg, fall back to WAV sidecar files when the `audio` feature
    /// is enabled, otherwise report unavailable.
    pub fn resolve() -> Self {
        if FfmpegAudioExtractor::is_available() {
            info!("🔧 Audio capability: ffmpeg");
            return Self::Available(Arc::new(FfmpegAudioExtractor::new()));
        }
        Self::without_ffmpeg()
    }

    #[cfg(feature = "audio")]
    fn without_ffmpeg() -> Self {
        info!("🔧 Audio capability: WAV files (ffmpeg not found)");
        Self::Available(Arc::new(WavAudioExtractor))
    }

    #[cfg(not(feature = "audio"))]
    fn without_ffmpeg() -> Self {
        warn!("⚠️ Audio capability unavailable: no ffmpeg and built without the `audio` feature");
        Self::Unavailable("ffmpeg not found and WAV support not compiled in".into())
    }

    pub fn with_extractor<E: AudioExtractor + 'static>(extractor: E) -> Self {
        Self::Available(Arc::new(extractor))
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    pub fn extractor(&self) -> Result<&dyn AudioExtractor, AudioError> {
        match self {
            Self::Available(extractor) => Ok(extractor.as_ref()),
            Self::Unavailable(reason) => Err(AudioError::Unavailable(reason.clone())),
        }
    }
}

impl std::fmt::Debug for AudioCapability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Available(extractor) => f.debug_tuple("Available").field(&extractor.name()).finish(),
            Self::Unavailable(reason) => f.debug_tuple("Unavailable").field(reason).finish(),
        }
    }
}

/// Decodes the audio track with the `ffmpeg` binary into signed 16-bit PCM.
#[derive(Debug, Clone)]
pub struct FfmpegAudioExtractor {
    binary: PathBuf,
}

impl FfmpegAudioExtractor {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("ffmpeg"),
        }
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// Whether the default `ffmpeg` on `PATH` runs.
    pub fn is_available() -> bool {
        Self::new().binary_runs()
    }

    /// Whether this extractor's binary answers `-version`.
    pub fn binary_runs(&self) -> bool {
        Command::new(&self.binary)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }
}

impl Default for FfmpegAudioExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl AudioExtractor for FfmpegAudioExtractor {
    fn name(&self) -> &'static str {
        "ffmpeg"
    }

    fn extract_mono(&self, video_path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
        if !video_path.exists() {
            return Err(AudioError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{:?} does not exist", video_path),
            )));
        }
        info!("🎵 Extracting audio from {:?} at {} Hz", video_path, sample_rate);

        let mut child = Command::new(&self.binary)
            .args(["-v", "error", "-nostdin", "-i"])
            .arg(video_path)
            .args(["-vn", "-ac", "1", "-ar"])
            .arg(sample_rate.to_string())
            .args(["-f", "s16le", "pipe:1"])
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()?;

        let mut bytes = Vec::new();
        if let Some(mut stdout) = child.stdout.take() {
            stdout.read_to_end(&mut bytes)?;
        }
        let status = child.wait()?;

        if bytes.is_empty() {
            warn!("⚠️ ffmpeg produced no audio for {:?} ({})", video_path, status);
            return Err(AudioError::NoAudioTrack(video_path.to_path_buf()));
        }
        if !status.success() {
            debug!("ffmpeg exited with {} after {} bytes", status, bytes.len());
        }

        Ok(pcm_s16le_to_f32(&bytes))
    }
}

fn pcm_s16le_to_f32(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(2)
        .map(|b| i16::from_le_bytes([b[0], b[1]]) as f32 / i16::MAX as f32)
        .collect()
}

/// Reads the audio track from a WAV file: the path itself when it is a `.wav`,
/// otherwise a sibling `<stem>.wav` next to the video.
#[cfg(feature = "audio")]
#[derive(Debug, Clone, Copy, Default)]
pub struct WavAudioExtractor;

#[cfg(feature = "audio")]
impl WavAudioExtractor {
    pub fn wav_path_for(video_path: &Path) -> PathBuf {
        let is_wav = video_path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if is_wav {
            video_path.to_path_buf()
        } else {
            video_path.with_extension("wav")
        }
    }
}

#[cfg(feature = "audio")]
impl AudioExtractor for WavAudioExtractor {
    fn name(&self) -> &'static str {
        "wav"
    }

    fn extract_mono(&self, video_path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
        let wav_path = Self::wav_path_for(video_path);
        if !wav_path.exists() {
            return Err(AudioError::NoAudioTrack(video_path.to_path_buf()));
        }
        super::utils::load_wav_mono_at(&wav_path, sample_rate)
    }
}
