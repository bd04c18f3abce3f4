pub mod beep;
pub mod capability;
pub mod error;
pub mod range;
#[cfg(feature = "audio")]
pub mod utils;

pub use beep::{beeps_to_events, BeepDetector, BeepEvent};
#[cfg(feature = "audio")]
pub use capability::WavAudioExtractor;
pub use capability::{AudioCapability, AudioExtractor, FfmpegAudioExtractor};
pub use error::AudioError;
pub use range::{compute_range, run_duration_confidence, select_range, AnalysisRange, RangeSelection};
#[cfg(feature = "audio")]
pub use utils::{load_wav_mono_at, load_wav_mono_f32, resample_mono};
