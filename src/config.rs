//! Tunables for brightness analysis and beep detection.

use serde::{Deserialize, Serialize};

/// Default LRU capacity of the frame cache.
pub const DEFAULT_FRAME_CACHE_SIZE: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub morphological_kernel_size: usize,
    pub background_percentile: f32,
    pub noise_floor: f32,
    /// Threshold reported when no background ROI is configured. Display only.
    pub manual_threshold: f32,
    pub frame_cache_size: usize,
    /// Emit a progress message every N processed frames.
    pub progress_interval: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            morphological_kernel_size: 3,
            background_percentile: 90.0,
            noise_floor: 0.0,
            manual_threshold: 5.0,
            frame_cache_size: DEFAULT_FRAME_CACHE_SIZE,
            progress_interval: 10,
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Kernel size rounded down to the nearest odd value, never below 1.
    pub fn normalized_kernel_size(&self) -> usize {
        normalize_kernel_size(self.morphological_kernel_size)
    }
}

/// Even sizes round down (`4 -> 3`), `0` becomes `1`.
pub fn normalize_kernel_size(size: usize) -> usize {
    if size % 2 == 1 {
        size
    } else {
        size.saturating_sub(1).max(1)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeepConfig {
    /// Rate the audio track is resampled to before the STFT.
    pub sample_rate: u32,
    pub n_fft: usize,
    pub hop_length: usize,
    pub target_frequency: f32,
    pub frequency_tolerance: f32,
    pub threshold_percentile: f32,
    /// Minimum beep length in seconds.
    pub min_duration: f32,
}

impl Default for BeepConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            n_fft: 2048,
            hop_length: 512,
            target_frequency: 7000.0,
            frequency_tolerance: 50.0,
            threshold_percentile: 95.0,
            min_duration: 0.1,
        }
    }
}

impl BeepConfig {
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}
