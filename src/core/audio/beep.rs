//! Completion-beep detection over a narrow frequency band.
//!
//! The detector assumes the beep is a single strong tone: per STFT frame it
//! keeps the strongest bin inside `target ± tolerance`, not the band sum, so
//! broadband noise in the band does not add up to a false beep.

use super::capability::AudioCapability;
use super::error::AudioError;
use crate::config::BeepConfig;
use crate::core::stats;
use crate::core::video::VideoInfo;
use log::{debug, info, warn};
use rayon::prelude::*;
use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;
use std::path::Path;

/// 检测到的提示音
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BeepEvent {
    pub time_seconds: f64,
    pub frame_index: usize,
}

pub struct BeepDetector {
    config: BeepConfig,
}

impl BeepDetector {
    pub fn new(config: BeepConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &BeepConfig {
        &self.config
    }

    /// Midpoint timestamps (seconds) of every beep in `samples`.
    pub fn detect(&self, samples: &[f32], sample_rate: u32) -> Vec<f64> {
        let cfg = &self.config;
        if samples.is_empty() || sample_rate == 0 || cfg.n_fft == 0 || cfg.hop_length == 0 {
            return Vec::new();
        }

        let bins = self.target_bins(sample_rate);
        if bins.is_empty() {
            warn!(
                "⚠️ No STFT bins within {:.1}±{:.1} Hz; increase tolerance to detect beeps",
                cfg.target_frequency, cfg.frequency_tolerance
            );
            return Vec::new();
        }
        debug!(
            "Targeting {:.1} Hz ±{:.1} Hz, resolution {:.1} Hz, {} bins",
            cfg.target_frequency,
            cfg.frequency_tolerance,
            sample_rate as f64 / cfg.n_fft as f64,
            bins.len()
        );

        let energy = self.band_energy(samples, &bins);
        let Some(threshold) = stats::percentile(&energy, cfg.threshold_percentile) else {
            return Vec::new();
        };
        debug!(
            "Energy stats: mean={:.2}, max={:.2}, threshold={:.2}",
            stats::mean(&energy).unwrap_or(0.0),
            energy.iter().cloned().fold(0.0f32, f32::max),
            threshold
        );

        let frame_time = |idx: usize| (idx * cfg.hop_length) as f64 / sample_rate as f64;
        let min_duration = cfg.min_duration as f64;
        let mut beeps = Vec::new();
        let mut beep_start: Option<f64> = None;

        for (idx, &e) in energy.iter().enumerate() {
            let above = e as f64 > threshold;
            match (above, beep_start) {
                (true, None) => beep_start = Some(frame_time(idx)),
                (false, Some(start)) => {
                    push_if_long_enough(&mut beeps, start, frame_time(idx), min_duration);
                    beep_start = None;
                }
                _ => {}
            }
        }
        if let Some(start) = beep_start {
            push_if_long_enough(&mut beeps, start, frame_time(energy.len() - 1), min_duration);
        }

        info!("📊 Detected {} beeps at {:?}", beeps.len(), beeps);
        beeps
    }

    /// Beeps in the video's audio track as `(time, frame)` pairs.
    ///
    /// Frames outside `[0, frame_count)` are dropped, and with
    /// `expected_duration > 0` so are beeps earlier than `expected_duration`.
    pub fn find_completion_beeps(
        &self,
        capability: &AudioCapability,
        video_path: &Path,
        video: &VideoInfo,
        expected_duration: f64,
    ) -> Result<Vec<BeepEvent>, AudioError> {
        let extractor = capability.extractor()?;
        if video.fps <= 0.0 {
            return Err(AudioError::Probe(format!("invalid fps {}", video.fps)));
        }

        let samples = extractor.extract_mono(video_path, self.config.sample_rate)?;
        let times = self.detect(&samples, self.config.sample_rate);
        Ok(beeps_to_events(&times, video.fps, video.frame_count, expected_duration))
    }

    /// Bin indices whose center frequency lies in `target ± tolerance`.
    fn target_bins(&self, sample_rate: u32) -> Vec<usize> {
        let cfg = &self.config;
        let resolution = sample_rate as f64 / cfg.n_fft as f64;
        let lo = (cfg.target_frequency - cfg.frequency_tolerance) as f64;
        let hi = (cfg.target_frequency + cfg.frequency_tolerance) as f64;
        (0..=cfg.n_fft / 2)
            .filter(|&k| {
                let f = k as f64 * resolution;
                f >= lo && f <= hi
            })
            .collect()
    }

    /// Per-frame maximum STFT magnitude over `bins`.
    ///
    /// Frames are centered: the signal is zero-padded by `n_fft / 2` on both
    /// sides and frame `i` covers samples around `i * hop_length`.
    fn band_energy(&self, samples: &[f32], bins: &[usize]) -> Vec<f32> {
        let n_fft = self.config.n_fft;
        let hop = self.config.hop_length;
        let pad = n_fft / 2;

        let mut padded = vec![0.0f32; samples.len() + 2 * pad];
        padded[pad..pad + samples.len()].copy_from_slice(samples);
        let n_frames = 1 + (padded.len() - n_fft) / hop;

        let window: Vec<f32> = (0..n_fft)
            .map(|n| 0.5 - 0.5 * (2.0 * PI * n as f32 / n_fft as f32).cos())
            .collect();
        let fft = FftPlanner::<f32>::new().plan_fft_forward(n_fft);

        (0..n_frames)
            .into_par_iter()
            .map(|i| {
                let start = i * hop;
                let mut buffer: Vec<Complex<f32>> = padded[start..start + n_fft]
                    .iter()
                    .zip(window.iter())
                    .map(|(&s, &w)| Complex::new(s * w, 0.0))
                    .collect();
                fft.process(&mut buffer);
                bins.iter().map(|&k| buffer[k].norm()).fold(0.0f32, f32::max)
            })
            .collect()
    }
}

impl Default for BeepDetector {
    fn default() -> Self {
        Self::new(BeepConfig::default())
    }
}

fn push_if_long_enough(beeps: &mut Vec<f64>, start: f64, end: f64, min_duration: f64) {
    let duration = end - start;
    if duration >= min_duration {
        beeps.push(start + duration / 2.0);
    }
}

/// Map beep timestamps onto video frames.
pub fn beeps_to_events(
    times: &[f64],
    fps: f64,
    frame_count: usize,
    expected_duration: f64,
) -> Vec<BeepEvent> {
    if fps <= 0.0 {
        return Vec::new();
    }
    let events: Vec<BeepEvent> = times
        .iter()
        .filter_map(|&t| {
            let frame = (t * fps).floor();
            (frame >= 0.0 && (frame as usize) < frame_count).then(|| BeepEvent {
                time_seconds: t,
                frame_index: frame as usize,
            })
        })
        .collect();

    if expected_duration <= 0.0 {
        return events;
    }
    let before = events.len();
    let kept: Vec<BeepEvent> = events
        .into_iter()
        .filter(|e| e.time_seconds >= expected_duration)
        .collect();
    if kept.len() < before {
        info!(
            "Dropped {} beeps earlier than the {:.1}s expected run",
            before - kept.len(),
            expected_duration
        );
    }
    kept
}
