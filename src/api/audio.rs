//! 提示音检测任务 - 一次性后台任务，独立取消

use super::worker::{CancelToken, TerminalEvent, WorkerHandle};
use crate::config::BeepConfig;
use crate::core::audio::{select_range, AudioCapability, AudioError, BeepDetector, BeepEvent, RangeSelection};
use crate::core::video::VideoInfo;
use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::mpsc::Sender;

/// 提示音检测请求
#[derive(Debug, Clone)]
pub struct BeepRequest {
    pub video_path: PathBuf,
    pub video: VideoInfo,
    /// Seconds of video expected before the completion beep; 0 disables the filter.
    pub expected_duration: f64,
    pub config: BeepConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DetectionEvent {
    Status(String),
    Finished {
        beeps: Vec<BeepEvent>,
        selection: RangeSelection,
    },
    /// Audio support is missing; the caller should fall back to manual ranges.
    Unavailable(String),
    Failed(String),
    Cancelled,
}

impl TerminalEvent for DetectionEvent {
    fn is_terminal(&self) -> bool {
        !matches!(self, DetectionEvent::Status(_))
    }
}

pub struct BeepDetectionWorker;

impl BeepDetectionWorker {
    pub fn spawn(
        capability: AudioCapability,
        request: BeepRequest,
    ) -> Result<WorkerHandle<DetectionEvent>, AudioError> {
        let handle = WorkerHandle::spawn("beep-detection", move |tx, cancel| {
            let terminal = Self::run(&capability, &request, &cancel, &tx);
            let _ = tx.send(terminal);
        })?;
        Ok(handle)
    }

    fn run(
        capability: &AudioCapability,
        request: &BeepRequest,
        cancel: &CancelToken,
        tx: &Sender<DetectionEvent>,
    ) -> DetectionEvent {
        let status = |message: String| {
            let _ = tx.send(DetectionEvent::Status(message));
        };

        let extractor = match capability.extractor() {
            Ok(extractor) => extractor,
            Err(e) => {
                warn!("⚠️ Beep detection skipped: {}", e);
                return DetectionEvent::Unavailable(e.to_string());
            }
        };
        if request.video.fps <= 0.0 {
            return DetectionEvent::Failed(format!("invalid fps {}", request.video.fps));
        }

        status(format!("Extracting audio from {:?}", request.video_path));
        let samples = match extractor.extract_mono(&request.video_path, request.config.sample_rate) {
            Ok(samples) => samples,
            Err(e) => {
                error!("❌ Audio extraction failed: {}", e);
                return DetectionEvent::Failed(e.to_string());
            }
        };
        if cancel.is_cancelled() {
            return DetectionEvent::Cancelled;
        }

        status(format!(
            "Analyzing {:.1}s of audio for {:.0} Hz beeps",
            samples.len() as f64 / request.config.sample_rate as f64,
            request.config.target_frequency
        ));
        let detector = BeepDetector::new(request.config.clone());
        let times = detector.detect(&samples, request.config.sample_rate);
        if cancel.is_cancelled() {
            return DetectionEvent::Cancelled;
        }

        let beeps = crate::core::audio::beeps_to_events(
            &times,
            request.video.fps,
            request.video.frame_count,
            request.expected_duration,
        );
        let selection = select_range(
            &beeps,
            request.expected_duration,
            request.video.fps,
            request.video.frame_count,
        );
        info!("✅ Beep detection finished: {} candidates", beeps.len());
        DetectionEvent::Finished { beeps, selection }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::audio::{AnalysisRange, AudioExtractor};
    use std::f32::consts::PI;
    use std::path::Path;

    /// 直接返回合成信号的提取器
    struct SyntheticExtractor {
        beeps_at: Vec<f32>,
    }

    impl AudioExtractor for SyntheticExtractor {
        fn name(&self) -> &'static str {
            "synthetic"
        }

        fn extract_mono(&self, _video_path: &Path, sample_rate: u32) -> Result<Vec<f32>, AudioError> {
            let sr = sample_rate as usize;
            let mut samples = vec![0.0f32; sr * 20];
            for &at in &self.beeps_at {
                let start = (at * sample_rate as f32) as usize;
                for n in 0..sr / 4 {
                    samples[start + n] = 0.5 * (2.0 * PI * 7000.0 * n as f32 / sample_rate as f32).sin();
                }
            }
            Ok(samples)
        }
    }

    fn request(expected_duration: f64) -> BeepRequest {
        BeepRequest {
            video_path: PathBuf::from("run.mp4"),
            video: VideoInfo {
                frame_count: 600,
                fps: 30.0,
                width: 0,
                height: 0,
            },
            expected_duration,
            config: BeepConfig::default(),
        }
    }

    #[test]
    fn test_single_beep_gives_range() {
        let capability = AudioCapability::with_extractor(SyntheticExtractor { beeps_at: vec![12.0] });
        let events = BeepDetectionWorker::spawn(capability, request(4.0)).unwrap().wait();

        match events.last() {
            Some(DetectionEvent::Finished {
                beeps,
                selection: RangeSelection::Single { range, .. },
            }) => {
                assert_eq!(beeps.len(), 1);
                // 提示音中点约 12.125s → 第 363 帧
                assert!((beeps[0].time_seconds - 12.125).abs() < 0.03);
                let expected = AnalysisRange {
                    start_frame: range.end_frame - 120,
                    end_frame: range.end_frame,
                };
                assert_eq!(*range, expected);
            }
            other => panic!("unexpected terminal event {:?}", other),
        }
        assert!(events.iter().any(|e| matches!(e, DetectionEvent::Status(_))));
    }

    #[test]
    fn test_multiple_beeps_are_ambiguous() {
        let capability = AudioCapability::with_extractor(SyntheticExtractor {
            beeps_at: vec![6.0, 15.0],
        });
        let events = BeepDetectionWorker::spawn(capability, request(0.0)).unwrap().wait();
        assert!(matches!(
            events.last(),
            Some(DetectionEvent::Finished {
                selection: RangeSelection::Ambiguous(_),
                ..
            })
        ));
    }

    #[test]
    fn test_unavailable_capability() {
        let capability = AudioCapability::Unavailable("built without audio".into());
        let events = BeepDetectionWorker::spawn(capability, request(4.0)).unwrap().wait();
        assert!(matches!(events.as_slice(), [DetectionEvent::Unavailable(_)]));
    }
}
