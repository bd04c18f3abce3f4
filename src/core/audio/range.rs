//! Beep timestamp → analysis frame range.

use super::beep::BeepEvent;
use log::{debug, info};
use serde::{Deserialize, Serialize};

/// Confidence is 1.0 while the run length is within this fraction of the
/// expected duration.
const DURATION_TOLERANCE: f64 = 0.2;
/// Past the tolerance, confidence falls to 0 over this fraction.
const DURATION_FALLOFF: f64 = 0.8;

/// 分析帧区间（闭区间）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRange {
    pub start_frame: usize,
    pub end_frame: usize,
}

impl AnalysisRange {
    /// `start` and `end` are clamped into `[0, total_frames - 1]` and ordered.
    pub fn clamped(start: usize, end: usize, total_frames: usize) -> Option<Self> {
        let last = total_frames.checked_sub(1)?;
        let end_frame = end.min(last);
        Some(Self {
            start_frame: start.min(end_frame),
            end_frame,
        })
    }

    pub fn full(total_frames: usize) -> Option<Self> {
        Self::clamped(0, usize::MAX, total_frames)
    }

    pub fn len(&self) -> usize {
        (self.end_frame + 1).saturating_sub(self.start_frame)
    }

    pub fn is_empty(&self) -> bool {
        self.end_frame < self.start_frame
    }

    pub fn contains(&self, frame: usize) -> bool {
        (self.start_frame..=self.end_frame).contains(&frame)
    }

    pub fn duration_seconds(&self, fps: f64) -> f64 {
        if fps > 0.0 {
            self.len() as f64 / fps
        } else {
            0.0
        }
    }
}

/// Frames covering the `expected_duration` seconds that end at the beep.
///
/// `None` when the video has no frames or `fps` is not positive.
pub fn compute_range(
    beep_time: f64,
    expected_duration: f64,
    fps: f64,
    total_frames: usize,
) -> Option<AnalysisRange> {
    if fps <= 0.0 || total_frames == 0 {
        return None;
    }
    let beep_frame = (beep_time * fps).floor().max(0.0) as usize;
    let start_frame = ((beep_time - expected_duration) * fps).floor().max(0.0) as usize;
    let range = AnalysisRange::clamped(start_frame, beep_frame, total_frames)?;
    debug!(
        "Beep at {:.2}s ({}), expected {:.1}s → frames {}..={}",
        beep_time, beep_frame, expected_duration, range.start_frame, range.end_frame
    );
    Some(range)
}

/// Outcome of choosing a range from detected beeps.
#[derive(Debug, Clone, PartialEq)]
pub enum RangeSelection {
    None,
    Single { beep: BeepEvent, range: AnalysisRange },
    /// More than one candidate; the caller decides which beep to use.
    Ambiguous(Vec<BeepEvent>),
}

pub fn select_range(
    beeps: &[BeepEvent],
    expected_duration: f64,
    fps: f64,
    total_frames: usize,
) -> RangeSelection {
    match beeps {
        [] => RangeSelection::None,
        [beep] => match compute_range(beep.time_seconds, expected_duration, fps, total_frames) {
            Some(range) => {
                info!(
                    "✅ Using beep at {:.2}s: frames {}..={}",
                    beep.time_seconds, range.start_frame, range.end_frame
                );
                RangeSelection::Single { beep: *beep, range }
            }
            None => RangeSelection::None,
        },
        many => {
            info!("🔧 {} beeps detected; selection required", many.len());
            RangeSelection::Ambiguous(many.to_vec())
        }
    }
}

/// How well the range's length matches `expected_duration`, in [0, 1].
pub fn run_duration_confidence(range: &AnalysisRange, fps: f64, expected_duration: f64) -> f64 {
    if expected_duration <= 0.0 || fps <= 0.0 {
        return 1.0;
    }
    let actual = range.duration_seconds(fps);
    let difference = (actual - expected_duration).abs();
    let tolerance = expected_duration * DURATION_TOLERANCE;
    if difference <= tolerance {
        1.0
    } else {
        (1.0 - (difference - tolerance) / (expected_duration * DURATION_FALLOFF)).max(0.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn beep(time_seconds: f64, frame_index: usize) -> BeepEvent {
        BeepEvent {
            time_seconds,
            frame_index,
        }
    }

    #[test]
    fn test_compute_range_basic() {
        let range = compute_range(10.0, 4.0, 30.0, 900).unwrap();
        assert_eq!(range.start_frame, 180);
        assert_eq!(range.end_frame, 300);
        assert_eq!(range.len(), 121);
    }

    #[test]
    fn test_compute_range_clamps() {
        // 开始时间为负
        let range = compute_range(2.0, 10.0, 30.0, 900).unwrap();
        assert_eq!(range.start_frame, 0);
        assert_eq!(range.end_frame, 60);

        // 提示音超出视频末尾
        let range = compute_range(40.0, 4.0, 30.0, 900).unwrap();
        assert_eq!(range.end_frame, 899);
        assert_eq!(range.start_frame, 899);

        assert!(compute_range(10.0, 4.0, 0.0, 900).is_none());
        assert!(compute_range(10.0, 4.0, 30.0, 0).is_none());
    }

    #[test]
    fn test_range_helpers() {
        let range = AnalysisRange::full(10).unwrap();
        assert_eq!((range.start_frame, range.end_frame), (0, 9));
        assert!(range.contains(9));
        assert!(!range.contains(10));
        assert!((range.duration_seconds(5.0) - 2.0).abs() < 1e-9);
        assert!(AnalysisRange::full(0).is_none());
        assert_eq!(
            AnalysisRange::clamped(8, 3, 10),
            Some(AnalysisRange {
                start_frame: 3,
                end_frame: 3
            })
        );
    }

    #[test]
    fn test_select_range() {
        assert_eq!(select_range(&[], 4.0, 30.0, 900), RangeSelection::None);

        match select_range(&[beep(10.0, 300)], 4.0, 30.0, 900) {
            RangeSelection::Single { range, .. } => assert_eq!(range.start_frame, 180),
            other => panic!("unexpected selection {:?}", other),
        }

        let beeps = vec![beep(10.0, 300), beep(20.0, 600)];
        assert_eq!(
            select_range(&beeps, 4.0, 30.0, 900),
            RangeSelection::Ambiguous(beeps.clone())
        );
    }

    #[test]
    fn test_run_duration_confidence() {
        // 30 fps，期望 4 秒
        let exact = AnalysisRange::clamped(0, 119, 900).unwrap();
        assert_eq!(run_duration_confidence(&exact, 30.0, 4.0), 1.0);

        // 4.6 秒，仍在 20% 内
        let within = AnalysisRange::clamped(0, 137, 900).unwrap();
        assert_eq!(run_duration_confidence(&within, 30.0, 4.0), 1.0);

        // 6 秒：差 2 秒，容差 0.8 秒 → 1 - 1.2/3.2
        let long = AnalysisRange::clamped(0, 179, 900).unwrap();
        assert!((run_duration_confidence(&long, 30.0, 4.0) - 0.625).abs() < 1e-9);

        let far = AnalysisRange::clamped(0, 899, 900).unwrap();
        assert_eq!(run_duration_confidence(&far, 30.0, 4.0), 0.0);

        assert_eq!(run_duration_confidence(&far, 30.0, 0.0), 1.0);
        assert_eq!(run_duration_confidence(&far, 0.0, 4.0), 1.0);
    }
}
