use super::frame::LStarFrame;
use super::rect::Rect;
use crate::core::stats;
use log::debug;
use serde::{Deserialize, Serialize};

pub const DEFAULT_BACKGROUND_PERCENTILE: f32 = 90.0;

/// Where the threshold shown for a frame comes from.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ThresholdSource {
    /// Percentile of the background ROI for this frame.
    Background(f64),
    /// User-entered value, used when no background value is available.
    Manual(f64),
}

impl ThresholdSource {
    pub fn value(&self) -> f64 {
        match self {
            ThresholdSource::Background(v) | ThresholdSource::Manual(v) => *v,
        }
    }

    pub fn is_background(&self) -> bool {
        matches!(self, ThresholdSource::Background(_))
    }
}

/// The active threshold: background estimate if present, manual otherwise.
///
/// Only the background value ever feeds into statistics.
pub fn active_threshold(background: Option<f64>, manual_threshold: f32) -> ThresholdSource {
    match background {
        Some(v) => ThresholdSource::Background(v),
        None => ThresholdSource::Manual(manual_threshold as f64),
    }
}

/// Percentile L* of the background ROI for one frame.
///
/// The result is the brightness above which pixels of the other ROIs count as
/// signal. A rect partially outside the frame is clamped to it and estimated
/// over what remains. `None` when no background ROI is configured, the rect is
/// wholly outside the frame, or the cropped region has no pixels.
pub fn estimate(l_star: &LStarFrame, background_rect: Option<&Rect>, percentile: f32) -> Option<f64> {
    let rect = background_rect?;
    let clamped = rect.clamp_to(l_star.width, l_star.height)?;
    let region = l_star.crop(&clamped);
    if region.is_empty() {
        return None;
    }
    let value = stats::percentile(&region.data, percentile)?;
    debug!(
        "Background p{:.0} over {}x{}: {:.2} L*",
        percentile, region.width, region.height, value
    );
    Some(value)
}

/// [`estimate`] with the background rect looked up by index in an ROI list.
pub fn estimate_for_rois(
    l_star: &LStarFrame,
    rects: &[Rect],
    background_idx: Option<usize>,
    percentile: f32,
) -> Option<f64> {
    let rect = background_idx.and_then(|idx| rects.get(idx));
    estimate(l_star, rect, percentile)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::video::frame::Frame;
    use crate::core::video::luminance::compute_l_star;

    fn frame_with_block() -> Frame {
        let mut frame = Frame::filled(4, 4, [0, 0, 0]);
        let values = [[10u8, 20], [30, 40]];
        for (y, row) in values.iter().enumerate() {
            for (x, &v) in row.iter().enumerate() {
                let idx = (y * 4 + x) * 3;
                frame.data[idx..idx + 3].copy_from_slice(&[v, v, v]);
            }
        }
        frame
    }

    #[test]
    fn test_percentile_50_is_region_median() {
        let l_star = compute_l_star(&frame_with_block());
        let rect = Rect::new(0, 0, 2, 2);

        let region = l_star.crop(&rect);
        let expected = stats::median(&region.data).unwrap();

        let result = estimate(&l_star, Some(&rect), 50.0).unwrap();
        assert!((result - expected).abs() < 1e-6);
    }

    #[test]
    fn test_default_percentile() {
        let l_star = LStarFrame {
            width: 10,
            height: 1,
            data: (1..=10).map(|v| v as f32).collect(),
        };
        let rect = Rect::new(0, 0, 10, 1);
        let result = estimate(&l_star, Some(&rect), DEFAULT_BACKGROUND_PERCENTILE).unwrap();
        assert!((result - 9.1).abs() < 1e-6);
    }

    #[test]
    fn test_missing_or_outside_background() {
        let l_star = LStarFrame::zeros(4, 4);
        assert!(estimate(&l_star, None, 90.0).is_none());
        assert!(estimate(&l_star, Some(&Rect::new(10, 10, 12, 12)), 90.0).is_none());

        let rects = vec![Rect::new(0, 0, 2, 2)];
        assert!(estimate_for_rois(&l_star, &rects, Some(3), 90.0).is_none());
        assert_eq!(estimate_for_rois(&l_star, &rects, Some(0), 90.0), Some(0.0));
        assert!(estimate_for_rois(&l_star, &rects, None, 90.0).is_none());
    }

    #[test]
    fn test_partially_outside_background_is_clamped() {
        let l_star = LStarFrame {
            width: 4,
            height: 1,
            data: vec![1.0, 2.0, 3.0, 4.0],
        };
        // 只有 x = 2..4 在帧内
        let result = estimate(&l_star, Some(&Rect::new(2, 0, 9, 5)), 50.0).unwrap();
        assert!((result - 3.5).abs() < 1e-6);
    }

    #[test]
    fn test_active_threshold() {
        let manual = active_threshold(None, 5.0);
        assert_eq!(manual, ThresholdSource::Manual(5.0));
        assert!(!manual.is_background());

        let bg = active_threshold(Some(12.5), 5.0);
        assert!(bg.is_background());
        assert_eq!(bg.value(), 12.5);
    }
}
