//! Per-ROI brightness statistics.
//!
//! With a fixed mask every statistic covers the masked pixels only. Otherwise
//! raw statistics cover the full ROI and background-subtracted statistics
//! cover the pixels brighter than the background estimate after morphological
//! cleanup (and above the noise floor).

use super::frame::{Frame, LStarFrame, Mask};
use super::morphology::MaskRefiner;
use super::rect::Rect;
use crate::config::AnalysisConfig;
use crate::core::stats;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

/// ROI 亮度统计（8 项）
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BrightnessStats {
    pub l_raw_mean: f64,
    pub l_raw_median: f64,
    pub l_bg_mean: f64,
    pub l_bg_median: f64,
    pub b_raw_mean: f64,
    pub b_raw_median: f64,
    pub b_bg_mean: f64,
    pub b_bg_median: f64,
}

impl BrightnessStats {
    pub const ZERO: BrightnessStats = BrightnessStats {
        l_raw_mean: 0.0,
        l_raw_median: 0.0,
        l_bg_mean: 0.0,
        l_bg_median: 0.0,
        b_raw_mean: 0.0,
        b_raw_median: 0.0,
        b_bg_mean: 0.0,
        b_bg_median: 0.0,
    };

    pub fn as_array(&self) -> [f64; 8] {
        [
            self.l_raw_mean,
            self.l_raw_median,
            self.l_bg_mean,
            self.l_bg_median,
            self.b_raw_mean,
            self.b_raw_median,
            self.b_bg_mean,
            self.b_bg_median,
        ]
    }

    pub fn is_zero(&self) -> bool {
        self.as_array().iter().all(|&v| v == 0.0)
    }

    /// `(l_mean, l_median, b_mean, b_median)` as reported in a time series:
    /// background-subtracted when the frame had a background value, raw otherwise.
    pub fn series_values(&self, has_background: bool) -> (f64, f64, f64, f64) {
        if has_background {
            (self.l_bg_mean, self.l_bg_median, self.b_bg_mean, self.b_bg_median)
        } else {
            (self.l_raw_mean, self.l_raw_median, self.b_raw_mean, self.b_raw_median)
        }
    }
}

/// 亮度聚合器
pub struct BrightnessAggregator {
    refiner: MaskRefiner,
    noise_floor: f32,
}

impl BrightnessAggregator {
    pub fn new(kernel_size: usize, noise_floor: f32) -> Self {
        Self {
            refiner: MaskRefiner::new(kernel_size),
            noise_floor,
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Self {
        Self::new(config.morphological_kernel_size, config.noise_floor)
    }

    pub fn kernel_size(&self) -> usize {
        self.refiner.kernel_size()
    }

    /// Statistics for `rect` within a full frame and its L* buffer.
    ///
    /// The rect is clamped to the frame first; nothing left means all zeros.
    pub fn aggregate_roi(
        &self,
        frame: &Frame,
        frame_l_star: &LStarFrame,
        rect: &Rect,
        background: Option<f64>,
        fixed_mask: Option<&Mask>,
    ) -> BrightnessStats {
        match rect.clamp_to(frame.width, frame.height) {
            Some(clamped) => {
                let roi_bgr = frame.crop(&clamped);
                let roi_l_star = frame_l_star.crop(&clamped);
                self.aggregate(&roi_bgr, &roi_l_star, background, fixed_mask)
            }
            None => {
                debug!("ROI {:?} is outside the {}x{} frame", rect, frame.width, frame.height);
                BrightnessStats::ZERO
            }
        }
    }

    pub fn aggregate(
        &self,
        roi_bgr: &Frame,
        roi_l_star: &LStarFrame,
        background: Option<f64>,
        fixed_mask: Option<&Mask>,
    ) -> BrightnessStats {
        if roi_bgr.is_empty() || roi_bgr.data.is_empty() {
            return BrightnessStats::ZERO;
        }
        if !roi_bgr.is_well_formed()
            || (roi_l_star.width, roi_l_star.height) != (roi_bgr.width, roi_bgr.height)
            || roi_l_star.data.len() != roi_bgr.pixel_count()
        {
            warn!(
                "⚠️ ROI buffers disagree ({}x{} BGR, {}x{} L*); reporting zeros",
                roi_bgr.width, roi_bgr.height, roi_l_star.width, roi_l_star.height
            );
            return BrightnessStats::ZERO;
        }

        let l_star = &roi_l_star.data;
        let blue = roi_bgr.blue_channel();

        let fixed_mask = fixed_mask.filter(|m| m.shape() == (roi_bgr.width, roi_bgr.height));
        if let Some(mask) = fixed_mask {
            let Some(masked) = Self::raw_stats(&mask.select(l_star), &mask.select(&blue)) else {
                return BrightnessStats::ZERO;
            };
            let offset = background.unwrap_or(0.0);
            return BrightnessStats {
                l_bg_mean: masked.l_raw_mean - offset,
                l_bg_median: masked.l_raw_median - offset,
                ..masked
            };
        }

        let Some(raw) = Self::raw_stats(l_star, &blue) else {
            return BrightnessStats::ZERO;
        };

        let Some(threshold) = background else {
            return raw;
        };

        let mut mask = self.refiner.refine(&roi_l_star.above(threshold));
        if self.noise_floor > 0.0 {
            mask = mask.and(&roi_l_star.above(self.noise_floor as f64));
        }

        if !mask.any() {
            return BrightnessStats {
                l_bg_mean: 0.0,
                l_bg_median: 0.0,
                b_bg_mean: 0.0,
                b_bg_median: 0.0,
                ..raw
            };
        }

        Self::with_masked_values(raw, &mask, l_star, &blue, threshold)
    }

    /// Raw statistics over the given pixels, mirrored into the `*_bg_*` fields.
    fn raw_stats(l_star: &[f32], blue: &[f32]) -> Option<BrightnessStats> {
        let (l_raw_mean, l_raw_median) = stats::mean_and_median(l_star)?;
        let (b_raw_mean, b_raw_median) = stats::mean_and_median(blue)?;
        Some(BrightnessStats {
            l_raw_mean,
            l_raw_median,
            l_bg_mean: l_raw_mean,
            l_bg_median: l_raw_median,
            b_raw_mean,
            b_raw_median,
            b_bg_mean: b_raw_mean,
            b_bg_median: b_raw_median,
        })
    }

    /// Fill the background-subtracted fields from the pixels under `mask`.
    ///
    /// Blue has no reference channel, so its "subtracted" values are the
    /// masked blue statistics unchanged.
    fn with_masked_values(
        raw: BrightnessStats,
        mask: &Mask,
        l_star: &[f32],
        blue: &[f32],
        background: f64,
    ) -> BrightnessStats {
        let (Some((l_mean, l_median)), Some((b_mean, b_median))) = (
            stats::mean_and_median(&mask.select(l_star)),
            stats::mean_and_median(&mask.select(blue)),
        ) else {
            return BrightnessStats::ZERO;
        };

        BrightnessStats {
            l_bg_mean: l_mean - background,
            l_bg_median: l_median - background,
            b_bg_mean: b_mean,
            b_bg_median: b_median,
            ..raw
        }
    }
}
