//! Fixed masks: capture once from a chosen frame, reuse on later frames.

use super::background;
use super::brightness::BrightnessAggregator;
use super::cache::FrameCache;
use super::frame::{Frame, Mask};
use super::luminance::compute_l_star;
use super::morphology::MaskRefiner;
use super::rect::Rect;
use super::source::FrameSource;
use crate::config::AnalysisConfig;
use crate::core::error::AnalysisError;
use log::{debug, info, warn};

/// Samples taken when searching a range for its brightest frame.
const BRIGHTEST_FRAME_SAMPLES: usize = 100;

/// One mask per ROI from a single frame.
///
/// The background ROI and ROIs with nothing left after clamping get `None`.
/// Without a background value every other ROI gets a full (all-true) mask.
pub fn capture_masks(
    frame: &Frame,
    rects: &[Rect],
    background_idx: Option<usize>,
    percentile: f32,
    kernel_size: usize,
) -> Vec<Option<Mask>> {
    let l_star = compute_l_star(frame);
    let background = background::estimate_for_rois(&l_star, rects, background_idx, percentile);
    let refiner = MaskRefiner::new(kernel_size);

    rects
        .iter()
        .enumerate()
        .map(|(idx, rect)| {
            if Some(idx) == background_idx {
                return None;
            }
            let clamped = rect.clamp_to(frame.width, frame.height)?;
            let roi_l_star = l_star.crop(&clamped);
            let mask = match background {
                Some(threshold) => refiner.refine(&roi_l_star.above(threshold)),
                None => Mask::new(roi_l_star.width, roi_l_star.height, true),
            };
            Some(mask)
        })
        .collect()
}

/// 固定掩码集合
///
/// Remembers the inputs the masks were captured with. Once any of them
/// changes the masks no longer describe the ROIs and [`masks_for`] stops
/// returning them.
///
/// [`masks_for`]: FixedMaskSet::masks_for
#[derive(Debug, Clone)]
pub struct FixedMaskSet {
    masks: Vec<Option<Mask>>,
    rects: Vec<Rect>,
    background_idx: Option<usize>,
    kernel_size: usize,
    noise_floor: f32,
    source_frame: usize,
}

impl FixedMaskSet {
    pub fn capture(
        frame: &Frame,
        frame_index: usize,
        rects: &[Rect],
        background_idx: Option<usize>,
        config: &AnalysisConfig,
    ) -> Self {
        let masks = capture_masks(
            frame,
            rects,
            background_idx,
            config.background_percentile,
            config.normalized_kernel_size(),
        );
        let set = Self::from_parts(masks, rects, background_idx, config, frame_index);
        if set.captured_any() {
            info!(
                "✅ Captured fixed masks from frame {}: pixel counts {:?}",
                frame_index,
                set.pixel_counts()
            );
        } else {
            warn!("⚠️ No masks could be captured from frame {}", frame_index);
        }
        set
    }

    /// Wrap masks produced elsewhere, recording the inputs they belong to.
    pub fn from_parts(
        masks: Vec<Option<Mask>>,
        rects: &[Rect],
        background_idx: Option<usize>,
        config: &AnalysisConfig,
        source_frame: usize,
    ) -> Self {
        Self {
            masks,
            rects: rects.to_vec(),
            background_idx,
            kernel_size: config.normalized_kernel_size(),
            noise_floor: config.noise_floor,
            source_frame,
        }
    }

    pub fn source_frame(&self) -> usize {
        self.source_frame
    }

    pub fn captured_any(&self) -> bool {
        self.masks.iter().any(Option::is_some)
    }

    /// Selected pixel count per ROI (`None` where no mask was captured).
    pub fn pixel_counts(&self) -> Vec<Option<usize>> {
        self.masks.iter().map(|m| m.as_ref().map(Mask::count)).collect()
    }

    pub fn is_valid_for(&self, rects: &[Rect], background_idx: Option<usize>, config: &AnalysisConfig) -> bool {
        self.rects == rects
            && self.background_idx == background_idx
            && self.kernel_size == config.normalized_kernel_size()
            && self.noise_floor == config.noise_floor
    }

    /// The masks, provided they still match the current ROIs and filter settings.
    pub fn masks_for(
        &self,
        rects: &[Rect],
        background_idx: Option<usize>,
        config: &AnalysisConfig,
    ) -> Option<&[Option<Mask>]> {
        if self.is_valid_for(rects, background_idx, config) {
            Some(&self.masks)
        } else {
            debug!("Fixed masks from frame {} are stale", self.source_frame);
            None
        }
    }

    pub fn into_masks(self) -> Vec<Option<Mask>> {
        self.masks
    }
}

/// Index of the brightest frame in `start..=end`.
///
/// Roughly [`BRIGHTEST_FRAME_SAMPLES`] frames are sampled evenly. Brightness is
/// the raw L* mean averaged over the non-background ROIs. Unreadable frames are
/// skipped; `start` is returned when nothing beats zero brightness.
pub fn find_brightest_frame(
    source: &mut dyn FrameSource,
    cache: &mut FrameCache,
    rects: &[Rect],
    background_idx: Option<usize>,
    start: usize,
    end: usize,
) -> Result<usize, AnalysisError> {
    if rects.is_empty() {
        return Err(AnalysisError::InvalidRequest("no ROIs defined".into()));
    }
    let total = source.frame_count();
    if total == 0 || start >= end || end >= total {
        return Err(AnalysisError::InvalidRange(format!(
            "{}..={} in a {}-frame video",
            start, end, total
        )));
    }

    let aggregator = BrightnessAggregator::new(1, 0.0);
    let step = ((end - start) / BRIGHTEST_FRAME_SAMPLES).max(1);
    let mut brightest = start;
    let mut max_brightness = 0.0;

    for frame_idx in (start..=end).step_by(step) {
        let frame = match cache.get(frame_idx) {
            Some(frame) => frame,
            None => match source.read_at(frame_idx) {
                Some(frame) => {
                    cache.put(frame_idx, &frame);
                    frame
                }
                None => continue,
            },
        };
        let l_star = compute_l_star(&frame);

        let mut total_brightness = 0.0;
        let mut roi_count = 0;
        for (roi_idx, rect) in rects.iter().enumerate() {
            if Some(roi_idx) == background_idx || rect.clamp_to(frame.width, frame.height).is_none() {
                continue;
            }
            total_brightness += aggregator
                .aggregate_roi(&frame, &l_star, rect, None, None)
                .l_raw_mean;
            roi_count += 1;
        }

        if roi_count > 0 {
            let brightness = total_brightness / roi_count as f64;
            if brightness > max_brightness {
                max_brightness = brightness;
                brightest = frame_idx;
            }
        }
    }

    info!("📊 Brightest frame in {}..={}: {} (L* {:.2})", start, end, brightest, max_brightness);
    Ok(brightest)
}
