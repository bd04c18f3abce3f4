//! 亮度分析任务
//!
//! An [`AnalysisRequest`] is an immutable snapshot of everything a run needs.
//! [`run_analysis`] does the work synchronously; [`AnalysisWorker`] runs it on a
//! dedicated thread and reports over a channel.

use super::worker::{CancelToken, TerminalEvent, WorkerHandle};
use crate::config::AnalysisConfig;
use crate::core::audio::AnalysisRange;
use crate::core::error::AnalysisError;
use crate::core::video::{
    background, compute_l_star, BrightnessAggregator, FixedMaskSet, FrameCache, FrameSource,
    Mask, Rect, VideoDecoder,
};
use log::{error, info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// 分析请求快照
#[derive(Debug, Clone)]
pub struct AnalysisRequest {
    pub video_path: PathBuf,
    pub rects: Vec<Rect>,
    pub background_idx: Option<usize>,
    pub range: AnalysisRange,
    pub config: AnalysisConfig,
    pub fixed_masks: Option<FixedMaskSet>,
}

impl AnalysisRequest {
    pub fn new(video_path: impl Into<PathBuf>, rects: Vec<Rect>, range: AnalysisRange) -> Self {
        Self {
            video_path: video_path.into(),
            rects,
            background_idx: None,
            range,
            config: AnalysisConfig::default(),
            fixed_masks: None,
        }
    }

    pub fn with_background(mut self, idx: usize) -> Self {
        self.background_idx = Some(idx);
        self
    }

    pub fn with_config(mut self, config: AnalysisConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_fixed_masks(mut self, masks: FixedMaskSet) -> Self {
        self.fixed_masks = Some(masks);
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.rects.is_empty() {
            return Err(AnalysisError::InvalidRequest("no ROIs defined".into()));
        }
        if let Some(idx) = self.background_idx {
            if idx >= self.rects.len() {
                return Err(AnalysisError::InvalidRequest(format!(
                    "background ROI {} out of {} ROIs",
                    idx,
                    self.rects.len()
                )));
            }
        }
        if let Some(rect) = self.rects.iter().find(|r| !r.is_valid()) {
            return Err(AnalysisError::InvalidRequest(format!("degenerate ROI {:?}", rect)));
        }
        if self.range.start_frame > self.range.end_frame {
            return Err(AnalysisError::InvalidRange(format!(
                "start {} after end {}",
                self.range.start_frame, self.range.end_frame
            )));
        }
        Ok(())
    }

    /// Indices of the ROIs that get a time series.
    pub fn non_background_rois(&self) -> Vec<usize> {
        (0..self.rects.len())
            .filter(|&idx| Some(idx) != self.background_idx)
            .collect()
    }
}

/// 单个 ROI 的时间序列
///
/// Index `i` is frame `range.start_frame + i`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RoiSeries {
    pub roi_index: usize,
    pub l_mean: Vec<f64>,
    pub l_median: Vec<f64>,
    pub b_mean: Vec<f64>,
    pub b_median: Vec<f64>,
}

impl RoiSeries {
    fn new(roi_index: usize, capacity: usize) -> Self {
        Self {
            roi_index,
            l_mean: Vec::with_capacity(capacity),
            l_median: Vec::with_capacity(capacity),
            b_mean: Vec::with_capacity(capacity),
            b_median: Vec::with_capacity(capacity),
        }
    }

    fn push(&mut self, values: (f64, f64, f64, f64)) {
        self.l_mean.push(values.0);
        self.l_median.push(values.1);
        self.b_mean.push(values.2);
        self.b_median.push(values.3);
    }

    pub fn len(&self) -> usize {
        self.l_mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.l_mean.is_empty()
    }
}

/// 分析结果
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub range: AnalysisRange,
    pub total_frames: usize,
    pub frames_processed: usize,
    pub series: Vec<RoiSeries>,
    /// Background estimate per processed frame; 0.0 where none was available.
    pub background: Vec<f64>,
    pub elapsed: Duration,
}

impl AnalysisResult {
    /// Fewer frames processed than requested (a decode failure cut the run short).
    pub fn is_truncated(&self) -> bool {
        self.frames_processed < self.range.len()
    }

    pub fn non_background_rois(&self) -> Vec<usize> {
        self.series.iter().map(|s| s.roi_index).collect()
    }

    pub fn last_frame(&self) -> Option<usize> {
        self.frames_processed
            .checked_sub(1)
            .map(|offset| self.range.start_frame + offset)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisOutcome {
    Completed(AnalysisResult),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisEvent {
    Progress { processed: usize, total: usize },
    Message(String),
    Finished(AnalysisResult),
    Failed(String),
    Cancelled,
}

impl AnalysisEvent {
    /// Progress as a whole percentage.
    pub fn percent(&self) -> Option<u8> {
        match self {
            AnalysisEvent::Progress { processed, total } if *total > 0 => {
                Some(((*processed * 100) / *total).min(100) as u8)
            }
            _ => None,
        }
    }
}

impl TerminalEvent for AnalysisEvent {
    fn is_terminal(&self) -> bool {
        matches!(
            self,
            AnalysisEvent::Finished(_) | AnalysisEvent::Failed(_) | AnalysisEvent::Cancelled
        )
    }
}

/// Process `request.range` frame by frame.
///
/// Per-frame problems never fail the run: an unreadable frame after the first
/// ends the series early, and bad ROIs or frames report zeros. `on_event`
/// receives progress and status messages only; the outcome is the return value.
pub fn run_analysis(
    source: &mut dyn FrameSource,
    cache: &mut FrameCache,
    request: &AnalysisRequest,
    cancel: &CancelToken,
    on_event: &mut dyn FnMut(AnalysisEvent),
) -> Result<AnalysisOutcome, AnalysisError> {
    request.validate()?;

    let total_frames = source.frame_count();
    let range = request.range;
    if range.end_frame >= total_frames {
        return Err(AnalysisError::InvalidRange(format!(
            "end frame {} beyond {}-frame video",
            range.end_frame, total_frames
        )));
    }

    let config = &request.config;
    let rects = &request.rects;
    let roi_indices = request.non_background_rois();
    let aggregator = BrightnessAggregator::from_config(config);
    let fixed_masks = active_fixed_masks(request);
    let interval = config.progress_interval.max(1);
    let frames_to_process = range.len();

    let mut series: Vec<RoiSeries> = roi_indices
        .iter()
        .map(|&idx| RoiSeries::new(idx, frames_to_process))
        .collect();
    let mut background_series = Vec::with_capacity(frames_to_process);
    let mut processed = 0;
    let mut next_position: Option<usize> = None;
    let started = Instant::now();

    info!(
        "🎬 Analyzing frames {}..={} ({} ROIs, background {:?})",
        range.start_frame,
        range.end_frame,
        roi_indices.len(),
        request.background_idx
    );
    on_event(AnalysisEvent::Message(format!(
        "Analyzing {} frames ({} to {})",
        frames_to_process, range.start_frame, range.end_frame
    )));

    for frame_idx in range.start_frame..=range.end_frame {
        if cancel.is_cancelled() {
            info!("Analysis cancelled after {} frames", processed);
            return Ok(AnalysisOutcome::Cancelled);
        }

        let frame = match cache.get(frame_idx) {
            Some(frame) => frame,
            None => {
                if next_position != Some(frame_idx) {
                    source.seek(frame_idx);
                }
                next_position = Some(frame_idx + 1);
                match source.read() {
                    Some(frame) => {
                        cache.put(frame_idx, &frame);
                        frame
                    }
                    None if processed == 0 => {
                        error!("❌ Failed to read first frame {}", frame_idx);
                        return Err(AnalysisError::FirstFrameUnreadable);
                    }
                    None => {
                        warn!(
                            "⚠️ Could not read frame {}; stopping after {} frames",
                            frame_idx, processed
                        );
                        on_event(AnalysisEvent::Message(format!(
                            "Frame {} unreadable; results truncated at frame {}",
                            frame_idx,
                            frame_idx - 1
                        )));
                        break;
                    }
                }
            }
        };

        let l_star = compute_l_star(&frame);
        let background_value = background::estimate_for_rois(
            &l_star,
            rects,
            request.background_idx,
            config.background_percentile,
        );
        background_series.push(background_value.unwrap_or(0.0));

        let stats: Vec<_> = roi_indices
            .par_iter()
            .map(|&roi_idx| {
                let mask: Option<&Mask> = fixed_masks
                    .and_then(|masks| masks.get(roi_idx))
                    .and_then(Option::as_ref);
                aggregator.aggregate_roi(&frame, &l_star, &rects[roi_idx], background_value, mask)
            })
            .collect();

        for (roi_series, roi_stats) in series.iter_mut().zip(stats.iter()) {
            roi_series.push(roi_stats.series_values(background_value.is_some()));
        }
        processed += 1;

        if processed % interval == 0 || processed == frames_to_process {
            on_event(AnalysisEvent::Progress {
                processed,
                total: frames_to_process,
            });
            on_event(AnalysisEvent::Message(progress_message(
                processed,
                frames_to_process,
                started.elapsed(),
            )));
        }
    }

    let result = AnalysisResult {
        range,
        total_frames,
        frames_processed: processed,
        series,
        background: background_series,
        elapsed: started.elapsed(),
    };
    info!(
        "✅ Analysis complete: {}/{} frames in {:.2}s",
        result.frames_processed,
        frames_to_process,
        result.elapsed.as_secs_f64()
    );
    Ok(AnalysisOutcome::Completed(result))
}

/// The request's fixed masks, provided they still describe its ROIs.
fn active_fixed_masks(request: &AnalysisRequest) -> Option<&[Option<Mask>]> {
    let set = request.fixed_masks.as_ref()?;
    let masks = set.masks_for(&request.rects, request.background_idx, &request.config);
    if masks.is_none() {
        warn!(
            "⚠️ Fixed masks from frame {} no longer match the ROIs or filter settings; ignoring them",
            set.source_frame()
        );
    }
    masks
}

fn progress_message(processed: usize, total: usize, elapsed: Duration) -> String {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return format!("Processed {}/{} frames", processed, total);
    }
    let fps = processed as f64 / secs;
    let eta = if fps > 0.0 {
        (total - processed) as f64 / fps
    } else {
        0.0
    };
    format!(
        "Processed {}/{} frames ({:.1} fps, ETA {:.0}s)",
        processed, total, fps, eta
    )
}

/// 后台分析 worker
pub struct AnalysisWorker;

impl AnalysisWorker {
    /// Open the video and run the analysis on a dedicated thread.
    ///
    /// The handle yields `Progress` / `Message` events and then exactly one of
    /// `Finished`, `Failed` or `Cancelled`.
    pub fn spawn(
        decoder: Arc<dyn VideoDecoder>,
        request: AnalysisRequest,
    ) -> Result<WorkerHandle<AnalysisEvent>, AnalysisError> {
        request.validate()?;
        let handle = WorkerHandle::spawn("brightness-analysis", move |tx, cancel| {
            let terminal = Self::run(decoder.as_ref(), &request, &cancel, &tx);
            let _ = tx.send(terminal);
        })?;
        Ok(handle)
    }

    fn run(
        decoder: &dyn VideoDecoder,
        request: &AnalysisRequest,
        cancel: &CancelToken,
        tx: &Sender<AnalysisEvent>,
    ) -> AnalysisEvent {
        let mut source = match decoder.open(&request.video_path) {
            Ok(source) => source,
            Err(e) => {
                error!("❌ Could not open {:?}: {}", request.video_path, e);
                return AnalysisEvent::Failed(e.to_string());
            }
        };
        let mut cache = FrameCache::with_capacity(request.config.frame_cache_size);
        let mut forward = |event: AnalysisEvent| {
            let _ = tx.send(event);
        };

        match run_analysis(source.as_mut(), &mut cache, request, cancel, &mut forward) {
            Ok(AnalysisOutcome::Completed(result)) => AnalysisEvent::Finished(result),
            Ok(AnalysisOutcome::Cancelled) => AnalysisEvent::Cancelled,
            Err(e) => {
                error!("❌ Analysis failed: {}", e);
                AnalysisEvent::Failed(e.to_string())
            }
        }
    }
}
