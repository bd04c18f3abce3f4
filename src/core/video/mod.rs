pub mod background;
pub mod brightness;
pub mod cache;
pub mod frame;
pub mod luminance;
pub mod mask_capture;
pub mod morphology;
pub mod rect;
pub mod source;

pub use background::{active_threshold, ThresholdSource};
pub use brightness::{BrightnessAggregator, BrightnessStats};
pub use cache::FrameCache;
pub use frame::{Frame, LStarFrame, Mask};
pub use luminance::compute_l_star;
pub use mask_capture::{capture_masks, find_brightest_frame, FixedMaskSet};
pub use morphology::MaskRefiner;
pub use rect::{Point, Rect};
pub use source::{
    FrameSource, ImageSequenceDecoder, ImageSequenceSource, MemoryFrameSource, VideoDecoder,
    VideoInfo,
};
