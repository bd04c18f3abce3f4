use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// ROI 矩形（帧像素坐标，右下角不包含）
///
/// Rects arrive already validated (`top_left < bottom_right` componentwise);
/// out-of-frame parts are handled by [`Rect::clamp_to`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub top_left: Point,
    pub bottom_right: Point,
}

impl Rect {
    pub fn new(x1: i32, y1: i32, x2: i32, y2: i32) -> Self {
        Self {
            top_left: Point::new(x1, y1),
            bottom_right: Point::new(x2, y2),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.top_left.x < self.bottom_right.x && self.top_left.y < self.bottom_right.y
    }

    pub fn width(&self) -> u32 {
        (self.bottom_right.x as i64 - self.top_left.x as i64).max(0) as u32
    }

    pub fn height(&self) -> u32 {
        (self.bottom_right.y as i64 - self.top_left.y as i64).max(0) as u32
    }

    pub fn area(&self) -> usize {
        self.width() as usize * self.height() as usize
    }

    /// Intersect with a `frame_width` x `frame_height` frame.
    ///
    /// Returns `None` when nothing of the rect remains inside the frame.
    pub fn clamp_to(&self, frame_width: u32, frame_height: u32) -> Option<Rect> {
        let fw = frame_width.min(i32::MAX as u32) as i32;
        let fh = frame_height.min(i32::MAX as u32) as i32;
        let clamped = Rect::new(
            self.top_left.x.clamp(0, fw),
            self.top_left.y.clamp(0, fh),
            self.bottom_right.x.clamp(0, fw),
            self.bottom_right.y.clamp(0, fh),
        );
        if clamped.is_valid() {
            Some(clamped)
        } else {
            None
        }
    }

    /// True when the rect lies entirely inside the frame.
    pub fn fits_within(&self, frame_width: u32, frame_height: u32) -> bool {
        self.is_valid() && self.clamp_to(frame_width, frame_height) == Some(*self)
    }

    pub(crate) fn x_range(&self) -> std::ops::Range<usize> {
        self.top_left.x as usize..self.bottom_right.x as usize
    }

    pub(crate) fn y_range(&self) -> std::ops::Range<usize> {
        self.top_left.y as usize..self.bottom_right.y as usize
    }
}
