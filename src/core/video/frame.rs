use super::rect::Rect;
use image::RgbImage;
use std::time::Duration;

/// 帧数据结构
///
/// Interleaved 8-bit BGR. Analysis code never mutates a frame in place.
#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>, // BGR 格式
    pub timestamp: Duration,
    pub frame_number: u64,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        data: Vec<u8>,
        timestamp_ms: u64,
        frame_number: u64,
    ) -> Self {
        Self {
            width,
            height,
            data,
            timestamp: Duration::from_millis(timestamp_ms),
            frame_number,
        }
    }

    /// Frame where every pixel is the same `[b, g, r]` triple.
    pub fn filled(width: u32, height: u32, bgr: [u8; 3]) -> Self {
        let data = bgr
            .iter()
            .copied()
            .cycle()
            .take(width as usize * height as usize * 3)
            .collect();
        Self::new(width, height, data, 0, 0)
    }

    pub fn from_rgb_image(img: &RgbImage, timestamp_ms: u64, frame_number: u64) -> Self {
        let mut data = Vec::with_capacity(img.as_raw().len());
        for chunk in img.as_raw().chunks_exact(3) {
            data.push(chunk[2]); // B
            data.push(chunk[1]); // G
            data.push(chunk[0]); // R
        }
        Self::new(img.width(), img.height(), data, timestamp_ms, frame_number)
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn is_empty(&self) -> bool {
        self.pixel_count() == 0
    }

    /// Buffer length matches the declared dimensions.
    pub fn is_well_formed(&self) -> bool {
        self.data.len() == self.pixel_count() * 3
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 3]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 3;
        self.data.get(idx..idx + 3).map(|p| [p[0], p[1], p[2]])
    }

    /// Copy of the pixels under `rect`; `rect` must already be clamped to the frame.
    pub fn crop(&self, rect: &Rect) -> Frame {
        let w = self.width as usize;
        let mut data = Vec::with_capacity(rect.area() * 3);
        for y in rect.y_range() {
            let row = (y * w + rect.top_left.x as usize) * 3;
            let row_end = row + rect.width() as usize * 3;
            if let Some(pixels) = self.data.get(row..row_end) {
                data.extend_from_slice(pixels);
            }
        }
        Frame {
            width: rect.width(),
            height: rect.height(),
            data,
            timestamp: self.timestamp,
            frame_number: self.frame_number,
        }
    }

    /// Blue channel as floats, row-major.
    pub fn blue_channel(&self) -> Vec<f32> {
        self.data.chunks_exact(3).map(|bgr| bgr[0] as f32).collect()
    }
}

/// L* 亮度通道（0-100），与源帧同尺寸
#[derive(Debug, Clone, PartialEq)]
pub struct LStarFrame {
    pub width: u32,
    pub height: u32,
    pub data: Vec<f32>,
}

impl LStarFrame {
    pub fn zeros(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            data: vec![0.0; width as usize * height as usize],
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn get(&self, x: u32, y: u32) -> Option<f32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.data
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    /// Copy of the values under `rect`; `rect` must already be clamped to the frame.
    pub fn crop(&self, rect: &Rect) -> LStarFrame {
        let w = self.width as usize;
        let mut data = Vec::with_capacity(rect.area());
        for y in rect.y_range() {
            let row = y * w;
            if let Some(values) = self.data.get(row + rect.top_left.x as usize..row + rect.bottom_right.x as usize) {
                data.extend_from_slice(values);
            }
        }
        LStarFrame {
            width: rect.width(),
            height: rect.height(),
            data,
        }
    }

    /// Pixels strictly brighter than `threshold`.
    pub fn above(&self, threshold: f64) -> Mask {
        Mask {
            width: self.width,
            height: self.height,
            data: self.data.iter().map(|&v| v as f64 > threshold).collect(),
        }
    }
}

/// ROI 像素掩码，与 ROI 尺寸对齐
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<bool>,
}

impl Mask {
    pub fn new(width: u32, height: u32, value: bool) -> Self {
        Self {
            width,
            height,
            data: vec![value; width as usize * height as usize],
        }
    }

    pub fn from_fn<F>(width: u32, height: u32, f: F) -> Self
    where
        F: Fn(u32, u32) -> bool,
    {
        let mut data = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                data.push(f(x, y));
            }
        }
        Self { width, height, data }
    }

    pub fn shape(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        if x >= self.width || y >= self.height {
            return false;
        }
        self.data[y as usize * self.width as usize + x as usize]
    }

    pub fn count(&self) -> usize {
        self.data.iter().filter(|&&v| v).count()
    }

    pub fn any(&self) -> bool {
        self.data.iter().any(|&v| v)
    }

    /// Element-wise AND; shapes must match.
    pub fn and(&self, other: &Mask) -> Mask {
        debug_assert_eq!(self.shape(), other.shape());
        Mask {
            width: self.width,
            height: self.height,
            data: self
                .data
                .iter()
                .zip(other.data.iter())
                .map(|(&a, &b)| a && b)
                .collect(),
        }
    }

    /// Values at the positions where the mask is set.
    pub fn select(&self, values: &[f32]) -> Vec<f32> {
        self.data
            .iter()
            .zip(values.iter())
            .filter_map(|(&keep, &v)| keep.then_some(v))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_creation() {
        let frame = Frame::filled(100, 100, [255, 255, 255]);

        assert_eq!(frame.width, 100);
        assert_eq!(frame.height, 100);
        assert_eq!(frame.pixel_count(), 10000);
        assert!(frame.is_well_formed());

        let frame = Frame::new(4, 4, vec![0; 10], 1000, 30);
        assert_eq!(frame.timestamp.as_millis(), 1000);
        assert_eq!(frame.frame_number, 30);
        assert!(!frame.is_well_formed());
    }

    #[test]
    fn test_rgb_image_is_swapped_to_bgr() {
        let img = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(&img, 0, 0);
        assert_eq!(frame.pixel(1, 1), Some([30, 20, 10]));
        assert_eq!(frame.blue_channel(), vec![30.0; 4]);
    }

    #[test]
    fn test_crop() {
        let mut frame = Frame::filled(4, 3, [0, 0, 0]);
        // 标记 (2, 1)
        let idx = (1 * 4 + 2) * 3;
        frame.data[idx] = 9;
        let cropped = frame.crop(&Rect::new(1, 1, 3, 3));
        assert_eq!((cropped.width, cropped.height), (2, 2));
        assert_eq!(cropped.data.len(), 12);
        assert_eq!(cropped.pixel(1, 0), Some([9, 0, 0]));

        let l_star = LStarFrame {
            width: 3,
            height: 2,
            data: vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0],
        };
        let roi = l_star.crop(&Rect::new(1, 0, 3, 2));
        assert_eq!(roi.data, vec![1.0, 2.0, 4.0, 5.0]);
    }

    #[test]
    fn test_mask_helpers() {
        let l_star = LStarFrame {
            width: 2,
            height: 2,
            data: vec![1.0, 5.0, 7.0, 5.0],
        };
        let above = l_star.above(5.0);
        assert_eq!(above.count(), 1);
        assert_eq!(above.select(&l_star.data), vec![7.0]);

        let checker = Mask::from_fn(2, 2, |x, y| (x + y) % 2 == 0);
        assert_eq!(checker.and(&Mask::new(2, 2, true)), checker);
        assert!(!checker.and(&above).any());
    }
}
