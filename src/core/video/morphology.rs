//! Morphological opening for ROI masks.

use super::frame::Mask;
use crate::config::normalize_kernel_size;

/// 形态学开运算（先腐蚀后膨胀），去除孤立亮点
///
/// The structuring element is the discretized ellipse inscribed in a
/// `k x k` box (for `k = 3` that is a plus-shaped cross). Pixels outside the
/// mask never erode a neighbour and never dilate into it.
#[derive(Debug, Clone)]
pub struct MaskRefiner {
    kernel_size: usize,
    offsets: Vec<(isize, isize)>,
}

impl MaskRefiner {
    /// `kernel_size` is normalized to an odd value ≥ 1 (even sizes round down).
    pub fn new(kernel_size: usize) -> Self {
        let kernel_size = normalize_kernel_size(kernel_size);
        Self {
            kernel_size,
            offsets: ellipse_offsets(kernel_size),
        }
    }

    pub fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    pub fn refine(&self, mask: &Mask) -> Mask {
        if !mask.any() || self.kernel_size == 1 {
            return mask.clone();
        }
        let eroded = self.apply(mask, true);
        self.apply(&eroded, false)
    }

    /// `erode = true` keeps a pixel only if every in-bounds neighbour is set;
    /// otherwise sets it if any in-bounds neighbour is set.
    fn apply(&self, mask: &Mask, erode: bool) -> Mask {
        let w = mask.width as isize;
        let h = mask.height as isize;
        let mut out = Vec::with_capacity(mask.data.len());

        for y in 0..h {
            for x in 0..w {
                let mut neighbours = self.offsets.iter().filter_map(|&(dx, dy)| {
                    let nx = x + dx;
                    let ny = y + dy;
                    if nx < 0 || ny < 0 || nx >= w || ny >= h {
                        None
                    } else {
                        Some(mask.data[(ny * w + nx) as usize])
                    }
                });
                let value = if erode {
                    neighbours.all(|v| v)
                } else {
                    neighbours.any(|v| v)
                };
                out.push(value);
            }
        }

        Mask {
            width: mask.width,
            height: mask.height,
            data: out,
        }
    }
}

pub fn refine(mask: &Mask, kernel_size: usize) -> Mask {
    MaskRefiner::new(kernel_size).refine(mask)
}

/// Offsets `(dx, dy)` from the kernel center covered by the ellipse.
fn ellipse_offsets(size: usize) -> Vec<(isize, isize)> {
    let r = (size / 2) as isize;
    let c = r;
    let inv_r2 = if r > 0 { 1.0 / (r * r) as f64 } else { 0.0 };
    let mut offsets = Vec::new();

    for i in 0..size as isize {
        let dy = i - r;
        let dx = (c as f64 * (((r * r - dy * dy) as f64) * inv_r2).sqrt()).round() as isize;
        let j1 = (c - dx).max(0);
        let j2 = (c + dx + 1).min(size as isize);
        for j in j1..j2 {
            offsets.push((j - c, dy));
        }
    }

    offsets
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_shapes() {
        assert_eq!(ellipse_offsets(1), vec![(0, 0)]);

        let cross = ellipse_offsets(3);
        assert_eq!(cross.len(), 5);
        assert!(cross.contains(&(0, -1)));
        assert!(cross.contains(&(-1, 0)));
        assert!(!cross.contains(&(1, 1)));

        // 5x5 椭圆：首尾两行只有中心点
        let ellipse = ellipse_offsets(5);
        assert_eq!(ellipse.len(), 1 + 5 + 5 + 5 + 1);
        assert!(!ellipse.contains(&(-1, -2)));
    }

    #[test]
    fn test_even_kernel_rounds_down() {
        assert_eq!(MaskRefiner::new(4).kernel_size(), 3);
        assert_eq!(MaskRefiner::new(0).kernel_size(), 1);
    }

    #[test]
    fn test_empty_mask_unchanged() {
        let mask = Mask::new(6, 5, false);
        let refined = refine(&mask, 3);
        assert_eq!(refined, mask);
    }

    #[test]
    fn test_isolated_pixel_removed() {
        let mut mask = Mask::new(7, 7, false);
        mask.data[3 * 7 + 3] = true;
        let refined = refine(&mask, 3);
        assert!(!refined.any());
    }

    #[test]
    fn test_dense_block_survives() {
        // 3x3 实心块在 7x7 中，开运算后保留十字
        let mask = Mask::from_fn(7, 7, |x, y| (2..5).contains(&x) && (2..5).contains(&y));
        let refined = refine(&mask, 3);
        assert!(refined.get(3, 3));
        assert!(refined.get(3, 2));
        assert!(refined.get(2, 3));
        assert!(!refined.get(2, 2));
        assert_eq!(refined.count(), 5);

        let large = Mask::from_fn(10, 10, |x, y| (1..9).contains(&x) && (1..9).contains(&y));
        let refined = refine(&large, 3);
        assert!(refined.get(4, 4));
        assert!(refined.count() >= 60);
    }

    #[test]
    fn test_full_mask_kept_at_borders() {
        let mask = Mask::new(4, 4, true);
        assert_eq!(refine(&mask, 3), mask);
    }

    #[test]
    fn test_thin_line_removed() {
        let mask = Mask::from_fn(8, 8, |_, y| y == 4);
        assert!(!refine(&mask, 3).any());
    }
}
