//! BGR → CIE L* conversion.
//!
//! Mirrors the common 8-bit LAB encoding: sRGB-linearize each channel, take
//! relative luminance Y (D65), compute L* in 0–100, quantize to the 0–255 byte
//! range, then rescale back to 0–100 with `100 / 255`.

use super::frame::{Frame, LStarFrame};
use log::warn;
use once_cell::sync::Lazy;
use rayon::prelude::*;

/// sRGB 8-bit → linear lookup table
static SRGB_TO_LINEAR: Lazy<[f32; 256]> = Lazy::new(|| {
    let mut table = [0.0f32; 256];
    for (i, v) in table.iter_mut().enumerate() {
        let c = i as f32 / 255.0;
        *v = if c <= 0.04045 {
            c / 12.92
        } else {
            ((c + 0.055) / 1.055).powf(2.4)
        };
    }
    table
});

const Y_FROM_R: f32 = 0.212671;
const Y_FROM_G: f32 = 0.715160;
const Y_FROM_B: f32 = 0.072169;
const LAB_EPSILON: f32 = 0.008856;
const LAB_KAPPA: f32 = 903.3;

/// L* 通道（0-100）
///
/// A malformed frame (buffer length not matching `width * height * 3`) yields an
/// all-zero buffer of the declared dimensions so one bad frame cannot abort a
/// whole time series.
pub fn compute_l_star(frame: &Frame) -> LStarFrame {
    if !frame.is_well_formed() {
        warn!(
            "⚠️ Malformed frame {} ({}x{}, {} bytes); using zero L*",
            frame.frame_number,
            frame.width,
            frame.height,
            frame.data.len()
        );
        return LStarFrame::zeros(frame.width, frame.height);
    }

    let data = frame
        .data
        .par_chunks_exact(3)
        .map(|bgr| l_star_from_bgr(bgr[0], bgr[1], bgr[2]))
        .collect();

    LStarFrame {
        width: frame.width,
        height: frame.height,
        data,
    }
}

/// L* of one pixel after 8-bit quantization.
pub fn l_star_from_bgr(b: u8, g: u8, r: u8) -> f32 {
    let lut = &*SRGB_TO_LINEAR;
    let y = Y_FROM_R * lut[r as usize] + Y_FROM_G * lut[g as usize] + Y_FROM_B * lut[b as usize];
    let l = if y > LAB_EPSILON {
        116.0 * y.cbrt() - 16.0
    } else {
        LAB_KAPPA * y
    };
    let l_byte = (l * 255.0 / 100.0).round().clamp(0.0, 255.0);
    l_byte * 100.0 / 255.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_white_and_black() {
        let white = compute_l_star(&Frame::filled(2, 2, [255, 255, 255]));
        assert_eq!(white.data.len(), 4);
        for v in &white.data {
            assert!((v - 100.0).abs() < 1e-3);
        }

        let black = compute_l_star(&Frame::filled(2, 2, [0, 0, 0]));
        assert!(black.data.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_values_are_byte_quantized() {
        for &(b, g, r) in &[(10u8, 20u8, 30u8), (200, 50, 90), (0, 255, 0), (128, 128, 128)] {
            let l = l_star_from_bgr(b, g, r);
            assert!((0.0..=100.0).contains(&l));
            let byte = l * 255.0 / 100.0;
            assert!((byte - byte.round()).abs() < 1e-3);
        }
    }

    #[test]
    fn test_mid_gray_and_ordering() {
        // sRGB 128 gray ≈ L* 53.6 → byte 137
        let gray = l_star_from_bgr(128, 128, 128);
        assert!((gray - 137.0 * 100.0 / 255.0).abs() < 1e-3);

        // green dominates luminance
        assert!(l_star_from_bgr(0, 255, 0) > l_star_from_bgr(0, 0, 255));
        assert!(l_star_from_bgr(0, 0, 255) > l_star_from_bgr(255, 0, 0));
    }

    #[test]
    fn test_malformed_frame_yields_zeros() {
        let frame = Frame::new(3, 2, vec![255; 5], 0, 4);
        let l_star = compute_l_star(&frame);
        assert_eq!((l_star.width, l_star.height), (3, 2));
        assert_eq!(l_star.data, vec![0.0; 6]);
    }
}
