//! Single-frame quality gates: brightness and sharpness.
//!
//! Both gates operate on an 8-bit grayscale copy of the capture. The
//! thresholds are strict lower bounds: a frame must score *above* the
//! configured value to pass.

use image::{GrayImage, Luma, RgbImage};

use crate::detector::FaceBounds;

// BT.601 luma weights in Q14 fixed point (sum = 1 << 14).
const R_WEIGHT: u32 = 4899;
const G_WEIGHT: u32 = 9617;
const B_WEIGHT: u32 = 1868;
const SHIFT: u32 = 14;

/// Convert RGB to 8-bit luma using BT.601 weights, rounded to nearest.
pub fn to_gray(img: &RgbImage) -> GrayImage {
    let mut gray = GrayImage::new(img.width(), img.height());
    for (src, dst) in img.pixels().zip(gray.pixels_mut()) {
        let [r, g, b] = src.0;
        let y = (r as u32 * R_WEIGHT + g as u32 * G_WEIGHT + b as u32 * B_WEIGHT
            + (1 << (SHIFT - 1)))
            >> SHIFT;
        *dst = Luma([y as u8]);
    }
    gray
}

/// Mean pixel intensity on the 0-255 scale. Zero for an empty image.
pub fn mean_brightness(gray: &GrayImage) -> f64 {
    let n = gray.as_raw().len();
    if n == 0 {
        return 0.0;
    }
    let sum: u64 = gray.as_raw().iter().map(|&v| v as u64).sum();
    sum as f64 / n as f64
}

pub fn is_bright_enough(gray: &GrayImage, threshold: f64) -> bool {
    mean_brightness(gray) > threshold
}

/// Reflect-101 border index (`gfedcb|abcdefgh|gfedcba`).
fn reflect101(i: i64, len: i64) -> usize {
    if len == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= len {
        i = 2 * len - 2 - i;
    }
    i as usize
}

/// Population variance of the 4-neighbour Laplacian response.
///
/// Kernel `[0 1 0; 1 -4 1; 0 1 0]` with reflect-101 borders, accumulated in
/// `f64`. Low variance means little edge energy, i.e. a blurry or flat frame.
pub fn laplacian_variance(gray: &GrayImage) -> f64 {
    let (w, h) = (gray.width() as i64, gray.height() as i64);
    if w == 0 || h == 0 {
        return 0.0;
    }
    let px = |x: i64, y: i64| -> f64 {
        gray.get_pixel(reflect101(x, w) as u32, reflect101(y, h) as u32).0[0] as f64
    };

    let mut sum = 0.0f64;
    let mut sum_sq = 0.0f64;
    for y in 0..h {
        for x in 0..w {
            let lap = px(x, y - 1) + px(x - 1, y) + px(x + 1, y) + px(x, y + 1) - 4.0 * px(x, y);
            sum += lap;
            sum_sq += lap * lap;
        }
    }

    let n = (w * h) as f64;
    let mean = sum / n;
    (sum_sq / n - mean * mean).max(0.0)
}

pub fn is_not_blurry(gray: &GrayImage, threshold: f64) -> bool {
    laplacian_variance(gray) > threshold
}

/// Whether the largest face covers more than `min_ratio` of the frame.
///
/// A ratio of zero or below disables the check.
pub fn face_area_ok(faces: &[FaceBounds], width: u32, height: u32, min_ratio: f64) -> bool {
    if min_ratio <= 0.0 {
        return true;
    }
    let image_area = width as f64 * height as f64;
    faces
        .iter()
        .map(|f| f.width as f64 * f.height as f64)
        .any(|area| area > image_area * min_ratio)
}
