//! HSV color band matching.
//!
//! Hue, saturation and value use the 8-bit OpenCV scale: hue in `0..=179`
//! (degrees halved), saturation and value in `0..=255`.

use image::{GrayImage, Luma, Rgb, RgbImage};
use std::path::Path;

use crate::config::{GREEN_LOWER, GREEN_UPPER};
use crate::error::{PrepError, Result};
use crate::utils::load_rgb_image;

pub const HUE_MAX: u8 = 179;

/// Inclusive HSV range. Construction guarantees `min <= max` per channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColorBand {
    h_min: u8,
    h_max: u8,
    s_min: u8,
    s_max: u8,
    v_min: u8,
    v_max: u8,
}

impl ColorBand {
    /// Build a band from `[h, s, v]` lower and upper bounds.
    pub fn new(lower: [u8; 3], upper: [u8; 3]) -> Result<Self> {
        for (name, lo, hi) in [
            ("hue", lower[0], upper[0]),
            ("saturation", lower[1], upper[1]),
            ("value", lower[2], upper[2]),
        ] {
            if lo > hi {
                return Err(PrepError::InvalidBand(format!(
                    "{} lower bound {} exceeds upper bound {}",
                    name, lo, hi
                )));
            }
        }
        if upper[0] > HUE_MAX {
            return Err(PrepError::InvalidBand(format!(
                "hue upper bound {} exceeds {}",
                upper[0], HUE_MAX
            )));
        }

        Ok(Self {
            h_min: lower[0],
            h_max: upper[0],
            s_min: lower[1],
            s_max: upper[1],
            v_min: lower[2],
            v_max: upper[2],
        })
    }

    /// The fixed green band used for sorting and annotation.
    pub fn green() -> Self {
        Self {
            h_min: GREEN_LOWER[0],
            h_max: GREEN_UPPER[0],
            s_min: GREEN_LOWER[1],
            s_max: GREEN_UPPER[1],
            v_min: GREEN_LOWER[2],
            v_max: GREEN_UPPER[2],
        }
    }

    pub fn lower(&self) -> [u8; 3] {
        [self.h_min, self.s_min, self.v_min]
    }

    pub fn upper(&self) -> [u8; 3] {
        [self.h_max, self.s_max, self.v_max]
    }

    pub fn contains(&self, [h, s, v]: [u8; 3]) -> bool {
        (self.h_min..=self.h_max).contains(&h)
            && (self.s_min..=self.s_max).contains(&s)
            && (self.v_min..=self.v_max).contains(&v)
    }

    pub fn contains_rgb(&self, pixel: &Rgb<u8>) -> bool {
        self.contains(rgb_to_hsv(pixel))
    }
}

/// Convert one RGB pixel to 8-bit HSV.
pub fn rgb_to_hsv(pixel: &Rgb<u8>) -> [u8; 3] {
    let [r, g, b] = pixel.0.map(f32::from);
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let s = if max == 0.0 { 0.0 } else { 255.0 * delta / max };

    let mut h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (g - b) / delta
    } else if max == g {
        120.0 + 60.0 * (b - r) / delta
    } else {
        240.0 + 60.0 * (r - g) / delta
    };
    if h < 0.0 {
        h += 360.0;
    }

    // 360 degrees wraps back to 0 after halving and rounding
    let h = (h / 2.0).round() as u16 % 180;
    [h as u8, s.round() as u8, max as u8]
}

/// Binary mask of the pixels inside `band` (255 inside, 0 outside).
pub fn band_mask(image: &RgbImage, band: &ColorBand) -> GrayImage {
    GrayImage::from_fn(image.width(), image.height(), |x, y| {
        if band.contains_rgb(image.get_pixel(x, y)) {
            Luma([255])
        } else {
            Luma([0])
        }
    })
}

/// Fraction of pixels inside `band`, in `[0, 1]`.
pub fn band_ratio(image: &RgbImage, band: &ColorBand) -> f64 {
    let total = u64::from(image.width()) * u64::from(image.height());
    if total == 0 {
        return 0.0;
    }
    let matching = image.pixels().filter(|p| band.contains_rgb(p)).count();
    matching as f64 / total as f64
}

/// True when at least `threshold` of the pixels fall inside `band`.
pub fn classify(image: &RgbImage, band: &ColorBand, threshold: f64) -> bool {
    band_ratio(image, band) >= threshold
}

/// Decode `path` and classify it. Returns the decision and the measured ratio.
pub fn classify_file(path: &Path, band: &ColorBand, threshold: f64) -> Result<(bool, f64)> {
    let image = load_rgb_image(path)?;
    let ratio = band_ratio(&image, band);
    let is_match = ratio >= threshold;
    log::debug!(
        "{}: green_ratio={:.2}%, result={}",
        path.display(),
        ratio * 100.0,
        if is_match { "GREEN" } else { "NON_GREEN" }
    );
    Ok((is_match, ratio))
}
