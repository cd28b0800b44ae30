//! Preprocessing: alternate renderings of an image that help a QR decoder.
//!
//! Two independent transforms address two different failure modes:
//!
//! * [`Preprocessor::enhance`] — poor contrast. Luminance, contrast ×2,
//!   sharpness ×2, then a hard binarisation at mid-grey.
//! * [`Preprocessor::denoise_threshold`] — uneven lighting and scan noise.
//!   Upscale ×1.5 in colour, then luminance, 5×5 Gaussian blur, then a
//!   Gaussian-weighted adaptive threshold (block 11, offset 2).
//!
//! Both are total: any image of at least 1×1 pixels, of any colour type,
//! produces a new two-level luminance image. The input is never modified.

use crate::config::PreprocessParams;
use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Luma};
use imageproc::filter::gaussian_blur_f32;

/// Produces the alternate renderings tried by the detection fallback chain.
pub trait Preprocessor: Send + Sync {
    /// Photometric enhancement: contrast, sharpness, fixed-threshold binarisation.
    fn enhance(&self, image: &DynamicImage) -> DynamicImage;

    /// Upscale, denoise and binarise with a local adaptive threshold.
    fn denoise_threshold(&self, image: &DynamicImage) -> DynamicImage;
}

/// The default [`Preprocessor`], driven by [`PreprocessParams`].
#[derive(Debug, Clone, Default)]
pub struct StandardPreprocessor {
    params: PreprocessParams,
}

impl StandardPreprocessor {
    pub fn new(params: PreprocessParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &PreprocessParams {
        &self.params
    }
}

impl Preprocessor for StandardPreprocessor {
    fn enhance(&self, image: &DynamicImage) -> DynamicImage {
        let p = &self.params;
        let gray = image.to_luma8();
        let contrasted = adjust_contrast(&gray, p.contrast_factor);
        let sharpened = adjust_sharpness(&contrasted, p.sharpness_factor);
        DynamicImage::ImageLuma8(binarize(&sharpened, p.binarize_threshold))
    }

    fn denoise_threshold(&self, image: &DynamicImage) -> DynamicImage {
        let p = &self.params;
        let (w, h) = scaled_dimensions(image.width(), image.height(), p.upscale_factor);
        let upscaled = image.resize_exact(w, h, FilterType::Triangle).to_luma8();
        let blurred = gaussian_blur_f32(&upscaled, kernel_sigma(p.blur_kernel));
        DynamicImage::ImageLuma8(adaptive_threshold(
            &blurred,
            p.adaptive_block_size,
            p.adaptive_offset,
        ))
    }
}

// ── Photometric enhancement ──────────────────────────────────────────────

/// Blend every pixel against the image's mean luminance.
///
/// `out = mean + factor·(p − mean)`; factor 1 is the identity, 0 a flat grey.
pub fn adjust_contrast(gray: &GrayImage, factor: f32) -> GrayImage {
    let count = (gray.width() as u64 * gray.height() as u64).max(1);
    let sum: u64 = gray.pixels().map(|p| p.0[0] as u64).sum();
    let mean = (sum as f32 / count as f32 + 0.5).floor();

    let mut out = gray.clone();
    for px in out.pixels_mut() {
        px.0[0] = clamp_u8(mean + factor * (px.0[0] as f32 - mean));
    }
    out
}

/// Blend every pixel against a 3×3 smoothed copy of the image.
///
/// The smoothing kernel weighs the centre 5 and each neighbour 1. Border
/// pixels have no full neighbourhood and keep their value.
pub fn adjust_sharpness(gray: &GrayImage, factor: f32) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut out = gray.clone();
    if w < 3 || h < 3 {
        return out;
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut acc = 0u32;
            for dy in 0..3 {
                for dx in 0..3 {
                    let v = gray.get_pixel(x + dx - 1, y + dy - 1).0[0] as u32;
                    acc += if dx == 1 && dy == 1 { v * 5 } else { v };
                }
            }
            let smooth = acc as f32 / 13.0;
            let original = gray.get_pixel(x, y).0[0] as f32;
            out.put_pixel(x, y, Luma([clamp_u8(smooth + factor * (original - smooth))]));
        }
    }
    out
}

/// Strict two-level image: below `threshold` is black, everything else white.
pub fn binarize(gray: &GrayImage, threshold: u8) -> GrayImage {
    let mut out = gray.clone();
    for px in out.pixels_mut() {
        px.0[0] = if px.0[0] < threshold { 0 } else { 255 };
    }
    out
}

// ── Denoise + adaptive threshold ─────────────────────────────────────────

/// Gaussian-weighted local threshold.
///
/// A pixel becomes white when it is brighter than its neighbourhood's
/// Gaussian mean minus `offset`, black otherwise.
pub fn adaptive_threshold(gray: &GrayImage, block_size: u32, offset: i32) -> GrayImage {
    let local_mean = gaussian_blur_f32(gray, kernel_sigma(block_size));
    let mut out = gray.clone();
    for (x, y, px) in out.enumerate_pixels_mut() {
        let mean = local_mean.get_pixel(x, y).0[0] as i32;
        px.0[0] = if px.0[0] as i32 > mean - offset { 255 } else { 0 };
    }
    out
}

/// Sigma for a Gaussian kernel of odd size `k`: `0.3·((k−1)/2 − 1) + 0.8`.
pub fn kernel_sigma(kernel_size: u32) -> f32 {
    let half = (kernel_size.max(3) as f32 - 1.0) * 0.5;
    0.3 * (half - 1.0) + 0.8
}

/// Target dimensions after scaling by `factor`, never below 1×1.
pub fn scaled_dimensions(width: u32, height: u32, factor: f32) -> (u32, u32) {
    let scale = |v: u32| ((v as f32 * factor).round() as u32).max(1);
    (scale(width), scale(height))
}

fn clamp_u8(v: f32) -> u8 {
    v.round().clamp(0.0, 255.0) as u8
}
