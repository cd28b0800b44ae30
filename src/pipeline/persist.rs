//! Persisting QR images: filename sanitisation, naming and PNG encoding.
//!
//! A saved image is named after where its QR code was found and what it
//! contains: `{stem}page{page}qr{index}id{payload}.png`. The payload part is
//! sanitised so that arbitrary QR text can never escape the target directory
//! or produce a name the file system rejects.
//!
//! PNG is used for every variant: the enhanced and thresholded renderings are
//! two-level images and compress to almost nothing losslessly.

use crate::error::StageError;
use image::{DynamicImage, ImageFormat};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Longest sanitised payload (in characters) used inside a file name.
pub const MAX_ID_CHARS: usize = 100;

static RE_INVALID_FILENAME_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\\/:"*?<>|\x00-\x1F]+"#).unwrap());

/// Replace every run of path-hostile characters with a single `_`.
///
/// Deterministic, but not injective: `a/b` and `a:b` both become `a_b`.
pub fn sanitize_filename(text: &str) -> String {
    let cleaned = RE_INVALID_FILENAME_CHARS.replace_all(text, "_");
    cleaned.chars().take(MAX_ID_CHARS).collect()
}

/// File name for the `qr_index`-th (1-based) QR code found on `page`.
pub fn qr_image_filename(stem: &str, page: u32, qr_index: usize, payload: &str) -> String {
    format!(
        "{}page{}qr{}id{}.png",
        stem,
        page,
        qr_index,
        sanitize_filename(payload)
    )
}

/// Write `image` as PNG to `dir/filename`, returning the full path.
pub fn save_qr_image(
    image: &DynamicImage,
    dir: &Path,
    filename: &str,
    page: u32,
) -> Result<PathBuf, StageError> {
    let path = dir.join(filename);
    image
        .save_with_format(&path, ImageFormat::Png)
        .map_err(|e| StageError::SaveFailed {
            page,
            path: path.clone(),
            detail: e.to_string(),
        })?;
    debug!("Saved QR image {}", path.display());
    Ok(path)
}
