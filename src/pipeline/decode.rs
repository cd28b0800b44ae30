//! QR decoding: turn a raster image into zero or more text payloads.
//!
//! Bit-level decoding is delegated to [rqrr]; the rest of the crate only sees
//! the [`QrDecoder`] trait so tests (and hosts with a different decoder) can
//! substitute their own implementation.

use image::DynamicImage;
use thiserror::Error;
use tracing::debug;

/// One decoded QR symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedQr {
    /// The text payload.
    pub payload: String,
    /// Corner points of the symbol in image coordinates.
    pub bounds: [(i32, i32); 4],
}

impl DecodedQr {
    /// A decoded symbol whose geometry is unknown or irrelevant.
    pub fn from_payload(payload: impl Into<String>) -> Self {
        Self {
            payload: payload.into(),
            bounds: [(0, 0); 4],
        }
    }
}

/// A decoder failure for a whole image (as opposed to one unreadable grid).
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct DecodeError(pub String);

/// Decodes QR symbols from a raster image.
///
/// Results are returned in discovery order and may be empty. A panic inside
/// `decode` is caught by the detector and counted as a failed attempt.
pub trait QrDecoder: Send + Sync {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<DecodedQr>, DecodeError>;
}

/// [`QrDecoder`] backed by the pure-Rust `rqrr` crate.
#[derive(Debug, Clone, Copy, Default)]
pub struct RqrrDecoder;

impl QrDecoder for RqrrDecoder {
    fn decode(&self, image: &DynamicImage) -> Result<Vec<DecodedQr>, DecodeError> {
        let gray = image.to_luma8();
        let (w, h) = (gray.width() as usize, gray.height() as usize);

        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(w, h, |x, y| {
            gray.get_pixel(x as u32, y as u32).0[0]
        });
        let grids = prepared.detect_grids();
        debug!("rqrr found {} candidate grids in {}x{} image", grids.len(), w, h);

        let mut decoded = Vec::with_capacity(grids.len());
        for (i, grid) in grids.iter().enumerate() {
            match grid.decode() {
                Ok((_meta, payload)) => {
                    let b = grid.bounds;
                    decoded.push(DecodedQr {
                        payload,
                        bounds: [
                            (b[0].x, b[0].y),
                            (b[1].x, b[1].y),
                            (b[2].x, b[2].y),
                            (b[3].x, b[3].y),
                        ],
                    });
                }
                Err(e) => debug!("grid {} did not decode: {}", i + 1, e),
            }
        }
        Ok(decoded)
    }
}
