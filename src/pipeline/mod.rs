//! Pipeline stages for QR extraction from PDFs.
//!
//! Each submodule implements exactly one step, so each can be tested on its
//! own and the two external engines (pdfium, rqrr) can be swapped behind
//! their traits without touching the other stages.
//!
//! ## Data Flow
//!
//! ```text
//! archive ──▶ input ──▶ extract ──▶ detect ──────────▶ persist
//!  (zip)     (list)    (pdfium)    │  ▲                (PNG)
//!                                  ▼  │
//!                            preprocess + decode
//!                            (imageproc)  (rqrr)
//! ```
//!
//! 1. [`archive`]    — unpack a zip of PDFs into a working folder
//! 2. [`input`]      — validate a PDF path, enumerate a folder, derive names
//! 3. [`extract`]    — walk the embedded raster images of a document; runs on
//!    a blocking worker because pdfium is not async-safe
//! 4. [`detect`]     — the raw → enhanced → thresholded fallback chain
//! 5. [`preprocess`] — contrast/sharpness enhancement and denoise + adaptive
//!    threshold renderings
//! 6. [`decode`]     — locate and decode QR symbols in one rendering
//! 7. [`persist`]    — name and save the rendering a payload was read from

pub mod archive;
pub mod decode;
pub mod detect;
pub mod extract;
pub mod input;
pub mod persist;
pub mod preprocess;
