//! # edgequake-pdfqr
//!
//! Find the QR codes embedded in PDF documents and report what they say.
//!
//! ## Why this crate?
//!
//! Scanned delivery notes, invoices and labels often carry a QR code as an
//! embedded raster image. Those images are rarely clean: low contrast, soft
//! focus, uneven lighting. This crate pulls each embedded image out of the
//! PDF, tries to decode it as-is, and only when that fails retries on
//! progressively more aggressive renderings. Every hit is saved as an image
//! and written to a CSV report.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / folder / zip
//!  │
//!  ├─ 1. Archive  unpack a zip into {dest}/extracted_pdfs/
//!  ├─ 2. Input    validate the PDF, or list a folder in name order
//!  ├─ 3. Extract  walk embedded images via pdfium (spawn_blocking)
//!  ├─ 4. Detect   raw → enhanced → thresholded, first hit wins
//!  ├─ 5. Persist  save the winning rendering per payload as PNG
//!  └─ 6. Report   one CSV row per QR code, or a sentinel row
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdfqr::{scan_folder, ScanConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ScanConfig::default();
//!     let batch = scan_folder("inbox/", "out/images", "out/report.csv", &config).await?;
//!     eprintln!("{} QR code(s) in {} document(s), {} failed",
//!         batch.qr_codes_found, batch.documents, batch.failed_documents);
//!     Ok(())
//! }
//! ```
//!
//! ## Report format
//!
//! | PDF Name | Page Number | QR Code Data | QR Image Path |
//! |----------|-------------|--------------|---------------|
//! | `A.pdf`  | `1`         | payload      | `out/images/A/Apage1qr1idpayload.png` |
//! | `B.pdf`  |             | `NO QR code found` |         |
//! | `C.pdf`  |             | `Error processing PDF` |     |
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfqr` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! edgequake-pdfqr = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod report;
pub mod scan;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{
    run_job, run_job_sync, scan_archive, scan_archive_sync, scan_folder, scan_folder_sync, ScanSource,
};
pub use config::{PreprocessParams, ScanConfig, ScanConfigBuilder};
pub use error::{PdfQrError, StageError};
pub use output::{
    BatchReport, DocumentReport, DocumentStats, QrRecord, StrategyHits, NO_QR_FOUND, PROCESSING_ERROR,
};
pub use pipeline::decode::{DecodeError, DecodedQr, QrDecoder, RqrrDecoder};
pub use pipeline::detect::{Detection, Detector, ImageContext, Strategy};
pub use pipeline::extract::{ExtractedImage, ImageSink, ImageSource, MemoryImageSource, PdfiumImageSource};
pub use pipeline::preprocess::{Preprocessor, StandardPreprocessor};
pub use progress::{
    Diagnostic, DiagnosticLevel, NoopProgressCallback, ProgressCallback, ScanProgressCallback, Stage,
};
pub use report::{read_report, write_report};
pub use scan::{scan_document, scan_pdf, scan_pdf_sync};
