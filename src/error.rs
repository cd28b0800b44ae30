//! Error types for the edgequake-pdfqr library.
//!
//! Two distinct error types reflect two distinct failure scopes:
//!
//! * [`PdfQrError`] — **Fatal** for the call that returns it: a document
//!   cannot be opened, a folder cannot be listed, an archive cannot be
//!   unpacked, the report cannot be written. Inside a batch, a per-document
//!   `PdfQrError` is turned into an "Error processing PDF" row instead of
//!   aborting the run.
//!
//! * [`StageError`] — **Non-fatal**: one embedded image could not be decoded
//!   by the PDF engine, one detection attempt failed, or one QR image could
//!   not be saved. It is logged and handed to the diagnostic sink
//!   ([`crate::progress::ScanProgressCallback::on_diagnostic`]) and
//!   processing carries on with the next attempt, image or code.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the edgequake-pdfqr library.
#[derive(Debug, Error)]
pub enum PdfQrError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── PDF errors ────────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{path}' is corrupt: {detail}")]
    CorruptPdf { path: PathBuf, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{path}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { path: PathBuf },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{path}'")]
    WrongPassword { path: PathBuf },

    // ── Batch input errors ────────────────────────────────────────────────
    /// The batch folder could not be listed.
    #[error("Cannot read folder '{path}': {source}")]
    FolderUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The zip archive could not be opened or fully extracted.
    #[error("Failed to extract archive '{path}': {detail}")]
    ArchiveExtractionFailed { path: PathBuf, detail: String },

    // ── Output errors ─────────────────────────────────────────────────────
    /// Could not create a destination directory.
    #[error("Failed to create directory '{path}': {source}")]
    OutputDirFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Could not create or write the CSV report.
    #[error("Failed to write report '{path}': {detail}")]
    ReportWriteFailed { path: PathBuf, detail: String },

    /// Could not read back a CSV report.
    #[error("Failed to read report '{path}': {detail}")]
    ReportReadFailed { path: PathBuf, detail: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (or pass --pdfium-lib).\n\
  • Place libpdfium next to the working directory.\n\
  • Install pdfium system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal error scoped to one embedded image or one QR code.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum StageError {
    /// The PDF engine could not turn an embedded image object into pixels.
    #[error("Page {page}, image {image}: extraction failed: {detail}")]
    ExtractFailed {
        page: u32,
        image: usize,
        detail: String,
    },

    /// The QR decoder failed on one detection attempt.
    #[error("Page {page}: {strategy} decode attempt failed: {detail}")]
    DecodeFailed {
        page: u32,
        strategy: String,
        detail: String,
    },

    /// A QR image could not be written to disk.
    #[error("Page {page}: failed to save '{path}': {detail}")]
    SaveFailed {
        page: u32,
        path: PathBuf,
        detail: String,
    },
}

impl StageError {
    /// Page the failure belongs to (1-indexed).
    pub fn page(&self) -> u32 {
        match self {
            StageError::ExtractFailed { page, .. }
            | StageError::DecodeFailed { page, .. }
            | StageError::SaveFailed { page, .. } => *page,
        }
    }
}
