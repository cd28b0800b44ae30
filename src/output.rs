//! Result types: report rows, per-document reports and batch reports.

use crate::pipeline::detect::Strategy;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Payload text of the row emitted for a document with no detections.
pub const NO_QR_FOUND: &str = "NO QR code found";

/// Payload text of the row emitted for a document that failed entirely.
pub const PROCESSING_ERROR: &str = "Error processing PDF";

/// One report row.
///
/// A real detection always has a page and a saved image path; the two
/// sentinel rows ([`NO_QR_FOUND`], [`PROCESSING_ERROR`]) have neither.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QrRecord {
    /// File name of the source document, e.g. `A.pdf`.
    pub pdf_name: String,
    /// 1-indexed page the QR code was found on.
    pub page_number: Option<u32>,
    /// Decoded payload, or a sentinel text.
    pub data: String,
    /// Where the image the code was decoded from was saved.
    pub image_path: Option<PathBuf>,
}

impl QrRecord {
    /// A row for a decoded QR code.
    pub fn detection(
        pdf_name: impl Into<String>,
        page: u32,
        data: impl Into<String>,
        image_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            pdf_name: pdf_name.into(),
            page_number: Some(page),
            data: data.into(),
            image_path: Some(image_path.into()),
        }
    }

    /// The row for a document that yielded no QR codes.
    pub fn no_qr_found(pdf_name: impl Into<String>) -> Self {
        Self::sentinel(pdf_name, NO_QR_FOUND)
    }

    /// The row for a document that could not be processed.
    pub fn processing_error(pdf_name: impl Into<String>) -> Self {
        Self::sentinel(pdf_name, PROCESSING_ERROR)
    }

    fn sentinel(pdf_name: impl Into<String>, data: &str) -> Self {
        Self {
            pdf_name: pdf_name.into(),
            page_number: None,
            data: data.to_string(),
            image_path: None,
        }
    }

    /// Whether this row stands in for "nothing found" or "failed".
    pub fn is_sentinel(&self) -> bool {
        self.image_path.is_none() && (self.data == NO_QR_FOUND || self.data == PROCESSING_ERROR)
    }
}

/// How many images were decoded by each strategy of the fallback chain.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyHits {
    pub raw: usize,
    pub enhanced: usize,
    pub thresholded: usize,
}

impl StrategyHits {
    pub fn record(&mut self, strategy: Strategy) {
        match strategy {
            Strategy::Raw => self.raw += 1,
            Strategy::Enhanced => self.enhanced += 1,
            Strategy::Thresholded => self.thresholded += 1,
        }
    }
}

/// Counters for one document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentStats {
    /// Images the source handed over and the detector ran on.
    pub images_scanned: usize,
    /// Images the source could not decode and skipped.
    pub images_skipped: usize,
    /// Images with at least one payload, by winning strategy.
    pub strategy_hits: StrategyHits,
    /// QR images that could not be written (their rows are omitted).
    pub failed_saves: usize,
    pub duration_ms: u64,
}

/// Everything found in one document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentReport {
    pub pdf_name: String,
    /// Rows in page order; never empty.
    pub records: Vec<QrRecord>,
    /// Number of rows that are real detections.
    pub qr_codes_found: usize,
    pub stats: DocumentStats,
}

/// Consolidated result of a folder, archive or single-document job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    /// Rows of every document, in enumeration order.
    pub records: Vec<QrRecord>,
    /// Documents attempted.
    pub documents: usize,
    /// Documents that produced an "Error processing PDF" row.
    pub failed_documents: usize,
    /// Rows that are real detections.
    pub qr_codes_found: usize,
    /// Where the CSV report was written.
    pub report_path: PathBuf,
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_have_no_page_or_path() {
        let none = QrRecord::no_qr_found("a.pdf");
        assert_eq!(none.data, NO_QR_FOUND);
        assert!(none.page_number.is_none() && none.image_path.is_none());
        assert!(none.is_sentinel());

        let err = QrRecord::processing_error("c.pdf");
        assert_eq!(err.data, PROCESSING_ERROR);
        assert!(err.is_sentinel());
    }

    #[test]
    fn detection_is_not_sentinel_even_with_sentinel_text() {
        // A QR code may literally contain the sentinel text.
        let rec = QrRecord::detection("a.pdf", 1, NO_QR_FOUND, "/out/a.png");
        assert!(!rec.is_sentinel());
        assert_eq!(rec.page_number, Some(1));
    }

    #[test]
    fn strategy_hits_count_per_strategy() {
        let mut hits = StrategyHits::default();
        hits.record(Strategy::Raw);
        hits.record(Strategy::Thresholded);
        hits.record(Strategy::Thresholded);
        assert_eq!(
            hits,
            StrategyHits {
                raw: 1,
                enhanced: 0,
                thresholded: 2
            }
        );
    }
}
