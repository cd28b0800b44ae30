//! Progress and diagnostic callbacks for document and batch scans.
//!
//! Inject an [`Arc<dyn ScanProgressCallback>`] via
//! [`crate::config::ScanConfigBuilder::progress_callback`] to receive
//! events as the scanner walks documents, images and QR codes.
//!
//! # Diagnostics
//!
//! Every error the pipeline catches and recovers from (an image the PDF
//! engine cannot decode, a failed detection attempt, a QR image that could
//! not be saved, a document that failed entirely) is logged with `tracing`
//! *and* delivered to [`ScanProgressCallback::on_diagnostic`] with its level,
//! stage, document and page. Hosts that need an audit trail of what was
//! skipped can collect these instead of scraping logs.
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdfqr::{Diagnostic, ScanConfig, ScanProgressCallback};
//! use std::sync::{Arc, Mutex};
//!
//! #[derive(Default)]
//! struct Collect {
//!     seen: Mutex<Vec<String>>,
//! }
//!
//! impl ScanProgressCallback for Collect {
//!     fn on_diagnostic(&self, diagnostic: &Diagnostic) {
//!         self.seen.lock().unwrap().push(diagnostic.to_string());
//!     }
//! }
//!
//! let config = ScanConfig::builder()
//!     .progress_callback(Arc::new(Collect::default()))
//!     .build()
//!     .unwrap();
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Called by the scanner as it processes documents.
///
/// Implementations must be `Send + Sync`: with `concurrency > 1` documents
/// are scanned on several blocking workers at once. All methods have no-op
/// defaults so callers only override what they care about.
pub trait ScanProgressCallback: Send + Sync {
    /// Called once before the first document of a batch.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called when a document starts (`index` is 1-based).
    fn on_document_start(&self, pdf_name: &str, index: usize, total: usize) {
        let _ = (pdf_name, index, total);
    }

    /// Called for every QR payload that was decoded and saved.
    fn on_qr_found(&self, pdf_name: &str, page: u32, payload: &str) {
        let _ = (pdf_name, page, payload);
    }

    /// Called when a document finished, with its number of real detections.
    fn on_document_complete(&self, pdf_name: &str, qr_count: usize) {
        let _ = (pdf_name, qr_count);
    }

    /// Called when a document failed entirely.
    fn on_document_error(&self, pdf_name: &str, error: &str) {
        let _ = (pdf_name, error);
    }

    /// Called once after every document of a batch has been attempted.
    fn on_batch_complete(&self, total_documents: usize, failed_documents: usize, qr_total: usize) {
        let _ = (total_documents, failed_documents, qr_total);
    }

    /// Called for every caught, recovered-from problem.
    fn on_diagnostic(&self, diagnostic: &Diagnostic) {
        let _ = diagnostic;
    }
}

/// A no-op implementation, used when no callback is configured.
pub struct NoopProgressCallback;

impl ScanProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ScanConfig`].
pub type ProgressCallback = Arc<dyn ScanProgressCallback>;

/// Severity of a [`Diagnostic`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiagnosticLevel {
    Info,
    Warning,
    Error,
}

/// Pipeline stage a [`Diagnostic`] originates from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Stage {
    /// Pulling embedded images out of the PDF.
    Extract,
    /// Running one decode attempt.
    Detect,
    /// Writing a QR image to disk.
    Persist,
    /// Whole-document processing.
    Document,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Extract => "extract",
            Stage::Detect => "detect",
            Stage::Persist => "persist",
            Stage::Document => "document",
        })
    }
}

/// One caught error with enough context to diagnose it after the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub stage: Stage,
    /// File name of the document being processed.
    pub pdf_name: String,
    /// 1-indexed page, when the problem is scoped to a page.
    pub page: Option<u32>,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.page {
            Some(page) => write!(
                f,
                "[{}] {} page {}: {}",
                self.stage, self.pdf_name, page, self.message
            ),
            None => write!(f, "[{}] {}: {}", self.stage, self.pdf_name, self.message),
        }
    }
}

/// Log `diagnostic` at its level and forward it to the callback, if any.
pub(crate) fn emit(callback: Option<&ProgressCallback>, diagnostic: Diagnostic) {
    match diagnostic.level {
        DiagnosticLevel::Info => info!("{}", diagnostic),
        DiagnosticLevel::Warning => warn!("{}", diagnostic),
        DiagnosticLevel::Error => error!("{}", diagnostic),
    }
    if let Some(cb) = callback {
        cb.on_diagnostic(&diagnostic);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct TrackingCallback {
        documents: AtomicUsize,
        qr_codes: AtomicUsize,
        errors: AtomicUsize,
        diagnostics: Mutex<Vec<Diagnostic>>,
    }

    impl ScanProgressCallback for TrackingCallback {
        fn on_document_start(&self, _pdf_name: &str, _index: usize, _total: usize) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }

        fn on_qr_found(&self, _pdf_name: &str, _page: u32, _payload: &str) {
            self.qr_codes.fetch_add(1, Ordering::SeqCst);
        }

        fn on_document_error(&self, _pdf_name: &str, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_diagnostic(&self, diagnostic: &Diagnostic) {
            self.diagnostics.lock().unwrap().push(diagnostic.clone());
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start("a.pdf", 1, 2);
        cb.on_qr_found("a.pdf", 1, "ABC");
        cb.on_document_complete("a.pdf", 1);
        cb.on_document_error("b.pdf", "corrupt");
        cb.on_batch_complete(2, 1, 1);
    }

    #[test]
    fn emit_forwards_to_callback() {
        let tracker = Arc::new(TrackingCallback::default());
        let cb: ProgressCallback = tracker.clone();

        emit(
            Some(&cb),
            Diagnostic {
                level: DiagnosticLevel::Warning,
                stage: Stage::Persist,
                pdf_name: "a.pdf".into(),
                page: Some(2),
                message: "disk full".into(),
            },
        );

        let seen = tracker.diagnostics.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].stage, Stage::Persist);
        assert_eq!(seen[0].page, Some(2));
    }

    #[test]
    fn emit_without_callback_is_fine() {
        emit(
            None,
            Diagnostic {
                level: DiagnosticLevel::Info,
                stage: Stage::Document,
                pdf_name: "a.pdf".into(),
                page: None,
                message: "done".into(),
            },
        );
    }

    #[test]
    fn diagnostic_display_includes_context() {
        let d = Diagnostic {
            level: DiagnosticLevel::Error,
            stage: Stage::Extract,
            pdf_name: "scan.pdf".into(),
            page: Some(4),
            message: "bad stream".into(),
        };
        assert_eq!(d.to_string(), "[extract] scan.pdf page 4: bad stream");

        let d = Diagnostic { page: None, ..d };
        assert_eq!(d.to_string(), "[extract] scan.pdf: bad stream");
    }

    #[test]
    fn tracking_callback_counts_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start("a.pdf", 1, 1);
        tracker.on_qr_found("a.pdf", 1, "X");
        tracker.on_qr_found("a.pdf", 1, "Y");
        tracker.on_document_error("a.pdf", "boom");
        assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.qr_codes.load(Ordering::SeqCst), 2);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
    }
}
