//! Document processor: one PDF in, one [`DocumentReport`] out.
//!
//! Images are taken from the configured [`ImageSource`] one at a time and run
//! through the [`Detector`]. Each payload of a successful detection is saved
//! as `{image_dir}/{stem}/{stem}page{page}qr{index}id{payload}.png`, where the
//! saved image is the rendering the payload was decoded from.
//!
//! Saving is best effort: a QR image that cannot be written is reported as a
//! [`Stage::Persist`] diagnostic and its row is left out. A document that
//! produced no rows gets a single "NO QR code found" row.

use crate::config::ScanConfig;
use crate::error::{PdfQrError, StageError};
use crate::output::{DocumentReport, DocumentStats, QrRecord};
use crate::pipeline::detect::{Detector, ImageContext};
use crate::pipeline::extract::ExtractedImage;
use crate::pipeline::{input, persist};
use crate::progress::{emit, Diagnostic, DiagnosticLevel, ProgressCallback, Stage};
use crate::report;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Scan one document, saving QR images under `image_dir/{stem}/`.
///
/// Blocking: pdfium and the transforms are CPU-bound. Async callers should
/// go through [`scan_pdf`] or the batch functions, which run this on a
/// blocking worker.
///
/// # Errors
/// Returns [`PdfQrError`] when the document as a whole cannot be read. Per
/// image and per QR failures are reported through the diagnostic sink.
pub fn scan_document(
    pdf_path: &Path,
    image_dir: &Path,
    config: &ScanConfig,
) -> Result<DocumentReport, PdfQrError> {
    let start = Instant::now();
    let pdf_name = input::pdf_file_name(pdf_path);
    let stem = input::document_stem(&pdf_name).to_string();
    let qr_dir = image_dir.join(&stem);

    let source = config.resolve_image_source();
    let decoder = config.resolve_decoder();
    let preprocessor = config.resolve_preprocessor();
    let callback = config.progress_callback.as_ref();
    let detector = Detector::new(decoder.as_ref(), preprocessor.as_ref()).with_callback(callback);

    info!("Scanning {}", pdf_path.display());

    let mut records: Vec<QrRecord> = Vec::new();
    let mut stats = DocumentStats::default();
    let mut qr_dir_ready = false;

    let mut on_image = |item: Result<ExtractedImage, StageError>| {
        let extracted = match item {
            Ok(extracted) => extracted,
            Err(e) => {
                stats.images_skipped += 1;
                report_stage_error(callback, &pdf_name, Stage::Extract, &e);
                return;
            }
        };
        stats.images_scanned += 1;

        let page = extracted.page;
        let ctx = ImageContext {
            pdf_name: &pdf_name,
            page,
        };
        let Some(detection) = detector.detect(&extracted.image, ctx) else {
            return;
        };
        stats.strategy_hits.record(detection.strategy);

        for (i, payload) in detection.payloads.iter().enumerate() {
            let filename = persist::qr_image_filename(&stem, page, i + 1, payload);
            let saved = ensure_dir(&qr_dir, &mut qr_dir_ready, page)
                .and_then(|()| persist::save_qr_image(&detection.image, &qr_dir, &filename, page));

            match saved {
                Ok(path) => {
                    if let Some(cb) = callback {
                        cb.on_qr_found(&pdf_name, page, payload);
                    }
                    records.push(QrRecord::detection(pdf_name.as_str(), page, payload.as_str(), path));
                }
                Err(e) => {
                    stats.failed_saves += 1;
                    report_stage_error(callback, &pdf_name, Stage::Persist, &e);
                }
            }
        }
    };
    source.extract(pdf_path, &mut on_image)?;

    let qr_codes_found = records.len();
    if records.is_empty() {
        records.push(QrRecord::no_qr_found(pdf_name.as_str()));
    }
    stats.duration_ms = start.elapsed().as_millis() as u64;

    info!(
        "{}: {} QR code(s) from {} image(s) ({} skipped, {} failed saves) in {}ms",
        pdf_name,
        qr_codes_found,
        stats.images_scanned,
        stats.images_skipped,
        stats.failed_saves,
        stats.duration_ms
    );
    if let Some(cb) = callback {
        cb.on_document_complete(&pdf_name, qr_codes_found);
    }

    Ok(DocumentReport {
        pdf_name,
        records,
        qr_codes_found,
        stats,
    })
}

/// Scan a single PDF and write its report to `report_path`.
///
/// QR images are saved next to the document, in `{pdf_dir}/{stem}/`. Unlike
/// the batch functions, a document failure is returned as the error rather
/// than turned into a sentinel row.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfqr::{scan_pdf, ScanConfig};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = ScanConfig::default();
///     let report = scan_pdf("invoice.pdf", "invoice.csv", &config).await?;
///     println!("{} QR code(s)", report.qr_codes_found);
///     Ok(())
/// }
/// ```
pub async fn scan_pdf(
    pdf_path: impl AsRef<Path>,
    report_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<DocumentReport, PdfQrError> {
    let pdf_path = pdf_path.as_ref().to_path_buf();
    let report_path = report_path.as_ref().to_path_buf();
    let image_dir = pdf_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let pdf_name = input::pdf_file_name(&pdf_path);
    let callback = config.progress_callback.clone();

    if let Some(ref cb) = callback {
        cb.on_document_start(&pdf_name, 1, 1);
    }

    let cfg = config.clone();
    let result = tokio::task::spawn_blocking(move || scan_document(&pdf_path, &image_dir, &cfg))
        .await
        .map_err(|e| PdfQrError::Internal(format!("spawn_blocking panicked: {}", e)))
        .and_then(|r| r);

    let document = match result {
        Ok(document) => document,
        Err(e) => {
            if let Some(ref cb) = callback {
                cb.on_document_error(&pdf_name, &e.to_string());
            }
            return Err(e);
        }
    };

    report::write_report(&report_path, &document.records)?;
    Ok(document)
}

/// Synchronous wrapper around [`scan_pdf`].
///
/// Creates a temporary tokio runtime internally.
pub fn scan_pdf_sync(
    pdf_path: impl AsRef<Path>,
    report_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<DocumentReport, PdfQrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfQrError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(scan_pdf(pdf_path, report_path, config))
}

fn ensure_dir(dir: &Path, ready: &mut bool, page: u32) -> Result<(), StageError> {
    if *ready {
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| StageError::SaveFailed {
        page,
        path: dir.to_path_buf(),
        detail: e.to_string(),
    })?;
    *ready = true;
    Ok(())
}

fn report_stage_error(
    callback: Option<&ProgressCallback>,
    pdf_name: &str,
    stage: Stage,
    error: &StageError,
) {
    emit(
        callback,
        Diagnostic {
            level: DiagnosticLevel::Warning,
            stage,
            pdf_name: pdf_name.to_string(),
            page: Some(error.page()),
            message: error.to_string(),
        },
    );
}
