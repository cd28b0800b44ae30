//! Batch processor, archive flow and job runner.
//!
//! A batch scans every PDF directly inside a folder and writes one
//! consolidated report. A document that fails for any reason (unreadable,
//! corrupt, encrypted, or a panic in its worker) contributes a single
//! "Error processing PDF" row and the batch carries on. Only failures with no
//! narrower scope abort the run: the folder cannot be listed, the archive
//! cannot be unpacked, or the report cannot be written.
//!
//! Documents run on blocking workers, `config.concurrency` at a time. Results
//! are merged with an order-preserving buffered stream, so the report always
//! follows folder enumeration order.

use crate::config::ScanConfig;
use crate::error::PdfQrError;
use crate::output::{BatchReport, DocumentReport, QrRecord};
use crate::pipeline::{archive, input, persist};
use crate::progress::{emit, Diagnostic, DiagnosticLevel, Stage};
use crate::report;
use crate::scan::{scan_document, scan_pdf};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::info;

/// Scan every PDF in `folder` and write the consolidated report.
///
/// QR images go to `image_dir/{stem}/`; the CSV goes to `report_path`.
///
/// # Errors
/// [`PdfQrError::FolderUnreadable`] when `folder` cannot be listed, or a
/// report write error. Per-document failures never surface here.
pub async fn scan_folder(
    folder: impl AsRef<Path>,
    image_dir: impl AsRef<Path>,
    report_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<BatchReport, PdfQrError> {
    let start = Instant::now();
    let folder = folder.as_ref();
    let image_dir = image_dir.as_ref().to_path_buf();
    let report_path = report_path.as_ref().to_path_buf();

    let documents = input::list_documents(folder)?;
    let total = documents.len();
    info!("Scanning {} PDF(s) in {}", total, folder.display());

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_start(total);
    }

    let outcomes: Vec<DocumentOutcome> = stream::iter(documents.into_iter().enumerate().map(|(idx, path)| {
        let cfg = config.clone();
        let image_dir = image_dir.clone();
        async move { scan_one(path, image_dir, cfg, idx + 1, total).await }
    }))
    .buffered(config.concurrency.max(1))
    .collect()
    .await;

    let failed_documents = outcomes.iter().filter(|o| o.failed).count();
    let records: Vec<QrRecord> = outcomes.into_iter().flat_map(|o| o.records).collect();
    let qr_codes_found = records.iter().filter(|r| !r.is_sentinel()).count();

    report::write_report(&report_path, &records)?;

    if let Some(ref cb) = config.progress_callback {
        cb.on_batch_complete(total, failed_documents, qr_codes_found);
    }

    let duration_ms = start.elapsed().as_millis() as u64;
    info!(
        "Batch done: {} document(s), {} failed, {} QR code(s) in {}ms → {}",
        total,
        failed_documents,
        qr_codes_found,
        duration_ms,
        report_path.display()
    );

    Ok(BatchReport {
        records,
        documents: total,
        failed_documents,
        qr_codes_found,
        report_path,
        duration_ms,
    })
}

struct DocumentOutcome {
    records: Vec<QrRecord>,
    failed: bool,
}

async fn scan_one(
    path: PathBuf,
    image_dir: PathBuf,
    config: ScanConfig,
    index: usize,
    total: usize,
) -> DocumentOutcome {
    let pdf_name = input::pdf_file_name(&path);
    let callback = config.progress_callback.clone();
    if let Some(ref cb) = callback {
        cb.on_document_start(&pdf_name, index, total);
    }

    let result = tokio::task::spawn_blocking(move || scan_document(&path, &image_dir, &config))
        .await
        .map_err(|e| PdfQrError::Internal(format!("document worker panicked: {}", e)))
        .and_then(|r| r);

    match result {
        Ok(DocumentReport { records, .. }) => DocumentOutcome {
            records,
            failed: false,
        },
        Err(e) => {
            let message = e.to_string();
            emit(
                callback.as_ref(),
                Diagnostic {
                    level: DiagnosticLevel::Error,
                    stage: Stage::Document,
                    pdf_name: pdf_name.clone(),
                    page: None,
                    message: message.clone(),
                },
            );
            if let Some(ref cb) = callback {
                cb.on_document_error(&pdf_name, &message);
            }
            DocumentOutcome {
                records: vec![QrRecord::processing_error(pdf_name)],
                failed: true,
            }
        }
    }
}

/// Unpack `archive_path` into `{dest}/extracted_pdfs/`, then scan that folder.
pub async fn scan_archive(
    archive_path: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    image_dir: impl AsRef<Path>,
    report_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<BatchReport, PdfQrError> {
    let archive_path = archive_path.as_ref().to_path_buf();
    let extract_to = dest.as_ref().join(archive::EXTRACTED_DIR_NAME);

    let target = extract_to.clone();
    tokio::task::spawn_blocking(move || archive::extract_archive(&archive_path, &target))
        .await
        .map_err(|e| PdfQrError::Internal(format!("archive worker panicked: {}", e)))??;

    scan_folder(&extract_to, image_dir, report_path, config).await
}

/// What a job scans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum ScanSource {
    /// A single PDF document.
    Pdf(PathBuf),
    /// A folder of PDF documents.
    Folder(PathBuf),
    /// A zip archive of PDF documents.
    Archive(PathBuf),
}

impl ScanSource {
    /// Guess the source kind from `path`: a directory is a folder, a `.zip`
    /// file is an archive, anything else is treated as a PDF.
    pub fn detect(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            ScanSource::Folder(path)
        } else if path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.eq_ignore_ascii_case("zip"))
            .unwrap_or(false)
        {
            ScanSource::Archive(path)
        } else {
            ScanSource::Pdf(path)
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            ScanSource::Pdf(p) | ScanSource::Folder(p) | ScanSource::Archive(p) => p,
        }
    }
}

/// Run a complete job the way an operator would: pick a source, a destination
/// folder and a job name.
///
/// The name is sanitised like a QR payload; the report goes to
/// `{dest}/{name}.csv` and batch images to `{dest}/{name}/`. A single PDF
/// keeps its images next to the document instead.
///
/// # Example
/// ```rust,no_run
/// use edgequake_pdfqr::{run_job, ScanConfig, ScanSource};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let source = ScanSource::detect("invoices.zip");
///     let report = run_job(&source, "out", "march", &ScanConfig::default()).await?;
///     println!("report at {}", report.report_path.display());
///     Ok(())
/// }
/// ```
pub async fn run_job(
    source: &ScanSource,
    dest: impl AsRef<Path>,
    name: &str,
    config: &ScanConfig,
) -> Result<BatchReport, PdfQrError> {
    let dest = dest.as_ref();
    let job_name = persist::sanitize_filename(name.trim());
    if job_name.is_empty() {
        return Err(PdfQrError::InvalidConfig(
            "job name must not be empty".to_string(),
        ));
    }

    let report_path = dest.join(format!("{}.csv", job_name));
    let image_dir = dest.join(&job_name);
    tokio::fs::create_dir_all(&image_dir)
        .await
        .map_err(|e| PdfQrError::OutputDirFailed {
            path: image_dir.clone(),
            source: e,
        })?;

    match source {
        ScanSource::Pdf(pdf) => {
            let start = Instant::now();
            if let Some(ref cb) = config.progress_callback {
                cb.on_batch_start(1);
            }
            let outcome = scan_pdf(pdf, &report_path, config).await;
            if let Some(ref cb) = config.progress_callback {
                match &outcome {
                    Ok(document) => cb.on_batch_complete(1, 0, document.qr_codes_found),
                    Err(_) => cb.on_batch_complete(1, 1, 0),
                }
            }
            let document = outcome?;
            Ok(BatchReport {
                qr_codes_found: document.qr_codes_found,
                records: document.records,
                documents: 1,
                failed_documents: 0,
                report_path,
                duration_ms: start.elapsed().as_millis() as u64,
            })
        }
        ScanSource::Folder(folder) => scan_folder(folder, &image_dir, &report_path, config).await,
        ScanSource::Archive(zip) => scan_archive(zip, dest, &image_dir, &report_path, config).await,
    }
}

/// Synchronous wrapper around [`scan_folder`].
pub fn scan_folder_sync(
    folder: impl AsRef<Path>,
    image_dir: impl AsRef<Path>,
    report_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<BatchReport, PdfQrError> {
    runtime()?.block_on(scan_folder(folder, image_dir, report_path, config))
}

/// Synchronous wrapper around [`scan_archive`].
pub fn scan_archive_sync(
    archive_path: impl AsRef<Path>,
    dest: impl AsRef<Path>,
    image_dir: impl AsRef<Path>,
    report_path: impl AsRef<Path>,
    config: &ScanConfig,
) -> Result<BatchReport, PdfQrError> {
    runtime()?.block_on(scan_archive(archive_path, dest, image_dir, report_path, config))
}

/// Synchronous wrapper around [`run_job`].
pub fn run_job_sync(
    source: &ScanSource,
    dest: impl AsRef<Path>,
    name: &str,
    config: &ScanConfig,
) -> Result<BatchReport, PdfQrError> {
    runtime()?.block_on(run_job(source, dest, name, config))
}

fn runtime() -> Result<tokio::runtime::Runtime, PdfQrError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| PdfQrError::Internal(format!("Failed to create tokio runtime: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_source_kind() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            ScanSource::detect(dir.path()),
            ScanSource::Folder(dir.path().to_path_buf())
        );
        assert!(matches!(ScanSource::detect("batch.ZIP"), ScanSource::Archive(_)));
        assert!(matches!(ScanSource::detect("a.pdf"), ScanSource::Pdf(_)));
        assert!(matches!(ScanSource::detect("no_extension"), ScanSource::Pdf(_)));
        assert_eq!(ScanSource::detect("x.zip").path(), Path::new("x.zip"));
    }

    #[test]
    fn source_serialises_with_kind_tag() {
        let json = serde_json::to_string(&ScanSource::Archive("in.zip".into())).unwrap();
        assert_eq!(json, r#"{"kind":"archive","path":"in.zip"}"#);
    }

    #[test]
    fn empty_job_name_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let source = ScanSource::Folder(dir.path().to_path_buf());
        let err = run_job_sync(&source, dir.path(), "   ", &ScanConfig::default()).unwrap_err();
        assert!(matches!(err, PdfQrError::InvalidConfig(_)));
    }

    #[test]
    fn missing_folder_is_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let err = scan_folder_sync(
            dir.path().join("absent"),
            dir.path().join("img"),
            dir.path().join("r.csv"),
            &ScanConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PdfQrError::FolderUnreadable { .. }));
        assert!(!dir.path().join("r.csv").exists());
    }

    #[test]
    fn empty_folder_writes_header_only_report() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in");
        std::fs::create_dir(&input).unwrap();
        let report_path = dir.path().join("r.csv");

        let batch = scan_folder_sync(&input, dir.path().join("img"), &report_path, &ScanConfig::default()).unwrap();

        assert_eq!(batch.documents, 0);
        assert!(batch.records.is_empty());
        assert!(report::read_report(&report_path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_archive_aborts_before_scanning() {
        let dir = tempfile::tempdir().unwrap();
        let zip = dir.path().join("broken.zip");
        std::fs::write(&zip, b"nope").unwrap();
        let err = scan_archive_sync(
            &zip,
            dir.path(),
            dir.path().join("img"),
            dir.path().join("r.csv"),
            &ScanConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PdfQrError::ArchiveExtractionFailed { .. }));
    }
}
