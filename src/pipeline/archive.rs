//! Archive extraction: unpack a zip of PDFs before the batch runs.
//!
//! Every entry is extracted with its internal path preserved. Entries whose
//! names would escape the destination (absolute paths, `..`) are rejected by
//! the zip crate's enclosed-name check and fail the whole extraction.

use crate::error::PdfQrError;
use std::fs::File;
use std::path::Path;
use tracing::info;

/// Name of the sub-folder of the destination that receives archive contents.
pub const EXTRACTED_DIR_NAME: &str = "extracted_pdfs";

/// Extract all entries of `archive_path` into `dest`, creating it if needed.
///
/// Returns the number of entries in the archive.
pub fn extract_archive(archive_path: &Path, dest: &Path) -> Result<usize, PdfQrError> {
    let failed = |detail: String| PdfQrError::ArchiveExtractionFailed {
        path: archive_path.to_path_buf(),
        detail,
    };

    let file = File::open(archive_path).map_err(|e| failed(e.to_string()))?;
    let mut archive = zip::ZipArchive::new(file).map_err(|e| failed(e.to_string()))?;

    std::fs::create_dir_all(dest).map_err(|e| PdfQrError::OutputDirFailed {
        path: dest.to_path_buf(),
        source: e,
    })?;

    let entries = archive.len();
    archive.extract(dest).map_err(|e| failed(e.to_string()))?;

    info!(
        "Extracted {} entries from {} to {}",
        entries,
        archive_path.display(),
        dest.display()
    );
    Ok(entries)
}
