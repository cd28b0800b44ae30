//! CSV report: one row per detection or sentinel.
//!
//! The header is always `PDF Name,Page Number,QR Code Data,QR Image Path`,
//! even when there are no rows. Sentinel rows leave the page and path cells
//! empty. The file is written to a temporary file next to the target and
//! renamed into place, so a reader never sees a half-written report.

use crate::error::PdfQrError;
use crate::output::QrRecord;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::info;

/// Column headers, in order.
pub const REPORT_HEADERS: [&str; 4] = ["PDF Name", "Page Number", "QR Code Data", "QR Image Path"];

#[derive(Debug, Serialize, Deserialize)]
struct ReportRow {
    #[serde(rename = "PDF Name")]
    pdf_name: String,
    #[serde(rename = "Page Number")]
    page_number: Option<u32>,
    #[serde(rename = "QR Code Data")]
    data: String,
    #[serde(rename = "QR Image Path")]
    image_path: Option<String>,
}

impl From<&QrRecord> for ReportRow {
    fn from(record: &QrRecord) -> Self {
        Self {
            pdf_name: record.pdf_name.clone(),
            page_number: record.page_number,
            data: record.data.clone(),
            image_path: record
                .image_path
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
        }
    }
}

impl From<ReportRow> for QrRecord {
    fn from(row: ReportRow) -> Self {
        Self {
            pdf_name: row.pdf_name,
            page_number: row.page_number,
            data: row.data,
            image_path: row.image_path.filter(|p| !p.is_empty()).map(PathBuf::from),
        }
    }
}

/// Write `records` to `path` as a CSV report, replacing any existing file.
pub fn write_report(path: &Path, records: &[QrRecord]) -> Result<(), PdfQrError> {
    let failed = |detail: String| PdfQrError::ReportWriteFailed {
        path: path.to_path_buf(),
        detail,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(|e| PdfQrError::OutputDirFailed {
        path: parent.clone(),
        source: e,
    })?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(|e| failed(e.to_string()))?;
    {
        // Header written by hand so an empty report still has one.
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(tmp.as_file_mut());
        writer
            .write_record(REPORT_HEADERS)
            .map_err(|e| failed(e.to_string()))?;
        for record in records {
            writer
                .serialize(ReportRow::from(record))
                .map_err(|e| failed(e.to_string()))?;
        }
        writer.flush().map_err(|e| failed(e.to_string()))?;
    }
    tmp.as_file_mut()
        .flush()
        .map_err(|e| failed(e.to_string()))?;
    tmp.persist(path).map_err(|e| failed(e.error.to_string()))?;

    info!("Wrote {} rows to {}", records.len(), path.display());
    Ok(())
}

/// Parse a report written by [`write_report`] back into records.
pub fn read_report(path: &Path) -> Result<Vec<QrRecord>, PdfQrError> {
    let failed = |detail: String| PdfQrError::ReportReadFailed {
        path: path.to_path_buf(),
        detail,
    };

    let mut reader = csv::Reader::from_path(path).map_err(|e| failed(e.to_string()))?;
    let headers = reader.headers().map_err(|e| failed(e.to_string()))?;
    if headers.iter().ne(REPORT_HEADERS.iter().copied()) {
        return Err(failed(format!("unexpected header: {:?}", headers)));
    }

    reader
        .deserialize::<ReportRow>()
        .map(|row| row.map(QrRecord::from).map_err(|e| failed(e.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vec<QrRecord> {
        vec![
            QrRecord::detection("A.pdf", 1, "X1", "/out/A/Apage1qr1idX1.png"),
            QrRecord::detection("A.pdf", 3, "has, comma and \"quotes\"", "/out/A/Apage3qr1idhas, comma.png"),
            QrRecord::no_qr_found("B.pdf"),
            QrRecord::processing_error("C.pdf"),
        ]
    }

    #[test]
    fn header_and_sentinel_cells() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        write_report(&path, &sample()).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "PDF Name,Page Number,QR Code Data,QR Image Path");
        assert_eq!(lines[1], "A.pdf,1,X1,/out/A/Apage1qr1idX1.png");
        assert_eq!(lines[3], "B.pdf,,NO QR code found,");
        assert_eq!(lines[4], "C.pdf,,Error processing PDF,");
    }

    #[test]
    fn read_back_matches_written() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.csv");
        let records = sample();
        write_report(&path, &records).unwrap();
        assert_eq!(read_report(&path).unwrap(), records);
    }

    #[test]
    fn empty_report_still_has_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/empty.csv");
        write_report(&path, &[]).unwrap();
        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.trim_end(), "PDF Name,Page Number,QR Code Data,QR Image Path");
        assert!(read_report(&path).unwrap().is_empty());
    }

    #[test]
    fn overwrite_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("r.csv");
        write_report(&path, &sample()).unwrap();
        write_report(&path, &[QrRecord::no_qr_found("Z.pdf")]).unwrap();

        assert_eq!(read_report(&path).unwrap().len(), 1);
        let entries = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(entries, 1);
    }

    #[test]
    fn foreign_csv_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("other.csv");
        std::fs::write(&path, "a,b,c,d\n1,2,3,4\n").unwrap();
        assert!(matches!(
            read_report(&path),
            Err(PdfQrError::ReportReadFailed { .. })
        ));
    }
}
