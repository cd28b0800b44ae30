//! Input handling: validate PDF paths, enumerate batch folders, derive names.
//!
//! We check the PDF magic bytes (`%PDF`) before handing a path to pdfium so
//! callers get a meaningful error rather than an opaque engine failure.

use crate::error::PdfQrError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Validate that `path` exists, is readable and starts with `%PDF`.
pub fn validate_pdf(path: &Path) -> Result<(), PdfQrError> {
    if !path.exists() {
        return Err(PdfQrError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(mut f) => {
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() && &magic != b"%PDF" {
                return Err(PdfQrError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(PdfQrError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(PdfQrError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Resolved local PDF: {}", path.display());
    Ok(())
}

/// File name of `path` as shown in reports (`reports/A.pdf` → `A.pdf`).
pub fn pdf_file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

/// Everything before the first `.` of a file name (`v2.final.pdf` → `v2`).
pub fn document_stem(file_name: &str) -> &str {
    file_name.split('.').next().unwrap_or(file_name)
}

/// Whether `path` has a `.pdf` extension (any case).
pub fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false)
}

/// List the PDF files directly inside `folder`, sorted by file name.
///
/// Sub-directories are not descended into.
pub fn list_documents(folder: &Path) -> Result<Vec<PathBuf>, PdfQrError> {
    let unreadable = |source| PdfQrError::FolderUnreadable {
        path: folder.to_path_buf(),
        source,
    };

    let mut documents = Vec::new();
    for entry in std::fs::read_dir(folder).map_err(unreadable)? {
        let entry = entry.map_err(unreadable)?;
        let path = entry.path();
        if path.is_file() && is_pdf(&path) {
            documents.push(path);
        }
    }
    documents.sort_by_key(|p| pdf_file_name(p));

    debug!("Found {} PDFs in {}", documents.len(), folder.display());
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn stem_truncates_at_first_period() {
        assert_eq!(document_stem("v2.final.pdf"), "v2");
        assert_eq!(document_stem("A.pdf"), "A");
        assert_eq!(document_stem("noext"), "noext");
        assert_eq!(document_stem(".hidden.pdf"), "");
    }

    #[test]
    fn file_name_strips_directories() {
        assert_eq!(pdf_file_name(Path::new("/in/batch/A.pdf")), "A.pdf");
    }

    #[test]
    fn pdf_extension_is_case_insensitive() {
        assert!(is_pdf(Path::new("a.pdf")));
        assert!(is_pdf(Path::new("a.PDF")));
        assert!(!is_pdf(Path::new("a.pdf.txt")));
        assert!(!is_pdf(Path::new("pdf")));
    }

    #[test]
    fn list_documents_is_sorted_and_flat() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["C.pdf", "A.pdf", "notes.txt", "B.pdf"] {
            fs::write(dir.path().join(name), b"%PDF-1.4").unwrap();
        }
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/D.pdf"), b"%PDF-1.4").unwrap();
        fs::create_dir(dir.path().join("folder.pdf")).unwrap();

        let names: Vec<String> = list_documents(dir.path())
            .unwrap()
            .iter()
            .map(|p| pdf_file_name(p))
            .collect();
        assert_eq!(names, vec!["A.pdf", "B.pdf", "C.pdf"]);
    }

    #[test]
    fn list_documents_missing_folder_is_fatal() {
        let err = list_documents(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, PdfQrError::FolderUnreadable { .. }));
    }

    #[test]
    fn validate_rejects_missing_and_non_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.pdf");
        assert!(matches!(
            validate_pdf(&missing),
            Err(PdfQrError::FileNotFound { .. })
        ));

        let fake = dir.path().join("fake.pdf");
        fs::write(&fake, b"PK\x03\x04rest").unwrap();
        assert!(matches!(
            validate_pdf(&fake),
            Err(PdfQrError::NotAPdf { magic, .. }) if &magic == b"PK\x03\x04"
        ));

        let real = dir.path().join("real.pdf");
        fs::write(&real, b"%PDF-1.7\n").unwrap();
        assert!(validate_pdf(&real).is_ok());
    }
}
