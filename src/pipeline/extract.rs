//! Image extraction: pull embedded raster images out of a PDF via pdfium.
//!
//! Images are handed to the caller one at a time, in page order and in the
//! order pdfium lists each page's objects, so peak memory stays at one image
//! plus whatever the caller keeps. An image object pdfium cannot turn into
//! pixels is reported to the caller as a [`StageError::ExtractFailed`] and the
//! walk continues; only failures to open the document itself are fatal.
//!
//! ## Why the raw image?
//!
//! `get_raw_image` returns the bitmap at its native resolution, without the
//! page's transformation matrix applied. Scaling and rotation done for display
//! only make small QR modules blurrier.

use crate::error::{PdfQrError, StageError};
use crate::pipeline::input;
use image::DynamicImage;
use pdfium_render::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One embedded image and where it came from.
#[derive(Debug, Clone)]
pub struct ExtractedImage {
    pub image: DynamicImage,
    /// 1-indexed page number.
    pub page: u32,
    /// 1-indexed position of the image among the page's images.
    pub index: usize,
}

/// Receives each extracted image, or the error for an image that was skipped.
pub type ImageSink<'a> = dyn FnMut(Result<ExtractedImage, StageError>) + 'a;

/// Yields the raster images embedded in a document.
pub trait ImageSource: Send + Sync {
    /// Walk `pdf_path`, handing every embedded image to `sink` as it is decoded.
    ///
    /// Returns `Err` only when the document as a whole cannot be read.
    fn extract(&self, pdf_path: &Path, sink: &mut ImageSink<'_>) -> Result<(), PdfQrError>;
}

/// [`ImageSource`] backed by the pdfium library.
///
/// A fresh pdfium binding is created per document, so the source itself holds
/// only configuration and can be shared across blocking workers.
#[derive(Debug, Clone, Default)]
pub struct PdfiumImageSource {
    lib_path: Option<PathBuf>,
    password: Option<String>,
}

impl PdfiumImageSource {
    pub fn new(lib_path: Option<PathBuf>, password: Option<String>) -> Self {
        Self { lib_path, password }
    }

    /// Bind to pdfium: explicit path, then `PDFIUM_LIB_PATH`, then the working
    /// directory, then the system library.
    fn bind(&self) -> Result<Pdfium, PdfQrError> {
        let explicit = self
            .lib_path
            .clone()
            .or_else(|| std::env::var_os("PDFIUM_LIB_PATH").map(PathBuf::from));

        let bindings = match explicit {
            Some(path) => {
                let lib = if path.is_dir() {
                    Pdfium::pdfium_platform_library_name_at_path(&path)
                } else {
                    path
                };
                debug!("Binding pdfium from {}", lib.display());
                Pdfium::bind_to_library(&lib)
            }
            None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                .or_else(|_| Pdfium::bind_to_system_library()),
        }
        .map_err(|e| PdfQrError::PdfiumBindingFailed(format!("{:?}", e)))?;

        Ok(Pdfium::new(bindings))
    }
}

impl ImageSource for PdfiumImageSource {
    fn extract(&self, pdf_path: &Path, sink: &mut ImageSink<'_>) -> Result<(), PdfQrError> {
        input::validate_pdf(pdf_path)?;
        let pdfium = self.bind()?;
        let password = self.password.as_deref();

        let document = pdfium.load_pdf_from_file(pdf_path, password).map_err(|e| {
            let err_str = format!("{:?}", e);
            if err_str.contains("Password") || err_str.contains("password") {
                if password.is_some() {
                    PdfQrError::WrongPassword {
                        path: pdf_path.to_path_buf(),
                    }
                } else {
                    PdfQrError::PasswordRequired {
                        path: pdf_path.to_path_buf(),
                    }
                }
            } else {
                PdfQrError::CorruptPdf {
                    path: pdf_path.to_path_buf(),
                    detail: err_str,
                }
            }
        })?;

        let pages = document.pages();
        info!("PDF loaded: {} pages", pages.len());

        let mut total = 0usize;
        for (page_idx, page) in pages.iter().enumerate() {
            let page_num = page_idx as u32 + 1;
            let mut image_index = 0usize;

            for object in page.objects().iter() {
                let Some(image_object) = object.as_image_object() else {
                    continue;
                };
                image_index += 1;

                match image_object.get_raw_image() {
                    Ok(image) => {
                        debug!(
                            "Page {} image {} → {}x{} px",
                            page_num,
                            image_index,
                            image.width(),
                            image.height()
                        );
                        total += 1;
                        sink(Ok(ExtractedImage {
                            image,
                            page: page_num,
                            index: image_index,
                        }));
                    }
                    Err(e) => sink(Err(StageError::ExtractFailed {
                        page: page_num,
                        image: image_index,
                        detail: format!("{:?}", e),
                    })),
                }
            }
        }

        debug!("Extracted {} images from {}", total, pdf_path.display());
        Ok(())
    }
}

/// An [`ImageSource`] over images already in memory, keyed by file name.
///
/// Useful for hosts that extract images themselves, and for tests. A file name
/// with no entry yields [`PdfQrError::FileNotFound`].
#[derive(Debug, Clone, Default)]
pub struct MemoryImageSource {
    documents: std::collections::HashMap<String, Vec<ExtractedImage>>,
}

impl MemoryImageSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `images` for the document whose file name is `pdf_name`.
    pub fn with_document(mut self, pdf_name: impl Into<String>, images: Vec<ExtractedImage>) -> Self {
        self.documents.insert(pdf_name.into(), images);
        self
    }
}

impl ImageSource for MemoryImageSource {
    fn extract(&self, pdf_path: &Path, sink: &mut ImageSink<'_>) -> Result<(), PdfQrError> {
        let name = input::pdf_file_name(pdf_path);
        let images = self
            .documents
            .get(&name)
            .ok_or_else(|| PdfQrError::FileNotFound {
                path: pdf_path.to_path_buf(),
            })?;
        for image in images {
            sink(Ok(image.clone()));
        }
        Ok(())
    }
}
