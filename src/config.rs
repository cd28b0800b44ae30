//! Configuration types for QR scanning.
//!
//! All scan behaviour is controlled through [`ScanConfig`], built via its
//! [`ScanConfigBuilder`]. Every knob lives in one cloneable struct so a batch
//! can hand the same configuration to each blocking worker.
//!
//! The two external collaborators (the PDF image source and the QR decoder)
//! and the preprocessing pipeline can be replaced with pre-built
//! implementations; when left unset the pdfium, rqrr and standard
//! implementations are used.

use crate::error::PdfQrError;
use crate::pipeline::decode::{QrDecoder, RqrrDecoder};
use crate::pipeline::extract::{ImageSource, PdfiumImageSource};
use crate::pipeline::preprocess::{Preprocessor, StandardPreprocessor};
use crate::progress::{ProgressCallback, ScanProgressCallback};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for a document or batch scan.
///
/// # Example
/// ```rust
/// use edgequake_pdfqr::ScanConfig;
///
/// let config = ScanConfig::builder()
///     .concurrency(4)
///     .password("s3cret")
///     .build()
///     .unwrap();
/// assert_eq!(config.concurrency, 4);
/// ```
#[derive(Clone)]
pub struct ScanConfig {
    /// PDF user password for encrypted documents.
    pub password: Option<String>,

    /// Explicit path to the pdfium shared library (file or directory).
    ///
    /// When `None`, `PDFIUM_LIB_PATH` is consulted, then the working
    /// directory, then the system library search path.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Number of documents scanned at once in a batch. Default: 1.
    ///
    /// With the default, documents are processed strictly one after another.
    /// Higher values run documents on several blocking workers; the report
    /// keeps folder order regardless.
    pub concurrency: usize,

    /// Constants used by the two preprocessing transforms.
    pub preprocess: PreprocessParams,

    /// Pre-constructed image source. Takes precedence over the pdfium default.
    pub image_source: Option<Arc<dyn ImageSource>>,

    /// Pre-constructed QR decoder. Takes precedence over the rqrr default.
    pub decoder: Option<Arc<dyn QrDecoder>>,

    /// Pre-constructed preprocessor. Takes precedence over [`StandardPreprocessor`].
    pub preprocessor: Option<Arc<dyn Preprocessor>>,

    /// Receives progress events and diagnostics.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            password: None,
            pdfium_lib_path: None,
            concurrency: 1,
            preprocess: PreprocessParams::default(),
            image_source: None,
            decoder: None,
            preprocessor: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ScanConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfig")
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("concurrency", &self.concurrency)
            .field("preprocess", &self.preprocess)
            .field("image_source", &self.image_source.as_ref().map(|_| "<dyn ImageSource>"))
            .field("decoder", &self.decoder.as_ref().map(|_| "<dyn QrDecoder>"))
            .field("preprocessor", &self.preprocessor.as_ref().map(|_| "<dyn Preprocessor>"))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ScanProgressCallback>"),
            )
            .finish()
    }
}

impl ScanConfig {
    /// Create a new builder for `ScanConfig`.
    pub fn builder() -> ScanConfigBuilder {
        ScanConfigBuilder {
            config: Self::default(),
        }
    }

    /// The configured image source, or a pdfium-backed one.
    pub fn resolve_image_source(&self) -> Arc<dyn ImageSource> {
        match self.image_source {
            Some(ref source) => Arc::clone(source),
            None => Arc::new(PdfiumImageSource::new(
                self.pdfium_lib_path.clone(),
                self.password.clone(),
            )),
        }
    }

    /// The configured decoder, or the rqrr-backed one.
    pub fn resolve_decoder(&self) -> Arc<dyn QrDecoder> {
        match self.decoder {
            Some(ref decoder) => Arc::clone(decoder),
            None => Arc::new(RqrrDecoder),
        }
    }

    /// The configured preprocessor, or [`StandardPreprocessor`] over `self.preprocess`.
    pub fn resolve_preprocessor(&self) -> Arc<dyn Preprocessor> {
        match self.preprocessor {
            Some(ref preprocessor) => Arc::clone(preprocessor),
            None => Arc::new(StandardPreprocessor::new(self.preprocess.clone())),
        }
    }
}

/// Builder for [`ScanConfig`].
pub struct ScanConfigBuilder {
    config: ScanConfig,
}

impl fmt::Debug for ScanConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScanConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl ScanConfigBuilder {
    pub fn password(mut self, pwd: impl Into<String>) -> Self {
        self.config.password = Some(pwd.into());
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    /// Documents processed at a time; `0` is treated as `1`.
    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn preprocess(mut self, params: PreprocessParams) -> Self {
        self.config.preprocess = params;
        self
    }

    pub fn image_source(mut self, source: Arc<dyn ImageSource>) -> Self {
        self.config.image_source = Some(source);
        self
    }

    pub fn decoder(mut self, decoder: Arc<dyn QrDecoder>) -> Self {
        self.config.decoder = Some(decoder);
        self
    }

    pub fn preprocessor(mut self, preprocessor: Arc<dyn Preprocessor>) -> Self {
        self.config.preprocessor = Some(preprocessor);
        self
    }

    pub fn progress_callback(mut self, cb: Arc<dyn ScanProgressCallback>) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ScanConfig, PdfQrError> {
        self.config.preprocess.validate()?;
        Ok(self.config)
    }
}

// ── Preprocessing constants ──────────────────────────────────────────────

/// Constants for the photometric-enhancement and denoise+threshold transforms.
///
/// The defaults are the values the fallback chain was tuned with; changing
/// them is mainly useful for experiments on unusual scans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessParams {
    /// Contrast multiplier for the enhancement transform. Default: 2.0.
    pub contrast_factor: f32,
    /// Sharpness multiplier for the enhancement transform. Default: 2.0.
    pub sharpness_factor: f32,
    /// Luminance at or above which a pixel becomes white. Default: 128.
    pub binarize_threshold: u8,
    /// Upscale factor applied on both axes before thresholding. Default: 1.5.
    pub upscale_factor: f32,
    /// Gaussian denoise kernel size (odd). Default: 5.
    pub blur_kernel: u32,
    /// Adaptive-threshold neighbourhood size (odd). Default: 11.
    pub adaptive_block_size: u32,
    /// Constant subtracted from the local mean. Default: 2.
    pub adaptive_offset: i32,
}

impl Default for PreprocessParams {
    fn default() -> Self {
        Self {
            contrast_factor: 2.0,
            sharpness_factor: 2.0,
            binarize_threshold: 128,
            upscale_factor: 1.5,
            blur_kernel: 5,
            adaptive_block_size: 11,
            adaptive_offset: 2,
        }
    }
}

impl PreprocessParams {
    /// Reject parameter sets the transforms cannot honour.
    pub fn validate(&self) -> Result<(), PdfQrError> {
        if !(self.contrast_factor > 0.0) || !(self.sharpness_factor > 0.0) {
            return Err(PdfQrError::InvalidConfig(format!(
                "Enhancement factors must be > 0, got contrast={} sharpness={}",
                self.contrast_factor, self.sharpness_factor
            )));
        }
        if !(self.upscale_factor > 0.0) {
            return Err(PdfQrError::InvalidConfig(format!(
                "Upscale factor must be > 0, got {}",
                self.upscale_factor
            )));
        }
        for (name, size) in [
            ("Blur kernel", self.blur_kernel),
            ("Adaptive block size", self.adaptive_block_size),
        ] {
            if size < 3 || size % 2 == 0 {
                return Err(PdfQrError::InvalidConfig(format!(
                    "{name} must be odd and ≥ 3, got {size}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_tuned_constants() {
        let p = PreprocessParams::default();
        assert_eq!(p.contrast_factor, 2.0);
        assert_eq!(p.sharpness_factor, 2.0);
        assert_eq!(p.binarize_threshold, 128);
        assert_eq!(p.upscale_factor, 1.5);
        assert_eq!(p.blur_kernel, 5);
        assert_eq!(p.adaptive_block_size, 11);
        assert_eq!(p.adaptive_offset, 2);
    }

    #[test]
    fn default_config_is_sequential() {
        let config = ScanConfig::default();
        assert_eq!(config.concurrency, 1);
        assert!(config.password.is_none());
    }

    #[test]
    fn builder_clamps_concurrency() {
        let config = ScanConfig::builder().concurrency(0).build().unwrap();
        assert_eq!(config.concurrency, 1);
    }

    #[test]
    fn builder_rejects_even_block_size() {
        let params = PreprocessParams {
            adaptive_block_size: 10,
            ..Default::default()
        };
        let err = ScanConfig::builder().preprocess(params).build().unwrap_err();
        assert!(err.to_string().contains("Adaptive block size"), "got: {err}");
    }

    #[test]
    fn builder_rejects_tiny_kernel() {
        let params = PreprocessParams {
            blur_kernel: 1,
            ..Default::default()
        };
        assert!(ScanConfig::builder().preprocess(params).build().is_err());
    }

    #[test]
    fn builder_rejects_non_positive_upscale() {
        let params = PreprocessParams {
            upscale_factor: 0.0,
            ..Default::default()
        };
        assert!(ScanConfig::builder().preprocess(params).build().is_err());
    }

    #[test]
    fn debug_redacts_password() {
        let config = ScanConfig::builder().password("hunter2").build().unwrap();
        let dbg = format!("{config:?}");
        assert!(!dbg.contains("hunter2"));
        assert!(dbg.contains("<redacted>"));
    }
}
