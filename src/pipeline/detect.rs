//! Detection orchestrator: the short-circuiting fallback chain.
//!
//! ```text
//! raw image ──decode──▶ found? ─yes─▶ Detection(raw)
//!                          │no
//!                   enhance ──decode──▶ found? ─yes─▶ Detection(enhanced)
//!                          │no
//!          denoise_threshold ──decode──▶ found? ─yes─▶ Detection(thresholded)
//!                          │no
//!                        None
//! ```
//!
//! The cheapest attempt runs first and a transform is only computed when every
//! earlier attempt came back empty. Each attempt is isolated: a decoder error
//! or panic is logged, reported as a [`Stage::Detect`] diagnostic and treated
//! as "no payloads", and the chain moves on to the next strategy.

use crate::error::StageError;
use crate::pipeline::decode::{DecodeError, QrDecoder};
use crate::pipeline::preprocess::Preprocessor;
use crate::progress::{emit, Diagnostic, DiagnosticLevel, ProgressCallback, Stage};
use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use tracing::debug;

/// Which rendering of the image a decode attempt ran on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// The image as extracted.
    Raw,
    /// Photometric enhancement.
    Enhanced,
    /// Denoise + adaptive threshold.
    Thresholded,
}

impl Strategy {
    /// Attempt order of the fallback chain.
    pub const CHAIN: [Strategy; 3] = [Strategy::Raw, Strategy::Enhanced, Strategy::Thresholded];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Raw => "raw",
            Strategy::Enhanced => "enhanced",
            Strategy::Thresholded => "thresholded",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of the first successful decode attempt on one image.
#[derive(Debug, Clone)]
pub struct Detection<'a> {
    /// Strategy that produced the payloads.
    pub strategy: Strategy,
    /// Payloads in the decoder's discovery order; never empty.
    pub payloads: Vec<String>,
    /// The rendering the payloads were decoded from (what gets persisted).
    pub image: Cow<'a, DynamicImage>,
}

/// Where an image came from, for diagnostics.
#[derive(Debug, Clone, Copy)]
pub struct ImageContext<'a> {
    pub pdf_name: &'a str,
    pub page: u32,
}

/// Drives the fallback chain over a decoder and a preprocessor.
pub struct Detector<'a> {
    decoder: &'a dyn QrDecoder,
    preprocessor: &'a dyn Preprocessor,
    callback: Option<&'a ProgressCallback>,
}

impl<'a> Detector<'a> {
    pub fn new(decoder: &'a dyn QrDecoder, preprocessor: &'a dyn Preprocessor) -> Self {
        Self {
            decoder,
            preprocessor,
            callback: None,
        }
    }

    /// Forward attempt failures to `callback` as well as the log.
    pub fn with_callback(mut self, callback: Option<&'a ProgressCallback>) -> Self {
        self.callback = callback;
        self
    }

    /// Run the chain on `image`; `None` when every strategy came back empty.
    pub fn detect<'i>(&self, image: &'i DynamicImage, ctx: ImageContext<'_>) -> Option<Detection<'i>> {
        for strategy in Strategy::CHAIN {
            let variant: Cow<'i, DynamicImage> = match strategy {
                Strategy::Raw => Cow::Borrowed(image),
                Strategy::Enhanced => Cow::Owned(self.preprocessor.enhance(image)),
                Strategy::Thresholded => Cow::Owned(self.preprocessor.denoise_threshold(image)),
            };

            let payloads = self.attempt(strategy, &variant, ctx);
            if !payloads.is_empty() {
                debug!(
                    "{} page {}: {} payload(s) via {} image",
                    ctx.pdf_name,
                    ctx.page,
                    payloads.len(),
                    strategy
                );
                return Some(Detection {
                    strategy,
                    payloads,
                    image: variant,
                });
            }
        }
        None
    }

    fn attempt(&self, strategy: Strategy, variant: &DynamicImage, ctx: ImageContext<'_>) -> Vec<String> {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.decoder.decode(variant))).unwrap_or_else(|payload| {
            Err(DecodeError(format!("decoder panicked: {}", panic_detail(&*payload))))
        });
        match outcome {
            Ok(found) => {
                debug!(
                    "{} page {}: {} attempt → {} payload(s)",
                    ctx.pdf_name,
                    ctx.page,
                    strategy,
                    found.len()
                );
                found.into_iter().map(|qr| qr.payload).collect()
            }
            Err(e) => {
                let err = StageError::DecodeFailed {
                    page: ctx.page,
                    strategy: strategy.to_string(),
                    detail: e.to_string(),
                };
                emit(
                    self.callback,
                    Diagnostic {
                        level: DiagnosticLevel::Warning,
                        stage: Stage::Detect,
                        pdf_name: ctx.pdf_name.to_string(),
                        page: Some(ctx.page),
                        message: err.to_string(),
                    },
                );
                Vec::new()
            }
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::decode::DecodedQr;
    use crate::pipeline::preprocess::StandardPreprocessor;
    use crate::progress::ScanProgressCallback;
    use image::{GenericImageView, Rgb, RgbImage};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    const CTX: ImageContext<'static> = ImageContext {
        pdf_name: "doc.pdf",
        page: 1,
    };

    /// Decodes by image shape: raw inputs are RGB, enhanced are greyscale at
    /// the original size, thresholded are greyscale and upscaled.
    struct ShapeDecoder {
        raw: Result<Vec<&'static str>, &'static str>,
        enhanced: Result<Vec<&'static str>, &'static str>,
        thresholded: Result<Vec<&'static str>, &'static str>,
        calls: Mutex<Vec<Strategy>>,
    }

    impl ShapeDecoder {
        fn new(
            raw: Result<Vec<&'static str>, &'static str>,
            enhanced: Result<Vec<&'static str>, &'static str>,
            thresholded: Result<Vec<&'static str>, &'static str>,
        ) -> Self {
            Self {
                raw,
                enhanced,
                thresholded,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl QrDecoder for ShapeDecoder {
        fn decode(&self, image: &DynamicImage) -> Result<Vec<DecodedQr>, DecodeError> {
            let strategy = match (image.as_rgb8().is_some(), image.width()) {
                (true, _) => Strategy::Raw,
                (false, 10) => Strategy::Enhanced,
                _ => Strategy::Thresholded,
            };
            self.calls.lock().unwrap().push(strategy);
            let outcome = match strategy {
                Strategy::Raw => &self.raw,
                Strategy::Enhanced => &self.enhanced,
                Strategy::Thresholded => &self.thresholded,
            };
            match outcome {
                Ok(p) => Ok(p.iter().map(|s| DecodedQr::from_payload(*s)).collect()),
                Err(e) => Err(DecodeError(e.to_string())),
            }
        }
    }

    #[derive(Default)]
    struct CountingPreprocessor {
        inner: StandardPreprocessor,
        enhance_calls: AtomicUsize,
        threshold_calls: AtomicUsize,
    }

    impl Preprocessor for CountingPreprocessor {
        fn enhance(&self, image: &DynamicImage) -> DynamicImage {
            self.enhance_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.enhance(image)
        }

        fn denoise_threshold(&self, image: &DynamicImage) -> DynamicImage {
            self.threshold_calls.fetch_add(1, Ordering::SeqCst);
            self.inner.denoise_threshold(image)
        }
    }

    /// Panics on the raw attempt and reads "LATE" from any greyscale rendering.
    struct PanicOnRaw;

    impl QrDecoder for PanicOnRaw {
        fn decode(&self, image: &DynamicImage) -> Result<Vec<DecodedQr>, DecodeError> {
            if image.as_rgb8().is_some() {
                panic!("grid walk out of bounds");
            }
            Ok(vec![DecodedQr::from_payload("LATE")])
        }
    }

    #[derive(Default)]
    struct Collect(Mutex<Vec<Diagnostic>>);

    impl ScanProgressCallback for Collect {
        fn on_diagnostic(&self, diagnostic: &Diagnostic) {
            self.0.lock().unwrap().push(diagnostic.clone());
        }
    }

    fn sample() -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(10, 10, Rgb([200, 200, 200])))
    }

    #[test]
    fn raw_success_never_preprocesses() {
        let decoder = ShapeDecoder::new(Ok(vec!["ABC"]), Ok(vec!["nope"]), Ok(vec!["nope"]));
        let pre = CountingPreprocessor::default();
        let image = sample();

        let detection = Detector::new(&decoder, &pre).detect(&image, CTX).unwrap();

        assert_eq!(detection.strategy, Strategy::Raw);
        assert_eq!(detection.payloads, vec!["ABC"]);
        assert!(matches!(detection.image, Cow::Borrowed(_)));
        assert_eq!(pre.enhance_calls.load(Ordering::SeqCst), 0);
        assert_eq!(pre.threshold_calls.load(Ordering::SeqCst), 0);
        assert_eq!(*decoder.calls.lock().unwrap(), vec![Strategy::Raw]);
    }

    #[test]
    fn enhanced_success_skips_threshold() {
        let decoder = ShapeDecoder::new(Ok(vec![]), Ok(vec!["E1", "E2"]), Ok(vec!["T"]));
        let pre = CountingPreprocessor::default();
        let image = sample();

        let detection = Detector::new(&decoder, &pre).detect(&image, CTX).unwrap();

        assert_eq!(detection.strategy, Strategy::Enhanced);
        assert_eq!(detection.payloads, vec!["E1", "E2"]);
        assert_eq!(pre.enhance_calls.load(Ordering::SeqCst), 1);
        assert_eq!(pre.threshold_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn threshold_only_success_returns_threshold_variant() {
        let decoder = ShapeDecoder::new(Ok(vec![]), Ok(vec![]), Ok(vec!["XYZ"]));
        let pre = CountingPreprocessor::default();
        let image = sample();

        let detection = Detector::new(&decoder, &pre).detect(&image, CTX).unwrap();

        assert_eq!(detection.strategy, Strategy::Thresholded);
        assert_eq!(detection.payloads, vec!["XYZ"]);
        // The persisted image is the upscaled, binarised rendering.
        assert_eq!(detection.image.dimensions(), (15, 15));
        assert!(detection.image.as_luma8().is_some());
        assert_eq!(
            *decoder.calls.lock().unwrap(),
            vec![Strategy::Raw, Strategy::Enhanced, Strategy::Thresholded]
        );
    }

    #[test]
    fn all_empty_yields_none() {
        let decoder = ShapeDecoder::new(Ok(vec![]), Ok(vec![]), Ok(vec![]));
        let pre = CountingPreprocessor::default();
        assert!(Detector::new(&decoder, &pre).detect(&sample(), CTX).is_none());
        assert_eq!(decoder.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn raw_decoder_error_does_not_abort_fallbacks() {
        let decoder = ShapeDecoder::new(Err("corrupt"), Ok(vec!["RECOVERED"]), Ok(vec![]));
        let pre = CountingPreprocessor::default();
        let sink = Arc::new(Collect::default());
        let callback: ProgressCallback = sink.clone();

        let image = sample();
        let detection = Detector::new(&decoder, &pre)
            .with_callback(Some(&callback))
            .detect(&image, CTX)
            .unwrap();

        assert_eq!(detection.strategy, Strategy::Enhanced);
        assert_eq!(detection.payloads, vec!["RECOVERED"]);
        let diags = sink.0.lock().unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].stage, Stage::Detect);
        assert_eq!(diags[0].level, DiagnosticLevel::Warning);
        assert_eq!(diags[0].pdf_name, "doc.pdf");
        assert_eq!(diags[0].page, Some(1));
        assert!(diags[0].message.contains("raw"));
        assert!(diags[0].message.contains("corrupt"));
    }

    #[test]
    fn decoder_panic_only_loses_that_attempt() {
        let pre = CountingPreprocessor::default();
        let sink = Arc::new(Collect::default());
        let callback: ProgressCallback = sink.clone();

        let image = sample();
        let detection = Detector::new(&PanicOnRaw, &pre)
            .with_callback(Some(&callback))
            .detect(&image, CTX)
            .unwrap();

        assert_eq!(detection.strategy, Strategy::Enhanced);
        assert_eq!(detection.payloads, vec!["LATE"]);
        let diags = sink.0.lock().unwrap();
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].stage, Stage::Detect);
        assert_eq!(diags[0].page, Some(1));
        assert!(diags[0].message.contains("grid walk out of bounds"));
    }

    #[test]
    fn every_attempt_failing_yields_none() {
        let decoder = ShapeDecoder::new(Err("a"), Err("b"), Err("c"));
        let pre = CountingPreprocessor::default();
        assert!(Detector::new(&decoder, &pre).detect(&sample(), CTX).is_none());
        assert_eq!(decoder.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn strategy_names() {
        let names: Vec<_> = Strategy::CHAIN.iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["raw", "enhanced", "thresholded"]);
    }
}
