//! ipxpress Test Utilities
//!
//! Shared test infrastructure for the ipxpress workspace:
//! - A counting stub fetcher
//! - A recording image engine that logs every operation
//! - Generated PNG/JPEG sources
//! - Proptest generators for processing specs

pub use ipxpress_core::{
    CacheEntry, CacheKey, FetchError, Format, ProcessingSpec, TransformError,
};
pub use ipxpress_fetch::{FetchedImage, Fetcher};
pub use ipxpress_transform::{ImageHandle, TransformEngine};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use ipxpress_core::{Color, Edges, Kernel, Modulate, Region, Sharpen};
use parking_lot::Mutex;

// ============================================================================
// STUB FETCHER
// ============================================================================

/// Fetcher answering from a fixed URL table and counting calls.
///
/// Unknown URLs answer with `OriginStatus { status: 404 }`.
#[derive(Debug, Clone, Default)]
pub struct CountingFetcher {
    responses: Arc<Mutex<HashMap<String, Result<Bytes, FetchError>>>>,
    calls: Arc<Mutex<HashMap<String, usize>>>,
    delay: Option<Duration>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    pub fn with_image(self, url: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.responses.lock().insert(url.into(), Ok(body.into()));
        self
    }

    /// Fail `url` with `error`.
    pub fn with_error(self, url: impl Into<String>, error: FetchError) -> Self {
        self.responses.lock().insert(url.into(), Err(error));
        self
    }

    /// Sleep this long before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self, url: &str) -> usize {
        self.calls.lock().get(url).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedImage, FetchError> {
        *self.calls.lock().entry(url.to_string()).or_insert(0) += 1;
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let answer = self.responses.lock().get(url).cloned();
        match answer {
            Some(Ok(bytes)) => Ok(FetchedImage::new(bytes)),
            Some(Err(err)) => Err(err),
            None => Err(FetchError::OriginStatus { status: 404 }),
        }
    }
}

// ============================================================================
// RECORDING ENGINE
// ============================================================================

/// Shared log written by [`RecordingHandle`]s.
#[derive(Debug, Clone, Default)]
pub struct OperationLog {
    ops: Arc<Mutex<Vec<String>>>,
    decodes: Arc<AtomicUsize>,
    drops: Arc<AtomicUsize>,
}

impl OperationLog {
    pub fn operations(&self) -> Vec<String> {
        self.ops.lock().clone()
    }

    pub fn decodes(&self) -> usize {
        self.decodes.load(Ordering::SeqCst)
    }

    /// Handles released so far.
    pub fn drops(&self) -> usize {
        self.drops.load(Ordering::SeqCst)
    }

    fn push(&self, op: impl Into<String>) {
        self.ops.lock().push(op.into());
    }
}

/// Engine whose handles record each operation by name instead of touching pixels.
///
/// Decoding never inspects the bytes; every handle starts at the configured size.
#[derive(Debug, Clone)]
pub struct RecordingEngine {
    log: OperationLog,
    size: (u32, u32),
    fail_decode: bool,
    fail_on: Option<&'static str>,
}

impl RecordingEngine {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            log: OperationLog::default(),
            size: (width, height),
            fail_decode: false,
            fail_on: None,
        }
    }

    pub fn failing_decode(mut self) -> Self {
        self.fail_decode = true;
        self
    }

    /// Make the named operation fail.
    pub fn failing_on(mut self, op: &'static str) -> Self {
        self.fail_on = Some(op);
        self
    }

    pub fn log(&self) -> OperationLog {
        self.log.clone()
    }
}

impl TransformEngine for RecordingEngine {
    fn decode(&self, _source: &[u8]) -> Result<Box<dyn ImageHandle>, TransformError> {
        self.log.decodes.fetch_add(1, Ordering::SeqCst);
        if self.fail_decode {
            return Err(TransformError::Decode {
                reason: "unsupported image format".to_string(),
            });
        }
        Ok(Box::new(RecordingHandle {
            log: self.log.clone(),
            size: self.size,
            alpha: true,
            fail_on: self.fail_on,
        }))
    }
}

/// Handle produced by [`RecordingEngine`].
#[derive(Debug)]
pub struct RecordingHandle {
    log: OperationLog,
    size: (u32, u32),
    alpha: bool,
    fail_on: Option<&'static str>,
}

impl RecordingHandle {
    fn record(&mut self, op: &str) -> Result<(), TransformError> {
        self.log.push(op);
        if self.fail_on == Some(op) {
            return Err(TransformError::operation(op, "injected failure"));
        }
        Ok(())
    }
}

impl Drop for RecordingHandle {
    fn drop(&mut self) {
        self.log.drops.fetch_add(1, Ordering::SeqCst);
    }
}

impl ImageHandle for RecordingHandle {
    fn dimensions(&self) -> (u32, u32) {
        self.size
    }

    fn has_alpha(&self) -> bool {
        self.alpha
    }

    fn extract(&mut self, region: Region) -> Result<(), TransformError> {
        self.record("extract")?;
        self.size = (region.width, region.height);
        Ok(())
    }

    fn trim(&mut self, _threshold: u8) -> Result<(), TransformError> {
        self.record("trim")
    }

    fn resize(&mut self, width: u32, height: u32, _kernel: Kernel) -> Result<(), TransformError> {
        self.record("resize")?;
        self.size = (width, height);
        Ok(())
    }

    fn extend(&mut self, edges: Edges, _background: Color) -> Result<(), TransformError> {
        self.record("extend")?;
        self.size = (
            self.size.0 + edges.left + edges.right,
            self.size.1 + edges.top + edges.bottom,
        );
        Ok(())
    }

    fn rotate(&mut self, degrees: u16) -> Result<(), TransformError> {
        self.record("rotate")?;
        if degrees % 180 == 90 {
            self.size = (self.size.1, self.size.0);
        }
        Ok(())
    }

    fn flip(&mut self) -> Result<(), TransformError> {
        self.record("flip")
    }

    fn flop(&mut self) -> Result<(), TransformError> {
        self.record("flop")
    }

    fn blur(&mut self, _sigma: f32) -> Result<(), TransformError> {
        self.record("blur")
    }

    fn median(&mut self, _radius: u32) -> Result<(), TransformError> {
        self.record("median")
    }

    fn sharpen(&mut self, _params: Sharpen) -> Result<(), TransformError> {
        self.record("sharpen")
    }

    fn grayscale(&mut self) -> Result<(), TransformError> {
        self.record("grayscale")
    }

    fn negate(&mut self) -> Result<(), TransformError> {
        self.record("negate")
    }

    fn normalize(&mut self) -> Result<(), TransformError> {
        self.record("normalize")
    }

    fn gamma(&mut self, _gamma: f32) -> Result<(), TransformError> {
        self.record("gamma")
    }

    fn linear(&mut self, _multiplier: f32, _offset: f32) -> Result<(), TransformError> {
        self.record("linear")
    }

    fn modulate(&mut self, _params: Modulate) -> Result<(), TransformError> {
        self.record("modulate")
    }

    fn tint(&mut self, _color: Color) -> Result<(), TransformError> {
        self.record("tint")
    }

    fn threshold(&mut self, _threshold: u8) -> Result<(), TransformError> {
        self.record("threshold")
    }

    fn flatten(&mut self, _background: Color) -> Result<(), TransformError> {
        self.record("flatten")?;
        self.alpha = false;
        Ok(())
    }

    fn encode(&self, format: Format, quality: u8) -> Result<Bytes, TransformError> {
        self.log.push("encode");
        if self.fail_on == Some("encode") {
            return Err(TransformError::Encode {
                format: format.to_string(),
                reason: "injected failure".to_string(),
            });
        }
        Ok(Bytes::from(format!(
            "{}:{}x{}:q{}",
            format, self.size.0, self.size.1, quality
        )))
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for request-model types.

    use super::*;
    use proptest::prelude::*;

    pub fn arb_format() -> impl Strategy<Value = Format> {
        proptest::sample::select(Format::ALL.to_vec())
    }

    pub fn arb_url() -> impl Strategy<Value = String> {
        "https://[a-z]{1,10}\\.test/[a-z0-9/]{1,20}\\.(png|jpg|webp)"
    }

    /// Specs with arbitrary geometry, format, quality and a few effects.
    pub fn arb_processing_spec() -> impl Strategy<Value = ProcessingSpec> {
        (
            arb_url(),
            proptest::option::of(1u32..5000),
            proptest::option::of(1u32..5000),
            1u8..=100,
            proptest::option::of(arb_format()),
            prop_oneof![Just(0u16), Just(90), Just(180), Just(270)],
            any::<(bool, bool, bool)>(),
            proptest::option::of(0.1f32..10.0),
        )
            .prop_map(
                |(url, width, height, quality, format, rotate, (flip, flop, grayscale), blur)| {
                    let mut spec = ProcessingSpec::new(url)
                        .with_size(width, height)
                        .with_quality(quality);
                    spec.format = format;
                    spec.rotate = rotate;
                    spec.flip = flip;
                    spec.flop = flop;
                    spec.grayscale = grayscale;
                    spec.blur = blur;
                    spec
                },
            )
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Generated source images.

    use super::*;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use std::io::Cursor;

    fn gradient(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_fn(width, height, |x, y| {
            Rgba([
                (x * 255 / width.max(1)) as u8,
                (y * 255 / height.max(1)) as u8,
                96,
                255,
            ])
        }))
    }

    fn encode(img: DynamicImage, format: ImageFormat) -> Bytes {
        let mut buffer = Vec::new();
        img.write_to(&mut Cursor::new(&mut buffer), format)
            .expect("encode fixture");
        Bytes::from(buffer)
    }

    /// A `width` x `height` gradient PNG.
    pub fn png(width: u32, height: u32) -> Bytes {
        encode(gradient(width, height), ImageFormat::Png)
    }

    /// A `width` x `height` gradient JPEG.
    pub fn jpeg(width: u32, height: u32) -> Bytes {
        encode(
            DynamicImage::ImageRgb8(gradient(width, height).to_rgb8()),
            ImageFormat::Jpeg,
        )
    }

    /// Bytes that sniff as PNG but do not decode.
    pub fn corrupt_png() -> Bytes {
        let mut data = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        data.extend_from_slice(b"this is not a real chunk stream");
        Bytes::from(data)
    }

    /// Decoded dimensions of an encoded image.
    pub fn dimensions_of(bytes: &[u8]) -> (u32, u32) {
        let img = image::load_from_memory(bytes).expect("decode fixture");
        (img.width(), img.height())
    }

    /// A pass-through spec for `url`.
    pub fn spec(url: &str) -> ProcessingSpec {
        ProcessingSpec::new(url)
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions on cache entries.

    use super::*;

    /// Assert that an entry is a success with the given content type.
    #[track_caller]
    pub fn assert_success(entry: &CacheEntry, content_type: &str) {
        assert!(!entry.is_error(), "Expected success, got error: {:?}", entry.error);
        assert_eq!(entry.status_code, 200);
        assert_eq!(entry.content_type, content_type);
    }

    /// Assert that an entry is a cached failure with the given status.
    #[track_caller]
    pub fn assert_failure(entry: &CacheEntry, status_code: u16) {
        assert!(entry.is_error(), "Expected error entry, got success");
        assert_eq!(entry.status_code, status_code);
        assert!(entry.payload.is_empty());
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[tokio::test]
    async fn test_counting_fetcher_counts_and_defaults_to_404() {
        let fetcher =
            CountingFetcher::new().with_image("https://a.test/x.png", fixtures::png(4, 4));
        assert!(fetcher.fetch("https://a.test/x.png").await.is_ok());
        assert_eq!(
            fetcher.fetch("https://a.test/missing.png").await.unwrap_err(),
            FetchError::OriginStatus { status: 404 }
        );
        assert_eq!(fetcher.calls("https://a.test/x.png"), 1);
        assert_eq!(fetcher.total_calls(), 2);
    }

    #[test]
    fn test_fixtures_decode_to_requested_size() {
        assert_eq!(fixtures::dimensions_of(&fixtures::png(30, 20)), (30, 20));
        assert_eq!(fixtures::dimensions_of(&fixtures::jpeg(16, 8)), (16, 8));
        assert_eq!(Format::detect(&fixtures::png(2, 2)), Some(Format::Png));
        assert_eq!(Format::detect(&fixtures::jpeg(2, 2)), Some(Format::Jpeg));
    }

    #[test]
    fn test_recording_handle_counts_drops() {
        let engine = RecordingEngine::new(100, 50);
        let log = engine.log();
        {
            let mut handle = engine.decode(b"ignored").unwrap();
            handle.rotate(90).unwrap();
            assert_eq!(handle.dimensions(), (50, 100));
        }
        assert_eq!(log.decodes(), 1);
        assert_eq!(log.drops(), 1);
        assert_eq!(log.operations(), vec!["rotate".to_string()]);
    }

    proptest! {
        #[test]
        fn prop_generated_specs_have_valid_quality(spec in generators::arb_processing_spec()) {
            prop_assert!((1..=100).contains(&spec.quality));
            prop_assert!(spec.width.map_or(true, |w| w > 0));
        }
    }
}
