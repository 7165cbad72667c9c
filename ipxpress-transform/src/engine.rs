//! Image engine collaborator traits.

use bytes::Bytes;
use ipxpress_core::{Color, Edges, Format, Kernel, Modulate, Region, Sharpen, TransformError};

/// Decodes raw bytes into a manipulable [`ImageHandle`].
///
/// Implementations must be thread-safe (Send + Sync); decoding runs on
/// blocking worker threads.
pub trait TransformEngine: Send + Sync {
    /// Decode `source` into an in-memory image.
    fn decode(&self, source: &[u8]) -> Result<Box<dyn ImageHandle>, TransformError>;
}

/// A decoded image under transformation.
///
/// Every operation mutates the handle in place. The handle owns its pixel
/// buffer; dropping it releases everything.
pub trait ImageHandle: Send {
    fn dimensions(&self) -> (u32, u32);

    fn has_alpha(&self) -> bool;

    /// Keep only `region`.
    fn extract(&mut self, region: Region) -> Result<(), TransformError>;

    /// Remove a uniform border whose colour differs from the top-left pixel by at most `threshold`.
    fn trim(&mut self, threshold: u8) -> Result<(), TransformError>;

    /// Scale to exactly `width` x `height`.
    fn resize(&mut self, width: u32, height: u32, kernel: Kernel) -> Result<(), TransformError>;

    /// Add a border filled with `background`.
    fn extend(&mut self, edges: Edges, background: Color) -> Result<(), TransformError>;

    /// Rotate clockwise by a multiple of 90 degrees.
    fn rotate(&mut self, degrees: u16) -> Result<(), TransformError>;

    /// Mirror vertically.
    fn flip(&mut self) -> Result<(), TransformError>;

    /// Mirror horizontally.
    fn flop(&mut self) -> Result<(), TransformError>;

    fn blur(&mut self, sigma: f32) -> Result<(), TransformError>;

    fn median(&mut self, radius: u32) -> Result<(), TransformError>;

    fn sharpen(&mut self, params: Sharpen) -> Result<(), TransformError>;

    fn grayscale(&mut self) -> Result<(), TransformError>;

    fn negate(&mut self) -> Result<(), TransformError>;

    /// Stretch contrast to the full channel range.
    fn normalize(&mut self) -> Result<(), TransformError>;

    fn gamma(&mut self, gamma: f32) -> Result<(), TransformError>;

    /// Per-channel `value * multiplier + offset`.
    fn linear(&mut self, multiplier: f32, offset: f32) -> Result<(), TransformError>;

    fn modulate(&mut self, params: Modulate) -> Result<(), TransformError>;

    fn tint(&mut self, color: Color) -> Result<(), TransformError>;

    /// Binarise: luma at or above `threshold` becomes white, the rest black.
    fn threshold(&mut self, threshold: u8) -> Result<(), TransformError>;

    /// Composite onto `background`, dropping alpha.
    fn flatten(&mut self, background: Color) -> Result<(), TransformError>;

    /// Encode to `format`. `quality` applies to lossy formats.
    fn encode(&self, format: Format, quality: u8) -> Result<Bytes, TransformError>;
}
