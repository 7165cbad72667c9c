//! ipxpress transform - ordered image pipeline
//!
//! The image engine is a collaborator behind two traits:
//! [`TransformEngine`] decodes bytes into an [`ImageHandle`], and the handle
//! exposes the named operations plus `encode`. [`TransformPipeline`] drives a
//! handle through the built-in steps in fixed order, then any registered
//! custom steps. [`RasterEngine`] is the bundled engine.

mod config;
mod custom;
mod engine;
mod geometry;
mod pipeline;
mod raster;
mod steps;

pub use config::{TransformConfig, DEFAULT_MAX_OUTPUT_PIXELS};
pub use custom::{BrightnessStep, ContrastStep, FnStep, SaturationStep, SepiaStep};
pub use engine::{ImageHandle, TransformEngine};
pub use geometry::{plan_resize, ResizePlan};
pub use pipeline::{TransformOutput, TransformPipeline};
pub use raster::{RasterEngine, RasterImage};
pub use steps::TransformStep;

/// Names of the built-in steps, in execution order.
pub const BUILTIN_STEPS: [&str; 9] = [
    "extract", "resize", "extend", "rotate", "flip", "blur", "sharpen", "color", "flatten",
];
