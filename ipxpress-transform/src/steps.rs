//! Built-in pipeline steps, in the order they run.

use ipxpress_core::{Color, Edges, Kernel, ProcessingSpec, TransformError};

use crate::config::TransformConfig;
use crate::engine::ImageHandle;
use crate::geometry::plan_resize;

/// One stage of the transform pipeline.
///
/// A step receives the in-progress handle and the processing request. Returning an error
/// aborts every later step.
pub trait TransformStep: Send + Sync {
    /// Identity used in error messages and logs.
    fn name(&self) -> &str;

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError>;
}

/// Default fill for `extend` and `contain` padding.
const PAD_BACKGROUND: Color = Color::BLACK;

/// Default backdrop for `flatten`.
const FLATTEN_BACKGROUND: Color = Color::WHITE;

/// Refuse a canvas larger than `max_pixels` before anything is allocated.
fn ensure_canvas(
    operation: &str,
    width: u64,
    height: u64,
    max_pixels: u64,
) -> Result<(), TransformError> {
    if width.saturating_mul(height) > max_pixels {
        return Err(TransformError::operation(
            operation,
            format!("output {}x{} exceeds the {} pixel limit", width, height, max_pixels),
        ));
    }
    Ok(())
}

fn extended_size((width, height): (u32, u32), edges: Edges) -> (u64, u64) {
    (
        width as u64 + edges.left as u64 + edges.right as u64,
        height as u64 + edges.top as u64 + edges.bottom as u64,
    )
}

pub(crate) struct ExtractStep;

impl TransformStep for ExtractStep {
    fn name(&self) -> &str {
        "extract"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if let Some(region) = spec.extract {
            image.extract(region)?;
        }
        if let Some(threshold) = spec.trim {
            image.trim(threshold)?;
        }
        Ok(())
    }
}

pub(crate) struct ResizeStep {
    max_pixels: u64,
}

impl TransformStep for ResizeStep {
    fn name(&self) -> &str {
        "resize"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        let Some(plan) = plan_resize(image.dimensions(), spec) else {
            return Ok(());
        };

        if image.dimensions() != (plan.width, plan.height) {
            ensure_canvas("resize", plan.width as u64, plan.height as u64, self.max_pixels)?;
            image.resize(plan.width, plan.height, spec.kernel.unwrap_or(Kernel::Lanczos3))?;
        }
        if let Some(crop) = plan.crop {
            image.extract(crop)?;
        }
        if let Some(pad) = plan.pad {
            let (width, height) = extended_size(image.dimensions(), pad);
            ensure_canvas("resize", width, height, self.max_pixels)?;
            image.extend(pad, spec.background_or(PAD_BACKGROUND))?;
        }
        Ok(())
    }
}

pub(crate) struct ExtendStep {
    max_pixels: u64,
}

impl TransformStep for ExtendStep {
    fn name(&self) -> &str {
        "extend"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        let Some(edges) = spec.extend else {
            return Ok(());
        };
        let (width, height) = extended_size(image.dimensions(), edges);
        ensure_canvas("extend", width, height, self.max_pixels)?;
        image.extend(edges, spec.background_or(PAD_BACKGROUND))
    }
}

pub(crate) struct RotateStep;

impl TransformStep for RotateStep {
    fn name(&self) -> &str {
        "rotate"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if spec.rotate == 0 {
            return Ok(());
        }
        image.rotate(spec.rotate)
    }
}

pub(crate) struct FlipStep;

impl TransformStep for FlipStep {
    fn name(&self) -> &str {
        "flip"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if spec.flip {
            image.flip()?;
        }
        if spec.flop {
            image.flop()?;
        }
        Ok(())
    }
}

pub(crate) struct BlurStep;

impl TransformStep for BlurStep {
    fn name(&self) -> &str {
        "blur"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if let Some(sigma) = spec.blur {
            image.blur(sigma)?;
        }
        if let Some(radius) = spec.median {
            image.median(radius)?;
        }
        Ok(())
    }
}

pub(crate) struct SharpenStep;

impl TransformStep for SharpenStep {
    fn name(&self) -> &str {
        "sharpen"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        match spec.sharpen {
            Some(params) => image.sharpen(params),
            None => Ok(()),
        }
    }
}

pub(crate) struct ColorStep;

impl TransformStep for ColorStep {
    fn name(&self) -> &str {
        "color"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if spec.grayscale {
            image.grayscale()?;
        }
        if spec.negate {
            image.negate()?;
        }
        if spec.normalize {
            image.normalize()?;
        }
        if let Some(gamma) = spec.gamma {
            image.gamma(gamma)?;
        }
        if let Some(params) = spec.modulate {
            image.modulate(params)?;
        }
        if let Some(color) = spec.tint {
            image.tint(color)?;
        }
        if let Some(threshold) = spec.threshold {
            image.threshold(threshold)?;
        }
        Ok(())
    }
}

/// Runs last so colour operations see the original alpha.
pub(crate) struct FlattenStep;

impl TransformStep for FlattenStep {
    fn name(&self) -> &str {
        "flatten"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if spec.flatten {
            image.flatten(spec.background_or(FLATTEN_BACKGROUND))?;
        }
        Ok(())
    }
}

pub(crate) fn builtin_steps(config: &TransformConfig) -> Vec<Box<dyn TransformStep>> {
    let max_pixels = config.max_output_pixels;
    vec![
        Box::new(ExtractStep),
        Box::new(ResizeStep { max_pixels }),
        Box::new(ExtendStep { max_pixels }),
        Box::new(RotateStep),
        Box::new(FlipStep),
        Box::new(BlurStep),
        Box::new(SharpenStep),
        Box::new(ColorStep),
        Box::new(FlattenStep),
    ]
}
