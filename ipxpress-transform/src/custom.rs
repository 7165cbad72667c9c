//! Ready-made custom steps and a closure adapter.

use ipxpress_core::{Modulate, ProcessingSpec, TransformError};

use crate::engine::ImageHandle;
use crate::steps::TransformStep;

type StepFn =
    dyn Fn(&mut dyn ImageHandle, &ProcessingSpec) -> Result<(), TransformError> + Send + Sync;

/// Wrap a closure as a named step.
pub struct FnStep {
    name: String,
    op: Box<StepFn>,
}

impl FnStep {
    pub fn new<F>(name: impl Into<String>, op: F) -> Self
    where
        F: Fn(&mut dyn ImageHandle, &ProcessingSpec) -> Result<(), TransformError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            op: Box::new(op),
        }
    }
}

impl TransformStep for FnStep {
    fn name(&self) -> &str {
        &self.name
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        (self.op)(image, spec)
    }
}

impl std::fmt::Debug for FnStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnStep").field("name", &self.name).finish()
    }
}

/// Desaturate, then warm the hue.
#[derive(Debug, Clone, Copy, Default)]
pub struct SepiaStep;

impl TransformStep for SepiaStep {
    fn name(&self) -> &str {
        "sepia"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        _spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        image.modulate(Modulate {
            brightness: 1.0,
            saturation: 0.0,
            hue: 0.0,
        })?;
        image.tint(ipxpress_core::Color::rgb(112, 66, 20))
    }
}

/// Multiply brightness.
#[derive(Debug, Clone, Copy)]
pub struct BrightnessStep(pub f32);

impl TransformStep for BrightnessStep {
    fn name(&self) -> &str {
        "brightness"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        _spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        image.modulate(Modulate {
            brightness: self.0,
            saturation: 1.0,
            hue: 0.0,
        })
    }
}

/// Multiply saturation.
#[derive(Debug, Clone, Copy)]
pub struct SaturationStep(pub f32);

impl TransformStep for SaturationStep {
    fn name(&self) -> &str {
        "saturation"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        _spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        image.modulate(Modulate {
            brightness: 1.0,
            saturation: self.0,
            hue: 0.0,
        })
    }
}

/// Scale contrast around mid-grey. Values above 1 increase contrast.
#[derive(Debug, Clone, Copy)]
pub struct ContrastStep(pub f32);

impl TransformStep for ContrastStep {
    fn name(&self) -> &str {
        "contrast"
    }

    fn apply(
        &self,
        image: &mut dyn ImageHandle,
        _spec: &ProcessingSpec,
    ) -> Result<(), TransformError> {
        if !self.0.is_finite() || self.0 < 0.0 {
            return Err(TransformError::operation(
                "contrast",
                format!("invalid contrast factor {}", self.0),
            ));
        }
        image.linear(self.0, 128.0 * (1.0 - self.0))
    }
}
