//! Ordered transform pipeline.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use ipxpress_core::{Format, ProcessingSpec, TransformError, PASSTHROUGH_CONTENT_TYPE};
use tracing::debug;

use crate::config::TransformConfig;
use crate::engine::TransformEngine;
use crate::steps::{builtin_steps, TransformStep};

/// Encoded result of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformOutput {
    pub content_type: String,
    pub payload: Bytes,
    /// Output format, `None` when the source was passed through verbatim.
    pub format: Option<Format>,
}

impl TransformOutput {
    fn passthrough(payload: Bytes) -> Self {
        Self {
            content_type: PASSTHROUGH_CONTENT_TYPE.to_string(),
            payload,
            format: None,
        }
    }

    pub fn is_passthrough(&self) -> bool {
        self.format.is_none()
    }
}

/// Built-in steps in fixed order, followed by registered custom steps in
/// registration order.
pub struct TransformPipeline {
    engine: Arc<dyn TransformEngine>,
    builtin: Vec<Box<dyn TransformStep>>,
    custom: Vec<Box<dyn TransformStep>>,
}

impl TransformPipeline {
    pub fn new(engine: Arc<dyn TransformEngine>) -> Self {
        Self::with_config(engine, &TransformConfig::default())
    }

    pub fn with_config(engine: Arc<dyn TransformEngine>, config: &TransformConfig) -> Self {
        Self {
            engine,
            builtin: builtin_steps(config),
            custom: Vec::new(),
        }
    }

    /// Register a custom step. It runs after every built-in and every
    /// previously registered step.
    pub fn register(&mut self, step: Box<dyn TransformStep>) {
        self.custom.push(step);
    }

    pub fn with_step(mut self, step: impl TransformStep + 'static) -> Self {
        self.register(Box::new(step));
        self
    }

    /// Names of every step, in execution order.
    pub fn step_names(&self) -> Vec<&str> {
        self.builtin
            .iter()
            .chain(self.custom.iter())
            .map(|s| s.name())
            .collect()
    }

    /// Transform `source` according to `spec`.
    ///
    /// When `spec` requests nothing against an `original`-format source the
    /// bytes are returned untouched and no decoding happens. Custom steps only
    /// run when the request itself calls for processing.
    ///
    /// # Errors
    /// The failing stage's error, wrapped with the stage name (`decode`, a step
    /// name, or `encode`).
    pub fn run(
        &self,
        source: Bytes,
        original: Option<Format>,
        spec: &ProcessingSpec,
    ) -> Result<TransformOutput, TransformError> {
        if !spec.needs_processing(original) {
            return Ok(TransformOutput::passthrough(source));
        }

        let started = Instant::now();
        let mut image = self
            .engine
            .decode(&source)
            .map_err(|e| e.in_step("decode"))?;

        for step in self.builtin.iter().chain(self.custom.iter()) {
            step.apply(image.as_mut(), spec)
                .map_err(|e| e.in_step(step.name()))?;
        }

        let format = spec.resolved_output_format(original);
        let payload = image
            .encode(format, spec.quality)
            .map_err(|e| e.in_step("encode"))?;
        let (width, height) = image.dimensions();

        debug!(
            format = %format,
            width,
            height,
            size = payload.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "transformed image"
        );

        Ok(TransformOutput {
            content_type: format.content_type().to_string(),
            payload,
            format: Some(format),
        })
    }
}

impl std::fmt::Debug for TransformPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformPipeline")
            .field("steps", &self.step_names())
            .finish()
    }
}
