//! U2-Net style segmentation through ONNX Runtime

use crate::{
    config::PipelineConfig,
    error::{BgRemovalError, Result},
    models::ModelSpec,
    session_cache::{self, SessionOptions},
    strategy::RemovalStrategy,
    types::{CutoutResult, SegmentationMask, SourceImage, StrategyCapability},
    utils::ImagePreprocessor,
};
use ort::value::Value;
use tracing::{info_span, instrument};

/// Salient-object model strategy
///
/// The session is loaded lazily on first use and shared process-wide per
/// model path.
#[derive(Debug, Clone)]
pub struct NeuralStrategy {
    model: ModelSpec,
    options: SessionOptions,
}

impl NeuralStrategy {
    #[must_use]
    pub fn new(model: ModelSpec, options: SessionOptions) -> Self {
        Self { model, options }
    }

    /// Strategy for the model configured in `config`, if a location resolves
    #[must_use]
    pub fn from_config(config: &PipelineConfig) -> Option<Self> {
        ModelSpec::from_config(config).map(|model| {
            Self::new(
                model,
                SessionOptions {
                    execution_provider: config.execution_provider,
                    intra_threads: config.intra_threads,
                },
            )
        })
    }

    #[must_use]
    pub fn model(&self) -> &ModelSpec {
        &self.model
    }

    /// Run the model and recover a source-sized mask
    ///
    /// # Errors
    /// - Model missing or unloadable
    /// - Inference or output extraction failure
    pub fn compute_mask(&self, source: &SourceImage) -> Result<SegmentationMask> {
        self.model.validate()?;

        let input = {
            let _span = info_span!("preprocess").entered();
            ImagePreprocessor::preprocess_for_inference(source.image(), &self.model.preprocessing)?
        };

        let session = session_cache::get_or_load(&self.model.path, self.options)?;
        let mut session = session
            .lock()
            .map_err(|_| BgRemovalError::internal("Session lock poisoned"))?;

        let _span = info_span!("inference", model = %self.model.display_name()).entered();
        let input_value = Value::from_array(input)
            .map_err(|e| BgRemovalError::removal(format!("Failed to convert input tensor: {e}")))?;
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::removal(format!("ONNX inference failed: {e}")))?;

        let first_key = outputs
            .keys()
            .next()
            .ok_or_else(|| BgRemovalError::removal("No output tensors found"))?
            .to_string();
        let output = outputs
            .get(first_key.as_str())
            .ok_or_else(|| BgRemovalError::removal("First output tensor not found"))?
            .try_extract_array::<f32>()
            .map_err(|e| BgRemovalError::removal(format!("Failed to extract output tensor: {e}")))?;

        ImagePreprocessor::output_to_mask(&output, source.width(), source.height())
    }
}

impl RemovalStrategy for NeuralStrategy {
    fn capability(&self) -> StrategyCapability {
        StrategyCapability::Neural
    }

    fn is_available(&self) -> bool {
        self.model.validate().is_ok()
    }

    #[instrument(skip(self, source), fields(width = source.width(), height = source.height()))]
    fn remove(&self, source: &SourceImage) -> Result<CutoutResult> {
        let mask = self.compute_mask(source).map_err(|e| match e {
            BgRemovalError::Removal(_) => e,
            other => BgRemovalError::strategy_error(self.name(), &other.to_string()),
        })?;
        CutoutResult::from_mask(source.image(), mask, self.capability())
    }
}
