//! Strategy selection and the fallback chain
//!
//! `BackgroundRemover` owns an ordered list of strategies, best first. Each
//! invocation decodes the input once, then tries every tier in order until
//! one succeeds.

use crate::{
    capabilities,
    config::PipelineConfig,
    error::{BgRemovalError, Result},
    services::{BackgroundCompositor, ImageIOService, ImageOptimizer, OptimizedImage},
    spans,
    strategies::CornerHeuristicStrategy,
    strategy::RemovalStrategy,
    types::{CutoutResult, EncodedImage, FailedAttempt, SourceImage, StrategyCapability},
};
use instant::Instant;
use log::{debug, info, warn};
use std::path::Path;
use tracing::{info as trace_info, instrument, span, Level};

/// Background removal pipeline with automatic fallback
pub struct BackgroundRemover {
    config: PipelineConfig,
    strategies: Vec<Box<dyn RemovalStrategy>>,
    optimizer: ImageOptimizer,
    compositor: BackgroundCompositor,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("config", &self.config)
            .field("strategies", &self.capabilities())
            .finish()
    }
}

impl BackgroundRemover {
    /// Build the default chain (neural, contour, corner heuristic), skipping
    /// tiers whose runtime or model is unavailable
    ///
    /// # Errors
    /// - Configuration fails validation
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        debug!("Capability report: {:?}", capabilities::build_report());
        let strategies = Self::default_chain(&config);
        Self::with_strategies(config, strategies)
    }

    /// Build a remover around caller-supplied strategies, kept in the given order
    ///
    /// # Errors
    /// - Configuration fails validation
    /// - No supplied strategy is available
    pub fn with_strategies(
        config: PipelineConfig,
        strategies: Vec<Box<dyn RemovalStrategy>>,
    ) -> Result<Self> {
        config.validate()?;

        let strategies: Vec<_> = strategies
            .into_iter()
            .filter(|strategy| {
                let available = strategy.is_available();
                if !available {
                    debug!("Strategy '{}' unavailable, skipping", strategy.name());
                }
                available
            })
            .collect();

        let Some(primary) = strategies.first() else {
            return Err(BgRemovalError::invalid_config(
                "No available background removal strategy",
            ));
        };
        info!(
            "Background removal initialized with primary strategy '{}' ({} tier(s))",
            primary.name(),
            strategies.len()
        );

        Ok(Self {
            optimizer: ImageOptimizer::from_config(&config),
            compositor: BackgroundCompositor::new(config.jpeg_quality),
            config,
            strategies,
        })
    }

    fn default_chain(config: &PipelineConfig) -> Vec<Box<dyn RemovalStrategy>> {
        let mut chain: Vec<Box<dyn RemovalStrategy>> = Vec::new();

        #[cfg(feature = "onnx")]
        if config.enable_neural
            && capabilities::build_report().supports(StrategyCapability::Neural)
        {
            match crate::strategies::NeuralStrategy::from_config(config) {
                Some(neural) if neural.is_available() => chain.push(Box::new(neural)),
                Some(neural) => debug!(
                    "Neural strategy disabled: model not found at {}",
                    neural.model().path.display()
                ),
                None => debug!("Neural strategy disabled: no model location"),
            }
        }

        #[cfg(feature = "vision")]
        if config.enable_contour
            && capabilities::build_report().supports(StrategyCapability::Contour)
        {
            chain.push(Box::new(crate::strategies::ContourStrategy::new()));
        }

        chain.push(Box::new(CornerHeuristicStrategy::new(config.corner_sensitivity)));
        chain
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Tier tried first
    #[must_use]
    pub fn primary_capability(&self) -> StrategyCapability {
        self.strategies
            .first()
            .map_or(StrategyCapability::CornerHeuristic, |s| s.capability())
    }

    /// All tiers in the order they will be tried
    #[must_use]
    pub fn capabilities(&self) -> Vec<StrategyCapability> {
        self.strategies.iter().map(|s| s.capability()).collect()
    }

    /// Remove the background of the image at `path`
    ///
    /// # Errors
    /// - `Io` / `Decode` when the input cannot be loaded; never retried
    /// - `Removal` carrying the last tier's message when every tier fails
    #[instrument(skip(self, path), fields(path = %path.as_ref().display()))]
    pub fn remove_background<P: AsRef<Path>>(&self, path: P) -> Result<CutoutResult> {
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let source = {
            let _span = span!(Level::DEBUG, "decode").entered();
            ImageIOService::load_source(path.as_ref())?
        };
        let decode_ms = elapsed_ms(decode_start);

        let mut result = self.remove_source(&source)?;
        result.metadata.timings.decode_ms = decode_ms;
        result.metadata.timings.total_ms = elapsed_ms(total_start);
        Ok(result)
    }

    /// Run the fallback chain over an already decoded image
    ///
    /// # Errors
    /// - `Removal` carrying the last tier's message when every tier fails
    pub fn remove_source(&self, source: &SourceImage) -> Result<CutoutResult> {
        let removal_start = Instant::now();
        let mut failed_attempts = Vec::new();
        let mut last_error = None;

        for strategy in &self.strategies {
            let _span = span!(Level::INFO, "strategy", strategy = %strategy.name()).entered();
            let attempt_start = Instant::now();

            match strategy.remove(source) {
                Ok(mut result) => {
                    trace_info!(
                        strategy = %strategy.name(),
                        duration_ms = elapsed_ms(attempt_start),
                        "Background removed"
                    );
                    if !failed_attempts.is_empty() {
                        info!(
                            "Fell back to '{}' after {} failed tier(s)",
                            strategy.name(),
                            failed_attempts.len()
                        );
                    }
                    result.metadata.failed_attempts = failed_attempts;
                    result.metadata.source_format = source.format().map(|f| format!("{f:?}"));
                    result.metadata.timings.removal_ms = elapsed_ms(removal_start);
                    result.metadata.timings.total_ms = result.metadata.timings.removal_ms;
                    return Ok(result);
                },
                Err(e) if !e.is_fallback_eligible() => return Err(e),
                Err(e) => {
                    warn!("Strategy '{}' failed: {}", strategy.name(), e);
                    failed_attempts.push(FailedAttempt {
                        capability: strategy.capability(),
                        error: e.to_string(),
                    });
                    last_error = Some(e);
                },
            }
        }

        Err(match last_error {
            Some(BgRemovalError::Removal(message)) => BgRemovalError::Removal(message),
            Some(other) => BgRemovalError::removal(other.to_string()),
            None => BgRemovalError::removal("No background removal strategy configured"),
        })
    }

    /// Optimize, remove the background, then release the optimized copy
    ///
    /// # Errors
    /// - Same as [`BackgroundRemover::remove_background`]
    pub fn process<P: AsRef<Path>>(&self, path: P) -> Result<CutoutResult> {
        let _span =
            spans::invocation(path.as_ref(), self.primary_capability().as_str()).entered();
        let total_start = Instant::now();

        let optimize_start = Instant::now();
        let optimized = if self.config.optimize_inputs {
            self.optimizer.optimize(path.as_ref())
        } else {
            OptimizedImage::Original(path.as_ref().to_path_buf())
        };
        let optimize_ms = elapsed_ms(optimize_start);
        if let Some((width, height)) = optimized.resized_dimensions() {
            debug!("Processing optimized copy {}x{}", width, height);
        }

        let mut result = self.remove_background(&*optimized)?;
        result.metadata.timings.optimize_ms = optimize_ms;
        result.metadata.timings.total_ms = elapsed_ms(total_start);
        Ok(result)
    }

    /// Downsize `path` to the configured ceiling if needed
    pub fn optimize_for_processing<P: AsRef<Path>>(&self, path: P) -> OptimizedImage {
        self.optimizer.optimize(path)
    }

    /// Flatten a stored cutout over a requested background
    ///
    /// # Errors
    /// - `Io` / `Decode` when the cutout cannot be loaded
    /// - `Compositing` for a malformed hex request
    pub fn add_solid_background<P: AsRef<Path>>(
        &self,
        path: P,
        request: &str,
    ) -> Result<EncodedImage> {
        self.compositor.add_solid_background(path, request)
    }

    /// Encode a fresh cutout for delivery
    ///
    /// # Errors
    /// - `Compositing` for a malformed hex request
    pub fn deliver(&self, cutout: &CutoutResult, request: &str) -> Result<EncodedImage> {
        self.compositor.deliver(cutout, request)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategies::test_utils::MockStrategy;
    use image::{DynamicImage, RgbImage};
    use std::sync::atomic::Ordering;

    fn source() -> SourceImage {
        SourceImage::from_image(DynamicImage::ImageRgb8(RgbImage::new(10, 6)))
    }

    #[test]
    fn test_first_success_wins() {
        let primary = MockStrategy::succeeding(StrategyCapability::Neural, 200);
        let secondary = MockStrategy::succeeding(StrategyCapability::Contour, 100);
        let secondary_calls = secondary.call_counter();

        let remover = BackgroundRemover::with_strategies(
            PipelineConfig::default(),
            vec![Box::new(primary), Box::new(secondary)],
        )
        .unwrap();

        let result = remover.remove_source(&source()).unwrap();
        assert_eq!(result.capability, StrategyCapability::Neural);
        assert!(!result.metadata.fell_back());
        assert_eq!(secondary_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_failure_falls_to_next_tier_once() {
        let primary = MockStrategy::failing(StrategyCapability::Neural, "model exploded");
        let primary_calls = primary.call_counter();
        let secondary = MockStrategy::succeeding(StrategyCapability::Contour, 255);

        let remover = BackgroundRemover::with_strategies(
            PipelineConfig::default(),
            vec![Box::new(primary), Box::new(secondary)],
        )
        .unwrap();

        let result = remover.remove_source(&source()).unwrap();
        assert_eq!(result.capability, StrategyCapability::Contour);
        assert_eq!(primary_calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.metadata.failed_attempts.len(), 1);
        assert_eq!(
            result.metadata.failed_attempts[0].capability,
            StrategyCapability::Neural
        );
        assert!(result.metadata.failed_attempts[0]
            .error
            .contains("model exploded"));
    }

    #[test]
    fn test_all_tiers_failing_reports_last_error() {
        let remover = BackgroundRemover::with_strategies(
            PipelineConfig::default(),
            vec![
                Box::new(MockStrategy::failing(StrategyCapability::Neural, "first")),
                Box::new(MockStrategy::failing(StrategyCapability::CornerHeuristic, "last")),
            ],
        )
        .unwrap();

        let err = remover.remove_source(&source()).unwrap_err();
        assert!(matches!(err, BgRemovalError::Removal(_)));
        assert!(err.to_string().contains("last"));
        assert!(!err.to_string().contains("first"));
    }

    #[test]
    fn test_unavailable_strategies_skipped() {
        let remover = BackgroundRemover::with_strategies(
            PipelineConfig::default(),
            vec![
                Box::new(MockStrategy::unavailable(StrategyCapability::Neural)),
                Box::new(MockStrategy::succeeding(StrategyCapability::Contour, 1)),
            ],
        )
        .unwrap();

        assert_eq!(remover.primary_capability(), StrategyCapability::Contour);
        assert_eq!(remover.capabilities(), vec![StrategyCapability::Contour]);
    }

    #[test]
    fn test_no_available_strategy_is_config_error() {
        let result = BackgroundRemover::with_strategies(
            PipelineConfig::default(),
            vec![Box::new(MockStrategy::unavailable(StrategyCapability::Neural))],
        );
        assert!(matches!(result, Err(BgRemovalError::InvalidConfig(_))));
    }

    #[test]
    fn test_default_chain_ends_with_corner_heuristic() {
        let config = PipelineConfig::builder()
            .model_path("/nonexistent/u2net.onnx")
            .build()
            .unwrap();
        let remover = BackgroundRemover::new(config).unwrap();

        let tiers = remover.capabilities();
        assert_eq!(tiers.last(), Some(&StrategyCapability::CornerHeuristic));
        assert!(!tiers.contains(&StrategyCapability::Neural));
        #[cfg(feature = "vision")]
        assert_eq!(remover.primary_capability(), StrategyCapability::Contour);
    }

    #[test]
    fn test_decode_failure_is_not_retried() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.jpg");
        std::fs::write(&path, b"\xFF\xD8 truncated").unwrap();

        let strategy = MockStrategy::succeeding(StrategyCapability::Neural, 1);
        let calls = strategy.call_counter();
        let remover =
            BackgroundRemover::with_strategies(PipelineConfig::default(), vec![Box::new(strategy)])
                .unwrap();

        let err = remover.remove_background(&path).unwrap_err();
        assert!(matches!(err, BgRemovalError::Decode(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
