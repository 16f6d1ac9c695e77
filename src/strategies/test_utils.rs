//! Mock strategies for exercising the fallback chain without models

use crate::{
    error::{BgRemovalError, Result},
    strategy::RemovalStrategy,
    types::{CutoutResult, SegmentationMask, SourceImage, StrategyCapability},
};
use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
};

/// Configurable strategy that records how often it was called
#[derive(Debug, Clone)]
pub struct MockStrategy {
    capability: StrategyCapability,
    available: bool,
    failure: Option<String>,
    fill: u8,
    calls: Arc<AtomicUsize>,
}

impl MockStrategy {
    /// Succeeds with a uniform mask of `fill`
    #[must_use]
    pub fn succeeding(capability: StrategyCapability, fill: u8) -> Self {
        Self {
            capability,
            available: true,
            failure: None,
            fill,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Always fails with a removal error carrying `message`
    #[must_use]
    pub fn failing(capability: StrategyCapability, message: &str) -> Self {
        let mut strategy = Self::succeeding(capability, 0);
        strategy.failure = Some(message.to_string());
        strategy
    }

    /// Reports itself unavailable
    #[must_use]
    pub fn unavailable(capability: StrategyCapability) -> Self {
        let mut strategy = Self::succeeding(capability, 0);
        strategy.available = false;
        strategy
    }

    /// Shared counter; clone before boxing the strategy
    #[must_use]
    pub fn call_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

impl RemovalStrategy for MockStrategy {
    fn capability(&self) -> StrategyCapability {
        self.capability
    }

    fn is_available(&self) -> bool {
        self.available
    }

    fn remove(&self, source: &SourceImage) -> Result<CutoutResult> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.failure {
            return Err(BgRemovalError::strategy_error(self.name(), message));
        }

        let (width, height) = source.dimensions();
        let mask = SegmentationMask::new(
            vec![self.fill; width as usize * height as usize],
            (width, height),
        );
        CutoutResult::from_mask(source.image(), mask, self.capability)
    }
}
