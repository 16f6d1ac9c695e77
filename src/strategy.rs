//! Removal strategy abstraction

use crate::{
    error::Result,
    services::ImageIOService,
    types::{CutoutResult, SourceImage, StrategyCapability},
};
use std::path::Path;

/// A way of turning a source image into a transparent-background cutout
///
/// Implementations are stateless with respect to a single invocation and
/// must be shareable across the batch worker pool.
pub trait RemovalStrategy: Send + Sync {
    /// Tier this strategy occupies in the fallback chain
    fn capability(&self) -> StrategyCapability;

    /// Name used in logs
    fn name(&self) -> &str {
        self.capability().as_str()
    }

    /// Whether the runtime pieces this strategy needs are present
    fn is_available(&self) -> bool {
        true
    }

    /// Produce a cutout whose alpha is this strategy's mask
    ///
    /// # Errors
    /// - `Removal` (or any non-decode error) when the strategy cannot produce a mask
    fn remove(&self, source: &SourceImage) -> Result<CutoutResult>;

    /// Load the image at `path` and remove its background
    ///
    /// # Errors
    /// - `Io` / `Decode` when the input cannot be loaded
    /// - Any error from [`RemovalStrategy::remove`]
    fn remove_background(&self, path: &Path) -> Result<CutoutResult> {
        let source = ImageIOService::load_source(path)?;
        self.remove(&source)
    }
}

impl std::fmt::Debug for dyn RemovalStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemovalStrategy")
            .field("name", &self.name())
            .field("capability", &self.capability())
            .finish()
    }
}
