//! Bounded worker pool for running many invocations at once
//!
//! Each invocation is CPU-bound and synchronous, so it runs on tokio's
//! blocking pool. A semaphore caps how many run at the same time.

use crate::{
    error::{BgRemovalError, Result},
    processor::BackgroundRemover,
    spans,
    types::CutoutResult,
};
use futures::future::join_all;
use tracing::Instrument;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Outcome of one batch entry
#[derive(Debug)]
pub struct BatchItem {
    pub path: PathBuf,
    pub result: Result<CutoutResult>,
}

impl BatchItem {
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Runs [`BackgroundRemover::process`] over many inputs with bounded parallelism
#[derive(Debug, Clone)]
pub struct BatchProcessor {
    remover: Arc<BackgroundRemover>,
    semaphore: Arc<Semaphore>,
    workers: usize,
}

impl BatchProcessor {
    /// Pool of `workers` concurrent invocations (0 = available parallelism)
    #[must_use]
    pub fn new(remover: Arc<BackgroundRemover>, workers: usize) -> Self {
        let workers = if workers > 0 {
            workers
        } else {
            remover.config().resolved_worker_threads()
        };
        Self {
            remover,
            semaphore: Arc::new(Semaphore::new(workers)),
            workers,
        }
    }

    /// Pool sized from the remover's configuration
    #[must_use]
    pub fn from_remover(remover: Arc<BackgroundRemover>) -> Self {
        Self::new(remover, 0)
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Process every path; results come back in input order
    pub async fn process_all(&self, paths: Vec<PathBuf>) -> Vec<BatchItem> {
        log::info!(
            "Processing batch of {} image(s) with {} worker(s)",
            paths.len(),
            self.workers
        );

        let span = spans::batch_processing(paths.len());
        let handles = paths.into_iter().map(|path| {
            let remover = Arc::clone(&self.remover);
            let semaphore = Arc::clone(&self.semaphore);
            async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(permit) => {
                        let task_path = path.clone();
                        let parent = tracing::Span::current();
                        let joined = tokio::task::spawn_blocking(move || {
                            let _permit = permit;
                            let _entered = parent.entered();
                            remover.process(&task_path)
                        })
                        .await;
                        joined.unwrap_or_else(|e| {
                            Err(BgRemovalError::internal(format!("Batch worker failed: {e}")))
                        })
                    },
                    Err(_) => Err(BgRemovalError::internal("Batch worker pool closed")),
                };

                if let Err(e) = &result {
                    log::warn!("Batch item {} failed: {}", path.display(), e);
                }
                BatchItem { path, result }
            }
        });

        let items = join_all(handles).instrument(span).await;
        let succeeded = items.iter().filter(|item| item.is_success()).count();
        log::info!("Batch finished: {}/{} succeeded", succeeded, items.len());
        items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::PipelineConfig,
        strategies::test_utils::MockStrategy,
        types::StrategyCapability,
    };
    use image::{DynamicImage, RgbImage};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_results_keep_input_order() {
        let temp_dir = TempDir::new().unwrap();
        let mut paths = Vec::new();
        for i in 0..5u32 {
            let path = temp_dir.path().join(format!("img_{i}.png"));
            DynamicImage::ImageRgb8(RgbImage::new(10 + i, 10))
                .save(&path)
                .unwrap();
            paths.push(path);
        }
        paths.insert(2, temp_dir.path().join("missing.png"));

        let remover = BackgroundRemover::with_strategies(
            PipelineConfig::default(),
            vec![Box::new(MockStrategy::succeeding(
                StrategyCapability::CornerHeuristic,
                255,
            ))],
        )
        .unwrap();
        let batch = BatchProcessor::new(Arc::new(remover), 2);
        assert_eq!(batch.workers(), 2);

        let items = batch.process_all(paths.clone()).await;
        assert_eq!(items.len(), 6);
        for (item, path) in items.iter().zip(&paths) {
            assert_eq!(&item.path, path);
        }
        assert!(!items[2].is_success());
        assert_eq!(items[3].result.as_ref().unwrap().dimensions(), (12, 10));
    }
}
