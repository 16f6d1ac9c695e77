//! Worker pool ordering and per-item failures

mod common;

use bgcutout::{
    BackgroundRemover, BatchProcessor, BgRemovalError, CornerHeuristicStrategy, PipelineConfig,
    StrategyCapability,
};
use common::{subject_on_backdrop, write_image};
use image::ImageFormat;
use std::sync::Arc;
use tempfile::TempDir;

fn corner_only_remover() -> Arc<BackgroundRemover> {
    let remover = BackgroundRemover::with_strategies(
        PipelineConfig::default(),
        vec![Box::new(CornerHeuristicStrategy::default())],
    )
    .unwrap();
    Arc::new(remover)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_batch_preserves_order_and_isolates_failures() {
    let _ = env_logger::builder().is_test(true).try_init();

    let temp_dir = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for i in 0..6u32 {
        let image = subject_on_backdrop(40 + i * 7, 30 + i * 3, [20, 20, 20], [220, 220, 220]);
        paths.push(write_image(
            temp_dir.path(),
            &format!("upload_{i}.png"),
            &image,
            ImageFormat::Png,
        ));
    }
    let broken = temp_dir.path().join("broken.png");
    std::fs::write(&broken, b"\x89PNG but not really").unwrap();
    paths.insert(3, broken.clone());

    let batch = BatchProcessor::new(corner_only_remover(), 3);
    let items = batch.process_all(paths.clone()).await;

    assert_eq!(items.len(), paths.len());
    for (item, path) in items.iter().zip(&paths) {
        assert_eq!(&item.path, path);
    }

    assert!(matches!(items[3].result, Err(BgRemovalError::Decode(_))));
    assert_eq!(items.iter().filter(|item| item.is_success()).count(), 6);

    let last = items[6].result.as_ref().unwrap();
    assert_eq!(last.dimensions(), (75, 45));
    assert_eq!(last.capability, StrategyCapability::CornerHeuristic);
}

#[tokio::test]
async fn test_zero_workers_uses_configured_count() {
    let config = PipelineConfig::builder().worker_threads(5).build().unwrap();
    let remover = BackgroundRemover::with_strategies(
        config,
        vec![Box::new(CornerHeuristicStrategy::default())],
    )
    .unwrap();

    let batch = BatchProcessor::new(Arc::new(remover), 0);
    assert_eq!(batch.workers(), 5);
    assert!(batch.process_all(Vec::new()).await.is_empty());
}
