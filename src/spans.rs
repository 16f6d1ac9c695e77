//! Named spans wrapped around the pipeline entry points

use std::path::Path;
use tracing::{Level, Span};

/// One upload moving through optimize, remove and deliver
pub fn invocation(path: &Path, primary_strategy: &str) -> Span {
    tracing::span!(
        Level::INFO,
        "invocation",
        path = %path.display(),
        primary_strategy = %primary_strategy
    )
}

pub fn batch_processing(file_count: usize) -> Span {
    tracing::span!(Level::INFO, "batch_processing", file_count = file_count)
}

pub fn delivery(background: &str) -> Span {
    tracing::span!(Level::DEBUG, "delivery", background = %background)
}

#[cfg(all(test, feature = "tracing-init"))]
mod tests {
    use super::*;
    use tracing_subscriber::{filter::LevelFilter, fmt, layer::SubscriberExt, Registry};

    #[test]
    fn test_span_names_and_levels() {
        let subscriber = Registry::default()
            .with(fmt::layer().with_test_writer())
            .with(LevelFilter::TRACE);

        tracing::subscriber::with_default(subscriber, || {
            let span = invocation(Path::new("upload.jpg"), "neural");
            let meta = span.metadata().unwrap();
            assert_eq!(meta.name(), "invocation");
            assert_eq!(*meta.level(), Level::INFO);
            assert!(meta.fields().field("primary_strategy").is_some());

            let span = batch_processing(4);
            assert_eq!(span.metadata().unwrap().name(), "batch_processing");

            let span = delivery("#00FF00");
            let meta = span.metadata().unwrap();
            assert_eq!(*meta.level(), Level::DEBUG);
            let _entered = span.entered();
        });
    }

    #[test]
    fn test_filtered_spans_are_disabled() {
        let subscriber = Registry::default().with(LevelFilter::INFO);
        tracing::subscriber::with_default(subscriber, || {
            assert!(delivery("black").is_disabled());
            assert!(!batch_processing(1).is_disabled());
        });
    }
}
