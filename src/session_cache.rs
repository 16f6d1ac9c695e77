//! Process-wide ONNX Runtime session sharing
//!
//! Loading a segmentation graph is expensive, so each model path is loaded
//! once and shared by every strategy instance and batch worker. `Session::run`
//! needs exclusive access, so every session sits behind its own mutex.

use crate::{
    config::ExecutionProvider,
    error::{BgRemovalError, Result},
};
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
};
use ort::session::{builder::GraphOptimizationLevel, builder::SessionBuilder, Session};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};

/// Shared handle to a loaded session
pub type SharedSession = Arc<Mutex<Session>>;

static SESSIONS: OnceLock<Mutex<HashMap<PathBuf, SharedSession>>> = OnceLock::new();

fn sessions() -> &'static Mutex<HashMap<PathBuf, SharedSession>> {
    SESSIONS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Options used the first time a model path is loaded
#[derive(Debug, Clone, Copy, Default)]
pub struct SessionOptions {
    pub execution_provider: ExecutionProvider,
    /// Intra-op threads (0 = available parallelism)
    pub intra_threads: usize,
}

/// Return the cached session for `model_path`, loading it on first use
///
/// Later calls with different options reuse the first session.
///
/// # Errors
/// - Session builder or model loading failure
/// - Cache lock poisoned
pub fn get_or_load(model_path: &Path, options: SessionOptions) -> Result<SharedSession> {
    let mut cache = sessions()
        .lock()
        .map_err(|_| BgRemovalError::internal("Session cache lock poisoned"))?;

    if let Some(session) = cache.get(model_path) {
        log::debug!("Reusing cached session for {}", model_path.display());
        return Ok(Arc::clone(session));
    }

    let start = instant::Instant::now();
    let session = Arc::new(Mutex::new(create_session(model_path, options)?));
    log::info!(
        "Loaded segmentation model {} in {:.2}ms",
        model_path.display(),
        start.elapsed().as_secs_f64() * 1000.0
    );

    cache.insert(model_path.to_path_buf(), Arc::clone(&session));
    Ok(session)
}

/// Whether a session for `model_path` is already loaded
#[must_use]
pub fn is_cached(model_path: &Path) -> bool {
    sessions()
        .lock()
        .map(|cache| cache.contains_key(model_path))
        .unwrap_or(false)
}

/// Number of loaded sessions
#[must_use]
pub fn cached_count() -> usize {
    sessions().lock().map(|cache| cache.len()).unwrap_or(0)
}

fn create_session(model_path: &Path, options: SessionOptions) -> Result<Session> {
    let builder = Session::builder()
        .map_err(|e| BgRemovalError::model(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| BgRemovalError::model(format!("Failed to set optimization level: {e}")))?;

    let builder = configure_providers(builder, options.execution_provider)?;

    let intra_threads = if options.intra_threads > 0 {
        options.intra_threads
    } else {
        std::thread::available_parallelism()
            .map(std::num::NonZeroUsize::get)
            .unwrap_or(4)
    };

    builder
        .with_intra_threads(intra_threads)
        .map_err(|e| BgRemovalError::model(format!("Failed to set intra threads: {e}")))?
        .commit_from_file(model_path)
        .map_err(|e| {
            BgRemovalError::model(format!(
                "Failed to load model '{}': {e}",
                model_path.display()
            ))
        })
}

fn configure_providers(
    builder: SessionBuilder,
    provider: ExecutionProvider,
) -> Result<SessionBuilder> {
    let cuda = CUDAExecutionProvider::default();
    let coreml = CoreMLExecutionProvider::default();
    let cuda_available = OrtExecutionProvider::is_available(&cuda).unwrap_or(false);
    let coreml_available = OrtExecutionProvider::is_available(&coreml).unwrap_or(false);

    let providers = match provider {
        ExecutionProvider::Cpu => Vec::new(),
        ExecutionProvider::Auto => {
            let mut providers = Vec::new();
            if cuda_available {
                providers.push(cuda.build());
            }
            if coreml_available {
                providers.push(coreml.with_subgraphs(true).build());
            }
            if providers.is_empty() {
                log::debug!("No hardware acceleration available, using CPU");
            }
            providers
        },
        ExecutionProvider::Cuda => {
            if !cuda_available {
                log::warn!("CUDA execution provider requested but not available, using CPU");
                Vec::new()
            } else {
                vec![cuda.build()]
            }
        },
        ExecutionProvider::CoreMl => {
            if !coreml_available {
                log::warn!("CoreML execution provider requested but not available, using CPU");
                Vec::new()
            } else {
                vec![coreml.with_subgraphs(true).build()]
            }
        },
    };

    if providers.is_empty() {
        return Ok(builder);
    }

    builder.with_execution_providers(providers).map_err(|e| {
        BgRemovalError::model(format!("Failed to set execution providers ({provider}): {e}"))
    })
}
