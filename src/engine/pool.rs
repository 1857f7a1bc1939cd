//! Model Pool
//!
//! One pool is shared by every request. Models are compiled on first use and
//! dropped again once they have been idle longer than the configured timeout,
//! so a quiet service does not hold inference memory.

use std::ops::Deref;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Context;
use openvino::{CompiledModel, Core, InferRequest};
use parking_lot::RwLock;
use tokio::sync::Notify;
use tracing::{debug, info};

use crate::config::{InferenceConfig, ModelsConfig};

const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// OpenVINO `Core` behind a lock so it can be shared across threads
struct SharedCore(Core);
unsafe impl Send for SharedCore {}
unsafe impl Sync for SharedCore {}

/// Compiled model handle that can be cloned into blocking tasks
#[derive(Clone)]
pub struct SharedModel(Arc<CompiledModel>);
unsafe impl Send for SharedModel {}
unsafe impl Sync for SharedModel {}

impl SharedModel {
    /// Create a fresh inference request.
    ///
    /// Requests are per call, so no inference state is shared between
    /// concurrent callers. The C++ `CompiledModel` is thread-safe here even
    /// though the Rust binding takes `&mut self`.
    pub fn create_infer_request(&self) -> anyhow::Result<InferRequest> {
        unsafe {
            let ptr = Arc::as_ptr(&self.0) as *mut CompiledModel;
            (*ptr).create_infer_request().map_err(Into::into)
        }
    }
}

impl Deref for SharedModel {
    type Target = CompiledModel;
    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

struct CachedModel {
    compiled: SharedModel,
    last_access: Instant,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    Detector,
    Emotion,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Detector, ModelType::Emotion];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelType::Detector => "detector",
            ModelType::Emotion => "emotion",
        }
    }
}

struct ModelSlot {
    path: PathBuf,
    cached: RwLock<Option<CachedModel>>,
}

impl ModelSlot {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            cached: RwLock::new(None),
        }
    }
}

pub struct ModelPool {
    core: RwLock<SharedCore>,
    device: String,
    idle_timeout: Duration,
    detector: ModelSlot,
    emotion: ModelSlot,
    shutdown: Notify,
}

impl ModelPool {
    pub fn new(config: &InferenceConfig, models: &ModelsConfig) -> anyhow::Result<Self> {
        let core = Core::new().context("failed to initialise OpenVINO runtime")?;

        Ok(Self {
            core: RwLock::new(SharedCore(core)),
            device: config.device.clone(),
            idle_timeout: Duration::from_secs(config.model_idle_timeout),
            detector: ModelSlot::new(models.detector.clone()),
            emotion: ModelSlot::new(models.emotion.clone()),
            shutdown: Notify::new(),
        })
    }

    fn slot(&self, model_type: ModelType) -> &ModelSlot {
        match model_type {
            ModelType::Detector => &self.detector,
            ModelType::Emotion => &self.emotion,
        }
    }

    /// Get a compiled model, compiling it first if it is not resident
    pub fn get_model(&self, model_type: ModelType) -> anyhow::Result<SharedModel> {
        let slot = self.slot(model_type);

        // Held across compilation so concurrent callers wait instead of loading twice
        let mut guard = slot.cached.write();
        if let Some(cached) = guard.as_mut() {
            cached.last_access = Instant::now();
            return Ok(cached.compiled.clone());
        }

        let path = slot.path.to_str().with_context(|| {
            format!("model path for {} is not valid UTF-8", model_type.as_str())
        })?;

        info!("Loading model: {} from {}", model_type.as_str(), path);
        let start = Instant::now();

        let compiled = {
            let mut core = self.core.write();
            let model = core
                .0
                .read_model_from_file(path, "")
                .with_context(|| format!("failed to read {} model from {}", model_type.as_str(), path))?;
            core.0
                .compile_model(&model, self.device.as_str().into())
                .with_context(|| format!("failed to compile {} model for {}", model_type.as_str(), self.device))?
        };
        let shared = SharedModel(Arc::new(compiled));

        info!("Model {} loaded in {:?}", model_type.as_str(), start.elapsed());

        *guard = Some(CachedModel {
            compiled: shared.clone(),
            last_access: Instant::now(),
        });

        Ok(shared)
    }

    pub fn is_loaded(&self, model_type: ModelType) -> bool {
        self.slot(model_type).cached.read().is_some()
    }

    pub fn get_status(&self) -> Vec<(ModelType, bool)> {
        ModelType::ALL
            .iter()
            .map(|&t| (t, self.is_loaded(t)))
            .collect()
    }

    fn cleanup_idle_models(&self) {
        let now = Instant::now();
        for model_type in ModelType::ALL {
            let mut guard = self.slot(model_type).cached.write();
            let idle = guard
                .as_ref()
                .is_some_and(|cached| is_idle(cached.last_access, now, self.idle_timeout));
            if idle {
                info!("Unloading idle model: {}", model_type.as_str());
                *guard = None;
            }
        }
    }

    /// Periodically unload idle models until `shutdown` is called
    pub async fn start_cleanup_task(self: Arc<Self>) {
        loop {
            tokio::select! {
                _ = tokio::time::sleep(CLEANUP_INTERVAL) => {
                    debug!("Running model cleanup check");
                    self.cleanup_idle_models();
                }
                _ = self.shutdown.notified() => {
                    info!("Model pool cleanup task shutting down");
                    break;
                }
            }
        }
    }

    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

impl Drop for ModelPool {
    fn drop(&mut self) {
        self.shutdown.notify_one();
    }
}

fn is_idle(last_access: Instant, now: Instant, timeout: Duration) -> bool {
    now.saturating_duration_since(last_access) > timeout
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_model_type_as_str() {
        assert_eq!(ModelType::Detector.as_str(), "detector");
        assert_eq!(ModelType::Emotion.as_str(), "emotion");
    }

    #[test]
    fn test_idle_timeout() {
        let start = Instant::now();
        let timeout = Duration::from_secs(300);
        assert!(!is_idle(start, start + Duration::from_secs(299), timeout));
        assert!(!is_idle(start, start + timeout, timeout));
        assert!(is_idle(start, start + Duration::from_secs(301), timeout));
    }
}
