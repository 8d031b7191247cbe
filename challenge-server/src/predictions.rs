use challenge_core::{CachedModelStatus, ModelCache, ModelCacheError, ModelKind, Prediction, PredictionInput};
use serde::Deserialize;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionRequest {
    pub version: Option<String>,
    pub input: PredictionInput,
}

/// Shares one [`ModelCache`] between request handlers.
pub struct PredictionService {
    cache: Mutex<ModelCache>,
    default_version: String,
}

impl PredictionService {
    pub fn new(cache: ModelCache, default_version: impl Into<String>) -> Self {
        Self {
            cache: Mutex::new(cache),
            default_version: default_version.into(),
        }
    }

    pub async fn predict(&self, request: &PredictionRequest) -> Result<Prediction, ModelCacheError> {
        let version = request.version.as_deref().unwrap_or(&self.default_version);
        self.cache.lock().await.predict(version, &request.input)
    }

    pub async fn loaded_models(&self) -> Vec<CachedModelStatus> {
        self.cache.lock().await.status()
    }

    pub async fn evict(&self, kind: ModelKind) -> usize {
        self.cache.lock().await.evict(kind)
    }
}
