//! Risk prediction models and the cache that holds them once loaded.
//!
//! Model selection goes through [`ModelKind`]; there is no string dispatch.
//! The cache is an ordinary value owned by whoever needs it, so every test
//! can build an isolated one.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Stroke,
    Alzheimers,
}

impl ModelKind {
    pub fn slug(&self) -> &'static str {
        match self {
            ModelKind::Stroke => "stroke",
            ModelKind::Alzheimers => "alzheimers",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        [ModelKind::Stroke, ModelKind::Alzheimers]
            .into_iter()
            .find(|kind| kind.slug() == slug)
    }

    pub fn feature_count(&self) -> usize {
        match self {
            ModelKind::Stroke => 6,
            ModelKind::Alzheimers => 5,
        }
    }
}

#[derive(Debug, Error)]
pub enum ModelCacheError {
    #[error("failed to read model artifact at {location}: {source}")]
    Io {
        location: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed model artifact at {location}: {source}")]
    Parse {
        location: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{kind:?} model expects {expected} weights, artifact has {actual}")]
    FeatureMismatch {
        kind: ModelKind,
        expected: usize,
        actual: usize,
    },
    #[error("{kind:?} model normalization has a non-positive std")]
    InvalidScale { kind: ModelKind },
    #[error("input for {actual:?} given to a {expected:?} model")]
    KindMismatch { expected: ModelKind, actual: ModelKind },
    #[error("invalid model version {version:?}")]
    InvalidVersion { version: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrokeRiskInput {
    pub age: f64,
    pub avg_glucose_level: f64,
    pub bmi: f64,
    pub hypertension: bool,
    pub heart_disease: bool,
    pub smokes: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlzheimersRiskInput {
    pub age: f64,
    pub education_years: f64,
    pub cognitive_assessment: f64,
    pub memory_complaints: bool,
    pub family_history: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum PredictionInput {
    Stroke(StrokeRiskInput),
    Alzheimers(AlzheimersRiskInput),
}

impl PredictionInput {
    pub fn kind(&self) -> ModelKind {
        match self {
            PredictionInput::Stroke(_) => ModelKind::Stroke,
            PredictionInput::Alzheimers(_) => ModelKind::Alzheimers,
        }
    }

    fn features(&self) -> Vec<f64> {
        let flag = |value: bool| if value { 1.0 } else { 0.0 };
        match self {
            PredictionInput::Stroke(input) => vec![
                input.age,
                input.avg_glucose_level,
                input.bmi,
                flag(input.hypertension),
                flag(input.heart_disease),
                flag(input.smokes),
            ],
            PredictionInput::Alzheimers(input) => vec![
                input.age,
                input.education_years,
                input.cognitive_assessment,
                flag(input.memory_complaints),
                flag(input.family_history),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskCategory {
    VeryLow,
    Low,
    Moderate,
    High,
    VeryHigh,
}

impl RiskCategory {
    pub fn from_probability(probability: f64) -> Self {
        match probability {
            p if p < 0.1 => RiskCategory::VeryLow,
            p if p < 0.2 => RiskCategory::Low,
            p if p < 0.4 => RiskCategory::Moderate,
            p if p < 0.6 => RiskCategory::High,
            _ => RiskCategory::VeryHigh,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub kind: ModelKind,
    pub model_version: String,
    pub probability: f64,
    pub risk_category: RiskCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureScale {
    pub mean: f64,
    pub std: f64,
}

/// Logistic regression weights as shipped in `model.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub version: String,
    pub bias: f64,
    pub weights: Vec<f64>,
    #[serde(default)]
    pub normalization: Vec<Option<FeatureScale>>,
}

pub trait Predict {
    fn predict(&self, input: &PredictionInput) -> Result<Prediction, ModelCacheError>;
}

#[derive(Debug, Clone)]
pub struct LoadedModel {
    kind: ModelKind,
    artifact: ModelArtifact,
}

impl LoadedModel {
    pub fn new(kind: ModelKind, artifact: ModelArtifact) -> Result<Self, ModelCacheError> {
        let expected = kind.feature_count();
        if artifact.weights.len() != expected {
            return Err(ModelCacheError::FeatureMismatch {
                kind,
                expected,
                actual: artifact.weights.len(),
            });
        }
        if artifact.normalization.len() > expected {
            return Err(ModelCacheError::FeatureMismatch {
                kind,
                expected,
                actual: artifact.normalization.len(),
            });
        }
        if artifact.normalization.iter().flatten().any(|scale| scale.std <= 0.0) {
            return Err(ModelCacheError::InvalidScale { kind });
        }
        Ok(Self { kind, artifact })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn version(&self) -> &str {
        &self.artifact.version
    }
}

impl Predict for LoadedModel {
    fn predict(&self, input: &PredictionInput) -> Result<Prediction, ModelCacheError> {
        if input.kind() != self.kind {
            return Err(ModelCacheError::KindMismatch {
                expected: self.kind,
                actual: input.kind(),
            });
        }

        let logit = input
            .features()
            .into_iter()
            .enumerate()
            .map(|(i, value)| {
                let scaled = match self.artifact.normalization.get(i).copied().flatten() {
                    Some(scale) => (value - scale.mean) / scale.std,
                    None => value,
                };
                scaled * self.artifact.weights[i]
            })
            .sum::<f64>()
            + self.artifact.bias;
        let probability = 1.0 / (1.0 + (-logit).exp());

        Ok(Prediction {
            kind: self.kind,
            model_version: self.artifact.version.clone(),
            probability,
            risk_category: RiskCategory::from_probability(probability),
        })
    }
}

/// Where model artifacts come from.
pub trait ModelSource: Send + Sync {
    fn load(&self, location: &str) -> Result<ModelArtifact, ModelCacheError>;
}

/// Reads `<location>/model.json` from the local filesystem.
#[derive(Debug, Clone, Default)]
pub struct FileModelSource;

impl ModelSource for FileModelSource {
    fn load(&self, location: &str) -> Result<ModelArtifact, ModelCacheError> {
        let path = PathBuf::from(location).join("model.json");
        let contents = std::fs::read_to_string(&path).map_err(|source| ModelCacheError::Io {
            location: location.to_string(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|source| ModelCacheError::Parse {
            location: location.to_string(),
            source,
        })
    }
}

#[derive(Debug, Clone)]
pub struct ModelCacheConfig {
    /// Maximum number of `(kind, version)` entries held at once. Zero
    /// disables caching.
    pub capacity: usize,
    pub base_location: String,
}

impl Default for ModelCacheConfig {
    fn default() -> Self {
        Self {
            capacity: 4,
            base_location: "./models".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelKey {
    pub kind: ModelKind,
    pub version: String,
}

impl ModelKey {
    /// Versions become a path segment, so only `[A-Za-z0-9._-]` is allowed
    /// and a version may not start with a dot.
    pub fn new(kind: ModelKind, version: &str) -> Result<Self, ModelCacheError> {
        let valid = !version.is_empty()
            && !version.starts_with('.')
            && version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
        if !valid {
            return Err(ModelCacheError::InvalidVersion {
                version: version.to_string(),
            });
        }
        Ok(Self {
            kind,
            version: version.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CachedModelStatus {
    pub kind: ModelKind,
    pub version: String,
    pub loaded_at: DateTime<Utc>,
}

struct CachedModel {
    model: Arc<LoadedModel>,
    loaded_at: DateTime<Utc>,
}

pub struct ModelCache {
    config: ModelCacheConfig,
    source: Box<dyn ModelSource>,
    entries: HashMap<ModelKey, CachedModel>,
    load_order: VecDeque<ModelKey>,
}

impl ModelCache {
    pub fn new(config: ModelCacheConfig, source: Box<dyn ModelSource>) -> Self {
        Self {
            config,
            source,
            entries: HashMap::new(),
            load_order: VecDeque::new(),
        }
    }

    pub fn location(&self, kind: ModelKind, version: &str) -> String {
        format!(
            "{}/{}-model/versions/{}",
            self.config.base_location.trim_end_matches('/'),
            kind.slug(),
            version
        )
    }

    pub fn get_or_load(
        &mut self,
        kind: ModelKind,
        version: &str,
    ) -> Result<Arc<LoadedModel>, ModelCacheError> {
        let key = ModelKey::new(kind, version)?;
        if let Some(cached) = self.entries.get(&key) {
            debug!("Using cached {:?} model {}", kind, version);
            return Ok(cached.model.clone());
        }
        self.load(key)
    }

    /// Load again even when an entry exists.
    pub fn reload(
        &mut self,
        kind: ModelKind,
        version: &str,
    ) -> Result<Arc<LoadedModel>, ModelCacheError> {
        let key = ModelKey::new(kind, version)?;
        self.remove(&key);
        self.load(key)
    }

    pub fn predict(
        &mut self,
        version: &str,
        input: &PredictionInput,
    ) -> Result<Prediction, ModelCacheError> {
        self.get_or_load(input.kind(), version)?.predict(input)
    }

    /// Drop every cached version of `kind`. Returns how many were dropped.
    pub fn evict(&mut self, kind: ModelKind) -> usize {
        let keys: Vec<ModelKey> = self
            .entries
            .keys()
            .filter(|key| key.kind == kind)
            .cloned()
            .collect();
        for key in &keys {
            self.remove(key);
        }
        info!("Evicted {} cached {:?} models", keys.len(), kind);
        keys.len()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.load_order.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn status(&self) -> Vec<CachedModelStatus> {
        self.load_order
            .iter()
            .filter_map(|key| {
                self.entries.get(key).map(|cached| CachedModelStatus {
                    kind: key.kind,
                    version: key.version.clone(),
                    loaded_at: cached.loaded_at,
                })
            })
            .collect()
    }

    fn load(&mut self, key: ModelKey) -> Result<Arc<LoadedModel>, ModelCacheError> {
        let location = self.location(key.kind, &key.version);
        info!("Loading {:?} model from {}", key.kind, location);
        let artifact = self.source.load(&location)?;
        let model = Arc::new(LoadedModel::new(key.kind, artifact)?);

        if self.config.capacity == 0 {
            return Ok(model);
        }
        while self.entries.len() >= self.config.capacity {
            let Some(oldest) = self.load_order.pop_front() else {
                break;
            };
            debug!("Cache full, evicting {:?} model {}", oldest.kind, oldest.version);
            self.entries.remove(&oldest);
        }

        self.entries.insert(
            key.clone(),
            CachedModel {
                model: model.clone(),
                loaded_at: Utc::now(),
            },
        );
        self.load_order.push_back(key);
        Ok(model)
    }

    fn remove(&mut self, key: &ModelKey) {
        self.entries.remove(key);
        self.load_order.retain(|existing| existing != key);
    }
}
