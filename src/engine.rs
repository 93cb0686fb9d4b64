use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;
use tracing::{info, warn};

use crate::absorption_core::{Category, FeatureVector, ForestModel, InferenceRequest};
use crate::artifact::{load_model, load_scaler, ArtifactPaths};
use crate::dataset::LabeledRecord;
use crate::stats::EvaluationReport;
use crate::utils::{validate_probabilities, AnalysisError, ScalerState, StandardScaler};

/// Predicted category with a probability for every category
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Prediction {
    pub category: Category,
    pub probabilities: BTreeMap<Category, f64>,
}

impl Prediction {
    pub fn probability(&self, category: Category) -> f64 {
        self.probabilities.get(&category).copied().unwrap_or(0.0)
    }
}

/// Loaded scaler and classifier, read-only for the life of the process
///
/// Holds no interior mutability, so one instance can serve concurrent
/// callers (e.g. behind an `Arc`) without locking.
#[derive(Debug, Clone)]
pub struct InferenceService {
    scaler: StandardScaler,
    model: ForestModel,
}

impl InferenceService {
    /// Pair a fitted scaler state with a fitted model
    ///
    /// # Errors
    /// * `DimensionMismatch` if the scaler and model widths differ
    /// * `ValidationError` if the model does not know all three categories
    pub fn new(scaler: ScalerState, model: ForestModel) -> Result<Self, AnalysisError> {
        if scaler.n_features() != model.n_features() {
            return Err(AnalysisError::DimensionMismatch {
                expected: model.n_features(),
                actual: scaler.n_features(),
            });
        }
        if model.classes() != &Category::ALL[..] {
            return Err(AnalysisError::ValidationError(format!(
                "model classes {:?} do not cover every category",
                model.classes()
            )));
        }
        Ok(Self {
            scaler: StandardScaler::from_state(scaler)?,
            model,
        })
    }

    /// Load both artifacts
    ///
    /// # Errors
    /// * `ModelUnavailable` if either file is absent
    /// * `ArtifactError` if either file is unreadable
    pub fn load(paths: &ArtifactPaths) -> Result<Self, AnalysisError> {
        let scaler = load_scaler(&paths.scaler)?;
        let model = load_model(&paths.model)?;
        let service = Self::new(scaler, model)?;
        info!(
            n_estimators = service.model.n_estimators(),
            "inference service ready"
        );
        Ok(service)
    }

    pub fn model(&self) -> &ForestModel {
        &self.model
    }

    pub fn scaler(&self) -> &StandardScaler {
        &self.scaler
    }

    /// Classify one feature vector
    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, AnalysisError> {
        let scaled = self.scaler.transform_row(features.view())?;
        let (category, probs) = self.model.predict(scaled.view())?;
        validate_probabilities(&probs)?;

        let probabilities = self
            .model
            .classes()
            .iter()
            .copied()
            .zip(probs)
            .collect();
        Ok(Prediction {
            category,
            probabilities,
        })
    }

    /// Classify raw values
    ///
    /// The width must match the fitted feature count and the values must form
    /// a valid [`FeatureVector`].
    pub fn predict_values(&self, values: &[f64]) -> Result<Prediction, AnalysisError> {
        self.predict(&FeatureVector::from_slice(values)?)
    }

    /// Per-category probabilities only
    pub fn predict_probability(
        &self,
        features: &FeatureVector,
    ) -> Result<BTreeMap<Category, f64>, AnalysisError> {
        self.predict(features).map(|p| p.probabilities)
    }

    /// Validate and classify a request from the serving layer
    pub fn predict_request(&self, request: InferenceRequest) -> Result<Prediction, AnalysisError> {
        let features = FeatureVector::try_from(request)?;
        self.predict(&features)
    }

    /// Classify many vectors; fails on the first invalid one
    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<Prediction>, AnalysisError> {
        batch.iter().map(|f| self.predict(f)).collect()
    }

    /// Score the loaded artifacts against labeled records
    pub fn evaluate(&self, records: &[LabeledRecord]) -> Result<EvaluationReport, AnalysisError> {
        let mut predicted = Vec::with_capacity(records.len());
        for record in records {
            predicted.push(self.predict(&record.record.features()?)?.category);
        }
        let actual: Vec<Category> = records.iter().map(|r| r.category).collect();
        EvaluationReport::compute(&predicted, &actual)
    }
}

/// Process-wide model state, fixed at startup
///
/// A service that starts without artifacts stays `Unavailable` and answers
/// every prediction with `ModelUnavailable` instead of a guessed category.
#[derive(Debug, Clone)]
pub enum ServiceState {
    Ready(InferenceService),
    Unavailable { reason: String },
}

impl ServiceState {
    /// Load artifacts from a directory; never fails, never panics
    pub fn from_artifact_dir<P: AsRef<Path>>(dir: P) -> Self {
        Self::from_paths(&ArtifactPaths::in_dir(dir))
    }

    pub fn from_paths(paths: &ArtifactPaths) -> Self {
        match InferenceService::load(paths) {
            Ok(service) => ServiceState::Ready(service),
            Err(e) => {
                warn!(error = %e, "model artifacts unavailable; predictions disabled");
                ServiceState::Unavailable {
                    reason: e.to_string(),
                }
            }
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, ServiceState::Ready(_))
    }

    /// The loaded service, or `ModelUnavailable`
    pub fn service(&self) -> Result<&InferenceService, AnalysisError> {
        match self {
            ServiceState::Ready(service) => Ok(service),
            ServiceState::Unavailable { reason } => {
                Err(AnalysisError::ModelUnavailable(reason.clone()))
            }
        }
    }

    pub fn predict(&self, features: &FeatureVector) -> Result<Prediction, AnalysisError> {
        self.service()?.predict(features)
    }

    pub fn predict_probability(
        &self,
        features: &FeatureVector,
    ) -> Result<BTreeMap<Category, f64>, AnalysisError> {
        self.service()?.predict_probability(features)
    }
}
