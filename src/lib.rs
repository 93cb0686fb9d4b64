//! Budget Absorption - realization-category classifier for government budget lines
//!
//! This library cleans budget realization reports, labels each line as High,
//! Medium or Low absorption, trains a class-balanced bagged decision forest
//! and serves predictions from the persisted scaler and model artifacts.

pub mod absorption_core;
pub mod artifact;
pub mod config;
pub mod dataset;
pub mod engine;
pub mod stats;
pub mod training;
pub mod utils;

pub use absorption_core::{Category, FeatureVector, ForestModel, InferenceRequest};
pub use artifact::ArtifactPaths;
pub use config::TrainingConfig;
pub use dataset::{BudgetRecord, BudgetTable, LabeledRecord};
pub use engine::{InferenceService, Prediction, ServiceState};
pub use stats::{ClassDistribution, EvaluationReport};
pub use training::{TrainedArtifacts, TrainingPipeline, TrainingReport};
pub use utils::AnalysisError;

/// Result type used throughout the library
pub type Result<T> = anyhow::Result<T>;
