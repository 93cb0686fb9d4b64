//! Training configuration
//!
//! Defaults reproduce the deployed model: 50 trees, depth 7, split at 10
//! samples, leaves of at least 5, five oversampling neighbors, seed 42.

use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::utils::AnalysisError;

/// Number of candidate features examined at each tree node
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// Every feature at every node
    #[default]
    All,
    /// `floor(sqrt(n_features))`, at least one
    Sqrt,
    /// A fixed count, capped at `n_features`
    Count(usize),
}

impl MaxFeatures {
    /// Resolve to a concrete count for a given feature width
    pub fn resolve(self, n_features: usize) -> usize {
        match self {
            MaxFeatures::All => n_features,
            MaxFeatures::Sqrt => ((n_features as f64).sqrt().floor() as usize).max(1),
            MaxFeatures::Count(n) => n.clamp(1, n_features.max(1)),
        }
    }
}

/// Synthetic minority oversampling settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Neighbors considered when interpolating a synthetic sample
    pub k_neighbors: usize,
    pub seed: u64,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            k_neighbors: 5,
            seed: 42,
        }
    }
}

/// Bagged decision forest hyperparameters
///
/// Stored inside the classifier artifact; not adjustable at inference time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestConfig {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    /// Draw a bootstrap sample per tree; `false` trains every tree on all rows
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestConfig {
    fn default() -> Self {
        Self {
            n_estimators: 50,
            max_depth: 7,
            min_samples_split: 10,
            min_samples_leaf: 5,
            max_features: MaxFeatures::All,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestConfig {
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.n_estimators == 0 {
            return Err(AnalysisError::ValidationError(
                "n_estimators must be > 0".to_string(),
            ));
        }
        if self.max_depth == 0 {
            return Err(AnalysisError::ValidationError(
                "max_depth must be > 0".to_string(),
            ));
        }
        if self.min_samples_split < 2 {
            return Err(AnalysisError::ValidationError(format!(
                "min_samples_split must be >= 2, got {}",
                self.min_samples_split
            )));
        }
        if self.min_samples_leaf == 0 {
            return Err(AnalysisError::ValidationError(
                "min_samples_leaf must be > 0".to_string(),
            ));
        }
        if let MaxFeatures::Count(0) = self.max_features {
            return Err(AnalysisError::ValidationError(
                "max_features count must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration of a training run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub balancer: BalancerConfig,
    pub forest: ForestConfig,
}

impl TrainingConfig {
    /// Load a JSON config file; absent keys fall back to defaults
    pub fn from_json_path<P: AsRef<Path>>(path: P) -> crate::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Use one seed for both the oversampler and the forest
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.balancer.seed = seed;
        self.forest.seed = seed;
        self
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.balancer.k_neighbors == 0 {
            return Err(AnalysisError::ValidationError(
                "k_neighbors must be > 0".to_string(),
            ));
        }
        self.forest.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_deployed_model() {
        let config = TrainingConfig::default();
        assert_eq!(config.forest.n_estimators, 50);
        assert_eq!(config.forest.max_depth, 7);
        assert_eq!(config.forest.min_samples_split, 10);
        assert_eq!(config.forest.min_samples_leaf, 5);
        assert_eq!(config.forest.max_features, MaxFeatures::All);
        assert_eq!(config.balancer.k_neighbors, 5);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_features_resolve() {
        assert_eq!(MaxFeatures::All.resolve(5), 5);
        assert_eq!(MaxFeatures::Sqrt.resolve(5), 2);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::Count(3).resolve(5), 3);
        assert_eq!(MaxFeatures::Count(9).resolve(5), 5);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: TrainingConfig =
            serde_json::from_str(r#"{"forest": {"n_estimators": 10, "max_features": "sqrt"}}"#)
                .unwrap();
        assert_eq!(config.forest.n_estimators, 10);
        assert_eq!(config.forest.max_features, MaxFeatures::Sqrt);
        assert_eq!(config.forest.max_depth, 7);
        assert_eq!(config.balancer, BalancerConfig::default());
    }

    #[test]
    fn test_max_features_count_json() {
        let config: ForestConfig =
            serde_json::from_str(r#"{"max_features": {"count": 3}}"#).unwrap();
        assert_eq!(config.max_features, MaxFeatures::Count(3));
    }

    #[test]
    fn test_with_seed() {
        let config = TrainingConfig::default().with_seed(7);
        assert_eq!(config.balancer.seed, 7);
        assert_eq!(config.forest.seed, 7);
    }

    #[test]
    fn test_invalid_config() {
        let mut config = TrainingConfig::default();
        config.forest.min_samples_split = 1;
        assert!(config.validate().is_err());

        let mut config = TrainingConfig::default();
        config.balancer.k_neighbors = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("train.json");
        std::fs::write(&path, r#"{"balancer": {"k_neighbors": 3}}"#).unwrap();
        let config = TrainingConfig::from_json_path(&path).unwrap();
        assert_eq!(config.balancer.k_neighbors, 3);
        assert_eq!(config.balancer.seed, 42);

        assert!(TrainingConfig::from_json_path(dir.path().join("missing.json")).is_err());
    }
}
