//! Bagged decision forest classifier
//!
//! # Training
//!
//! 1. Draw one seed per tree from the forest seed (fixed order)
//! 2. Per tree: bootstrap `n` row indices with replacement, grow a Gini tree
//! 3. Trees are independent, so they may be grown on a rayon pool; tree `i`
//!    depends only on seed `i`, never on scheduling
//!
//! # Prediction
//!
//! 1. Traverse each tree to get leaf probabilities
//! 2. Average probabilities across all trees
//! 3. Predicted class = argmax, ties resolved towards the lower class index

use std::collections::BTreeMap;

use ndarray::{ArrayView1, ArrayView2};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

use super::feature::Category;
use super::tree::{DecisionTree, TreeParams};
use crate::config::ForestConfig;
use crate::utils::AnalysisError;

/// Fitted forest: trees, class order and the hyperparameters used
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestModel {
    config: ForestConfig,
    n_features: usize,
    /// Fitted class order; tree leaf distributions are indexed by it
    classes: Vec<Category>,
    trees: Vec<DecisionTree>,
}

/// Per-tree seeds, drawn in tree order from the forest seed
fn tree_seeds(seed: u64, n_estimators: usize) -> Vec<u64> {
    let mut seeder = StdRng::seed_from_u64(seed);
    (0..n_estimators).map(|_| seeder.gen()).collect()
}

/// Grow one tree from its own seed: bootstrap draw, then node feature sampling
fn grow_tree(
    seed: u64,
    features: ArrayView2<f64>,
    labels: &[usize],
    n_classes: usize,
    params: TreeParams,
    bootstrap: bool,
) -> Result<DecisionTree, AnalysisError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let n_rows = features.nrows();
    let rows: Vec<usize> = if bootstrap {
        (0..n_rows).map(|_| rng.gen_range(0..n_rows)).collect()
    } else {
        (0..n_rows).collect()
    };
    DecisionTree::fit(features, labels, n_classes, rows, params, &mut rng)
}

impl ForestModel {
    /// Fit the forest on a (balanced, scaled) training set
    ///
    /// # Errors
    /// * `ValidationError` for empty input, mismatched lengths, NaN/Inf values
    ///   or an invalid configuration
    pub fn fit(
        config: &ForestConfig,
        features: ArrayView2<f64>,
        labels: &[Category],
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(AnalysisError::ValidationError(
                "empty feature matrix".to_string(),
            ));
        }
        if features.nrows() != labels.len() {
            return Err(AnalysisError::ValidationError(format!(
                "feature rows ({}) must match label count ({})",
                features.nrows(),
                labels.len()
            )));
        }
        if features.iter().any(|v| !v.is_finite()) {
            return Err(AnalysisError::ValidationError(
                "feature matrix contains NaN or Inf values".to_string(),
            ));
        }

        let mut classes: Vec<Category> = labels.to_vec();
        classes.sort_unstable();
        classes.dedup();
        let class_index: BTreeMap<Category, usize> =
            classes.iter().enumerate().map(|(i, &c)| (c, i)).collect();
        let encoded: Vec<usize> = labels.iter().map(|l| class_index[l]).collect();

        let n_rows = features.nrows();
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features: config.max_features.resolve(features.ncols()),
        };

        let tree_seeds = tree_seeds(config.seed, config.n_estimators);
        let grow = |&seed: &u64| {
            grow_tree(
                seed,
                features,
                &encoded,
                classes.len(),
                params,
                config.bootstrap,
            )
        };

        #[cfg(feature = "parallel")]
        let trees = tree_seeds
            .par_iter()
            .map(grow)
            .collect::<Result<Vec<_>, _>>()?;
        #[cfg(not(feature = "parallel"))]
        let trees = tree_seeds
            .iter()
            .map(grow)
            .collect::<Result<Vec<_>, _>>()?;

        let total_leaves: usize = trees.iter().map(DecisionTree::n_leaves).sum();
        debug!(
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            total_leaves, "grew trees"
        );
        info!(
            n_estimators = trees.len(),
            n_samples = n_rows,
            n_features = features.ncols(),
            classes = ?classes,
            "random forest fitted"
        );

        Ok(Self {
            config: config.clone(),
            n_features: features.ncols(),
            classes,
            trees,
        })
    }

    pub fn config(&self) -> &ForestConfig {
        &self.config
    }

    /// Number of features expected
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Fitted class order
    pub fn classes(&self) -> &[Category] {
        &self.classes
    }

    /// Number of trees in the ensemble
    pub fn n_estimators(&self) -> usize {
        self.trees.len()
    }

    /// Mean of the per-tree leaf distributions, in fitted class order
    ///
    /// # Errors
    /// * `DimensionMismatch` if the vector width differs from the fitted width
    pub fn predict_proba(&self, features: ArrayView1<f64>) -> Result<Vec<f64>, AnalysisError> {
        if features.len() != self.n_features {
            return Err(AnalysisError::DimensionMismatch {
                expected: self.n_features,
                actual: features.len(),
            });
        }
        if self.trees.is_empty() {
            return Err(AnalysisError::NotFitted("forest has no trees".to_string()));
        }

        // Sum probabilities from all trees
        let mut sum = vec![0.0; self.classes.len()];
        for tree in &self.trees {
            for (acc, p) in sum.iter_mut().zip(tree.predict_proba(features)) {
                *acc += p;
            }
        }

        // Average
        let n = self.trees.len() as f64;
        Ok(sum.into_iter().map(|s| s / n).collect())
    }

    /// Predicted class and its per-class probabilities
    pub fn predict(
        &self,
        features: ArrayView1<f64>,
    ) -> Result<(Category, Vec<f64>), AnalysisError> {
        let probs = self.predict_proba(features)?;
        let best = argmax(&probs);
        Ok((self.classes[best], probs))
    }

    /// Predict every row of a matrix
    pub fn predict_batch(&self, features: ArrayView2<f64>) -> Result<Vec<Category>, AnalysisError> {
        features
            .rows()
            .into_iter()
            .map(|row| self.predict(row).map(|(category, _)| category))
            .collect()
    }

    /// Structural check for models read back from disk
    pub fn validate(&self) -> Result<(), AnalysisError> {
        self.config.validate()?;
        if self.trees.is_empty() {
            return Err(AnalysisError::ValidationError(
                "random forest has no trees".to_string(),
            ));
        }
        if self.trees.len() != self.config.n_estimators {
            return Err(AnalysisError::ValidationError(format!(
                "n_estimators ({}) doesn't match trees count ({})",
                self.config.n_estimators,
                self.trees.len()
            )));
        }
        if self.classes.is_empty() || self.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AnalysisError::ValidationError(
                "class list must be non-empty, sorted and unique".to_string(),
            ));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(self.n_features, self.classes.len())
                .map_err(|e| AnalysisError::ValidationError(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }
}

/// Index of the largest value; the first one wins on ties
pub fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
