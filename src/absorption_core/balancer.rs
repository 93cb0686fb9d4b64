//! Synthetic minority oversampling
//!
//! Every class smaller than the largest one is topped up to the largest count
//! with points interpolated between a class member and one of its k nearest
//! same-class neighbors: `s = a + u * (b - a)`, `u ~ U[0, 1)`. Real rows are
//! never dropped or duplicated, and the majority class is passed through.

use std::collections::BTreeMap;

use ndarray::{Array2, ArrayView2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::feature::Category;
use super::knn::nearest_neighbors;
use crate::config::BalancerConfig;
use crate::utils::AnalysisError;

/// Neighbor count reduced because a class had too few members
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NeighborWarning {
    pub category: Category,
    pub requested_k: usize,
    pub effective_k: usize,
    pub class_count: usize,
}

/// Training set after oversampling
///
/// The first `n_original` rows are the input rows in input order; synthetic
/// rows follow, grouped by class in class order.
#[derive(Debug, Clone)]
pub struct BalancedSet {
    pub features: Array2<f64>,
    pub labels: Vec<Category>,
    pub n_original: usize,
    pub counts_before: BTreeMap<Category, usize>,
    pub counts_after: BTreeMap<Category, usize>,
    pub warnings: Vec<NeighborWarning>,
}

impl BalancedSet {
    pub fn n_synthetic(&self) -> usize {
        self.labels.len() - self.n_original
    }
}

/// Count rows per category (only categories that occur)
pub fn class_counts(labels: &[Category]) -> BTreeMap<Category, usize> {
    let mut counts = BTreeMap::new();
    for &label in labels {
        *counts.entry(label).or_insert(0) += 1;
    }
    counts
}

/// Oversampler with an explicit, seedable random source
#[derive(Debug, Clone)]
pub struct ClassBalancer {
    config: BalancerConfig,
}

impl ClassBalancer {
    pub fn new(config: BalancerConfig) -> Self {
        Self { config }
    }

    /// Balance using a generator seeded from the configuration
    pub fn balance(
        &self,
        features: ArrayView2<f64>,
        labels: &[Category],
    ) -> Result<BalancedSet, AnalysisError> {
        let mut rng = StdRng::seed_from_u64(self.config.seed);
        self.balance_with_rng(features, labels, &mut rng)
    }

    /// Balance using a caller-supplied random source
    ///
    /// # Errors
    /// * `ValidationError` if inputs are empty, lengths differ, or any of the
    ///   three categories has no rows at all
    pub fn balance_with_rng<R: Rng + ?Sized>(
        &self,
        features: ArrayView2<f64>,
        labels: &[Category],
        rng: &mut R,
    ) -> Result<BalancedSet, AnalysisError> {
        if features.nrows() == 0 {
            return Err(AnalysisError::ValidationError(
                "cannot balance an empty training set".to_string(),
            ));
        }
        if features.nrows() != labels.len() {
            return Err(AnalysisError::ValidationError(format!(
                "feature rows ({}) must match label count ({})",
                features.nrows(),
                labels.len()
            )));
        }

        let counts_before = class_counts(labels);
        for category in Category::ALL {
            if !counts_before.contains_key(&category) {
                return Err(AnalysisError::ValidationError(format!(
                    "class {} has no samples; it cannot be learned",
                    category
                )));
            }
        }
        let target = counts_before.values().copied().max().unwrap_or(0);

        let mut synthetic: Vec<f64> = Vec::new();
        let mut synthetic_labels: Vec<Category> = Vec::new();
        let mut warnings = Vec::new();

        for (&category, &count) in &counts_before {
            let n_new = target - count;
            if n_new == 0 {
                continue;
            }

            let members: Vec<usize> = labels
                .iter()
                .enumerate()
                .filter(|(_, &l)| l == category)
                .map(|(i, _)| i)
                .collect();

            let index = nearest_neighbors(features, &members, self.config.k_neighbors)?;
            if index.k < self.config.k_neighbors {
                warn!(
                    class = %category,
                    class_count = count,
                    requested_k = self.config.k_neighbors,
                    effective_k = index.k,
                    "too few samples for requested neighbor count, reducing k"
                );
                warnings.push(NeighborWarning {
                    category,
                    requested_k: self.config.k_neighbors,
                    effective_k: index.k,
                    class_count: count,
                });
            }

            for _ in 0..n_new {
                let pick = rng.gen_range(0..members.len());
                let a = features.row(members[pick]);
                // k == 0 only for a single-member class; interpolating with
                // itself reproduces the member
                let b = if index.k == 0 {
                    a
                } else {
                    let neighbor = index.neighbors[pick][rng.gen_range(0..index.k)];
                    features.row(neighbor)
                };
                let step: f64 = rng.gen();
                synthetic.extend(a.iter().zip(b.iter()).map(|(&x, &y)| x + step * (y - x)));
                synthetic_labels.push(category);
            }

            debug!(class = %category, generated = n_new, "synthesized minority samples");
        }

        let n_synth = synthetic_labels.len();
        let synthetic = Array2::from_shape_vec((n_synth, features.ncols()), synthetic)
            .map_err(|e| {
                AnalysisError::ModelError(format!("failed to shape synthetic rows: {}", e))
            })?;
        let balanced = ndarray::concatenate(Axis(0), &[features.view(), synthetic.view()])
            .map_err(|e| {
                AnalysisError::ModelError(format!("failed to append synthetic rows: {}", e))
            })?;

        let mut all_labels = labels.to_vec();
        all_labels.extend(synthetic_labels);
        let counts_after = class_counts(&all_labels);

        info!(
            original = labels.len(),
            synthetic = n_synth,
            target_per_class = target,
            "class balancing complete"
        );

        Ok(BalancedSet {
            features: balanced,
            labels: all_labels,
            n_original: labels.len(),
            counts_before,
            counts_after,
            warnings,
        })
    }
}
