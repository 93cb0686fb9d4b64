use std::collections::BTreeMap;

use serde::Serialize;

use crate::absorption_core::Category;
use crate::utils::AnalysisError;

/// Per-category row counts; every category is present, possibly with zero
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ClassDistribution {
    pub counts: BTreeMap<Category, usize>,
}

impl ClassDistribution {
    /// Count labels
    pub fn compute(labels: &[Category]) -> Self {
        let mut counts: BTreeMap<Category, usize> =
            Category::ALL.iter().map(|&c| (c, 0)).collect();
        for label in labels {
            *counts.entry(*label).or_insert(0) += 1;
        }
        Self { counts }
    }

    pub fn total(&self) -> usize {
        self.counts.values().sum()
    }

    pub fn get(&self, category: Category) -> usize {
        self.counts.get(&category).copied().unwrap_or(0)
    }

    /// Share of each category, in [0, 1]
    pub fn proportions(&self) -> BTreeMap<Category, f64> {
        let total = self.total();
        self.counts
            .iter()
            .map(|(&c, &n)| {
                let share = if total == 0 {
                    0.0
                } else {
                    n as f64 / total as f64
                };
                (c, share)
            })
            .collect()
    }
}

/// Classification quality of predictions against known labels
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    pub n_samples: usize,
    pub accuracy: f32,
    /// Mean F1 over the categories present in labels or predictions
    pub f1_score: f32,
    /// `confusion[actual][predicted]` counts
    pub confusion: BTreeMap<Category, BTreeMap<Category, usize>>,
}

impl EvaluationReport {
    /// Compare predicted categories with ground truth
    ///
    /// # Errors
    /// * `ValidationError` if the inputs are empty or differ in length
    pub fn compute(predicted: &[Category], actual: &[Category]) -> Result<Self, AnalysisError> {
        if predicted.is_empty() {
            return Err(AnalysisError::ValidationError(
                "cannot evaluate zero predictions".to_string(),
            ));
        }
        if predicted.len() != actual.len() {
            return Err(AnalysisError::ValidationError(format!(
                "predictions ({}) must match labels ({})",
                predicted.len(),
                actual.len()
            )));
        }

        let mut confusion: BTreeMap<Category, BTreeMap<Category, usize>> = Category::ALL
            .iter()
            .map(|&a| (a, Category::ALL.iter().map(|&p| (p, 0)).collect()))
            .collect();
        for (&p, &a) in predicted.iter().zip(actual) {
            if let Some(row) = confusion.get_mut(&a) {
                *row.entry(p).or_insert(0) += 1;
            }
        }

        let correct: usize = Category::ALL.iter().map(|c| confusion[c][c]).sum();
        let accuracy = correct as f32 / predicted.len() as f32;

        // Macro F1 over the categories that occur in either labels or predictions
        let mut f1_sum = 0.0f32;
        let mut n_scored = 0usize;
        for c in Category::ALL {
            let tp = confusion[&c][&c];
            let actual_c: usize = confusion[&c].values().sum();
            let predicted_c: usize = confusion.values().map(|row| row[&c]).sum();
            let denom = actual_c + predicted_c;
            if denom > 0 {
                f1_sum += 2.0 * tp as f32 / denom as f32;
                n_scored += 1;
            }
        }
        let f1_score = if n_scored == 0 {
            0.0
        } else {
            f1_sum / n_scored as f32
        };

        Ok(Self {
            n_samples: predicted.len(),
            accuracy,
            f1_score,
            confusion,
        })
    }
}
