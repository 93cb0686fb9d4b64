//! Training orchestration
//!
//! ```text
//! raw table -> clean -> label (drop undefined ratios) -> features
//!   -> fit scaler (unscaled matrix) -> transform -> balance classes
//!   -> fit forest -> { ScalerState, ForestModel }
//! ```
//!
//! All five features are standardized, the account code included, so the
//! artifacts stay interchangeable with previously trained ones.

use serde::Serialize;
use tracing::info;

use crate::absorption_core::feature::{to_matrix, validate_features};
use crate::absorption_core::{BalancedSet, Category, ClassBalancer, ForestModel, NeighborWarning};
use crate::artifact::{save_model, save_scaler, ArtifactPaths};
use crate::config::TrainingConfig;
use crate::dataset::{BudgetTable, CleanedTable, LabeledRecord};
use crate::stats::{ClassDistribution, EvaluationReport};
use crate::utils::{AnalysisError, ScalerState, StandardScaler};

/// Summary of a training run
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrainingReport {
    pub rows_read: usize,
    pub dropped_missing: usize,
    pub dropped_undefined_ratio: usize,
    pub n_training: usize,
    pub before_balancing: ClassDistribution,
    pub after_balancing: ClassDistribution,
    pub n_synthetic: usize,
    pub neighbor_warnings: Vec<NeighborWarning>,
    /// Metrics of the fitted model on the unbalanced training rows
    pub resubstitution: EvaluationReport,
}

/// The two artifacts of a training run plus its report
#[derive(Debug, Clone)]
pub struct TrainedArtifacts {
    pub scaler: ScalerState,
    pub model: ForestModel,
    pub report: TrainingReport,
}

impl TrainedArtifacts {
    /// Write both artifacts
    pub fn save(&self, paths: &ArtifactPaths) -> Result<(), AnalysisError> {
        save_scaler(&paths.scaler, &self.scaler)?;
        save_model(&paths.model, &self.model)
    }
}

/// Runs the full training sequence once per call
#[derive(Debug, Clone, Default)]
pub struct TrainingPipeline {
    config: TrainingConfig,
}

impl TrainingPipeline {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Clean a raw table and train on the surviving rows
    pub fn fit_table(&self, table: &BudgetTable) -> Result<TrainedArtifacts, AnalysisError> {
        let cleaned = table.clean();
        self.fit_cleaned(&cleaned)
    }

    /// Train on an already cleaned table, keeping its drop counters in the report
    pub fn fit_cleaned(&self, cleaned: &CleanedTable) -> Result<TrainedArtifacts, AnalysisError> {
        let mut artifacts = self.fit_records(&cleaned.records)?;
        artifacts.report.rows_read = cleaned.rows_read;
        artifacts.report.dropped_missing = cleaned.dropped_missing;
        artifacts.report.dropped_undefined_ratio = cleaned.dropped_undefined_ratio;
        Ok(artifacts)
    }

    /// Train on labeled records
    ///
    /// # Errors
    /// * `ValidationError` if there are no records, the config is invalid, or
    ///   a category has no rows
    pub fn fit_records(
        &self,
        records: &[LabeledRecord],
    ) -> Result<TrainedArtifacts, AnalysisError> {
        self.config.validate()?;
        if records.is_empty() {
            return Err(AnalysisError::ValidationError(
                "no usable training rows after cleaning".to_string(),
            ));
        }

        let vectors = records
            .iter()
            .map(|r| r.record.features())
            .collect::<Result<Vec<_>, _>>()?;
        let labels: Vec<Category> = records.iter().map(|r| r.category).collect();
        let unscaled = to_matrix(&vectors);
        validate_features(&unscaled)?;

        let mut scaler = StandardScaler::new();
        let scaler_state = scaler.fit(unscaled.view())?.clone();
        let scaled = scaler.transform(unscaled.view())?;

        let balanced: BalancedSet = ClassBalancer::new(self.config.balancer.clone())
            .balance(scaled.view(), &labels)?;

        let model = ForestModel::fit(
            &self.config.forest,
            balanced.features.view(),
            &balanced.labels,
        )?;

        let predicted = model.predict_batch(scaled.view())?;
        let resubstitution = EvaluationReport::compute(&predicted, &labels)?;

        let report = TrainingReport {
            rows_read: records.len(),
            dropped_missing: 0,
            dropped_undefined_ratio: 0,
            n_training: records.len(),
            before_balancing: ClassDistribution::compute(&labels),
            after_balancing: ClassDistribution::compute(&balanced.labels),
            n_synthetic: balanced.n_synthetic(),
            neighbor_warnings: balanced.warnings,
            resubstitution,
        };

        info!(
            n_training = report.n_training,
            n_synthetic = report.n_synthetic,
            accuracy = report.resubstitution.accuracy,
            "training complete"
        );

        Ok(TrainedArtifacts {
            scaler: scaler_state,
            model,
            report,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::training_table;
    use super::*;
    use crate::absorption_core::Category;
    use crate::config::ForestConfig;

    fn fast_config() -> TrainingConfig {
        TrainingConfig {
            forest: ForestConfig {
                n_estimators: 15,
                ..ForestConfig::default()
            },
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn test_fixture_labels() {
        let cleaned = training_table().clean();
        let dist = ClassDistribution::compute(
            &cleaned.records.iter().map(|r| r.category).collect::<Vec<_>>(),
        );
        assert_eq!(dist.get(Category::High), 30);
        assert_eq!(dist.get(Category::Medium), 14);
        assert_eq!(dist.get(Category::Low), 8);
    }

    #[test]
    fn test_fit_table_balances_and_reports() {
        let artifacts = TrainingPipeline::new(fast_config())
            .fit_table(&training_table())
            .unwrap();
        let report = &artifacts.report;

        assert_eq!(report.n_training, 52);
        assert_eq!(report.after_balancing.get(Category::High), 30);
        assert_eq!(report.after_balancing.get(Category::Medium), 30);
        assert_eq!(report.after_balancing.get(Category::Low), 30);
        assert_eq!(report.n_synthetic, 38);
        assert!(report.neighbor_warnings.is_empty());
        assert!(report.resubstitution.accuracy > 0.9);

        assert_eq!(artifacts.model.n_estimators(), 15);
        assert_eq!(artifacts.scaler.n_features(), 5);
    }

    #[test]
    fn test_training_is_idempotent() {
        let pipeline = TrainingPipeline::new(fast_config());
        let a = pipeline.fit_table(&training_table()).unwrap();
        let b = pipeline.fit_table(&training_table()).unwrap();
        assert_eq!(a.scaler, b.scaler);
        assert_eq!(a.model, b.model);
    }

    #[test]
    fn test_drop_counters_carried() {
        let mut table = training_table();
        table.records.push(crate::dataset::RawRecord::from_fields([
            "511129", "Zero", "100", "0", "0", "0", "0", "0", "0", "1",
        ]));
        table.records.push(crate::dataset::RawRecord::from_fields([
            "", "Subtotal", "100", "100", "",
        ]));
        let artifacts = TrainingPipeline::new(fast_config())
            .fit_table(&table)
            .unwrap();
        assert_eq!(artifacts.report.rows_read, 54);
        assert_eq!(artifacts.report.dropped_missing, 1);
        assert_eq!(artifacts.report.dropped_undefined_ratio, 1);
        assert_eq!(artifacts.report.n_training, 52);
    }

    #[test]
    fn test_missing_class_fails() {
        let cleaned = training_table().clean();
        let without_low: Vec<_> = cleaned
            .records
            .into_iter()
            .filter(|r| r.category != Category::Low)
            .collect();
        let err = TrainingPipeline::new(fast_config())
            .fit_records(&without_low)
            .unwrap_err();
        assert!(matches!(err, AnalysisError::ValidationError(_)));
    }

    #[test]
    fn test_empty_input_fails() {
        let err = TrainingPipeline::default().fit_records(&[]).unwrap_err();
        assert!(err.to_string().contains("no usable training rows"));
    }

    #[test]
    fn test_save_writes_both_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let artifacts = TrainingPipeline::new(fast_config())
            .fit_table(&training_table())
            .unwrap();
        artifacts.save(&paths).unwrap();
        assert!(paths.scaler.exists());
        assert!(paths.model.exists());
    }
}
