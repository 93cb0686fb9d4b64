use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::utils::AnalysisError;

/// Fitted per-column statistics of a standard scaler
///
/// `std` is the population standard deviation (ddof = 0). Columns with zero
/// variance store a standard deviation of exactly 1.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerState {
    pub mean: Vec<f64>,
    pub std: Vec<f64>,
}

impl ScalerState {
    /// Number of columns the state was fitted on
    pub fn n_features(&self) -> usize {
        self.mean.len()
    }

    /// Check the state is internally consistent (used after deserialization)
    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.mean.is_empty() {
            return Err(AnalysisError::ValidationError(
                "scaler state has no columns".to_string(),
            ));
        }
        if self.mean.len() != self.std.len() {
            return Err(AnalysisError::ValidationError(format!(
                "scaler state has {} means but {} deviations",
                self.mean.len(),
                self.std.len()
            )));
        }
        if self.std.iter().any(|s| !s.is_finite() || *s <= 0.0)
            || self.mean.iter().any(|m| !m.is_finite())
        {
            return Err(AnalysisError::ValidationError(
                "scaler state contains non-finite or non-positive values".to_string(),
            ));
        }
        Ok(())
    }
}

/// Standard scaling: (x - mean) / std -> zero mean, unit variance
///
/// The scaler is fitted once; `transform` on an unfitted scaler is an error and
/// never triggers an implicit fit.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    state: Option<ScalerState>,
}

impl StandardScaler {
    /// Create an unfitted scaler
    pub fn new() -> Self {
        Self { state: None }
    }

    /// Wrap previously fitted statistics
    pub fn from_state(state: ScalerState) -> Result<Self, AnalysisError> {
        state.validate()?;
        Ok(Self { state: Some(state) })
    }

    /// Fitted statistics, if any
    pub fn state(&self) -> Option<&ScalerState> {
        self.state.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    /// Compute per-column mean and population standard deviation
    ///
    /// # Arguments
    /// * `features` - Unscaled feature matrix (rows=samples, cols=features)
    ///
    /// # Note
    /// Constant columns (std == 0) get a std of 1.0, so they transform to
    /// `x - mean` rather than NaN.
    pub fn fit(&mut self, features: ArrayView2<f64>) -> Result<&ScalerState, AnalysisError> {
        if features.nrows() == 0 || features.ncols() == 0 {
            return Err(AnalysisError::ValidationError(
                "cannot fit scaler on an empty matrix".to_string(),
            ));
        }

        let mut mean = Vec::with_capacity(features.ncols());
        let mut std = Vec::with_capacity(features.ncols());
        for col in features.axis_iter(Axis(1)) {
            let col_mean = col.mean().unwrap_or(0.0);
            let col_std = col.std(0.0);
            mean.push(col_mean);
            std.push(if col_std.abs() < f64::EPSILON {
                1.0
            } else {
                col_std
            });
        }

        let state = ScalerState { mean, std };
        state.validate()?;
        Ok(self.state.insert(state))
    }

    fn fitted(&self) -> Result<&ScalerState, AnalysisError> {
        self.state.as_ref().ok_or_else(|| {
            AnalysisError::NotFitted("standard scaler must be fitted before transform".to_string())
        })
    }

    fn check_width(state: &ScalerState, width: usize) -> Result<(), AnalysisError> {
        if width != state.n_features() {
            return Err(AnalysisError::DimensionMismatch {
                expected: state.n_features(),
                actual: width,
            });
        }
        Ok(())
    }

    /// Scale every row of a matrix with the fitted statistics
    pub fn transform(&self, features: ArrayView2<f64>) -> Result<Array2<f64>, AnalysisError> {
        let state = self.fitted()?;
        Self::check_width(state, features.ncols())?;

        let mut scaled = features.to_owned();
        for (col_idx, mut col) in scaled.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (state.mean[col_idx], state.std[col_idx]);
            col.mapv_inplace(|x| (x - mean) / std);
        }
        Ok(scaled)
    }

    /// Scale a single feature vector
    pub fn transform_row(&self, row: ArrayView1<f64>) -> Result<Array1<f64>, AnalysisError> {
        let state = self.fitted()?;
        Self::check_width(state, row.len())?;

        Ok(row
            .iter()
            .zip(state.mean.iter().zip(&state.std))
            .map(|(&x, (&mean, &std))| (x - mean) / std)
            .collect())
    }

    /// Map scaled values back to original units: x * std + mean
    pub fn inverse_transform(
        &self,
        scaled: ArrayView2<f64>,
    ) -> Result<Array2<f64>, AnalysisError> {
        let state = self.fitted()?;
        Self::check_width(state, scaled.ncols())?;

        let mut original = scaled.to_owned();
        for (col_idx, mut col) in original.axis_iter_mut(Axis(1)).enumerate() {
            let (mean, std) = (state.mean[col_idx], state.std[col_idx]);
            col.mapv_inplace(|x| x * std + mean);
        }
        Ok(original)
    }
}
