use std::fmt;
use std::str::FromStr;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::utils::{clean_number, quarter_from_value, validate_quarter, AnalysisError};

/// Number of model inputs
pub const N_FEATURES: usize = 5;

/// Column names of the feature vector, in model input order
pub const FEATURE_NAMES: [&str; N_FEATURES] = [
    "AKUN",
    "ANGGARAN_SEMULA",
    "ANGGARAN_REVISI",
    "SISA_ANGGARAN",
    "TRIWULAN",
];

/// Position of the quarter in the feature vector
const QUARTER: usize = 4;

/// Ratio at or above which a line counts as high absorption
pub const HIGH_THRESHOLD: f64 = 80.0;
/// Ratio at or above which a line counts as medium absorption
pub const MEDIUM_THRESHOLD: f64 = 40.0;

/// Absorption category of a budget line
///
/// Variant order is the fitted class order (`Low < Medium < High`); argmax
/// ties resolve towards the lower variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(alias = "Rendah")]
    Low,
    #[serde(alias = "Sedang")]
    Medium,
    #[serde(alias = "Tinggi")]
    High,
}

impl Category {
    /// All categories in fitted class order
    pub const ALL: [Category; 3] = [Category::Low, Category::Medium, Category::High];

    /// Threshold a finite realization ratio (percent)
    ///
    /// `>= 80` is High, `>= 40` is Medium, everything else is Low.
    pub fn from_ratio(ratio: f64) -> Self {
        if ratio >= HIGH_THRESHOLD {
            Category::High
        } else if ratio >= MEDIUM_THRESHOLD {
            Category::Medium
        } else {
            Category::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Low => "Low",
            Category::Medium => "Medium",
            Category::High => "High",
        }
    }

    /// Label used by the source spreadsheets
    pub fn source_label(&self) -> &'static str {
        match self {
            Category::Low => "Rendah",
            Category::Medium => "Sedang",
            Category::High => "Tinggi",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "High" | "Tinggi" => Ok(Category::High),
            "Medium" | "Sedang" => Ok(Category::Medium),
            "Low" | "Rendah" => Ok(Category::Low),
            other => Err(AnalysisError::ValidationError(format!(
                "unknown category '{}'",
                other
            ))),
        }
    }
}

/// Net realized amount over revised budget, as a percentage
///
/// Returns `None` when the revised budget is zero or the result is not finite;
/// such lines carry no label.
pub fn realization_ratio(net_realized: f64, revised_budget: f64) -> Option<f64> {
    if revised_budget == 0.0 {
        return None;
    }
    let ratio = net_realized / revised_budget * 100.0;
    ratio.is_finite().then_some(ratio)
}

/// Derive the category for a line, or `None` if the ratio is undefined
pub fn derive_category(net_realized: f64, revised_budget: f64) -> Option<(f64, Category)> {
    realization_ratio(net_realized, revised_budget).map(|r| (r, Category::from_ratio(r)))
}

/// Model input for one budget line, in fixed order:
/// `[account_code, original_budget, revised_budget, remaining_budget, quarter]`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector([f64; N_FEATURES]);

impl FeatureVector {
    /// Build a vector; every value must be finite
    pub fn new(
        account_code: f64,
        original_budget: f64,
        revised_budget: f64,
        remaining_budget: f64,
        quarter: f64,
    ) -> Result<Self, AnalysisError> {
        Self::from_slice(&[
            account_code,
            original_budget,
            revised_budget,
            remaining_budget,
            quarter,
        ])
    }

    /// Build a vector from raw values
    ///
    /// Rejects the wrong width, missing values and a quarter outside 1-4.
    pub fn from_slice(values: &[f64]) -> Result<Self, AnalysisError> {
        let values: [f64; N_FEATURES] = values.try_into().map_err(|_| {
            AnalysisError::DimensionMismatch {
                expected: N_FEATURES,
                actual: values.len(),
            }
        })?;
        for (name, value) in FEATURE_NAMES.iter().zip(values) {
            if clean_number(value).is_none() {
                return Err(AnalysisError::ValidationError(format!(
                    "feature {} is missing or not finite",
                    name
                )));
            }
        }
        quarter_from_value(values[QUARTER])?;
        Ok(Self(values))
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn view(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(&self.0[..])
    }
}

/// A raw inference request as supplied by the serving layer
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InferenceRequest {
    pub account_code: f64,
    pub original_budget: f64,
    pub revised_budget: f64,
    pub remaining_budget: f64,
    pub quarter: u8,
}

impl TryFrom<InferenceRequest> for FeatureVector {
    type Error = AnalysisError;

    fn try_from(req: InferenceRequest) -> Result<Self, Self::Error> {
        let quarter = validate_quarter(req.quarter)?;
        FeatureVector::new(
            req.account_code,
            req.original_budget,
            req.revised_budget,
            req.remaining_budget,
            f64::from(quarter),
        )
    }
}

/// Stack feature vectors into a matrix (rows=samples, cols=features)
pub fn to_matrix(vectors: &[FeatureVector]) -> Array2<f64> {
    let mut matrix = Array2::zeros((vectors.len(), N_FEATURES));
    for (mut row, vector) in matrix.rows_mut().into_iter().zip(vectors) {
        row.assign(&vector.view());
    }
    matrix
}

/// Validate feature matrix dimensions and values
///
/// # Returns
/// * `Ok(())` if valid
/// * `Err(AnalysisError::ValidationError)` if invalid
pub fn validate_features(features: &Array2<f64>) -> Result<(), AnalysisError> {
    if features.nrows() == 0 {
        return Err(AnalysisError::ValidationError(
            "feature matrix cannot be empty".to_string(),
        ));
    }

    if features.ncols() == 0 {
        return Err(AnalysisError::ValidationError(
            "feature matrix must have at least one column".to_string(),
        ));
    }

    // Check for NaN or Inf values
    for value in features.iter() {
        if value.is_nan() || value.is_infinite() {
            return Err(AnalysisError::ValidationError(
                "feature matrix contains NaN or Inf values".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;

    #[test]
    fn test_category_thresholds() {
        assert_eq!(Category::from_ratio(100.0), Category::High);
        assert_eq!(Category::from_ratio(80.0), Category::High);
        assert_eq!(Category::from_ratio(79.999), Category::Medium);
        assert_eq!(Category::from_ratio(40.0), Category::Medium);
        assert_eq!(Category::from_ratio(39.999), Category::Low);
        assert_eq!(Category::from_ratio(0.0), Category::Low);
        assert_eq!(Category::from_ratio(-12.0), Category::Low);
        assert_eq!(Category::from_ratio(250.0), Category::High);
    }

    #[test]
    fn test_category_bands_have_no_gap() {
        // Sweep in 0.25% steps; each step lands in exactly one band
        let mut previous = Category::Low;
        for step in -40..=600 {
            let ratio = step as f64 * 0.25;
            let category = Category::from_ratio(ratio);
            assert!(category >= previous, "category decreased at {}", ratio);
            previous = category;
        }
    }

    #[test]
    fn test_realization_ratio() {
        let ratio = realization_ratio(850_000.0, 1_000_000.0).unwrap();
        assert!((ratio - 85.0).abs() < 1e-10);
        assert_eq!(realization_ratio(100.0, 0.0), None);
        assert_eq!(realization_ratio(0.0, 0.0), None);
    }

    #[test]
    fn test_derive_category() {
        assert_eq!(
            derive_category(400_000.0, 1_000_000.0),
            Some((40.0, Category::Medium))
        );
        assert_eq!(derive_category(1.0, 0.0), None);
    }

    #[test]
    fn test_category_parsing() {
        assert_eq!("Tinggi".parse::<Category>().unwrap(), Category::High);
        assert_eq!("Medium".parse::<Category>().unwrap(), Category::Medium);
        assert_eq!(" Rendah ".parse::<Category>().unwrap(), Category::Low);
        assert!("Extreme".parse::<Category>().is_err());
        assert_eq!(Category::High.to_string(), "High");
        assert_eq!(Category::Medium.source_label(), "Sedang");
    }

    #[test]
    fn test_category_serde_aliases() {
        let parsed: Category = serde_json::from_str("\"Sedang\"").unwrap();
        assert_eq!(parsed, Category::Medium);
        assert_eq!(serde_json::to_string(&Category::High).unwrap(), "\"High\"");
    }

    #[test]
    fn test_feature_vector_width() {
        let err = FeatureVector::from_slice(&[1.0, 2.0, 3.0, 4.0]).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::DimensionMismatch {
                expected: 5,
                actual: 4
            }
        );
        assert!(FeatureVector::from_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]).is_err());
        assert!(FeatureVector::new(1.0, f64::NAN, 3.0, 4.0, 1.0).is_err());
    }

    #[test]
    fn test_feature_vector_quarter_range() {
        assert!(FeatureVector::new(511129.0, 10.0, 10.0, 2.0, 9.0).is_err());
        assert!(FeatureVector::new(511129.0, 10.0, 10.0, 2.0, 2.5).is_err());
        assert!(FeatureVector::new(511129.0, 10.0, 10.0, 2.0, 0.0).is_err());
        assert!(FeatureVector::from_slice(&[511129.0, 10.0, 10.0, 2.0, 4.0]).is_ok());
    }

    #[test]
    fn test_request_conversion() {
        let req = InferenceRequest {
            account_code: 511129.0,
            original_budget: 1_000_000.0,
            revised_budget: 1_000_000.0,
            remaining_budget: 100_000.0,
            quarter: 4,
        };
        let vector = FeatureVector::try_from(req).unwrap();
        assert_eq!(
            vector.as_slice(),
            &[511129.0, 1_000_000.0, 1_000_000.0, 100_000.0, 4.0]
        );

        let bad = InferenceRequest { quarter: 0, ..req };
        assert!(FeatureVector::try_from(bad).is_err());
    }

    #[test]
    fn test_to_matrix() {
        let a = FeatureVector::new(1.0, 2.0, 3.0, 4.0, 1.0).unwrap();
        let b = FeatureVector::new(5.0, 6.0, 7.0, 8.0, 2.0).unwrap();
        let matrix = to_matrix(&[a, b]);
        assert_eq!(matrix.dim(), (2, N_FEATURES));
        assert_eq!(matrix[[1, 3]], 8.0);
    }

    #[test]
    fn test_validate_features_valid() {
        let features = arr2(&[[1.0, 2.0], [3.0, 4.0]]);
        assert!(validate_features(&features).is_ok());
    }

    #[test]
    fn test_validate_features_empty_rows() {
        let features = Array2::<f64>::zeros((0, 2));
        assert!(validate_features(&features).is_err());
    }

    #[test]
    fn test_validate_features_with_nan() {
        let features = arr2(&[[1.0, f64::NAN], [3.0, 4.0]]);
        let result = validate_features(&features);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("NaN"));
    }
}
