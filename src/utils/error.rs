use thiserror::Error;

/// Custom error type for cleaning, training and inference operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnalysisError {
    /// Validation errors (e.g., empty dataset, quarter out of range, absent class)
    #[error("ValidationError: {0}")]
    ValidationError(String),
    /// Model training errors
    #[error("ModelError: {0}")]
    ModelError(String),
    /// A scaler or model was used before `fit`
    #[error("NotFitted: {0}")]
    NotFitted(String),
    /// Input width differs from the fitted feature count
    #[error("DimensionMismatch: expected {expected} features, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },
    /// Trained artifacts are not available to the caller
    #[error("ModelUnavailable: {0}")]
    ModelUnavailable(String),
    /// An artifact exists but cannot be read back
    #[error("ArtifactError: {0}")]
    ArtifactError(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AnalysisError::ValidationError("test error".to_string());
        assert_eq!(err.to_string(), "ValidationError: test error");

        let err = AnalysisError::ModelUnavailable("scaler.json missing".to_string());
        assert_eq!(err.to_string(), "ModelUnavailable: scaler.json missing");

        let err = AnalysisError::DimensionMismatch {
            expected: 5,
            actual: 4,
        };
        assert_eq!(
            err.to_string(),
            "DimensionMismatch: expected 5 features, got 4"
        );
    }

    #[test]
    fn test_error_is_send_sync() {
        fn assert_send<T: Send>() {}
        fn assert_sync<T: Sync>() {}
        assert_send::<AnalysisError>();
        assert_sync::<AnalysisError>();
    }
}
