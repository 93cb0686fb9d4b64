use super::error::AnalysisError;

/// Coerce a raw textual amount into a number
///
/// Thousands separators (`,`) and surrounding whitespace are stripped before
/// parsing. Anything that does not parse to a finite number is reported as
/// missing (`None`) instead of an error.
///
/// # Examples
/// * `"1,250,000"` -> `Some(1250000.0)`
/// * `"  42.5 "` -> `Some(42.5)`
/// * `"-"`, `""`, `"NaN"` -> `None`
pub fn clean_numeric(raw: &str) -> Option<f64> {
    let stripped: String = raw.trim().chars().filter(|&c| c != ',').collect();
    if stripped.is_empty() {
        return None;
    }
    stripped.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Treat non-finite numeric input the same way as unparsable text
pub fn clean_number(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

/// Validate a quarter number is an integer in [1, 4]
///
/// # Returns
/// * `Ok(quarter)` if valid
/// * `Err(AnalysisError::ValidationError)` if out of range
pub fn validate_quarter(quarter: u8) -> Result<u8, AnalysisError> {
    if !(1..=4).contains(&quarter) {
        return Err(AnalysisError::ValidationError(format!(
            "quarter must be 1-4, got {}",
            quarter
        )));
    }
    Ok(quarter)
}

/// Validate a numeric quarter (as carried in feature vectors and source rows)
///
/// # Returns
/// * `Ok(quarter)` if the value is a whole number in [1, 4]
/// * `Err(AnalysisError::ValidationError)` otherwise
pub fn quarter_from_value(value: f64) -> Result<u8, AnalysisError> {
    if value.fract() != 0.0 || !(1.0..=4.0).contains(&value) {
        return Err(AnalysisError::ValidationError(format!(
            "quarter must be a whole number 1-4, got {}",
            value
        )));
    }
    validate_quarter(value as u8)
}

/// Validate a class-probability vector: every entry in [0, 1], total 1.0 ± 1e-6
pub fn validate_probabilities(probs: &[f64]) -> Result<(), AnalysisError> {
    if probs.iter().any(|p| !(0.0..=1.0).contains(p)) {
        return Err(AnalysisError::ModelError(format!(
            "probability outside [0, 1]: {:?}",
            probs
        )));
    }
    let total: f64 = probs.iter().sum();
    if (total - 1.0).abs() > 1e-6 {
        return Err(AnalysisError::ModelError(format!(
            "probabilities sum to {}, expected 1.0",
            total
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_numeric_thousands_separators() {
        assert_eq!(clean_numeric("1,250,000"), Some(1_250_000.0));
        assert_eq!(clean_numeric("  42.5 "), Some(42.5));
        assert_eq!(clean_numeric("-3,000"), Some(-3000.0));
        assert_eq!(clean_numeric("511129"), Some(511_129.0));
    }

    #[test]
    fn test_clean_numeric_missing() {
        assert_eq!(clean_numeric(""), None);
        assert_eq!(clean_numeric("   "), None);
        assert_eq!(clean_numeric("-"), None);
        assert_eq!(clean_numeric("Rp 1.000"), None);
        assert_eq!(clean_numeric("NaN"), None);
        assert_eq!(clean_numeric("inf"), None);
    }

    #[test]
    fn test_clean_number() {
        assert_eq!(clean_number(3.5), Some(3.5));
        assert_eq!(clean_number(f64::NAN), None);
        assert_eq!(clean_number(f64::NEG_INFINITY), None);
    }

    #[test]
    fn test_validate_quarter() {
        for q in 1..=4 {
            assert_eq!(validate_quarter(q), Ok(q));
        }
        assert!(validate_quarter(0).is_err());
        assert!(validate_quarter(5).is_err());
    }

    #[test]
    fn test_quarter_from_value() {
        assert_eq!(quarter_from_value(1.0), Ok(1));
        assert_eq!(quarter_from_value(4.0), Ok(4));
        assert!(quarter_from_value(2.5).is_err());
        assert!(quarter_from_value(7.0).is_err());
        assert!(quarter_from_value(0.0).is_err());
        assert!(quarter_from_value(-1.0).is_err());
        assert!(quarter_from_value(f64::NAN).is_err());
    }

    #[test]
    fn test_validate_quarter_error_message() {
        let err = validate_quarter(7).unwrap_err();
        assert_eq!(err.to_string(), "ValidationError: quarter must be 1-4, got 7");
    }

    #[test]
    fn test_validate_probabilities() {
        assert!(validate_probabilities(&[0.2, 0.3, 0.5]).is_ok());
        assert!(validate_probabilities(&[1.0, 0.0, 0.0]).is_ok());
        assert!(validate_probabilities(&[0.5, 0.6, -0.1]).is_err());
        assert!(validate_probabilities(&[0.2, 0.2, 0.2]).is_err());
    }
}
