/// Utility modules for error handling, numeric coercion and scaling
pub mod error;
pub mod type_convert;
pub mod scaling;

// Re-export commonly used types
pub use error::AnalysisError;
pub use type_convert::{
    clean_number, clean_numeric, quarter_from_value, validate_probabilities, validate_quarter,
};
pub use scaling::{ScalerState, StandardScaler};
