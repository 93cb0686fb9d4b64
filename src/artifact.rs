//! Persisted scaler and classifier artifacts
//!
//! Each artifact is a JSON envelope:
//!
//! ```json
//! {
//!   "artifact_type": "random_forest",
//!   "format_version": 1,
//!   "payload": { ... }
//! }
//! ```
//!
//! Floats are written in shortest round-trip form and parsed back exactly,
//! so a reloaded scaler/model reproduces pre-save outputs bit for bit.

use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::absorption_core::{ForestModel, N_FEATURES};
use crate::utils::{AnalysisError, ScalerState};

pub const FORMAT_VERSION: u32 = 1;
pub const SCALER_TYPE: &str = "standard_scaler";
pub const MODEL_TYPE: &str = "random_forest";

/// Default file names inside an artifact directory
pub const SCALER_FILE: &str = "scaler.json";
pub const MODEL_FILE: &str = "model.json";

#[derive(Debug, Serialize, Deserialize)]
struct Envelope<T> {
    artifact_type: String,
    format_version: u32,
    payload: T,
}

/// Locations of the two artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub scaler: PathBuf,
    pub model: PathBuf,
}

impl ArtifactPaths {
    /// Default file names under one directory
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let dir = dir.as_ref();
        Self {
            scaler: dir.join(SCALER_FILE),
            model: dir.join(MODEL_FILE),
        }
    }
}

fn write_envelope<T: Serialize>(
    path: &Path,
    artifact_type: &str,
    payload: &T,
) -> Result<(), AnalysisError> {
    let envelope = Envelope {
        artifact_type: artifact_type.to_string(),
        format_version: FORMAT_VERSION,
        payload,
    };
    let json = serde_json::to_string(&envelope).map_err(|e| {
        AnalysisError::ArtifactError(format!("failed to serialize {}: {}", artifact_type, e))
    })?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| {
            AnalysisError::ArtifactError(format!("failed to create {}: {}", parent.display(), e))
        })?;
    }
    std::fs::write(path, json).map_err(|e| {
        AnalysisError::ArtifactError(format!("failed to write {}: {}", path.display(), e))
    })?;
    info!(path = %path.display(), artifact_type, "saved artifact");
    Ok(())
}

fn read_envelope<T: DeserializeOwned>(
    path: &Path,
    artifact_type: &str,
) -> Result<T, AnalysisError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(AnalysisError::ModelUnavailable(format!(
                "{} artifact not found at {}; run training first",
                artifact_type,
                path.display()
            )));
        }
        Err(e) => {
            return Err(AnalysisError::ArtifactError(format!(
                "failed to read {}: {}",
                path.display(),
                e
            )));
        }
    };

    // Header first; the payload is only decoded once the type is known
    let envelope: Envelope<serde_json::Value> = serde_json::from_str(&content).map_err(|e| {
        AnalysisError::ArtifactError(format!("JSON parse error in {}: {}", path.display(), e))
    })?;

    if envelope.artifact_type != artifact_type {
        return Err(AnalysisError::ArtifactError(format!(
            "Expected artifact_type '{}', got '{}'",
            artifact_type, envelope.artifact_type
        )));
    }
    if envelope.format_version != FORMAT_VERSION {
        return Err(AnalysisError::ArtifactError(format!(
            "unsupported format_version {} (expected {})",
            envelope.format_version, FORMAT_VERSION
        )));
    }

    let payload = serde_json::from_value(envelope.payload).map_err(|e| {
        AnalysisError::ArtifactError(format!(
            "invalid {} payload in {}: {}",
            artifact_type,
            path.display(),
            e
        ))
    })?;
    info!(path = %path.display(), artifact_type, "loaded artifact");
    Ok(payload)
}

pub fn save_scaler(path: &Path, state: &ScalerState) -> Result<(), AnalysisError> {
    write_envelope(path, SCALER_TYPE, state)
}

pub fn save_model(path: &Path, model: &ForestModel) -> Result<(), AnalysisError> {
    write_envelope(path, MODEL_TYPE, model)
}

/// Load and validate a scaler artifact
///
/// # Errors
/// * `ModelUnavailable` if the file does not exist
/// * `ArtifactError` if it cannot be parsed or fails validation
pub fn load_scaler(path: &Path) -> Result<ScalerState, AnalysisError> {
    let state: ScalerState = read_envelope(path, SCALER_TYPE)?;
    state
        .validate()
        .map_err(|e| AnalysisError::ArtifactError(format!("{}: {}", path.display(), e)))?;
    if state.n_features() != N_FEATURES {
        return Err(AnalysisError::ArtifactError(format!(
            "Expected {} scaler columns, got {}",
            N_FEATURES,
            state.n_features()
        )));
    }
    Ok(state)
}

/// Load and validate a classifier artifact
///
/// # Errors
/// * `ModelUnavailable` if the file does not exist
/// * `ArtifactError` if it cannot be parsed or fails validation
pub fn load_model(path: &Path) -> Result<ForestModel, AnalysisError> {
    let model: ForestModel = read_envelope(path, MODEL_TYPE)?;
    model
        .validate()
        .map_err(|e| AnalysisError::ArtifactError(format!("{}: {}", path.display(), e)))?;
    if model.n_features() != N_FEATURES {
        return Err(AnalysisError::ArtifactError(format!(
            "Expected {} features, got {}",
            N_FEATURES,
            model.n_features()
        )));
    }
    Ok(model)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn state() -> ScalerState {
        ScalerState {
            mean: vec![515_000.123, 1_234_567.891, 1_300_000.0, 250_000.5, 2.5],
            std: vec![4_000.0, 800_000.333, 750_000.1, 1.0, 1.118_033_988_749_895],
        }
    }

    #[test]
    fn test_scaler_round_trip_exact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        save_scaler(&paths.scaler, &state()).unwrap();
        let loaded = load_scaler(&paths.scaler).unwrap();
        assert_eq!(loaded, state());
    }

    #[test]
    fn test_missing_artifact_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        assert!(matches!(
            load_scaler(&paths.scaler),
            Err(AnalysisError::ModelUnavailable(_))
        ));
        assert!(matches!(
            load_model(&paths.model),
            Err(AnalysisError::ModelUnavailable(_))
        ));
    }

    #[test]
    fn test_wrong_artifact_type() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        // A scaler written where the model is expected
        save_scaler(&paths.model, &state()).unwrap();
        let err = load_model(&paths.model).unwrap_err();
        assert!(matches!(err, AnalysisError::ArtifactError(_)));
        assert!(err.to_string().contains("random_forest"));
        assert!(err.to_string().contains("standard_scaler"));
    }

    #[test]
    fn test_unsupported_format_version() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let json = serde_json::json!({
            "artifact_type": SCALER_TYPE,
            "format_version": 99,
            "payload": {},
        });
        std::fs::write(&paths.scaler, json.to_string()).unwrap();
        let err = load_scaler(&paths.scaler).unwrap_err();
        assert!(err.to_string().contains("format_version 99"));
    }

    #[test]
    fn test_corrupt_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        std::fs::write(&paths.scaler, "{not json").unwrap();
        assert!(matches!(
            load_scaler(&paths.scaler),
            Err(AnalysisError::ArtifactError(_))
        ));
    }

    #[test]
    fn test_scaler_width_checked() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path());
        let narrow = ScalerState {
            mean: vec![0.0, 1.0],
            std: vec![1.0, 1.0],
        };
        save_scaler(&paths.scaler, &narrow).unwrap();
        assert!(load_scaler(&paths.scaler).is_err());
    }

    #[test]
    fn test_save_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let paths = ArtifactPaths::in_dir(dir.path().join("nested/artifacts"));
        save_scaler(&paths.scaler, &state()).unwrap();
        assert!(paths.scaler.exists());
    }
}
