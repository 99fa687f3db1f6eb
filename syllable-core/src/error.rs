//! Error types for every fallible operation of the library.

use thiserror::Error;

/// Errors raised while loading the pronunciation dictionary.
#[derive(Debug, Error)]
pub enum DictionaryError {
	/// The corpus file could not be read.
	#[error("failed to read dictionary corpus: {0}")]
	Io(#[from] std::io::Error),
	/// The binary cache could not be encoded or decoded.
	#[error("dictionary cache codec error: {0}")]
	Cache(#[from] postcard::Error),
}

/// Errors raised while loading a model artifact.
#[derive(Debug, Error)]
pub enum ModelError {
	/// The weights file could not be read.
	#[error("failed to read model artifact: {0}")]
	Io(#[from] std::io::Error),
	/// The weights file is not valid JSON for the expected layout.
	#[error("failed to parse model artifact: {0}")]
	Json(#[from] serde_json::Error),
	/// The artifact was trained for a different encoding.
	#[error("incompatible model artifact: {0}")]
	Incompatible(String),
}

/// Failure of a single fallback inference.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PredictionError {
	/// The estimator itself reported a failure.
	#[error("estimator failed: {0}")]
	Estimator(String),
	/// The estimator returned NaN or an infinite value.
	#[error("estimator returned a non-finite value: {0}")]
	NonFinite(f32),
}

/// Request-level failures of the counting service.
#[derive(Debug, Error, PartialEq)]
pub enum ServiceError {
	/// No reply arrived before the per-call deadline.
	#[error("request timed out after {0} ms")]
	Timeout(u128),
	/// The counter actor is gone.
	#[error("counter service is not running")]
	Unavailable,
}

/// Errors that can occur when loading settings.
#[derive(Debug, Error)]
pub enum SettingsError {
	/// Failed to read the settings file from disk.
	#[error("failed to read settings file: {0}")]
	Io(#[from] std::io::Error),
	/// Failed to parse JSON in the settings file.
	#[error("failed to parse settings JSON: {0}")]
	Json(#[from] serde_json::Error),
	/// A settings value was invalid (e.g., out of range).
	#[error("invalid settings value: {0}")]
	InvalidValue(String),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn dictionary_io_error_display() {
		let err = DictionaryError::Io(std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"));
		assert!(err.to_string().contains("no such file"));
	}

	#[test]
	fn model_json_error_from_conversion() {
		let json_err = serde_json::from_str::<serde_json::Value>("{bad}").unwrap_err();
		let err: ModelError = json_err.into();
		assert!(matches!(err, ModelError::Json(_)));
	}

	#[test]
	fn timeout_display_carries_duration() {
		assert_eq!(ServiceError::Timeout(10_000).to_string(), "request timed out after 10000 ms");
	}

	#[test]
	fn invalid_value_display() {
		let err = SettingsError::InvalidValue("port out of range".to_string());
		assert_eq!(err.to_string(), "invalid settings value: port out of range");
	}
}
