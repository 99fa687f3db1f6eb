//! Settings loading with deep merge and environment variable overrides.
//!
//! Loading flow:
//! 1. Start with compiled [`Settings::default()`]
//! 2. If a settings file is given, deep-merge its values over defaults
//! 3. Apply `SYLLABLE_*` environment variable overrides (highest priority)
//!
//! Command-line flags, when a binary has them, are applied by the binary
//! on top of the result.

use std::path::{Path, PathBuf};
use std::time::Duration;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SettingsError;
use crate::model::predictor::ModelSource;

/// Dictionary corpus location and caching.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct DictionarySettings {
	pub path: PathBuf,
	/// Keep a binary copy next to the corpus for faster start-up.
	pub cache: bool,
}

impl Default for DictionarySettings {
	fn default() -> Self {
		Self { path: PathBuf::from("data/cmudict.dict"), cache: true }
	}
}

/// Fallback model artifact.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct ModelSettings {
	pub enabled: bool,
	pub path: PathBuf,
}

impl Default for ModelSettings {
	fn default() -> Self {
		Self { enabled: true, path: PathBuf::from("data/syllable_model_weights.json") }
	}
}

/// HTTP server.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct WebSettings {
	pub enabled: bool,
	pub host: String,
	pub port: u16,
}

impl Default for WebSettings {
	fn default() -> Self {
		Self { enabled: true, host: "127.0.0.1".to_owned(), port: 4000 }
	}
}

/// Every tunable of the service.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(default)]
pub struct Settings {
	pub dictionary: DictionarySettings,
	pub model: ModelSettings,
	pub web: WebSettings,
	/// Per-call deadline of the counting service.
	pub request_timeout_ms: u64,
}

impl Default for Settings {
	fn default() -> Self {
		Self {
			dictionary: DictionarySettings::default(),
			model: ModelSettings::default(),
			web: WebSettings::default(),
			request_timeout_ms: 10_000,
		}
	}
}

impl Settings {
	/// Loads settings from an optional JSON file and the process environment.
	///
	/// # Errors
	/// - The file was given but cannot be read or parsed
	/// - A resulting value is out of range
	pub fn load(path: Option<&Path>) -> Result<Self, SettingsError> {
		Self::load_with_env(path, |key| std::env::var(key).ok())
	}

	/// Same as `load`, reading variables through `env`.
	pub fn load_with_env<F>(path: Option<&Path>, env: F) -> Result<Self, SettingsError>
	where
		F: Fn(&str) -> Option<String>,
	{
		let defaults = serde_json::to_value(Self::default())?;

		let merged = match path {
			Some(path) => {
				debug!("loading settings from {}", path.display());
				let content = std::fs::read_to_string(path)?;
				let user: Value = serde_json::from_str(&content)?;
				deep_merge(defaults, user)
			}
			None => defaults,
		};

		let mut settings: Self = serde_json::from_value(merged)?;
		settings.apply_env_overrides(env);
		settings.validate()?;
		Ok(settings)
	}

	/// Apply environment variable overrides.
	///
	/// Invalid values are logged and ignored (fall back to file/default).
	pub fn apply_env_overrides<F>(&mut self, env: F)
	where
		F: Fn(&str) -> Option<String>,
	{
		if let Some(v) = read_string(&env, "SYLLABLE_DICTIONARY") {
			self.dictionary.path = PathBuf::from(v);
		}
		if let Some(v) = read_bool(&env, "SYLLABLE_DICTIONARY_CACHE") {
			self.dictionary.cache = v;
		}
		if let Some(v) = read_string(&env, "SYLLABLE_MODEL") {
			self.model.path = PathBuf::from(v);
		}
		if let Some(v) = read_bool(&env, "SYLLABLE_MODEL_ENABLED") {
			self.model.enabled = v;
		}
		if let Some(v) = read_bool(&env, "SYLLABLE_WEB_ENABLED") {
			self.web.enabled = v;
		}
		if let Some(v) = read_string(&env, "SYLLABLE_HOST") {
			self.web.host = v;
		}
		if let Some(v) = read_parsed::<u16, _>(&env, "SYLLABLE_PORT") {
			self.web.port = v;
		}
		if let Some(v) = read_parsed::<u64, _>(&env, "SYLLABLE_TIMEOUT_MS") {
			self.request_timeout_ms = v;
		}
	}

	/// Rejects values no component can work with.
	pub fn validate(&self) -> Result<(), SettingsError> {
		if self.web.port == 0 {
			return Err(SettingsError::InvalidValue("web.port must be between 1 and 65535".to_owned()));
		}
		if self.request_timeout_ms == 0 {
			return Err(SettingsError::InvalidValue("request_timeout_ms must be positive".to_owned()));
		}
		Ok(())
	}

	pub fn request_timeout(&self) -> Duration {
		Duration::from_millis(self.request_timeout_ms)
	}

	/// Model source described by these settings.
	pub fn model_source(&self) -> ModelSource {
		if self.model.enabled {
			ModelSource::Artifact(self.model.path.clone())
		} else {
			ModelSource::Disabled
		}
	}
}

/// Recursive deep merge of two JSON values.
///
/// - Objects are merged recursively (source overrides target per-key)
/// - Arrays and primitives are replaced entirely by source
/// - Null values in source are skipped (preserving target)
pub fn deep_merge(target: Value, source: Value) -> Value {
	match (target, source) {
		(Value::Object(mut target_map), Value::Object(source_map)) => {
			for (key, source_val) in source_map {
				if source_val.is_null() {
					continue;
				}
				let merged = match target_map.remove(&key) {
					Some(target_val) => deep_merge(target_val, source_val),
					None => source_val,
				};
				target_map.insert(key, merged);
			}
			Value::Object(target_map)
		}
		(_, source) => source,
	}
}

fn read_string<F: Fn(&str) -> Option<String>>(env: &F, key: &str) -> Option<String> {
	env(key).map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
}

fn read_bool<F: Fn(&str) -> Option<String>>(env: &F, key: &str) -> Option<bool> {
	let raw = read_string(env, key)?;
	match raw.to_ascii_lowercase().as_str() {
		"true" | "1" | "yes" | "on" => Some(true),
		"false" | "0" | "no" | "off" => Some(false),
		_ => {
			warn!("ignoring {key}={raw}: expected a boolean");
			None
		}
	}
}

fn read_parsed<T: std::str::FromStr, F: Fn(&str) -> Option<String>>(env: &F, key: &str) -> Option<T> {
	let raw = read_string(env, key)?;
	match raw.parse() {
		Ok(v) => Some(v),
		Err(_) => {
			warn!("ignoring {key}={raw}: not a valid number");
			None
		}
	}
}
