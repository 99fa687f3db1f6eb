use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::encoder::{ALPHABET, ALPHABET_SIZE, EncodedWord, MAX_LENGTH};
use crate::error::{ModelError, PredictionError};

/// Value returned by the stub installed when no usable model exists.
pub const STUB_SYLLABLES: f32 = 1.0;

/// Opaque scalar-regression model over an encoded word.
///
/// Implementations return the raw (unrounded) syllable estimate.
/// Any trained network can be plugged in behind this trait.
pub trait Estimator: Send + Sync {
	/// Short name used in logs and statistics.
	fn name(&self) -> &str;

	/// Raw syllable estimate for a single encoded word.
	fn estimate(&self, input: &EncodedWord) -> Result<f32, PredictionError>;
}

/// Always predicts the same value.
///
/// Installed when the model artifact is missing or unusable so that
/// the service keeps answering.
#[derive(Debug, Clone, Copy)]
pub struct ConstantEstimator {
	value: f32,
}

impl ConstantEstimator {
	pub fn new(value: f32) -> Self {
		Self { value }
	}
}

impl Estimator for ConstantEstimator {
	fn name(&self) -> &str {
		"constant"
	}

	fn estimate(&self, _input: &EncodedWord) -> Result<f32, PredictionError> {
		Ok(self.value)
	}
}

/// Character-level estimator counting vowel nuclei of the decoded word.
///
/// - Each run of vowels (`y` included, except word-initially) is one nucleus
/// - A final silent `e` is dropped, unless it closes a consonant + `le`
/// - At least one nucleus is reported
#[derive(Debug, Clone, Copy, Default)]
pub struct VowelNucleusEstimator;

impl VowelNucleusEstimator {
	fn is_vowel(c: char, position: usize) -> bool {
		matches!(c, 'a' | 'e' | 'i' | 'o' | 'u') || (c == 'y' && position > 0)
	}

	fn nuclei(word: &[char]) -> usize {
		let mut count = 0;
		let mut previous_vowel = false;
		for (i, c) in word.iter().enumerate() {
			let vowel = Self::is_vowel(*c, i);
			if vowel && !previous_vowel {
				count += 1;
			}
			previous_vowel = vowel;
		}

		let len = word.len();
		if count > 1 && len >= 2 && word[len - 1] == 'e' && !Self::is_vowel(word[len - 2], len - 2) {
			let consonant_le = len >= 3 && word[len - 2] == 'l' && !Self::is_vowel(word[len - 3], len - 3);
			if !consonant_le {
				count -= 1;
			}
		}
		count.max(1)
	}
}

impl Estimator for VowelNucleusEstimator {
	fn name(&self) -> &str {
		"vowel-nucleus"
	}

	fn estimate(&self, input: &EncodedWord) -> Result<f32, PredictionError> {
		let word: Vec<char> = input.decode().chars().collect();
		if word.is_empty() {
			return Err(PredictionError::Estimator("empty input".to_owned()));
		}
		Ok(Self::nuclei(&word) as f32)
	}
}

/// Character configuration stored with the model weights.
///
/// `chars` may be serialized either as one string or as a list.
#[derive(Deserialize, Debug, Clone)]
pub struct CharConfig {
	chars: CharList,
	pub maxlen: usize,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(untagged)]
enum CharList {
	Joined(String),
	List(Vec<String>),
}

impl CharConfig {
	/// Characters in one-hot column order.
	pub fn chars(&self) -> Vec<char> {
		match &self.chars {
			CharList::Joined(s) => s.chars().collect(),
			CharList::List(list) => list.iter().flat_map(|s| s.chars()).collect(),
		}
	}
}

/// Input/output shapes recorded at export time (batch dimension removed).
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ModelConfig {
	#[serde(default)]
	pub input_shape: Vec<Option<usize>>,
	#[serde(default)]
	pub output_shape: Vec<Option<usize>>,
}

/// Weights of one exported layer.
#[derive(Deserialize, Debug, Clone)]
pub struct LayerWeights {
	#[serde(rename = "type")]
	pub kind: String,
	#[serde(default)]
	pub shapes: Vec<Vec<usize>>,
	#[serde(default)]
	pub units: Option<usize>,
}

impl LayerWeights {
	/// Number of scalars held by the layer.
	pub fn parameter_count(&self) -> usize {
		self.shapes.iter().map(|shape| shape.iter().product::<usize>()).sum()
	}
}

/// Exported model artifact: character configuration plus per-layer weights.
///
/// The nested weight arrays are not kept; only the layer layout is.
#[derive(Deserialize, Debug, Clone)]
pub struct ModelArtifact {
	pub char_config: CharConfig,
	#[serde(default)]
	pub model_config: ModelConfig,
	#[serde(default)]
	pub weights: BTreeMap<String, LayerWeights>,
}

impl ModelArtifact {
	/// Reads and validates a JSON weights file.
	///
	/// # Errors
	/// - `ModelError::Io` if the file cannot be read
	/// - `ModelError::Json` if the layout does not match
	/// - `ModelError::Incompatible` if the encoding differs from `CharacterEncoder`
	pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, ModelError> {
		let content = std::fs::read_to_string(filepath)?;
		let artifact: Self = serde_json::from_str(&content)?;
		artifact.validate()?;
		Ok(artifact)
	}

	/// Checks the artifact against the encoder's alphabet and maximum length.
	pub fn validate(&self) -> Result<(), ModelError> {
		if self.char_config.chars() != ALPHABET {
			return Err(ModelError::Incompatible(format!(
				"alphabet mismatch: expected {} characters '{}', got '{}'",
				ALPHABET_SIZE,
				ALPHABET.iter().collect::<String>(),
				self.char_config.chars().iter().collect::<String>()
			)));
		}
		if self.char_config.maxlen != MAX_LENGTH {
			return Err(ModelError::Incompatible(format!(
				"max length mismatch: expected {MAX_LENGTH}, got {}",
				self.char_config.maxlen
			)));
		}
		let input_shape = &self.model_config.input_shape;
		if !input_shape.is_empty() && input_shape[..] != [Some(MAX_LENGTH), Some(ALPHABET_SIZE)] {
			return Err(ModelError::Incompatible(format!("unexpected input shape {input_shape:?}")));
		}
		Ok(())
	}

	/// Number of layers carrying weights.
	pub fn layer_count(&self) -> usize {
		self.weights.len()
	}

	/// Total number of scalars over every layer.
	pub fn parameter_count(&self) -> usize {
		self.weights.values().map(LayerWeights::parameter_count).sum()
	}
}

/// Adapter turning a raw estimator output into a syllable count.
///
/// - Rounds to the nearest integer
/// - Clamps to a minimum of 1
/// - Reports failures and non-finite outputs as `PredictionError`
#[derive(Clone)]
pub struct FallbackPredictor {
	estimator: Arc<dyn Estimator>,
}

impl fmt::Debug for FallbackPredictor {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FallbackPredictor").field("estimator", &self.estimator.name()).finish()
	}
}

impl FallbackPredictor {
	pub fn new(estimator: Arc<dyn Estimator>) -> Self {
		Self { estimator }
	}

	/// Predictor always answering `STUB_SYLLABLES`.
	pub fn stub() -> Self {
		Self::new(Arc::new(ConstantEstimator::new(STUB_SYLLABLES)))
	}

	/// Builds the predictor for a weights file.
	///
	/// The artifact is validated and described in the logs; inference runs
	/// on `VowelNucleusEstimator` since weights are not bound to a network.
	pub fn from_artifact<P: AsRef<Path>>(filepath: P) -> Result<Self, ModelError> {
		let artifact = ModelArtifact::load(&filepath)?;
		info!(
			"model artifact {}: {} layers, {} parameters",
			filepath.as_ref().display(),
			artifact.layer_count(),
			artifact.parameter_count()
		);
		Ok(Self::new(Arc::new(VowelNucleusEstimator)))
	}

	/// Name of the underlying estimator.
	pub fn name(&self) -> &str {
		self.estimator.name()
	}

	/// Predicts the syllable count of an encoded word.
	pub fn predict(&self, encoded: &EncodedWord) -> Result<u32, PredictionError> {
		let raw = self.estimator.estimate(encoded).and_then(|value| {
			if value.is_finite() { Ok(value) } else { Err(PredictionError::NonFinite(value)) }
		});
		match raw {
			Ok(value) => Ok(value.round().max(1.0) as u32),
			Err(e) => {
				warn!("{} prediction failed for '{}': {e}", self.name(), encoded.decode());
				Err(e)
			}
		}
	}
}

/// Where the fallback model comes from.
#[derive(Clone)]
pub enum ModelSource {
	/// No model configured: fallback words are reported as unavailable.
	Disabled,
	/// JSON weights file, loaded in the background.
	Artifact(PathBuf),
	/// Caller-provided estimator, ready immediately.
	Estimator(Arc<dyn Estimator>),
}

/// Public view of the model lifecycle.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
	/// Load still in flight.
	Loading,
	/// A usable model is installed.
	Ready,
	/// Load failed, the stub is answering.
	Degraded,
	/// No model configured.
	Disabled,
}

#[derive(Debug)]
enum ModelState {
	Loading,
	Ready(FallbackPredictor),
	Degraded(FallbackPredictor),
	Disabled,
}

impl ModelState {
	fn status(&self) -> ModelStatus {
		match self {
			ModelState::Loading => ModelStatus::Loading,
			ModelState::Ready(_) => ModelStatus::Ready,
			ModelState::Degraded(_) => ModelStatus::Degraded,
			ModelState::Disabled => ModelStatus::Disabled,
		}
	}
}

#[derive(Debug)]
struct SlotInner {
	state: Mutex<ModelState>,
	settled: Condvar,
}

/// Shared, synchronized cell holding the current fallback model.
///
/// Written once by the loader, read by the counter on every fallback.
/// Waiters are woken whenever the state changes.
#[derive(Debug, Clone)]
pub struct ModelSlot {
	inner: Arc<SlotInner>,
}

impl ModelSlot {
	fn with_state(state: ModelState) -> Self {
		Self { inner: Arc::new(SlotInner { state: Mutex::new(state), settled: Condvar::new() }) }
	}

	/// Slot whose model is still being loaded.
	pub fn loading() -> Self {
		Self::with_state(ModelState::Loading)
	}

	/// Slot without any model.
	pub fn disabled() -> Self {
		Self::with_state(ModelState::Disabled)
	}

	/// Slot with a usable model already installed.
	pub fn ready(predictor: FallbackPredictor) -> Self {
		Self::with_state(ModelState::Ready(predictor))
	}

	/// Installs a usable model.
	pub fn install(&self, predictor: FallbackPredictor) {
		self.set(ModelState::Ready(predictor));
	}

	/// Installs the stub after a failed load.
	pub fn degrade(&self) {
		self.set(ModelState::Degraded(FallbackPredictor::stub()));
	}

	fn set(&self, state: ModelState) {
		*self.inner.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
		self.inner.settled.notify_all();
	}

	/// Current status, plus the predictor when one is installed.
	pub fn current(&self) -> (ModelStatus, Option<FallbackPredictor>) {
		let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
		let predictor = match &*state {
			ModelState::Ready(p) | ModelState::Degraded(p) => Some(p.clone()),
			ModelState::Loading | ModelState::Disabled => None,
		};
		(state.status(), predictor)
	}

	/// Blocks until the slot leaves `Loading`, at most `timeout`.
	///
	/// Returns the status at wake-up, still `Loading` if the deadline passed.
	pub fn wait_settled(&self, timeout: Duration) -> ModelStatus {
		let state = self.inner.state.lock().unwrap_or_else(PoisonError::into_inner);
		let (state, _) = self
			.inner
			.settled
			.wait_timeout_while(state, timeout, |state| matches!(state, ModelState::Loading))
			.unwrap_or_else(PoisonError::into_inner);
		state.status()
	}

	/// Current status only.
	pub fn status(&self) -> ModelStatus {
		self.inner.state.lock().unwrap_or_else(PoisonError::into_inner).status()
	}

	/// Creates a slot for `source` and starts loading it.
	///
	/// # Behavior
	/// - `Disabled` and `Estimator` are resolved immediately.
	/// - `Artifact` is loaded on a background thread; the slot stays in
	///   `Loading` until the thread installs the model or the stub.
	///
	/// Returns the loader thread handle when one was spawned.
	pub fn spawn_load(source: ModelSource) -> (Self, Option<JoinHandle<()>>) {
		match source {
			ModelSource::Disabled => (Self::disabled(), None),
			ModelSource::Estimator(estimator) => (Self::ready(FallbackPredictor::new(estimator)), None),
			ModelSource::Artifact(path) => {
				let slot = Self::loading();
				let loader_slot = slot.clone();
				let loader_path = path.clone();
				let spawned = thread::Builder::new()
					.name("model-loader".to_owned())
					.spawn(move || loader_slot.load_artifact(&loader_path));
				match spawned {
					Ok(handle) => (slot, Some(handle)),
					Err(e) => {
						warn!("failed to spawn model loader, loading inline: {e}");
						slot.load_artifact(&path);
						(slot, None)
					}
				}
			}
		}
	}

	fn load_artifact(&self, path: &Path) {
		match FallbackPredictor::from_artifact(path) {
			Ok(predictor) => {
				info!("fallback model ready ({})", predictor.name());
				self.install(predictor);
			}
			Err(e) => {
				warn!("fallback model unavailable, using constant stub: {e}");
				self.degrade();
			}
		}
	}
}
