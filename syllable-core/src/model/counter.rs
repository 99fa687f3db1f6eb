use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use super::dictionary::{PronunciationDictionary, normalize_word};
use super::encoder::CharacterEncoder;
use super::predictor::{ModelSlot, ModelStatus};
use super::stats::{RunningStats, StatsSnapshot};

/// Tier that produced a syllable count.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Source {
	Dictionary,
	Model,
}

/// Why a word could not be counted.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MissReason {
	/// The word holds characters the fallback model cannot encode.
	WordNotEncodable,
	/// The fallback model is still loading.
	ModelNotLoaded,
	/// No fallback model is configured.
	ModelNotAvailable,
	/// The fallback model failed on this word.
	PredictionFailed,
}

impl MissReason {
	pub fn as_str(&self) -> &'static str {
		match self {
			MissReason::WordNotEncodable => "word_not_encodable",
			MissReason::ModelNotLoaded => "model_not_loaded",
			MissReason::ModelNotAvailable => "model_not_available",
			MissReason::PredictionFailed => "prediction_failed",
		}
	}
}

impl fmt::Display for MissReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

/// Outcome of counting a single word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WordResult {
	Hit { count: u32, source: Source },
	Miss(MissReason),
}

impl WordResult {
	/// Syllable count, 0 on miss.
	pub fn syllables(&self) -> u32 {
		match self {
			WordResult::Hit { count, .. } => *count,
			WordResult::Miss(_) => 0,
		}
	}

	/// Tier that answered, if any.
	pub fn source(&self) -> Option<Source> {
		match self {
			WordResult::Hit { source, .. } => Some(*source),
			WordResult::Miss(_) => None,
		}
	}
}

/// A token of the input text together with its result.
///
/// Serialized as `{word, syllables, method}` on hit and
/// `{word, syllables: 0, error}` on miss.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordOutcome {
	pub word: String,
	pub result: WordResult,
}

impl Serialize for WordOutcome {
	fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
		let mut state = serializer.serialize_struct("WordOutcome", 3)?;
		state.serialize_field("word", &self.word)?;
		state.serialize_field("syllables", &self.result.syllables())?;
		match self.result {
			WordResult::Hit { source, .. } => state.serialize_field("method", &source)?,
			WordResult::Miss(reason) => state.serialize_field("error", &reason)?,
		}
		state.end()
	}
}

/// Result shape of a counting request.
///
/// A text made of exactly one token yields `Single`; any other token count,
/// zero included, yields `Multiple`.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(untagged)]
pub enum Counted<T> {
	Single(T),
	Multiple(Vec<T>),
}

impl<T> Counted<T> {
	fn from_vec(mut values: Vec<T>) -> Self {
		if values.len() == 1 {
			if let Some(value) = values.pop() {
				return Counted::Single(value);
			}
		}
		Counted::Multiple(values)
	}

	/// Applies `f` to every element, keeping the shape.
	pub fn map<U, F: FnMut(T) -> U>(self, mut f: F) -> Counted<U> {
		match self {
			Counted::Single(value) => Counted::Single(f(value)),
			Counted::Multiple(values) => Counted::Multiple(values.into_iter().map(f).collect()),
		}
	}

	/// Flattens into a vector, a single value becoming a one-element vector.
	pub fn into_vec(self) -> Vec<T> {
		match self {
			Counted::Single(value) => vec![value],
			Counted::Multiple(values) => values,
		}
	}

	pub fn len(&self) -> usize {
		match self {
			Counted::Single(_) => 1,
			Counted::Multiple(values) => values.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}
}

impl Counted<u32> {
	/// Sum over every word.
	pub fn total(&self) -> u32 {
		match self {
			Counted::Single(value) => *value,
			Counted::Multiple(values) => values.iter().sum(),
		}
	}
}

/// Lifecycle of a counter, driven by the model slot.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CounterState {
	/// The fallback model is still loading; dictionary hits are served.
	Initializing,
	/// The model slot is settled (ready, degraded or disabled).
	Ready,
}

/// Two-tier syllable counter.
///
/// # Responsibilities
/// - Dictionary first, fallback model on miss
/// - Per-word and per-text counting with the single/multiple shape
/// - Running statistics (single writer: the owner of `&mut self`)
#[derive(Debug)]
pub struct SyllableCounter {
	dictionary: Arc<PronunciationDictionary>,
	encoder: CharacterEncoder,
	model: ModelSlot,
	stats: RunningStats,
}

impl SyllableCounter {
	pub fn new(dictionary: Arc<PronunciationDictionary>, model: ModelSlot) -> Self {
		Self { dictionary, encoder: CharacterEncoder, model, stats: RunningStats::default() }
	}

	/// `Initializing` while the model loads, `Ready` once the slot is settled.
	pub fn state(&self) -> CounterState {
		match self.model.status() {
			ModelStatus::Loading => CounterState::Initializing,
			_ => CounterState::Ready,
		}
	}

	pub fn dictionary(&self) -> &PronunciationDictionary {
		&self.dictionary
	}

	/// Counts one word without touching the statistics.
	///
	/// # Behavior
	/// - Dictionary hit → `(count, Dictionary)`
	/// - Not encodable → `Miss(WordNotEncodable)`
	/// - Model loading → `Miss(ModelNotLoaded)`, never waits
	/// - No model → `Miss(ModelNotAvailable)`
	/// - Model error → `Miss(PredictionFailed)`
	pub fn count_word(&self, word: &str) -> WordResult {
		if let Some(count) = self.dictionary.lookup(word) {
			return WordResult::Hit { count, source: Source::Dictionary };
		}

		let normalized = normalize_word(word);
		let Some(encoded) = self.encoder.encode(&normalized) else {
			return WordResult::Miss(MissReason::WordNotEncodable);
		};

		match self.model.current() {
			(ModelStatus::Loading, _) => WordResult::Miss(MissReason::ModelNotLoaded),
			(_, None) => WordResult::Miss(MissReason::ModelNotAvailable),
			(_, Some(predictor)) => match predictor.predict(&encoded) {
				Ok(count) => WordResult::Hit { count, source: Source::Model },
				Err(_) => WordResult::Miss(MissReason::PredictionFailed),
			},
		}
	}

	/// Counts every whitespace-separated token of `text`.
	///
	/// Records one request plus one entry per word in the statistics.
	pub fn count_detailed(&mut self, text: &str) -> Counted<WordOutcome> {
		let start = Instant::now();

		let outcomes: Vec<WordOutcome> = text
			.split_whitespace()
			.map(|word| WordOutcome { word: word.to_owned(), result: self.count_word(word) })
			.collect();
		for outcome in &outcomes {
			self.stats.record_word(&outcome.result);
		}

		self.stats.record_request(start.elapsed());
		debug!("counted {} words in {:?}", outcomes.len(), start.elapsed());
		Counted::from_vec(outcomes)
	}

	/// Syllable counts of `text`, misses counting as 0.
	pub fn count(&mut self, text: &str) -> Counted<u32> {
		self.count_detailed(text).map(|outcome| outcome.result.syllables())
	}

	/// Sum of `count` over the text.
	pub fn total_syllables(&mut self, text: &str) -> u32 {
		self.count(text).total()
	}

	pub fn stats(&self) -> StatsSnapshot {
		StatsSnapshot {
			counters: self.stats.clone(),
			state: self.state(),
			model_status: self.model.status(),
			dictionary_words: self.dictionary.len(),
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::error::PredictionError;
	use crate::model::encoder::EncodedWord;
	use crate::model::predictor::{Estimator, FallbackPredictor};

	struct FailingEstimator;

	impl Estimator for FailingEstimator {
		fn name(&self) -> &str {
			"failing"
		}

		fn estimate(&self, _input: &EncodedWord) -> Result<f32, PredictionError> {
			Err(PredictionError::Estimator("unavailable".to_owned()))
		}
	}

	fn dictionary() -> Arc<PronunciationDictionary> {
		Arc::new(PronunciationDictionary::from_iter([
			"hello HH AH0 L OW1",
			"world W ER1 L D",
			"syllable S IH1 L AH0 B AH0 L",
			"cat K AE1 T",
			"cat(2) K AE1 T AH0",
		]))
	}

	fn counter(model: ModelSlot) -> SyllableCounter {
		SyllableCounter::new(dictionary(), model)
	}

	fn ready_counter() -> SyllableCounter {
		counter(ModelSlot::ready(FallbackPredictor::new(Arc::new(
			crate::model::predictor::VowelNucleusEstimator,
		))))
	}

	#[test]
	fn single_word_hit_is_tagged_dictionary() {
		let mut counter = ready_counter();
		let detailed = counter.count_detailed("hello");
		assert_eq!(
			detailed,
			Counted::Single(WordOutcome {
				word: "hello".to_owned(),
				result: WordResult::Hit { count: 2, source: Source::Dictionary }
			})
		);
	}

	#[test]
	fn single_and_multiple_shapes() {
		let mut counter = ready_counter();
		assert_eq!(counter.count("hello"), Counted::Single(2));
		assert_eq!(counter.count("hello world"), Counted::Multiple(vec![2, 1]));
		assert_eq!(counter.count(""), Counted::Multiple(vec![]));
		assert_eq!(counter.count(" \t\n "), Counted::Multiple(vec![]));
	}

	#[test]
	fn total_is_sum_of_counts() {
		let mut counter = ready_counter();
		let text = "Hello, world! syllable cat";
		let counts = counter.count(text).into_vec();
		assert_eq!(counter.total_syllables(text), counts.iter().sum::<u32>());
		assert_eq!(counter.total_syllables("syllable"), 3);
		assert_eq!(counter.total_syllables(""), 0);
	}

	#[test]
	fn unknown_word_goes_to_model() {
		let counter = ready_counter();
		assert_eq!(counter.count_word("zorblax"), WordResult::Hit { count: 2, source: Source::Model });
		assert_eq!(counter.count_word("Zorblax!"), WordResult::Hit { count: 2, source: Source::Model });
	}

	#[test]
	fn unencodable_word_is_a_miss() {
		let counter = ready_counter();
		assert_eq!(counter.count_word("r2d2"), WordResult::Miss(MissReason::WordNotEncodable));
		assert_eq!(counter.count_word("..."), WordResult::Miss(MissReason::WordNotEncodable));
	}

	#[test]
	fn loading_model_does_not_block_dictionary_hits() {
		let slot = ModelSlot::loading();
		let mut counter = counter(slot.clone());
		assert_eq!(counter.state(), CounterState::Initializing);
		assert_eq!(counter.count("hello"), Counted::Single(2));
		assert_eq!(counter.count_word("zorblax"), WordResult::Miss(MissReason::ModelNotLoaded));

		assert_eq!(counter.stats().state, CounterState::Initializing);

		slot.install(FallbackPredictor::stub());
		assert_eq!(counter.state(), CounterState::Ready);
		assert_eq!(counter.count_word("zorblax"), WordResult::Hit { count: 1, source: Source::Model });
	}

	#[test]
	fn disabled_model_is_not_available() {
		let counter = counter(ModelSlot::disabled());
		assert_eq!(counter.state(), CounterState::Ready);
		assert_eq!(counter.count_word("zorblax"), WordResult::Miss(MissReason::ModelNotAvailable));
	}

	#[test]
	fn failing_model_reports_prediction_failed() {
		let counter = counter(ModelSlot::ready(FallbackPredictor::new(Arc::new(FailingEstimator))));
		assert_eq!(counter.count_word("zorblax"), WordResult::Miss(MissReason::PredictionFailed));
	}

	#[test]
	fn stats_count_requests_and_words() {
		let mut counter = counter(ModelSlot::disabled());
		counter.count("hello");
		counter.count("zorblax");
		counter.count("hello world r2d2");
		counter.count("");

		let stats = counter.stats();
		assert_eq!(stats.counters.total_requests, 4);
		assert_eq!(stats.counters.dictionary_hits, 3);
		assert_eq!(stats.counters.model_predictions, 0);
		assert_eq!(stats.counters.errors, 2);
		assert_eq!(stats.state, CounterState::Ready);
		assert_eq!(stats.model_status, ModelStatus::Disabled);
		assert_eq!(stats.dictionary_words, 4);
	}

	#[test]
	fn stats_invariant_over_single_word_requests() {
		let mut counter = ready_counter();
		let words = ["hello", "zorblax", "cat", "r2d2", "world", "quixotry"];
		for word in words {
			counter.count(word);
		}
		let stats = counter.stats().counters;
		assert_eq!(stats.total_requests, words.len() as u64);
		assert_eq!(stats.dictionary_hits, 3);
		assert_eq!(stats.model_predictions, 2);
		assert_eq!(stats.errors, 1);
		assert_eq!(stats.words(), words.len() as u64);
	}

	#[test]
	fn outcome_serialization() {
		let hit = WordOutcome { word: "hello".to_owned(), result: WordResult::Hit { count: 2, source: Source::Dictionary } };
		let miss = WordOutcome { word: "r2d2".to_owned(), result: WordResult::Miss(MissReason::WordNotEncodable) };
		assert_eq!(
			serde_json::to_value(&hit).unwrap(),
			serde_json::json!({"word": "hello", "syllables": 2, "method": "dictionary"})
		);
		assert_eq!(
			serde_json::to_value(&miss).unwrap(),
			serde_json::json!({"word": "r2d2", "syllables": 0, "error": "word_not_encodable"})
		);
	}

	#[test]
	fn counted_serializes_untagged() {
		assert_eq!(serde_json::to_value(Counted::Single(2u32)).unwrap(), serde_json::json!(2));
		assert_eq!(serde_json::to_value(Counted::Multiple(vec![2u32, 1])).unwrap(), serde_json::json!([2, 1]));
	}
}
