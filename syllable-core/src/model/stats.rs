use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::counter::{CounterState, Source, WordResult};
use super::predictor::ModelStatus;

/// Performance counters of one `SyllableCounter`.
///
/// # Invariants
/// - `total_requests` grows by one per counting request, whatever its word count
/// - `dictionary_hits + model_predictions + errors` equals the number of words counted
/// - `average_response_time_ms` is a streaming mean over `total_requests`
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct RunningStats {
	pub total_requests: u64,
	pub dictionary_hits: u64,
	pub model_predictions: u64,
	pub errors: u64,
	pub average_response_time_ms: f64,
}

impl RunningStats {
	/// Accounts for one counted word.
	pub fn record_word(&mut self, result: &WordResult) {
		match result {
			WordResult::Hit { source: Source::Dictionary, .. } => self.dictionary_hits += 1,
			WordResult::Hit { source: Source::Model, .. } => self.model_predictions += 1,
			WordResult::Miss(_) => self.errors += 1,
		}
	}

	/// Accounts for one finished request and folds its duration into the mean.
	pub fn record_request(&mut self, elapsed: Duration) {
		self.total_requests += 1;
		let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
		self.average_response_time_ms += (elapsed_ms - self.average_response_time_ms) / self.total_requests as f64;
	}

	/// Number of words counted so far.
	pub fn words(&self) -> u64 {
		self.dictionary_hits + self.model_predictions + self.errors
	}

	/// Share of words answered by the dictionary, 0 when nothing was counted.
	pub fn dictionary_hit_rate(&self) -> f64 {
		match self.words() {
			0 => 0.0,
			words => self.dictionary_hits as f64 / words as f64,
		}
	}
}

/// Read-only view returned by the stats query.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct StatsSnapshot {
	#[serde(flatten)]
	pub counters: RunningStats,
	pub state: CounterState,
	pub model_status: ModelStatus,
	pub dictionary_words: usize,
}
