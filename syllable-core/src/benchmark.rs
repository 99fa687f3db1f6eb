use std::time::Instant;

use serde::Serialize;

use crate::error::ServiceError;
use crate::model::counter::{Counted, Source};
use crate::service::SyllableService;

/// Words run by `SyllableService::benchmark`.
pub const BENCHMARK_WORDS: [&str; 16] = [
	"hello",
	"world",
	"python",
	"tensorflow",
	"artificial",
	"intelligence",
	"syllable",
	"counting",
	"performance",
	"benchmark",
	"optimization",
	"family",
	"computer",
	"programming",
	"development",
	"application",
];

/// Summary of a series of durations, in milliseconds.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct TimingSummary {
	pub samples: usize,
	pub mean_ms: f64,
	pub median_ms: f64,
	pub min_ms: f64,
	pub max_ms: f64,
	/// Sample standard deviation, only defined for two samples or more.
	pub std_dev_ms: Option<f64>,
}

impl TimingSummary {
	/// Summarizes `samples`, `None` when there is nothing to summarize.
	pub fn from_samples(samples: &[f64]) -> Option<Self> {
		if samples.is_empty() {
			return None;
		}

		let mut sorted = samples.to_vec();
		sorted.sort_by(f64::total_cmp);

		let n = sorted.len();
		let mean = sorted.iter().sum::<f64>() / n as f64;
		let median = if n % 2 == 0 { (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0 } else { sorted[n / 2] };
		let std_dev = (n > 1).then(|| {
			let variance = sorted.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
			variance.sqrt()
		});

		Some(Self {
			samples: n,
			mean_ms: mean,
			median_ms: median,
			min_ms: sorted[0],
			max_ms: sorted[n - 1],
			std_dev_ms: std_dev,
		})
	}
}

/// One benchmarked word.
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BenchmarkEntry {
	pub word: String,
	pub syllables: u32,
	pub method: Option<Source>,
	pub elapsed_ms: f64,
}

/// End-to-end smoke benchmark over `BENCHMARK_WORDS`.
///
/// Not statistically rigorous: one pass, wall-clock timing through the
/// service handle (queueing included).
#[derive(Serialize, Clone, Debug, PartialEq)]
pub struct BenchmarkReport {
	pub entries: Vec<BenchmarkEntry>,
	pub total_syllables: u32,
	pub dictionary_hit_rate: f64,
	pub timing: Option<TimingSummary>,
}

impl BenchmarkReport {
	/// Counts every benchmark word through `service`, one request per word.
	///
	/// # Errors
	/// Returns the first request-level failure.
	pub fn run(service: &SyllableService) -> Result<Self, ServiceError> {
		let mut entries = Vec::with_capacity(BENCHMARK_WORDS.len());

		for word in BENCHMARK_WORDS {
			let start = Instant::now();
			let detailed = service.count_detailed(word)?;
			let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

			let result = match detailed {
				Counted::Single(outcome) => outcome.result,
				Counted::Multiple(mut outcomes) => match outcomes.pop() {
					Some(outcome) => outcome.result,
					None => continue,
				},
			};
			entries.push(BenchmarkEntry {
				word: word.to_owned(),
				syllables: result.syllables(),
				method: result.source(),
				elapsed_ms,
			});
		}

		Ok(Self::from_entries(entries))
	}

	fn from_entries(entries: Vec<BenchmarkEntry>) -> Self {
		let hits = entries.iter().filter(|e| e.method == Some(Source::Dictionary)).count();
		let dictionary_hit_rate = if entries.is_empty() { 0.0 } else { hits as f64 / entries.len() as f64 };
		let times: Vec<f64> = entries.iter().map(|e| e.elapsed_ms).collect();

		Self {
			total_syllables: entries.iter().map(|e| e.syllables).sum(),
			dictionary_hit_rate,
			timing: TimingSummary::from_samples(&times),
			entries,
		}
	}

	/// True when every word got a count.
	pub fn all_counted(&self) -> bool {
		self.entries.iter().all(|e| e.method.is_some())
	}
}
