use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError, SyncSender, TrySendError};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};

use crate::benchmark::BenchmarkReport;
use crate::error::ServiceError;
use crate::model::counter::{Counted, SyllableCounter, WordOutcome};
use crate::model::dictionary::PronunciationDictionary;
use crate::model::predictor::{ModelSlot, ModelSource, ModelStatus};
use crate::model::stats::StatsSnapshot;

/// Default per-call deadline.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Requests the actor mailbox holds before callers are turned away.
pub const MAILBOX_CAPACITY: usize = 1024;

/// Messages understood by the counter actor.
///
/// Every request carries the channel its reply is sent on.
enum Request {
	Count { text: String, reply: SyncSender<Counted<u32>> },
	Total { text: String, reply: SyncSender<u32> },
	Detailed { text: String, reply: SyncSender<Counted<WordOutcome>> },
	Stats { reply: SyncSender<StatsSnapshot> },
}

/// Handle on a counter actor.
///
/// The actor thread owns the `SyllableCounter` and processes requests one at
/// a time in arrival order, which makes it the only writer of the statistics.
/// Handles are cheap to clone and can be shared between threads; the actor
/// stops once every handle is dropped.
///
/// The mailbox is bounded by `MAILBOX_CAPACITY`; a full mailbox is reported
/// as `ServiceError::Unavailable` instead of queueing more work.
#[derive(Clone, Debug)]
pub struct SyllableService {
	sender: SyncSender<Request>,
	model: ModelSlot,
	timeout: Duration,
}

impl SyllableService {
	/// Starts a counter over `dictionary` and begins loading the model.
	///
	/// The service accepts requests immediately; words needing the model
	/// while it loads are answered with `model_not_loaded`.
	///
	/// # Errors
	/// Returns an error if the actor thread cannot be spawned.
	pub fn start(dictionary: Arc<PronunciationDictionary>, source: ModelSource, timeout: Duration) -> io::Result<Self> {
		// The loader thread is detached, it only writes the slot
		let (model, _loader) = ModelSlot::spawn_load(source);
		Self::with_model_slot(dictionary, model, timeout)
	}

	/// Starts an actor around an existing model slot.
	pub fn with_model_slot(dictionary: Arc<PronunciationDictionary>, model: ModelSlot, timeout: Duration) -> io::Result<Self> {
		Self::spawn(SyllableCounter::new(dictionary, model.clone()), model, timeout, MAILBOX_CAPACITY)
	}

	fn spawn(mut counter: SyllableCounter, model: ModelSlot, timeout: Duration, capacity: usize) -> io::Result<Self> {
		let (sender, receiver) = mpsc::sync_channel::<Request>(capacity);

		thread::Builder::new().name("syllable-counter".to_owned()).spawn(move || {
			info!("syllable counter started ({} dictionary words)", counter.dictionary().len());
			// A failed reply means the caller gave up waiting
			for request in receiver {
				match request {
					Request::Count { text, reply } => {
						let _ = reply.send(counter.count(&text));
					}
					Request::Total { text, reply } => {
						let _ = reply.send(counter.total_syllables(&text));
					}
					Request::Detailed { text, reply } => {
						let _ = reply.send(counter.count_detailed(&text));
					}
					Request::Stats { reply } => {
						let _ = reply.send(counter.stats());
					}
				}
			}
			debug!("syllable counter stopped");
		})?;

		Ok(Self { sender, model, timeout })
	}

	/// Sends a request and waits for its reply, at most `self.timeout`.
	fn call<T, F>(&self, make_request: F) -> Result<T, ServiceError>
	where
		F: FnOnce(SyncSender<T>) -> Request,
	{
		let (reply, response) = mpsc::sync_channel(1);
		self.sender.try_send(make_request(reply)).map_err(|e| {
			if let TrySendError::Full(_) = e {
				warn!("syllable counter mailbox is full");
			}
			ServiceError::Unavailable
		})?;
		response.recv_timeout(self.timeout).map_err(|e| match e {
			RecvTimeoutError::Timeout => ServiceError::Timeout(self.timeout.as_millis()),
			RecvTimeoutError::Disconnected => ServiceError::Unavailable,
		})
	}

	/// Syllable counts of `text`: a scalar for one word, a list otherwise.
	pub fn count(&self, text: &str) -> Result<Counted<u32>, ServiceError> {
		self.call(|reply| Request::Count { text: text.to_owned(), reply })
	}

	/// Total syllables of `text`.
	pub fn total_syllables(&self, text: &str) -> Result<u32, ServiceError> {
		self.call(|reply| Request::Total { text: text.to_owned(), reply })
	}

	/// Per-word counts with the method that produced them (or the miss reason).
	pub fn count_detailed(&self, text: &str) -> Result<Counted<WordOutcome>, ServiceError> {
		self.call(|reply| Request::Detailed { text: text.to_owned(), reply })
	}

	pub fn stats(&self) -> Result<StatsSnapshot, ServiceError> {
		self.call(|reply| Request::Stats { reply })
	}

	/// True iff the counter answers a stats query.
	///
	/// Says nothing about the model, see `model_status`.
	pub fn ready(&self) -> bool {
		self.stats().is_ok()
	}

	pub fn model_status(&self) -> ModelStatus {
		self.model.status()
	}

	/// Waits for the model to finish loading, at most `timeout`.
	///
	/// Meant for run-once callers that want the fallback tier available
	/// before counting. Returns the status reached, `Loading` on expiry.
	pub fn wait_for_model(&self, timeout: Duration) -> ModelStatus {
		let status = self.model.wait_settled(timeout);
		if status == ModelStatus::Loading {
			warn!("model still loading after {}ms", timeout.as_millis());
		}
		status
	}

	/// Runs the built-in word list through the service.
	pub fn benchmark(&self) -> Result<BenchmarkReport, ServiceError> {
		BenchmarkReport::run(self)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::model::counter::{MissReason, Source, WordResult};
	use crate::error::PredictionError;
	use crate::model::encoder::EncodedWord;
	use crate::model::predictor::{Estimator, FallbackPredictor, VowelNucleusEstimator};

	/// Takes `delay` for every word it estimates.
	struct SlowEstimator {
		delay: Duration,
	}

	impl Estimator for SlowEstimator {
		fn name(&self) -> &str {
			"slow"
		}

		fn estimate(&self, _input: &EncodedWord) -> Result<f32, PredictionError> {
			thread::sleep(self.delay);
			Ok(2.0)
		}
	}

	fn slow_service(delay: Duration, timeout: Duration, capacity: usize) -> SyllableService {
		let model = ModelSlot::ready(FallbackPredictor::new(Arc::new(SlowEstimator { delay })));
		SyllableService::spawn(SyllableCounter::new(dictionary(), model.clone()), model, timeout, capacity).unwrap()
	}

	fn dictionary() -> Arc<PronunciationDictionary> {
		Arc::new(PronunciationDictionary::from_iter(["hello HH AH0 L OW1", "world W ER1 L D"]))
	}

	fn service(source: ModelSource) -> SyllableService {
		SyllableService::start(dictionary(), source, DEFAULT_TIMEOUT).unwrap()
	}

	#[test]
	fn count_detailed_hello_is_dictionary() {
		let service = service(ModelSource::Disabled);
		let detailed = service.count_detailed("hello").unwrap();
		let Counted::Single(outcome) = detailed else { panic!("expected a single result") };
		assert_eq!(outcome.result, WordResult::Hit { count: 2, source: Source::Dictionary });
	}

	#[test]
	fn count_keeps_the_shape() {
		let service = service(ModelSource::Estimator(Arc::new(VowelNucleusEstimator)));
		assert_eq!(service.count("hello").unwrap(), Counted::Single(2));
		assert_eq!(service.count("hello world").unwrap(), Counted::Multiple(vec![2, 1]));
		assert_eq!(service.count("   ").unwrap(), Counted::Multiple(vec![]));
		assert_eq!(service.total_syllables("hello world zorblax").unwrap(), 5);
	}

	#[test]
	fn stats_follow_requests() {
		let service = service(ModelSource::Estimator(Arc::new(VowelNucleusEstimator)));
		service.count("hello").unwrap();
		service.count("zorblax").unwrap();
		service.count_detailed("hello world").unwrap();

		let stats = service.stats().unwrap();
		assert_eq!(stats.counters.total_requests, 3);
		assert_eq!(stats.counters.dictionary_hits, 3);
		assert_eq!(stats.counters.model_predictions, 1);
		assert_eq!(stats.counters.errors, 0);
		assert_eq!(stats.model_status, ModelStatus::Ready);
	}

	#[test]
	fn model_loading_window_returns_model_not_loaded() {
		let slot = ModelSlot::loading();
		let service = SyllableService::with_model_slot(dictionary(), slot.clone(), DEFAULT_TIMEOUT).unwrap();
		assert!(service.ready());
		assert_eq!(service.model_status(), ModelStatus::Loading);
		assert_eq!(service.count("hello").unwrap(), Counted::Single(2));

		let Counted::Single(outcome) = service.count_detailed("zorblax").unwrap() else {
			panic!("expected a single result")
		};
		assert_eq!(outcome.result, WordResult::Miss(MissReason::ModelNotLoaded));

		slot.install(FallbackPredictor::new(Arc::new(VowelNucleusEstimator)));
		assert_eq!(service.count("zorblax").unwrap(), Counted::Single(2));
	}

	#[test]
	fn clones_share_one_counter() {
		let service = service(ModelSource::Disabled);
		let handles: Vec<_> = (0..4)
			.map(|_| {
				let service = service.clone();
				thread::spawn(move || {
					for _ in 0..25 {
						service.count("hello world").unwrap();
					}
				})
			})
			.collect();
		for handle in handles {
			handle.join().unwrap();
		}
		let stats = service.stats().unwrap();
		assert_eq!(stats.counters.total_requests, 100);
		assert_eq!(stats.counters.dictionary_hits, 200);
	}

	#[test]
	fn missing_artifact_keeps_service_available() {
		let dir = tempfile::tempdir().unwrap();
		let service = service(ModelSource::Artifact(dir.path().join("missing.json")));
		assert!(service.ready());
		assert_eq!(service.count("hello").unwrap(), Counted::Single(2));
	}

	#[test]
	fn slow_request_times_out_and_actor_survives() {
		let service = slow_service(Duration::from_millis(200), Duration::from_millis(20), MAILBOX_CAPACITY);
		assert_eq!(service.count("zorblax"), Err(ServiceError::Timeout(20)));

		// The abandoned request still completes
		thread::sleep(Duration::from_millis(300));
		let stats = service.stats().unwrap();
		assert_eq!(stats.counters.total_requests, 1);
		assert_eq!(stats.counters.model_predictions, 1);
		assert_eq!(service.count("hello").unwrap(), Counted::Single(2));
	}

	#[test]
	fn full_mailbox_is_unavailable() {
		let service = slow_service(Duration::from_millis(300), Duration::from_millis(20), 1);
		// Taken by the actor, which then sleeps
		assert_eq!(service.count("zorblax"), Err(ServiceError::Timeout(20)));
		// Fills the only slot
		assert_eq!(service.count("zorblax"), Err(ServiceError::Timeout(20)));
		assert_eq!(service.count("hello"), Err(ServiceError::Unavailable));
	}

	#[test]
	fn wait_for_model_reaches_ready_from_artifact() {
		let dir = tempfile::tempdir().unwrap();
		let weights = dir.path().join("weights.json");
		std::fs::write(
			&weights,
			r#"{"char_config": {"chars": "'-abcdefghijklmnopqrstuvwxyz", "maxlen": 18},
				"model_config": {"input_shape": [18, 28], "output_shape": [1]}}"#,
		)
		.unwrap();

		let service = service(ModelSource::Artifact(weights));
		assert_eq!(service.wait_for_model(DEFAULT_TIMEOUT), ModelStatus::Ready);
		let Counted::Single(outcome) = service.count_detailed("zorblax").unwrap() else {
			panic!("expected a single result")
		};
		assert_eq!(outcome.result, WordResult::Hit { count: 2, source: Source::Model });
	}

	#[test]
	fn wait_for_model_returns_loading_on_expiry() {
		let service =
			SyllableService::with_model_slot(dictionary(), ModelSlot::loading(), DEFAULT_TIMEOUT).unwrap();
		assert_eq!(service.wait_for_model(Duration::from_millis(10)), ModelStatus::Loading);
	}
}
