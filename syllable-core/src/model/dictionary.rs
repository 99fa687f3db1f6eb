use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::Path;
use std::sync::mpsc;
use std::thread;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::error::DictionaryError;
use crate::io::{build_output_path, get_filename, is_up_to_date, read_file};

/// Characters stripped from the start of a word before lookup.
const LEADING_QUOTES: &[char] = &['\'', '"', '‘', '“'];

/// Characters stripped from the end of a word before lookup.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '\'', '"', '’', '”'];

/// CMUdict comment marker.
const COMMENT_PREFIX: &str = ";;;";

/// Normalizes a word the way headwords are stored.
///
/// - Lowercases
/// - Strips leading quotes and trailing punctuation
pub fn normalize_word(word: &str) -> String {
	word.trim_start_matches(LEADING_QUOTES)
		.trim_end_matches(TRAILING_PUNCTUATION)
		.to_lowercase()
}

/// Parses one corpus line into `(headword, syllable_count)`.
///
/// Returns `None` for blank lines, comments and entries without any
/// stressed phoneme.
///
/// # Notes
/// - `WORD(2)` → `word`: the alternate-pronunciation suffix is dropped.
/// - The syllable count is the number of phonemes ending in an ASCII digit.
pub fn parse_line(line: &str) -> Option<(String, u32)> {
	if line.starts_with(COMMENT_PREFIX) {
		return None;
	}

	let mut tokens = line.split_whitespace();
	let raw_headword = tokens.next()?;
	let headword = match raw_headword.find('(') {
		Some(i) if i > 0 && raw_headword.ends_with(')') => &raw_headword[..i],
		_ => raw_headword,
	};

	let count = tokens
		.filter(|phoneme| phoneme.chars().last().is_some_and(|c| c.is_ascii_digit()))
		.count() as u32;
	if count == 0 {
		return None;
	}

	Some((headword.to_lowercase(), count))
}

/// Immutable mapping from headword to syllable count.
///
/// # Invariants
/// - Every key is lowercase with alternate suffixes stripped
/// - Every count is >= 1
/// - The first pronunciation of a headword wins, later ones are discarded
///
/// Once built it is never mutated, so it can be shared between threads
/// behind an `Arc` without locking.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct PronunciationDictionary {
	entries: HashMap<String, u32>,
}

impl PronunciationDictionary {
	/// Loads a dictionary from a corpus file.
	///
	/// # Errors
	/// Returns `DictionaryError::Io` if the file cannot be read.
	pub fn load<P: AsRef<Path>>(filepath: P) -> Result<Self, DictionaryError> {
		let lines = read_file(&filepath)?;
		let dictionary = Self::from_lines(&lines);
		info!(
			"loaded dictionary '{}' ({} words)",
			get_filename(&filepath).unwrap_or_default(),
			dictionary.len()
		);
		Ok(dictionary)
	}

	/// Loads a dictionary, going through a binary cache next to the corpus.
	///
	/// - `data/cmudict.dict` is cached as `data/cmudict.bin`.
	/// - The cache is used only if it is not older than the corpus.
	/// - A corrupt cache is ignored and rebuilt.
	/// - Failing to write the cache is logged, not returned.
	///
	/// # Errors
	/// Returns `DictionaryError::Io` if the corpus cannot be read.
	pub fn load_cached<P: AsRef<Path>>(filepath: P) -> Result<Self, DictionaryError> {
		let binary_data_path = build_output_path(&filepath, "bin")?;

		if is_up_to_date(&binary_data_path, &filepath) {
			match Self::read_cache(&binary_data_path) {
				Ok(dictionary) => {
					info!("loaded dictionary cache {} ({} words)", binary_data_path.display(), dictionary.len());
					return Ok(dictionary);
				}
				Err(e) => warn!("ignoring dictionary cache {}: {e}", binary_data_path.display()),
			}
		}

		let dictionary = Self::load(&filepath)?;
		if let Err(e) = dictionary.write_cache(&binary_data_path) {
			warn!("failed to write dictionary cache {}: {e}", binary_data_path.display());
		}
		Ok(dictionary)
	}

	fn read_cache(path: &Path) -> Result<Self, DictionaryError> {
		let bytes = std::fs::read(path)?;
		Ok(postcard::from_bytes(&bytes)?)
	}

	fn write_cache(&self, path: &Path) -> Result<(), DictionaryError> {
		let bytes = postcard::to_stdvec(self)?;
		std::fs::write(path, bytes)?;
		debug!("wrote dictionary cache {}", path.display());
		Ok(())
	}

	/// Builds a dictionary from corpus lines.
	///
	/// # Behavior
	/// - Splits the lines into chunks (based on CPU cores * factor).
	/// - Parses every chunk on its own thread.
	/// - Merges the partial mappings in chunk order, so the first
	///   pronunciation of a headword wins exactly as in a sequential pass.
	pub fn from_lines(lines: &[String]) -> Self {
		if lines.is_empty() {
			return Self::default();
		}

		let cpus = num_cpus::get();
		let factor = 8;
		let chunks = cpus * factor;
		let chunk_size = lines.len().div_ceil(chunks);

		let (tx, rx) = mpsc::channel();
		thread::scope(|scope| {
			for (index, chunk) in lines.chunks(chunk_size).enumerate() {
				let tx = tx.clone();
				scope.spawn(move || {
					let mut partial = Self::default();
					partial.extend_lines(chunk.iter().map(String::as_str));
					// The receiver outlives the scope
					let _ = tx.send((index, partial));
				});
			}
		});
		drop(tx);

		let mut partials: Vec<(usize, Self)> = rx.iter().collect();
		partials.sort_by_key(|(index, _)| *index);

		let mut dictionary = Self::default();
		for (_, partial) in partials {
			dictionary.merge(partial);
		}
		dictionary
	}

	/// Parses lines sequentially, first pronunciation wins.
	fn extend_lines<'a, I: IntoIterator<Item = &'a str>>(&mut self, lines: I) {
		for (headword, count) in lines.into_iter().filter_map(parse_line) {
			self.entries.entry(headword).or_insert(count);
		}
	}

	/// Merges a dictionary built from *later* corpus lines.
	///
	/// Headwords already present are kept.
	fn merge(&mut self, later: Self) {
		for (headword, count) in later.entries {
			if let Entry::Vacant(entry) = self.entries.entry(headword) {
				entry.insert(count);
			}
		}
	}

	/// Looks up the syllable count of a word.
	///
	/// The word is normalized on every call (see `normalize_word`).
	/// Returns `None` on miss.
	pub fn lookup(&self, word: &str) -> Option<u32> {
		self.entries.get(&normalize_word(word)).copied()
	}

	/// Number of headwords.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True when no headword was loaded.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates over `(headword, syllable_count)` pairs in no particular order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, u32)> {
		self.entries.iter().map(|(k, v)| (k.as_str(), *v))
	}
}

impl<'a> FromIterator<&'a str> for PronunciationDictionary {
	/// Sequential build, mostly useful for small in-memory corpora.
	fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
		let mut dictionary = Self::default();
		dictionary.extend_lines(iter);
		dictionary
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::fs;

	const CORPUS: &str = "\
;;; sample corpus
hello HH AH0 L OW1
hello(2) HH EH0 L OW1 OW0
world W ER1 L D
cat K AE1 T
cat(2) K AE1 T AH0
syllable S IH1 L AH0 B AH0 L

a AH0
";

	fn corpus_lines() -> Vec<String> {
		CORPUS.lines().map(str::to_owned).collect()
	}

	#[test]
	fn parse_line_counts_stressed_phonemes() {
		assert_eq!(parse_line("hello HH AH0 L OW1"), Some(("hello".to_owned(), 2)));
		assert_eq!(parse_line("SYLLABLE S IH1 L AH0 B AH0 L"), Some(("syllable".to_owned(), 3)));
	}

	#[test]
	fn parse_line_strips_alternate_suffix() {
		assert_eq!(parse_line("WORD(2) W ER1 D"), Some(("word".to_owned(), 1)));
	}

	#[test]
	fn parse_line_skips_malformed_lines() {
		assert_eq!(parse_line(""), None);
		assert_eq!(parse_line("   "), None);
		assert_eq!(parse_line(";;; comment AH0"), None);
		assert_eq!(parse_line("hmm HH M"), None);
	}

	#[test]
	fn first_pronunciation_wins() {
		let dictionary = PronunciationDictionary::from_iter(["cat K AE1 T", "cat(2) K AE1 T AH0"]);
		assert_eq!(dictionary.lookup("cat"), Some(1));
		assert_eq!(dictionary.len(), 1);
	}

	#[test]
	fn lookup_normalizes_case_and_punctuation() {
		let dictionary = PronunciationDictionary::from_lines(&corpus_lines());
		assert_eq!(dictionary.lookup("hello"), Some(2));
		assert_eq!(dictionary.lookup("Hello,"), Some(2));
		assert_eq!(dictionary.lookup("'hello'"), Some(2));
		assert_eq!(dictionary.lookup("\"HELLO!\""), Some(2));
		assert_eq!(dictionary.lookup("zorblax"), None);
	}

	#[test]
	fn every_count_is_positive() {
		let dictionary = PronunciationDictionary::from_lines(&corpus_lines());
		assert!(!dictionary.is_empty());
		for (headword, count) in dictionary.iter() {
			assert!(count >= 1, "{headword} has no syllable");
			assert_eq!(dictionary.lookup(headword), Some(count));
		}
	}

	#[test]
	fn parallel_build_matches_sequential_build() {
		let mut lines = Vec::new();
		for i in 0..500 {
			lines.push(format!("word{i} W ER1 D"));
			lines.push(format!("word{i}(2) W ER1 D AH0 Z IY0"));
		}
		let parallel = PronunciationDictionary::from_lines(&lines);
		let sequential = PronunciationDictionary::from_iter(lines.iter().map(String::as_str));
		assert_eq!(parallel, sequential);
		assert_eq!(parallel.lookup("word42"), Some(1));
	}

	#[test]
	fn load_is_idempotent() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cmudict.dict");
		fs::write(&path, CORPUS).unwrap();

		let first = PronunciationDictionary::load(&path).unwrap();
		let second = PronunciationDictionary::load(&path).unwrap();
		assert_eq!(first, second);
		assert_eq!(first.len(), 5);
	}

	#[test]
	fn load_missing_file_is_an_io_error() {
		let dir = tempfile::tempdir().unwrap();
		let err = PronunciationDictionary::load(dir.path().join("missing.dict")).unwrap_err();
		assert!(matches!(err, DictionaryError::Io(_)));
	}

	#[test]
	fn cache_is_written_and_reused() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cmudict.dict");
		fs::write(&path, CORPUS).unwrap();

		let built = PronunciationDictionary::load_cached(&path).unwrap();
		let cache = dir.path().join("cmudict.bin");
		assert!(cache.exists());

		let cached = PronunciationDictionary::load_cached(&path).unwrap();
		assert_eq!(built, cached);
	}

	#[test]
	fn corrupt_cache_is_rebuilt() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("cmudict.dict");
		fs::write(&path, CORPUS).unwrap();
		fs::write(dir.path().join("cmudict.bin"), [0xff, 0xff, 0xff]).unwrap();

		let dictionary = PronunciationDictionary::load_cached(&path).unwrap();
		assert_eq!(dictionary.lookup("world"), Some(1));
	}
}
