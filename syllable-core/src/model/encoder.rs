/// Maximum number of characters the fallback model sees per word.
pub const MAX_LENGTH: usize = 18;

/// Characters understood by the fallback model, in one-hot column order.
pub const ALPHABET: [char; 28] = [
	'\'', '-', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o', 'p', 'q', 'r', 's',
	't', 'u', 'v', 'w', 'x', 'y', 'z',
];

/// Number of columns of an encoded row.
pub const ALPHABET_SIZE: usize = ALPHABET.len();

/// Returns the one-hot column of a (lowercase) character.
fn column(c: char) -> Option<usize> {
	match c {
		'\'' => Some(0),
		'-' => Some(1),
		'a'..='z' => Some(c as usize - 'a' as usize + 2),
		_ => None,
	}
}

/// Fixed-shape positional one-hot grid fed to the fallback model.
///
/// Row `i` holds the indicator of the character at position `i`.
/// Rows past the word length are all zero.
#[derive(Clone, PartialEq, Debug)]
pub struct EncodedWord {
	rows: [[f32; ALPHABET_SIZE]; MAX_LENGTH],
	length: usize,
}

impl EncodedWord {
	/// Number of encoded (non-zero) rows.
	pub fn len(&self) -> usize {
		self.length
	}

	/// True when no row is set.
	pub fn is_empty(&self) -> bool {
		self.length == 0
	}

	/// Returns row `i`, or `None` past `MAX_LENGTH`.
	pub fn row(&self, i: usize) -> Option<&[f32; ALPHABET_SIZE]> {
		self.rows.get(i)
	}

	/// Flattened tensor of shape `[1, MAX_LENGTH, ALPHABET_SIZE]` (batch of one).
	pub fn to_batch(&self) -> Vec<f32> {
		self.rows.iter().flat_map(|row| row.iter().copied()).collect()
	}

	/// Shape of the tensor returned by `to_batch`.
	pub fn batch_shape() -> [usize; 3] {
		[1, MAX_LENGTH, ALPHABET_SIZE]
	}

	/// Decodes the set rows back into characters.
	///
	/// Stops at the first all-zero row.
	pub fn decode(&self) -> String {
		self.rows
			.iter()
			.map_while(|row| row.iter().position(|v| *v > 0.5).map(|i| ALPHABET[i]))
			.collect()
	}
}

/// Maps words to the positional character grid used by the fallback model.
///
/// Stateless; every call allocates a fresh `EncodedWord`.
#[derive(Clone, Copy, Default, Debug)]
pub struct CharacterEncoder;

impl CharacterEncoder {
	/// True iff the word is non-empty and every lowercased character is in `ALPHABET`.
	pub fn encodable(&self, word: &str) -> bool {
		!word.is_empty() && word.chars().flat_map(char::to_lowercase).all(|c| column(c).is_some())
	}

	/// Encodes a word, keeping only its first `MAX_LENGTH` characters.
	///
	/// Returns `None` for words that are not encodable; partial encodings
	/// are never produced.
	pub fn encode(&self, word: &str) -> Option<EncodedWord> {
		if !self.encodable(word) {
			return None;
		}

		let mut rows = [[0.0; ALPHABET_SIZE]; MAX_LENGTH];
		let mut length = 0;
		for (row, c) in rows.iter_mut().zip(word.chars().flat_map(char::to_lowercase)) {
			// Checked by `encodable`
			let i = column(c)?;
			row[i] = 1.0;
			length += 1;
		}
		Some(EncodedWord { rows, length })
	}
}
