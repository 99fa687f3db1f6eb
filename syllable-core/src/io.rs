use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::{fs, io};

/// Reads a text file and returns all its lines as a `Vec<String>`.
///
/// - Reads the entire file into memory
/// - Splits on `\n` / `\r\n`
pub(crate) fn read_file<P: AsRef<Path>>(filename: P) -> io::Result<Vec<String>> {
	let mut contents = String::new();
	File::open(filename)?.read_to_string(&mut contents)?;
	Ok(contents.lines().map(str::to_owned).collect())
}

/// Builds an output path based on an input path and a new extension.
///
/// Example:
/// `data/cmudict.dict` + `"bin"` → `data/cmudict.bin`
pub(crate) fn build_output_path<P: AsRef<Path>>(
	input_path: P,
	output_extension: &str,
) -> io::Result<PathBuf> {
	let input_path = input_path.as_ref();

	let parent = input_path.parent().unwrap_or_else(|| Path::new("."));
	let file_stem = input_path
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Input path has no filename"))?;

	let mut output = PathBuf::from(parent);
	output.push(file_stem);
	output.set_extension(output_extension);

	Ok(output)
}

/// Extracts the base filename without extension.
///
/// Examples:
/// - `"./data/cmudict.dict"` → `"cmudict"`
/// - `"cmudict.dict"` → `"cmudict"`
pub(crate) fn get_filename<P: AsRef<Path>>(input_path: P) -> io::Result<String> {
	let stem = input_path
		.as_ref()
		.file_stem()
		.ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Path has no filename"))?;

	Ok(stem.to_string_lossy().to_string())
}

/// Returns true when `derived` exists and was modified no earlier than `source`.
///
/// Any metadata error (missing file, unsupported mtime) counts as stale.
pub(crate) fn is_up_to_date<P: AsRef<Path>, Q: AsRef<Path>>(derived: P, source: Q) -> bool {
	let modified = |path: &Path| fs::metadata(path).and_then(|meta| meta.modified());
	match (modified(derived.as_ref()), modified(source.as_ref())) {
		(Ok(derived), Ok(source)) => derived >= source,
		_ => false,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn output_path_swaps_extension() {
		let path = build_output_path("data/cmudict.dict", "bin").unwrap();
		assert_eq!(path, PathBuf::from("data/cmudict.bin"));
	}

	#[test]
	fn output_path_without_parent_uses_empty_parent() {
		let path = build_output_path("cmudict.dict", "bin").unwrap();
		assert_eq!(path.file_name().unwrap(), "cmudict.bin");
	}

	#[test]
	fn filename_strips_directory_and_extension() {
		assert_eq!(get_filename("./data/cmudict.dict").unwrap(), "cmudict");
		assert_eq!(get_filename("cmudict.dict").unwrap(), "cmudict");
	}

	#[test]
	fn read_file_splits_lines() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("corpus.dict");
		fs::write(&path, "a AH0\r\nb B IY1\n").unwrap();
		assert_eq!(read_file(&path).unwrap(), vec!["a AH0", "b B IY1"]);
	}

	#[test]
	fn missing_derived_file_is_stale() {
		let dir = tempfile::tempdir().unwrap();
		let source = dir.path().join("corpus.dict");
		fs::write(&source, "a AH0\n").unwrap();
		assert!(!is_up_to_date(dir.path().join("corpus.bin"), &source));
	}
}
