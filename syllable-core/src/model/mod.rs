//! Top-level module for syllable estimation.
//!
//! This module provides the two-tier counting pipeline, including:
//! - Pronunciation dictionary loading and lookup (`PronunciationDictionary`)
//! - Fixed-size character encoding for the fallback model (`CharacterEncoder`)
//! - The fallback model adapter and its lifecycle (`FallbackPredictor`, `ModelSlot`)
//! - The orchestrating counter (`SyllableCounter`)
//! - Running performance statistics (`RunningStats`)

/// Two-tier orchestrator: dictionary first, model on miss.
///
/// Owns the running statistics and exposes the single/multiple result shape.
pub mod counter;

/// CMUdict-style pronunciation dictionary.
///
/// Supports parallel parsing, first-pronunciation-wins merging,
/// binary caching and normalized lookups.
pub mod dictionary;

/// Positional one-hot character grid fed to the fallback model.
pub mod encoder;

/// Fallback model: estimator trait, rounding adapter, artifact loading
/// and the shared slot populated by the background loader.
pub mod predictor;

/// Running counters and the snapshot returned by the stats query.
pub mod stats;
