//! Two-tier English syllable counting library.
//!
//! This crate provides:
//! - A CMUdict-based pronunciation dictionary with O(1) lookups
//! - A character-level fallback model for out-of-vocabulary words
//! - A serialized counting service with running statistics
//! - Layered settings for the binaries built on top of it
//!
//! Internal helpers (file I/O) are kept private.

/// Dictionary, encoder, fallback model and counter.
pub mod model;

/// Serialized counter actor and its handle.
pub mod service;

/// Fixed-word-list smoke benchmark and timing summaries.
pub mod benchmark;

/// Settings with defaults, JSON file and environment overrides.
pub mod config;

/// Error types.
pub mod error;

/// I/O utilities (file loading, path helpers).
///
/// Not exposed
pub(crate) mod io;
