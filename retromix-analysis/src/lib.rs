//! Beat analysis for RetroMix
//!
//! Turns decoded PCM into a tempo estimate and a uniform beat grid:
//! bass-focused preprocessing, energy onset detection, inter-onset
//! histogram tempo estimation and beat grid projection.

mod analyzer;
mod beatgrid;
mod onset;
mod preprocess;
mod samples;
mod tempo;

pub use analyzer::{AnalysisConfig, AnalysisResult, BeatAnalyzer};
pub use beatgrid::{generate_beat_grid, generate_beat_grid_with_fallback, BeatGrid, BEATS_PER_BAR};
pub use onset::detect_onsets;
pub use preprocess::{preprocess, Preprocessed};
pub use samples::{AudioSamples, BufferError, DecodedBuffer};
pub use tempo::{estimate_tempo, TempoEstimate};

/// Tempo reported when a track has no usable onsets
pub const FALLBACK_BPM: f64 = 120.0;
