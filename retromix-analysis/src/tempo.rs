//! Tempo estimation from an inter-onset interval histogram

use crate::analyzer::AnalysisConfig;
use std::collections::HashMap;

/// Tempo and how strongly the onsets agree with it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TempoEstimate {
    /// Beats per minute, rounded to one decimal
    pub bpm: f64,
    /// Fraction of intervals that fell in the winning bucket (0.0 - 1.0)
    pub confidence: f64,
}

impl TempoEstimate {
    /// Estimate used when there is nothing to measure
    pub fn fallback(config: &AnalysisConfig) -> Self {
        Self {
            bpm: config.fallback_bpm,
            confidence: 0.0,
        }
    }
}

/// Fold a raw tempo into the dance range with a single double or halve
pub(crate) fn correct_octave(bpm: f64, config: &AnalysisConfig) -> f64 {
    if bpm < config.min_bpm {
        bpm * 2.0
    } else if bpm > config.max_bpm {
        bpm / 2.0
    } else {
        bpm
    }
}

/// Estimate tempo from ordered onset timestamps (seconds)
///
/// Never fails: fewer than two onsets gives the fallback tempo with zero
/// confidence.
pub fn estimate_tempo(onsets: &[f64], config: &AnalysisConfig) -> TempoEstimate {
    if onsets.len() < 2 {
        return TempoEstimate::fallback(config);
    }

    let resolution = config.histogram_resolution_secs;
    let buckets: Vec<i64> = onsets
        .windows(2)
        .map(|pair| ((pair[1] - pair[0]) / resolution).round() as i64)
        .collect();

    let mut histogram: HashMap<i64, usize> = HashMap::new();
    for &bucket in &buckets {
        *histogram.entry(bucket).or_insert(0) += 1;
    }

    // Ties go to the interval seen first
    let mut mode_bucket = buckets[0];
    let mut mode_count = 0;
    for &bucket in &buckets {
        let count = histogram[&bucket];
        if count > mode_count {
            mode_count = count;
            mode_bucket = bucket;
        }
    }

    let mode_interval = mode_bucket as f64 * resolution;
    if mode_interval <= 0.0 {
        tracing::warn!(mode_bucket, "degenerate onset interval, using fallback");
        return TempoEstimate::fallback(config);
    }

    let bpm = correct_octave(60.0 / mode_interval, config);
    let confidence = mode_count as f64 / buckets.len() as f64;

    TempoEstimate {
        bpm: (bpm * 10.0).round() / 10.0,
        confidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn periodic(period: f64, count: usize) -> Vec<f64> {
        (0..count).map(|i| i as f64 * period).collect()
    }

    #[test]
    fn test_empty_and_single_onset() {
        let config = AnalysisConfig::default();
        let empty = estimate_tempo(&[], &config);
        assert_eq!(empty.bpm, 120.0);
        assert_eq!(empty.confidence, 0.0);

        let single = estimate_tempo(&[1.0], &config);
        assert_eq!(single.bpm, 120.0);
        assert_eq!(single.confidence, 0.0);
    }

    #[test]
    fn test_click_track_is_exact() {
        let config = AnalysisConfig::default();
        let estimate = estimate_tempo(&periodic(0.5, 60), &config);
        assert_eq!(estimate.bpm, 120.0);
        assert_eq!(estimate.confidence, 1.0);
    }

    #[test]
    fn test_octave_correction_keeps_dance_range() {
        let config = AnalysisConfig::default();
        // 0.3 s .. 2.0 s covers every period the onset separation allows
        // up to the slowest tempo a single doubling can lift above 60
        let mut period = 0.3;
        while period <= 2.0 {
            let estimate = estimate_tempo(&periodic(period, 40), &config);
            assert!(
                (60.0..=180.0).contains(&estimate.bpm),
                "period {period} gave {} BPM",
                estimate.bpm
            );
            period += 0.01;
        }
    }

    #[test]
    fn test_slow_and_fast_are_folded_once() {
        let config = AnalysisConfig::default();
        // 1.2 s -> 50 BPM -> doubled
        assert_eq!(estimate_tempo(&periodic(1.2, 10), &config).bpm, 100.0);
        // 0.3 s -> 200 BPM -> halved
        assert_eq!(estimate_tempo(&periodic(0.3, 10), &config).bpm, 100.0);
        // 4 s -> 15 BPM -> doubled once only
        assert_eq!(estimate_tempo(&periodic(4.0, 10), &config).bpm, 30.0);
    }

    #[test]
    fn test_confidence_counts_mode_bucket() {
        let config = AnalysisConfig::default();
        // intervals: 0.5, 0.5, 0.5, 0.7 -> 3 of 4 agree
        let onsets = [0.0, 0.5, 1.0, 1.5, 2.2];
        let estimate = estimate_tempo(&onsets, &config);
        assert_eq!(estimate.bpm, 120.0);
        assert!((estimate.confidence - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_ties_prefer_first_interval() {
        let config = AnalysisConfig::default();
        // intervals: 0.6, 0.4, 0.6, 0.4
        let onsets = [0.0, 0.6, 1.0, 1.6, 2.0];
        let estimate = estimate_tempo(&onsets, &config);
        assert_eq!(estimate.bpm, 100.0);
        assert!((estimate.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_rounds_to_one_decimal() {
        let config = AnalysisConfig::default();
        // 0.47 s -> 127.659... BPM
        let estimate = estimate_tempo(&periodic(0.47, 20), &config);
        assert_eq!(estimate.bpm, 127.7);
    }
}
