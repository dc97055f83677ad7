//! Energy peak picking
//!
//! A sample is an onset candidate when it is the strict maximum of the
//! window `[i - W, i + W]`. Candidates are accepted greedily left to right
//! with a minimum separation between accepted onsets.

use crate::analyzer::AnalysisConfig;
use std::collections::VecDeque;

/// Maximum of every `width`-long window: `out[k] = max(values[k..k + width])`
///
/// Monotonic deque, O(n) overall.
fn sliding_max(values: &[f32], width: usize) -> Vec<f32> {
    if width == 0 || values.len() < width {
        return Vec::new();
    }

    let mut out = Vec::with_capacity(values.len() - width + 1);
    // Indices with strictly decreasing values, front is the window max
    let mut window: VecDeque<usize> = VecDeque::with_capacity(width);

    for (i, &v) in values.iter().enumerate() {
        while let Some(&back) = window.back() {
            if values[back] <= v {
                window.pop_back();
            } else {
                break;
            }
        }
        window.push_back(i);

        if let Some(&front) = window.front() {
            if front + width <= i {
                window.pop_front();
            }
        }

        if i + 1 >= width {
            if let Some(&front) = window.front() {
                out.push(values[front]);
            }
        }
    }

    out
}

/// Peak picking half-width in samples, at least one
fn window_half_width(config: &AnalysisConfig, sample_rate: f64) -> usize {
    let samples = (config.onset_window_secs * sample_rate).round() as usize;
    samples.max(1)
}

/// Detect onset times (seconds) in an energy envelope
pub fn detect_onsets(energy: &[f32], sample_rate: f64, config: &AnalysisConfig) -> Vec<f64> {
    if energy.is_empty() || sample_rate <= 0.0 {
        return Vec::new();
    }

    let half_width = window_half_width(config, sample_rate);
    let min_distance = (config.min_onset_separation_secs * sample_rate).floor() as usize;
    let n = energy.len();

    if n <= 2 * half_width {
        return Vec::new();
    }

    // max(energy[k..k + W]); the left neighbourhood of i is block i - W,
    // the right neighbourhood is block i + 1
    let block_max = sliding_max(energy, half_width);

    let mut onsets = Vec::new();
    let mut last_peak: Option<usize> = None;

    for i in half_width..n - half_width {
        let value = energy[i];
        let is_peak = block_max[i - half_width] < value && block_max[i + 1] < value;
        if !is_peak {
            continue;
        }

        let far_enough = last_peak.map_or(true, |last| i - last >= min_distance);
        if far_enough {
            onsets.push(i as f64 / sample_rate);
            last_peak = Some(i);
        }
    }

    tracing::debug!(count = onsets.len(), "onset detection finished");
    onsets
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Reference O(n·W) scan, kept to check the deque version against
    fn naive_onsets(energy: &[f32], sample_rate: f64, config: &AnalysisConfig) -> Vec<f64> {
        let w = window_half_width(config, sample_rate);
        let min_distance = (config.min_onset_separation_secs * sample_rate).floor() as isize;
        let mut last = -min_distance;
        let mut out = Vec::new();
        if energy.len() <= 2 * w {
            return out;
        }
        for i in w..energy.len() - w {
            let peak = (i - w..=i + w).all(|j| j == i || energy[j] < energy[i]);
            if peak && i as isize - last >= min_distance {
                out.push(i as f64 / sample_rate);
                last = i as isize;
            }
        }
        out
    }

    /// Deterministic pseudo-random energy (xorshift)
    fn noisy_energy(len: usize, seed: u32) -> Vec<f32> {
        let mut state = seed.max(1);
        (0..len)
            .map(|_| {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                (state % 1000) as f32 / 1000.0
            })
            .collect()
    }

    #[test]
    fn test_sliding_max() {
        let values = [1.0, 3.0, 2.0, 5.0, 4.0, 1.0];
        assert_eq!(sliding_max(&values, 2), vec![3.0, 3.0, 5.0, 5.0, 4.0]);
        assert_eq!(sliding_max(&values, 3), vec![3.0, 5.0, 5.0, 5.0]);
        assert!(sliding_max(&values, 7).is_empty());
    }

    #[test]
    fn test_matches_naive_scan() {
        let config = AnalysisConfig::default();
        for seed in 1..6 {
            let energy = noisy_energy(5000, seed);
            let rate = 1000.0;
            assert_eq!(
                detect_onsets(&energy, rate, &config),
                naive_onsets(&energy, rate, &config)
            );
        }
    }

    #[test]
    fn test_silence_has_no_onsets() {
        let config = AnalysisConfig::default();
        let silence = vec![0.0; 10_000];
        assert!(detect_onsets(&silence, 11025.0, &config).is_empty());
        assert!(detect_onsets(&[], 11025.0, &config).is_empty());
    }

    #[test]
    fn test_plateau_is_not_a_strict_peak() {
        let config = AnalysisConfig::default();
        let rate = 100.0;
        let mut energy = vec![0.0f32; 200];
        energy[100] = 1.0;
        energy[101] = 1.0;
        assert!(detect_onsets(&energy, rate, &config).is_empty());
    }

    #[test]
    fn test_minimum_separation() {
        let config = AnalysisConfig::default();
        let rate = 100.0; // W = 5 samples, separation = 30 samples
        let mut energy = vec![0.0f32; 300];
        energy[50] = 1.0;
        energy[70] = 2.0; // isolated peak but only 0.2 s later
        energy[90] = 1.0;
        let onsets = detect_onsets(&energy, rate, &config);
        assert_eq!(onsets, vec![0.5, 0.9]);
    }
}
