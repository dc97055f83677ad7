//! Full analysis pipeline: samples -> energy -> onsets -> tempo -> grid

use crate::beatgrid::{generate_beat_grid_with_fallback, BeatGrid};
use crate::onset::detect_onsets;
use crate::preprocess::preprocess;
use crate::samples::AudioSamples;
use crate::tempo::estimate_tempo;
use crate::FALLBACK_BPM;

/// Tuning constants for the analysis pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Rate the input is decimated towards (Hz)
    pub target_sample_rate: u32,
    /// One-pole low-pass smoothing constant
    pub lowpass_alpha: f32,
    /// Half-width of the peak picking window (seconds)
    pub onset_window_secs: f64,
    /// Minimum distance between accepted onsets (seconds)
    pub min_onset_separation_secs: f64,
    /// Interval histogram bucket width (seconds)
    pub histogram_resolution_secs: f64,
    /// Tempo reported when nothing can be measured
    pub fallback_bpm: f64,
    /// Tempos below this are doubled once
    pub min_bpm: f64,
    /// Tempos above this are halved once
    pub max_bpm: f64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 11025,
            lowpass_alpha: 0.05,
            onset_window_secs: 0.05,
            min_onset_separation_secs: 0.3,
            histogram_resolution_secs: 0.01,
            fallback_bpm: FALLBACK_BPM,
            min_bpm: 60.0,
            max_bpm: 180.0,
        }
    }
}

/// Result of analysing one track
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisResult {
    /// Detected tempo
    pub bpm: f64,
    /// Uniform grid over the whole track
    pub beat_grid: BeatGrid,
    /// Confidence score (0.0 - 1.0) indicating detection reliability
    pub confidence: f64,
    /// Timestamp of the first detected onset, if any
    pub first_onset: Option<f64>,
}

impl AnalysisResult {
    /// Result for a track with no audio at all
    pub fn empty(config: &AnalysisConfig) -> Self {
        Self {
            bpm: config.fallback_bpm,
            beat_grid: BeatGrid::default(),
            confidence: 0.0,
            first_onset: None,
        }
    }
}

/// Stateless beat analyzer; safe to run on any thread
#[derive(Debug, Clone, Default)]
pub struct BeatAnalyzer {
    config: AnalysisConfig,
}

impl BeatAnalyzer {
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Analyze mono samples and build a beat grid
    ///
    /// Deterministic and infallible: silence yields the fallback tempo with
    /// zero confidence, zero-length audio additionally yields an empty grid.
    pub fn analyze(&self, samples: &AudioSamples) -> AnalysisResult {
        if samples.is_empty() || samples.sample_rate() == 0 {
            return AnalysisResult::empty(&self.config);
        }

        let pre = preprocess(samples, &self.config);
        let onsets = detect_onsets(&pre.energy, pre.sample_rate, &self.config);
        let tempo = estimate_tempo(&onsets, &self.config);
        let beat_grid = generate_beat_grid_with_fallback(
            tempo.bpm,
            samples.duration_secs(),
            self.config.fallback_bpm,
        );

        tracing::debug!(
            bpm = tempo.bpm,
            confidence = tempo.confidence,
            onsets = onsets.len(),
            beats = beat_grid.len(),
            "analysis finished"
        );

        AnalysisResult {
            bpm: tempo.bpm,
            beat_grid,
            confidence: tempo.confidence,
            first_onset: onsets.first().copied(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Click track with a short decaying burst on every beat
    fn click_track(bpm: f64, sample_rate: u32, duration_secs: f64) -> AudioSamples {
        let total = (sample_rate as f64 * duration_secs) as usize;
        let mut samples = vec![0.0f32; total];
        let samples_per_beat = 60.0 / bpm * sample_rate as f64;
        let click_len = (sample_rate as f64 * 0.01) as usize;

        let mut beat = 0usize;
        loop {
            let start = (beat as f64 * samples_per_beat).round() as usize;
            if start >= total {
                break;
            }
            for j in 0..click_len.min(total - start) {
                samples[start + j] = 1.0 - j as f32 / click_len as f32;
            }
            beat += 1;
        }

        AudioSamples::from_vec(samples, sample_rate)
    }

    #[test]
    fn test_empty_audio() {
        let analyzer = BeatAnalyzer::default();
        let result = analyzer.analyze(&AudioSamples::from_vec(Vec::new(), 44100));
        assert_eq!(result.bpm, 120.0);
        assert_eq!(result.confidence, 0.0);
        assert!(result.beat_grid.is_empty());
        assert_eq!(result.first_onset, None);
    }

    #[test]
    fn test_silence_uses_fallback() {
        let analyzer = BeatAnalyzer::default();
        let silence = AudioSamples::from_vec(vec![0.0; 44100 * 5], 44100);
        let result = analyzer.analyze(&silence);
        assert_eq!(result.bpm, 120.0);
        assert_eq!(result.confidence, 0.0);
        // Grid still spans the track
        assert_eq!(result.beat_grid.len(), 11);
    }

    #[test]
    fn test_silence_uses_configured_fallback() {
        let analyzer = BeatAnalyzer::new(AnalysisConfig {
            fallback_bpm: 100.0,
            ..AnalysisConfig::default()
        });
        let silence = AudioSamples::from_vec(vec![0.0; 44100 * 6], 44100);
        let result = analyzer.analyze(&silence);
        assert_eq!(result.bpm, 100.0);
        assert_eq!(result.beat_grid.bpm(), 100.0);
        assert_eq!(result.beat_grid.len(), 11);
    }

    #[test]
    fn test_click_track_120() {
        let analyzer = BeatAnalyzer::default();
        for rate in [44100, 48000] {
            let result = analyzer.analyze(&click_track(120.0, rate, 30.0));
            assert_eq!(result.bpm, 120.0);
            assert_eq!(result.confidence, 1.0);
            assert_eq!(result.beat_grid.len(), 61);
            assert_eq!(result.beat_grid.beat_time(0), Some(0.0));
            // The click at 0 s has no full left window, the next one is picked
            let first = result.first_onset.expect("click track has onsets");
            assert!((first - 0.5).abs() < 0.05, "first onset {first}");
        }
    }

    #[test]
    fn test_result_ranges() {
        let analyzer = BeatAnalyzer::default();
        for &(bpm, rate) in &[(100.0, 44100), (128.0, 48000), (140.0, 22050)] {
            let result = analyzer.analyze(&click_track(bpm, rate, 20.0));
            assert!((60.0..=180.0).contains(&result.bpm));
            assert!((0.0..=1.0).contains(&result.confidence));
            let interval = 60.0 / result.bpm;
            for pair in result.beat_grid.beats().windows(2) {
                assert!((pair[1] - pair[0] - interval).abs() < 1e-9);
            }
        }
    }
}
