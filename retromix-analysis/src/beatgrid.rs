//! Uniform beat grids for beat-relative navigation and deck sync

use crate::FALLBACK_BPM;

/// Fixed bar length used for beat-in-bar framing
pub const BEATS_PER_BAR: usize = 4;

/// Represents a beat grid for a track
///
/// Beats are timestamps in seconds, starting at 0 and spaced `60 / bpm`
/// apart. The grid is never adaptive: one tempo per analysis run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BeatGrid {
    bpm: f64,
    beats: Vec<f64>,
}

impl BeatGrid {
    /// BPM the grid was generated for (0.0 for an empty default grid)
    pub fn bpm(&self) -> f64 {
        self.bpm
    }

    /// Seconds between consecutive beats
    pub fn interval(&self) -> f64 {
        if self.bpm > 0.0 {
            60.0 / self.bpm
        } else {
            0.0
        }
    }

    pub fn beats(&self) -> &[f64] {
        &self.beats
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Timestamp of a beat index
    pub fn beat_time(&self, index: usize) -> Option<f64> {
        self.beats.get(index).copied()
    }

    /// Index of the beat closest to `time`. Ties go to the earlier beat.
    pub fn nearest_beat(&self, time: f64) -> Option<usize> {
        nearest_index(&self.beats, time, |_| true)
    }

    /// Closest beat to `time` whose position in the bar is `beat_in_bar`
    pub fn nearest_beat_in_bar(&self, time: f64, beat_in_bar: usize) -> Option<usize> {
        nearest_index(&self.beats, time, |i| i % BEATS_PER_BAR == beat_in_bar)
    }

    /// Position of a beat within its bar (0 = downbeat)
    pub fn beat_in_bar(index: usize) -> usize {
        index % BEATS_PER_BAR
    }

    /// Phase (0.0 - 1.0) within the beat nearest to `time`
    ///
    /// Negative when `time` sits just before its nearest beat.
    pub fn phase_at(&self, time: f64) -> Option<f64> {
        let index = self.nearest_beat(time)?;
        let start = self.beats[index];
        let next = self
            .beats
            .get(index + 1)
            .copied()
            .unwrap_or(start + self.interval());
        let span = next - start;
        if span <= 0.0 {
            return Some(0.0);
        }
        Some((time - start) / span)
    }
}

/// Nearest index in a sorted slice among indices accepted by `keep`
fn nearest_index(beats: &[f64], time: f64, keep: impl Fn(usize) -> bool) -> Option<usize> {
    let split = beats.partition_point(|&b| b < time);

    let before = (0..split).rev().find(|&i| keep(i));
    let after = (split..beats.len()).find(|&i| keep(i));

    match (before, after) {
        (Some(b), Some(a)) => {
            if (time - beats[b]).abs() <= (beats[a] - time).abs() {
                Some(b)
            } else {
                Some(a)
            }
        }
        (Some(b), None) => Some(b),
        (None, a) => a,
    }
}

fn is_valid_bpm(bpm: f64) -> bool {
    bpm.is_finite() && bpm > 0.0
}

/// Project a uniform beat timeline over `[0, duration]`
///
/// Produces `floor(duration / interval) + 1` beats. A non-positive or
/// non-finite BPM is a caller bug: it is logged and replaced by
/// [`FALLBACK_BPM`].
pub fn generate_beat_grid(bpm: f64, duration_secs: f64) -> BeatGrid {
    generate_beat_grid_with_fallback(bpm, duration_secs, FALLBACK_BPM)
}

/// Like [`generate_beat_grid`], but an invalid BPM is replaced by
/// `fallback_bpm` instead. [`FALLBACK_BPM`] is used only when the
/// fallback itself is invalid.
pub fn generate_beat_grid_with_fallback(
    bpm: f64,
    duration_secs: f64,
    fallback_bpm: f64,
) -> BeatGrid {
    let bpm = if is_valid_bpm(bpm) {
        bpm
    } else {
        tracing::warn!(bpm, fallback_bpm, "invalid BPM for beat grid");
        if is_valid_bpm(fallback_bpm) {
            fallback_bpm
        } else {
            FALLBACK_BPM
        }
    };

    if !duration_secs.is_finite() || duration_secs < 0.0 {
        return BeatGrid {
            bpm,
            beats: Vec::new(),
        };
    }

    let interval = 60.0 / bpm;
    let count = (duration_secs / interval).floor() as usize + 1;
    let beats = (0..count).map(|i| i as f64 * interval).collect();

    BeatGrid { bpm, beats }
}
