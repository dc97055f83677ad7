//! Sync engine - tempo and phase alignment between two decks

use crate::deck::{Deck, DeckError};
use retromix_analysis::BeatGrid;
use thiserror::Error;

/// Default phase tolerance below which decks count as aligned (seconds)
pub const DEFAULT_PHASE_TOLERANCE: f64 = 0.01;

/// Which sync steps `sync_deck` applies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncSettings {
    pub tempo_sync: bool,
    pub phase_sync: bool,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            tempo_sync: true,
            phase_sync: true,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyncError {
    #[error("cannot sync BPM {target_bpm} to BPM {source_bpm}")]
    InvalidBpm { source_bpm: f64, target_bpm: f64 },
    #[error("both decks need a beat grid for phase sync")]
    MissingBeatGrid,
    #[error("target deck is not playing")]
    TargetNotPlaying,
    #[error("target grid has no beat at bar position {0}")]
    NoMatchingBeat(usize),
    #[error(transparent)]
    Deck(#[from] DeckError),
}

/// Outcome of a successful phase sync
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PhaseAlignment {
    /// Target jumped to `beat_index`; `offset` is how far off it was
    Adjusted {
        beat_index: usize,
        offset: f64,
    },
    AlreadyAligned {
        offset: f64,
    },
}

/// Per-step results of `sync_deck`; `None` when the step is disabled
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SyncReport {
    pub tempo: Option<Result<f64, SyncError>>,
    pub phase: Option<Result<PhaseAlignment, SyncError>>,
}

impl SyncReport {
    /// True when every step that ran succeeded
    pub fn is_ok(&self) -> bool {
        self.tempo.as_ref().map_or(true, Result::is_ok)
            && self.phase.as_ref().map_or(true, Result::is_ok)
    }
}

/// Snapshot of how two decks relate, for display
///
/// Never stored; derive it again whenever either deck changes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncRelationship {
    pub source_bpm: f64,
    pub target_base_bpm: f64,
    /// Rate the target needs to match the source tempo
    pub tempo_ratio: Option<f64>,
    /// Target's distance from its bar-matched beat (seconds)
    pub phase_offset: Option<f64>,
}

/// Matched beat on the target grid and the target's offset from it
fn bar_matched_beat(source: &Deck, target: &Deck) -> Result<(usize, f64), SyncError> {
    let (Some(source_grid), Some(target_grid)) = (grid_of(source), grid_of(target)) else {
        return Err(SyncError::MissingBeatGrid);
    };

    let source_time = source.current_time();
    let source_beat = source_grid
        .nearest_beat(source_time)
        .ok_or(SyncError::MissingBeatGrid)?;
    let bar_position = BeatGrid::beat_in_bar(source_beat);

    let target_time = target.current_time();
    let beat_index = target_grid
        .nearest_beat_in_bar(target_time, bar_position)
        .ok_or(SyncError::NoMatchingBeat(bar_position))?;
    let offset = target_time - target_grid.beats()[beat_index];

    Ok((beat_index, offset))
}

fn grid_of(deck: &Deck) -> Option<&BeatGrid> {
    deck.beat_grid().filter(|g| !g.is_empty())
}

/// Applies tempo and phase sync from a source deck to a target deck
#[derive(Debug, Clone)]
pub struct SyncEngine {
    settings: SyncSettings,
    phase_tolerance: f64,
}

impl Default for SyncEngine {
    fn default() -> Self {
        Self::new(SyncSettings::default(), DEFAULT_PHASE_TOLERANCE)
    }
}

impl SyncEngine {
    pub fn new(settings: SyncSettings, phase_tolerance: f64) -> Self {
        Self {
            settings,
            phase_tolerance: phase_tolerance.max(0.0),
        }
    }

    pub fn settings(&self) -> SyncSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: SyncSettings) {
        self.settings = settings;
    }

    pub fn phase_tolerance(&self) -> f64 {
        self.phase_tolerance
    }

    /// Match the target's tempo to the source's effective tempo
    ///
    /// Returns the playback rate applied to the target.
    pub fn sync_tempo(&self, source: &Deck, target: &mut Deck) -> Result<f64, SyncError> {
        let source_bpm = source.base_bpm();
        let target_bpm = target.base_bpm();
        if source_bpm <= 0.0 || target_bpm <= 0.0 {
            let err = SyncError::InvalidBpm {
                source_bpm,
                target_bpm,
            };
            tracing::warn!(source = %source.id(), target = %target.id(), "{err}");
            return Err(err);
        }

        let rate = source.effective_bpm() / target_bpm;
        target.set_playback_rate(rate)?;
        tracing::info!(
            source = %source.id(),
            target = %target.id(),
            rate,
            bpm = source.effective_bpm(),
            "tempo synced"
        );
        Ok(rate)
    }

    /// Move the target onto the beat that shares the source's bar position
    pub fn sync_phase(
        &self,
        source: &Deck,
        target: &mut Deck,
    ) -> Result<PhaseAlignment, SyncError> {
        if grid_of(source).is_none() || grid_of(target).is_none() {
            tracing::warn!(
                source = %source.id(),
                target = %target.id(),
                "phase sync without beat grid"
            );
            return Err(SyncError::MissingBeatGrid);
        }
        if !target.is_playing() {
            tracing::warn!(target = %target.id(), "phase sync on a stopped deck");
            return Err(SyncError::TargetNotPlaying);
        }

        let (beat_index, offset) = bar_matched_beat(source, target)?;
        if offset.abs() <= self.phase_tolerance {
            tracing::debug!(target = %target.id(), offset, "already in phase");
            return Ok(PhaseAlignment::AlreadyAligned { offset });
        }

        target.jump_to_beat(beat_index)?;
        tracing::info!(target = %target.id(), beat_index, offset, "phase synced");
        Ok(PhaseAlignment::Adjusted { beat_index, offset })
    }

    /// Run the enabled sync steps, tempo first
    pub fn sync_deck(&self, source: &Deck, target: &mut Deck) -> SyncReport {
        let tempo = self
            .settings
            .tempo_sync
            .then(|| self.sync_tempo(source, target));
        let phase = self
            .settings
            .phase_sync
            .then(|| self.sync_phase(source, target));
        SyncReport { tempo, phase }
    }

    /// Current relationship between two decks
    pub fn relationship(&self, source: &Deck, target: &Deck) -> SyncRelationship {
        let source_bpm = source.effective_bpm();
        let target_base_bpm = target.base_bpm();
        let tempo_ratio =
            (source_bpm > 0.0 && target_base_bpm > 0.0).then(|| source_bpm / target_base_bpm);
        let phase_offset = bar_matched_beat(source, target).ok().map(|(_, o)| o);
        SyncRelationship {
            source_bpm,
            target_base_bpm,
            tempo_ratio,
            phase_offset,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::deck::DeckId;
    use crate::events::EventEmitter;
    use retromix_analysis::{generate_beat_grid, AnalysisResult, DecodedBuffer};
    use std::sync::Arc;

    fn deck(id: DeckId, clock: &Arc<ManualClock>, bpm: Option<f64>) -> Deck {
        let mut deck = Deck::new(id, clock.clone(), Arc::new(EventEmitter::new()));
        let buffer = DecodedBuffer::mono(vec![0.0; 60_000], 1000).unwrap();
        let track = deck.load(buffer);
        if let Some(bpm) = bpm {
            let result = AnalysisResult {
                bpm,
                beat_grid: generate_beat_grid(bpm, 60.0),
                confidence: 1.0,
                first_onset: Some(0.0),
            };
            deck.apply_analysis(track, result).unwrap();
        }
        deck
    }

    fn pair(source_bpm: Option<f64>, target_bpm: Option<f64>) -> (Deck, Deck, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let a = deck(DeckId::A, &clock, source_bpm);
        let b = deck(DeckId::B, &clock, target_bpm);
        (a, b, clock)
    }

    #[test]
    fn test_tempo_sync_rate() {
        let (mut source, mut target, _clock) = pair(Some(128.0), Some(120.0));
        source.set_playback_rate(1.2).unwrap();

        let rate = SyncEngine::default()
            .sync_tempo(&source, &mut target)
            .unwrap();
        assert!((rate - 1.28).abs() < 1e-9);
        assert!((target.playback_rate() - 1.28).abs() < 1e-9);
        let drift = target.effective_bpm() - source.effective_bpm();
        assert!(drift.abs() < 1e-9);
    }

    #[test]
    fn test_tempo_sync_needs_both_bpms() {
        let (source, mut target, _clock) = pair(None, Some(120.0));
        let err = SyncEngine::default()
            .sync_tempo(&source, &mut target)
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::InvalidBpm {
                source_bpm: 0.0,
                target_bpm: 120.0
            }
        );
        assert_eq!(target.playback_rate(), 1.0);
    }

    #[test]
    fn test_phase_sync_preconditions() {
        let engine = SyncEngine::default();
        let (source, mut target, _clock) = pair(Some(120.0), None);
        target.play().unwrap();
        assert_eq!(
            engine.sync_phase(&source, &mut target),
            Err(SyncError::MissingBeatGrid)
        );

        let (source, mut target, _clock) = pair(Some(120.0), Some(120.0));
        assert_eq!(
            engine.sync_phase(&source, &mut target),
            Err(SyncError::TargetNotPlaying)
        );
    }

    #[test]
    fn test_phase_sync_matches_bar_position() {
        let engine = SyncEngine::default();
        let (mut source, mut target, _clock) = pair(Some(120.0), Some(120.0));
        // Source on beat 5 (bar position 1)
        source.jump_to_time(2.5).unwrap();
        // Target nearest beat with bar position 1 is beat 9 (4.5 s)
        target.jump_to_time(4.3).unwrap();
        target.play().unwrap();

        let alignment = engine.sync_phase(&source, &mut target).unwrap();
        match alignment {
            PhaseAlignment::Adjusted { beat_index, offset } => {
                assert_eq!(beat_index, 9);
                assert!((offset + 0.2).abs() < 1e-9);
            }
            other => panic!("expected adjustment, got {other:?}"),
        }
        assert!((target.current_time() - 4.5).abs() < 1e-9);
    }

    #[test]
    fn test_phase_sync_is_idempotent() {
        let engine = SyncEngine::default();
        let (mut source, mut target, _clock) = pair(Some(120.0), Some(120.0));
        source.jump_to_time(7.1).unwrap();
        target.jump_to_time(20.37).unwrap();
        target.play().unwrap();

        assert!(matches!(
            engine.sync_phase(&source, &mut target),
            Ok(PhaseAlignment::Adjusted { .. })
        ));
        let position = target.current_time();

        let second = engine.sync_phase(&source, &mut target).unwrap();
        assert_eq!(second, PhaseAlignment::AlreadyAligned { offset: 0.0 });
        assert_eq!(target.current_time(), position);
    }

    #[test]
    fn test_small_offset_within_tolerance() {
        let engine = SyncEngine::default();
        let (source, mut target, _clock) = pair(Some(120.0), Some(120.0));
        target.jump_to_time(0.005).unwrap();
        target.play().unwrap();
        match engine.sync_phase(&source, &mut target).unwrap() {
            PhaseAlignment::AlreadyAligned { offset } => assert!((offset - 0.005).abs() < 1e-9),
            other => panic!("expected no adjustment, got {other:?}"),
        }
    }

    #[test]
    fn test_sync_deck_respects_settings() {
        let (source, mut target, _clock) = pair(Some(128.0), Some(120.0));
        let engine = SyncEngine::new(
            SyncSettings {
                tempo_sync: true,
                phase_sync: false,
            },
            DEFAULT_PHASE_TOLERANCE,
        );
        let report = engine.sync_deck(&source, &mut target);
        assert!(report.is_ok());
        assert!(report.phase.is_none());
        assert!((target.playback_rate() - 128.0 / 120.0).abs() < 1e-9);

        // Phase step fails on a stopped target; tempo still applies
        let report = SyncEngine::default().sync_deck(&source, &mut target);
        assert!(matches!(report.tempo, Some(Ok(_))));
        assert_eq!(report.phase, Some(Err(SyncError::TargetNotPlaying)));
        assert!(!report.is_ok());
    }

    #[test]
    fn test_relationship() {
        let engine = SyncEngine::default();
        let (source, mut target, _clock) = pair(Some(130.0), Some(100.0));
        target.jump_to_time(1.9).unwrap();
        let rel = engine.relationship(&source, &target);
        assert!((rel.tempo_ratio.unwrap() - 1.3).abs() < 1e-9);
        // Source at beat 0, target nearest downbeat is beat 0 at 0.0 or beat 4 at 2.4
        assert!((rel.phase_offset.unwrap() + 0.5).abs() < 1e-9);

        let (source, target, _clock) = pair(None, Some(100.0));
        let rel = engine.relationship(&source, &target);
        assert_eq!(rel.tempo_ratio, None);
        assert_eq!(rel.phase_offset, None);
    }
}
