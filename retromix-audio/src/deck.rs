//! Deck implementation - transport, loops and hot cues for one track
//!
//! The deck is the only mutable authority over its playback position.
//! Position is never polled from an audio callback: while playing it is
//! computed from a `(wall clock, track time)` anchor and the playback rate.

use crate::clock::Clock;
use crate::events::{DeckEvent, EventEmitter};
use retromix_analysis::{AnalysisResult, BeatGrid, DecodedBuffer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Number of hot cue slots per deck
pub const HOT_CUE_SLOTS: usize = 8;

/// Shortest loop `set_loop_points` will store (seconds)
pub const MIN_LOOP_LENGTH: f64 = 0.1;

/// Loop sizes (in beats) offered for beat-synced loops
pub const LOOP_SIZE_OPTIONS: [f64; 8] = [0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0, 32.0];

/// Default beat loop size
pub const DEFAULT_LOOP_BEATS: f64 = 4.0;

/// Loop length used when a track has no beat grid yet (seconds)
const GRIDLESS_LOOP_SECS: f64 = 4.0;

/// Default distance from a beat within which a beat pulse fires (seconds)
const DEFAULT_PULSE_WINDOW: f64 = 0.05;

static NEXT_TRACK_ID: AtomicU64 = AtomicU64::new(1);

/// Deck identifier (A = left, B = right)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeckId {
    A,
    B,
}

impl DeckId {
    pub fn index(self) -> usize {
        match self {
            DeckId::A => 0,
            DeckId::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            DeckId::A => DeckId::B,
            DeckId::B => DeckId::A,
        }
    }
}

impl fmt::Display for DeckId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeckId::A => write!(f, "A"),
            DeckId::B => write!(f, "B"),
        }
    }
}

/// Identity of one load of one buffer; used to drop stale analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TrackId(u64);

impl TrackId {
    pub(crate) fn next() -> Self {
        Self(NEXT_TRACK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Playback state for a deck
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// No track loaded
    #[default]
    Empty,
    /// Track loaded, not running
    Stopped,
    Playing,
    Paused,
}

/// Errors returned by deck operations
///
/// None of these are fatal: the deck is left unchanged and the caller
/// decides whether to surface the failure.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DeckError {
    #[error("no track loaded")]
    NoTrackLoaded,
    #[error("deck is not playing")]
    NotPlaying,
    #[error("playback rate must be finite and positive, got {0}")]
    InvalidPlaybackRate(f64),
    #[error("hot cue slot {0} does not exist")]
    InvalidHotCueSlot(usize),
    #[error("hot cue slot {0} is empty")]
    EmptyHotCue(usize),
    #[error("no loop points set")]
    NoLoopRegion,
    #[error("track has no beat grid")]
    NoBeatGrid,
    #[error("beat index {index} out of range (grid has {len} beats)")]
    BeatIndexOutOfRange { index: usize, len: usize },
    #[error("analysis for track {got} arrived after the deck moved on")]
    StaleAnalysis { got: TrackId },
    #[error("track is {0} s long, too short for a loop")]
    TrackTooShort(f64),
}

/// Start/end of a loop, in seconds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoopRegion {
    pub start: f64,
    pub end: f64,
    /// Set when the loop was built from the beat grid
    pub size_in_beats: Option<f64>,
}

impl LoopRegion {
    pub fn length(&self) -> f64 {
        self.end - self.start
    }
}

/// Pair of clock readings that pins track time to wall time
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct PositionAnchor {
    wall_clock: f64,
    track_time: f64,
}

/// Per-deck transport record, reset on every track load
#[derive(Debug, Clone, PartialEq)]
pub struct TransportState {
    pub duration: f64,
    pub playback_rate: f64,
    pub playback: PlaybackState,
    anchor: PositionAnchor,
    pub loop_region: Option<LoopRegion>,
    pub loop_enabled: bool,
    pub loop_size_beats: f64,
    pub hot_cues: [Option<f64>; HOT_CUE_SLOTS],
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            duration: 0.0,
            playback_rate: 1.0,
            playback: PlaybackState::Empty,
            anchor: PositionAnchor::default(),
            loop_region: None,
            loop_enabled: false,
            loop_size_beats: DEFAULT_LOOP_BEATS,
            hot_cues: [None; HOT_CUE_SLOTS],
        }
    }
}

/// Complete deck state for UI rendering
#[derive(Debug, Clone, PartialEq)]
pub struct DeckState {
    pub deck: DeckId,
    pub track: Option<TrackId>,
    pub playback: PlaybackState,
    pub position: f64, // seconds
    pub duration: f64, // seconds
    pub playback_rate: f64,
    pub bpm: Option<f64>, // detected BPM (adjusted for rate)
    pub confidence: f64,
    pub beat_counter: usize, // position within the bar (0-3)
    pub beat_phase: f64,     // phase within the nearest beat
    pub loop_region: Option<LoopRegion>,
    pub loop_enabled: bool,
    pub loop_size_beats: f64,
    pub hot_cues: [Option<f64>; HOT_CUE_SLOTS],
}

/// A single DJ deck
pub struct Deck {
    id: DeckId,
    clock: Arc<dyn Clock>,
    events: Arc<EventEmitter>,
    /// Decoded audio; None while empty
    buffer: Option<DecodedBuffer>,
    track: Option<TrackId>,
    transport: TransportState,
    /// Last analysis applied for the current track
    analysis: Option<AnalysisResult>,
    beat_counter: usize,
    beat_phase: f64,
    last_pulse: Option<usize>,
    pulse_window: f64,
}

impl Deck {
    /// Create a new empty deck
    pub fn new(id: DeckId, clock: Arc<dyn Clock>, events: Arc<EventEmitter>) -> Self {
        Self {
            id,
            clock,
            events,
            buffer: None,
            track: None,
            transport: TransportState::default(),
            analysis: None,
            beat_counter: 0,
            beat_phase: 0.0,
            last_pulse: None,
            pulse_window: DEFAULT_PULSE_WINDOW,
        }
    }

    pub fn id(&self) -> DeckId {
        self.id
    }

    fn fail<T>(&self, err: DeckError) -> Result<T, DeckError> {
        tracing::warn!(deck = %self.id, "{err}");
        Err(err)
    }

    fn emit(&self, event: DeckEvent) {
        self.events.emit(event);
    }

    /// Load a decoded buffer, replacing whatever was loaded
    ///
    /// A playing or paused deck is stopped first. Loop, hot cues and the
    /// previous analysis are cleared; the playback rate is kept.
    pub fn load(&mut self, buffer: DecodedBuffer) -> TrackId {
        if matches!(
            self.transport.playback,
            PlaybackState::Playing | PlaybackState::Paused
        ) {
            let _ = self.stop();
        }

        let track = TrackId::next();
        let duration = buffer.duration_secs();

        self.transport = TransportState {
            duration,
            playback_rate: self.transport.playback_rate,
            playback: PlaybackState::Stopped,
            loop_size_beats: self.transport.loop_size_beats,
            ..TransportState::default()
        };
        self.buffer = Some(buffer);
        self.track = Some(track);
        self.analysis = None;
        self.beat_counter = 0;
        self.beat_phase = 0.0;
        self.last_pulse = None;

        tracing::info!(deck = %self.id, %track, duration, "track loaded");
        self.emit(DeckEvent::HotCuesReset { deck: self.id });
        self.emit(DeckEvent::TrackLoaded {
            deck: self.id,
            track,
            duration,
        });
        track
    }

    /// Check if deck has a track loaded
    pub fn is_loaded(&self) -> bool {
        self.buffer.is_some()
    }

    pub fn buffer(&self) -> Option<&DecodedBuffer> {
        self.buffer.as_ref()
    }

    pub fn track(&self) -> Option<TrackId> {
        self.track
    }

    /// Attach an analysis result if it belongs to the loaded track
    pub fn apply_analysis(
        &mut self,
        track: TrackId,
        result: AnalysisResult,
    ) -> Result<(), DeckError> {
        if self.track != Some(track) {
            tracing::debug!(deck = %self.id, %track, "discarding stale analysis");
            return Err(DeckError::StaleAnalysis { got: track });
        }

        tracing::info!(
            deck = %self.id,
            bpm = result.bpm,
            confidence = result.confidence,
            "BPM detected"
        );
        let (bpm, confidence) = (result.bpm, result.confidence);
        self.analysis = Some(result);
        self.last_pulse = None;
        self.emit(DeckEvent::BpmDetected {
            deck: self.id,
            bpm,
            confidence,
        });

        if self.transport.loop_enabled {
            self.realign_loop_to_beats();
        }
        Ok(())
    }

    pub fn analysis(&self) -> Option<&AnalysisResult> {
        self.analysis.as_ref()
    }

    /// Detected BPM at rate 1.0, or 0.0 before analysis
    pub fn base_bpm(&self) -> f64 {
        self.analysis.as_ref().map_or(0.0, |a| a.bpm)
    }

    /// Base BPM scaled by the playback rate
    pub fn effective_bpm(&self) -> f64 {
        self.base_bpm() * self.transport.playback_rate
    }

    /// Get beat grid reference
    pub fn beat_grid(&self) -> Option<&BeatGrid> {
        self.analysis.as_ref().map(|a| &a.beat_grid)
    }

    fn usable_grid(&self) -> Option<&BeatGrid> {
        self.beat_grid().filter(|g| !g.is_empty())
    }

    pub fn transport(&self) -> &TransportState {
        &self.transport
    }

    pub fn playback_state(&self) -> PlaybackState {
        self.transport.playback
    }

    pub fn is_playing(&self) -> bool {
        self.transport.playback == PlaybackState::Playing
    }

    pub fn duration(&self) -> f64 {
        self.transport.duration
    }

    pub fn playback_rate(&self) -> f64 {
        self.transport.playback_rate
    }

    /// Current position in seconds
    ///
    /// Computed from the anchor while playing, so it never drifts from the
    /// clock it is anchored to.
    pub fn current_time(&self) -> f64 {
        let anchor = self.transport.anchor;
        if !self.is_playing() {
            return anchor.track_time;
        }
        let elapsed = (self.clock.now() - anchor.wall_clock).max(0.0);
        (anchor.track_time + elapsed * self.transport.playback_rate)
            .clamp(0.0, self.transport.duration)
    }

    fn anchor_at(&mut self, track_time: f64) {
        self.transport.anchor = PositionAnchor {
            wall_clock: self.clock.now(),
            track_time,
        };
    }

    fn clamp_time(&self, time: f64) -> f64 {
        if time.is_nan() {
            return 0.0;
        }
        time.clamp(0.0, self.transport.duration)
    }

    /// Start playback
    ///
    /// Resumes from the stored position, or from the loop start when the
    /// loop is active and the position is already at or past its end.
    pub fn play(&mut self) -> Result<(), DeckError> {
        if !self.is_loaded() {
            return self.fail(DeckError::NoTrackLoaded);
        }
        if self.is_playing() {
            return Ok(());
        }

        let mut start = self.transport.anchor.track_time;
        if let (true, Some(region)) = (self.transport.loop_enabled, self.transport.loop_region) {
            if start >= region.end {
                start = region.start;
            }
        }

        self.anchor_at(start);
        self.transport.playback = PlaybackState::Playing;
        tracing::debug!(deck = %self.id, position = start, "play");
        Ok(())
    }

    /// Pause playback, keeping the position
    pub fn pause(&mut self) -> Result<(), DeckError> {
        if !self.is_playing() {
            return self.fail(DeckError::NotPlaying);
        }
        let position = self.current_time();
        self.transport.anchor.track_time = position;
        self.transport.playback = PlaybackState::Paused;
        tracing::debug!(deck = %self.id, position, "pause");
        Ok(())
    }

    /// Stop playback and rewind to the start of the track
    ///
    /// Succeeds from `Playing` or `Paused`; `NotPlaying` otherwise.
    pub fn stop(&mut self) -> Result<(), DeckError> {
        match self.transport.playback {
            PlaybackState::Playing | PlaybackState::Paused => {
                self.transport.playback = PlaybackState::Stopped;
                self.transport.anchor.track_time = 0.0;
                self.last_pulse = None;
                tracing::debug!(deck = %self.id, "stop");
                Ok(())
            }
            PlaybackState::Empty | PlaybackState::Stopped => self.fail(DeckError::NotPlaying),
        }
    }

    /// Toggle play/pause
    pub fn toggle(&mut self) -> Result<(), DeckError> {
        if self.is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    /// Change the playback rate; in-flight playback is re-anchored
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<(), DeckError> {
        if !rate.is_finite() || rate <= 0.0 {
            return self.fail(DeckError::InvalidPlaybackRate(rate));
        }
        if self.is_playing() {
            let position = self.current_time();
            self.anchor_at(position);
        }
        self.transport.playback_rate = rate;
        self.emit(DeckEvent::RateChanged {
            deck: self.id,
            rate,
        });
        Ok(())
    }

    /// Move to `time` (clamped into the track), keeping the play state
    ///
    /// Returns the position actually used.
    pub fn jump_to_time(&mut self, time: f64) -> Result<f64, DeckError> {
        if !self.is_loaded() {
            return self.fail(DeckError::NoTrackLoaded);
        }
        let time = self.clamp_time(time);
        if self.is_playing() {
            self.anchor_at(time);
        } else {
            self.transport.anchor.track_time = time;
        }
        self.last_pulse = None;
        self.emit(DeckEvent::TimeChanged {
            deck: self.id,
            time,
        });
        Ok(time)
    }

    /// Move to a beat of the grid
    pub fn jump_to_beat(&mut self, index: usize) -> Result<f64, DeckError> {
        let Some(grid) = self.usable_grid() else {
            return self.fail(DeckError::NoBeatGrid);
        };
        let Some(time) = grid.beat_time(index) else {
            let len = grid.len();
            return self.fail(DeckError::BeatIndexOutOfRange { index, len });
        };
        self.jump_to_time(time)
    }

    /// Jump by N beats (positive = forward, negative = backward)
    pub fn beat_jump(&mut self, beats: i32) -> Result<f64, DeckError> {
        let Some(interval) = self.usable_grid().map(|g| g.interval()) else {
            return self.fail(DeckError::NoBeatGrid);
        };
        let target = self.current_time() + beats as f64 * interval;
        self.jump_to_time(target)
    }

    /// Store a loop region without moving playback
    ///
    /// The start is clamped into the track and the end is forced to at
    /// least `MIN_LOOP_LENGTH` past the start. A track shorter than
    /// `MIN_LOOP_LENGTH` cannot hold a loop and is rejected.
    pub fn set_loop_points(&mut self, start: f64, end: f64) -> Result<LoopRegion, DeckError> {
        self.store_loop(start, end, None)
    }

    fn store_loop(
        &mut self,
        start: f64,
        end: f64,
        size_in_beats: Option<f64>,
    ) -> Result<LoopRegion, DeckError> {
        if !self.is_loaded() {
            return self.fail(DeckError::NoTrackLoaded);
        }
        let duration = self.transport.duration;
        if duration < MIN_LOOP_LENGTH {
            return self.fail(DeckError::TrackTooShort(duration));
        }
        let latest_start = duration - MIN_LOOP_LENGTH;
        let start = if start.is_nan() {
            0.0
        } else {
            start.clamp(0.0, latest_start)
        };
        let end = if end.is_nan() {
            duration
        } else {
            end.min(duration)
        };
        let end = end.max(start + MIN_LOOP_LENGTH);

        let region = LoopRegion {
            start,
            end,
            size_in_beats,
        };
        self.transport.loop_region = Some(region);
        self.emit(DeckEvent::LoopPointsChanged {
            deck: self.id,
            start,
            end,
        });
        Ok(region)
    }

    pub fn loop_region(&self) -> Option<LoopRegion> {
        self.transport.loop_region
    }

    pub fn is_loop_enabled(&self) -> bool {
        self.transport.loop_enabled
    }

    /// Activate the stored loop, jumping back if already past its end
    pub fn enable_loop(&mut self) -> Result<(), DeckError> {
        if !self.is_loaded() {
            return self.fail(DeckError::NoTrackLoaded);
        }
        let Some(region) = self.transport.loop_region else {
            return self.fail(DeckError::NoLoopRegion);
        };

        self.transport.loop_enabled = true;
        self.emit(DeckEvent::LoopToggled {
            deck: self.id,
            enabled: true,
        });

        if self.current_time() >= region.end {
            self.jump_to_time(region.start)?;
        }
        Ok(())
    }

    pub fn disable_loop(&mut self) {
        if self.transport.loop_enabled {
            self.transport.loop_enabled = false;
            self.emit(DeckEvent::LoopToggled {
                deck: self.id,
                enabled: false,
            });
        }
    }

    /// Flip the loop; enabling without a region builds a beat loop here
    ///
    /// Returns whether the loop is now enabled.
    pub fn toggle_loop(&mut self) -> Result<bool, DeckError> {
        if self.transport.loop_enabled {
            self.disable_loop();
            return Ok(false);
        }
        if self.transport.loop_region.is_none() {
            self.set_beat_loop()?;
        }
        self.enable_loop()?;
        Ok(true)
    }

    /// Loop region of `loop_size_beats` starting on the beat nearest `time`
    fn beat_loop_bounds(&self, time: f64) -> (f64, f64, Option<f64>) {
        let size = self.transport.loop_size_beats;
        let Some(grid) = self.usable_grid() else {
            return (time, time + GRIDLESS_LOOP_SECS, None);
        };

        let index = grid.nearest_beat(time).unwrap_or(0);
        let start = grid.beats()[index];
        let whole_beats = (size.fract() == 0.0).then(|| index + size as usize);
        let end = whole_beats
            .and_then(|beat| grid.beat_time(beat))
            .unwrap_or(start + size * grid.interval());

        (start, end, Some(size))
    }

    /// Build a loop from the current position, snapped to the beat grid
    ///
    /// Without a grid the loop is four seconds long from the current
    /// position.
    pub fn set_beat_loop(&mut self) -> Result<LoopRegion, DeckError> {
        if !self.is_loaded() {
            return self.fail(DeckError::NoTrackLoaded);
        }
        let (start, end, size) = self.beat_loop_bounds(self.current_time());
        self.store_loop(start, end, size)
    }

    /// Re-snap an enabled loop to the beats around its current start
    fn realign_loop_to_beats(&mut self) {
        let Some(region) = self.transport.loop_region else {
            return;
        };
        if !self.transport.loop_enabled || self.usable_grid().is_none() {
            return;
        }
        let (start, end, size) = self.beat_loop_bounds(region.start);
        let _ = self.store_loop(start, end, size);
    }

    pub fn loop_size_beats(&self) -> f64 {
        self.transport.loop_size_beats
    }

    /// Set the beat loop size, snapped to the nearest offered size
    ///
    /// Returns the size actually used.
    pub fn set_loop_size(&mut self, size: f64) -> f64 {
        let mut snapped = LOOP_SIZE_OPTIONS[0];
        for option in LOOP_SIZE_OPTIONS {
            if (size - option).abs() < (size - snapped).abs() {
                snapped = option;
            }
        }
        self.transport.loop_size_beats = snapped;
        if self.transport.loop_enabled {
            self.realign_loop_to_beats();
        }
        snapped
    }

    fn loop_size_index(&self) -> usize {
        let size = self.transport.loop_size_beats;
        LOOP_SIZE_OPTIONS
            .iter()
            .position(|&option| option == size)
            .unwrap_or(4)
    }

    pub fn double_loop_size(&mut self) -> f64 {
        let last = LOOP_SIZE_OPTIONS.len() - 1;
        let index = (self.loop_size_index() + 1).min(last);
        self.set_loop_size(LOOP_SIZE_OPTIONS[index])
    }

    pub fn halve_loop_size(&mut self) -> f64 {
        let index = self.loop_size_index().saturating_sub(1);
        self.set_loop_size(LOOP_SIZE_OPTIONS[index])
    }

    fn check_slot(&self, index: usize) -> Result<(), DeckError> {
        if index >= HOT_CUE_SLOTS {
            return self.fail(DeckError::InvalidHotCueSlot(index));
        }
        Ok(())
    }

    /// Store a hot cue; the current position is used when none is given
    ///
    /// Returns the stored (clamped) position.
    pub fn set_hot_cue(&mut self, index: usize, position: Option<f64>) -> Result<f64, DeckError> {
        self.check_slot(index)?;
        if !self.is_loaded() {
            return self.fail(DeckError::NoTrackLoaded);
        }
        let position = position.unwrap_or_else(|| self.current_time());
        let position = self.clamp_time(position);
        self.transport.hot_cues[index] = Some(position);
        self.emit(DeckEvent::HotCueSet {
            deck: self.id,
            index,
            position,
        });
        Ok(position)
    }

    pub fn hot_cue(&self, index: usize) -> Option<f64> {
        self.transport.hot_cues.get(index).copied().flatten()
    }

    pub fn hot_cues(&self) -> &[Option<f64>; HOT_CUE_SLOTS] {
        &self.transport.hot_cues
    }

    /// Jump to a stored hot cue
    pub fn jump_to_hot_cue(&mut self, index: usize) -> Result<f64, DeckError> {
        self.check_slot(index)?;
        let Some(position) = self.transport.hot_cues[index] else {
            return self.fail(DeckError::EmptyHotCue(index));
        };
        let position = self.jump_to_time(position)?;
        self.emit(DeckEvent::HotCueJump {
            deck: self.id,
            index,
            position,
        });
        Ok(position)
    }

    pub fn clear_hot_cue(&mut self, index: usize) -> Result<(), DeckError> {
        self.check_slot(index)?;
        self.transport.hot_cues[index] = None;
        self.emit(DeckEvent::HotCueCleared {
            deck: self.id,
            index,
        });
        Ok(())
    }

    /// Playback reached the end of the buffer
    pub fn on_playback_complete(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.transport.playback = PlaybackState::Stopped;
        self.transport.anchor.track_time = 0.0;
        self.last_pulse = None;
        tracing::debug!(deck = %self.id, "track ended");
        self.emit(DeckEvent::TrackEnded { deck: self.id });
    }

    /// Set the distance from a beat within which a beat pulse is emitted
    pub fn set_beat_pulse_window(&mut self, secs: f64) {
        self.pulse_window = secs.max(0.0);
    }

    /// Current position within the bar (0-3)
    pub fn beat_counter(&self) -> usize {
        self.beat_counter
    }

    /// Phase within the nearest beat, updated on every monitor tick
    pub fn beat_phase(&self) -> f64 {
        self.beat_phase
    }

    /// Once-per-frame check: loop enforcement, track end, beat telemetry
    ///
    /// Loop-back precision is bounded by how often this runs.
    pub fn monitor_tick(&mut self) {
        if !self.is_playing() {
            return;
        }

        let mut now = self.current_time();

        if let (true, Some(region)) = (self.transport.loop_enabled, self.transport.loop_region) {
            if now >= region.end {
                tracing::trace!(deck = %self.id, from = now, to = region.start, "loop back");
                if let Ok(time) = self.jump_to_time(region.start) {
                    now = time;
                }
            }
        }

        if now >= self.transport.duration {
            self.on_playback_complete();
            return;
        }

        self.update_beat_tracking(now);
    }

    fn update_beat_tracking(&mut self, now: f64) {
        let Some(grid) = self.usable_grid() else {
            return;
        };
        let Some(index) = grid.nearest_beat(now) else {
            return;
        };
        let distance = (now - grid.beats()[index]).abs();
        let phase = grid.phase_at(now).unwrap_or(0.0);

        self.beat_counter = BeatGrid::beat_in_bar(index);
        self.beat_phase = phase;

        if distance < self.pulse_window && self.last_pulse != Some(index) {
            self.last_pulse = Some(index);
            self.emit(DeckEvent::BeatPulse {
                deck: self.id,
                beat_index: index,
                beat_in_bar: self.beat_counter,
            });
        }
    }

    /// Get deck state for UI
    pub fn state(&self) -> DeckState {
        let bpm = self.analysis.as_ref().map(|_| self.effective_bpm());
        DeckState {
            deck: self.id,
            track: self.track,
            playback: self.transport.playback,
            position: self.current_time(),
            duration: self.transport.duration,
            playback_rate: self.transport.playback_rate,
            bpm,
            confidence: self.analysis.as_ref().map_or(0.0, |a| a.confidence),
            beat_counter: self.beat_counter,
            beat_phase: self.beat_phase,
            loop_region: self.transport.loop_region,
            loop_enabled: self.transport.loop_enabled,
            loop_size_beats: self.transport.loop_size_beats,
            hot_cues: self.transport.hot_cues,
        }
    }
}

impl fmt::Debug for Deck {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deck")
            .field("id", &self.id)
            .field("track", &self.track)
            .field("transport", &self.transport)
            .field("bpm", &self.base_bpm())
            .finish()
    }
}
