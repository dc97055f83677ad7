//! Console - two decks, the analysis worker and the per-frame tick
//!
//! All transport state lives on the control thread. The only work that
//! leaves it is beat analysis, whose results come back through tickets
//! polled in `tick()`.

use crate::clock::{Clock, SystemClock};
use crate::config::ConsoleConfig;
use crate::deck::{Deck, DeckError, DeckId, DeckState, TrackId};
use crate::events::{DeckEvent, EventEmitter};
use crate::mixer::Mixer;
use crate::sync::{
    PhaseAlignment, SyncEngine, SyncError, SyncRelationship, SyncReport, SyncSettings,
};
use crate::worker::{AnalysisError, AnalysisJob, AnalysisOutcome, AnalysisTicket, AnalysisWorker};
use retromix_analysis::DecodedBuffer;
use std::sync::Arc;

/// Target frame rate for `tick()` callers
pub const TICK_RATE_HZ: u32 = 60;

/// Two-deck console
pub struct Console {
    decks: [Deck; 2],
    events: Arc<EventEmitter>,
    clock: Arc<dyn Clock>,
    worker: AnalysisWorker,
    sync: SyncEngine,
    mixer: Mixer,
    /// At most one in-flight analysis per deck
    pending: [Option<AnalysisTicket>; 2],
}

impl Console {
    /// Create a console driven by the system clock
    pub fn new(config: &ConsoleConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock::new()))
    }

    /// Create a console driven by `clock`
    pub fn with_clock(config: &ConsoleConfig, clock: Arc<dyn Clock>) -> Self {
        let events = Arc::new(EventEmitter::new());
        let make_deck = |id| {
            let mut deck = Deck::new(id, Arc::clone(&clock), Arc::clone(&events));
            deck.set_beat_pulse_window(config.beat_pulse_window_secs());
            deck.set_loop_size(config.default_loop_beats);
            deck
        };
        let decks = [make_deck(DeckId::A), make_deck(DeckId::B)];

        Self {
            decks,
            events,
            clock,
            worker: AnalysisWorker::new(config.analysis_config()),
            sync: SyncEngine::new(config.sync_settings(), config.phase_tolerance_secs()),
            mixer: Mixer::new(),
            pending: [None, None],
        }
    }

    pub fn events(&self) -> &Arc<EventEmitter> {
        &self.events
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn deck(&self, id: DeckId) -> &Deck {
        &self.decks[id.index()]
    }

    pub fn deck_mut(&mut self, id: DeckId) -> &mut Deck {
        &mut self.decks[id.index()]
    }

    /// Get deck state for UI
    pub fn deck_state(&self, id: DeckId) -> DeckState {
        self.deck(id).state()
    }

    pub fn mixer(&self) -> &Mixer {
        &self.mixer
    }

    pub fn mixer_mut(&mut self) -> &mut Mixer {
        &mut self.mixer
    }

    pub fn sync_settings(&self) -> SyncSettings {
        self.sync.settings()
    }

    pub fn set_sync_settings(&mut self, settings: SyncSettings) {
        self.sync.set_settings(settings);
    }

    /// Load a buffer into a deck and start analyzing it off-thread
    ///
    /// Any analysis still running for the previous track on this deck is
    /// abandoned.
    pub fn load_track(&mut self, id: DeckId, buffer: DecodedBuffer) -> TrackId {
        let samples = buffer.analysis_samples();
        let track = self.deck_mut(id).load(buffer);

        let job = AnalysisJob {
            deck: id,
            track,
            samples,
        };
        self.pending[id.index()] = match self.worker.submit(job) {
            Ok(ticket) => Some(ticket),
            Err(err) => {
                self.analysis_failed(id, &err);
                None
            }
        };
        track
    }

    /// True while an analysis for `id` is in flight
    pub fn is_analyzing(&self, id: DeckId) -> bool {
        self.pending[id.index()].is_some()
    }

    fn analysis_failed(&self, id: DeckId, err: &AnalysisError) {
        tracing::warn!(deck = %id, error = %err, "beat analysis failed");
        self.events.emit(DeckEvent::AnalysisFailed {
            deck: id,
            reason: err.to_string(),
        });
    }

    fn finish_analysis(&mut self, id: DeckId, outcome: Result<AnalysisOutcome, AnalysisError>) {
        match outcome {
            Ok(AnalysisOutcome { track, result, .. }) => {
                // A stale result is already logged by the deck
                let _ = self.deck_mut(id).apply_analysis(track, result);
            }
            Err(err) => self.analysis_failed(id, &err),
        }
    }

    /// Apply any analysis results that have arrived
    pub fn poll_analysis(&mut self) {
        for id in [DeckId::A, DeckId::B] {
            let slot = &mut self.pending[id.index()];
            let Some(outcome) = slot.as_ref().and_then(AnalysisTicket::try_take) else {
                continue;
            };
            *slot = None;
            self.finish_analysis(id, outcome);
        }
    }

    /// Block until the pending analysis for `id` (if any) has been applied
    pub fn wait_for_analysis(&mut self, id: DeckId) -> Result<(), AnalysisError> {
        let Some(ticket) = self.pending[id.index()].take() else {
            return Ok(());
        };
        match ticket.wait() {
            Ok(outcome) => {
                self.finish_analysis(id, Ok(outcome));
                Ok(())
            }
            Err(err) => {
                self.analysis_failed(id, &err);
                Err(err)
            }
        }
    }

    /// Per-frame work: collect analysis, then run each deck's monitor
    pub fn tick(&mut self) {
        self.poll_analysis();
        for deck in &mut self.decks {
            deck.monitor_tick();
        }
    }

    /// Split borrow: `(source, target)` where target is the other deck
    fn pair_mut(&mut self, source: DeckId) -> (&Deck, &mut Deck) {
        let [a, b] = &mut self.decks;
        match source {
            DeckId::A => (&*a, b),
            DeckId::B => (&*b, a),
        }
    }

    /// Sync the other deck to `source` using the current settings
    pub fn sync_to(&mut self, source: DeckId) -> SyncReport {
        let engine = self.sync.clone();
        let (source, target) = self.pair_mut(source);
        engine.sync_deck(source, target)
    }

    pub fn sync_tempo_to(&mut self, source: DeckId) -> Result<f64, SyncError> {
        let engine = self.sync.clone();
        let (source, target) = self.pair_mut(source);
        engine.sync_tempo(source, target)
    }

    pub fn sync_phase_to(&mut self, source: DeckId) -> Result<PhaseAlignment, SyncError> {
        let engine = self.sync.clone();
        let (source, target) = self.pair_mut(source);
        engine.sync_phase(source, target)
    }

    /// How the other deck currently relates to `source`
    pub fn relationship(&self, source: DeckId) -> SyncRelationship {
        let target = self.deck(source.other());
        self.sync.relationship(self.deck(source), target)
    }

    /// Start both loaded decks together
    pub fn play_all(&mut self) -> Result<(), DeckError> {
        for deck in &mut self.decks {
            if deck.is_loaded() {
                deck.play()?;
            }
        }
        Ok(())
    }
}
