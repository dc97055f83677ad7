//! Deck engine for RetroMix - transport, sync and analysis orchestration
//!
//! This module provides the control side of a two-deck console:
//! - Deck: transport with loops, hot cues and beat telemetry
//! - Sync: tempo and phase alignment between decks
//! - Worker: off-thread beat analysis with stale-result protection
//! - Mixer: crossfader curves and master volume
//! - Events: pub/sub notifications for UI layers

mod clock;
mod config;
mod deck;
mod engine;
mod events;
mod mixer;
mod sync;
mod worker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{ConfigError, ConsoleConfig};
pub use deck::{
    Deck, DeckError, DeckId, DeckState, LoopRegion, PlaybackState, TrackId, TransportState,
    DEFAULT_LOOP_BEATS, HOT_CUE_SLOTS, LOOP_SIZE_OPTIONS, MIN_LOOP_LENGTH,
};
pub use engine::{Console, TICK_RATE_HZ};
pub use events::{DeckEvent, EventEmitter, EventKind, SubscriptionId};
pub use mixer::{CrossfaderCurve, Mixer};
pub use sync::{
    PhaseAlignment, SyncEngine, SyncError, SyncRelationship, SyncReport, SyncSettings,
    DEFAULT_PHASE_TOLERANCE,
};
pub use worker::{AnalysisError, AnalysisJob, AnalysisOutcome, AnalysisTicket, AnalysisWorker};
