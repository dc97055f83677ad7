//! Deck notifications and the pub/sub emitter that carries them
//!
//! The core never talks to a UI directly. Callers subscribe either with a
//! callback (`on`, `on_any`) or with a channel receiver (`subscribe`) and
//! the decks emit into whatever is registered.

use crate::deck::{DeckId, TrackId};
use crossbeam_channel::{Receiver, Sender};
use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Notifications produced by decks and the console
#[derive(Debug, Clone, PartialEq)]
pub enum DeckEvent {
    /// New buffer accepted; analysis has been requested
    TrackLoaded {
        deck: DeckId,
        track: TrackId,
        duration: f64,
    },
    /// Analysis result attached to the deck
    BpmDetected {
        deck: DeckId,
        bpm: f64,
        confidence: f64,
    },
    /// Off-thread analysis failed; previous BPM kept
    AnalysisFailed {
        deck: DeckId,
        reason: String,
    },
    /// Playback position moved by a seek, jump or loop
    TimeChanged {
        deck: DeckId,
        time: f64,
    },
    RateChanged {
        deck: DeckId,
        rate: f64,
    },
    LoopPointsChanged {
        deck: DeckId,
        start: f64,
        end: f64,
    },
    LoopToggled {
        deck: DeckId,
        enabled: bool,
    },
    HotCueSet {
        deck: DeckId,
        index: usize,
        position: f64,
    },
    HotCueCleared {
        deck: DeckId,
        index: usize,
    },
    HotCueJump {
        deck: DeckId,
        index: usize,
        position: f64,
    },
    HotCuesReset {
        deck: DeckId,
    },
    TrackEnded {
        deck: DeckId,
    },
    /// Playback crossed a beat of the grid
    BeatPulse {
        deck: DeckId,
        beat_index: usize,
        beat_in_bar: usize,
    },
}

/// Discriminant of [`DeckEvent`] used for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    TrackLoaded,
    BpmDetected,
    AnalysisFailed,
    TimeChanged,
    RateChanged,
    LoopPointsChanged,
    LoopToggled,
    HotCueSet,
    HotCueCleared,
    HotCueJump,
    HotCuesReset,
    TrackEnded,
    BeatPulse,
}

impl DeckEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            DeckEvent::TrackLoaded { .. } => EventKind::TrackLoaded,
            DeckEvent::BpmDetected { .. } => EventKind::BpmDetected,
            DeckEvent::AnalysisFailed { .. } => EventKind::AnalysisFailed,
            DeckEvent::TimeChanged { .. } => EventKind::TimeChanged,
            DeckEvent::RateChanged { .. } => EventKind::RateChanged,
            DeckEvent::LoopPointsChanged { .. } => EventKind::LoopPointsChanged,
            DeckEvent::LoopToggled { .. } => EventKind::LoopToggled,
            DeckEvent::HotCueSet { .. } => EventKind::HotCueSet,
            DeckEvent::HotCueCleared { .. } => EventKind::HotCueCleared,
            DeckEvent::HotCueJump { .. } => EventKind::HotCueJump,
            DeckEvent::HotCuesReset { .. } => EventKind::HotCuesReset,
            DeckEvent::TrackEnded { .. } => EventKind::TrackEnded,
            DeckEvent::BeatPulse { .. } => EventKind::BeatPulse,
        }
    }

    /// Deck the event belongs to
    pub fn deck(&self) -> DeckId {
        match *self {
            DeckEvent::TrackLoaded { deck, .. }
            | DeckEvent::BpmDetected { deck, .. }
            | DeckEvent::AnalysisFailed { deck, .. }
            | DeckEvent::TimeChanged { deck, .. }
            | DeckEvent::RateChanged { deck, .. }
            | DeckEvent::LoopPointsChanged { deck, .. }
            | DeckEvent::LoopToggled { deck, .. }
            | DeckEvent::HotCueSet { deck, .. }
            | DeckEvent::HotCueCleared { deck, .. }
            | DeckEvent::HotCueJump { deck, .. }
            | DeckEvent::HotCuesReset { deck }
            | DeckEvent::TrackEnded { deck }
            | DeckEvent::BeatPulse { deck, .. } => deck,
        }
    }
}

/// Handle returned by `on`/`on_any`, used to unsubscribe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Handler = Arc<dyn Fn(&DeckEvent) + Send + Sync>;

struct Subscription {
    id: SubscriptionId,
    kind: Option<EventKind>,
    handler: Handler,
}

/// Pub/sub emitter shared by both decks
#[derive(Default)]
pub struct EventEmitter {
    next_id: AtomicU64,
    handlers: RwLock<Vec<Subscription>>,
    channels: Mutex<Vec<Sender<DeckEvent>>>,
}

impl EventEmitter {
    pub fn new() -> Self {
        Self::default()
    }

    fn register(&self, kind: Option<EventKind>, handler: Handler) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let subscription = Subscription { id, kind, handler };
        self.handlers.write().push(subscription);
        id
    }

    /// Call `handler` for every event of `kind`
    pub fn on<F>(&self, kind: EventKind, handler: F) -> SubscriptionId
    where
        F: Fn(&DeckEvent) + Send + Sync + 'static,
    {
        self.register(Some(kind), Arc::new(handler))
    }

    /// Call `handler` for every event
    pub fn on_any<F>(&self, handler: F) -> SubscriptionId
    where
        F: Fn(&DeckEvent) + Send + Sync + 'static,
    {
        self.register(None, Arc::new(handler))
    }

    /// Remove a callback; returns false if it was already gone
    pub fn off(&self, id: SubscriptionId) -> bool {
        let mut handlers = self.handlers.write();
        let before = handlers.len();
        handlers.retain(|s| s.id != id);
        handlers.len() != before
    }

    /// Receive every event on a channel. Dropping the receiver unsubscribes.
    pub fn subscribe(&self) -> Receiver<DeckEvent> {
        let (tx, rx) = crossbeam_channel::unbounded();
        self.channels.lock().push(tx);
        rx
    }

    pub fn emit(&self, event: DeckEvent) {
        let kind = event.kind();
        // Snapshot so handlers may subscribe or unsubscribe re-entrantly
        let matching: Vec<Handler> = self
            .handlers
            .read()
            .iter()
            .filter(|s| s.kind.map_or(true, |k| k == kind))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        for handler in matching {
            handler(&event);
        }

        self.channels
            .lock()
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for EventEmitter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEmitter")
            .field("handlers", &self.handlers.read().len())
            .field("channels", &self.channels.lock().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_filtered_handlers() {
        let emitter = EventEmitter::new();
        let ended = Arc::new(AtomicUsize::new(0));
        let all = Arc::new(AtomicUsize::new(0));

        let ended_count = Arc::clone(&ended);
        emitter.on(EventKind::TrackEnded, move |_| {
            ended_count.fetch_add(1, Ordering::SeqCst);
        });
        let all_count = Arc::clone(&all);
        emitter.on_any(move |_| {
            all_count.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(DeckEvent::TrackEnded { deck: DeckId::A });
        emitter.emit(DeckEvent::HotCuesReset { deck: DeckId::B });

        assert_eq!(ended.load(Ordering::SeqCst), 1);
        assert_eq!(all.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_off_unsubscribes() {
        let emitter = EventEmitter::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = emitter.on_any(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        emitter.emit(DeckEvent::TrackEnded { deck: DeckId::A });
        assert!(emitter.off(id));
        assert!(!emitter.off(id));
        emitter.emit(DeckEvent::TrackEnded { deck: DeckId::A });

        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_channel_subscription() {
        let emitter = EventEmitter::new();
        let rx = emitter.subscribe();
        emitter.emit(DeckEvent::RateChanged {
            deck: DeckId::B,
            rate: 1.1,
        });
        let event = rx.try_recv().unwrap();
        assert_eq!(event.kind(), EventKind::RateChanged);
        assert_eq!(event.deck(), DeckId::B);

        // Dropped receivers are pruned on the next emit
        drop(rx);
        emitter.emit(DeckEvent::TrackEnded { deck: DeckId::A });
        assert!(emitter.channels.lock().is_empty());
    }
}
