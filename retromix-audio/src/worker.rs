//! Off-thread beat analysis
//!
//! Each job runs on its own named thread and hands its result back over a
//! single-slot channel. The control thread polls the returned ticket once
//! per frame, so analysis never blocks transport.

use crate::deck::{DeckId, TrackId};
use crossbeam_channel::{self, Receiver, TryRecvError};
use retromix_analysis::{AnalysisConfig, AnalysisResult, AudioSamples, BeatAnalyzer};
use std::io;
use std::sync::Arc;
use std::thread;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("analysis of track {track} on deck {deck} was lost")]
    WorkerLost { deck: DeckId, track: TrackId },
    #[error("failed to spawn analysis thread")]
    Spawn(#[source] io::Error),
}

/// Samples to analyze and the load they belong to
#[derive(Debug, Clone)]
pub struct AnalysisJob {
    pub deck: DeckId,
    pub track: TrackId,
    pub samples: AudioSamples,
}

/// Finished analysis, tagged with the load it was requested for
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub deck: DeckId,
    pub track: TrackId,
    pub result: AnalysisResult,
}

/// Handle to one running analysis
#[derive(Debug)]
pub struct AnalysisTicket {
    deck: DeckId,
    track: TrackId,
    rx: Receiver<AnalysisResult>,
}

impl AnalysisTicket {
    pub fn deck(&self) -> DeckId {
        self.deck
    }

    pub fn track(&self) -> TrackId {
        self.track
    }

    fn outcome(&self, result: AnalysisResult) -> AnalysisOutcome {
        AnalysisOutcome {
            deck: self.deck,
            track: self.track,
            result,
        }
    }

    fn lost(&self) -> AnalysisError {
        AnalysisError::WorkerLost {
            deck: self.deck,
            track: self.track,
        }
    }

    /// Non-blocking poll; `None` while the job is still running
    pub fn try_take(&self) -> Option<Result<AnalysisOutcome, AnalysisError>> {
        match self.rx.try_recv() {
            Ok(result) => Some(Ok(self.outcome(result))),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(self.lost())),
        }
    }

    /// Block until the job finishes
    pub fn wait(self) -> Result<AnalysisOutcome, AnalysisError> {
        match self.rx.recv() {
            Ok(result) => Ok(self.outcome(result)),
            Err(_) => Err(self.lost()),
        }
    }
}

/// Spawns analysis jobs
#[derive(Debug, Clone)]
pub struct AnalysisWorker {
    analyzer: Arc<BeatAnalyzer>,
}

impl Default for AnalysisWorker {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl AnalysisWorker {
    pub fn new(config: AnalysisConfig) -> Self {
        Self {
            analyzer: Arc::new(BeatAnalyzer::new(config)),
        }
    }

    pub fn config(&self) -> &AnalysisConfig {
        self.analyzer.config()
    }

    /// Start analyzing `job` on a new thread
    pub fn submit(&self, job: AnalysisJob) -> Result<AnalysisTicket, AnalysisError> {
        let (tx, rx) = crossbeam_channel::bounded(1);
        let analyzer = Arc::clone(&self.analyzer);
        let AnalysisJob {
            deck,
            track,
            samples,
        } = job;

        thread::Builder::new()
            .name(format!("analysis-{deck}"))
            .spawn(move || {
                tracing::debug!(%deck, %track, samples = samples.len(), "analysis started");
                let result = analyzer.analyze(&samples);
                // Receiver gone means the deck moved on; nothing to report
                let _ = tx.send(result);
            })
            .map_err(AnalysisError::Spawn)?;

        Ok(AnalysisTicket { deck, track, rx })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn click_track(bpm: f64, secs: f64, rate: u32) -> AudioSamples {
        let len = (secs * rate as f64) as usize;
        let period = (60.0 / bpm * rate as f64) as usize;
        let click = (rate as usize) / 100;
        let data = (0..len)
            .map(|i| {
                let k = i % period;
                if k < click {
                    1.0 - k as f32 / click as f32
                } else {
                    0.0
                }
            })
            .collect();
        AudioSamples::from_vec(data, rate)
    }

    #[test]
    fn test_submit_and_wait() {
        let worker = AnalysisWorker::default();
        let track = TrackId::next();
        let ticket = worker
            .submit(AnalysisJob {
                deck: DeckId::B,
                track,
                samples: click_track(120.0, 20.0, 22050),
            })
            .unwrap();
        assert_eq!(ticket.deck(), DeckId::B);

        let outcome = ticket.wait().unwrap();
        assert_eq!(outcome.track, track);
        assert!((outcome.result.bpm - 120.0).abs() < 2.5);
    }

    #[test]
    fn test_try_take_eventually_returns() {
        let worker = AnalysisWorker::default();
        let ticket = worker
            .submit(AnalysisJob {
                deck: DeckId::A,
                track: TrackId::next(),
                samples: AudioSamples::from_vec(Vec::new(), 44100),
            })
            .unwrap();

        let outcome = loop {
            if let Some(outcome) = ticket.try_take() {
                break outcome.unwrap();
            }
            thread::sleep(std::time::Duration::from_millis(1));
        };
        assert_eq!(outcome.result.bpm, 120.0);
        assert_eq!(outcome.result.confidence, 0.0);
    }

    #[test]
    fn test_lost_worker() {
        let (tx, rx) = crossbeam_channel::bounded::<AnalysisResult>(1);
        drop(tx);
        let ticket = AnalysisTicket {
            deck: DeckId::A,
            track: TrackId::next(),
            rx,
        };
        assert!(matches!(
            ticket.try_take(),
            Some(Err(AnalysisError::WorkerLost { deck: DeckId::A, .. }))
        ));
        assert!(matches!(
            ticket.wait(),
            Err(AnalysisError::WorkerLost { .. })
        ));
    }
}
