//! RetroMix - headless two-deck demo
//!
//! Builds two synthetic click tracks, analyzes them off-thread, syncs deck B
//! to deck A and runs the frame loop while the crossfader sweeps across.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use retromix_analysis::DecodedBuffer;
use retromix_audio::{
    Console, ConsoleConfig, CrossfaderCurve, DeckEvent, DeckId, EventKind, TICK_RATE_HZ,
};

const SAMPLE_RATE: u32 = 44100;
const TRACK_SECS: f64 = 30.0;
const RUN_SECS: u64 = 8;
/// Longest we wait for both analyses before giving up
const ANALYSIS_TIMEOUT: Duration = Duration::from_secs(30);

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ConsoleConfig::load();
    let mut console = Console::new(&config);
    let mixer = console.mixer_mut();
    mixer.set_curve(CrossfaderCurve::ConstantPower);
    mixer.set_crossfader(0.0);

    console.events().on(EventKind::BpmDetected, |event| {
        if let DeckEvent::BpmDetected {
            deck,
            bpm,
            confidence,
        } = event
        {
            tracing::info!(%deck, bpm, confidence, "analysis ready");
        }
    });
    console.events().on(EventKind::TrackEnded, |event| {
        tracing::info!(deck = %event.deck(), "track ended");
    });

    console.load_track(DeckId::A, click_track(124.0, TRACK_SECS)?);
    console.load_track(DeckId::B, click_track(128.0, TRACK_SECS)?);

    let frame = Duration::from_secs_f64(1.0 / TICK_RATE_HZ as f64);
    let started = Instant::now();
    while console.is_analyzing(DeckId::A) || console.is_analyzing(DeckId::B) {
        if started.elapsed() > ANALYSIS_TIMEOUT {
            anyhow::bail!("analysis did not finish within {ANALYSIS_TIMEOUT:?}");
        }
        console.tick();
        thread::sleep(frame);
    }

    console.deck_mut(DeckId::A).play()?;
    console.deck_mut(DeckId::B).play()?;
    let report = console.sync_to(DeckId::A);
    tracing::info!(?report, "deck B synced to deck A");

    // A one-bar loop on deck A for the first half of the run
    console.deck_mut(DeckId::A).set_loop_size(4.0);
    console.deck_mut(DeckId::A).toggle_loop()?;

    run(&mut console, frame);

    for id in [DeckId::A, DeckId::B] {
        let state = console.deck_state(id);
        tracing::info!(
            deck = %id,
            position = state.position,
            bpm = state.bpm.unwrap_or(0.0),
            rate = state.playback_rate,
            "final state"
        );
    }
    Ok(())
}

fn run(console: &mut Console, frame: Duration) {
    let total_frames = RUN_SECS * TICK_RATE_HZ as u64;
    for n in 0..total_frames {
        let progress = n as f64 / total_frames as f64;
        console.mixer_mut().set_crossfader(progress);

        if n == total_frames / 2 {
            console.deck_mut(DeckId::A).disable_loop();
        }

        console.tick();

        if n % TICK_RATE_HZ as u64 == 0 {
            let (gain_a, gain_b) = console.mixer().gains();
            let relationship = console.relationship(DeckId::A);
            tracing::info!(
                a = %console.deck(DeckId::A).current_time(),
                b = %console.deck(DeckId::B).current_time(),
                beat = console.deck(DeckId::A).beat_counter(),
                phase_offset = relationship.phase_offset.unwrap_or(0.0),
                gain_a,
                gain_b,
                "frame"
            );
        }
        thread::sleep(frame);
    }
}

/// Stereo click track: a decaying 10 ms click on every beat
fn click_track(bpm: f64, secs: f64) -> anyhow::Result<DecodedBuffer> {
    let period = (60.0 / bpm * SAMPLE_RATE as f64).round() as usize;
    let click = SAMPLE_RATE as usize / 100;
    let mono: Vec<f32> = (0..(secs * SAMPLE_RATE as f64) as usize)
        .map(|i| {
            let k = i % period;
            if k < click {
                0.8 * (1.0 - k as f32 / click as f32)
            } else {
                0.0
            }
        })
        .collect();
    let channel = Arc::new(mono);
    DecodedBuffer::new(vec![Arc::clone(&channel), channel], SAMPLE_RATE)
        .context("building click track")
}
