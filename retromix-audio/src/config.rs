//! Console configuration persistence
//!
//! Stored as a simple `key=value` text file. Unknown keys and values that
//! do not parse are skipped so an old or hand-edited file still loads.

use crate::deck::DEFAULT_LOOP_BEATS;
use crate::sync::{SyncSettings, DEFAULT_PHASE_TOLERANCE};
use retromix_analysis::AnalysisConfig;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write config {path}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Console configuration
#[derive(Debug, Clone, PartialEq)]
pub struct ConsoleConfig {
    pub tempo_sync: bool,
    pub phase_sync: bool,
    pub phase_tolerance_ms: f64,
    /// Beat loop size for freshly created decks
    pub default_loop_beats: f64,
    pub beat_pulse_window_ms: f64,
    pub fallback_bpm: f64,
    pub lowpass_alpha: f32,
    pub onset_window_ms: f64,
    pub min_onset_separation_ms: f64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        let analysis = AnalysisConfig::default();
        let sync = SyncSettings::default();
        Self {
            tempo_sync: sync.tempo_sync,
            phase_sync: sync.phase_sync,
            phase_tolerance_ms: DEFAULT_PHASE_TOLERANCE * 1000.0,
            default_loop_beats: DEFAULT_LOOP_BEATS,
            beat_pulse_window_ms: 50.0,
            fallback_bpm: analysis.fallback_bpm,
            lowpass_alpha: analysis.lowpass_alpha,
            onset_window_ms: analysis.onset_window_secs * 1000.0,
            min_onset_separation_ms: analysis.min_onset_separation_secs * 1000.0,
        }
    }
}

impl ConsoleConfig {
    /// Load config from the default location
    ///
    /// Returns default config if the file doesn't exist or can't be read.
    pub fn load() -> Self {
        let path = Self::config_path();
        match Self::load_from(&path) {
            Ok(config) => config,
            Err(err) => {
                tracing::debug!(error = %err, "using default configuration");
                Self::default()
            }
        }
    }

    /// Load config from a specific path
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::parse(&content))
    }

    /// Save config to the default location
    pub fn save(&self) -> Result<(), ConfigError> {
        self.save_to(&Self::config_path())
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        fs::write(path, self.serialize()).map_err(write_err)
    }

    /// Get the default config file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("retromix")
            .join("config.txt")
    }

    /// Analyzer settings derived from this config
    pub fn analysis_config(&self) -> AnalysisConfig {
        AnalysisConfig {
            fallback_bpm: self.fallback_bpm,
            lowpass_alpha: self.lowpass_alpha,
            onset_window_secs: self.onset_window_ms / 1000.0,
            min_onset_separation_secs: self.min_onset_separation_ms / 1000.0,
            ..AnalysisConfig::default()
        }
    }

    pub fn sync_settings(&self) -> SyncSettings {
        SyncSettings {
            tempo_sync: self.tempo_sync,
            phase_sync: self.phase_sync,
        }
    }

    pub fn phase_tolerance_secs(&self) -> f64 {
        self.phase_tolerance_ms / 1000.0
    }

    pub fn beat_pulse_window_secs(&self) -> f64 {
        self.beat_pulse_window_ms / 1000.0
    }

    /// Parse config from simple key=value format
    fn parse(content: &str) -> Self {
        let mut config = Self::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            let Some((key, value)) = line.split_once('=') else {
                tracing::debug!(line, "ignoring config line without '='");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());

            let applied = match key {
                "tempo_sync" => assign(&mut config.tempo_sync, value, any),
                "phase_sync" => assign(&mut config.phase_sync, value, any),
                "phase_tolerance_ms" => assign(&mut config.phase_tolerance_ms, value, non_negative),
                "default_loop_beats" => assign(&mut config.default_loop_beats, value, positive),
                "beat_pulse_window_ms" => {
                    assign(&mut config.beat_pulse_window_ms, value, non_negative)
                }
                "fallback_bpm" => assign(&mut config.fallback_bpm, value, positive),
                "lowpass_alpha" => assign(&mut config.lowpass_alpha, value, unit_interval),
                "onset_window_ms" => assign(&mut config.onset_window_ms, value, positive),
                "min_onset_separation_ms" => {
                    assign(&mut config.min_onset_separation_ms, value, non_negative)
                }
                _ => {
                    tracing::debug!(key, "ignoring unknown config key");
                    continue;
                }
            };
            if !applied {
                tracing::debug!(key, value, "ignoring invalid config value");
            }
        }

        config
    }

    /// Serialize config to simple key=value format
    fn serialize(&self) -> String {
        let lines = [
            "# RetroMix Configuration".to_string(),
            format!("tempo_sync={}", self.tempo_sync),
            format!("phase_sync={}", self.phase_sync),
            format!("phase_tolerance_ms={}", self.phase_tolerance_ms),
            format!("default_loop_beats={}", self.default_loop_beats),
            format!("beat_pulse_window_ms={}", self.beat_pulse_window_ms),
            format!("fallback_bpm={}", self.fallback_bpm),
            format!("lowpass_alpha={}", self.lowpass_alpha),
            format!("onset_window_ms={}", self.onset_window_ms),
            format!("min_onset_separation_ms={}", self.min_onset_separation_ms),
        ];
        lines.join("\n")
    }
}

fn any<T>(_: &T) -> bool {
    true
}

fn positive(v: &f64) -> bool {
    v.is_finite() && *v > 0.0
}

fn non_negative(v: &f64) -> bool {
    v.is_finite() && *v >= 0.0
}

fn unit_interval(v: &f32) -> bool {
    *v > 0.0 && *v <= 1.0
}

/// Overwrite `slot` when `value` parses and passes `valid`
fn assign<T: FromStr>(slot: &mut T, value: &str, valid: fn(&T) -> bool) -> bool {
    match value.parse::<T>() {
        Ok(parsed) if valid(&parsed) => {
            *slot = parsed;
            true
        }
        _ => false,
    }
}
