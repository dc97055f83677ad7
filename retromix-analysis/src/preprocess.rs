//! Bass-focused signal preprocessing
//!
//! Downsample by sample picking, smooth with a one-pole low-pass to keep
//! the kick drum region, then square into an energy envelope.

use crate::analyzer::AnalysisConfig;
use crate::samples::AudioSamples;

/// Energy envelope ready for onset detection
#[derive(Debug, Clone, Default)]
pub struct Preprocessed {
    /// Squared low-passed signal
    pub energy: Vec<f32>,
    /// Rate of the energy signal in Hz
    pub sample_rate: f64,
}

/// Integer decimation factor for a native sample rate (never below 1)
pub(crate) fn downsample_factor(sample_rate: u32, target_rate: u32) -> usize {
    if target_rate == 0 {
        return 1;
    }
    ((sample_rate / target_rate) as usize).max(1)
}

/// Run the preprocessing chain over mono samples
pub fn preprocess(samples: &AudioSamples, config: &AnalysisConfig) -> Preprocessed {
    let factor = downsample_factor(samples.sample_rate(), config.target_sample_rate);
    let sample_rate = samples.sample_rate() as f64 / factor as f64;

    // Sample picking aliases, which is fine for bass-focused beat tracking
    let picked_len = samples.len() / factor;
    let picked = samples.samples().iter().step_by(factor).take(picked_len);

    let alpha = config.lowpass_alpha;
    let mut energy = Vec::with_capacity(picked_len);
    let mut prev: Option<f32> = None;
    for &x in picked {
        let y = match prev {
            Some(p) => alpha * x + (1.0 - alpha) * p,
            None => x,
        };
        prev = Some(y);
        energy.push(y * y);
    }

    Preprocessed {
        energy,
        sample_rate,
    }
}
