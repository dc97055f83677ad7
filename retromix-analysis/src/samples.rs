//! Decoded audio buffers as handed over by the platform decoder

use std::sync::Arc;
use thiserror::Error;

/// Errors raised when a decoded buffer has an inconsistent shape
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BufferError {
    #[error("decoded buffer has no channels")]
    NoChannels,
    #[error("sample rate must be non-zero")]
    ZeroSampleRate,
    #[error("channel {channel} has {len} samples, expected {expected}")]
    ChannelLengthMismatch {
        channel: usize,
        len: usize,
        expected: usize,
    },
}

/// Mono samples plus their sample rate
///
/// Immutable once captured. The sample data sits behind an `Arc` so the
/// buffer can be handed to an analysis thread without copying.
#[derive(Debug, Clone)]
pub struct AudioSamples {
    data: Arc<Vec<f32>>,
    sample_rate: u32,
}

impl AudioSamples {
    pub fn new(data: Arc<Vec<f32>>, sample_rate: u32) -> Self {
        Self { data, sample_rate }
    }

    pub fn from_vec(data: Vec<f32>, sample_rate: u32) -> Self {
        Self::new(Arc::new(data), sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.data
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Duration in seconds (0.0 for a zero sample rate)
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.data.len() as f64 / self.sample_rate as f64
    }
}

/// A fully decoded track: one sample array per channel
#[derive(Debug, Clone)]
pub struct DecodedBuffer {
    channels: Vec<Arc<Vec<f32>>>,
    sample_rate: u32,
}

impl DecodedBuffer {
    /// Build a buffer, checking that every channel has the same length
    pub fn new(channels: Vec<Arc<Vec<f32>>>, sample_rate: u32) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        let expected = channels.first().ok_or(BufferError::NoChannels)?.len();
        if let Some((channel, data)) = channels
            .iter()
            .enumerate()
            .find(|(_, data)| data.len() != expected)
        {
            return Err(BufferError::ChannelLengthMismatch {
                channel,
                len: data.len(),
                expected,
            });
        }
        Ok(Self {
            channels,
            sample_rate,
        })
    }

    /// Single-channel convenience constructor
    pub fn mono(samples: Vec<f32>, sample_rate: u32) -> Result<Self, BufferError> {
        Self::new(vec![Arc::new(samples)], sample_rate)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Length in samples per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, |c| c.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(|c| c.as_slice())
    }

    pub fn duration_secs(&self) -> f64 {
        self.len() as f64 / self.sample_rate as f64
    }

    /// Samples fed to beat analysis. Only channel 0 is read.
    pub fn analysis_samples(&self) -> AudioSamples {
        let data = self.channels.first().cloned().unwrap_or_default();
        AudioSamples::new(data, self.sample_rate)
    }
}
