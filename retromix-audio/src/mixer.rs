//! Mixer implementation - crossfader gains between deck A and deck B

use crate::deck::DeckId;
use std::f64::consts::FRAC_PI_2;

/// Crossfader curve type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrossfaderCurve {
    /// Linear crossfade
    #[default]
    Linear,
    /// Constant power (equal loudness)
    ConstantPower,
    /// Squared fade, both sides dip in the middle
    Exponential,
}

/// Crossfader and master volume for the two decks
#[derive(Debug, Clone, PartialEq)]
pub struct Mixer {
    /// Crossfader position (0.0 = full A, 0.5 = center, 1.0 = full B)
    crossfader: f64,
    curve: CrossfaderCurve,
    master_volume: f64,
}

impl Default for Mixer {
    fn default() -> Self {
        Self {
            crossfader: 0.5,
            curve: CrossfaderCurve::Linear,
            master_volume: 1.0,
        }
    }
}

impl Mixer {
    /// Create a new mixer
    pub fn new() -> Self {
        Self::default()
    }

    /// Set crossfader position (0.0 to 1.0)
    pub fn set_crossfader(&mut self, position: f64) {
        if position.is_finite() {
            self.crossfader = position.clamp(0.0, 1.0);
        }
    }

    /// Move crossfader by delta
    pub fn move_crossfader(&mut self, delta: f64) {
        self.set_crossfader(self.crossfader + delta);
    }

    /// Get crossfader position
    pub fn crossfader(&self) -> f64 {
        self.crossfader
    }

    /// Center the crossfader
    pub fn center_crossfader(&mut self) {
        self.crossfader = 0.5;
    }

    /// Set crossfader curve
    pub fn set_curve(&mut self, curve: CrossfaderCurve) {
        self.curve = curve;
    }

    pub fn curve(&self) -> CrossfaderCurve {
        self.curve
    }

    /// Set master volume (0.0 to 2.0)
    pub fn set_master_volume(&mut self, volume: f64) {
        if volume.is_finite() {
            self.master_volume = volume.clamp(0.0, 2.0);
        }
    }

    /// Get master volume
    pub fn master_volume(&self) -> f64 {
        self.master_volume
    }

    /// Crossfader gains `(a, b)` before master volume
    pub fn crossfader_gains(&self) -> (f64, f64) {
        let p = self.crossfader;
        match self.curve {
            CrossfaderCurve::Linear => (1.0 - p, p),
            CrossfaderCurve::ConstantPower => {
                let angle = p * FRAC_PI_2;
                (angle.cos(), angle.sin())
            }
            CrossfaderCurve::Exponential => ((1.0 - p).powi(2), p.powi(2)),
        }
    }

    /// Output gains `(a, b)` including master volume
    pub fn gains(&self) -> (f64, f64) {
        let (a, b) = self.crossfader_gains();
        (a * self.master_volume, b * self.master_volume)
    }

    /// Output gain for one deck
    pub fn gain_for(&self, deck: DeckId) -> f64 {
        let (a, b) = self.gains();
        match deck {
            DeckId::A => a,
            DeckId::B => b,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: (f64, f64), b: (f64, f64)) -> bool {
        (a.0 - b.0).abs() < 1e-9 && (a.1 - b.1).abs() < 1e-9
    }

    #[test]
    fn test_linear_curve() {
        let mut mixer = Mixer::new();
        assert!(close(mixer.gains(), (0.5, 0.5)));
        mixer.set_crossfader(0.0);
        assert!(close(mixer.gains(), (1.0, 0.0)));
        mixer.set_crossfader(1.0);
        assert!(close(mixer.gains(), (0.0, 1.0)));
    }

    #[test]
    fn test_constant_power_curve() {
        let mut mixer = Mixer::new();
        mixer.set_curve(CrossfaderCurve::ConstantPower);
        let (a, b) = mixer.gains();
        assert!((a * a + b * b - 1.0).abs() < 1e-9);
        assert!((a - b).abs() < 1e-9);

        mixer.set_crossfader(0.0);
        assert!(close(mixer.gains(), (1.0, 0.0)));
    }

    #[test]
    fn test_exponential_curve() {
        let mut mixer = Mixer::new();
        mixer.set_curve(CrossfaderCurve::Exponential);
        assert!(close(mixer.gains(), (0.25, 0.25)));
        mixer.set_crossfader(0.25);
        assert!(close(mixer.gains(), (0.5625, 0.0625)));
    }

    #[test]
    fn test_clamping() {
        let mut mixer = Mixer::new();
        mixer.set_crossfader(3.0);
        assert_eq!(mixer.crossfader(), 1.0);
        mixer.move_crossfader(-5.0);
        assert_eq!(mixer.crossfader(), 0.0);
        mixer.set_crossfader(f64::NAN);
        assert_eq!(mixer.crossfader(), 0.0);

        mixer.set_master_volume(4.0);
        assert_eq!(mixer.master_volume(), 2.0);
        assert_eq!(mixer.gain_for(DeckId::A), 2.0);
        mixer.set_master_volume(-1.0);
        assert_eq!(mixer.gain_for(DeckId::A), 0.0);
    }
}
