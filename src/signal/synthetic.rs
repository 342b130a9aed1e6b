//! Synthetic headset for running screens without hardware
//!
//! Seeded RNG only, so a given seed always replays the same session.

use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;
use serde::{Deserialize, Serialize};

use super::SignalSource;
use super::command::{Action, LocalPower, MentalCommand};
use crate::backend::TransportError;

/// Direction the simulated participant is trying to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Intent {
    Left,
    Right,
    /// No preference: detections are noise only
    Undecided,
}

impl Intent {
    fn action(&self) -> Option<Action> {
        match self {
            Intent::Left => Some(Action::Left),
            Intent::Right => Some(Action::Right),
            Intent::Undecided => None,
        }
    }
}

/// Generates biased mental-command detections
#[derive(Debug, Clone)]
pub struct SyntheticHeadset {
    rng: Pcg32,
    pub intent: Intent,
    /// Probability a detection follows the intent (0.0-1.0)
    pub focus: f32,
    /// Detections delivered per power poll
    pub rate: usize,
}

impl SyntheticHeadset {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            intent: Intent::Undecided,
            focus: 0.7,
            rate: 8,
        }
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = intent;
        self
    }

    pub fn with_focus(mut self, focus: f32) -> Self {
        self.focus = focus.clamp(0.0, 1.0);
        self
    }

    /// One detection
    pub fn detect(&mut self) -> MentalCommand {
        let action = match self.intent.action() {
            Some(action) if self.rng.random::<f32>() < self.focus => action,
            _ => match self.rng.random_range(0..3) {
                0 => Action::Left,
                1 => Action::Right,
                _ => Action::Neutral,
            },
        };
        let power = self.rng.random_range(0.2f32..1.0);
        MentalCommand::new(action, power)
    }

    /// Detections for one polling interval
    pub fn burst(&mut self) -> Vec<MentalCommand> {
        (0..self.rate).map(|_| self.detect()).collect()
    }

    /// Power source that feeds a burst into `power` before every sample
    pub fn feeding(self, power: LocalPower) -> SyntheticFeed {
        SyntheticFeed {
            headset: self,
            power,
        }
    }
}

/// Synthetic headset wired to a `LocalBackend` power endpoint
#[derive(Debug, Clone)]
pub struct SyntheticFeed {
    pub headset: SyntheticHeadset,
    power: LocalPower,
}

impl SignalSource for SyntheticFeed {
    fn sample(&mut self) -> Result<f32, TransportError> {
        self.power.push(self.headset.burst());
        self.power.sample()
    }
}
