//! Power signal sources
//!
//! A source is anything that can be asked for the current BCI power value.
//! `PowerSampler` turns a fallible source into the value used each tick,
//! keeping the last good sample when a poll fails.

pub mod command;
pub mod synthetic;

use serde::{Deserialize, Serialize};

use crate::backend::TransportError;

pub use command::{Action, CommandBuffer, LocalBackend, LocalPower, MentalCommand, Recording};
pub use synthetic::{Intent, SyntheticFeed, SyntheticHeadset};

/// Pull-based numeric signal
pub trait SignalSource {
    fn sample(&mut self) -> Result<f32, TransportError>;
}

impl<S: SignalSource + ?Sized> SignalSource for &mut S {
    fn sample(&mut self) -> Result<f32, TransportError> {
        (**self).sample()
    }
}

/// Pre-recorded samples, then a fixed fallback (testing and replay)
#[derive(Debug, Clone, Default)]
pub struct ScriptedSignal {
    samples: std::collections::VecDeque<Result<f32, TransportError>>,
    /// Returned once the script is exhausted
    pub fallback: f32,
}

impl ScriptedSignal {
    pub fn new(samples: impl IntoIterator<Item = Result<f32, TransportError>>) -> Self {
        Self {
            samples: samples.into_iter().collect(),
            fallback: 0.0,
        }
    }

    pub fn values(values: impl IntoIterator<Item = f32>) -> Self {
        Self::new(values.into_iter().map(Ok))
    }
}

impl SignalSource for ScriptedSignal {
    fn sample(&mut self) -> Result<f32, TransportError> {
        self.samples.pop_front().unwrap_or(Ok(self.fallback))
    }
}

/// How the polling tick waits for its sample
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollMode {
    /// The tick stalls until the sample arrives; the value is always fresh
    #[default]
    Synchronous,
    /// The tick uses the last resolved value; the new sample lands next tick
    FireAndForget,
}

/// Turns a source into per-tick power values
#[derive(Debug, Clone)]
pub struct PowerSampler {
    pub mode: PollMode,
    last: f32,
    /// Consecutive failed polls
    failures: u32,
    /// Samples successfully resolved
    resolved: u64,
}

impl PowerSampler {
    pub fn new(mode: PollMode) -> Self {
        Self {
            mode,
            last: 0.0,
            failures: 0,
            resolved: 0,
        }
    }

    /// Value to apply this tick
    pub fn poll<S: SignalSource + ?Sized>(&mut self, source: &mut S) -> f32 {
        match self.mode {
            PollMode::Synchronous => {
                self.resolve(source.sample());
                self.last
            }
            PollMode::FireAndForget => {
                let used = self.last;
                self.resolve(source.sample());
                used
            }
        }
    }

    /// Record a completed sample; failures keep the previous value
    pub fn resolve(&mut self, result: Result<f32, TransportError>) {
        match result {
            Ok(value) => {
                self.last = value;
                self.failures = 0;
                self.resolved += 1;
            }
            Err(e) => {
                self.failures += 1;
                log::warn!(
                    "Power poll failed ({} in a row), keeping {}: {}",
                    self.failures,
                    self.last,
                    e
                );
            }
        }
    }

    /// Last successfully resolved value
    pub fn latest(&self) -> f32 {
        self.last
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.failures
    }

    pub fn resolved_count(&self) -> u64 {
        self.resolved
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_synchronous_uses_fresh_value() {
        let mut source = ScriptedSignal::values([0.5, -0.25]);
        let mut sampler = PowerSampler::new(PollMode::Synchronous);

        assert_eq!(sampler.poll(&mut source), 0.5);
        assert_eq!(sampler.poll(&mut source), -0.25);
        assert_eq!(sampler.resolved_count(), 2);
    }

    #[test]
    fn test_fire_and_forget_lags_one_tick() {
        let mut source = ScriptedSignal::values([0.5, -0.25]);
        let mut sampler = PowerSampler::new(PollMode::FireAndForget);

        assert_eq!(sampler.poll(&mut source), 0.0);
        assert_eq!(sampler.poll(&mut source), 0.5);
        assert_eq!(sampler.latest(), -0.25);
    }

    #[test]
    fn test_failure_keeps_previous_value() {
        let mut source = ScriptedSignal::new([
            Ok(0.75),
            Err(TransportError::Status(500)),
            Err(TransportError::Network("reset".into())),
            Ok(0.1),
        ]);
        let mut sampler = PowerSampler::new(PollMode::Synchronous);

        assert_eq!(sampler.poll(&mut source), 0.75);
        assert_eq!(sampler.poll(&mut source), 0.75);
        assert_eq!(sampler.poll(&mut source), 0.75);
        assert_eq!(sampler.consecutive_failures(), 2);
        assert_eq!(sampler.poll(&mut source), 0.1);
        assert_eq!(sampler.consecutive_failures(), 0);
    }

    #[test]
    fn test_async_resolution() {
        let mut sampler = PowerSampler::new(PollMode::FireAndForget);
        sampler.resolve(Ok(0.3));
        assert_eq!(sampler.latest(), 0.3);
        sampler.resolve(Err(TransportError::Unavailable));
        assert_eq!(sampler.latest(), 0.3);
    }
}
