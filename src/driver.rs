//! Native session runtime
//!
//! Runs one screen on a virtual millisecond clock with the two timers the
//! browser page uses: the periodic power poll and the one-shot stimulus
//! timeout. Everything happens on the caller's thread; a step fires exactly
//! one timer and carries out the effects it produced before returning.

use std::cell::Cell;
use std::rc::Rc;

use crate::backend::Backend;
use crate::config::Route;
use crate::consts::KEYBOARD_STEP;
use crate::report::{self, FlushOutcome};
use crate::screen::{Effect, ScreenState, TickInput};
use crate::signal::{PowerSampler, SignalSource};
use crate::speech::Speaker;

/// Arrow key for the manual override
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Left,
    Right,
}

impl Direction {
    /// Map a `KeyboardEvent.key` value
    pub fn from_key(key: &str) -> Option<Self> {
        match key {
            "ArrowLeft" => Some(Direction::Left),
            "ArrowRight" => Some(Direction::Right),
            _ => None,
        }
    }

    pub fn step(&self) -> f32 {
        match self {
            Direction::Left => -KEYBOARD_STEP,
            Direction::Right => KEYBOARD_STEP,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Timer {
    Poll,
    Timeout,
}

pub struct SessionDriver<S, B, P> {
    pub screen: ScreenState,
    sampler: PowerSampler,
    source: S,
    backend: B,
    speaker: P,
    now_ms: u64,
    next_poll: Option<u64>,
    timeout_at: Option<u64>,
    route: Option<Route>,
    flushes: Vec<FlushOutcome>,
    /// Shared clock kept in step with `now_ms`
    clock: Option<Rc<Cell<u64>>>,
}

impl<S: SignalSource, B: Backend, P: Speaker> SessionDriver<S, B, P> {
    pub fn new(screen: ScreenState, source: S, backend: B, speaker: P) -> Self {
        Self {
            sampler: PowerSampler::new(screen.config.poll_mode),
            screen,
            source,
            backend,
            speaker,
            now_ms: 0,
            next_poll: None,
            timeout_at: None,
            route: None,
            flushes: Vec::new(),
            clock: None,
        }
    }

    /// Continue from `clock`'s time and publish every advance to it
    pub fn with_clock(mut self, clock: Rc<Cell<u64>>) -> Self {
        self.now_ms = clock.get();
        self.clock = Some(clock);
        self
    }

    /// Arm polling and enter the first stimulus
    pub fn start(&mut self) {
        self.next_poll = Some(self.now_ms + self.poll_interval());
        let effects = self.screen.start();
        self.apply(effects);
    }

    /// Fire the earliest due timer; false once nothing is left to fire
    pub fn step(&mut self) -> bool {
        if self.route.is_some() {
            return false;
        }
        let Some((at, timer)) = self.next_due() else {
            return false;
        };
        self.now_ms = at;
        if let Some(clock) = &self.clock {
            clock.set(at);
        }

        let effects = match timer {
            Timer::Poll => {
                self.next_poll = Some(at + self.poll_interval());
                let power = self.sampler.poll(&mut self.source);
                self.screen.tick(TickInput::Power(power))
            }
            Timer::Timeout => {
                self.timeout_at = None;
                let vote = match self.backend.timeout_vote() {
                    Ok(vote) => Some(vote),
                    Err(e) => {
                        log::warn!("Timeout vote unavailable: {}", e);
                        None
                    }
                };
                self.screen.on_timeout(vote)
            }
        };
        self.apply(effects);
        true
    }

    /// Step until the screen navigates or the clock would pass `limit_ms`
    pub fn run(&mut self, limit_ms: u64) -> Option<Route> {
        while self.route.is_none() {
            match self.next_due() {
                Some((at, _)) if at <= limit_ms => {
                    self.step();
                }
                _ => break,
            }
        }
        self.route
    }

    /// Manual override: move the dot one keyboard step
    pub fn key(&mut self, direction: Direction) {
        if self.route.is_some() {
            return;
        }
        let effects = self.screen.nudge(direction.step());
        self.apply(effects);
    }

    /// Earliest armed timer; the poll wins a tie
    fn next_due(&self) -> Option<(u64, Timer)> {
        match (self.next_poll, self.timeout_at) {
            (Some(poll), Some(timeout)) if timeout < poll => Some((timeout, Timer::Timeout)),
            (Some(poll), _) => Some((poll, Timer::Poll)),
            (None, Some(timeout)) => Some((timeout, Timer::Timeout)),
            (None, None) => None,
        }
    }

    fn poll_interval(&self) -> u64 {
        u64::from(self.screen.config.poll_interval_ms.max(1))
    }

    fn apply(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::NotifyIndex(index) => {
                    if let Err(e) = self.backend.notify_index(index) {
                        log::warn!("Index notification {} failed: {}", index, e);
                    }
                }
                Effect::Speak(text) => self.speaker.speak(&text),
                Effect::ArmTimeout { after_ms } => {
                    self.timeout_at = Some(self.now_ms + u64::from(after_ms));
                }
                Effect::CancelTimeout => self.timeout_at = None,
                Effect::CancelPolling => self.next_poll = None,
                Effect::Flush(sheet) => {
                    let outcome = report::flush(&mut self.backend, &sheet);
                    self.flushes.push(outcome);
                }
                Effect::Navigate(route) => {
                    log::info!("Navigate to {} at {} ms", route.path(), self.now_ms);
                    self.route = Some(route);
                }
            }
        }
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// Where the screen navigated, once it has
    pub fn route(&self) -> Option<Route> {
        self.route
    }

    pub fn flushes(&self) -> &[FlushOutcome] {
        &self.flushes
    }

    /// True while either timer is armed
    pub fn has_timers(&self) -> bool {
        self.next_poll.is_some() || self.timeout_at.is_some()
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn speaker(&self) -> &P {
        &self.speaker
    }

    pub fn into_parts(self) -> (ScreenState, S, B, P) {
        (self.screen, self.source, self.backend, self.speaker)
    }
}
