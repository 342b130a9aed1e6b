//! Mental-command aggregation
//!
//! Headset "com" events arrive as `(action, power)` pairs. Each power poll
//! folds everything received since the previous poll into one signed value
//! in [-1, 1]: left is negative, right positive, neutral ignored. Every
//! folded value also goes into a tally used to break timeouts; the tally is
//! cleared whenever the front end moves to a new stimulus.
//!
//! `LocalBackend` also keeps the per-poll recording log: one row per power
//! sample with the current stimulus index, the elapsed time and the latest
//! folded value.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::SignalSource;
use crate::backend::{Backend, TransportError};

/// Mental command class
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Action {
    Left,
    Right,
    Neutral,
}

impl Action {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Neutral => "neutral",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "left" => Some(Self::Left),
            "right" => Some(Self::Right),
            "neutral" => Some(Self::Neutral),
            _ => None,
        }
    }

    /// Direction multiplier (None for neutral)
    fn sign(&self) -> Option<f32> {
        match self {
            Self::Left => Some(-1.0),
            Self::Right => Some(1.0),
            Self::Neutral => None,
        }
    }
}

/// One detection from the headset
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MentalCommand {
    pub action: Action,
    /// Detection strength (0.0-1.0)
    pub power: f32,
}

impl MentalCommand {
    pub fn new(action: Action, power: f32) -> Self {
        Self { action, power }
    }
}

/// Buffered commands plus the timeout tally
#[derive(Debug, Clone, Default)]
pub struct CommandBuffer {
    pending: Vec<MentalCommand>,
    /// Every folded value, oldest first
    history: Vec<f32>,
    /// Folded values since the last `clear_votes`
    votes: Vec<f32>,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, cmd: MentalCommand) {
        self.pending.push(cmd);
    }

    pub fn extend(&mut self, cmds: impl IntoIterator<Item = MentalCommand>) {
        self.pending.extend(cmds);
    }

    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Fold the pending commands into one signed power value
    ///
    /// An empty buffer yields 0 and leaves the tally untouched.
    pub fn average(&mut self) -> f32 {
        if self.pending.is_empty() {
            return 0.0;
        }

        let (sum, count) = self
            .pending
            .drain(..)
            .filter_map(|cmd| cmd.action.sign().map(|s| s * cmd.power))
            .fold((0.0f32, 0u32), |(sum, n), p| (sum + p, n + 1));

        let total = if count == 0 { 0.0 } else { sum / count as f32 };
        self.history.push(total);
        self.votes.push(total);
        total
    }

    /// Sum of the folded values since the last clear; the sign is the majority direction
    pub fn vote(&self) -> f32 {
        self.votes.iter().sum()
    }

    pub fn clear_votes(&mut self) {
        self.votes.clear();
    }

    pub fn history(&self) -> &[f32] {
        &self.history
    }
}

/// One row of the per-poll recording log
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Recording {
    /// Index last announced by the front end (None before the first)
    pub question: Option<usize>,
    /// Time since the session start
    pub elapsed_ms: u64,
    /// Most recent folded value (NaN until the first fold)
    pub com: f32,
}

/// State shared by the endpoints of one `LocalBackend`
#[derive(Debug, Default)]
struct Session {
    buffer: CommandBuffer,
    question: Option<usize>,
    start_ms: u64,
    recordings: Vec<Recording>,
}

/// Power endpoint of a `LocalBackend`
///
/// Every sample folds the buffer and appends one `Recording`.
#[derive(Debug, Clone)]
pub struct LocalPower {
    session: Rc<RefCell<Session>>,
    clock: Rc<Cell<u64>>,
}

impl LocalPower {
    /// Feed headset detections
    pub fn push(&self, cmds: impl IntoIterator<Item = MentalCommand>) {
        self.session.borrow_mut().buffer.extend(cmds);
    }
}

impl SignalSource for LocalPower {
    fn sample(&mut self) -> Result<f32, TransportError> {
        let now = self.clock.get();
        let mut session = self.session.borrow_mut();
        let power = session.buffer.average();
        let row = Recording {
            question: session.question,
            elapsed_ms: now.saturating_sub(session.start_ms),
            com: session.buffer.history().last().copied().unwrap_or(f32::NAN),
        };
        session.recordings.push(row);
        Ok(power)
    }
}

/// In-process stand-in for the session server
///
/// All endpoints share one `CommandBuffer` and one clock, like the server
/// does. The clock is in milliseconds and only moves when its owner sets
/// it (see `SessionDriver::with_clock`). Single-threaded only.
#[derive(Debug, Clone, Default)]
pub struct LocalBackend {
    session: Rc<RefCell<Session>>,
    clock: Rc<Cell<u64>>,
    /// Every index notification, in order
    pub notified: Vec<usize>,
    /// Every saved payload, in order
    pub saved: Vec<Value>,
}

impl LocalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Handle for the power endpoint
    pub fn power(&self) -> LocalPower {
        LocalPower {
            session: Rc::clone(&self.session),
            clock: Rc::clone(&self.clock),
        }
    }

    /// Feed headset detections
    pub fn push(&self, cmds: impl IntoIterator<Item = MentalCommand>) {
        self.session.borrow_mut().buffer.extend(cmds);
    }

    pub fn with_buffer<R>(&self, f: impl FnOnce(&mut CommandBuffer) -> R) -> R {
        f(&mut self.session.borrow_mut().buffer)
    }

    /// Shared session clock (ms)
    pub fn clock(&self) -> Rc<Cell<u64>> {
        Rc::clone(&self.clock)
    }

    /// Restart elapsed time from now and forget the current index (intro opened)
    pub fn set_start_time(&self) {
        let mut session = self.session.borrow_mut();
        session.start_ms = self.clock.get();
        session.question = None;
        log::info!("Recording session started at {} ms", session.start_ms);
    }

    /// Index last announced by the front end
    pub fn current_index(&self) -> Option<usize> {
        self.session.borrow().question
    }

    pub fn recordings(&self) -> Vec<Recording> {
        self.session.borrow().recordings.clone()
    }

    /// Saved payloads as JSON lines
    pub fn saved_lines(&self) -> Vec<String> {
        self.saved.iter().map(Value::to_string).collect()
    }
}

impl Backend for LocalBackend {
    fn timeout_vote(&mut self) -> Result<f32, TransportError> {
        Ok(self.session.borrow().buffer.vote())
    }

    fn notify_index(&mut self, index: usize) -> Result<(), TransportError> {
        let mut session = self.session.borrow_mut();
        session.question = Some(index);
        session.buffer.clear_votes();
        self.notified.push(index);
        Ok(())
    }

    fn save(&mut self, payload: &Value) -> Result<(), TransportError> {
        self.saved.push(payload.clone());
        Ok(())
    }
}
