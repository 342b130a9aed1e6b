//! Screen state and core session types
//!
//! One `ScreenState` is the whole session context for a page: it is built
//! when the screen loads and dropped when it navigates away.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::geometry::{Dot, Target};
use super::stimulus::{Response, Score, Stimulus};
use crate::config::{Flow, Route, ScreenConfig, SheetTag};

/// Where the screen is in its stimulus sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// Built but not started
    Idle,
    /// Waiting for an answer to stimulus `i` (always 0 on a gate screen)
    Active(usize),
    /// Terminal: results flushed and navigation requested
    Complete,
}

/// Page geometry measured by the host at load time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Layout {
    /// Screen size; the dot resets to its centre
    pub viewport: Vec2,
    pub dot_radius: f32,
    /// "no" / "exit" box
    pub left: Target,
    /// "yes" / "enter" box
    pub right: Target,
}

impl Layout {
    /// Build from raw element rects, correcting the right box's left edge
    pub fn measured(
        viewport: Vec2,
        dot_width: f32,
        left: Target,
        mut right: Target,
        right_offset: f32,
    ) -> Self {
        right.x -= right_offset;
        Self {
            viewport,
            dot_radius: dot_width / 2.0,
            left,
            right,
        }
    }

    pub fn dot_home(&self) -> Vec2 {
        self.viewport / 2.0
    }
}

/// Graded result for one stimulus
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AnswerRecord {
    pub index: usize,
    pub score: Score,
    pub response: Response,
}

/// Answers accumulated over one screen, flushed once at completion
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnswerSheet {
    key_offset: usize,
    tag: Option<SheetTag>,
    records: Vec<AnswerRecord>,
}

impl AnswerSheet {
    pub fn new(key_offset: usize, tag: Option<SheetTag>) -> Self {
        Self {
            key_offset,
            tag,
            records: Vec::new(),
        }
    }

    /// Record an answer; a repeat for the same index replaces the old one
    pub fn record(&mut self, index: usize, score: Score, response: Response) {
        let record = AnswerRecord {
            index,
            score,
            response,
        };
        match self.records.iter_mut().find(|r| r.index == index) {
            Some(existing) => *existing = record,
            None => self.records.push(record),
        }
    }

    pub fn records(&self) -> &[AnswerRecord] {
        &self.records
    }

    pub fn get(&self, index: usize) -> Option<&AnswerRecord> {
        self.records.iter().find(|r| r.index == index)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    fn tagged_map(&self) -> Map<String, Value> {
        let mut map = Map::new();
        if let Some(tag) = &self.tag {
            map.insert(tag.key.clone(), Value::String(tag.value.clone()));
        }
        map
    }

    /// `{"Q<n>": 1 | 0 | "NaN"}`
    pub fn scores_payload(&self) -> Value {
        let mut map = self.tagged_map();
        for r in &self.records {
            let score = serde_json::to_value(r.score).unwrap_or(Value::Null);
            map.insert(format!("Q{}", self.key_offset + r.index), score);
        }
        Value::Object(map)
    }

    /// `{"<n>": "yes" | "no" | "NaN"}`
    pub fn responses_payload(&self) -> Value {
        let mut map = self.tagged_map();
        for r in &self.records {
            map.insert(
                (self.key_offset + r.index).to_string(),
                Value::String(r.response.as_str().to_string()),
            );
        }
        Value::Object(map)
    }
}

/// Side effect requested by the screen, executed by the host in order
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Tell the backend which stimulus is now current
    NotifyIndex(usize),
    /// Fire-and-forget utterance
    Speak(String),
    /// (Re)arm the per-stimulus timeout
    ArmTimeout { after_ms: u32 },
    CancelTimeout,
    /// Stop the polling timer for good
    CancelPolling,
    /// Persist scores and raw responses
    Flush(AnswerSheet),
    /// Leave the page
    Navigate(Route),
}

/// Complete per-screen session context
#[derive(Debug, Clone)]
pub struct ScreenState {
    pub config: ScreenConfig,
    pub layout: Layout,
    pub dot: Dot,
    pub phase: Phase,
    pub sheet: AnswerSheet,
    /// Displacement steps applied so far
    pub ticks: u64,
}

impl ScreenState {
    pub fn new(config: ScreenConfig, layout: Layout) -> Self {
        let sheet = match &config.flow {
            Flow::Sequence {
                key_offset, tag, ..
            } => AnswerSheet::new(*key_offset, tag.clone()),
            Flow::Gate { .. } => AnswerSheet::default(),
        };

        Self {
            dot: Dot::new(layout.dot_home(), layout.dot_radius),
            config,
            layout,
            phase: Phase::Idle,
            sheet,
            ticks: 0,
        }
    }

    /// Apply one power sample; returns the new horizontal position
    ///
    /// No clamping: the dot may leave the screen.
    pub fn integrate(&mut self, power: f32) -> f32 {
        self.displace(power * self.config.strength)
    }

    pub(crate) fn displace(&mut self, dx: f32) -> f32 {
        self.dot.pos.x += dx;
        self.ticks += 1;
        self.dot.pos.x
    }

    /// Put the dot back at the centre of the screen
    pub fn reset_dot(&mut self) {
        self.dot = Dot::new(self.layout.dot_home(), self.layout.dot_radius);
    }

    pub fn is_active(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    pub fn is_complete(&self) -> bool {
        self.phase == Phase::Complete
    }

    /// Index of the stimulus being answered
    pub fn current_index(&self) -> Option<usize> {
        match self.phase {
            Phase::Active(i) => Some(i),
            _ => None,
        }
    }

    pub fn current_stimulus(&self) -> Option<&Stimulus> {
        let index = self.current_index()?;
        match &self.config.flow {
            Flow::Sequence { stimuli, .. } => stimuli.get(index),
            Flow::Gate { .. } => None,
        }
    }
}
