//! Deterministic screen logic
//!
//! Everything that decides where the dot is and what the participant
//! answered lives here. This module must stay pure:
//! - No timers, network or DOM access
//! - Side effects are returned as `Effect`s for the host to execute
//! - Same inputs, same effects

pub mod geometry;
pub mod state;
pub mod stimulus;
pub mod tick;

pub use geometry::{Dot, Target, collides};
pub use state::{AnswerRecord, AnswerSheet, Effect, Layout, Phase, ScreenState};
pub use stimulus::{Choice, NoResponsePolicy, Response, Score, Stimulus};
pub use tick::TickInput;
