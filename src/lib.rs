//! BCI Screen - brain-computer-interface yes/no screening engine
//!
//! Core modules:
//! - `screen`: Deterministic per-screen logic (dot kinematics, collisions, sequencing, grading)
//! - `signal`: Power signal sources and the in-process command aggregator
//! - `backend`: Backend endpoint contract (vote, position notify, save)
//! - `report`: Session reporter (flushes graded answers at completion)
//! - `speech`: Voice bridge to the robot's text-to-speech action
//! - `driver`: Native single-threaded timer runtime
//! - `config`: Per-screen configuration presets

pub mod backend;
pub mod config;
pub mod driver;
pub mod report;
pub mod screen;
pub mod signal;
pub mod speech;

pub use backend::{Backend, Endpoints, TransportError};
pub use config::{Flow, Route, ScreenConfig};
pub use screen::{Effect, ScreenState};

/// Screen configuration constants
pub mod consts {
    /// How often the power signal is polled (ms)
    pub const POLL_INTERVAL_MS: u32 = 500;
    /// How long a stimulus waits for a collision before the timeout vote decides (ms)
    pub const STIMULUS_TIMEOUT_MS: u32 = 10_000;

    /// Power multipliers (pixels per unit of power)
    pub const INTRO_STRENGTH: f32 = 100.0;
    pub const LETTER_STRENGTH: f32 = 150.0;
    pub const LOGIC_STRENGTH: f32 = 100.0;

    /// Pixels moved per arrow key press (manual override)
    pub const KEYBOARD_STEP: f32 = 100.0;

    /// Left-edge correction applied to the right-hand target
    pub const RIGHT_TARGET_OFFSET: f32 = 50.0;

    /// Letter the participant must answer "yes" to
    pub const TARGET_LETTER: char = 'A';
    /// Letters read out in the vigilance test (one word for every participant)
    pub const VIGILANCE_WORD: &str = "SAVEAHAART";
    /// Logic question keys follow on from the ten letters
    pub const LOGIC_KEY_OFFSET: usize = 10;
}
