//! Per-screen configuration
//!
//! The intro gate, the letter vigilance test and the logic questions all run
//! the same engine; everything that differs between them lives here.

use serde::{Deserialize, Serialize};

use crate::consts::*;
use crate::screen::{Choice, NoResponsePolicy, Stimulus};
use crate::signal::PollMode;

/// Pages the session can navigate between
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Route {
    Intro,
    ATest,
    LogicQuestions,
    ExitTest,
    ExitIntro,
}

impl Route {
    pub fn path(&self) -> &'static str {
        match self {
            Route::Intro => "/intro",
            Route::ATest => "/a_test",
            Route::LogicQuestions => "/logic_questions",
            Route::ExitTest => "/exit_test",
            Route::ExitIntro => "/exit_intro",
        }
    }

    /// Resolve a location pathname (`/` is the intro)
    pub fn from_path(path: &str) -> Option<Self> {
        match path.trim_end_matches('/').rsplit('/').next().unwrap_or("") {
            "" | "intro" => Some(Route::Intro),
            "a_test" => Some(Route::ATest),
            "logic_questions" => Some(Route::LogicQuestions),
            "exit_test" => Some(Route::ExitTest),
            "exit_intro" => Some(Route::ExitIntro),
            _ => None,
        }
    }
}

/// Extra key/value stored in both result maps (e.g. the word that was read)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetTag {
    pub key: String,
    pub value: String,
}

/// What a screen does once the dot reaches a target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Flow {
    /// Graded stimulus sequence; left target answers "no", right answers "yes"
    Sequence {
        stimuli: Vec<Stimulus>,
        timeout_ms: u32,
        /// Added to the stimulus index for result keys and backend notifications
        key_offset: usize,
        tag: Option<SheetTag>,
        no_response: NoResponsePolicy,
        next: Route,
    },
    /// Single choice that navigates straight away
    Gate { left: Route, right: Route },
}

/// Everything needed to run one screen
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenConfig {
    pub name: String,
    /// Pixels of displacement per unit of power
    pub strength: f32,
    pub poll_interval_ms: u32,
    pub poll_mode: PollMode,
    /// Left target label; the page element is `<label>_box`
    pub left_label: String,
    pub right_label: String,
    /// Subtracted from the right target's measured left edge
    pub right_target_offset: f32,
    /// Spoken once when the screen loads
    pub preamble: Vec<String>,
    pub flow: Flow,
}

impl ScreenConfig {
    /// Enter/exit gate shown before the test
    pub fn intro() -> Self {
        Self {
            name: "intro".into(),
            strength: INTRO_STRENGTH,
            poll_interval_ms: POLL_INTERVAL_MS,
            poll_mode: PollMode::FireAndForget,
            left_label: "exit".into(),
            right_label: "enter".into(),
            right_target_offset: RIGHT_TARGET_OFFSET,
            preamble: vec![
                "Hi, my name is ARI. I am here to administer a delirium detection test. \
                 To proceed to the test please use your headset to select the green box \
                 labled enter on the right side. To exit please select the red box \
                 labled exit on the left side"
                    .into(),
            ],
            flow: Flow::Gate {
                left: Route::ExitIntro,
                right: Route::ATest,
            },
        }
    }

    /// Inattention test: say "yes" whenever the letter A is read out
    pub fn letter_test() -> Self {
        Self {
            name: "a_test".into(),
            strength: LETTER_STRENGTH,
            poll_interval_ms: POLL_INTERVAL_MS,
            poll_mode: PollMode::Synchronous,
            left_label: "no".into(),
            right_label: "yes".into(),
            right_target_offset: RIGHT_TARGET_OFFSET,
            preamble: vec![
                "I am going to read you a series of 10 letters.".into(),
                "Whenever you hear the letter A, indicate by selecting the green box labled yes."
                    .into(),
            ],
            flow: Flow::Sequence {
                stimuli: Stimulus::letters(VIGILANCE_WORD),
                timeout_ms: STIMULUS_TIMEOUT_MS,
                key_offset: 0,
                tag: Some(SheetTag {
                    key: "word".into(),
                    value: VIGILANCE_WORD.into(),
                }),
                no_response: NoResponsePolicy::Sentinel,
                next: Route::LogicQuestions,
            },
        }
    }

    /// Disorganised thinking test: four yes/no logic questions
    pub fn logic_questions() -> Self {
        Self {
            name: "logic_questions".into(),
            strength: LOGIC_STRENGTH,
            poll_interval_ms: POLL_INTERVAL_MS,
            poll_mode: PollMode::FireAndForget,
            left_label: "no".into(),
            right_label: "yes".into(),
            right_target_offset: RIGHT_TARGET_OFFSET,
            preamble: vec![
                "I am now going to ask you some questions.".into(),
                "Please indicate your answer by selecting the red box on the left for No \
                 and the green box on the right for Yes."
                    .into(),
            ],
            flow: Flow::Sequence {
                stimuli: vec![
                    Stimulus::question("Will a stone float on water?", Choice::No),
                    Stimulus::question("Are there fish in the sea?", Choice::Yes),
                    Stimulus::question("Does one pound weight more than two?", Choice::No),
                    Stimulus::question("Can you use a hammer to pound a nail?", Choice::Yes),
                ],
                timeout_ms: STIMULUS_TIMEOUT_MS,
                key_offset: LOGIC_KEY_OFFSET,
                tag: None,
                no_response: NoResponsePolicy::Incorrect,
                next: Route::ExitTest,
            },
        }
    }

    /// Preset for an interactive route (exit pages have no engine)
    pub fn for_route(route: Route) -> Option<Self> {
        match route {
            Route::Intro => Some(Self::intro()),
            Route::ATest => Some(Self::letter_test()),
            Route::LogicQuestions => Some(Self::logic_questions()),
            Route::ExitTest | Route::ExitIntro => None,
        }
    }

    /// Parse a JSON override (e.g. embedded in the page)
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Page element ids of the left and right targets
    pub fn target_ids(&self) -> (String, String) {
        (
            format!("{}_box", self.left_label),
            format!("{}_box", self.right_label),
        )
    }

    /// Number of stimuli (zero for a gate)
    pub fn stimulus_count(&self) -> usize {
        match &self.flow {
            Flow::Sequence { stimuli, .. } => stimuli.len(),
            Flow::Gate { .. } => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_paths() {
        assert_eq!(Route::from_path("/"), Some(Route::Intro));
        assert_eq!(Route::from_path(""), Some(Route::Intro));
        assert_eq!(Route::from_path("/a_test"), Some(Route::ATest));
        assert_eq!(Route::from_path("logic_questions"), Some(Route::LogicQuestions));
        assert_eq!(Route::from_path("/exit_intro/"), Some(Route::ExitIntro));
        assert_eq!(Route::from_path("/nope"), None);

        for route in [
            Route::Intro,
            Route::ATest,
            Route::LogicQuestions,
            Route::ExitTest,
            Route::ExitIntro,
        ] {
            assert_eq!(Route::from_path(route.path()), Some(route));
        }
    }

    #[test]
    fn test_presets() {
        let letters = ScreenConfig::letter_test();
        assert_eq!(letters.stimulus_count(), 10);
        assert_eq!(letters.poll_mode, PollMode::Synchronous);
        assert_eq!(letters.strength, 150.0);

        let logic = ScreenConfig::logic_questions();
        assert_eq!(logic.stimulus_count(), 4);
        assert_eq!(logic.poll_mode, PollMode::FireAndForget);

        let intro = ScreenConfig::intro();
        assert_eq!(intro.stimulus_count(), 0);
        assert!(matches!(
            intro.flow,
            Flow::Gate {
                left: Route::ExitIntro,
                right: Route::ATest
            }
        ));

        assert!(ScreenConfig::for_route(Route::ExitTest).is_none());
    }

    #[test]
    fn test_target_ids_follow_labels() {
        assert_eq!(
            ScreenConfig::intro().target_ids(),
            ("exit_box".to_string(), "enter_box".to_string())
        );
        for config in [ScreenConfig::letter_test(), ScreenConfig::logic_questions()] {
            assert_eq!(
                config.target_ids(),
                ("no_box".to_string(), "yes_box".to_string())
            );
        }

        let mut relabelled = ScreenConfig::logic_questions();
        relabelled.left_label = "false".into();
        assert_eq!(relabelled.target_ids().0, "false_box");
    }

    #[test]
    fn test_json_override() {
        let json = serde_json::to_string(&ScreenConfig::logic_questions()).unwrap();
        let parsed = ScreenConfig::from_json(&json).unwrap();
        assert_eq!(parsed, ScreenConfig::logic_questions());

        assert!(ScreenConfig::from_json("{\"name\": 3}").is_err());
    }
}
