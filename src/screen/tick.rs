//! Per-stimulus interaction loop
//!
//! Displacement → collision → answer resolution → sequence advance. Every
//! entry point returns the side effects the host must carry out, in order.

use super::geometry::collides;
use super::state::{Effect, Phase, ScreenState};
use super::stimulus::Response;
use crate::config::{Flow, Route};

/// One displacement event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickInput {
    /// BCI power sample (scaled by the screen's strength)
    Power(f32),
    /// Raw pixel nudge from the keyboard override
    Nudge(f32),
}

/// Which box the dot reached
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

impl ScreenState {
    /// Speak the preamble and enter the first stimulus
    pub fn start(&mut self) -> Vec<Effect> {
        if self.phase != Phase::Idle {
            return Vec::new();
        }

        let mut effects: Vec<Effect> = self
            .config
            .preamble
            .iter()
            .cloned()
            .map(Effect::Speak)
            .collect();

        self.reset_dot();
        log::info!("Screen '{}' started", self.config.name);

        match self.sequence_len() {
            Some(0) => self.complete(&mut effects),
            Some(_) => self.enter(0, &mut effects),
            None => self.phase = Phase::Active(0),
        }

        effects
    }

    /// Apply one displacement and resolve any collision
    pub fn tick(&mut self, input: TickInput) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.is_active() {
            return effects;
        }

        let x = match input {
            TickInput::Power(power) if power.is_finite() => self.integrate(power),
            TickInput::Power(power) => {
                log::debug!("Ignoring non-finite power {}", power);
                self.dot.pos.x
            }
            TickInput::Nudge(dx) => self.displace(dx),
        };
        log::debug!("Tick {}: dot x = {:.1}", self.ticks, x);

        // Left box is checked first, so it wins if both overlap
        let side = if collides(&self.dot, &self.layout.left) {
            Some(Side::Left)
        } else if collides(&self.dot, &self.layout.right) {
            Some(Side::Right)
        } else {
            None
        };

        if let Some(side) = side {
            self.select(side, &mut effects);
        }

        effects
    }

    /// Keyboard override: move by a fixed step
    pub fn nudge(&mut self, dx: f32) -> Vec<Effect> {
        self.tick(TickInput::Nudge(dx))
    }

    /// The per-stimulus timer fired; `vote` is the timeout tally (None if unavailable)
    pub fn on_timeout(&mut self, vote: Option<f32>) -> Vec<Effect> {
        let mut effects = Vec::new();
        if !self.is_active() || !matches!(self.config.flow, Flow::Sequence { .. }) {
            return effects;
        }

        let response = Response::from_vote(vote);
        log::info!(
            "Timeout on {:?} (vote {:?}) -> {}",
            self.phase,
            vote,
            response.as_str()
        );
        self.resolve_into(response, &mut effects);
        effects
    }

    /// Record a response for the current stimulus and move on
    pub fn resolve(&mut self, response: Response) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.resolve_into(response, &mut effects);
        effects
    }

    /// Move to the next stimulus (or complete)
    pub fn advance(&mut self) -> Vec<Effect> {
        let mut effects = Vec::new();
        self.advance_into(&mut effects);
        effects
    }

    /// A gate follows the same tie rule: left ("exit") wins an overlap
    fn select(&mut self, side: Side, effects: &mut Vec<Effect>) {
        let gate_route = match &self.config.flow {
            Flow::Sequence { .. } => None,
            Flow::Gate { left, right } => Some(match side {
                Side::Left => *left,
                Side::Right => *right,
            }),
        };

        match gate_route {
            Some(route) => {
                log::info!("Gate selected {:?} -> {}", side, route.path());
                self.phase = Phase::Complete;
                effects.push(Effect::CancelPolling);
                effects.push(Effect::Navigate(route));
            }
            None => {
                let response = match side {
                    Side::Left => Response::No,
                    Side::Right => Response::Yes,
                };
                self.resolve_into(response, effects);
            }
        }
    }

    fn resolve_into(&mut self, response: Response, effects: &mut Vec<Effect>) {
        let Phase::Active(index) = self.phase else {
            return;
        };
        let Flow::Sequence {
            stimuli,
            no_response,
            ..
        } = &self.config.flow
        else {
            return;
        };

        let score = stimuli[index].grade(response, *no_response);
        self.sheet.record(index, score, response);
        log::info!(
            "Stimulus {} answered '{}' -> {:?}",
            index,
            response.as_str(),
            score
        );

        self.reset_dot();
        effects.push(Effect::CancelTimeout);
        self.advance_into(effects);
    }

    fn advance_into(&mut self, effects: &mut Vec<Effect>) {
        let Phase::Active(index) = self.phase else {
            return;
        };
        match self.sequence_len() {
            Some(len) if index + 1 < len => self.enter(index + 1, effects),
            Some(_) => self.complete(effects),
            None => {}
        }
    }

    fn sequence_len(&self) -> Option<usize> {
        match &self.config.flow {
            Flow::Sequence { stimuli, .. } => Some(stimuli.len()),
            Flow::Gate { .. } => None,
        }
    }

    /// Transition into `Active(index)`: notify, arm the timeout, speak
    fn enter(&mut self, index: usize, effects: &mut Vec<Effect>) {
        let Flow::Sequence {
            stimuli,
            timeout_ms,
            key_offset,
            ..
        } = &self.config.flow
        else {
            return;
        };

        self.phase = Phase::Active(index);
        effects.push(Effect::NotifyIndex(key_offset + index));
        effects.push(Effect::ArmTimeout {
            after_ms: *timeout_ms,
        });
        effects.push(Effect::Speak(stimuli[index].prompt()));
    }

    /// Terminal transition: stop timers, flush, navigate
    fn complete(&mut self, effects: &mut Vec<Effect>) {
        let Flow::Sequence { next, .. } = &self.config.flow else {
            return;
        };
        let next: Route = *next;

        self.phase = Phase::Complete;
        log::info!(
            "Screen '{}' complete with {} answers",
            self.config.name,
            self.sheet.len()
        );
        effects.push(Effect::CancelPolling);
        effects.push(Effect::CancelTimeout);
        effects.push(Effect::Flush(self.sheet.clone()));
        effects.push(Effect::Navigate(next));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ScreenConfig, SheetTag};
    use crate::screen::{Choice, Layout, NoResponsePolicy, Score, Stimulus, Target};
    use glam::Vec2;
    use serde_json::json;

    // Dot starts at x=500; left box spans 0..200, right box 800..1000.
    fn layout() -> Layout {
        Layout::measured(
            Vec2::new(1000.0, 800.0),
            50.0,
            Target::new(0.0, 300.0, 200.0),
            Target::new(850.0, 300.0, 200.0),
            50.0,
        )
    }

    fn sequence(stimuli: Vec<Stimulus>) -> ScreenConfig {
        let mut config = ScreenConfig::letter_test();
        config.preamble.clear();
        config.flow = Flow::Sequence {
            stimuli,
            timeout_ms: 10_000,
            key_offset: 0,
            tag: None,
            no_response: NoResponsePolicy::Sentinel,
            next: Route::LogicQuestions,
        };
        config
    }

    fn count_navigations(effects: &[Effect]) -> usize {
        effects
            .iter()
            .filter(|e| matches!(e, Effect::Navigate(_)))
            .count()
    }

    #[test]
    fn test_start_enters_first_stimulus() {
        let mut state = ScreenState::new(ScreenConfig::letter_test(), layout());
        assert_eq!(state.phase, Phase::Idle);

        let effects = state.start();
        assert_eq!(state.phase, Phase::Active(0));
        assert_eq!(
            effects,
            vec![
                Effect::Speak("I am going to read you a series of 10 letters.".into()),
                Effect::Speak(
                    "Whenever you hear the letter A, indicate by selecting the green box labled yes."
                        .into()
                ),
                Effect::NotifyIndex(0),
                Effect::ArmTimeout { after_ms: 10_000 },
                Effect::Speak("S".into()),
            ]
        );

        // Starting twice does nothing
        assert!(state.start().is_empty());
    }

    #[test]
    fn test_power_moves_dot_into_yes_box() {
        let mut state = ScreenState::new(sequence(Stimulus::letters("AB")), layout());
        state.start();

        // 150 px per unit: 500 -> 650 -> 800 (no hit at 650, right box centre 900)
        assert!(state.tick(TickInput::Power(1.0)).is_empty());
        let effects = state.tick(TickInput::Power(1.0));
        assert_eq!(state.dot.pos.x, 500.0, "dot resets after an answer");
        assert_eq!(
            effects,
            vec![
                Effect::CancelTimeout,
                Effect::NotifyIndex(1),
                Effect::ArmTimeout { after_ms: 10_000 },
                Effect::Speak("B".into()),
            ]
        );
        let record = state.sheet.get(0).unwrap();
        assert_eq!(record.response, Response::Yes);
        assert_eq!(record.score, Score::Correct);
    }

    #[test]
    fn test_left_box_answers_no() {
        let mut state = ScreenState::new(sequence(Stimulus::letters("BC")), layout());
        state.start();

        state.tick(TickInput::Power(-1.0));
        state.tick(TickInput::Power(-1.0));
        let record = state.sheet.get(0).unwrap();
        assert_eq!(record.response, Response::No);
        assert_eq!(record.score, Score::Correct);
    }

    #[test]
    fn test_left_box_wins_ties() {
        // Both boxes cover the dot's start position
        let overlapping = Layout {
            viewport: Vec2::new(1000.0, 800.0),
            dot_radius: 25.0,
            left: Target::new(400.0, 0.0, 200.0),
            right: Target::new(450.0, 0.0, 200.0),
        };
        let mut state = ScreenState::new(sequence(Stimulus::letters("A")), overlapping);
        state.start();
        state.tick(TickInput::Power(0.0));
        assert_eq!(state.sheet.get(0).unwrap().response, Response::No);
    }

    #[test]
    fn test_two_stimuli_complete_once() {
        let mut state = ScreenState::new(sequence(Stimulus::letters("AB")), layout());
        state.start();

        let first = state.resolve(Response::Yes);
        assert_eq!(count_navigations(&first), 0);
        assert_eq!(state.phase, Phase::Active(1));

        let second = state.resolve(Response::No);
        assert_eq!(state.phase, Phase::Complete);
        assert_eq!(count_navigations(&second), 1);

        // Timers are cancelled before the flush and navigation
        let polling = second
            .iter()
            .position(|e| *e == Effect::CancelPolling)
            .unwrap();
        let flush = second
            .iter()
            .position(|e| matches!(e, Effect::Flush(_)))
            .unwrap();
        let nav = second
            .iter()
            .position(|e| matches!(e, Effect::Navigate(Route::LogicQuestions)))
            .unwrap();
        assert!(polling < flush && flush < nav);

        let Some(Effect::Flush(sheet)) = second.get(flush) else {
            panic!("expected flush");
        };
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet.scores_payload(), json!({"Q0": 1, "Q1": 1}));
        assert_eq!(sheet.responses_payload(), json!({"0": "yes", "1": "no"}));

        // Terminal: nothing else is processed
        assert!(state.tick(TickInput::Power(5.0)).is_empty());
        assert!(state.on_timeout(Some(1.0)).is_empty());
        assert!(state.resolve(Response::Yes).is_empty());
        assert!(state.advance().is_empty());
    }

    #[test]
    fn test_n_advances_reach_complete() {
        for n in 1..=6 {
            let mut state = ScreenState::new(sequence(Stimulus::letters(&"X".repeat(n))), layout());
            state.start();
            let mut navigations = 0;
            let mut advances = 0;
            while !state.is_complete() {
                navigations += count_navigations(&state.advance());
                advances += 1;
                assert!(advances <= n);
            }
            assert_eq!(advances, n);
            assert_eq!(navigations, 1);
        }
    }

    #[test]
    fn test_timeout_votes() {
        let mut state = ScreenState::new(sequence(Stimulus::letters("ABC")), layout());
        state.start();

        state.on_timeout(Some(2.5));
        state.on_timeout(Some(-1.0));
        state.on_timeout(Some(0.0));

        assert_eq!(state.sheet.get(0).unwrap().response, Response::Yes);
        assert_eq!(state.sheet.get(1).unwrap().response, Response::No);
        let last = state.sheet.get(2).unwrap();
        assert_eq!(last.response, Response::NoResponse);
        assert_eq!(last.score, Score::NoResponse);
        assert!(state.is_complete());
    }

    #[test]
    fn test_logic_questions_keys() {
        let mut state = ScreenState::new(ScreenConfig::logic_questions(), layout());
        let effects = state.start();
        assert!(effects.contains(&Effect::NotifyIndex(10)));

        state.resolve(Response::No);
        state.resolve(Response::No);
        state.on_timeout(None);
        let effects = state.resolve(Response::Yes);

        let sheet = effects
            .iter()
            .find_map(|e| match e {
                Effect::Flush(sheet) => Some(sheet.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(
            sheet.scores_payload(),
            json!({"Q10": 1, "Q11": 0, "Q12": 0, "Q13": 1})
        );
        assert_eq!(
            sheet.responses_payload(),
            json!({"10": "no", "11": "no", "12": "NaN", "13": "yes"})
        );
        assert!(effects.contains(&Effect::Navigate(Route::ExitTest)));
    }

    #[test]
    fn test_letter_sheet_is_tagged() {
        let mut config = sequence(Stimulus::letters("A"));
        if let Flow::Sequence { tag, .. } = &mut config.flow {
            *tag = Some(SheetTag {
                key: "word".into(),
                value: "A".into(),
            });
        }
        let mut state = ScreenState::new(config, layout());
        state.start();
        state.resolve(Response::Yes);
        assert_eq!(state.sheet.scores_payload(), json!({"word": "A", "Q0": 1}));
    }

    #[test]
    fn test_keyboard_nudge() {
        let mut state = ScreenState::new(
            sequence(vec![Stimulus::question("Are there fish in the sea?", Choice::Yes)]),
            layout(),
        );
        state.start();

        assert!(state.nudge(100.0).is_empty());
        assert!(state.nudge(100.0).is_empty());
        // 800 is the right box's (corrected) left edge
        let effects = state.nudge(100.0);
        assert!(effects.contains(&Effect::Navigate(Route::LogicQuestions)));
        assert_eq!(state.sheet.get(0).unwrap().score, Score::Correct);
    }

    #[test]
    fn test_gate_navigates() {
        let mut state = ScreenState::new(ScreenConfig::intro(), layout());
        let effects = state.start();
        assert_eq!(effects.len(), 1, "only the greeting is spoken");
        assert_eq!(state.phase, Phase::Active(0));

        // Timeouts do nothing on a gate
        assert!(state.on_timeout(Some(1.0)).is_empty());

        // 100 px per unit: 500 -> 300 -> 100 (left box centre)
        assert!(state.tick(TickInput::Power(-2.0)).is_empty());
        let effects = state.tick(TickInput::Power(-2.0));
        assert_eq!(
            effects,
            vec![Effect::CancelPolling, Effect::Navigate(Route::ExitIntro)]
        );
        assert!(state.is_complete());
        assert!(state.sheet.is_empty());
    }

    #[test]
    fn test_gate_overlap_picks_exit() {
        let overlapping = Layout {
            viewport: Vec2::new(1000.0, 800.0),
            dot_radius: 25.0,
            left: Target::new(400.0, 0.0, 200.0),
            right: Target::new(450.0, 0.0, 200.0),
        };
        let mut state = ScreenState::new(ScreenConfig::intro(), overlapping);
        state.start();
        let effects = state.tick(TickInput::Power(0.0));
        assert_eq!(effects.last(), Some(&Effect::Navigate(Route::ExitIntro)));
    }

    #[test]
    fn test_empty_sequence_completes_on_start() {
        let mut state = ScreenState::new(sequence(Vec::new()), layout());
        let effects = state.start();
        assert!(state.is_complete());
        assert_eq!(count_navigations(&effects), 1);
    }

    #[test]
    fn test_idle_ignores_input() {
        let mut state = ScreenState::new(sequence(Stimulus::letters("A")), layout());
        assert!(state.tick(TickInput::Power(10.0)).is_empty());
        assert_eq!(state.dot.pos.x, 500.0);
    }

    #[test]
    fn test_non_finite_power_is_ignored() {
        let mut state = ScreenState::new(sequence(Stimulus::letters("A")), layout());
        state.start();
        state.tick(TickInput::Power(f32::NAN));
        assert_eq!(state.dot.pos.x, 500.0);
        assert!(state.is_active());
    }
}
