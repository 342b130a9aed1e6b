//! Stimuli, raw responses and grading
//!
//! A stimulus is graded purely from `(stimulus, response, policy)`, so the
//! same pair always yields the same score.

use serde::{Deserialize, Serialize, Serializer};

/// A yes/no answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Choice {
    No,
    Yes,
}

/// Raw response token recorded for audit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Response {
    #[serde(rename = "no")]
    No,
    #[serde(rename = "yes")]
    Yes,
    /// Timeout with no clear direction
    #[serde(rename = "NaN")]
    NoResponse,
}

impl Response {
    pub fn as_str(&self) -> &'static str {
        match self {
            Response::No => "no",
            Response::Yes => "yes",
            Response::NoResponse => "NaN",
        }
    }

    /// Map the timeout tally to a response: its sign is the majority direction
    pub fn from_vote(vote: Option<f32>) -> Self {
        match vote {
            Some(v) if v > 0.0 => Response::Yes,
            Some(v) if v < 0.0 => Response::No,
            // zero, NaN, or the vote could not be fetched
            _ => Response::NoResponse,
        }
    }

    pub fn choice(&self) -> Option<Choice> {
        match self {
            Response::No => Some(Choice::No),
            Response::Yes => Some(Choice::Yes),
            Response::NoResponse => None,
        }
    }
}

impl From<Choice> for Response {
    fn from(choice: Choice) -> Self {
        match choice {
            Choice::No => Response::No,
            Choice::Yes => Response::Yes,
        }
    }
}

/// Graded score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Score {
    Incorrect,
    Correct,
    /// Not scored (serialized as the `"NaN"` sentinel)
    NoResponse,
}

impl Score {
    fn from_bool(correct: bool) -> Self {
        if correct { Score::Correct } else { Score::Incorrect }
    }

    pub fn value(&self) -> Option<u8> {
        match self {
            Score::Incorrect => Some(0),
            Score::Correct => Some(1),
            Score::NoResponse => None,
        }
    }
}

impl Serialize for Score {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.value() {
            Some(v) => serializer.serialize_u8(v),
            None => serializer.serialize_str("NaN"),
        }
    }
}

/// How a timeout without a clear direction is scored
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoResponsePolicy {
    /// Record the "NaN" sentinel
    #[default]
    Sentinel,
    /// Score it as a wrong answer
    Incorrect,
}

/// One unit the participant responds to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Stimulus {
    /// Single letter; "yes" is correct only for the target letter
    Letter { letter: char, target: char },
    /// Question with a fixed correct answer
    Question { prompt: String, answer: Choice },
}

impl Stimulus {
    pub fn letter(letter: char) -> Self {
        Stimulus::Letter {
            letter,
            target: crate::consts::TARGET_LETTER,
        }
    }

    pub fn question(prompt: impl Into<String>, answer: Choice) -> Self {
        Stimulus::Question {
            prompt: prompt.into(),
            answer,
        }
    }

    /// Build the letter sequence for a word
    pub fn letters(word: &str) -> Vec<Self> {
        word.chars().map(Self::letter).collect()
    }

    /// Text read out by the voice bridge
    pub fn prompt(&self) -> String {
        match self {
            Stimulus::Letter { letter, .. } => letter.to_string(),
            Stimulus::Question { prompt, .. } => prompt.clone(),
        }
    }

    /// Answer that scores as correct
    pub fn expected(&self) -> Choice {
        match self {
            Stimulus::Letter { letter, target } if letter == target => Choice::Yes,
            Stimulus::Letter { .. } => Choice::No,
            Stimulus::Question { answer, .. } => *answer,
        }
    }

    /// Grade a response against this stimulus
    pub fn grade(&self, response: Response, policy: NoResponsePolicy) -> Score {
        let Some(choice) = response.choice() else {
            return match policy {
                NoResponsePolicy::Sentinel => Score::NoResponse,
                NoResponsePolicy::Incorrect => Score::Incorrect,
            };
        };

        match self {
            Stimulus::Letter { letter, target } => {
                let is_target = letter == target;
                Score::from_bool(is_target == (choice == Choice::Yes))
            }
            Stimulus::Question { answer, .. } => Score::from_bool(choice == *answer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_letter_grading() {
        let a = Stimulus::letter('A');
        let b = Stimulus::letter('B');
        let p = NoResponsePolicy::Sentinel;

        assert_eq!(a.grade(Response::Yes, p), Score::Correct);
        assert_eq!(a.grade(Response::No, p), Score::Incorrect);
        assert_eq!(b.grade(Response::Yes, p), Score::Incorrect);
        assert_eq!(b.grade(Response::No, p), Score::Correct);
        assert_eq!(a.grade(Response::NoResponse, p), Score::NoResponse);
        assert_eq!(b.grade(Response::NoResponse, p), Score::NoResponse);

        assert_eq!(a.expected(), Choice::Yes);
        assert_eq!(b.expected(), Choice::No);
    }

    #[test]
    fn test_question_grading() {
        let q = Stimulus::question("Will a stone float on water?", Choice::No);
        let p = NoResponsePolicy::Incorrect;

        assert_eq!(q.grade(Response::No, p), Score::Correct);
        assert_eq!(q.grade(Response::Yes, p), Score::Incorrect);
        assert_eq!(q.grade(Response::NoResponse, p), Score::Incorrect);
        // The policy is what keeps a timeout distinguishable
        assert_eq!(
            q.grade(Response::NoResponse, NoResponsePolicy::Sentinel),
            Score::NoResponse
        );
    }

    #[test]
    fn test_vote_sign() {
        assert_eq!(Response::from_vote(Some(2.5)), Response::Yes);
        assert_eq!(Response::from_vote(Some(-1.0)), Response::No);
        assert_eq!(Response::from_vote(Some(0.0)), Response::NoResponse);
        assert_eq!(Response::from_vote(Some(f32::NAN)), Response::NoResponse);
        assert_eq!(Response::from_vote(None), Response::NoResponse);
    }

    #[test]
    fn test_wire_tokens() {
        assert_eq!(serde_json::to_string(&Score::Correct).unwrap(), "1");
        assert_eq!(serde_json::to_string(&Score::Incorrect).unwrap(), "0");
        assert_eq!(serde_json::to_string(&Score::NoResponse).unwrap(), "\"NaN\"");
        assert_eq!(serde_json::to_string(&Response::Yes).unwrap(), "\"yes\"");
        assert_eq!(
            serde_json::to_string(&Response::NoResponse).unwrap(),
            "\"NaN\""
        );
    }

    #[test]
    fn test_prompt_text() {
        assert_eq!(Stimulus::letter('S').prompt(), "S");
        assert_eq!(
            Stimulus::question("Are there fish in the sea?", Choice::Yes).prompt(),
            "Are there fish in the sea?"
        );
        assert_eq!(Stimulus::letters("SAVE").len(), 4);
    }

    fn response_strategy() -> impl Strategy<Value = Response> {
        prop_oneof![
            Just(Response::Yes),
            Just(Response::No),
            Just(Response::NoResponse)
        ]
    }

    proptest! {
        #[test]
        fn prop_grading_is_idempotent(
            letter in proptest::char::range('A', 'Z'),
            response in response_strategy(),
        ) {
            let s = Stimulus::letter(letter);
            let first = s.grade(response, NoResponsePolicy::Sentinel);
            let second = s.grade(response, NoResponsePolicy::Sentinel);
            prop_assert_eq!(first, second);
        }
    }
}
