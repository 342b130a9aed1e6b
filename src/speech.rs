//! Voice bridge
//!
//! Prompts are spoken by the robot's text-to-speech action server, reached
//! through rosbridge. Speaking is fire-and-forget: nothing waits for the
//! utterance to finish and a missing robot only costs the audio.

use serde_json::{Value, json};

/// Default rosbridge endpoint on the robot
pub const ROSBRIDGE_URL: &str = "ws://ari-17c:9090";
/// Goal topic of the `/tts` action server
pub const TTS_GOAL_TOPIC: &str = "/tts/goal";
pub const TTS_GOAL_TYPE: &str = "pal_interaction_msgs/TtsActionGoal";
pub const TTS_LANG: &str = "en_GB";

/// Anything that can say a prompt out loud
pub trait Speaker {
    fn speak(&mut self, text: &str);
}

impl<P: Speaker + ?Sized> Speaker for &mut P {
    fn speak(&mut self, text: &str) {
        (**self).speak(text)
    }
}

/// One text-to-speech goal
#[derive(Debug, Clone, PartialEq)]
pub struct TtsGoal {
    /// Unique per connection
    pub id: String,
    pub text: String,
    pub lang_id: String,
}

impl TtsGoal {
    pub fn new(seq: u64, text: &str) -> Self {
        Self {
            id: format!("goal_{}", seq),
            text: text.to_string(),
            lang_id: TTS_LANG.to_string(),
        }
    }

    /// rosbridge v2 `advertise` op, sent once before the first goal
    pub fn advertise() -> Value {
        json!({
            "op": "advertise",
            "topic": TTS_GOAL_TOPIC,
            "type": TTS_GOAL_TYPE,
        })
    }

    /// rosbridge v2 `publish` op carrying this goal
    pub fn to_message(&self) -> Value {
        json!({
            "op": "publish",
            "topic": TTS_GOAL_TOPIC,
            "msg": {
                "goal_id": {
                    "stamp": { "secs": 0, "nsecs": 0 },
                    "id": self.id,
                },
                "goal": {
                    "rawtext": {
                        "text": self.text,
                        "lang_id": self.lang_id,
                    }
                }
            }
        })
    }
}

/// Logs utterances instead of speaking them
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSpeaker;

impl Speaker for LogSpeaker {
    fn speak(&mut self, text: &str) {
        log::info!("Say: {}", text);
    }
}

/// Keeps every utterance (testing)
#[derive(Debug, Clone, Default)]
pub struct RecordingSpeaker {
    pub spoken: Vec<String>,
}

impl Speaker for RecordingSpeaker {
    fn speak(&mut self, text: &str) {
        self.spoken.push(text.to_string());
    }
}

/// Browser speaker over a rosbridge WebSocket
#[cfg(target_arch = "wasm32")]
pub mod rosbridge {
    use std::cell::RefCell;
    use std::rc::Rc;

    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::WebSocket;

    use super::{Speaker, TtsGoal};

    #[derive(Default)]
    struct Link {
        open: bool,
        /// Messages sent before the socket opened
        queue: Vec<String>,
    }

    pub struct RosbridgeSpeaker {
        socket: Option<WebSocket>,
        link: Rc<RefCell<Link>>,
        seq: u64,
    }

    impl RosbridgeSpeaker {
        /// Connect to `url`; a failed connect leaves the speaker mute
        pub fn connect(url: &str) -> Self {
            let link = Rc::new(RefCell::new(Link::default()));
            let socket = match WebSocket::new(url) {
                Ok(socket) => Some(socket),
                Err(e) => {
                    log::warn!("Rosbridge connect to {} failed: {:?} - speech disabled", url, e);
                    None
                }
            };

            if let Some(socket) = &socket {
                let on_open = {
                    let link = Rc::clone(&link);
                    let socket = socket.clone();
                    Closure::<dyn FnMut()>::new(move || {
                        let mut link = link.borrow_mut();
                        link.open = true;
                        for message in link.queue.drain(..) {
                            if let Err(e) = socket.send_with_str(&message) {
                                log::warn!("Rosbridge send failed: {:?}", e);
                            }
                        }
                        log::info!("Connected to rosbridge");
                    })
                };
                socket.set_onopen(Some(on_open.as_ref().unchecked_ref()));
                on_open.forget();

                let on_error = Closure::<dyn FnMut(web_sys::Event)>::new(|_e: web_sys::Event| {
                    log::warn!("Rosbridge connection error");
                });
                socket.set_onerror(Some(on_error.as_ref().unchecked_ref()));
                on_error.forget();

                let on_close = {
                    let link = Rc::clone(&link);
                    Closure::<dyn FnMut()>::new(move || {
                        link.borrow_mut().open = false;
                        log::info!("Rosbridge connection closed");
                    })
                };
                socket.set_onclose(Some(on_close.as_ref().unchecked_ref()));
                on_close.forget();
            }

            let mut speaker = Self {
                socket,
                link,
                seq: 0,
            };
            speaker.send(TtsGoal::advertise().to_string());
            speaker
        }

        fn send(&mut self, message: String) {
            let Some(socket) = &self.socket else {
                return;
            };
            let mut link = self.link.borrow_mut();
            if !link.open {
                link.queue.push(message);
                return;
            }
            if let Err(e) = socket.send_with_str(&message) {
                log::warn!("Rosbridge send failed: {:?}", e);
            }
        }
    }

    impl Speaker for RosbridgeSpeaker {
        fn speak(&mut self, text: &str) {
            self.seq += 1;
            let goal = TtsGoal::new(self.seq, text);
            self.send(goal.to_message().to_string());
        }
    }
}
