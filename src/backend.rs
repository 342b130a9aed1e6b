//! Backend endpoint contract
//!
//! The screen talks to four endpoints: the power signal, the timeout vote,
//! the current-index notifier and the save sink. Calls are opaque
//! request/response pairs; failures are reported, never fatal.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Failure of a single backend call
#[derive(Debug, Clone, PartialEq)]
pub enum TransportError {
    /// Request could not be sent or completed
    Network(String),
    /// Non-success HTTP status
    Status(u16),
    /// Body was not a number / valid JSON
    Parse(String),
    /// No backend behind this endpoint
    Unavailable,
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportError::Network(msg) => write!(f, "network error: {}", msg),
            TransportError::Status(code) => write!(f, "unexpected status {}", code),
            TransportError::Parse(body) => write!(f, "unparsable body: {:?}", body),
            TransportError::Unavailable => write!(f, "endpoint unavailable"),
        }
    }
}

impl std::error::Error for TransportError {}

/// Parse a plain-text numeric body (`"0.25"`, `"-1"`, ...)
pub fn parse_number(body: &str) -> Result<f32, TransportError> {
    let value: f32 = body
        .trim()
        .parse()
        .map_err(|_| TransportError::Parse(body.to_string()))?;
    if !value.is_finite() {
        return Err(TransportError::Parse(body.to_string()));
    }
    Ok(value)
}

/// Endpoint paths served by the session backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub power: String,
    pub timeout_vote: String,
    pub next_question: String,
    pub save: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            power: "/BCI_data".into(),
            timeout_vote: "/timeout_data".into(),
            next_question: "/next_question".into(),
            save: "/save_data".into(),
        }
    }
}

/// Session backend (everything except the power signal)
pub trait Backend {
    /// Signed tally of the power samples since the last index notification
    fn timeout_vote(&mut self) -> Result<f32, TransportError>;

    /// Announce the stimulus index now on screen
    fn notify_index(&mut self, index: usize) -> Result<(), TransportError>;

    /// Persist one JSON mapping
    fn save(&mut self, payload: &Value) -> Result<(), TransportError>;
}

impl<B: Backend + ?Sized> Backend for &mut B {
    fn timeout_vote(&mut self) -> Result<f32, TransportError> {
        (**self).timeout_vote()
    }

    fn notify_index(&mut self, index: usize) -> Result<(), TransportError> {
        (**self).notify_index(index)
    }

    fn save(&mut self, payload: &Value) -> Result<(), TransportError> {
        (**self).save(payload)
    }
}

/// Browser backend over `XMLHttpRequest`
#[cfg(target_arch = "wasm32")]
pub mod http {
    use serde_json::Value;
    use wasm_bindgen::JsCast;
    use wasm_bindgen::prelude::*;
    use web_sys::XmlHttpRequest;

    use super::{Backend, Endpoints, TransportError, parse_number};
    use crate::signal::SignalSource;

    fn network(err: JsValue) -> TransportError {
        TransportError::Network(format!("{:?}", err))
    }

    /// Blocking GET returning the numeric body
    pub fn get_number_sync(url: &str) -> Result<f32, TransportError> {
        let xhr = XmlHttpRequest::new().map_err(network)?;
        xhr.open_with_async("GET", url, false).map_err(network)?;
        xhr.send().map_err(network)?;

        let status = xhr.status().map_err(network)?;
        if status != 200 {
            return Err(TransportError::Status(status));
        }
        let body = xhr.response_text().map_err(network)?.unwrap_or_default();
        parse_number(&body)
    }

    /// Non-blocking GET; `on_done` receives the parsed body or the error
    pub fn get_number_async(
        url: &str,
        on_done: impl FnOnce(Result<f32, TransportError>) + 'static,
    ) -> Result<(), TransportError> {
        let xhr = XmlHttpRequest::new().map_err(network)?;
        xhr.open_with_async("GET", url, true).map_err(network)?;

        let handle = xhr.clone();
        let closure = Closure::once(move |_event: web_sys::ProgressEvent| {
            let result = match handle.status() {
                Ok(200) => handle
                    .response_text()
                    .map_err(network)
                    .and_then(|body| parse_number(&body.unwrap_or_default())),
                Ok(code) => Err(TransportError::Status(code)),
                Err(e) => Err(network(e)),
            };
            on_done(result);
        });
        xhr.set_onloadend(Some(closure.as_ref().unchecked_ref()));
        closure.forget();

        xhr.send().map_err(network)
    }

    /// Fire-and-forget JSON POST; failures are only logged
    pub fn post_json(url: &str, payload: &Value) -> Result<(), TransportError> {
        let body = serde_json::to_string(payload)
            .map_err(|e| TransportError::Parse(e.to_string()))?;
        let xhr = XmlHttpRequest::new().map_err(network)?;
        xhr.open_with_async("POST", url, true).map_err(network)?;
        xhr.set_request_header("Content-Type", "application/json")
            .map_err(network)?;

        let handle = xhr.clone();
        let target = url.to_string();
        let closure = Closure::once(move |_event: web_sys::ProgressEvent| {
            match handle.status() {
                Ok(code) if (200..300).contains(&code) => {}
                Ok(code) => log::warn!("POST {} failed: {}", target, TransportError::Status(code)),
                Err(e) => log::warn!("POST {} failed: {}", target, network(e)),
            }
        });
        xhr.set_onloadend(Some(closure.as_ref().unchecked_ref()));
        closure.forget();

        xhr.send_with_opt_str(Some(&body)).map_err(network)
    }

    /// The Flask session backend
    #[derive(Debug, Clone, Default)]
    pub struct HttpBackend {
        pub endpoints: Endpoints,
    }

    impl HttpBackend {
        pub fn new(endpoints: Endpoints) -> Self {
            Self { endpoints }
        }
    }

    impl Backend for HttpBackend {
        fn timeout_vote(&mut self) -> Result<f32, TransportError> {
            get_number_sync(&self.endpoints.timeout_vote)
        }

        fn notify_index(&mut self, index: usize) -> Result<(), TransportError> {
            post_json(&self.endpoints.next_question, &Value::from(index))
        }

        fn save(&mut self, payload: &Value) -> Result<(), TransportError> {
            post_json(&self.endpoints.save, payload)
        }
    }

    /// Blocking power poll
    impl SignalSource for HttpBackend {
        fn sample(&mut self) -> Result<f32, TransportError> {
            get_number_sync(&self.endpoints.power)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("0.25"), Ok(0.25));
        assert_eq!(parse_number(" -1\n"), Ok(-1.0));
        assert_eq!(parse_number("0"), Ok(0.0));
        assert!(matches!(parse_number("NaN"), Err(TransportError::Parse(_))));
        assert!(matches!(parse_number(""), Err(TransportError::Parse(_))));
        assert!(matches!(parse_number("<html>"), Err(TransportError::Parse(_))));
    }

    #[test]
    fn test_parse_number_rejects_infinity() {
        for body in ["inf", "Infinity", "-inf", "1e999"] {
            assert_eq!(parse_number(body), Err(TransportError::Parse(body.to_string())));
        }
    }

    #[test]
    fn test_error_display() {
        assert_eq!(TransportError::Status(500).to_string(), "unexpected status 500");
        assert_eq!(
            TransportError::Unavailable.to_string(),
            "endpoint unavailable"
        );
    }

    #[test]
    fn test_endpoints_defaults_fill_missing_fields() {
        let endpoints: Endpoints = serde_json::from_str(r#"{"power": "/p"}"#).unwrap();
        assert_eq!(endpoints.power, "/p");
        assert_eq!(endpoints.save, "/save_data");
        assert_eq!(Endpoints::default().timeout_vote, "/timeout_data");
    }
}
