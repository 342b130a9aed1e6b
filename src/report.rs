//! Session reporter
//!
//! Writes a completed screen's answers to the save sink: first the score
//! mapping, then the raw-response mapping. The two saves are independent;
//! a failed one is logged and left behind. Navigation never waits on it.

use crate::backend::{Backend, TransportError};
use crate::screen::AnswerSheet;

/// Result of each half of a flush
#[derive(Debug, Clone, PartialEq)]
pub struct FlushOutcome {
    pub scores: Result<(), TransportError>,
    pub responses: Result<(), TransportError>,
}

impl FlushOutcome {
    pub fn is_complete(&self) -> bool {
        self.scores.is_ok() && self.responses.is_ok()
    }
}

/// Save the score and response mappings for `sheet`
pub fn flush<B: Backend + ?Sized>(backend: &mut B, sheet: &AnswerSheet) -> FlushOutcome {
    let scores = backend.save(&sheet.scores_payload());
    if let Err(e) = &scores {
        log::warn!("Saving {} scores failed: {}", sheet.len(), e);
    }

    let responses = backend.save(&sheet.responses_payload());
    if let Err(e) = &responses {
        log::warn!("Saving {} responses failed: {}", sheet.len(), e);
    }

    log::info!(
        "Flushed {} answers (scores {}, responses {})",
        sheet.len(),
        if scores.is_ok() { "ok" } else { "lost" },
        if responses.is_ok() { "ok" } else { "lost" }
    );

    FlushOutcome { scores, responses }
}
