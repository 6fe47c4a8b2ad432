//! The Thought / Action / Observation record of one task execution.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::thinker::ToolCall;

/// Action name recorded for a model reply that could not be parsed.
pub const INVALID_FORMAT_ACTION: &str = "_Exception";

/// One completed THINK → ACT → OBSERVE cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptEntry {
    pub thought: String,
    pub call: ToolCall,
    pub observation: String,
}

impl TranscriptEntry {
    /// Record a reply the model got wrong, keeping the raw text so it can be
    /// shown back verbatim.
    pub fn invalid_format(raw: impl Into<String>, error: &str) -> Self {
        Self {
            thought: String::new(),
            call: ToolCall::new(INVALID_FORMAT_ACTION, raw),
            observation: format!("Invalid format: {error}"),
        }
    }

    pub fn is_invalid_format(&self) -> bool {
        self.call.tool == INVALID_FORMAT_ACTION
    }
}

impl fmt::Display for TranscriptEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Thought: {}\nAction: {}\nAction Input: {}\nObservation: {}",
            self.thought, self.call.tool, self.call.input, self.observation
        )
    }
}

/// Append-only, ordered transcript. Every THINK step sees all of it.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    entries: Vec<TranscriptEntry>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: TranscriptEntry) {
        self.entries.push(entry);
    }

    pub fn entries(&self) -> &[TranscriptEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
