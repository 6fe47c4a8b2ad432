pub mod react;

use std::time::Duration;

use crate::consts::{DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL_TIMEOUT, DEFAULT_TOOL_TIMEOUT};
use crate::thinker::TokenUsage;
use crate::transcript::Transcript;

#[derive(Debug, Clone)]
pub struct ReactConfig {
    pub max_iterations: usize,
    pub tool_timeout: Duration,
    pub model_timeout: Duration,
}

impl Default for ReactConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout: DEFAULT_TOOL_TIMEOUT,
            model_timeout: DEFAULT_MODEL_TIMEOUT,
        }
    }
}

/// What a finished reasoning loop hands back.
#[derive(Debug, Clone)]
pub struct LoopOutcome {
    pub answer: String,
    pub transcript: Transcript,
    /// THINK steps consumed, including the one that produced the answer.
    pub iterations: usize,
    pub usage: TokenUsage,
}
