pub mod anthropic;
pub mod mock;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::transcript::TranscriptEntry;

/// A single tool invocation request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    pub tool: String,
    pub input: String,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            input: input.into(),
        }
    }
}

/// What the thinker produces each iteration.
#[derive(Debug, Clone)]
pub enum Step {
    /// Invoke one tool and observe the result.
    Act { thought: String, call: ToolCall },
    /// Task is complete.
    Finish { thought: String, answer: String },
    /// The reply could not be understood. Fed back to the model, not raised.
    Invalid { raw: String, error: String },
}

/// Token usage from a single LLM call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    /// Accumulate another usage into this one.
    pub fn add(&mut self, other: TokenUsage) {
        self.input_tokens += other.input_tokens;
        self.output_tokens += other.output_tokens;
    }

    /// Total tokens (input + output).
    pub fn total(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// The result of a single thinker step: the step itself + optional token usage.
pub struct StepResult {
    pub step: Step,
    pub usage: Option<TokenUsage>,
}

impl From<Step> for StepResult {
    fn from(step: Step) -> Self {
        Self { step, usage: None }
    }
}

/// Describes a tool so the thinker knows what's available.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolDescription {
    pub name: String,
    pub description: String,
}

/// Everything the thinker sees for one THINK step.
#[derive(Debug, Clone)]
pub struct Prompt {
    pub role: String,
    pub goal: String,
    pub backstory: String,
    pub task: String,
    pub expected_output: String,
    /// Prior task results, already rendered. `None` for the first task.
    pub context: Option<String>,
    pub transcript: Vec<TranscriptEntry>,
    pub available_tools: Vec<ToolDescription>,
}

/// The borrowed brain. An LLM endpoint or a test script.
#[async_trait]
pub trait Thinker: Send + Sync {
    async fn next_step(&self, prompt: &Prompt) -> Result<StepResult>;

    /// Model identifier, for logs and run history.
    fn model(&self) -> &str;
}
