use anyhow::Result;
use async_trait::async_trait;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{Prompt, Step, StepResult, Thinker};

/// A scripted thinker for tests. Returns pre-defined steps in order and
/// keeps a copy of every prompt it was shown.
pub struct MockThinker {
    steps: Vec<StepResult>,
    index: AtomicUsize,
    prompts: Mutex<Vec<Prompt>>,
}

impl MockThinker {
    pub fn new(steps: Vec<StepResult>) -> Self {
        Self {
            steps,
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Convenience for steps without token usage.
    pub fn from_steps(steps: Vec<Step>) -> Self {
        Self::new(steps.into_iter().map(StepResult::from).collect())
    }

    /// Number of times `next_step` was called.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::SeqCst)
    }

    /// Prompts received so far, oldest first.
    pub fn prompts(&self) -> Vec<Prompt> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Thinker for MockThinker {
    async fn next_step(&self, prompt: &Prompt) -> Result<StepResult> {
        self.prompts.lock().unwrap().push(prompt.clone());
        let i = self.index.fetch_add(1, Ordering::SeqCst);
        let result = self
            .steps
            .get(i)
            .ok_or_else(|| anyhow::anyhow!("MockThinker: no more steps (called {} times)", i + 1))?;
        Ok(StepResult {
            step: result.step.clone(),
            usage: result.usage,
        })
    }

    fn model(&self) -> &str {
        "mock"
    }
}
