use tokio_util::sync::CancellationToken;

use super::{LoopOutcome, ReactConfig};
use crate::error::{CrewError, Result};
use crate::events::{Event, EventBus};
use crate::thinker::{Prompt, Step, Thinker, TokenUsage, ToolCall};
use crate::tools::ToolSet;
use crate::transcript::{Transcript, TranscriptEntry};

/// States of one task's THINK → ACT → OBSERVE cycle.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopState {
    Think,
    Act { thought: String, call: ToolCall },
    Observe(TranscriptEntry),
    Done(String),
    Failed,
}

/// The ReAct loop for a single task. Wires together a Thinker and a ToolSet;
/// the transcript is owned by the loop for the duration of [`run`](Self::run).
pub struct ReasoningLoop<'a> {
    thinker: &'a dyn Thinker,
    tools: &'a ToolSet,
    config: &'a ReactConfig,
    events: Option<&'a EventBus>,
    cancel: CancellationToken,
}

impl<'a> ReasoningLoop<'a> {
    pub fn new(thinker: &'a dyn Thinker, tools: &'a ToolSet, config: &'a ReactConfig) -> Self {
        Self {
            thinker,
            tools,
            config,
            events: None,
            cancel: CancellationToken::new(),
        }
    }

    pub fn events(mut self, events: Option<&'a EventBus>) -> Self {
        self.events = events;
        self
    }

    pub fn cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Drive the loop to `Done` or `Failed`.
    ///
    /// `prompt.transcript` is replaced by `transcript` on every THINK, so the
    /// thinker always sees the full history. The thinker is called at most
    /// `max_iterations` times.
    pub async fn run(&self, mut prompt: Prompt, mut transcript: Transcript) -> Result<LoopOutcome> {
        let mut state = LoopState::Think;
        let mut iterations = 0;
        let mut usage = TokenUsage::default();

        loop {
            state = match state {
                LoopState::Think => {
                    if iterations >= self.config.max_iterations {
                        LoopState::Failed
                    } else {
                        if self.cancel.is_cancelled() {
                            return Err(CrewError::Cancelled);
                        }
                        iterations += 1;
                        prompt.transcript = transcript.entries().to_vec();
                        match self.think(&prompt, &mut usage).await? {
                            Step::Act { thought, call } => {
                                tracing::info!(
                                    agent = %prompt.role,
                                    iteration = iterations,
                                    tool = %call.tool,
                                    "thought: {}",
                                    thought
                                );
                                LoopState::Act { thought, call }
                            }
                            Step::Finish { thought, answer } => {
                                tracing::info!(
                                    agent = %prompt.role,
                                    iteration = iterations,
                                    "final answer. thought: {}",
                                    thought
                                );
                                LoopState::Done(answer)
                            }
                            Step::Invalid { raw, error } => {
                                tracing::warn!(
                                    agent = %prompt.role,
                                    iteration = iterations,
                                    %error,
                                    "model reply was not understood"
                                );
                                transcript.push(TranscriptEntry::invalid_format(raw, &error));
                                LoopState::Think
                            }
                        }
                    }
                }

                LoopState::Act { thought, call } => {
                    let observation = self.tools.invoke(&call, self.config.tool_timeout).await;
                    LoopState::Observe(TranscriptEntry {
                        thought,
                        call,
                        observation,
                    })
                }

                LoopState::Observe(entry) => {
                    tracing::debug!(
                        agent = %prompt.role,
                        tool = %entry.call.tool,
                        "observation: {}",
                        entry.observation
                    );
                    if let Some(events) = self.events {
                        events.emit(Event::ToolUsed {
                            agent: prompt.role.clone(),
                            iteration: iterations,
                            tool: entry.call.tool.clone(),
                            input: entry.call.input.clone(),
                            observation: entry.observation.clone(),
                        });
                    }
                    transcript.push(entry);
                    LoopState::Think
                }

                LoopState::Done(answer) => {
                    return Ok(LoopOutcome {
                        answer,
                        transcript,
                        iterations,
                        usage,
                    });
                }

                LoopState::Failed => {
                    tracing::warn!(
                        agent = %prompt.role,
                        max_iterations = self.config.max_iterations,
                        "no final answer within iteration bound"
                    );
                    return Err(CrewError::IncompleteReasoning {
                        max_iterations: self.config.max_iterations,
                    });
                }
            };
        }
    }

    async fn think(&self, prompt: &Prompt, usage: &mut TokenUsage) -> Result<Step> {
        let timeout = self.config.model_timeout;
        let result = tokio::time::timeout(timeout, self.thinker.next_step(prompt))
            .await
            .map_err(|_| CrewError::ModelTimeout { elapsed: timeout })?
            .map_err(CrewError::Model)?;

        if let Some(u) = result.usage {
            usage.add(u);
        }
        Ok(result.step)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thinker::mock::MockThinker;

    fn prompt() -> Prompt {
        Prompt {
            role: "Tester".to_string(),
            goal: "test".to_string(),
            backstory: String::new(),
            task: "t".to_string(),
            expected_output: "o".to_string(),
            context: None,
            transcript: vec![],
            available_tools: vec![],
        }
    }

    fn finish(answer: &str) -> Step {
        Step::Finish {
            thought: "done".to_string(),
            answer: answer.to_string(),
        }
    }

    #[tokio::test]
    async fn zero_bound_fails_without_thinking() {
        let thinker = MockThinker::from_steps(vec![finish("never")]);
        let tools = ToolSet::new();
        let config = ReactConfig {
            max_iterations: 0,
            ..ReactConfig::default()
        };

        let err = ReasoningLoop::new(&thinker, &tools, &config)
            .run(prompt(), Transcript::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::IncompleteReasoning { max_iterations: 0 }));
        assert_eq!(thinker.calls(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_stops_before_thinking() {
        let thinker = MockThinker::from_steps(vec![finish("never")]);
        let tools = ToolSet::new();
        let config = ReactConfig::default();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = ReasoningLoop::new(&thinker, &tools, &config)
            .cancel(cancel)
            .run(prompt(), Transcript::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::Cancelled));
        assert_eq!(thinker.calls(), 0);
    }

    #[tokio::test]
    async fn thinker_error_becomes_model_error() {
        let thinker = MockThinker::from_steps(vec![]);
        let tools = ToolSet::new();
        let config = ReactConfig::default();

        let err = ReasoningLoop::new(&thinker, &tools, &config)
            .run(prompt(), Transcript::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::Model(_)));
    }

    #[tokio::test]
    async fn invalid_replies_still_count_against_bound() {
        let invalid = || Step::Invalid {
            raw: "hmm".to_string(),
            error: "not JSON".to_string(),
        };
        let thinker = MockThinker::from_steps(vec![invalid(), invalid(), invalid(), finish("late")]);
        let tools = ToolSet::new();
        let config = ReactConfig {
            max_iterations: 3,
            ..ReactConfig::default()
        };

        let err = ReasoningLoop::new(&thinker, &tools, &config)
            .run(prompt(), Transcript::new())
            .await
            .unwrap_err();

        assert!(matches!(err, CrewError::IncompleteReasoning { max_iterations: 3 }));
        assert_eq!(thinker.calls(), 3);
    }

    #[tokio::test]
    async fn seeded_transcript_is_shown_to_thinker() {
        let thinker = MockThinker::from_steps(vec![finish("ok")]);
        let tools = ToolSet::new();
        let config = ReactConfig::default();
        let mut seeded = Transcript::new();
        seeded.push(TranscriptEntry {
            thought: "earlier".to_string(),
            call: ToolCall::new("Search", "x"),
            observation: "y".to_string(),
        });

        let outcome = ReasoningLoop::new(&thinker, &tools, &config)
            .run(prompt(), seeded)
            .await
            .unwrap();

        assert_eq!(outcome.answer, "ok");
        assert_eq!(thinker.prompts()[0].transcript.len(), 1);
        assert_eq!(outcome.transcript.len(), 1);
    }
}
