//! Role-bound actors that execute tasks through the reasoning loop.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::context::ExecutionContext;
use crate::engine::react::ReasoningLoop;
use crate::engine::{LoopOutcome, ReactConfig};
use crate::error::Result;
use crate::events::EventBus;
use crate::task::Task;
use crate::template::interpolate;
use crate::thinker::{Prompt, Thinker};
use crate::tools::{Tool, ToolSet};
use crate::transcript::Transcript;

/// Run-wide settings handed from the crew down to each task.
#[derive(Clone, Default)]
pub struct RunOptions {
    pub config: ReactConfig,
    pub events: Option<Arc<EventBus>>,
    pub cancel: CancellationToken,
}

/// An agent: persona + model endpoint + tools. Immutable once built.
#[derive(Clone)]
pub struct Agent {
    role: String,
    goal: String,
    backstory: String,
    thinker: Arc<dyn Thinker>,
    tools: ToolSet,
    allow_delegation: bool,
    max_iterations: Option<usize>,
}

impl Agent {
    pub fn builder(
        role: impl Into<String>,
        goal: impl Into<String>,
        backstory: impl Into<String>,
        thinker: Arc<dyn Thinker>,
    ) -> AgentBuilder {
        AgentBuilder {
            agent: Agent {
                role: role.into(),
                goal: goal.into(),
                backstory: backstory.into(),
                thinker,
                tools: ToolSet::new(),
                allow_delegation: false,
                max_iterations: None,
            },
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn backstory(&self) -> &str {
        &self.backstory
    }

    pub fn tools(&self) -> &ToolSet {
        &self.tools
    }

    pub fn model(&self) -> &str {
        self.thinker.model()
    }

    /// Whether this agent may hand work to other agents. Always false: only
    /// the sequential process exists.
    pub fn allow_delegation(&self) -> bool {
        self.allow_delegation
    }

    pub fn max_iterations(&self) -> Option<usize> {
        self.max_iterations
    }

    /// A copy with role, goal and backstory resolved against `inputs`.
    pub fn interpolate(&self, inputs: &HashMap<String, String>) -> Result<Agent> {
        Ok(Agent {
            role: interpolate(&self.role, inputs)?,
            goal: interpolate(&self.goal, inputs)?,
            backstory: interpolate(&self.backstory, inputs)?,
            ..self.clone()
        })
    }

    /// Run the reasoning loop for `task`, with prior results as background.
    pub async fn execute(
        &self,
        task: &Task,
        context: &ExecutionContext,
        opts: &RunOptions,
    ) -> Result<LoopOutcome> {
        let prompt = Prompt {
            role: self.role.clone(),
            goal: self.goal.clone(),
            backstory: self.backstory.clone(),
            task: task.description().to_string(),
            expected_output: task.expected_output().to_string(),
            context: context.render(),
            transcript: Vec::new(),
            available_tools: self.tools.descriptions(),
        };

        let mut config = opts.config.clone();
        if let Some(max) = self.max_iterations {
            config.max_iterations = max;
        }

        tracing::info!(
            agent = %self.role,
            model = self.thinker.model(),
            tools = self.tools.len(),
            prior_results = context.len(),
            "executing task"
        );

        ReasoningLoop::new(self.thinker.as_ref(), &self.tools, &config)
            .events(opts.events.as_deref())
            .cancel(opts.cancel.clone())
            .run(prompt, Transcript::new())
            .await
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("role", &self.role)
            .field("model", &self.thinker.model())
            .field("tools", &self.tools)
            .finish()
    }
}

pub struct AgentBuilder {
    agent: Agent,
}

impl AgentBuilder {
    /// Add a tool. Fails if the agent already has a tool with that name.
    pub fn tool(mut self, tool: Arc<dyn Tool>) -> Result<Self> {
        self.agent.tools.register(tool)?;
        Ok(self)
    }

    /// Per-agent override of the crew's iteration bound.
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.agent.max_iterations = Some(max);
        self
    }

    pub fn build(self) -> Agent {
        self.agent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CrewError;
    use crate::thinker::mock::MockThinker;

    fn agent() -> Agent {
        Agent::builder(
            "{industry} Researcher",
            "Find {industry} trends",
            "Veteran of {industry}",
            Arc::new(MockThinker::from_steps(vec![])),
        )
        .max_iterations(3)
        .build()
    }

    #[test]
    fn builder_defaults() {
        let agent = agent();
        assert!(!agent.allow_delegation());
        assert!(agent.tools().is_empty());
        assert_eq!(agent.max_iterations(), Some(3));
        assert_eq!(agent.model(), "mock");
    }

    #[test]
    fn interpolate_resolves_persona() {
        let inputs = HashMap::from([("industry".to_string(), "Robotics".to_string())]);
        let resolved = agent().interpolate(&inputs).unwrap();
        assert_eq!(resolved.role(), "Robotics Researcher");
        assert_eq!(resolved.goal(), "Find Robotics trends");
        assert_eq!(resolved.backstory(), "Veteran of Robotics");
        assert_eq!(resolved.max_iterations(), Some(3));
    }

    #[test]
    fn interpolate_reports_missing_variable() {
        let err = agent().interpolate(&HashMap::new()).unwrap_err();
        assert!(matches!(err, CrewError::MissingVariable { ref name } if name == "industry"));
    }
}
