//! Crew definition files.
//!
//! ```toml
//! [process]
//! max_iterations = 15
//!
//! [agents.researcher]
//! role = "{industry} Senior Research Analyst"
//! goal = "Uncover developments in {industry}"
//! backstory = "You work at a leading think tank."
//! tools = ["Search"]
//!
//! [[tasks]]
//! name = "research"
//! description = "Analyze the latest {industry} trends."
//! expected_output = "A bullet list report"
//! agent = "researcher"
//! output_file = "report.md"
//! ```

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use crate::agent::Agent;
use crate::consts::{DEFAULT_MAX_ITERATIONS, DEFAULT_MODEL_TIMEOUT, DEFAULT_TOOL_TIMEOUT};
use crate::crew::{Crew, CrewBuilder};
use crate::engine::ReactConfig;
use crate::error::{CrewError, Result};
use crate::task::Task;
use crate::thinker::Thinker;
use crate::tools::Tool;
use crate::tools::search::SearchTool;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrewFile {
    #[serde(default)]
    pub process: ProcessSettings,
    pub agents: BTreeMap<String, AgentSpec>,
    pub tasks: Vec<TaskSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessSettings {
    pub max_iterations: usize,
    pub tool_timeout_secs: u64,
    pub model_timeout_secs: u64,
}

impl Default for ProcessSettings {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
            tool_timeout_secs: DEFAULT_TOOL_TIMEOUT.as_secs(),
            model_timeout_secs: DEFAULT_MODEL_TIMEOUT.as_secs(),
        }
    }
}

impl From<&ProcessSettings> for ReactConfig {
    fn from(settings: &ProcessSettings) -> Self {
        ReactConfig {
            max_iterations: settings.max_iterations,
            tool_timeout: Duration::from_secs(settings.tool_timeout_secs),
            model_timeout: Duration::from_secs(settings.model_timeout_secs),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSpec {
    pub role: String,
    pub goal: String,
    #[serde(default)]
    pub backstory: String,
    #[serde(default)]
    pub tools: Vec<String>,
    /// Overrides the model given on the command line.
    pub model: Option<String>,
    pub max_iterations: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    pub name: Option<String>,
    pub description: String,
    pub expected_output: String,
    /// Key of an entry in `[agents]`.
    pub agent: String,
    pub output_file: Option<String>,
}

impl CrewFile {
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| CrewError::Config(format!("cannot read {}: {}", path.display(), e)))?;
        Self::parse(&text)
    }

    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| CrewError::Config(e.to_string()))
    }

    /// Build a crew builder from this file. `thinker_for` gets each agent's
    /// model override (or `None`) and returns its model endpoint.
    pub fn into_builder<F>(self, mut thinker_for: F) -> Result<CrewBuilder>
    where
        F: FnMut(Option<&str>) -> anyhow::Result<Arc<dyn Thinker>>,
    {
        let mut builder = Crew::builder().config(ReactConfig::from(&self.process));
        let mut agents = BTreeMap::new();

        for (id, spec) in &self.agents {
            let thinker = thinker_for(spec.model.as_deref())
                .map_err(|e| CrewError::Config(format!("agent '{id}': {e:#}")))?;
            let mut agent = Agent::builder(&spec.role, &spec.goal, &spec.backstory, thinker);
            for tool in &spec.tools {
                agent = agent.tool(builtin_tool(tool)?)?;
            }
            if let Some(max) = spec.max_iterations {
                agent = agent.max_iterations(max);
            }
            let agent = Arc::new(agent.build());
            builder = builder.agent(Arc::clone(&agent));
            agents.insert(id.clone(), agent);
        }

        for spec in self.tasks {
            let agent = agents.get(&spec.agent).ok_or_else(|| {
                CrewError::Config(format!(
                    "task '{}' refers to unknown agent '{}'",
                    spec.name.as_deref().unwrap_or(&spec.description),
                    spec.agent
                ))
            })?;
            let mut task = Task::new(spec.description, spec.expected_output, Arc::clone(agent));
            if let Some(name) = spec.name {
                task = task.name(name);
            }
            if let Some(path) = spec.output_file {
                task = task.output_file(path);
            }
            builder = builder.task(task);
        }

        Ok(builder)
    }
}

/// Tools that can be named in a crew file.
pub fn builtin_tool(name: &str) -> Result<Arc<dyn Tool>> {
    match name {
        "Search" | "search" => {
            let tool = SearchTool::new().map_err(|e| CrewError::Config(format!("{e:#}")))?;
            Ok(Arc::new(tool))
        }
        other => Err(CrewError::Config(format!("unknown tool: {other}"))),
    }
}
