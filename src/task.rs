//! A unit of work assigned to exactly one agent.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::agent::{Agent, RunOptions};
use crate::context::{ExecutionContext, TaskOutput};
use crate::error::{CrewError, Result};
use crate::events::Event;
use crate::template::{interpolate, interpolate_opt};

#[derive(Debug, Clone)]
pub struct Task {
    name: Option<String>,
    description: String,
    expected_output: String,
    agent: Arc<Agent>,
    output_file: Option<String>,
}

impl Task {
    pub fn new(
        description: impl Into<String>,
        expected_output: impl Into<String>,
        agent: Arc<Agent>,
    ) -> Self {
        Self {
            name: None,
            description: description.into(),
            expected_output: expected_output.into(),
            agent,
            output_file: None,
        }
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Write the result to this path once the task succeeds. May contain
    /// placeholders.
    pub fn output_file(mut self, path: impl Into<String>) -> Self {
        self.output_file = Some(path.into());
        self
    }

    pub fn task_name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    pub fn agent(&self) -> &Arc<Agent> {
        &self.agent
    }

    pub fn output_path(&self) -> Option<&Path> {
        self.output_file.as_deref().map(Path::new)
    }

    /// Name if set, else the description. Used in logs and errors.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.description)
    }

    /// A copy with every templated field resolved, bound to `agent`
    /// (the already-resolved version of this task's agent).
    pub fn interpolate(&self, inputs: &HashMap<String, String>, agent: Arc<Agent>) -> Result<Task> {
        Ok(Task {
            name: self.name.clone(),
            description: interpolate(&self.description, inputs)?,
            expected_output: interpolate(&self.expected_output, inputs)?,
            agent,
            output_file: interpolate_opt(self.output_file.as_deref(), inputs)?,
        })
    }

    /// Execute through the assigned agent, then write the artifact if one is
    /// configured. A failed write is logged and does not fail the task.
    pub async fn run(&self, context: &ExecutionContext, opts: &RunOptions) -> Result<TaskOutput> {
        let outcome = self
            .agent
            .execute(self, context, opts)
            .await
            .map_err(|e| CrewError::TaskExecution {
                task: self.label().to_string(),
                agent: self.agent.role().to_string(),
                source: Box::new(e),
            })?;

        let artifact = match self.output_path() {
            Some(path) => match write_artifact(path, &outcome.answer).await {
                Ok(()) => Some(path.to_path_buf()),
                Err(e) => {
                    tracing::warn!(task = self.label(), "{}", e);
                    if let Some(events) = &opts.events {
                        events.emit(Event::ArtifactWriteFailed {
                            task: self.label().to_string(),
                            error: e.to_string(),
                        });
                    }
                    None
                }
            },
            None => None,
        };

        Ok(TaskOutput::new(
            self.name.clone(),
            self.description.clone(),
            self.expected_output.clone(),
            self.agent.role().to_string(),
            outcome.answer,
            artifact,
            outcome.iterations,
            outcome.usage,
        ))
    }
}

async fn write_artifact(path: &Path, text: &str) -> Result<()> {
    let to_err = |source| CrewError::ArtifactWrite {
        path: PathBuf::from(path),
        source,
    };
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await.map_err(to_err)?;
    }
    tokio::fs::write(path, text).await.map_err(to_err)
}
