//! Error types for crew construction and execution.
//!
//! Tool failures never show up here: the tool boundary turns them into
//! observation text the reasoning loop can react to. Everything in
//! [`CrewError`] is something the orchestrator has to stop for.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CrewError {
    #[error("missing template variable: {{{name}}}")]
    MissingVariable { name: String },

    #[error("agent did not reach a final answer within {max_iterations} iterations")]
    IncompleteReasoning { max_iterations: usize },

    #[error("model call timed out after {elapsed:?}")]
    ModelTimeout { elapsed: Duration },

    #[error("model error: {0:#}")]
    Model(anyhow::Error),

    #[error("task '{task}' (agent '{agent}') failed: {source}")]
    TaskExecution {
        task: String,
        agent: String,
        #[source]
        source: Box<CrewError>,
    },

    #[error("failed to write artifact {}: {source}", .path.display())]
    ArtifactWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("run cancelled")]
    Cancelled,

    #[error("task '{task}' is assigned to agent '{agent}' which is not part of the crew")]
    AgentNotInCrew { task: String, agent: String },

    #[error("duplicate tool name: {0}")]
    DuplicateTool(String),

    #[error("crew has no tasks")]
    NoTasks,

    #[error("configuration error: {0}")]
    Config(String),

    #[error("run store error: {0:#}")]
    Store(anyhow::Error),
}

impl CrewError {
    /// Innermost cause, looking through [`CrewError::TaskExecution`] wrappers.
    pub fn root(&self) -> &CrewError {
        match self {
            CrewError::TaskExecution { source, .. } => source.root(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, CrewError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variable_message_shows_braces() {
        let err = CrewError::MissingVariable {
            name: "industry".to_string(),
        };
        assert_eq!(err.to_string(), "missing template variable: {industry}");
    }

    #[test]
    fn task_execution_names_task_and_agent() {
        let err = CrewError::TaskExecution {
            task: "research".to_string(),
            agent: "Researcher".to_string(),
            source: Box::new(CrewError::IncompleteReasoning { max_iterations: 15 }),
        };
        let msg = err.to_string();
        assert!(msg.contains("research"));
        assert!(msg.contains("Researcher"));
        assert!(msg.contains("15 iterations"));
    }

    #[test]
    fn model_timeout_shows_sub_second_duration() {
        let err = CrewError::ModelTimeout {
            elapsed: Duration::from_millis(250),
        };
        assert_eq!(err.to_string(), "model call timed out after 250ms");
    }

    #[test]
    fn root_unwraps_task_execution() {
        let err = CrewError::TaskExecution {
            task: "t".to_string(),
            agent: "a".to_string(),
            source: Box::new(CrewError::Cancelled),
        };
        assert!(matches!(err.root(), CrewError::Cancelled));
    }
}
