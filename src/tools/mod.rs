pub mod search;

use anyhow::Result;
use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::error::CrewError;
use crate::thinker::{ToolCall, ToolDescription};

/// Something an agent can do.
///
/// Implementors write [`Tool::execute`]. Callers use [`Tool::run`], which
/// never fails: errors and panics come back as an observation string.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;

    /// Label used in error observations: `Error performing <operation>: ...`.
    fn operation(&self) -> String {
        self.name().to_lowercase()
    }

    async fn execute(&self, query: &str) -> Result<String>;

    async fn run(&self, query: &str) -> String {
        match AssertUnwindSafe(self.execute(query)).catch_unwind().await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => error_observation(&self.operation(), &format!("{e:#}")),
            Err(panic) => error_observation(&self.operation(), &panic_message(panic)),
        }
    }
}

pub fn error_observation(operation: &str, message: &str) -> String {
    format!("Error performing {operation}: {message}")
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "tool panicked".to_string()
    }
}

/// The tools one agent may use, in registration order. Names are unique.
#[derive(Clone, Default)]
pub struct ToolSet {
    tools: Vec<Arc<dyn Tool>>,
}

impl ToolSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), CrewError> {
        if self.get(tool.name()).is_some() {
            return Err(CrewError::DuplicateTool(tool.name().to_string()));
        }
        self.tools.push(tool);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Tool>> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn descriptions(&self) -> Vec<ToolDescription> {
        self.tools
            .iter()
            .map(|t| ToolDescription {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Run a tool call and return the observation. Unknown tools, failures
    /// and timeouts all become observation text.
    pub async fn invoke(&self, call: &ToolCall, timeout: Duration) -> String {
        let Some(tool) = self.get(&call.tool) else {
            tracing::warn!(tool = %call.tool, "model asked for an unknown tool");
            let valid = self.names().join(", ");
            return format!(
                "{} is not a valid tool, try one of [{}].",
                call.tool, valid
            );
        };

        match tokio::time::timeout(timeout, tool.run(&call.input)).await {
            Ok(observation) => observation,
            Err(_) => {
                tracing::warn!(tool = %call.tool, ?timeout, "tool timed out");
                error_observation(&tool.operation(), &format!("timed out after {timeout:?}"))
            }
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}
