//! Results of finished tasks, passed forward to the tasks after them.

use std::path::{Path, PathBuf};

use crate::thinker::TokenUsage;

const SEPARATOR: &str = "\n\n----------\n\n";

/// The result of one task. Immutable once produced.
#[derive(Debug, Clone)]
pub struct TaskOutput {
    name: Option<String>,
    description: String,
    expected_output: String,
    agent: String,
    raw: String,
    artifact: Option<PathBuf>,
    iterations: usize,
    usage: TokenUsage,
}

impl TaskOutput {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        name: Option<String>,
        description: String,
        expected_output: String,
        agent: String,
        raw: String,
        artifact: Option<PathBuf>,
        iterations: usize,
        usage: TokenUsage,
    ) -> Self {
        Self {
            name,
            description,
            expected_output,
            agent,
            raw,
            artifact,
            iterations,
            usage,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn expected_output(&self) -> &str {
        &self.expected_output
    }

    /// Role of the agent that produced this output.
    pub fn agent(&self) -> &str {
        &self.agent
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    /// Where the output was written, if the task had an output file and the
    /// write succeeded.
    pub fn artifact(&self) -> Option<&Path> {
        self.artifact.as_deref()
    }

    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn usage(&self) -> TokenUsage {
        self.usage
    }

    /// Task name if it has one, else its description.
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.description)
    }
}

/// Ordered outputs of the tasks run so far. Only the crew appends.
#[derive(Debug, Clone, Default)]
pub struct ExecutionContext {
    entries: Vec<TaskOutput>,
}

impl ExecutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn push(&mut self, output: TaskOutput) {
        self.entries.push(output);
    }

    pub fn entries(&self) -> &[TaskOutput] {
        &self.entries
    }

    pub fn last(&self) -> Option<&TaskOutput> {
        self.entries.last()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Prior results as background text for the next agent. `None` when
    /// nothing has run yet.
    pub fn render(&self) -> Option<String> {
        if self.entries.is_empty() {
            return None;
        }
        let sections = self
            .entries
            .iter()
            .map(|o| format!("Task: {}\nAgent: {}\nResult:\n{}", o.label(), o.agent, o.raw))
            .collect::<Vec<_>>();
        Some(sections.join(SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn output(name: Option<&str>, agent: &str, raw: &str) -> TaskOutput {
        TaskOutput::new(
            name.map(str::to_string),
            "Describe it".to_string(),
            "text".to_string(),
            agent.to_string(),
            raw.to_string(),
            None,
            1,
            TokenUsage::default(),
        )
    }

    #[test]
    fn empty_context_renders_nothing() {
        assert!(ExecutionContext::new().render().is_none());
    }

    #[test]
    fn render_labels_each_result() {
        let mut ctx = ExecutionContext::new();
        ctx.push(output(Some("research"), "Researcher", "findings"));
        ctx.push(output(None, "Writer", "draft"));

        let text = ctx.render().unwrap();
        assert!(text.contains("Task: research\nAgent: Researcher\nResult:\nfindings"));
        assert!(text.contains("Task: Describe it\nAgent: Writer\nResult:\ndraft"));
        assert!(text.find("findings").unwrap() < text.find("draft").unwrap());
    }

    #[test]
    fn push_keeps_definition_order() {
        let mut ctx = ExecutionContext::new();
        for i in 0..4 {
            ctx.push(output(Some(&format!("t{i}")), "A", &i.to_string()));
        }
        assert_eq!(ctx.len(), 4);
        let raws: Vec<_> = ctx.entries().iter().map(|o| o.raw()).collect();
        assert_eq!(raws, vec!["0", "1", "2", "3"]);
        assert_eq!(ctx.last().unwrap().raw(), "3");
    }
}
