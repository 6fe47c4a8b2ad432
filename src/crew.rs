//! Sequential orchestration: run each task in order, feeding every result
//! forward as context for the tasks after it.

use std::collections::HashMap;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::agent::{Agent, RunOptions};
use crate::context::{ExecutionContext, TaskOutput};
use crate::engine::ReactConfig;
use crate::error::{CrewError, Result};
use crate::events::{Event, EventBus};
use crate::store::{RunStatus, RunStore};
use crate::task::Task;
use crate::thinker::TokenUsage;

/// How tasks are scheduled. Only sequential execution exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Process {
    #[default]
    Sequential,
}

/// What `kickoff` returns: the last task's text plus everything before it.
#[derive(Debug, Clone)]
pub struct CrewOutput {
    pub raw: String,
    pub context: ExecutionContext,
    pub run_id: Option<i64>,
}

impl CrewOutput {
    pub fn tasks_output(&self) -> &[TaskOutput] {
        self.context.entries()
    }

    /// Token usage summed over every task.
    pub fn usage(&self) -> TokenUsage {
        let mut total = TokenUsage::default();
        for output in self.context.entries() {
            total.add(output.usage());
        }
        total
    }
}

pub struct Crew {
    agents: Vec<Arc<Agent>>,
    tasks: Vec<Task>,
    process: Process,
    config: ReactConfig,
    events: Option<Arc<EventBus>>,
    store: Option<Arc<dyn RunStore>>,
}

impl Crew {
    pub fn builder() -> CrewBuilder {
        CrewBuilder::default()
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn process(&self) -> Process {
        self.process
    }

    pub async fn kickoff(&self, inputs: &HashMap<String, String>) -> Result<CrewOutput> {
        self.kickoff_with_cancel(inputs, CancellationToken::new())
            .await
    }

    /// Run every task in definition order. Stops at the first failure; no
    /// later task starts. `cancel` is honoured between tasks and before
    /// every model call.
    pub async fn kickoff_with_cancel(
        &self,
        inputs: &HashMap<String, String>,
        cancel: CancellationToken,
    ) -> Result<CrewOutput> {
        let tasks = self.resolve(inputs)?;

        let run_id = match &self.store {
            Some(store) => Some(store.start_run(inputs).await.map_err(CrewError::Store)?),
            None => None,
        };

        tracing::info!(tasks = tasks.len(), agents = self.agents.len(), ?run_id, "crew kickoff");

        let opts = RunOptions {
            config: self.config.clone(),
            events: self.events.clone(),
            cancel: cancel.clone(),
        };

        let result = self.run_sequential(&tasks, &opts, run_id).await;

        if let (Some(store), Some(id)) = (&self.store, run_id) {
            let status = match &result {
                Ok(_) => RunStatus::Completed,
                Err(e) if matches!(e.root(), CrewError::Cancelled) => RunStatus::Cancelled,
                Err(e) => RunStatus::Failed(e.to_string()),
            };
            if let Err(e) = store.finish_run(id, status).await {
                if result.is_ok() {
                    return Err(CrewError::Store(e));
                }
                tracing::warn!(run_id = id, "failed to record run status: {:#}", e);
            }
        }

        let context = result?;
        let raw = context
            .last()
            .map(|o| o.raw().to_string())
            .unwrap_or_default();
        Ok(CrewOutput {
            raw,
            context,
            run_id,
        })
    }

    /// Resolve every agent once, then every task against its resolved agent.
    /// A missing variable anywhere fails before anything runs.
    fn resolve(&self, inputs: &HashMap<String, String>) -> Result<Vec<Task>> {
        let agents = self
            .agents
            .iter()
            .map(|a| a.interpolate(inputs).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;

        self.tasks
            .iter()
            .map(|task| {
                let index = agent_index(&self.agents, task)?;
                task.interpolate(inputs, Arc::clone(&agents[index]))
            })
            .collect()
    }

    async fn run_sequential(
        &self,
        tasks: &[Task],
        opts: &RunOptions,
        run_id: Option<i64>,
    ) -> Result<ExecutionContext> {
        let mut context = ExecutionContext::new();

        for (index, task) in tasks.iter().enumerate() {
            if opts.cancel.is_cancelled() {
                tracing::info!(completed = index, "run cancelled between tasks");
                return Err(CrewError::Cancelled);
            }

            let agent = task.agent().role().to_string();
            tracing::info!(index, task = task.label(), agent = %agent, "task started");
            self.emit(Event::TaskStarted {
                index,
                task: task.label().to_string(),
                agent: agent.clone(),
            });

            let output = match task.run(&context, opts).await {
                Ok(output) => output,
                Err(e) => {
                    tracing::warn!(index, task = task.label(), agent = %agent, "task failed: {}", e);
                    return Err(e);
                }
            };

            if let (Some(store), Some(id)) = (&self.store, run_id) {
                store
                    .record_output(id, index, &output)
                    .await
                    .map_err(CrewError::Store)?;
            }

            tracing::info!(
                index,
                task = task.label(),
                iterations = output.iterations(),
                "task completed"
            );
            self.emit(Event::TaskCompleted {
                index,
                task: task.label().to_string(),
                agent,
                output: output.raw().to_string(),
            });
            context.push(output);
        }

        Ok(context)
    }

    fn emit(&self, event: Event) {
        if let Some(events) = &self.events {
            events.emit(event);
        }
    }
}

fn agent_index(agents: &[Arc<Agent>], task: &Task) -> Result<usize> {
    agents
        .iter()
        .position(|a| Arc::ptr_eq(a, task.agent()))
        .ok_or_else(|| CrewError::AgentNotInCrew {
            task: task.label().to_string(),
            agent: task.agent().role().to_string(),
        })
}

#[derive(Default)]
pub struct CrewBuilder {
    agents: Vec<Arc<Agent>>,
    tasks: Vec<Task>,
    process: Process,
    config: ReactConfig,
    events: Option<Arc<EventBus>>,
    store: Option<Arc<dyn RunStore>>,
}

impl CrewBuilder {
    pub fn agent(mut self, agent: Arc<Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    pub fn task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn process(mut self, process: Process) -> Self {
        self.process = process;
        self
    }

    pub fn config(mut self, config: ReactConfig) -> Self {
        self.config = config;
        self
    }

    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn store(mut self, store: Arc<dyn RunStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Checks that there is work to do and every task's agent belongs to
    /// this crew.
    pub fn build(self) -> Result<Crew> {
        if self.tasks.is_empty() {
            return Err(CrewError::NoTasks);
        }
        for task in &self.tasks {
            agent_index(&self.agents, task)?;
        }
        Ok(Crew {
            agents: self.agents,
            tasks: self.tasks,
            process: self.process,
            config: self.config,
            events: self.events,
            store: self.store,
        })
    }
}
