//! Crews of role-playing agents that work through a list of tasks in order.
//!
//! Each [`Agent`](agent::Agent) runs a ReAct loop ([`engine::react`]):
//! think, call one tool, observe, repeat until it has a final answer or
//! runs out of iterations. A [`Crew`](crew::Crew) runs its tasks one after
//! another and hands every result to the tasks that follow.

pub mod agent;
pub mod config;
pub mod consts;
pub mod context;
pub mod crew;
pub mod engine;
pub mod error;
pub mod events;
pub mod prompts;
pub mod store;
pub mod task;
pub mod template;
pub mod thinker;
pub mod tools;
pub mod transcript;

pub use agent::Agent;
pub use context::{ExecutionContext, TaskOutput};
pub use crew::{Crew, CrewOutput, Process};
pub use error::{CrewError, Result};
pub use task::Task;
