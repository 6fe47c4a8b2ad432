pub mod sqlite;

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::context::TaskOutput;

/// How a run ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    Running,
    Completed,
    Failed(String),
    Cancelled,
}

impl RunStatus {
    fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Running => "running",
            RunStatus::Completed => "completed",
            RunStatus::Failed(_) => "failed",
            RunStatus::Cancelled => "cancelled",
        }
    }

    fn error(&self) -> Option<&str> {
        match self {
            RunStatus::Failed(e) => Some(e),
            _ => None,
        }
    }

    fn from_parts(status: &str, error: Option<String>) -> Self {
        match status {
            "completed" => RunStatus::Completed,
            "failed" => RunStatus::Failed(error.unwrap_or_default()),
            "cancelled" => RunStatus::Cancelled,
            _ => RunStatus::Running,
        }
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStatus::Failed(e) => write!(f, "failed: {e}"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// One kickoff, as recorded.
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub inputs: HashMap<String, String>,
    pub status: RunStatus,
}

/// One task output within a run.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputRecord {
    pub position: usize,
    pub task: String,
    pub agent: String,
    pub output: String,
}

/// Where crews record what they did. Could be SQLite, a remote service, etc.
#[async_trait]
pub trait RunStore: Send + Sync {
    async fn start_run(&self, inputs: &HashMap<String, String>) -> Result<i64>;
    async fn record_output(&self, run_id: i64, position: usize, output: &TaskOutput) -> Result<()>;
    async fn finish_run(&self, run_id: i64, status: RunStatus) -> Result<()>;
    /// Most recent runs first.
    async fn recent_runs(&self, limit: usize) -> Result<Vec<RunRecord>>;
    async fn run(&self, run_id: i64) -> Result<Option<RunRecord>>;
    /// Outputs of one run in task order.
    async fn outputs(&self, run_id: i64) -> Result<Vec<OutputRecord>>;
}
