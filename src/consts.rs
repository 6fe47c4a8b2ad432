//! Project-wide constants.

use std::path::PathBuf;
use std::time::Duration;

/// Default Anthropic model when none is specified.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// THINK steps an agent gets before giving up on a task.
pub const DEFAULT_MAX_ITERATIONS: usize = 15;

pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_MODEL_TIMEOUT: Duration = Duration::from_secs(120);

/// Number of runs `crewline history` lists by default.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Default database path: `~/.crewline/crewline.db`, or `./crewline.db`
/// when there is no home directory.
pub fn default_db_path() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(".crewline").join("crewline.db"),
        None => PathBuf::from("crewline.db"),
    }
}
