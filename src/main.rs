use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crewline::config::CrewFile;
use crewline::consts::{DEFAULT_HISTORY_LIMIT, DEFAULT_MODEL, default_db_path};
use crewline::events::{Event, EventBus};
use crewline::store::RunStore;
use crewline::store::sqlite::SqliteRunStore;
use crewline::thinker::Thinker;
use crewline::thinker::anthropic::{AnthropicThinker, ThinkerConfig};

#[derive(Parser)]
#[command(name = "crewline", version, about = "Run a crew of agents through a list of tasks.")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// SQLite database for run history (use :memory: to keep nothing)
    #[arg(short, long, global = true)]
    db: Option<String>,

    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Command {
    /// Kick off a crew defined in a TOML file
    Run {
        /// Crew definition file
        crew: PathBuf,

        /// Template input as key=value (repeatable)
        #[arg(short, long = "input", value_parser = parse_input)]
        inputs: Vec<(String, String)>,

        /// Default model for agents without their own
        #[arg(short, long, default_value = DEFAULT_MODEL)]
        model: String,

        /// Anthropic API key
        #[arg(long, env = "ANTHROPIC_API_KEY", hide_env_values = true)]
        api_key: Option<String>,

        /// Override the crew file's iteration bound
        #[arg(long)]
        max_iterations: Option<usize>,

        /// Override the crew file's tool timeout, in seconds
        #[arg(short, long)]
        timeout: Option<u64>,
    },
    /// List recent runs
    History {
        #[arg(short, long, default_value_t = DEFAULT_HISTORY_LIMIT)]
        limit: usize,
    },
    /// Show every task output of one run
    Show { run_id: i64 },
}

fn parse_input(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected key=value, got '{s}'"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::registry()
        .with(EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| format!("crewline={}", log_level)),
        ))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let db = cli
        .db
        .unwrap_or_else(|| default_db_path().to_string_lossy().into_owned());
    let store = Arc::new(SqliteRunStore::open(&db)?);

    match cli.command {
        Command::Run {
            crew,
            inputs,
            model,
            api_key,
            max_iterations,
            timeout,
        } => {
            let inputs: HashMap<String, String> = inputs.into_iter().collect();
            run_crew(crew, inputs, model, api_key, max_iterations, timeout, store).await
        }
        Command::History { limit } => show_history(store.as_ref(), limit).await,
        Command::Show { run_id } => show_run(store.as_ref(), run_id).await,
    }
}

async fn run_crew(
    path: PathBuf,
    inputs: HashMap<String, String>,
    model: String,
    api_key: Option<String>,
    max_iterations: Option<usize>,
    timeout: Option<u64>,
    store: Arc<SqliteRunStore>,
) -> anyhow::Result<()> {
    let mut file = CrewFile::load(&path)?;
    if let Some(max) = max_iterations {
        file.process.max_iterations = max;
    }
    if let Some(secs) = timeout {
        file.process.tool_timeout_secs = secs;
    }

    let api_key = api_key.unwrap_or_default();
    let events = Arc::new(EventBus::default());
    let crew = file
        .into_builder(|agent_model| {
            let config =
                ThinkerConfig::new(api_key.clone()).model(agent_model.unwrap_or(&model));
            Ok(Arc::new(AnthropicThinker::new(config)?) as Arc<dyn Thinker>)
        })?
        .events(Arc::clone(&events))
        .store(store)
        .build()?;

    let printer = tokio::spawn(print_events(events.subscribe()));

    // Ctrl+C cancels the run at the next task or model call
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\ninterrupted, stopping after the current step");
            on_signal.cancel();
        }
    });

    let result = crew.kickoff_with_cancel(&inputs, cancel).await;
    drop(crew);
    drop(events);
    let _ = printer.await;

    let output = result.context("crew run failed")?;
    println!("\n=> {}", output.raw);
    if let Some(id) = output.run_id {
        eprintln!("\n(run {id}, {} tokens)", output.usage().total());
    }
    Ok(())
}

async fn print_events(mut rx: tokio::sync::broadcast::Receiver<Event>) {
    use tokio::sync::broadcast::error::RecvError;
    loop {
        match rx.recv().await {
            Ok(Event::TaskStarted { index, task, agent }) => {
                eprintln!("\n[{}] {} ({})", index + 1, task, agent);
            }
            Ok(Event::ToolUsed {
                iteration,
                tool,
                input,
                observation,
                ..
            }) => {
                let preview: String = observation.chars().take(200).collect();
                eprintln!("  [iteration {iteration}] {tool}({input}) -> {preview}");
            }
            Ok(Event::TaskCompleted { index, .. }) => {
                eprintln!("[{}] done", index + 1);
            }
            Ok(Event::ArtifactWriteFailed { task, error }) => {
                eprintln!("  warning: {task}: {error}");
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }
}

async fn show_history(store: &dyn RunStore, limit: usize) -> anyhow::Result<()> {
    let runs = store.recent_runs(limit).await?;
    if runs.is_empty() {
        println!("no runs yet");
        return Ok(());
    }
    for run in runs {
        let mut inputs: Vec<_> = run
            .inputs
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        inputs.sort();
        println!(
            "{:>5}  {}  {:<10}  {}",
            run.id,
            run.started_at,
            run.status.to_string(),
            inputs.join(" ")
        );
    }
    Ok(())
}

async fn show_run(store: &dyn RunStore, run_id: i64) -> anyhow::Result<()> {
    let Some(run) = store.run(run_id).await? else {
        bail!("no run with id {run_id}");
    };
    println!("run {} ({}) started {}", run.id, run.status, run.started_at);
    for output in store.outputs(run_id).await? {
        println!(
            "\n--- [{}] {} ({}) ---\n{}",
            output.position + 1,
            output.task,
            output.agent,
            output.output
        );
    }
    Ok(())
}
