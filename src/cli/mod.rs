//! Command-line interface: argument parsing, config discovery, and the
//! subcommand entry points used by `main`.

pub mod args;
pub mod config;

pub use args::{Args, Commands, parse_param};
pub use config::{DEFAULT_RUNFILE, FileConfig};

use crate::capability::{Capabilities, OutputSink, StdoutSink};
use crate::engine::{Engine, EngineOptions};
use crate::loader::{self, LoadedProgram};
use crate::planner;
use anyhow::{Context, bail};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

async fn load(file: Option<PathBuf>, config: &FileConfig) -> anyhow::Result<LoadedProgram> {
    let path = config.resolve_runfile(file);
    loader::load_file(&path)
        .await
        .with_context(|| format!("loading {}", path.display()))
}

/// `drover run <task>`.
pub async fn run_task(
    task: String,
    file: Option<PathBuf>,
    params: Vec<String>,
    dry_run: bool,
    strict: bool,
) -> anyhow::Result<()> {
    let config = FileConfig::discover().map_err(anyhow::Error::msg)?;
    let loaded = load(file, &config).await?;

    let mut initial = HashMap::new();
    for raw in &params {
        let (key, value) = parse_param(raw).map_err(anyhow::Error::msg)?;
        initial.insert(key, value);
    }

    let plan = planner::plan(&loaded.registry, &loaded.project, &task)?;
    let sink: Arc<dyn OutputSink> = Arc::new(StdoutSink::new());
    let platform = std::env::consts::OS;
    let shell_config = loaded.project.shell_for(platform).cloned();
    let capabilities = Capabilities::host(Arc::clone(&sink), shell_config);
    let engine = Engine::new(
        Arc::clone(&loaded.registry),
        Arc::clone(&loaded.project),
        capabilities,
        sink,
        EngineOptions {
            dry_run,
            strict_interpolation: strict || config.engine.strict_interpolation,
        },
    );

    let report = engine.run_plan(&plan, &initial).await?;
    info!(
        run = %report.run_id,
        tasks = report.tasks.len(),
        "run finished"
    );
    Ok(())
}

/// `drover list`.
pub async fn list_tasks(file: Option<PathBuf>) -> anyhow::Result<()> {
    let config = FileConfig::discover().map_err(anyhow::Error::msg)?;
    let loaded = load(file, &config).await?;
    let tasks = loaded.registry.list();
    if tasks.is_empty() {
        println!("no tasks defined");
        return Ok(());
    }
    let width = tasks
        .iter()
        .map(|t| t.full_name().len())
        .max()
        .unwrap_or(0);
    for task in tasks {
        match &task.description {
            Some(description) => {
                println!("{:width$}  {description}", task.full_name())
            }
            None => println!("{}", task.full_name()),
        }
    }
    Ok(())
}

/// `drover plan <task>`.
pub async fn show_plan(task: String, file: Option<PathBuf>, json: bool) -> anyhow::Result<()> {
    let config = FileConfig::discover().map_err(anyhow::Error::msg)?;
    let loaded = load(file, &config).await?;
    let plan = planner::plan(&loaded.registry, &loaded.project, &task)?;
    if json {
        println!("{}", plan.to_json()?);
        return Ok(());
    }
    println!("target: {}", plan.target);
    println!("order:");
    for (i, name) in plan.execution_order.iter().enumerate() {
        println!("  {}. {name}", i + 1);
    }
    println!("levels:");
    for (i, level) in plan.levels.iter().enumerate() {
        println!("  {i}: {}", level.join(", "));
    }
    Ok(())
}

/// `drover check`.
pub async fn check(file: Option<PathBuf>) -> anyhow::Result<()> {
    let config = FileConfig::discover().map_err(anyhow::Error::msg)?;
    let loaded = load(file, &config).await?;
    if loaded.version.is_none() {
        bail!("runfile has no version declaration");
    }
    // Planning every task surfaces missing and circular dependencies.
    for task in loaded.registry.list() {
        planner::plan(&loaded.registry, &loaded.project, &task.full_name())?;
    }
    println!("ok: {} task(s)", loaded.registry.count());
    Ok(())
}
