//! Runfile loading: read, parse, resolve includes, register tasks.
//!
//! The loader owns the front half of the pipeline: source text through
//! the lexer and parser, the AST lowered into the domain model, tasks
//! registered. Local `include "path" [as ns]` declarations are resolved
//! relative to the including file, breadth-first, with a visited set so
//! include cycles terminate. Included files may omit the `version`
//! declaration; only the root runfile must carry one.

use crate::model::{self, Project};
use crate::parser::{self, ParseError};
use crate::registry::{RegistryError, TaskRegistry};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// Loading failures.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{}", format_parse_errors(path, errors))]
    Parse {
        path: String,
        errors: Vec<ParseError>,
    },
    #[error("cannot read `{path}`: {message}")]
    Io { path: String, message: String },
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

fn format_parse_errors(path: &str, errors: &[ParseError]) -> String {
    let mut out = format!("{} parse error(s) in {path}:", errors.len());
    for error in errors {
        out.push_str("\n  ");
        out.push_str(&error.to_string());
    }
    out
}

/// Everything a run needs from the front half of the pipeline.
#[derive(Debug)]
pub struct LoadedProgram {
    pub version: Option<String>,
    pub project: Arc<Project>,
    pub registry: Arc<TaskRegistry>,
}

/// Load a runfile from disk, following includes.
pub async fn load_file(path: &Path) -> Result<LoadedProgram, LoadError> {
    let source = read(path).await?;
    load_source(&source, Some(path)).await
}

/// Load from in-memory source. `origin` anchors relative include paths
/// and names the task `source` field.
pub async fn load_source(source: &str, origin: Option<&Path>) -> Result<LoadedProgram, LoadError> {
    let origin_name = origin.map(|p| p.display().to_string());
    let (program, errors) = parser::parse(source);
    if !errors.is_empty() {
        return Err(LoadError::Parse {
            path: origin_name.unwrap_or_else(|| "<input>".to_string()),
            errors,
        });
    }

    let project = program
        .project
        .as_ref()
        .map(model::lower_project)
        .unwrap_or_default();
    let registry = TaskRegistry::new();
    for decl in &program.tasks {
        registry.register(model::lower_task(decl, origin_name.as_deref()))?;
    }

    // Breadth-first include resolution with a visited set.
    let mut visited: HashSet<PathBuf> = HashSet::new();
    let mut pending: Vec<(PathBuf, Option<String>)> = Vec::new();
    if let Some(origin) = origin {
        if let Ok(canonical) = origin.canonicalize() {
            visited.insert(canonical);
        }
    }
    if let Some(decl) = &program.project {
        let base = origin.and_then(Path::parent).unwrap_or(Path::new("."));
        for include in &decl.includes {
            pending.push((base.join(&include.path), include.namespace.clone()));
        }
    }

    while let Some((path, namespace)) = pending.pop() {
        let canonical = path.canonicalize().unwrap_or_else(|_| path.clone());
        if !visited.insert(canonical) {
            debug!(path = %path.display(), "include already loaded, skipping");
            continue;
        }
        let source = read(&path).await?;
        let (included, errors) = parser::parse(&source);
        // Included files may omit the version declaration.
        let errors: Vec<ParseError> = errors
            .into_iter()
            .filter(|e| !e.message.starts_with("missing required `version:`"))
            .collect();
        if !errors.is_empty() {
            return Err(LoadError::Parse {
                path: path.display().to_string(),
                errors,
            });
        }
        let origin_name = path.display().to_string();
        for decl in &included.tasks {
            let mut task = model::lower_task(decl, Some(&origin_name));
            task.namespace = namespace.clone();
            registry.register(task)?;
        }
        if let Some(decl) = &included.project {
            let base = path.parent().unwrap_or(Path::new("."));
            for include in &decl.includes {
                // Nested includes inherit the namespace unless they set
                // their own.
                let ns = include.namespace.clone().or_else(|| namespace.clone());
                pending.push((base.join(&include.path), ns));
            }
        }
        info!(path = %path.display(), "loaded include");
    }

    Ok(LoadedProgram {
        version: program.version,
        project: Arc::new(project),
        registry: Arc::new(registry),
    })
}

async fn read(path: &Path) -> Result<String, LoadError> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })
}
