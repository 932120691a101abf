//! # Drover
//!
//! A semantic task runner: engineers declare tasks in near-English
//! syntax (`task "deploy" depends on build, test:`) and drover resolves
//! dependencies, plans, and executes them as orchestrated shell and
//! tool operations with parameters, parallel loops, try/catch, and
//! lifecycle hooks.
//!
//! ## Architecture Overview
//!
//! The pipeline runs front to back:
//!
//! - **[`lexer`]**: tokenizes runfile source with significant
//!   indentation (`Indent`/`Dedent` from an indent stack)
//! - **[`parser`]**: hand-written predictive parser producing an AST,
//!   accumulating diagnostics instead of stopping at the first error
//! - **[`model`]**: typed domain entities: tasks, parameters, the
//!   statement union, runtime values, lowered from the AST
//! - **[`registry`]**: insertion-ordered task registration, parameter
//!   validation (enums, ranges, patterns, macros), dependency
//!   resolution with cycle detection
//! - **[`planner`]**: deterministic execution plans with hook lists,
//!   Kahn parallelism levels, and matrix expansion
//! - **[`engine`]**: the statement interpreter: interpolation,
//!   conditions, variable pipelines, sequential and parallel loops,
//!   try/catch/finally, lifecycle hooks
//! - **[`capability`]**: trait interfaces for every side effect (shell,
//!   file, HTTP, download, network, docker/git, detection, secrets,
//!   time) with host-backed defaults and scripted test doubles
//! - **[`loader`]**, **[`cli`]**: runfile loading with includes, and
//!   the `drover` binary's subcommands
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use drover::capability::{Capabilities, StdoutSink};
//! use drover::engine::{Engine, EngineOptions};
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let source = r#"version: 2.0
//! task "hello":
//!     info "hi there"
//! "#;
//!     let loaded = drover::loader::load_source(source, None).await?;
//!     let plan = drover::planner::plan(&loaded.registry, &loaded.project, "hello")?;
//!
//!     let sink: Arc<drover::capability::StdoutSink> = Arc::new(StdoutSink::new());
//!     let engine = Engine::new(
//!         Arc::clone(&loaded.registry),
//!         Arc::clone(&loaded.project),
//!         Capabilities::host(sink.clone(), None),
//!         sink,
//!         EngineOptions::default(),
//!     );
//!     engine.run_plan(&plan, &HashMap::new()).await?;
//!     Ok(())
//! }
//! ```

/// Lexical analysis with significant indentation.
pub mod lexer;

/// Hand-written predictive parser and the AST it produces.
pub mod parser;

/// Semantic domain model: tasks, parameters, statements, values.
pub mod model;

/// Task registry, parameter validator, and dependency resolver.
pub mod registry;

/// Deterministic execution planning with matrix expansion.
pub mod planner;

/// The statement interpreter.
pub mod engine;

/// Capability interfaces to the outside world.
pub mod capability;

/// Runfile loading and include resolution.
pub mod loader;

/// Command-line interface.
pub mod cli;

// Re-export the main pipeline types.
pub use engine::{Engine, EngineError, EngineOptions, ExecutionContext, RunReport};
pub use loader::{LoadError, LoadedProgram};
pub use model::{Parameter, Project, Statement, Task, Value};
pub use planner::{ExecutionPlan, TaskPlan};
pub use registry::{RegistryError, ResolveError, TaskRegistry, ValidationError};
