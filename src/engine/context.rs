//! Per-task execution context.

use crate::model::{Project, Value};
use std::collections::HashMap;
use std::sync::Arc;

/// The most recently handled error, kept for `rethrow`.
#[derive(Debug, Clone)]
pub struct HandledError {
    pub classification: String,
    pub message: String,
}

/// Runtime state for one task (or hook) execution.
///
/// Loop iterations and catch bodies run in child contexts: maps are
/// copied, so mutations never propagate back to the parent. The project
/// is shared read-only.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    pub task_name: String,
    pub parameters: HashMap<String, Value>,
    pub variables: HashMap<String, String>,
    pub project: Arc<Project>,
    pub handled_error: Option<HandledError>,
}

impl ExecutionContext {
    pub fn new(
        task_name: impl Into<String>,
        parameters: HashMap<String, Value>,
        project: Arc<Project>,
    ) -> Self {
        let task_name = task_name.into();
        let mut ctx = Self {
            task_name: task_name.clone(),
            parameters,
            variables: HashMap::new(),
            project,
            handled_error: None,
        };
        ctx.variables.insert("task_name".to_string(), task_name);
        ctx
    }

    /// Copy for a loop iteration or catch body. Mutations stay local.
    pub fn child(&self) -> Self {
        self.clone()
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.variables.insert(name.into(), value.into());
    }

    /// Resolve a name: variables shadow parameters; `globals.<key>` and
    /// `globals_<key>` reach project settings.
    pub fn lookup(&self, name: &str) -> Option<String> {
        if let Some(key) = name.strip_prefix("globals.") {
            return self.project.setting(key).map(str::to_string);
        }
        if let Some(value) = self.variables.get(name) {
            return Some(value.clone());
        }
        if let Some(value) = self.parameters.get(name) {
            return Some(value.as_string());
        }
        self.project.setting(name).map(str::to_string)
    }
}
