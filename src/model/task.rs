//! Domain task model and semantic validation.

use super::parameter::Parameter;
use super::statement::Statement;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Semantic validation failures on a single task.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SemanticError {
    #[error("task name must not be empty")]
    EmptyName,
    #[error("task `{task}` declares parameter `{parameter}` more than once")]
    DuplicateParameter { task: String, parameter: String },
    #[error("task `{task}` depends on itself")]
    SelfDependency { task: String },
}

/// One dependency edge as declared.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    /// True when the edge to the previous item was `and`/`then`.
    pub sequential: bool,
    /// `in parallel` suffix on the item.
    pub parallel_marked: bool,
}

/// One matrix axis: a key multiplied over its values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixAxis {
    pub key: String,
    pub values: Vec<String>,
}

/// An executable task: parameters, dependencies, and body statements.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Task {
    pub name: String,
    pub description: Option<String>,
    /// Namespace assigned by the include that loaded the task, if any.
    pub namespace: Option<String>,
    /// Origin file, for diagnostics.
    pub source: Option<String>,
    pub parameters: Vec<Parameter>,
    pub dependencies: Vec<Dependency>,
    pub matrix: Vec<MatrixAxis>,
    pub body: Vec<Statement>,
}

impl Task {
    /// `namespace.name` when namespaced, plain name otherwise.
    pub fn full_name(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}.{}", self.name),
            None => self.name.clone(),
        }
    }

    pub fn parameter(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.name == name)
    }

    /// Structural checks applied at registration time.
    pub fn validate(&self) -> Result<(), SemanticError> {
        if self.name.trim().is_empty() {
            return Err(SemanticError::EmptyName);
        }
        let mut seen = HashSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(SemanticError::DuplicateParameter {
                    task: self.name.clone(),
                    parameter: param.name.clone(),
                });
            }
        }
        let full = self.full_name();
        if self
            .dependencies
            .iter()
            .any(|d| d.name == self.name || d.name == full)
        {
            return Err(SemanticError::SelfDependency {
                task: self.name.clone(),
            });
        }
        Ok(())
    }
}
