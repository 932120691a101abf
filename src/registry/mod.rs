//! Task registration and lookup.
//!
//! The registry is the single owner of loaded tasks. It is read-mostly:
//! writes happen during load (and `clear`), reads happen from the
//! planner and the engine, possibly concurrently from parallel loop
//! workers. Insertion order is preserved because `list` feeds help
//! output and menus.

pub mod resolver;
pub mod validator;

pub use resolver::{ResolveError, resolve};
pub use validator::{ValidationError, bind_parameter_list, bind_parameters, validate_value};

use crate::model::{SemanticError, Task};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::debug;

/// Registration and lookup failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("task `{name}` is already registered")]
    Duplicate { name: String },
    #[error("task `{name}` not found")]
    NotFound { name: String },
    #[error(transparent)]
    Semantic(#[from] SemanticError),
}

#[derive(Default, Debug)]
struct RegistryInner {
    /// Full names in registration order.
    order: Vec<String>,
    tasks: HashMap<String, Arc<Task>>,
}

/// Thread-safe, insertion-ordered task registry.
#[derive(Default, Debug)]
pub struct TaskRegistry {
    inner: RwLock<RegistryInner>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task under its full name. Fails on name collisions and
    /// on semantic validation failures.
    pub fn register(&self, task: Task) -> Result<(), RegistryError> {
        task.validate()?;
        let full_name = task.full_name();
        let mut inner = self.inner.write().expect("registry lock poisoned");
        if inner.tasks.contains_key(&full_name) {
            return Err(RegistryError::Duplicate { name: full_name });
        }
        debug!(task = %full_name, "registered task");
        inner.order.push(full_name.clone());
        inner.tasks.insert(full_name, Arc::new(task));
        Ok(())
    }

    /// Look up a task by name: direct match on the full name first, then
    /// a unique short-name match across namespaces.
    pub fn get(&self, name: &str) -> Result<Arc<Task>, RegistryError> {
        let inner = self.inner.read().expect("registry lock poisoned");
        if let Some(task) = inner.tasks.get(name) {
            return Ok(Arc::clone(task));
        }
        let mut short_matches = inner
            .order
            .iter()
            .filter_map(|full| inner.tasks.get(full))
            .filter(|task| task.name == name);
        if let Some(task) = short_matches.next() {
            if short_matches.next().is_none() {
                return Ok(Arc::clone(task));
            }
        }
        Err(RegistryError::NotFound {
            name: name.to_string(),
        })
    }

    /// All tasks in registration order.
    pub fn list(&self) -> Vec<Arc<Task>> {
        let inner = self.inner.read().expect("registry lock poisoned");
        inner
            .order
            .iter()
            .filter_map(|name| inner.tasks.get(name).cloned())
            .collect()
    }

    /// Tasks in the given namespace, in registration order.
    pub fn list_by_namespace(&self, namespace: &str) -> Vec<Arc<Task>> {
        self.list()
            .into_iter()
            .filter(|task| task.namespace.as_deref() == Some(namespace))
            .collect()
    }

    /// Distinct namespaces in first-seen order.
    pub fn namespaces(&self) -> Vec<String> {
        let mut seen = Vec::new();
        for task in self.list() {
            if let Some(ns) = &task.namespace {
                if !seen.contains(ns) {
                    seen.push(ns.clone());
                }
            }
        }
        seen
    }

    pub fn count(&self) -> usize {
        self.inner.read().expect("registry lock poisoned").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.count() == 0
    }

    pub fn clear(&self) {
        let mut inner = self.inner.write().expect("registry lock poisoned");
        inner.order.clear();
        inner.tasks.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(name: &str) -> Task {
        Task {
            name: name.into(),
            ..Task::default()
        }
    }

    fn namespaced(ns: &str, name: &str) -> Task {
        Task {
            name: name.into(),
            namespace: Some(ns.into()),
            ..Task::default()
        }
    }

    #[test]
    fn test_register_and_get() {
        let registry = TaskRegistry::new();
        registry.register(task("build")).unwrap();
        assert_eq!(registry.get("build").unwrap().name, "build");
        assert!(matches!(
            registry.get("missing"),
            Err(RegistryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_duplicate_rejected() {
        let registry = TaskRegistry::new();
        registry.register(task("build")).unwrap();
        assert!(matches!(
            registry.register(task("build")),
            Err(RegistryError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_invalid_task_rejected() {
        let registry = TaskRegistry::new();
        assert!(matches!(
            registry.register(task("")),
            Err(RegistryError::Semantic(_))
        ));
    }

    #[test]
    fn test_list_preserves_insertion_order() {
        let registry = TaskRegistry::new();
        for name in ["zeta", "alpha", "mid"] {
            registry.register(task(name)).unwrap();
        }
        let names: Vec<_> = registry.list().iter().map(|t| t.name.clone()).collect();
        assert_eq!(names, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn test_namespaced_lookup() {
        let registry = TaskRegistry::new();
        registry.register(namespaced("ci", "build")).unwrap();
        // Full-name and unique short-name lookups both resolve.
        assert_eq!(registry.get("ci.build").unwrap().full_name(), "ci.build");
        assert_eq!(registry.get("build").unwrap().full_name(), "ci.build");

        // An ambiguous short name no longer resolves.
        registry.register(namespaced("release", "build")).unwrap();
        assert!(registry.get("build").is_err());
        assert!(registry.get("release.build").is_ok());
    }

    #[test]
    fn test_namespaces_and_clear() {
        let registry = TaskRegistry::new();
        registry.register(namespaced("ci", "build")).unwrap();
        registry.register(namespaced("ci", "test")).unwrap();
        registry.register(task("deploy")).unwrap();
        assert_eq!(registry.namespaces(), vec!["ci"]);
        assert_eq!(registry.list_by_namespace("ci").len(), 2);
        assert_eq!(registry.count(), 3);
        registry.clear();
        assert!(registry.is_empty());
    }
}
