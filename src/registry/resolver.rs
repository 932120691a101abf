//! Dependency resolution.
//!
//! Depth-first topological sort over the dependency graph. A `visiting`
//! set detects cycles (reported with the path that closed the loop); a
//! `visited` set memoizes. Declared dependency order is preserved, which
//! makes the output stable across runs.

use super::TaskRegistry;
use crate::model::Task;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Dependency graph failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("circular dependency: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },
    #[error("task `{required_by}` depends on unknown task `{name}`")]
    MissingDependency { name: String, required_by: String },
    #[error("task `{name}` not found")]
    UnknownTarget { name: String },
}

/// Resolve `target` into a topological order where every dependency
/// precedes its dependents; the target comes last.
pub fn resolve(registry: &TaskRegistry, target: &str) -> Result<Vec<Arc<Task>>, ResolveError> {
    let root = registry
        .get(target)
        .map_err(|_| ResolveError::UnknownTarget {
            name: target.to_string(),
        })?;

    let mut order = Vec::new();
    let mut visiting = HashSet::new();
    let mut visited = HashSet::new();
    let mut path = Vec::new();
    visit(
        registry,
        &root,
        &mut order,
        &mut visiting,
        &mut visited,
        &mut path,
    )?;
    Ok(order)
}

fn visit(
    registry: &TaskRegistry,
    task: &Arc<Task>,
    order: &mut Vec<Arc<Task>>,
    visiting: &mut HashSet<String>,
    visited: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Result<(), ResolveError> {
    let full_name = task.full_name();
    if visited.contains(&full_name) {
        return Ok(());
    }
    if visiting.contains(&full_name) {
        let mut cycle = path.clone();
        cycle.push(full_name);
        return Err(ResolveError::CircularDependency { path: cycle });
    }

    visiting.insert(full_name.clone());
    path.push(full_name.clone());
    for dep in &task.dependencies {
        let dep_task = registry
            .get(&dep.name)
            .map_err(|_| ResolveError::MissingDependency {
                name: dep.name.clone(),
                required_by: full_name.clone(),
            })?;
        visit(registry, &dep_task, order, visiting, visited, path)?;
    }
    path.pop();
    visiting.remove(&full_name);
    visited.insert(full_name);
    order.push(Arc::clone(task));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Dependency;

    fn dep(name: &str) -> Dependency {
        Dependency {
            name: name.into(),
            sequential: false,
            parallel_marked: false,
        }
    }

    fn task(name: &str, deps: &[&str]) -> Task {
        Task {
            name: name.into(),
            dependencies: deps.iter().map(|d| dep(d)).collect(),
            ..Task::default()
        }
    }

    fn registry(tasks: &[(&str, &[&str])]) -> TaskRegistry {
        let registry = TaskRegistry::new();
        for (name, deps) in tasks {
            registry.register(task(name, deps)).unwrap();
        }
        registry
    }

    #[test]
    fn test_dependencies_precede_dependents() {
        let registry = registry(&[
            ("build", &[]),
            ("test", &["build"]),
            ("deploy", &["build", "test"]),
        ]);
        let order: Vec<_> = resolve(&registry, "deploy")
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(order, vec!["build", "test", "deploy"]);
    }

    #[test]
    fn test_declared_order_is_stable() {
        let registry = registry(&[
            ("c", &[]),
            ("a", &[]),
            ("b", &[]),
            ("all", &["c", "a", "b"]),
        ]);
        let order: Vec<_> = resolve(&registry, "all")
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(order, vec!["c", "a", "b", "all"]);
    }

    #[test]
    fn test_shared_dependency_visited_once() {
        let registry = registry(&[
            ("common", &[]),
            ("left", &["common"]),
            ("right", &["common"]),
            ("top", &["left", "right"]),
        ]);
        let order: Vec<_> = resolve(&registry, "top")
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        assert_eq!(order, vec!["common", "left", "right", "top"]);
    }

    #[test]
    fn test_cycle_reported_with_member() {
        let registry = registry(&[("a", &["b"]), ("b", &["a"])]);
        match resolve(&registry, "a") {
            Err(ResolveError::CircularDependency { path }) => {
                assert!(path.contains(&"a".to_string()) || path.contains(&"b".to_string()));
            }
            other => panic!("expected circular dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_dependency_names_requirer() {
        let registry = registry(&[("deploy", &["ghost"])]);
        match resolve(&registry, "deploy") {
            Err(ResolveError::MissingDependency { name, required_by }) => {
                assert_eq!(name, "ghost");
                assert_eq!(required_by, "deploy");
            }
            other => panic!("expected missing dependency, got {other:?}"),
        }
    }

    #[test]
    fn test_unknown_target() {
        let registry = registry(&[]);
        assert!(matches!(
            resolve(&registry, "nope"),
            Err(ResolveError::UnknownTarget { .. })
        ));
    }
}
