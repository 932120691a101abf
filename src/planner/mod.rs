//! Execution planning.
//!
//! Turns a target task into a deterministic, immutable [`ExecutionPlan`]:
//! the topological execution order from the resolver, per-task plans,
//! the project's lifecycle hooks, Kahn-style parallelism levels, and
//! matrix expansion into synthetic `name[i]` nodes. The plan is fully
//! serializable for debug dumps and never references the AST.

use crate::model::{Hooks, Parameter, Project, Statement, Task};
use crate::registry::{ResolveError, TaskRegistry, resolve};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::debug;

/// One schedulable node: a task, or one matrix combination of a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskPlan {
    /// Plan node name; `deploy[2]` for matrix children.
    pub name: String,
    /// The underlying task's full name.
    pub task_name: String,
    pub description: Option<String>,
    pub namespace: Option<String>,
    pub source: Option<String>,
    pub parameters: Vec<Parameter>,
    pub body: Vec<Statement>,
    /// Dependency edges carried over from the task declaration.
    pub dependencies: Vec<String>,
    /// `matrix_<key> = value` entries seeded into the node's context.
    pub matrix_context: HashMap<String, String>,
}

/// Deterministic schedule for one target task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub target: String,
    /// Plan node names in run order; dependencies precede dependents.
    pub execution_order: Vec<String>,
    /// Node index. Matrix children appear under their `name[i]` names;
    /// the base name maps to the first child.
    pub tasks: HashMap<String, TaskPlan>,
    pub hooks: Hooks,
    pub namespaces: BTreeSet<String>,
    /// Kahn levels over the dependency DAG: nodes within one level have
    /// no edges between them and are parallel-safe. Informational for
    /// now; the driver executes `execution_order` sequentially.
    pub levels: Vec<Vec<String>>,
}

impl ExecutionPlan {
    pub fn task(&self, name: &str) -> Option<&TaskPlan> {
        self.tasks.get(name)
    }

    /// Pretty JSON dump for `--json` plan output.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Build the execution plan for `target`.
pub fn plan(
    registry: &TaskRegistry,
    project: &Project,
    target: &str,
) -> Result<ExecutionPlan, ResolveError> {
    let resolved = resolve(registry, target)?;
    let base_order: Vec<String> = resolved.iter().map(|t| t.full_name()).collect();
    debug!(target, order = ?base_order, "resolved execution order");

    let levels = compute_levels(&resolved, &base_order);

    let mut execution_order = Vec::new();
    let mut tasks = HashMap::new();
    let mut namespaces = BTreeSet::new();

    for task in &resolved {
        if let Some(ns) = &task.namespace {
            namespaces.insert(ns.clone());
        }
        let nodes = expand_task(task);
        let first = nodes.first().cloned();
        for node in nodes {
            execution_order.push(node.name.clone());
            tasks.insert(node.name.clone(), node);
        }
        // Matrix children shadow the base name with the first combination
        // so dependents and lookups by base name still land somewhere.
        if let Some(first) = first {
            if first.name != first.task_name {
                tasks.entry(first.task_name.clone()).or_insert(first);
            }
        }
    }

    let target_name = resolved
        .last()
        .map(|t| t.full_name())
        .unwrap_or_else(|| target.to_string());

    Ok(ExecutionPlan {
        target: target_name,
        execution_order,
        tasks,
        hooks: project.hooks.clone(),
        namespaces,
        levels,
    })
}

/// Expand a task into its plan nodes: a single node for ordinary tasks,
/// one node per matrix combination otherwise.
fn expand_task(task: &Arc<Task>) -> Vec<TaskPlan> {
    let base = TaskPlan {
        name: task.full_name(),
        task_name: task.full_name(),
        description: task.description.clone(),
        namespace: task.namespace.clone(),
        source: task.source.clone(),
        parameters: task.parameters.clone(),
        body: task.body.clone(),
        dependencies: task.dependencies.iter().map(|d| d.name.clone()).collect(),
        matrix_context: HashMap::new(),
    };
    if task.matrix.is_empty() {
        return vec![base];
    }

    let combinations = matrix_combinations(task);
    combinations
        .into_iter()
        .enumerate()
        .map(|(index, context)| {
            let mut node = base.clone();
            node.name = format!("{}[{index}]", base.task_name);
            node.matrix_context = context;
            node
        })
        .collect()
}

/// Cartesian product of the matrix axes, in declaration order with the
/// last axis varying fastest.
fn matrix_combinations(task: &Arc<Task>) -> Vec<HashMap<String, String>> {
    let mut combinations = vec![HashMap::new()];
    for axis in &task.matrix {
        let mut next = Vec::with_capacity(combinations.len() * axis.values.len());
        for combo in &combinations {
            for value in &axis.values {
                let mut entry = combo.clone();
                entry.insert(format!("matrix_{}", axis.key), value.clone());
                next.push(entry);
            }
        }
        combinations = next;
    }
    combinations
}

/// Kahn level assignment over the resolved tasks: level 0 holds nodes
/// with no in-edges, each following level the nodes unblocked by the
/// previous one. Within a level, resolver order is kept.
fn compute_levels(resolved: &[Arc<Task>], order: &[String]) -> Vec<Vec<String>> {
    // Dependencies may be declared by short name; normalize to the full
    // names used in `order` where the short name is unambiguous. An
    // empty alias value marks an ambiguous short name.
    let full_names: BTreeSet<String> = order.iter().cloned().collect();
    let mut aliases: HashMap<String, String> = HashMap::new();
    for full in &full_names {
        aliases.insert(full.clone(), full.clone());
    }
    for task in resolved {
        if task.namespace.is_none() {
            continue;
        }
        let short = task.name.clone();
        if full_names.contains(&short) {
            continue;
        }
        aliases
            .entry(short)
            .and_modify(|existing| existing.clear())
            .or_insert_with(|| task.full_name());
    }

    let mut deps_of: HashMap<String, Vec<String>> = HashMap::new();
    for task in resolved {
        let deps: Vec<String> = task
            .dependencies
            .iter()
            .filter_map(|d| aliases.get(&d.name))
            .filter(|full| !full.is_empty())
            .cloned()
            .collect();
        deps_of.insert(task.full_name(), deps);
    }

    let mut levels: Vec<Vec<String>> = Vec::new();
    let mut placed: BTreeSet<String> = BTreeSet::new();
    while placed.len() < order.len() {
        let level: Vec<String> = order
            .iter()
            .filter(|name| !placed.contains(*name))
            .filter(|name| deps_of[*name].iter().all(|dep| placed.contains(dep)))
            .cloned()
            .collect();
        if level.is_empty() {
            // Unreachable for resolver output (cycles are rejected), but
            // do not loop forever on a malformed graph.
            break;
        }
        placed.extend(level.iter().cloned());
        levels.push(level);
    }
    levels
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Dependency, MatrixAxis};

    fn task(name: &str, deps: &[&str]) -> Task {
        Task {
            name: name.into(),
            dependencies: deps
                .iter()
                .map(|d| Dependency {
                    name: (*d).into(),
                    sequential: false,
                    parallel_marked: false,
                })
                .collect(),
            ..Task::default()
        }
    }

    fn registry(tasks: Vec<Task>) -> TaskRegistry {
        let registry = TaskRegistry::new();
        for t in tasks {
            registry.register(t).unwrap();
        }
        registry
    }

    #[test]
    fn test_plan_order_and_levels() {
        let registry = registry(vec![
            task("build", &[]),
            task("lint", &[]),
            task("test", &["build"]),
            task("deploy", &["test", "lint"]),
        ]);
        let plan = plan(&registry, &Project::default(), "deploy").unwrap();
        assert_eq!(plan.target, "deploy");
        assert_eq!(
            plan.execution_order,
            vec!["build", "test", "lint", "deploy"]
        );
        // build and lint share no edges; test waits on build; deploy last.
        assert_eq!(plan.levels[0], vec!["build", "lint"]);
        assert_eq!(plan.levels[1], vec!["test"]);
        assert_eq!(plan.levels[2], vec!["deploy"]);
    }

    #[test]
    fn test_plan_is_idempotent() {
        let registry = registry(vec![
            task("a", &[]),
            task("b", &["a"]),
            task("c", &["a", "b"]),
        ]);
        let project = Project::default();
        let first = plan(&registry, &project, "c").unwrap();
        let second = plan(&registry, &project, "c").unwrap();
        assert_eq!(first.execution_order, second.execution_order);
        assert_eq!(first.levels, second.levels);
        let mut first_keys: Vec<_> = first.tasks.keys().collect();
        let mut second_keys: Vec<_> = second.tasks.keys().collect();
        first_keys.sort();
        second_keys.sort();
        assert_eq!(first_keys, second_keys);
    }

    #[test]
    fn test_matrix_expansion_product() {
        let mut deploy = task("deploy", &["build"]);
        deploy.matrix = vec![
            MatrixAxis {
                key: "env".into(),
                values: vec!["dev".into(), "prod".into()],
            },
            MatrixAxis {
                key: "region".into(),
                values: vec!["us".into(), "eu".into()],
            },
        ];
        let registry = registry(vec![task("build", &[]), deploy]);
        let plan = plan(&registry, &Project::default(), "deploy").unwrap();

        let children: Vec<_> = plan
            .execution_order
            .iter()
            .filter(|n| n.starts_with("deploy["))
            .collect();
        assert_eq!(children.len(), 4);

        let first = plan.task("deploy[0]").unwrap();
        assert_eq!(first.matrix_context["matrix_env"], "dev");
        assert_eq!(first.matrix_context["matrix_region"], "us");
        let last = plan.task("deploy[3]").unwrap();
        assert_eq!(last.matrix_context["matrix_env"], "prod");
        assert_eq!(last.matrix_context["matrix_region"], "eu");

        // Every child keeps the original dependency edges.
        for child in &children {
            assert_eq!(plan.task(child).unwrap().dependencies, vec!["build"]);
        }

        // The base name resolves to the first combination.
        assert_eq!(plan.task("deploy").unwrap().name, "deploy[0]");
    }

    #[test]
    fn test_hooks_and_namespaces_carried() {
        use crate::model::{ActionVerb, Statement};
        let mut project = Project::default();
        project.hooks.setup.push(Statement::Action {
            verb: ActionVerb::Info,
            message: "setting up".into(),
        });

        let registry = TaskRegistry::new();
        let mut build = task("build", &[]);
        build.namespace = Some("ci".into());
        registry.register(build).unwrap();
        registry.register(task("deploy", &["ci.build"])).unwrap();

        let plan = plan(&registry, &project, "deploy").unwrap();
        assert_eq!(plan.hooks.setup.len(), 1);
        assert!(plan.namespaces.contains("ci"));
        assert_eq!(plan.execution_order, vec!["ci.build", "deploy"]);
    }

    #[test]
    fn test_plan_serializes_to_json() {
        let registry = registry(vec![task("solo", &[])]);
        let plan = plan(&registry, &Project::default(), "solo").unwrap();
        let json = plan.to_json().unwrap();
        assert!(json.contains("\"execution_order\""));
        assert!(json.contains("solo"));
    }
}
