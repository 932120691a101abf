//! Universal invariants across the pipeline: topological ordering,
//! registry ordering, validator composition, planner idempotence,
//! interpolation fixpoint, loop scoping, and parallel determinism.

use drover::capability::testing::harness;
use drover::engine::{Engine, EngineOptions};
use drover::model::{DataType, Dependency, Parameter, Task, Value};
use drover::registry::{bind_parameters, resolve, validate_value};
use drover::{TaskRegistry, loader, planner};
use std::collections::HashMap;
use std::sync::Arc;

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

#[test]
fn topological_order_holds_for_every_dag_shape() {
    let shapes: Vec<Vec<(&str, Vec<&str>)>> = vec![
        // Chain
        vec![("a", vec![]), ("b", vec!["a"]), ("c", vec!["b"])],
        // Diamond
        vec![
            ("base", vec![]),
            ("left", vec!["base"]),
            ("right", vec!["base"]),
            ("top", vec!["left", "right"]),
        ],
        // Wide fan-in
        vec![
            ("w1", vec![]),
            ("w2", vec![]),
            ("w3", vec![]),
            ("w4", vec![]),
            ("sink", vec!["w1", "w2", "w3", "w4"]),
        ],
    ];

    for shape in shapes {
        let registry = TaskRegistry::new();
        for (name, deps) in &shape {
            registry.register(task(name, deps)).unwrap();
        }
        let target = shape.last().unwrap().0;
        let order: Vec<String> = resolve(&registry, target)
            .unwrap()
            .iter()
            .map(|t| t.name.clone())
            .collect();
        let position = |name: &str| order.iter().position(|n| n == name).unwrap();
        for (name, deps) in &shape {
            for dep in deps {
                assert!(
                    position(dep) < position(name),
                    "{dep} must precede {name} in {order:?}"
                );
            }
        }
    }
}

#[test]
fn registry_list_preserves_any_insertion_order() {
    let names = ["zeta", "alpha", "omega", "beta", "kappa"];
    let registry = TaskRegistry::new();
    for name in names {
        registry.register(task(name, &[])).unwrap();
    }
    let listed: Vec<String> = registry.list().iter().map(|t| t.name.clone()).collect();
    assert_eq!(listed, names);
}

#[test]
fn validator_composition_passes_when_all_dimensions_pass() {
    let param = Parameter {
        name: "release".into(),
        data_type: DataType::String,
        constraints: vec!["v1.2.3".into(), "v2.0.0".into()],
        pattern: Some(r"^v\d.*$".into()),
        pattern_macro: Some("semver".into()),
        ..Parameter::default()
    };
    let good = Value::from_raw("v1.2.3", DataType::String);
    assert!(validate_value(&param, &good).is_ok());

    // Breaking any single dimension fails with an error naming the
    // parameter and the offending value.
    let bad = Value::from_raw("v9.9.9", DataType::String); // fails enum
    let err = validate_value(&param, &bad).unwrap_err();
    assert!(err.to_string().contains("release"));
    assert!(err.to_string().contains("v9.9.9"));
}

#[test]
fn binding_stops_at_first_validation_failure() {
    let task = Task {
        name: "t".into(),
        parameters: vec![
            Parameter {
                name: "count".into(),
                data_type: DataType::Number,
                min_value: Some(1.0),
                max_value: Some(5.0),
                default_value: Some("3".into()),
                ..Parameter::default()
            },
        ],
        ..Task::default()
    };
    let mut provided = HashMap::new();
    provided.insert("count".to_string(), "99".to_string());
    assert!(bind_parameters(&task, &provided).is_err());
    assert!(bind_parameters(&task, &HashMap::new()).is_ok());
}

#[tokio::test]
async fn planner_is_idempotent_over_repeated_calls() {
    let source = r#"version: 2.0
task "build":
    info "b"

task "test":
    depends on build
    info "t"

task "deploy":
    depends on build and test
    matrix env from ["dev", "prod"]
    info "d"
"#;
    let loaded = loader::load_source(source, None).await.unwrap();
    let first = planner::plan(&loaded.registry, &loaded.project, "deploy").unwrap();
    let second = planner::plan(&loaded.registry, &loaded.project, "deploy").unwrap();
    assert_eq!(first.execution_order, second.execution_order);
    assert_eq!(first.levels, second.levels);
    let mut a: Vec<_> = first.tasks.keys().collect();
    let mut b: Vec<_> = second.tasks.keys().collect();
    a.sort();
    b.sort();
    assert_eq!(a, b);
}

#[tokio::test]
async fn interpolation_is_identity_without_tokens() {
    let inputs = [
        "plain text",
        "no placeholders at all",
        "punctuation: [a, b] (c) <d>",
    ];
    for input in inputs {
        let source = format!("version: 2.0\ntask \"t\":\n    info \"{input}\"\n");
        let h = harness();
        let loaded = loader::load_source(&source, None).await.unwrap();
        let plan = planner::plan(&loaded.registry, &loaded.project, "t").unwrap();
        let engine = Engine::new(
            Arc::clone(&loaded.registry),
            Arc::clone(&loaded.project),
            h.capabilities.clone(),
            h.sink.clone(),
            EngineOptions::default(),
        );
        engine.run_plan(&plan, &HashMap::new()).await.unwrap();
        assert!(h.sink.contains(input), "expected `{input}` verbatim");
    }
}

#[tokio::test]
async fn loop_iteration_writes_stay_scoped() {
    let source = r#"version: 2.0
task "t":
    set counter to "outer"
    for each i in range 1 to 3:
        set counter to "inner-{i}"
    info "after: {counter}"
"#;
    let h = harness();
    let loaded = loader::load_source(source, None).await.unwrap();
    let plan = planner::plan(&loaded.registry, &loaded.project, "t").unwrap();
    let engine = Engine::new(
        Arc::clone(&loaded.registry),
        Arc::clone(&loaded.project),
        h.capabilities.clone(),
        h.sink.clone(),
        EngineOptions::default(),
    );
    engine.run_plan(&plan, &HashMap::new()).await.unwrap();
    assert!(h.sink.contains("after: outer"));
}

#[tokio::test]
async fn matrix_sizes_multiply() {
    let source = r#"version: 2.0
task "m":
    matrix a from ["1", "2", "3"]
    matrix b from ["x", "y"]
    info "node"
"#;
    let loaded = loader::load_source(source, None).await.unwrap();
    let plan = planner::plan(&loaded.registry, &loaded.project, "m").unwrap();
    assert_eq!(
        plan.execution_order
            .iter()
            .filter(|n| n.starts_with("m["))
            .count(),
        6
    );
}

#[tokio::test]
async fn parallel_error_count_is_deterministic() {
    // Error collection is keyed by original index, so the reported count
    // never depends on worker scheduling.
    let source = r#"version: 2.0
task "t":
    for each item in ["bad-a", "ok-1", "bad-b", "ok-2", "bad-c"] in parallel with 3 workers:
        run "handle {item}"
"#;
    for _ in 0..5 {
        let h = harness();
        h.shell.fail_on("bad-");
        let loaded = loader::load_source(source, None).await.unwrap();
        let plan = planner::plan(&loaded.registry, &loaded.project, "t").unwrap();
        let engine = Engine::new(
            Arc::clone(&loaded.registry),
            Arc::clone(&loaded.project),
            h.capabilities.clone(),
            h.sink.clone(),
            EngineOptions::default(),
        );
        let err = engine.run_plan(&plan, &HashMap::new()).await.unwrap_err();
        assert!(err.to_string().contains("3 errors"), "got: {err}");
    }
}
