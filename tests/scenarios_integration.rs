//! End-to-end scenarios: source text through lexer, parser, registry,
//! planner, and engine, with scripted capabilities.

use drover::capability::testing::{TestHarness, harness};
use drover::engine::{Engine, EngineOptions, RunReport};
use drover::{EngineError, loader, planner};
use std::collections::HashMap;
use std::sync::Arc;

async fn run(
    source: &str,
    target: &str,
    params: &[(&str, &str)],
    configure: impl FnOnce(&TestHarness),
) -> (TestHarness, Result<RunReport, EngineError>) {
    let h = harness();
    configure(&h);
    let loaded = loader::load_source(source, None).await.expect("load");
    let plan = planner::plan(&loaded.registry, &loaded.project, target).expect("plan");
    let engine = Engine::new(
        Arc::clone(&loaded.registry),
        Arc::clone(&loaded.project),
        h.capabilities.clone(),
        h.sink.clone(),
        EngineOptions::default(),
    );
    let initial: HashMap<String, String> = params
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    let result = engine.run_plan(&plan, &initial).await;
    (h, result)
}

#[tokio::test]
async fn scenario_hello_emits_info_line() {
    let (h, result) = run(
        "version: 2.0\ntask \"hello\":\n    info \"hi\"\n",
        "hello",
        &[],
        |_| {},
    )
    .await;
    result.unwrap();
    let hits: Vec<_> = h.sink.lines().into_iter().filter(|l| l.contains("hi")).collect();
    assert_eq!(hits.len(), 1);
}

#[tokio::test]
async fn scenario_build_runs_strictly_before_deploy() {
    let source = r#"version: 2.0
task "build":
    info "Building"

task "deploy":
    depends on build
    info "Deploying"
"#;
    let (h, result) = run(source, "deploy", &[], |_| {}).await;
    result.unwrap();
    let building = h.sink.position("Building").expect("Building logged");
    let deploying = h.sink.position("Deploying").expect("Deploying logged");
    assert!(building < deploying);
}

#[tokio::test]
async fn scenario_enum_validation_rejects_unknown_value() {
    let source = r#"version: 2.0
task "t":
    requires env from ["dev", "prod"]
    info "never runs"
"#;
    let (h, result) = run(source, "t", &[("env", "staging")], |_| {}).await;
    let err = result.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("env"));
    assert!(message.contains("dev") && message.contains("prod"));
    assert!(!h.sink.contains("never runs"));
}

#[tokio::test]
async fn scenario_parallel_fail_fast_reports_success_and_failure() {
    let source = r#"version: 2.0
task "t":
    for each item in ["ok1", "ok2", "err", "ok3"] in parallel with 2 workers fail fast:
        run "handle {item}"
        info "done {item}"
"#;
    let (h, result) = run(source, "t", &[], |h| h.shell.fail_on("handle err")).await;
    assert!(result.is_err());
    let lines = h.sink.lines();
    // At least one successful iteration and the failing one are visible.
    assert!(lines.iter().any(|l| l.starts_with("ℹ done ok")));
    assert!(lines.iter().any(|l| l.contains("err")));
}

#[tokio::test]
async fn scenario_try_catch_completes_task() {
    let source = r#"version: 2.0
task "t":
    try:
        fail "boom"
    catch:
        info "handled"
"#;
    let (h, result) = run(source, "t", &[], |_| {}).await;
    let report = result.unwrap();
    assert!(report.tasks.iter().all(|t| t.succeeded));
    assert!(h.sink.contains("handled"));
}

#[tokio::test]
async fn scenario_circular_dependency_is_a_planning_error() {
    let source = r#"version: 2.0
task "a":
    depends on b
    info "a"

task "b":
    depends on a
    info "b"
"#;
    let loaded = loader::load_source(source, None).await.unwrap();
    let err = planner::plan(&loaded.registry, &loaded.project, "a").unwrap_err();
    let message = err.to_string();
    assert!(message.contains("circular"));
    assert!(message.contains('a') || message.contains('b'));
}

#[tokio::test]
async fn scenario_matrix_expands_to_four_nodes() {
    let source = r#"version: 2.0
task "deploy":
    matrix env from ["dev", "prod"]
    matrix region from ["us", "eu"]
    info "{matrix_env}-{matrix_region}"
"#;
    let loaded = loader::load_source(source, None).await.unwrap();
    let plan = planner::plan(&loaded.registry, &loaded.project, "deploy").unwrap();
    let children: Vec<_> = plan
        .execution_order
        .iter()
        .filter(|n| n.starts_with("deploy["))
        .collect();
    assert_eq!(children.len(), 4);
    let mut seen = Vec::new();
    for child in &children {
        let node = plan.task(child).unwrap();
        let combo = format!(
            "{}-{}",
            node.matrix_context["matrix_env"], node.matrix_context["matrix_region"]
        );
        seen.push(combo);
    }
    seen.sort();
    assert_eq!(seen, vec!["dev-eu", "dev-us", "prod-eu", "prod-us"]);

    let (h, result) = run(source, "deploy", &[], |_| {}).await;
    result.unwrap();
    for combo in ["dev-us", "dev-eu", "prod-us", "prod-eu"] {
        assert!(h.sink.contains(combo), "missing {combo}");
    }
}

#[tokio::test]
async fn scenario_now_builtin_emits_year() {
    // The scripted clock is pinned to 2024.
    let source = "version: 2.0\ntask \"t\":\n    info \"at {now('2006')}\"\n";
    let (h, result) = run(source, "t", &[], |_| {}).await;
    result.unwrap();
    let line = h
        .sink
        .lines()
        .into_iter()
        .find(|l| l.contains("at "))
        .unwrap();
    let year = line.split("at ").nth(1).unwrap();
    assert_eq!(year.len(), 4);
    assert!(year.chars().all(|c| c.is_ascii_digit()));
    assert_eq!(year, "2024");
}
