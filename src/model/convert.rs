//! AST → domain lowering.
//!
//! The mapping is total over every statement variant. Parameter
//! declarations appearing inside block bodies are the one exception:
//! parameters are collected at task scope only, so nested declarations
//! lower to nothing (not an error).

use super::parameter::{ParamKind, Parameter};
use super::project::{Hooks, Project, ShellConfig};
use super::statement::{
    CatchClause, Detection, DownloadSpec, Filter, HttpSpec, Iterable, LoopSpec, Statement,
};
use super::task::{Dependency, MatrixAxis, Task};
use super::value::DataType;
use crate::parser::ast::{
    DetectionNode, HookKind, IterableNode, ParamDecl, ParamKindDecl, ProjectDecl, ShellMode,
    StatementNode, StmtNode, TaskDecl,
};

/// Build a domain task from its AST declaration.
pub fn lower_task(decl: &TaskDecl, source: Option<&str>) -> Task {
    Task {
        name: decl.name.clone(),
        description: decl.description.clone(),
        namespace: None,
        source: source.map(str::to_string),
        parameters: decl.parameters.iter().map(lower_param).collect(),
        dependencies: decl
            .dependencies
            .iter()
            .map(|d| Dependency {
                name: d.name.clone(),
                sequential: d.sequential,
                parallel_marked: d.parallel_marked,
            })
            .collect(),
        matrix: decl
            .matrix
            .iter()
            .map(|m| MatrixAxis {
                key: m.key.clone(),
                values: m.values.clone(),
            })
            .collect(),
        body: lower_statements(&decl.body),
    }
}

/// Build the project context from its AST declaration.
pub fn lower_project(decl: &ProjectDecl) -> Project {
    let mut project = Project {
        name: decl.name.clone(),
        version: decl.version.clone(),
        ..Project::default()
    };
    for (key, value) in &decl.settings {
        project.settings.insert(key.clone(), value.clone());
    }
    for config in &decl.shell_configs {
        project.shell_configs.insert(
            config.platform.clone(),
            ShellConfig {
                executable: config.executable.clone(),
                args: config.args.clone(),
                environment: config.env.iter().cloned().collect(),
            },
        );
    }
    let mut hooks = Hooks::default();
    for hook in &decl.hooks {
        let body = lower_statements(&hook.body);
        match hook.kind {
            HookKind::Setup => hooks.setup.extend(body),
            HookKind::Teardown => hooks.teardown.extend(body),
            HookKind::BeforeTask => hooks.before_task.extend(body),
            HookKind::AfterTask => hooks.after_task.extend(body),
        }
    }
    project.hooks = hooks;
    for snippet in &decl.snippets {
        project
            .snippets
            .insert(snippet.name.clone(), lower_statements(&snippet.body));
    }
    for template in &decl.templates {
        project
            .templates
            .insert(template.name.clone(), lower_statements(&template.body));
    }
    project
}

pub fn lower_param(decl: &ParamDecl) -> Parameter {
    Parameter {
        name: decl.name.clone(),
        kind: match decl.kind {
            ParamKindDecl::Requires => ParamKind::Requires,
            ParamKindDecl::Given => ParamKind::Given,
            ParamKindDecl::Accepts => ParamKind::Accepts,
        },
        data_type: decl
            .data_type
            .as_deref()
            .and_then(DataType::parse)
            .unwrap_or_default(),
        default_value: decl.default.clone(),
        constraints: decl.constraints.clone(),
        min_value: decl.min,
        max_value: decl.max,
        pattern: decl.pattern.clone(),
        pattern_macro: decl.pattern_macro.clone(),
        email_format: decl.email_format,
        variadic: decl.variadic,
    }
}

pub fn lower_statements(nodes: &[StatementNode]) -> Vec<Statement> {
    nodes.iter().filter_map(lower_statement).collect()
}

/// Lower one statement. Returns `None` for nested parameter declarations.
pub fn lower_statement(node: &StatementNode) -> Option<Statement> {
    let stmt = match &node.stmt {
        StmtNode::Parameter(_) => return None,
        StmtNode::Action { verb, message } => Statement::Action {
            verb: *verb,
            message: message.clone(),
        },
        StmtNode::Shell {
            mode,
            command,
            capture_var,
        } => Statement::Shell {
            mode: *mode,
            command: command.clone(),
            capture_var: capture_var.clone(),
            stream_output: *mode != ShellMode::Capture,
        },
        StmtNode::Variable { op, name, value } => Statement::Variable {
            op: *op,
            name: name.clone(),
            value: value.clone(),
        },
        StmtNode::Conditional {
            condition,
            body,
            else_body,
        } => Statement::Conditional {
            condition: condition.clone(),
            body: lower_statements(body),
            else_body: lower_statements(else_body),
        },
        StmtNode::Loop {
            loop_var,
            iterable,
            filter,
            parallel,
            max_workers,
            fail_fast,
            body,
        } => Statement::Loop(LoopSpec {
            loop_var: loop_var.clone(),
            iterable: lower_iterable(iterable),
            filter: filter.as_ref().map(|f| Filter {
                variable: f.variable.clone(),
                op: f.op,
                value: f.value.clone(),
            }),
            parallel: *parallel,
            max_workers: *max_workers,
            fail_fast: *fail_fast,
            body: lower_statements(body),
        }),
        StmtNode::Try {
            try_body,
            catches,
            finally_body,
        } => Statement::Try {
            try_body: lower_statements(try_body),
            catches: catches
                .iter()
                .map(|c| CatchClause {
                    error_type: c.error_type.clone(),
                    error_var: c.error_var.clone(),
                    body: lower_statements(&c.body),
                })
                .collect(),
            finally_body: lower_statements(finally_body),
        },
        StmtNode::Throw { kind, message } => Statement::Throw {
            kind: *kind,
            message: message.clone(),
        },
        StmtNode::Break { condition } => Statement::Break {
            condition: condition.clone(),
        },
        StmtNode::Continue { condition } => Statement::Continue {
            condition: condition.clone(),
        },
        StmtNode::TaskCall { task, args } => Statement::TaskCall {
            task: task.clone(),
            args: args.clone(),
        },
        StmtNode::TaskFromTemplate {
            name,
            template,
            overrides,
        } => Statement::TaskFromTemplate {
            name: name.clone(),
            template: template.clone(),
            overrides: overrides.clone(),
        },
        StmtNode::Docker {
            operation,
            resource,
            name,
            options,
        } => Statement::Docker {
            operation: operation.clone(),
            resource: resource.clone(),
            name: name.clone(),
            options: options.clone(),
        },
        StmtNode::Git {
            operation,
            target,
            options,
        } => Statement::Git {
            operation: operation.clone(),
            target: target.clone(),
            options: options.clone(),
        },
        StmtNode::Http {
            method,
            url,
            headers,
            auth,
            body,
            timeout_secs,
            content_type,
            accept,
            capture_var,
        } => Statement::Http(HttpSpec {
            method: method.clone(),
            url: url.clone(),
            headers: headers.clone(),
            auth: auth.clone(),
            body: body.clone(),
            timeout_secs: *timeout_secs,
            content_type: content_type.clone(),
            accept: accept.clone(),
            capture_var: capture_var.clone(),
        }),
        StmtNode::Download {
            url,
            path,
            allow_overwrite,
            permissions,
            extract_to,
            remove_archive,
            headers,
            auth,
        } => Statement::Download(DownloadSpec {
            url: url.clone(),
            path: path.clone(),
            allow_overwrite: *allow_overwrite,
            permissions: permissions.clone(),
            extract_to: extract_to.clone(),
            remove_archive: *remove_archive,
            headers: headers.clone(),
            auth: auth.clone(),
        }),
        StmtNode::Network {
            action,
            target,
            port,
            timeout_secs,
            capture_var,
        } => Statement::Network {
            action: *action,
            target: target.clone(),
            port: *port,
            timeout_secs: *timeout_secs,
            capture_var: capture_var.clone(),
        },
        StmtNode::File {
            op,
            path,
            dest,
            content,
            capture_var,
        } => Statement::File {
            op: *op,
            path: path.clone(),
            dest: dest.clone(),
            content: content.clone(),
            capture_var: capture_var.clone(),
        },
        StmtNode::Detection(node) => Statement::Detection(lower_detection(node)),
        StmtNode::UseSnippet { name } => Statement::UseSnippet { name: name.clone() },
        StmtNode::Secret {
            op,
            key,
            value,
            capture_var,
        } => Statement::Secret {
            op: *op,
            key: key.clone(),
            value: value.clone(),
            capture_var: capture_var.clone(),
        },
    };
    Some(stmt)
}

fn lower_iterable(node: &IterableNode) -> Iterable {
    match node {
        IterableNode::Items(items) => Iterable::Items(items.clone()),
        IterableNode::Ref(name) => Iterable::Ref(name.clone()),
        IterableNode::Range { start, end, step } => Iterable::Range {
            start: start.clone(),
            end: end.clone(),
            step: step.clone(),
        },
        IterableNode::FileLines(path) => Iterable::FileLines(path.clone()),
        IterableNode::Matches { pattern, source } => Iterable::Matches {
            pattern: pattern.clone(),
            source: source.clone(),
        },
    }
}

fn lower_detection(node: &DetectionNode) -> Detection {
    match node {
        DetectionNode::Detect { tool, capture_var } => Detection::Detect {
            tool: tool.clone(),
            capture_var: capture_var.clone(),
        },
        DetectionNode::DetectAvailable {
            alternatives,
            capture_var,
        } => Detection::DetectAvailable {
            alternatives: alternatives.clone(),
            capture_var: capture_var.clone(),
        },
        DetectionNode::IfAvailable {
            tool,
            body,
            else_body,
        } => Detection::IfAvailable {
            tool: tool.clone(),
            body: lower_statements(body),
            else_body: lower_statements(else_body),
        },
        DetectionNode::IfVersion {
            tool,
            op,
            value,
            body,
            else_body,
        } => Detection::IfVersion {
            tool: tool.clone(),
            op: op.clone(),
            value: value.clone(),
            body: lower_statements(body),
            else_body: lower_statements(else_body),
        },
        DetectionNode::WhenEnvironment {
            environment,
            body,
            else_body,
        } => Detection::WhenEnvironment {
            environment: environment.clone(),
            body: lower_statements(body),
            else_body: lower_statements(else_body),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse;

    #[test]
    fn test_nested_parameter_statements_are_dropped() {
        let source = "version: 2.0\ntask \"t\":\n    when $x is \"y\":\n        requires nested\n        info \"kept\"\n";
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let task = lower_task(&program.tasks[0], None);
        match &task.body[0] {
            Statement::Conditional { body, .. } => {
                assert_eq!(body.len(), 1);
                assert!(matches!(body[0], Statement::Action { .. }));
            }
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn test_capture_does_not_stream() {
        let source =
            "version: 2.0\ntask \"t\":\n    run \"ls\"\n    capture \"ls\" as out\n";
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let task = lower_task(&program.tasks[0], Some("test.drv"));
        assert_eq!(task.source.as_deref(), Some("test.drv"));
        assert!(matches!(
            task.body[0],
            Statement::Shell {
                stream_output: true,
                ..
            }
        ));
        assert!(matches!(
            task.body[1],
            Statement::Shell {
                stream_output: false,
                ..
            }
        ));
    }

    #[test]
    fn test_project_lowering_merges_hooks() {
        let source = r#"version: 2.0
project "p":
    set registry to "ghcr.io"
    before any task:
        info "one"
    before any task:
        info "two"
    shell config for linux:
        executable "/bin/bash"

task "t":
    info "x"
"#;
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let project = lower_project(program.project.as_ref().unwrap());
        assert_eq!(project.setting("registry"), Some("ghcr.io"));
        assert_eq!(project.hooks.before_task.len(), 2);
        assert!(project.shell_for("linux").is_some());
    }
}
