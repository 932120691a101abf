//! Variable value expressions and operation pipelines.
//!
//! A value expression is a base (literal, `{braces}`, `$ref`, or builtin
//! call) optionally followed by `|`-chained operations: `"{files}|
//! filtered by extension .md|sorted by name|first"`. Stages run left to
//! right; each consumes the previous stage's scalar or whitespace-split
//! list and produces the next.

use super::context::ExecutionContext;
use super::error::EngineError;
use super::interpolate::{Interpolator, parse_call};
use crate::model::split_list;
use std::path::Path;

/// One pipeline stage.
#[derive(Debug, Clone, PartialEq)]
enum Stage {
    WithoutPrefix(String),
    WithoutSuffix(String),
    FilteredByExtension(String),
    SortedByName,
    Reversed,
    Unique,
    First,
    Last,
    Basename,
    Dirname,
    Extension,
}

/// Scalar/list value flowing through the pipeline.
enum Flowing {
    Scalar(String),
    List(Vec<String>),
}

impl Flowing {
    fn into_list(self) -> Vec<String> {
        match self {
            Flowing::List(items) => items,
            Flowing::Scalar(s) => split_list(&s),
        }
    }

    fn into_scalar(self) -> String {
        match self {
            Flowing::Scalar(s) => s,
            Flowing::List(items) => items.join(" "),
        }
    }
}

/// Evaluate a `let`/`set` value expression.
pub fn evaluate_expr(
    expr: &str,
    ctx: &ExecutionContext,
    interpolator: &Interpolator,
) -> Result<String, EngineError> {
    let segments = split_pipeline(expr);
    let (base, stages) = segments.split_first().expect("split_pipeline is non-empty");
    let base = resolve_base(base, ctx, interpolator)?;
    apply_stages(base, stages, ctx, interpolator)
}

/// Evaluate a `transform` expression: when every segment parses as an
/// operation, the variable's current value is the base; otherwise the
/// expression evaluates like `set`.
pub fn evaluate_transform(
    current: &str,
    expr: &str,
    ctx: &ExecutionContext,
    interpolator: &Interpolator,
) -> Result<String, EngineError> {
    let segments = split_pipeline(expr);
    let all_ops = segments.iter().all(|s| parse_stage(s).is_some());
    if all_ops {
        return apply_stages(current.to_string(), &segments, ctx, interpolator);
    }
    evaluate_expr(expr, ctx, interpolator)
}

fn apply_stages(
    base: String,
    stages: &[String],
    ctx: &ExecutionContext,
    interpolator: &Interpolator,
) -> Result<String, EngineError> {
    let mut flowing = Flowing::Scalar(base);
    for raw in stages {
        let raw = interpolator.interpolate(raw.trim(), ctx)?;
        let stage = parse_stage(&raw)
            .ok_or_else(|| EngineError::user(format!("unknown operation `{raw}`")))?;
        flowing = apply_stage(flowing, &stage);
    }
    Ok(flowing.into_scalar())
}

fn apply_stage(flowing: Flowing, stage: &Stage) -> Flowing {
    match stage {
        Stage::WithoutPrefix(prefix) => map_items(flowing, |item| {
            item.strip_prefix(prefix.as_str())
                .unwrap_or(item.as_str())
                .to_string()
        }),
        Stage::WithoutSuffix(suffix) => map_items(flowing, |item| {
            item.strip_suffix(suffix.as_str())
                .unwrap_or(item.as_str())
                .to_string()
        }),
        Stage::FilteredByExtension(ext) => {
            let wanted = ext.trim_start_matches('.');
            let items = flowing
                .into_list()
                .into_iter()
                .filter(|item| {
                    Path::new(item)
                        .extension()
                        .is_some_and(|e| e.to_string_lossy() == wanted)
                })
                .collect();
            Flowing::List(items)
        }
        Stage::SortedByName => {
            let mut items = flowing.into_list();
            items.sort();
            Flowing::List(items)
        }
        Stage::Reversed => {
            let mut items = flowing.into_list();
            items.reverse();
            Flowing::List(items)
        }
        Stage::Unique => {
            let mut seen = Vec::new();
            for item in flowing.into_list() {
                if !seen.contains(&item) {
                    seen.push(item);
                }
            }
            Flowing::List(seen)
        }
        Stage::First => Flowing::Scalar(flowing.into_list().into_iter().next().unwrap_or_default()),
        Stage::Last => Flowing::Scalar(flowing.into_list().into_iter().next_back().unwrap_or_default()),
        Stage::Basename => map_items(flowing, |item| {
            Path::new(&item)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or(item)
        }),
        Stage::Dirname => map_items(flowing, |item| {
            Path::new(&item)
                .parent()
                .map(|p| p.to_string_lossy().into_owned())
                .unwrap_or_default()
        }),
        Stage::Extension => map_items(flowing, |item| {
            Path::new(&item)
                .extension()
                .map(|e| e.to_string_lossy().into_owned())
                .unwrap_or_default()
        }),
    }
}

fn map_items(flowing: Flowing, f: impl Fn(String) -> String) -> Flowing {
    match flowing {
        Flowing::Scalar(s) => Flowing::Scalar(f(s)),
        Flowing::List(items) => Flowing::List(items.into_iter().map(f).collect()),
    }
}

fn parse_stage(raw: &str) -> Option<Stage> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    match words.as_slice() {
        ["without", "prefix", rest @ ..] if !rest.is_empty() => {
            Some(Stage::WithoutPrefix(rest.join(" ")))
        }
        ["without", "suffix", rest @ ..] if !rest.is_empty() => {
            Some(Stage::WithoutSuffix(rest.join(" ")))
        }
        ["filtered", "by", "extension", ext] => Some(Stage::FilteredByExtension(ext.to_string())),
        ["sorted", "by", "name"] => Some(Stage::SortedByName),
        ["sorted"] => Some(Stage::SortedByName),
        ["reversed"] => Some(Stage::Reversed),
        ["unique"] => Some(Stage::Unique),
        ["first"] => Some(Stage::First),
        ["last"] => Some(Stage::Last),
        ["basename"] => Some(Stage::Basename),
        ["dirname"] => Some(Stage::Dirname),
        ["extension"] => Some(Stage::Extension),
        _ => None,
    }
}

/// Resolve the base segment of an expression.
fn resolve_base(
    base: &str,
    ctx: &ExecutionContext,
    interpolator: &Interpolator,
) -> Result<String, EngineError> {
    let base = base.trim();
    if let Some(name) = base.strip_prefix('$') {
        return interpolator.resolve_ref(name, ctx);
    }
    if let Some((name, args)) = parse_call(base) {
        return interpolator.call_builtin(&name, &args, ctx);
    }
    interpolator.interpolate(base, ctx)
}

/// Split an expression on `|` outside quotes and braces. Always returns
/// at least one segment.
fn split_pipeline(expr: &str) -> Vec<String> {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut in_quote: Option<char> = None;
    for c in expr.chars() {
        match (c, in_quote) {
            ('\'' | '"', None) => {
                in_quote = Some(c);
                current.push(c);
            }
            (q, Some(open)) if q == open => {
                in_quote = None;
                current.push(c);
            }
            ('{', None) => {
                depth += 1;
                current.push(c);
            }
            ('}', None) => {
                depth = depth.saturating_sub(1);
                current.push(c);
            }
            ('|', None) if depth == 0 => {
                segments.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    segments.push(current.trim().to_string());
    segments
}
