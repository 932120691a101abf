//! Condition evaluation.
//!
//! Conditions are raw source fragments (`$env is "prod"`, `{replicas} >
//! 4`, `$flags`). Operands interpolate first; comparison is numeric when
//! both sides parse as numbers, string otherwise. A condition without an
//! operator is truthy when its interpolated text is non-empty and not a
//! false spelling.

use super::context::ExecutionContext;
use super::error::EngineError;
use super::interpolate::Interpolator;
use crate::model::parse_boolean;

/// Evaluate a condition string against the context.
pub fn evaluate(
    condition: &str,
    ctx: &ExecutionContext,
    interpolator: &Interpolator,
) -> Result<bool, EngineError> {
    let condition = condition.trim();

    if let Some((left, right)) = split_operator(condition, " is not ") {
        return Ok(operand(&left, ctx, interpolator)? != operand(&right, ctx, interpolator)?);
    }
    if let Some((left, right)) = split_operator(condition, " is ") {
        return Ok(operand(&left, ctx, interpolator)? == operand(&right, ctx, interpolator)?);
    }
    for op in ["==", "!=", "<=", ">=", "<", ">"] {
        if let Some((left, right)) = split_operator(condition, op) {
            let left = operand(&left, ctx, interpolator)?;
            let right = operand(&right, ctx, interpolator)?;
            return Ok(compare(&left, &right, op));
        }
    }

    // Free-form truthiness.
    let resolved = operand(condition, ctx, interpolator)?;
    Ok(truthy(&resolved))
}

/// Non-empty and not a false spelling.
pub fn truthy(value: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return false;
    }
    parse_boolean(trimmed).unwrap_or(true)
}

/// Split on the first occurrence of `op` outside quotes.
fn split_operator(condition: &str, op: &str) -> Option<(String, String)> {
    let mut in_quote: Option<char> = None;
    for (i, c) in condition.char_indices() {
        match (c, in_quote) {
            ('"' | '\'', None) => in_quote = Some(c),
            (q, Some(open)) if q == open => in_quote = None,
            _ if in_quote.is_none() && condition[i..].starts_with(op) => {
                let left = condition[..i].trim().to_string();
                let right = condition[i + op.len()..].trim().to_string();
                if left.is_empty() || right.is_empty() {
                    return None;
                }
                return Some((left, right));
            }
            _ => {}
        }
    }
    None
}

/// Resolve one operand: quoted literal, `$ref`, or interpolated text.
fn operand(
    raw: &str,
    ctx: &ExecutionContext,
    interpolator: &Interpolator,
) -> Result<String, EngineError> {
    let raw = raw.trim();
    if raw.len() >= 2 {
        for quote in ['"', '\''] {
            if raw.starts_with(quote) && raw.ends_with(quote) {
                return interpolator.interpolate(&raw[1..raw.len() - 1], ctx);
            }
        }
    }
    if let Some(name) = raw.strip_prefix('$') {
        return interpolator.resolve_ref(name, ctx);
    }
    let interpolated = interpolator.interpolate(raw, ctx)?;
    // A bare word that names a variable or parameter compares by value.
    if !interpolated.contains(char::is_whitespace) {
        if let Some(value) = ctx.lookup(&interpolated) {
            return Ok(value);
        }
    }
    Ok(interpolated)
}

fn compare(left: &str, right: &str, op: &str) -> bool {
    if let (Ok(l), Ok(r)) = (left.trim().parse::<f64>(), right.trim().parse::<f64>()) {
        return match op {
            "==" => l == r,
            "!=" => l != r,
            "<" => l < r,
            "<=" => l <= r,
            ">" => l > r,
            ">=" => l >= r,
            _ => false,
        };
    }
    match op {
        "==" => left == right,
        "!=" => left != right,
        "<" => left < right,
        "<=" => left <= right,
        ">" => left > right,
        ">=" => left >= right,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::testing::FixedTime;
    use crate::model::{DataType, Project, Value};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn setup() -> (ExecutionContext, Interpolator) {
        let mut params = HashMap::new();
        params.insert("env".to_string(), Value::from_raw("prod", DataType::String));
        params.insert("replicas".to_string(), Value::from_raw("5", DataType::Number));
        let mut ctx = ExecutionContext::new("t", params, Arc::new(Project::default()));
        ctx.set_var("flag", "true");
        ctx.set_var("empty", "");
        let interp = Interpolator::new(Arc::new(FixedTime::default()), false);
        (ctx, interp)
    }

    fn eval(condition: &str) -> bool {
        let (ctx, interp) = setup();
        evaluate(condition, &ctx, &interp).unwrap()
    }

    #[test]
    fn test_is_comparison() {
        assert!(eval("$env is \"prod\""));
        assert!(!eval("$env is \"dev\""));
        assert!(eval("$env is not \"dev\""));
        assert!(eval("env is \"prod\""));
    }

    #[test]
    fn test_numeric_comparison() {
        assert!(eval("{replicas} > 4"));
        assert!(eval("{replicas} <= 5"));
        assert!(!eval("{replicas} == 6"));
        assert!(eval("$replicas != 6"));
        // Numeric, not lexicographic: 10 > 9.
        assert!(eval("10 > 9"));
    }

    #[test]
    fn test_string_comparison() {
        assert!(eval("\"abc\" < \"abd\""));
        assert!(eval("$env == \"prod\""));
    }

    #[test]
    fn test_truthiness() {
        assert!(eval("$flag"));
        assert!(!eval("$empty"));
        assert!(!eval("\"false\""));
        assert!(!eval("\"off\""));
        assert!(eval("\"anything\""));
    }

    #[test]
    fn test_operator_inside_quotes_is_literal() {
        // The `<` inside the quoted operand must not split the condition.
        assert!(eval("\"a<b\" is \"a<b\""));
    }
}
