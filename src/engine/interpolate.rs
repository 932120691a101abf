//! Variable interpolation.
//!
//! Two surfaces: `{name}` braces substituted from the context (with
//! builtin function calls recognized inside the braces), and bare `$var`
//! references resolved by expression evaluation elsewhere. Strings
//! without either surface pass through untouched.

use super::context::ExecutionContext;
use super::error::EngineError;
use crate::capability::TimeSource;
use std::sync::Arc;

/// Brace interpolation engine. `strict` turns unknown names into errors;
/// otherwise the literal is retained.
#[derive(Clone)]
pub struct Interpolator {
    time: Arc<dyn TimeSource>,
    strict: bool,
}

impl Interpolator {
    pub fn new(time: Arc<dyn TimeSource>, strict: bool) -> Self {
        Self { time, strict }
    }

    /// Substitute every `{...}` occurrence in `input`.
    pub fn interpolate(
        &self,
        input: &str,
        ctx: &ExecutionContext,
    ) -> Result<String, EngineError> {
        if !input.contains('{') {
            return Ok(input.to_string());
        }
        let mut output = String::with_capacity(input.len());
        let mut rest = input;
        while let Some(open) = rest.find('{') {
            output.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let Some(close) = find_matching_brace(after) else {
                // Unbalanced braces pass through untouched.
                output.push_str(&rest[open..]);
                return Ok(output);
            };
            let expr = &after[..close];
            match self.resolve_expr(expr.trim(), ctx)? {
                Some(value) => output.push_str(&value),
                None if self.strict => {
                    return Err(EngineError::UnknownVariable {
                        name: expr.trim().to_string(),
                    });
                }
                None => {
                    output.push('{');
                    output.push_str(expr);
                    output.push('}');
                }
            }
            rest = &after[close + 1..];
        }
        output.push_str(rest);
        Ok(output)
    }

    /// Resolve one brace expression: a builtin call or a context name.
    fn resolve_expr(
        &self,
        expr: &str,
        ctx: &ExecutionContext,
    ) -> Result<Option<String>, EngineError> {
        if let Some((name, args)) = parse_call(expr) {
            return self.call_builtin(&name, &args, ctx).map(Some);
        }
        Ok(ctx.lookup(expr))
    }

    /// Builtin functions usable inside braces.
    pub fn call_builtin(
        &self,
        name: &str,
        args: &[String],
        ctx: &ExecutionContext,
    ) -> Result<String, EngineError> {
        let resolved: Vec<String> = args
            .iter()
            .map(|arg| self.resolve_arg(arg, ctx))
            .collect::<Result<_, _>>()?;
        let arg = |i: usize| resolved.get(i).cloned().unwrap_or_default();
        match name {
            "now" => {
                let layout = if resolved.is_empty() {
                    "2006-01-02 15:04:05".to_string()
                } else {
                    arg(0)
                };
                Ok(self
                    .time
                    .now()
                    .format(&go_layout_to_strftime(&layout))
                    .to_string())
            }
            "uppercase" => Ok(arg(0).to_uppercase()),
            "lowercase" => Ok(arg(0).to_lowercase()),
            "trim" => Ok(arg(0).trim().to_string()),
            "replace" => Ok(arg(0).replace(&arg(1), &arg(2))),
            "env" => Ok(std::env::var(arg(0)).unwrap_or_default()),
            "uuid" => Ok(uuid::Uuid::new_v4().to_string()),
            "hostname" => Ok(std::env::var("HOSTNAME").unwrap_or_else(|_| {
                std::process::Command::new("hostname")
                    .output()
                    .ok()
                    .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
                    .unwrap_or_default()
            })),
            "pwd" => Ok(std::env::current_dir()
                .map(|p| p.display().to_string())
                .unwrap_or_default()),
            other => Err(EngineError::user(format!("unknown function `{other}`"))),
        }
    }

    /// A call argument is a quoted literal or a context name.
    fn resolve_arg(&self, arg: &str, ctx: &ExecutionContext) -> Result<String, EngineError> {
        let arg = arg.trim();
        if let Some(literal) = strip_quotes(arg) {
            return Ok(literal.to_string());
        }
        if let Some(name) = arg.strip_prefix('$') {
            return self.require(name, ctx);
        }
        match ctx.lookup(arg) {
            Some(value) => Ok(value),
            None => Ok(arg.to_string()),
        }
    }

    fn require(&self, name: &str, ctx: &ExecutionContext) -> Result<String, EngineError> {
        match ctx.lookup(name) {
            Some(value) => Ok(value),
            None if self.strict => Err(EngineError::UnknownVariable {
                name: name.to_string(),
            }),
            None => Ok(String::new()),
        }
    }

    /// Resolve a `$ref`, honoring strict mode.
    pub fn resolve_ref(
        &self,
        name: &str,
        ctx: &ExecutionContext,
    ) -> Result<String, EngineError> {
        self.require(name, ctx)
    }
}

/// Index of the `}` closing the brace that `input` starts inside,
/// allowing one nesting level for quoted arguments.
fn find_matching_brace(input: &str) -> Option<usize> {
    let mut in_quote: Option<char> = None;
    for (i, c) in input.char_indices() {
        match (c, in_quote) {
            ('\'' | '"', None) => in_quote = Some(c),
            (q, Some(open)) if q == open => in_quote = None,
            ('}', None) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Parse `name(arg, arg)` into its parts; returns `None` for plain
/// names.
pub fn parse_call(expr: &str) -> Option<(String, Vec<String>)> {
    let open = expr.find('(')?;
    if !expr.ends_with(')') {
        return None;
    }
    let name = expr[..open].trim();
    if name.is_empty() || !name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return None;
    }
    let inner = &expr[open + 1..expr.len() - 1];
    let args = split_args(inner);
    Some((name.to_string(), args))
}

/// Split call arguments on commas outside quotes.
fn split_args(inner: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut in_quote: Option<char> = None;
    for c in inner.chars() {
        match (c, in_quote) {
            ('\'' | '"', None) => {
                in_quote = Some(c);
                current.push(c);
            }
            (q, Some(open)) if q == open => {
                in_quote = None;
                current.push(c);
            }
            (',', None) => {
                args.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(c),
        }
    }
    if !current.trim().is_empty() {
        args.push(current.trim().to_string());
    }
    args
}

fn strip_quotes(s: &str) -> Option<&str> {
    for quote in ['\'', '"'] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return Some(&s[1..s.len() - 1]);
        }
    }
    None
}

/// Translate a Go reference-time layout (`2006-01-02 15:04:05`) into a
/// chrono strftime string. Unknown text passes through literally.
pub fn go_layout_to_strftime(layout: &str) -> String {
    const TOKENS: &[(&str, &str)] = &[
        ("January", "%B"),
        ("Monday", "%A"),
        ("-07:00", "%:z"),
        ("-0700", "%z"),
        ("2006", "%Y"),
        ("Jan", "%b"),
        ("Mon", "%a"),
        ("MST", "%Z"),
        ("15", "%H"),
        ("01", "%m"),
        ("02", "%d"),
        ("03", "%I"),
        ("04", "%M"),
        ("05", "%S"),
        ("06", "%y"),
        ("PM", "%p"),
        ("pm", "%P"),
    ];
    let mut output = String::with_capacity(layout.len());
    let mut rest = layout;
    'outer: while !rest.is_empty() {
        for (token, spec) in TOKENS {
            if let Some(tail) = rest.strip_prefix(token) {
                output.push_str(spec);
                rest = tail;
                continue 'outer;
            }
        }
        let Some(c) = rest.chars().next() else {
            break;
        };
        if c == '%' {
            output.push_str("%%");
        } else {
            output.push(c);
        }
        rest = &rest[c.len_utf8()..];
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::testing::FixedTime;
    use crate::model::{DataType, Project, Value};
    use std::collections::HashMap;

    fn context() -> ExecutionContext {
        let mut project = Project::default();
        project
            .settings
            .insert("registry".into(), "ghcr.io/acme".into());
        let mut params = HashMap::new();
        params.insert("env".to_string(), Value::from_raw("prod", DataType::String));
        let mut ctx = ExecutionContext::new("deploy", params, Arc::new(project));
        ctx.set_var("tag", "v1.2.3");
        ctx
    }

    fn interp(strict: bool) -> Interpolator {
        Interpolator::new(Arc::new(FixedTime::default()), strict)
    }

    #[test]
    fn test_identity_without_tokens() {
        let ctx = context();
        let input = "plain text, no substitution here";
        assert_eq!(interp(false).interpolate(input, &ctx).unwrap(), input);
    }

    #[test]
    fn test_substitution() {
        let ctx = context();
        let out = interp(false)
            .interpolate("deploy {tag} to {env} at {registry}", &ctx)
            .unwrap();
        assert_eq!(out, "deploy v1.2.3 to prod at ghcr.io/acme");
    }

    #[test]
    fn test_unknown_name_lenient_vs_strict() {
        let ctx = context();
        assert_eq!(
            interp(false).interpolate("keep {missing}", &ctx).unwrap(),
            "keep {missing}"
        );
        assert!(matches!(
            interp(true).interpolate("keep {missing}", &ctx),
            Err(EngineError::UnknownVariable { .. })
        ));
    }

    #[test]
    fn test_builtin_now_with_go_layout() {
        let ctx = context();
        // FixedTime pins 2024-05-04 12:30:45.
        let out = interp(false).interpolate("{now('2006')}", &ctx).unwrap();
        assert_eq!(out, "2024");
        let out = interp(false)
            .interpolate("{now('2006-01-02')}", &ctx)
            .unwrap();
        assert_eq!(out, "2024-05-04");
        let out = interp(false)
            .interpolate("{now('15:04:05')}", &ctx)
            .unwrap();
        assert_eq!(out, "12:30:45");
    }

    #[test]
    fn test_builtin_string_functions() {
        let ctx = context();
        let it = interp(false);
        assert_eq!(it.interpolate("{uppercase(env)}", &ctx).unwrap(), "PROD");
        assert_eq!(
            it.interpolate("{replace(tag, '.', '-')}", &ctx).unwrap(),
            "v1-2-3"
        );
        assert_eq!(it.interpolate("{trim('  x  ')}", &ctx).unwrap(), "x");
        assert_eq!(
            it.interpolate("{lowercase('LOUD')}", &ctx).unwrap(),
            "loud"
        );
    }

    #[test]
    fn test_unknown_function_is_error() {
        let ctx = context();
        assert!(interp(false).interpolate("{frobnicate(env)}", &ctx).is_err());
    }

    #[test]
    fn test_uuid_builtin_shape() {
        let ctx = context();
        let out = interp(false).interpolate("{uuid()}", &ctx).unwrap();
        assert_eq!(out.len(), 36);
        assert_eq!(out.matches('-').count(), 4);
    }

    #[test]
    fn test_unbalanced_braces_pass_through() {
        let ctx = context();
        assert_eq!(
            interp(false).interpolate("brace { open", &ctx).unwrap(),
            "brace { open"
        );
    }

    #[test]
    fn test_go_layout_translation() {
        assert_eq!(go_layout_to_strftime("2006-01-02"), "%Y-%m-%d");
        assert_eq!(go_layout_to_strftime("15:04:05"), "%H:%M:%S");
        assert_eq!(go_layout_to_strftime("Jan 2006"), "%b %Y");
        assert_eq!(go_layout_to_strftime("plain"), "plain");
    }
}
