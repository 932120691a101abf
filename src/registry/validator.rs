//! Parameter validation and binding.
//!
//! Validation runs the constraint dimensions in a fixed order: data
//! type, enum constraint, numeric range, custom pattern, pattern macro,
//! email format. The first failing dimension is reported.

use crate::model::{DataType, ParamKind, Parameter, Task, Value};
use regex::Regex;
use std::collections::HashMap;
use std::sync::LazyLock;
use thiserror::Error;

/// A parameter constraint failure.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("missing required parameter `{parameter}` for task `{task}`")]
    MissingRequired { task: String, parameter: String },
    #[error("unknown parameter `{parameter}` for task `{task}`")]
    UnknownParameter { task: String, parameter: String },
    #[error("parameter `{parameter}`: {message} (got `{value}`)")]
    Constraint {
        parameter: String,
        message: String,
        value: String,
    },
}

/// Predefined pattern macros usable with `matching <name>`.
static PATTERN_MACROS: LazyLock<HashMap<&'static str, Regex>> = LazyLock::new(|| {
    let mut macros = HashMap::new();
    let mut add = |name: &'static str, pattern: &str| {
        macros.insert(name, Regex::new(pattern).expect("builtin macro regex"));
    };
    add("semver", r"^v\d+\.\d+\.\d+$");
    add(
        "semver_extended",
        r"^v\d+\.\d+\.\d+(-[A-Za-z0-9]+(\.[A-Za-z0-9]+)*)?(\+[A-Za-z0-9]+(\.[A-Za-z0-9]+)*)?$",
    );
    add(
        "uuid",
        r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$",
    );
    add(
        "ipv4",
        r"^((25[0-5]|2[0-4]\d|[01]?\d\d?)\.){3}(25[0-5]|2[0-4]\d|[01]?\d\d?)$",
    );
    add("slug", r"^[a-z0-9]+(?:-[a-z0-9]+)*$");
    add("docker_tag", r"^[A-Za-z0-9][A-Za-z0-9._-]*$");
    add("git_branch", r"^[A-Za-z0-9][A-Za-z0-9._/-]*[A-Za-z0-9]$");
    add("url", r"https?://[^\s/$.?#].[^\s]*");
    macros
});

static EMAIL_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex"));

/// Validate one value against one parameter's constraints.
pub fn validate_value(param: &Parameter, value: &Value) -> Result<(), ValidationError> {
    let constraint = |message: String| ValidationError::Constraint {
        parameter: param.name.clone(),
        message,
        value: value.raw.clone(),
    };

    // 1. Data type.
    match param.data_type {
        DataType::List => {
            if value.data_type != DataType::List {
                return Err(constraint("expected a list value".to_string()));
            }
        }
        DataType::Number => {
            if value.as_number().is_none() {
                return Err(constraint("expected a number".to_string()));
            }
        }
        DataType::Boolean => {
            if crate::model::parse_boolean(&value.raw).is_none() {
                return Err(constraint(
                    "expected a boolean (true/false/yes/no/1/0/on/off/enabled/disabled)"
                        .to_string(),
                ));
            }
        }
        DataType::String => {}
    }

    // 2. Enum constraint.
    if !param.constraints.is_empty() {
        let allowed = param.constraints.join(", ");
        if value.data_type == DataType::List {
            for item in value.as_list() {
                if !param.constraints.contains(&item) {
                    return Err(constraint(format!(
                        "item `{item}` is not one of the allowed values [{allowed}]"
                    )));
                }
            }
        } else if !param.constraints.contains(&value.as_string()) {
            return Err(constraint(format!(
                "must be one of the allowed values [{allowed}]"
            )));
        }
    }

    // 3. Numeric range.
    if param.min_value.is_some() || param.max_value.is_some() {
        let number = value
            .as_number()
            .ok_or_else(|| constraint("expected a number for range check".to_string()))?;
        if let Some(min) = param.min_value {
            if number < min {
                return Err(constraint(format!("must be at least {min}")));
            }
        }
        if let Some(max) = param.max_value {
            if number > max {
                return Err(constraint(format!("must be at most {max}")));
            }
        }
    }

    // 4. Custom pattern.
    if let Some(pattern) = &param.pattern {
        let regex = Regex::new(pattern)
            .map_err(|e| constraint(format!("invalid pattern `{pattern}`: {e}")))?;
        if !regex.is_match(&value.as_string()) {
            return Err(constraint(format!("does not match pattern `{pattern}`")));
        }
    }

    // 5. Pattern macro.
    if let Some(name) = &param.pattern_macro {
        let regex = PATTERN_MACROS
            .get(name.as_str())
            .ok_or_else(|| constraint(format!("unknown pattern macro `{name}`")))?;
        if !regex.is_match(&value.as_string()) {
            return Err(constraint(format!("does not match {name} format")));
        }
    }

    // 6. Email format.
    if param.email_format && !EMAIL_REGEX.is_match(&value.as_string()) {
        return Err(constraint("is not a valid email address".to_string()));
    }

    Ok(())
}

/// Bind provided arguments against a task's declared parameters,
/// applying defaults and validating every value. The first validation
/// failure aborts binding.
pub fn bind_parameters(
    task: &Task,
    provided: &HashMap<String, String>,
) -> Result<HashMap<String, Value>, ValidationError> {
    bind_parameter_list(&task.full_name(), &task.parameters, provided)
}

/// Binding over a bare parameter list; used by the engine for plan nodes
/// that carry parameters without the full task.
pub fn bind_parameter_list(
    task_name: &str,
    parameters: &[Parameter],
    provided: &HashMap<String, String>,
) -> Result<HashMap<String, Value>, ValidationError> {
    for name in provided.keys() {
        if !parameters.iter().any(|p| &p.name == name) {
            return Err(ValidationError::UnknownParameter {
                task: task_name.to_string(),
                parameter: name.clone(),
            });
        }
    }

    let mut bound = HashMap::new();
    for param in parameters {
        let raw = match provided.get(&param.name) {
            Some(raw) => Some(raw.clone()),
            None => param.default_value.clone(),
        };
        let raw = match raw {
            Some(raw) => raw,
            None if param.kind == ParamKind::Requires => {
                return Err(ValidationError::MissingRequired {
                    task: task_name.to_string(),
                    parameter: param.name.clone(),
                });
            }
            // `accepts` parameters without a value stay unbound.
            None => continue,
        };
        let value = Value::from_raw(raw, param.data_type);
        validate_value(param, &value)?;
        bound.insert(param.name.clone(), value);
    }
    Ok(bound)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(name: &str) -> Parameter {
        Parameter {
            name: name.into(),
            ..Parameter::default()
        }
    }

    fn check(param: &Parameter, raw: &str) -> Result<(), ValidationError> {
        validate_value(param, &Value::from_raw(raw, param.data_type))
    }

    #[test]
    fn test_enum_constraint() {
        let mut p = param("env");
        p.constraints = vec!["dev".into(), "prod".into()];
        assert!(check(&p, "dev").is_ok());
        let err = check(&p, "staging").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("env"));
        assert!(msg.contains("dev"));
        assert!(msg.contains("prod"));
        assert!(msg.contains("staging"));
    }

    #[test]
    fn test_list_values_checked_per_item() {
        let mut p = param("targets");
        p.data_type = DataType::List;
        p.constraints = vec!["us".into(), "eu".into()];
        assert!(check(&p, "[us, eu]").is_ok());
        assert!(check(&p, "[us, mars]").is_err());
    }

    #[test]
    fn test_numeric_range() {
        let mut p = param("replicas");
        p.data_type = DataType::Number;
        p.min_value = Some(1.0);
        p.max_value = Some(10.0);
        assert!(check(&p, "5").is_ok());
        assert!(check(&p, "0").is_err());
        assert!(check(&p, "11").is_err());
        assert!(check(&p, "many").is_err());
    }

    #[test]
    fn test_boolean_spellings_accepted() {
        let mut p = param("flag");
        p.data_type = DataType::Boolean;
        for ok in ["true", "false", "yes", "no", "1", "0", "on", "off", "enabled", "disabled"] {
            assert!(check(&p, ok).is_ok(), "{ok}");
        }
        assert!(check(&p, "maybe").is_err());
    }

    #[test]
    fn test_pattern_macros() {
        let cases = [
            ("semver", "v1.2.3", "1.2.3"),
            ("semver_extended", "v1.2.3-rc.1+build.5", "v1.2.3-"),
            ("uuid", "123e4567-e89b-12d3-a456-426614174000", "nope"),
            ("ipv4", "192.168.0.1", "999.1.1.1"),
            ("slug", "my-task-name", "My Task"),
            ("docker_tag", "app_v1.2", "-leading"),
            ("git_branch", "feature/login", "-bad-"),
            ("url", "https://example.com/path", "not a url"),
        ];
        for (macro_name, good, bad) in cases {
            let mut p = param("x");
            p.pattern_macro = Some(macro_name.into());
            assert!(check(&p, good).is_ok(), "{macro_name} should accept {good}");
            assert!(check(&p, bad).is_err(), "{macro_name} should reject {bad}");
        }
    }

    #[test]
    fn test_email_format() {
        let mut p = param("contact");
        p.email_format = true;
        assert!(check(&p, "ops@example.com").is_ok());
        assert!(check(&p, "nope").is_err());
        assert!(check(&p, "a b@example.com").is_err());
    }

    #[test]
    fn test_custom_pattern() {
        let mut p = param("build_id");
        p.pattern = Some("^[a-z0-9-]+$".into());
        assert!(check(&p, "abc-123").is_ok());
        assert!(check(&p, "ABC").is_err());
    }

    #[test]
    fn test_composition_all_dimensions_pass() {
        let mut p = param("port");
        p.data_type = DataType::Number;
        p.constraints = vec!["8080".into(), "9090".into()];
        p.min_value = Some(1024.0);
        p.max_value = Some(65535.0);
        assert!(check(&p, "8080").is_ok());
    }

    #[test]
    fn test_bind_parameters() {
        use crate::model::ParamKind;
        let task = Task {
            name: "deploy".into(),
            parameters: vec![
                Parameter {
                    name: "env".into(),
                    kind: ParamKind::Requires,
                    constraints: vec!["dev".into(), "prod".into()],
                    ..Parameter::default()
                },
                Parameter {
                    name: "tag".into(),
                    kind: ParamKind::Given,
                    default_value: Some("latest".into()),
                    ..Parameter::default()
                },
                Parameter {
                    name: "flags".into(),
                    kind: ParamKind::Accepts,
                    ..Parameter::default()
                },
            ],
            ..Task::default()
        };

        let mut provided = HashMap::new();
        provided.insert("env".to_string(), "dev".to_string());
        let bound = bind_parameters(&task, &provided).unwrap();
        assert_eq!(bound["env"].as_string(), "dev");
        assert_eq!(bound["tag"].as_string(), "latest");
        assert!(!bound.contains_key("flags"));

        // Missing required parameter.
        assert!(matches!(
            bind_parameters(&task, &HashMap::new()),
            Err(ValidationError::MissingRequired { .. })
        ));

        // Unknown parameter.
        let mut bad = HashMap::new();
        bad.insert("env".to_string(), "dev".to_string());
        bad.insert("bogus".to_string(), "x".to_string());
        assert!(matches!(
            bind_parameters(&task, &bad),
            Err(ValidationError::UnknownParameter { .. })
        ));

        // Constraint failure aborts binding.
        let mut invalid = HashMap::new();
        invalid.insert("env".to_string(), "staging".to_string());
        assert!(matches!(
            bind_parameters(&task, &invalid),
            Err(ValidationError::Constraint { .. })
        ));
    }
}
