//! Task parameter model.

use super::value::DataType;
use serde::{Deserialize, Serialize};

/// How a parameter was declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    /// Must be supplied by the caller.
    #[default]
    Requires,
    /// Optional with a default.
    Given,
    /// Optional, no default.
    Accepts,
}

/// A declared task parameter with its validation constraints.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub kind: ParamKind,
    pub data_type: DataType,
    pub default_value: Option<String>,
    /// Enum-of-values constraint; empty means unconstrained.
    pub constraints: Vec<String>,
    pub min_value: Option<f64>,
    pub max_value: Option<f64>,
    /// Custom regex constraint.
    pub pattern: Option<String>,
    /// Name of a predefined pattern macro (`semver`, `uuid`, …).
    pub pattern_macro: Option<String>,
    pub email_format: bool,
    pub variadic: bool,
}

impl Parameter {
    pub fn required(&self) -> bool {
        self.kind == ParamKind::Requires
    }

    pub fn has_default(&self) -> bool {
        self.default_value.is_some()
    }
}
