//! Project-level configuration: settings, shell overrides, hooks,
//! snippets, and templates.

use super::statement::Statement;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Per-platform shell override from `shell config for <platform>:`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfig {
    pub executable: Option<String>,
    pub args: Vec<String>,
    pub environment: HashMap<String, String>,
}

/// The four lifecycle hook slots.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Hooks {
    pub setup: Vec<Statement>,
    pub teardown: Vec<Statement>,
    pub before_task: Vec<Statement>,
    pub after_task: Vec<Statement>,
}

/// Immutable global scope shared by every task in a run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Project {
    pub name: String,
    pub version: Option<String>,
    pub settings: HashMap<String, String>,
    pub shell_configs: HashMap<String, ShellConfig>,
    pub hooks: Hooks,
    pub snippets: HashMap<String, Vec<Statement>>,
    pub templates: HashMap<String, Vec<Statement>>,
}

impl Project {
    pub fn setting(&self, key: &str) -> Option<&str> {
        self.settings.get(key).map(String::as_str)
    }

    /// Shell override for the current platform, if declared.
    pub fn shell_for(&self, platform: &str) -> Option<&ShellConfig> {
        self.shell_configs.get(platform)
    }
}
