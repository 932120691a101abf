//! Configuration discovery.
//!
//! An optional `drover.toml` next to the runfile supplies defaults that
//! CLI flags override:
//!
//! ```toml
//! runfile = "ci/tasks.drv"
//!
//! [engine]
//! strict_interpolation = true
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "drover.toml";
pub const DEFAULT_RUNFILE: &str = "tasks.drv";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    /// Runfile path, relative to the config file.
    pub runfile: Option<PathBuf>,
    #[serde(default)]
    pub engine: EngineSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EngineSection {
    #[serde(default)]
    pub strict_interpolation: bool,
}

impl FileConfig {
    /// Read `drover.toml` from the working directory, if present.
    /// A malformed file is an error; a missing one is the default.
    pub fn discover() -> Result<Self, String> {
        Self::discover_in(Path::new("."))
    }

    pub fn discover_in(dir: &Path) -> Result<Self, String> {
        let path = dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        debug!(path = %path.display(), "loading config");
        let content = std::fs::read_to_string(&path)
            .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("invalid {}: {e}", path.display()))
    }

    /// Resolve the runfile path: CLI flag, then config, then default.
    pub fn resolve_runfile(&self, cli_override: Option<PathBuf>) -> PathBuf {
        cli_override
            .or_else(|| self.runfile.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RUNFILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = FileConfig::discover_in(dir.path()).unwrap();
        assert!(config.runfile.is_none());
        assert!(!config.engine.strict_interpolation);
    }

    #[test]
    fn test_config_parsing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join(CONFIG_FILE),
            "runfile = \"ci/tasks.drv\"\n\n[engine]\nstrict_interpolation = true\n",
        )
        .unwrap();
        let config = FileConfig::discover_in(dir.path()).unwrap();
        assert_eq!(config.runfile.as_deref(), Some(Path::new("ci/tasks.drv")));
        assert!(config.engine.strict_interpolation);
    }

    #[test]
    fn test_malformed_config_is_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONFIG_FILE), "runfile = [nonsense").unwrap();
        assert!(FileConfig::discover_in(dir.path()).is_err());
    }

    #[test]
    fn test_runfile_resolution_order() {
        let config = FileConfig {
            runfile: Some(PathBuf::from("from-config.drv")),
            ..FileConfig::default()
        };
        assert_eq!(
            config.resolve_runfile(Some(PathBuf::from("from-cli.drv"))),
            PathBuf::from("from-cli.drv")
        );
        assert_eq!(
            config.resolve_runfile(None),
            PathBuf::from("from-config.drv")
        );
        assert_eq!(
            FileConfig::default().resolve_runfile(None),
            PathBuf::from(DEFAULT_RUNFILE)
        );
    }
}
