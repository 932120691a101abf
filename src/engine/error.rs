//! Engine error taxonomy.
//!
//! Runtime failures bubble until a matching `catch` clause handles them
//! or they reach the task boundary. Classification strings drive catch
//! matching: a `catch <type>` clause matches when its type equals the
//! error's classification or appears as a substring of the lowercased
//! message.

use crate::capability::CapabilityError;
use crate::registry::{RegistryError, ResolveError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Capability(#[from] CapabilityError),

    /// Raised by `throw` and `fail`.
    #[error("{message}")]
    User { message: String },

    #[error("unknown variable `{name}`")]
    UnknownVariable { name: String },

    #[error("unknown snippet `{name}`")]
    UnknownSnippet { name: String },

    #[error("unknown template `{name}`")]
    UnknownTemplate { name: String },

    #[error("`rethrow` outside a catch clause")]
    RethrowOutsideCatch,

    #[error("invalid range: {message}")]
    InvalidRange { message: String },

    #[error("invalid regex `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("run cancelled")]
    Cancelled,

    #[error("loop completed with {count} errors")]
    LoopErrors { count: usize },

    /// A statement failed; names the statement kind for diagnostics.
    #[error("{kind} statement failed: {source}")]
    Statement {
        kind: &'static str,
        #[source]
        source: Box<EngineError>,
    },

    /// A task failed; the outermost wrapper shown to users.
    #[error("task `{task}` failed: {source}")]
    TaskFailed {
        task: String,
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    pub fn user(message: impl Into<String>) -> Self {
        EngineError::User {
            message: message.into(),
        }
    }

    /// Attach the statement kind, unless the error already carries one.
    pub fn in_statement(self, kind: &'static str) -> Self {
        match self {
            EngineError::Statement { .. } | EngineError::TaskFailed { .. } => self,
            other => EngineError::Statement {
                kind,
                source: Box::new(other),
            },
        }
    }

    pub fn in_task(self, task: &str) -> Self {
        match self {
            EngineError::TaskFailed { .. } => self,
            other => EngineError::TaskFailed {
                task: task.to_string(),
                source: Box::new(other),
            },
        }
    }

    /// Classification for catch matching and exit reporting.
    pub fn classification(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Registry(_) => "semantic",
            EngineError::Resolve(_) => "dependency",
            EngineError::Capability(e) => e.classification(),
            EngineError::User { .. } => "user",
            EngineError::UnknownVariable { .. } => "validation",
            EngineError::UnknownSnippet { .. } | EngineError::UnknownTemplate { .. } => "semantic",
            EngineError::RethrowOutsideCatch => "user",
            EngineError::InvalidRange { .. } | EngineError::InvalidRegex { .. } => "validation",
            EngineError::Cancelled => "cancelled",
            EngineError::LoopErrors { .. } => "loop",
            EngineError::Statement { source, .. } => source.classification(),
            EngineError::TaskFailed { source, .. } => source.classification(),
        }
    }

    /// Whether a catch clause with this declared type handles the error.
    pub fn matches_catch(&self, error_type: Option<&str>) -> bool {
        let Some(declared) = error_type else {
            return true;
        };
        let declared = declared.to_lowercase();
        declared == self.classification() || self.to_string().to_lowercase().contains(&declared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catch_matching() {
        let err = EngineError::user("deployment gate failed");
        assert!(err.matches_catch(None));
        assert!(err.matches_catch(Some("user")));
        assert!(err.matches_catch(Some("gate")));
        assert!(!err.matches_catch(Some("network")));
    }

    #[test]
    fn test_classification_passes_through_wrappers() {
        let err = EngineError::Capability(CapabilityError::Http("boom".into()))
            .in_statement("http")
            .in_task("deploy");
        assert_eq!(err.classification(), "http");
        let message = err.to_string();
        assert!(message.contains("deploy"));
        assert!(message.contains("http"));
    }

    #[test]
    fn test_wrapping_is_idempotent() {
        let err = EngineError::user("x").in_statement("action").in_statement("loop");
        assert!(matches!(
            err,
            EngineError::Statement {
                kind: "action",
                ..
            }
        ));
    }
}
