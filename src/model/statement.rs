//! Executable statement model.
//!
//! The domain [`Statement`] is a tagged union the engine dispatches on
//! exhaustively. It shares the small vocabulary enums (verbs, modes,
//! operators) with the AST, but carries no source coordinates and no
//! parameter declarations; those are collected at task scope during
//! lowering and never reach the engine.

use serde::{Deserialize, Serialize};

pub use crate::parser::ast::{
    ActionVerb, AuthNode, FilterOp, FileOp, NetworkAction, PermissionSpec, SecretOp, ShellMode,
    ThrowKind, VarOp,
};

/// Loop iterable, resolved from the AST form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Iterable {
    Items(Vec<String>),
    /// Variable, parameter, or `globals.<key>` reference.
    Ref(String),
    Range {
        start: String,
        end: String,
        step: Option<String>,
    },
    FileLines(String),
    Matches {
        pattern: String,
        source: String,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Filter {
    pub variable: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoopSpec {
    pub loop_var: String,
    pub iterable: Iterable,
    pub filter: Option<Filter>,
    pub parallel: bool,
    pub max_workers: Option<usize>,
    pub fail_fast: bool,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchClause {
    pub error_type: Option<String>,
    pub error_var: Option<String>,
    pub body: Vec<Statement>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpSpec {
    pub method: String,
    pub url: String,
    pub headers: Vec<String>,
    pub auth: Option<AuthNode>,
    pub body: Option<String>,
    pub timeout_secs: Option<u64>,
    pub content_type: Option<String>,
    pub accept: Option<String>,
    pub capture_var: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadSpec {
    pub url: String,
    pub path: String,
    pub allow_overwrite: bool,
    pub permissions: Vec<PermissionSpec>,
    pub extract_to: Option<String>,
    pub remove_archive: bool,
    pub headers: Vec<String>,
    pub auth: Option<AuthNode>,
}

/// Tool detection, lowered from the AST detection node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Detection {
    Detect {
        tool: String,
        capture_var: String,
    },
    DetectAvailable {
        alternatives: Vec<String>,
        capture_var: String,
    },
    IfAvailable {
        tool: String,
        body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    IfVersion {
        tool: String,
        op: String,
        value: String,
        body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    WhenEnvironment {
        environment: String,
        body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
}

/// The executable statement union.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Statement {
    Action {
        verb: ActionVerb,
        message: String,
    },
    Shell {
        mode: ShellMode,
        command: String,
        capture_var: Option<String>,
        stream_output: bool,
    },
    Variable {
        op: VarOp,
        name: String,
        value: String,
    },
    Conditional {
        condition: String,
        body: Vec<Statement>,
        else_body: Vec<Statement>,
    },
    Loop(LoopSpec),
    Try {
        try_body: Vec<Statement>,
        catches: Vec<CatchClause>,
        finally_body: Vec<Statement>,
    },
    Throw {
        kind: ThrowKind,
        message: String,
    },
    Break {
        condition: Option<String>,
    },
    Continue {
        condition: Option<String>,
    },
    TaskCall {
        task: String,
        args: Vec<(String, String)>,
    },
    TaskFromTemplate {
        name: String,
        template: String,
        overrides: Vec<(String, String)>,
    },
    Docker {
        operation: String,
        resource: Option<String>,
        name: Option<String>,
        options: Vec<(String, String)>,
    },
    Git {
        operation: String,
        target: Option<String>,
        options: Vec<(String, String)>,
    },
    Http(HttpSpec),
    Download(DownloadSpec),
    Network {
        action: NetworkAction,
        target: String,
        port: Option<u16>,
        timeout_secs: Option<u64>,
        capture_var: Option<String>,
    },
    File {
        op: FileOp,
        path: String,
        dest: Option<String>,
        content: Option<String>,
        capture_var: Option<String>,
    },
    Detection(Detection),
    UseSnippet {
        name: String,
    },
    Secret {
        op: SecretOp,
        key: String,
        value: Option<String>,
        capture_var: Option<String>,
    },
}

impl Statement {
    /// Statement kind tag, used in diagnostics and dry-run output.
    pub fn kind(&self) -> &'static str {
        match self {
            Statement::Action { .. } => "action",
            Statement::Shell { .. } => "shell",
            Statement::Variable { .. } => "variable",
            Statement::Conditional { .. } => "conditional",
            Statement::Loop(_) => "loop",
            Statement::Try { .. } => "try",
            Statement::Throw { .. } => "throw",
            Statement::Break { .. } => "break",
            Statement::Continue { .. } => "continue",
            Statement::TaskCall { .. } => "task call",
            Statement::TaskFromTemplate { .. } => "task from template",
            Statement::Docker { .. } => "docker",
            Statement::Git { .. } => "git",
            Statement::Http(_) => "http",
            Statement::Download(_) => "download",
            Statement::Network { .. } => "network",
            Statement::File { .. } => "file",
            Statement::Detection(_) => "detection",
            Statement::UseSnippet { .. } => "snippet",
            Statement::Secret { .. } => "secret",
        }
    }
}
