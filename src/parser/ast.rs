//! Abstract syntax tree for runfiles.
//!
//! The AST stays close to the surface syntax: statements hold raw strings
//! (commands, conditions, value expressions) that the engine interpolates
//! at run time. Lowering into the executable domain model happens in
//! `crate::model::convert`.

use serde::{Deserialize, Serialize};

/// Root of a parsed runfile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Program {
    /// Declared language version, e.g. `2.0`.
    pub version: Option<String>,
    pub project: Option<ProjectDecl>,
    pub tasks: Vec<TaskDecl>,
}

/// `project "<name>" [version "<x>"]:` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProjectDecl {
    pub name: String,
    pub version: Option<String>,
    /// `set key to "value"` entries, in declaration order.
    pub settings: Vec<(String, String)>,
    /// `include "path" [as <namespace>]` entries.
    pub includes: Vec<IncludeDecl>,
    pub shell_configs: Vec<ShellConfigDecl>,
    pub hooks: Vec<HookDecl>,
    pub snippets: Vec<SnippetDecl>,
    pub templates: Vec<TemplateDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IncludeDecl {
    pub path: String,
    pub namespace: Option<String>,
}

/// Per-platform shell override.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ShellConfigDecl {
    pub platform: String,
    pub executable: Option<String>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// Lifecycle hook position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HookKind {
    Setup,
    Teardown,
    BeforeTask,
    AfterTask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HookDecl {
    pub kind: HookKind,
    pub body: Vec<StatementNode>,
}

/// Reusable statement block invoked with `use snippet "<name>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnippetDecl {
    pub name: String,
    pub body: Vec<StatementNode>,
}

/// Task body template instantiated with `task "<n>" from template "<t>"`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TemplateDecl {
    pub name: String,
    pub body: Vec<StatementNode>,
}

/// `task "<name>" [means "<desc>"]:` block.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TaskDecl {
    pub name: String,
    pub description: Option<String>,
    pub line: usize,
    pub parameters: Vec<ParamDecl>,
    pub dependencies: Vec<DependencyItem>,
    pub matrix: Vec<MatrixDecl>,
    pub body: Vec<StatementNode>,
}

/// Parameter kind as declared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ParamKindDecl {
    #[default]
    Requires,
    Given,
    Accepts,
}

/// One parameter declaration with its constraint clauses.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub kind: ParamKindDecl,
    /// `as string|number|boolean|list` (also set by `as list of <t>`).
    pub data_type: Option<String>,
    /// `defaults to "<v>"`.
    pub default: Option<String>,
    /// `from ["a", "b"]` enum constraint.
    pub constraints: Vec<String>,
    /// `between <min> and <max>`.
    pub min: Option<f64>,
    pub max: Option<f64>,
    /// `matching pattern "<regex>"`.
    pub pattern: Option<String>,
    /// `matching <macro>` for a predefined macro name.
    pub pattern_macro: Option<String>,
    /// `matching email format`.
    pub email_format: bool,
    /// `variadic` trailing flag.
    pub variadic: bool,
}

/// One dependency edge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyItem {
    pub name: String,
    /// True when the preceding separator was `and`/`then`.
    pub sequential: bool,
    /// `in parallel` suffix on the item.
    pub parallel_marked: bool,
}

/// `matrix <key> from ["a", "b"]` declaration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixDecl {
    pub key: String,
    pub values: Vec<String>,
}

/// A statement with its source line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatementNode {
    pub line: usize,
    pub stmt: StmtNode,
}

/// Output action verbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActionVerb {
    Info,
    Step,
    Warn,
    Error,
    Success,
    Fail,
}

/// Shell statement flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShellMode {
    Run,
    Exec,
    Shell,
    Capture,
}

/// Variable statement flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VarOp {
    Let,
    Set,
    Transform,
}

/// Loop iterable source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum IterableNode {
    /// `["a", "b", "c"]` literal list.
    Items(Vec<String>),
    /// `$var` or `$globals.key` reference, or a bare parameter name.
    Ref(String),
    /// `range <start> to <end> [step <s>]`.
    Range {
        start: String,
        end: String,
        step: Option<String>,
    },
    /// `line "<file>"`: one iteration per line.
    FileLines(String),
    /// `match "<pattern>" in "<source>"`: one iteration per regex match.
    Matches { pattern: String, source: String },
}

/// Loop filter operators for `where` clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterOp {
    Contains,
    StartsWith,
    EndsWith,
    Matches,
    Eq,
    NotEq,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterNode {
    pub variable: String,
    pub op: FilterOp,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatchNode {
    /// Error classification to match; empty matches everything.
    pub error_type: Option<String>,
    /// `as <name>` binding for the error message.
    pub error_var: Option<String>,
    pub body: Vec<StatementNode>,
}

/// Throw statement flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ThrowKind {
    Throw,
    Rethrow,
    Ignore,
}

/// HTTP authentication clause.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AuthNode {
    Bearer(String),
    Basic(String),
    Token(String),
}

/// Network probe flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkAction {
    Ping,
    PortCheck,
    Health,
}

/// File operation flavors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileOp {
    CreateFile,
    CreateDir,
    Copy,
    Move,
    Delete,
    Read,
    Write,
    Append,
    Exists,
}

/// Tool detection flavors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DetectionNode {
    /// `detect <tool> as <var>`: capture the tool version.
    Detect { tool: String, capture_var: String },
    /// `detect available <a> or <b> as <var>`: first available wins.
    DetectAvailable {
        alternatives: Vec<String>,
        capture_var: String,
    },
    /// `if <tool> is available:` gate.
    IfAvailable {
        tool: String,
        body: Vec<StatementNode>,
        else_body: Vec<StatementNode>,
    },
    /// `if <tool> version <op> "<v>":` gate.
    IfVersion {
        tool: String,
        op: String,
        value: String,
        body: Vec<StatementNode>,
        else_body: Vec<StatementNode>,
    },
    /// `when in <env> environment:` gate.
    WhenEnvironment {
        environment: String,
        body: Vec<StatementNode>,
        else_body: Vec<StatementNode>,
    },
}

/// Secret store operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SecretOp {
    Get,
    Set,
    Delete,
    Exists,
    List,
}

/// `with permissions "<mode>" on "<target>"` clause on downloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionSpec {
    pub mode: String,
    pub target: String,
}

/// The statement union. Raw strings are interpolated at execution time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StmtNode {
    Action {
        verb: ActionVerb,
        message: String,
    },
    Shell {
        mode: ShellMode,
        command: String,
        capture_var: Option<String>,
    },
    Variable {
        op: VarOp,
        name: String,
        /// Value expression: literal, pipeline, or `fn(args)` call.
        value: String,
    },
    Conditional {
        condition: String,
        body: Vec<StatementNode>,
        else_body: Vec<StatementNode>,
    },
    Loop {
        loop_var: String,
        iterable: IterableNode,
        filter: Option<FilterNode>,
        parallel: bool,
        max_workers: Option<usize>,
        fail_fast: bool,
        body: Vec<StatementNode>,
    },
    Try {
        try_body: Vec<StatementNode>,
        catches: Vec<CatchNode>,
        finally_body: Vec<StatementNode>,
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
    Http {
        method: String,
        url: String,
        headers: Vec<String>,
        auth: Option<AuthNode>,
        body: Option<String>,
        timeout_secs: Option<u64>,
        content_type: Option<String>,
        accept: Option<String>,
        capture_var: Option<String>,
    },
    Download {
        url: String,
        path: String,
        allow_overwrite: bool,
        permissions: Vec<PermissionSpec>,
        extract_to: Option<String>,
        remove_archive: bool,
        headers: Vec<String>,
        auth: Option<AuthNode>,
    },
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
    Detection(DetectionNode),
    UseSnippet {
        name: String,
    },
    Secret {
        op: SecretOp,
        key: String,
        value: Option<String>,
        capture_var: Option<String>,
    },
    /// Parameter declaration found inside a block body; collected only at
    /// task scope and dropped during lowering.
    Parameter(ParamDecl),
}

impl StmtNode {
    /// Short statement kind name, used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match self {
            StmtNode::Action { .. } => "action",
            StmtNode::Shell { .. } => "shell",
            StmtNode::Variable { .. } => "variable",
            StmtNode::Conditional { .. } => "conditional",
            StmtNode::Loop { .. } => "loop",
            StmtNode::Try { .. } => "try",
            StmtNode::Throw { .. } => "throw",
            StmtNode::Break { .. } => "break",
            StmtNode::Continue { .. } => "continue",
            StmtNode::TaskCall { .. } => "task call",
            StmtNode::TaskFromTemplate { .. } => "task from template",
            StmtNode::Docker { .. } => "docker",
            StmtNode::Git { .. } => "git",
            StmtNode::Http { .. } => "http",
            StmtNode::Download { .. } => "download",
            StmtNode::Network { .. } => "network",
            StmtNode::File { .. } => "file",
            StmtNode::Detection(_) => "detection",
            StmtNode::UseSnippet { .. } => "snippet",
            StmtNode::Secret { .. } => "secret",
            StmtNode::Parameter(_) => "parameter",
        }
    }
}
