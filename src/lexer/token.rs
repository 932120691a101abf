//! Token types for the runfile language.
//!
//! Every token carries its source position so the parser can produce
//! line/column diagnostics. Reserved words get their own [`TokenKind`]
//! variant; everything else is an [`TokenKind::Ident`]. The parser may
//! still read a keyword token as a plain name in positions where names
//! are permitted (parameter names such as `env` or `tag` collide with
//! reserved words by design), which is why tokens keep their literal.

use serde::{Deserialize, Serialize};

/// Kind of a lexical token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    // Structural
    Indent,
    Dedent,
    Newline,
    Eof,
    Illegal,

    // Literals
    Ident,
    StringLit,
    NumberLit,
    /// `$name` or `$globals.key` variable reference.
    VarRef,

    // Operators and punctuation
    Colon,
    Comma,
    LParen,
    RParen,
    LBrace,
    RBrace,
    LBracket,
    RBracket,
    EqEq,
    NotEq,
    Lt,
    Lte,
    Gt,
    Gte,

    // Declarations
    Version,
    Task,
    Means,
    Project,
    Set,
    Include,
    Before,
    After,
    Setup,
    Teardown,
    Any,
    Depends,
    On,
    Then,
    And,

    // Docker
    Docker,
    Image,
    Container,
    Compose,
    Build,
    Push,
    Pull,
    Tag,
    Remove,
    Start,
    Stop,
    Up,
    Down,

    // Shell
    Run,
    Exec,
    Shell,
    Capture,
    Output,

    // Actions
    Info,
    Step,
    Warn,
    Error,
    Success,
    Fail,

    // Parameters
    Requires,
    Given,
    Accepts,
    Defaults,
    To,
    From,
    As,
    List,
    Of,

    // Control flow
    When,
    If,
    Else,
    Otherwise,
    For,
    Each,
    In,
    Parallel,
    Is,

    // Files
    File,
    Dir,
    Exists,
    Create,
    Copy,
    Move,
    Delete,
    Read,
    Write,
    Append,

    // Error handling
    Try,
    Catch,
    Finally,
    Throw,
    Rethrow,
    Ignore,

    // Types and literals
    StringType,
    NumberType,
    BooleanType,
    True,
    False,

    // Variables and loops
    Let,
    Break,
    Continue,
    Range,
    Line,
    Match,
    Where,
    Contains,
    Starts,
    Ends,
    Matches,
    With,
    Pattern,

    // Git / HTTP
    Git,
    Http,
    Https,
    Url,
    Header,
    Body,
    Auth,
    Bearer,
    Basic,
    Token,
    Timeout,
    Retry,
    Accept,
    Content,
    Type,

    // Detection
    Detect,
    Available,
    Environment,
    Ci,
    Local,
    Production,
    Staging,
    Development,

    // Tool names
    Node,
    Npm,
    Yarn,
    Python,
    Pip,
    Go,
    Java,
    Ruby,
    Php,
    Rust,
    Kubectl,
    Helm,
    Terraform,
    Aws,
    Gcp,
    Azure,
}

/// A single lexical token with its source coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub literal: String,
    /// 1-based line of the first character.
    pub line: usize,
    /// 1-based column of the first character.
    pub column: usize,
    /// Byte offset of the first character in the source.
    pub position: usize,
}

impl Token {
    pub fn new(
        kind: TokenKind,
        literal: impl Into<String>,
        line: usize,
        column: usize,
        position: usize,
    ) -> Self {
        Self {
            kind,
            literal: literal.into(),
            line,
            column,
            position,
        }
    }

    /// True for tokens that can serve as a bare word: identifiers and any
    /// reserved word. Punctuation, literals, and structural tokens are not
    /// words.
    pub fn is_word(&self) -> bool {
        !matches!(
            self.kind,
            TokenKind::Indent
                | TokenKind::Dedent
                | TokenKind::Newline
                | TokenKind::Eof
                | TokenKind::Illegal
                | TokenKind::StringLit
                | TokenKind::NumberLit
                | TokenKind::VarRef
                | TokenKind::Colon
                | TokenKind::Comma
                | TokenKind::LParen
                | TokenKind::RParen
                | TokenKind::LBrace
                | TokenKind::RBrace
                | TokenKind::LBracket
                | TokenKind::RBracket
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Lte
                | TokenKind::Gt
                | TokenKind::Gte
        )
    }
}

/// Classify an identifier against the reserved word table.
///
/// Returns `TokenKind::Ident` when the word is not reserved.
pub fn lookup_keyword(word: &str) -> TokenKind {
    match word {
        "version" => TokenKind::Version,
        "task" => TokenKind::Task,
        "means" => TokenKind::Means,
        "project" => TokenKind::Project,
        "set" => TokenKind::Set,
        "include" => TokenKind::Include,
        "before" => TokenKind::Before,
        "after" => TokenKind::After,
        "setup" => TokenKind::Setup,
        "teardown" => TokenKind::Teardown,
        "any" => TokenKind::Any,
        "depends" => TokenKind::Depends,
        "on" => TokenKind::On,
        "then" => TokenKind::Then,
        "and" => TokenKind::And,
        "docker" => TokenKind::Docker,
        "image" => TokenKind::Image,
        "container" => TokenKind::Container,
        "compose" => TokenKind::Compose,
        "build" => TokenKind::Build,
        "push" => TokenKind::Push,
        "pull" => TokenKind::Pull,
        "tag" => TokenKind::Tag,
        "remove" => TokenKind::Remove,
        "start" => TokenKind::Start,
        "stop" => TokenKind::Stop,
        "up" => TokenKind::Up,
        "down" => TokenKind::Down,
        "run" => TokenKind::Run,
        "exec" => TokenKind::Exec,
        "shell" => TokenKind::Shell,
        "capture" => TokenKind::Capture,
        "output" => TokenKind::Output,
        "info" => TokenKind::Info,
        "step" => TokenKind::Step,
        "warn" => TokenKind::Warn,
        "error" => TokenKind::Error,
        "success" => TokenKind::Success,
        "fail" => TokenKind::Fail,
        "requires" => TokenKind::Requires,
        "given" => TokenKind::Given,
        "accepts" => TokenKind::Accepts,
        "defaults" => TokenKind::Defaults,
        "to" => TokenKind::To,
        "from" => TokenKind::From,
        "as" => TokenKind::As,
        "list" => TokenKind::List,
        "of" => TokenKind::Of,
        "when" => TokenKind::When,
        "if" => TokenKind::If,
        "else" => TokenKind::Else,
        "otherwise" => TokenKind::Otherwise,
        "for" => TokenKind::For,
        "each" => TokenKind::Each,
        "in" => TokenKind::In,
        "parallel" => TokenKind::Parallel,
        "is" => TokenKind::Is,
        "file" => TokenKind::File,
        "dir" => TokenKind::Dir,
        "exists" => TokenKind::Exists,
        "create" => TokenKind::Create,
        "copy" => TokenKind::Copy,
        "move" => TokenKind::Move,
        "delete" => TokenKind::Delete,
        "read" => TokenKind::Read,
        "write" => TokenKind::Write,
        "append" => TokenKind::Append,
        "try" => TokenKind::Try,
        "catch" => TokenKind::Catch,
        "finally" => TokenKind::Finally,
        "throw" => TokenKind::Throw,
        "rethrow" => TokenKind::Rethrow,
        "ignore" => TokenKind::Ignore,
        "string" => TokenKind::StringType,
        "number" => TokenKind::NumberType,
        "boolean" => TokenKind::BooleanType,
        "true" => TokenKind::True,
        "false" => TokenKind::False,
        "let" => TokenKind::Let,
        "break" => TokenKind::Break,
        "continue" => TokenKind::Continue,
        "range" => TokenKind::Range,
        "line" => TokenKind::Line,
        "match" => TokenKind::Match,
        "where" => TokenKind::Where,
        "contains" => TokenKind::Contains,
        "starts" => TokenKind::Starts,
        "ends" => TokenKind::Ends,
        "matches" => TokenKind::Matches,
        "with" => TokenKind::With,
        "pattern" => TokenKind::Pattern,
        "git" => TokenKind::Git,
        "http" => TokenKind::Http,
        "https" => TokenKind::Https,
        "url" => TokenKind::Url,
        "header" => TokenKind::Header,
        "body" => TokenKind::Body,
        "auth" => TokenKind::Auth,
        "bearer" => TokenKind::Bearer,
        "basic" => TokenKind::Basic,
        "token" => TokenKind::Token,
        "timeout" => TokenKind::Timeout,
        "retry" => TokenKind::Retry,
        "accept" => TokenKind::Accept,
        "content" => TokenKind::Content,
        "type" => TokenKind::Type,
        "detect" => TokenKind::Detect,
        "available" => TokenKind::Available,
        "environment" => TokenKind::Environment,
        "ci" => TokenKind::Ci,
        "local" => TokenKind::Local,
        "production" => TokenKind::Production,
        "staging" => TokenKind::Staging,
        "development" => TokenKind::Development,
        "node" => TokenKind::Node,
        "npm" => TokenKind::Npm,
        "yarn" => TokenKind::Yarn,
        "python" => TokenKind::Python,
        "pip" => TokenKind::Pip,
        "go" => TokenKind::Go,
        "java" => TokenKind::Java,
        "ruby" => TokenKind::Ruby,
        "php" => TokenKind::Php,
        "rust" => TokenKind::Rust,
        "kubectl" => TokenKind::Kubectl,
        "helm" => TokenKind::Helm,
        "terraform" => TokenKind::Terraform,
        "aws" => TokenKind::Aws,
        "gcp" => TokenKind::Gcp,
        "azure" => TokenKind::Azure,
        _ => TokenKind::Ident,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(lookup_keyword("task"), TokenKind::Task);
        assert_eq!(lookup_keyword("depends"), TokenKind::Depends);
        assert_eq!(lookup_keyword("kubectl"), TokenKind::Kubectl);
        assert_eq!(lookup_keyword("my_var"), TokenKind::Ident);
        // Contextual words are not reserved
        assert_eq!(lookup_keyword("call"), TokenKind::Ident);
        assert_eq!(lookup_keyword("matrix"), TokenKind::Ident);
        assert_eq!(lookup_keyword("snippet"), TokenKind::Ident);
    }

    #[test]
    fn test_word_tokens() {
        let kw = Token::new(TokenKind::Task, "task", 1, 1, 0);
        let ident = Token::new(TokenKind::Ident, "foo", 1, 1, 0);
        let punct = Token::new(TokenKind::Colon, ":", 1, 1, 0);
        assert!(kw.is_word());
        assert!(ident.is_word());
        assert!(!punct.is_word());
    }
}
