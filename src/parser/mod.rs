//! Hand-written predictive parser for runfiles.
//!
//! One token of lookahead, no backtracking. The parser never aborts on
//! the first problem: every diagnostic is pushed onto an error list and
//! parsing resynchronizes (skip one token at statement level, skip to the
//! closing `Dedent` on indentation damage) so a single pass reports as
//! much as possible.
//!
//! Free-form fragments (conditions, value expressions) are not given
//! their own grammar. The parser slices the raw source text between two
//! token positions and stores the string; the engine evaluates it at run
//! time against the execution context.

pub mod ast;
mod decls;
mod statements;

use crate::lexer::{Lexer, Token, TokenKind};
use ast::{Program, StatementNode};
use thiserror::Error;

/// A single parse diagnostic with source coordinates.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("line {line}, column {column}: {message}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

/// Parse source text into a [`Program`] plus accumulated diagnostics.
pub fn parse(source: &str) -> (Program, Vec<ParseError>) {
    let tokens = Lexer::new(source).tokenize();
    Parser::new(source, tokens).parse_program()
}

pub(crate) struct Parser<'a> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    errors: Vec<ParseError>,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(source: &'a str, tokens: Vec<Token>) -> Self {
        Self {
            source,
            tokens,
            pos: 0,
            errors: Vec::new(),
        }
    }

    pub(crate) fn parse_program(mut self) -> (Program, Vec<ParseError>) {
        let mut program = Program::default();

        self.skip_newlines();
        program.version = self.parse_version_decl();

        self.skip_newlines();
        if self.check(TokenKind::Project) {
            program.project = self.parse_project_decl();
        }

        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Eof => break,
                TokenKind::Task => {
                    if let Some(task) = self.parse_task_decl() {
                        program.tasks.push(task);
                    }
                }
                _ => {
                    let tok = self.current().clone();
                    self.error_at(
                        &tok,
                        format!("unexpected token `{}` at top level", describe(&tok)),
                    );
                    self.advance();
                }
            }
        }

        if program.version.is_none() {
            self.errors.insert(
                0,
                ParseError {
                    message: "missing required `version:` declaration".to_string(),
                    line: 1,
                    column: 1,
                },
            );
        }

        (program, self.errors)
    }

    // ------------------------------------------------------------------
    // Token cursor
    // ------------------------------------------------------------------

    pub(crate) fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    pub(crate) fn peek(&self, n: usize) -> &Token {
        &self.tokens[(self.pos + n).min(self.tokens.len() - 1)]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let tok = self.current().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        tok
    }

    pub(crate) fn check(&self, kind: TokenKind) -> bool {
        self.current().kind == kind
    }

    pub(crate) fn accept(&mut self, kind: TokenKind) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            None
        }
    }

    pub(crate) fn expect(&mut self, kind: TokenKind, what: &str) -> Option<Token> {
        if self.check(kind) {
            Some(self.advance())
        } else {
            let tok = self.current().clone();
            self.error_at(&tok, format!("expected {what}, found `{}`", describe(&tok)));
            None
        }
    }

    /// Accept the current token as a bare word (identifier or keyword).
    pub(crate) fn word(&mut self) -> Option<String> {
        if self.current().is_word() {
            Some(self.advance().literal)
        } else {
            None
        }
    }

    pub(crate) fn expect_word(&mut self, what: &str) -> Option<String> {
        if self.current().is_word() {
            Some(self.advance().literal)
        } else {
            let tok = self.current().clone();
            self.error_at(&tok, format!("expected {what}, found `{}`", describe(&tok)));
            None
        }
    }

    /// True when the current token is a word with this exact literal.
    /// Used for contextual keywords (`call`, `snippet`, `matrix`, …).
    pub(crate) fn at_word(&self, literal: &str) -> bool {
        self.current().is_word() && self.current().literal == literal
    }

    pub(crate) fn accept_word(&mut self, literal: &str) -> bool {
        if self.at_word(literal) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect_string(&mut self, what: &str) -> Option<String> {
        self.expect(TokenKind::StringLit, what).map(|t| t.literal)
    }

    pub(crate) fn expect_number(&mut self, what: &str) -> Option<String> {
        self.expect(TokenKind::NumberLit, what).map(|t| t.literal)
    }

    pub(crate) fn error_here(&mut self, message: impl Into<String>) {
        let tok = self.current().clone();
        self.error_at(&tok, message);
    }

    pub(crate) fn error_at(&mut self, tok: &Token, message: impl Into<String>) {
        self.errors.push(ParseError {
            message: message.into(),
            line: tok.line,
            column: tok.column,
        });
    }

    pub(crate) fn skip_newlines(&mut self) {
        while self.check(TokenKind::Newline) {
            self.advance();
        }
    }

    /// Skip the remainder of the current line, including its newline.
    pub(crate) fn sync_to_line_end(&mut self) {
        while !matches!(
            self.current().kind,
            TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent
        ) {
            self.advance();
        }
        self.accept(TokenKind::Newline);
    }

    /// Skip forward to just past the Dedent closing the current block.
    /// Used to resynchronize after indentation damage.
    pub(crate) fn sync_to_dedent(&mut self) {
        let mut depth = 0usize;
        loop {
            match self.current().kind {
                TokenKind::Eof => return,
                TokenKind::Indent => {
                    depth += 1;
                    self.advance();
                }
                TokenKind::Dedent => {
                    self.advance();
                    if depth == 0 {
                        return;
                    }
                    depth -= 1;
                }
                _ => {
                    self.advance();
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Fragments
    // ------------------------------------------------------------------

    /// Version declaration: `version ":" NUMBER`.
    fn parse_version_decl(&mut self) -> Option<String> {
        if !self.check(TokenKind::Version) {
            return None;
        }
        self.advance();
        self.expect(TokenKind::Colon, "`:` after `version`")?;
        let number = self.expect_number("version number")?;
        self.accept(TokenKind::Newline);
        Some(number)
    }

    /// Slice the raw source from the current token up to (not including)
    /// the first token of `stop` kind on this line, consuming everything
    /// before it. Returns the trimmed text.
    pub(crate) fn slurp_until(&mut self, stop: &[TokenKind]) -> String {
        let start = self.current().position;
        let mut end = start;
        while !stop.contains(&self.current().kind)
            && !matches!(self.current().kind, TokenKind::Newline | TokenKind::Eof)
        {
            let tok = self.advance();
            end = tok.position + raw_width(&tok);
        }
        self.source[start..end].trim().to_string()
    }

    /// Parse an inline string list literal: `["a", "b", "c"]`.
    /// Items may be string literals, numbers, or bare words.
    pub(crate) fn parse_string_list(&mut self) -> Vec<String> {
        let mut items = Vec::new();
        if self.expect(TokenKind::LBracket, "`[`").is_none() {
            return items;
        }
        loop {
            match self.current().kind {
                TokenKind::RBracket => {
                    self.advance();
                    break;
                }
                TokenKind::StringLit | TokenKind::NumberLit => {
                    items.push(self.advance().literal);
                }
                _ if self.current().is_word() => {
                    items.push(self.advance().literal);
                }
                TokenKind::Comma => {
                    self.advance();
                }
                _ => {
                    self.error_here("expected list item or `]`");
                    self.sync_to_line_end();
                    break;
                }
            }
        }
        items
    }

    /// Parse an indented statement block after a `:` on the current line.
    pub(crate) fn parse_block(&mut self) -> Vec<StatementNode> {
        let mut body = Vec::new();
        if self.expect(TokenKind::Colon, "`:` to open a block").is_none() {
            self.sync_to_line_end();
            return body;
        }
        self.accept(TokenKind::Newline);
        if self.expect(TokenKind::Indent, "an indented block").is_none() {
            return body;
        }
        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Dedent => {
                    self.advance();
                    break;
                }
                TokenKind::Eof => break,
                TokenKind::Illegal => {
                    let tok = self.current().clone();
                    self.error_at(&tok, format!("syntax error: {}", tok.literal));
                    if tok.literal.contains("indentation") {
                        self.sync_to_dedent();
                        break;
                    }
                    self.advance();
                }
                _ => {
                    if let Some(stmt) = self.parse_statement() {
                        body.push(stmt);
                    }
                }
            }
        }
        body
    }
}

/// Byte width of a token's raw appearance in source (string literals
/// include their quotes, var refs their `$`).
fn raw_width(tok: &Token) -> usize {
    match tok.kind {
        TokenKind::StringLit => tok.literal.len() + 2,
        TokenKind::VarRef => tok.literal.len() + 1,
        TokenKind::Illegal => 1,
        _ => tok.literal.len(),
    }
}

fn describe(tok: &Token) -> String {
    match tok.kind {
        TokenKind::Newline => "end of line".to_string(),
        TokenKind::Indent => "indent".to_string(),
        TokenKind::Dedent => "dedent".to_string(),
        TokenKind::Eof => "end of file".to_string(),
        _ if tok.literal.is_empty() => format!("{:?}", tok.kind),
        _ => tok.literal.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_required() {
        let (_, errors) = parse("task \"t\":\n    info \"x\"\n");
        assert!(errors.iter().any(|e| e.message.contains("version")));
    }

    #[test]
    fn test_minimal_program() {
        let (program, errors) = parse("version: 2.0\n\ntask \"hello\":\n    info \"hi\"\n");
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        assert_eq!(program.version.as_deref(), Some("2.0"));
        assert_eq!(program.tasks.len(), 1);
        assert_eq!(program.tasks[0].name, "hello");
        assert_eq!(program.tasks[0].body.len(), 1);
    }

    #[test]
    fn test_errors_accumulate() {
        // Both the stray token and the unterminated string should be
        // reported in one pass.
        let source = "version: 2.0\n% stray\ntask \"t\":\n    info \"oops\n";
        let (_, errors) = parse(source);
        assert!(errors.len() >= 2, "errors: {errors:?}");
    }

    #[test]
    fn test_unknown_statement_skips_one_token() {
        let source = "version: 2.0\ntask \"t\":\n    bogus\n    info \"still parsed\"\n";
        let (program, errors) = parse(source);
        assert!(!errors.is_empty());
        assert_eq!(program.tasks[0].body.len(), 1);
    }
}
