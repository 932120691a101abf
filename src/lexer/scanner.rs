//! Indentation-sensitive scanner.
//!
//! The scanner walks the source once and produces a flat token stream.
//! Block structure is encoded with `Indent`/`Dedent` tokens driven by an
//! indent stack (initialized to `[0]`), the way Python-family lexers do
//! it. The scanner itself never fails: malformed input surfaces as
//! `Illegal` tokens that the parser turns into diagnostics.

use super::token::{Token, TokenKind, lookup_keyword};

/// Width a tab contributes to the indentation measure.
const TAB_WIDTH: usize = 4;

/// Tokenizes runfile source text.
pub struct Lexer<'a> {
    source: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    column: usize,
    indent_stack: Vec<usize>,
    tokens: Vec<Token>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            column: 1,
            indent_stack: vec![0],
            tokens: Vec::new(),
        }
    }

    /// Tokenize the entire source.
    pub fn tokenize(mut self) -> Vec<Token> {
        loop {
            if !self.scan_line() {
                break;
            }
        }
        // Close any open blocks, then terminate the stream.
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, "");
        }
        self.push(TokenKind::Eof, "");
        self.tokens
    }

    /// Scan one physical line. Returns false at end of input.
    fn scan_line(&mut self) -> bool {
        if self.pos >= self.bytes.len() {
            return false;
        }

        let indent = self.measure_indent();

        // Blank lines and comment-only lines never touch the indent stack.
        if self.at_line_end() {
            self.consume_newline();
            return true;
        }

        self.apply_indent(indent);

        let mut emitted = false;
        while !self.at_line_end() {
            self.scan_token();
            emitted = true;
        }
        if emitted {
            self.push(TokenKind::Newline, "");
        }
        self.consume_newline();
        true
    }

    /// Consume leading whitespace and return the line's indentation level.
    fn measure_indent(&mut self) -> usize {
        let mut indent = 0;
        while self.pos < self.bytes.len() {
            match self.bytes[self.pos] {
                b' ' => {
                    indent += 1;
                    self.advance(1);
                }
                b'\t' => {
                    indent += TAB_WIDTH;
                    self.advance(1);
                }
                b'\r' => {
                    self.advance(1);
                }
                _ => break,
            }
        }
        indent
    }

    /// Emit Indent/Dedent tokens for a content line at `indent`.
    fn apply_indent(&mut self, indent: usize) {
        let current = *self.indent_stack.last().unwrap_or(&0);
        if indent > current {
            self.indent_stack.push(indent);
            self.push(TokenKind::Indent, "");
            return;
        }
        while indent < *self.indent_stack.last().unwrap_or(&0) {
            self.indent_stack.pop();
            self.push(TokenKind::Dedent, "");
        }
        if indent != *self.indent_stack.last().unwrap_or(&0) {
            // The line sits between two known levels; flag it and keep
            // lexing at the enclosing level so the parser can resync.
            self.push(TokenKind::Illegal, "inconsistent indentation");
        }
    }

    /// True when the cursor sits on a newline, a comment, or end of input.
    fn at_line_end(&self) -> bool {
        let mut p = self.pos;
        while p < self.bytes.len() && matches!(self.bytes[p], b' ' | b'\t' | b'\r') {
            p += 1;
        }
        p >= self.bytes.len() || self.bytes[p] == b'\n' || self.bytes[p] == b'#'
    }

    /// Skip to and past the terminating newline, dropping any comment.
    fn consume_newline(&mut self) {
        while self.pos < self.bytes.len() && self.bytes[self.pos] != b'\n' {
            self.advance(1);
        }
        if self.pos < self.bytes.len() {
            self.pos += 1;
            self.line += 1;
            self.column = 1;
        }
    }

    fn scan_token(&mut self) {
        self.skip_inline_whitespace();
        if self.at_line_end() {
            return;
        }

        let (line, column, position) = (self.line, self.column, self.pos);
        let byte = self.bytes[self.pos];

        match byte {
            b'"' => self.scan_string(line, column, position),
            b'0'..=b'9' => self.scan_number(line, column, position),
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.scan_word(line, column, position),
            b'$' => self.scan_var_ref(line, column, position),
            b':' => self.emit_punct(TokenKind::Colon, ":", 1),
            b',' => self.emit_punct(TokenKind::Comma, ",", 1),
            b'(' => self.emit_punct(TokenKind::LParen, "(", 1),
            b')' => self.emit_punct(TokenKind::RParen, ")", 1),
            b'{' => self.emit_punct(TokenKind::LBrace, "{", 1),
            b'}' => self.emit_punct(TokenKind::RBrace, "}", 1),
            b'[' => self.emit_punct(TokenKind::LBracket, "[", 1),
            b']' => self.emit_punct(TokenKind::RBracket, "]", 1),
            b'=' if self.peek_is(1, b'=') => self.emit_punct(TokenKind::EqEq, "==", 2),
            b'!' if self.peek_is(1, b'=') => self.emit_punct(TokenKind::NotEq, "!=", 2),
            b'<' if self.peek_is(1, b'=') => self.emit_punct(TokenKind::Lte, "<=", 2),
            b'<' => self.emit_punct(TokenKind::Lt, "<", 1),
            b'>' if self.peek_is(1, b'=') => self.emit_punct(TokenKind::Gte, ">=", 2),
            b'>' => self.emit_punct(TokenKind::Gt, ">", 1),
            other => {
                let literal = (other as char).to_string();
                self.advance(1);
                self.tokens
                    .push(Token::new(TokenKind::Illegal, literal, line, column, position));
            }
        }
    }

    fn scan_string(&mut self, line: usize, column: usize, position: usize) {
        // Opening quote
        self.advance(1);
        let start = self.pos;
        while self.pos < self.bytes.len()
            && self.bytes[self.pos] != b'"'
            && self.bytes[self.pos] != b'\n'
        {
            self.advance(1);
        }
        let content = self.source[start..self.pos].to_string();
        if self.pos < self.bytes.len() && self.bytes[self.pos] == b'"' {
            self.advance(1);
            self.tokens
                .push(Token::new(TokenKind::StringLit, content, line, column, position));
        } else {
            self.tokens.push(Token::new(
                TokenKind::Illegal,
                format!("unterminated string \"{content}"),
                line,
                column,
                position,
            ));
        }
    }

    fn scan_number(&mut self, line: usize, column: usize, position: usize) {
        let start = self.pos;
        while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
            self.advance(1);
        }
        if self.pos < self.bytes.len()
            && self.bytes[self.pos] == b'.'
            && self.peek_is(1, b'0'..=b'9')
        {
            self.advance(1);
            while self.pos < self.bytes.len() && self.bytes[self.pos].is_ascii_digit() {
                self.advance(1);
            }
        }
        let literal = self.source[start..self.pos].to_string();
        self.tokens
            .push(Token::new(TokenKind::NumberLit, literal, line, column, position));
    }

    fn scan_word(&mut self, line: usize, column: usize, position: usize) {
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric() || self.bytes[self.pos] == b'_')
        {
            self.advance(1);
        }
        let word = &self.source[start..self.pos];
        let kind = lookup_keyword(word);
        self.tokens
            .push(Token::new(kind, word, line, column, position));
    }

    fn scan_var_ref(&mut self, line: usize, column: usize, position: usize) {
        // Skip the `$`; the literal is the reference path without it.
        self.advance(1);
        let start = self.pos;
        while self.pos < self.bytes.len()
            && (self.bytes[self.pos].is_ascii_alphanumeric()
                || self.bytes[self.pos] == b'_'
                || self.bytes[self.pos] == b'.')
        {
            self.advance(1);
        }
        if self.pos == start {
            self.tokens
                .push(Token::new(TokenKind::Illegal, "$", line, column, position));
            return;
        }
        let path = self.source[start..self.pos].to_string();
        self.tokens
            .push(Token::new(TokenKind::VarRef, path, line, column, position));
    }

    fn emit_punct(&mut self, kind: TokenKind, literal: &str, width: usize) {
        let token = Token::new(kind, literal, self.line, self.column, self.pos);
        self.advance(width);
        self.tokens.push(token);
    }

    fn skip_inline_whitespace(&mut self) {
        while self.pos < self.bytes.len() && matches!(self.bytes[self.pos], b' ' | b'\t' | b'\r') {
            self.advance(1);
        }
    }

    fn peek_is(&self, offset: usize, expected: impl PeekMatch) -> bool {
        self.pos + offset < self.bytes.len() && expected.matches(self.bytes[self.pos + offset])
    }

    fn advance(&mut self, bytes: usize) {
        self.pos += bytes;
        self.column += bytes;
    }

    fn push(&mut self, kind: TokenKind, literal: &str) {
        self.tokens
            .push(Token::new(kind, literal, self.line, self.column, self.pos));
    }
}

/// Byte matcher used by [`Lexer::peek_is`]; lets call sites pass either a
/// single byte or an inclusive range.
pub trait PeekMatch {
    fn matches(&self, byte: u8) -> bool;
}

impl PeekMatch for u8 {
    fn matches(&self, byte: u8) -> bool {
        *self == byte
    }
}

impl PeekMatch for std::ops::RangeInclusive<u8> {
    fn matches(&self, byte: u8) -> bool {
        self.contains(&byte)
    }
}
