//! Statement parsing.
//!
//! Statements dispatch on their leading token. Reserved words cover most
//! of the statement surface; the rest (`call`, `use`, `secret`,
//! `download`, `ping`, `check`, `transform`) are contextual identifiers.
//! Unknown leading tokens are reported, one token is skipped, and parsing
//! continues with the enclosing block.

use super::Parser;
use super::ast::*;
use crate::lexer::TokenKind;

impl Parser<'_> {
    pub(crate) fn parse_statement(&mut self) -> Option<StatementNode> {
        let line = self.current().line;
        let stmt = match self.current().kind {
            TokenKind::Info => self.parse_action(ActionVerb::Info),
            TokenKind::Step => self.parse_action(ActionVerb::Step),
            TokenKind::Warn => self.parse_action(ActionVerb::Warn),
            TokenKind::Error => self.parse_action(ActionVerb::Error),
            TokenKind::Success => self.parse_action(ActionVerb::Success),
            TokenKind::Fail => self.parse_action(ActionVerb::Fail),
            TokenKind::Run => self.parse_shell(ShellMode::Run),
            TokenKind::Exec => self.parse_shell(ShellMode::Exec),
            TokenKind::Shell => self.parse_shell(ShellMode::Shell),
            TokenKind::Capture => self.parse_capture(),
            TokenKind::Set => self.parse_assignment(VarOp::Set),
            TokenKind::Let => self.parse_assignment(VarOp::Let),
            TokenKind::When => self.parse_when(),
            TokenKind::If => self.parse_if(),
            TokenKind::For => self.parse_loop(),
            TokenKind::Try => self.parse_try(),
            TokenKind::Throw => self.parse_throw(),
            TokenKind::Rethrow => {
                self.advance();
                self.accept(TokenKind::Newline);
                Some(StmtNode::Throw {
                    kind: ThrowKind::Rethrow,
                    message: String::new(),
                })
            }
            TokenKind::Ignore => {
                self.advance();
                self.accept(TokenKind::Newline);
                Some(StmtNode::Throw {
                    kind: ThrowKind::Ignore,
                    message: String::new(),
                })
            }
            TokenKind::Break => self.parse_break_continue(true),
            TokenKind::Continue => self.parse_break_continue(false),
            TokenKind::Task => self.parse_task_from_template(),
            TokenKind::Docker => self.parse_docker(),
            TokenKind::Git => self.parse_git(),
            TokenKind::Http | TokenKind::Https => self.parse_http(),
            TokenKind::Create => self.parse_create(),
            TokenKind::Copy => self.parse_transfer(FileOp::Copy),
            TokenKind::Move => self.parse_transfer(FileOp::Move),
            TokenKind::Delete => self.parse_delete(),
            TokenKind::Read => self.parse_read(),
            TokenKind::Write => self.parse_write(FileOp::Write),
            TokenKind::Append => self.parse_write(FileOp::Append),
            TokenKind::Detect => self.parse_detect(),
            TokenKind::File => self.parse_file_exists(),
            TokenKind::Requires | TokenKind::Given | TokenKind::Accepts => {
                // Collected only at task scope; kept in the AST so the
                // lowering step can drop it.
                self.parse_param_decl().map(StmtNode::Parameter)
            }
            _ if self.at_word("call") => self.parse_task_call(),
            _ if self.at_word("use") => self.parse_use_snippet(),
            _ if self.at_word("secret") => self.parse_secret(),
            _ if self.at_word("download") => self.parse_download(),
            _ if self.at_word("ping") => self.parse_ping(),
            _ if self.at_word("check") => self.parse_check(),
            _ if self.at_word("transform") => self.parse_transform(),
            TokenKind::Otherwise | TokenKind::Else => {
                self.error_here("`otherwise` without a matching `when`/`if`");
                self.sync_to_line_end();
                None
            }
            _ => {
                let tok = self.current().clone();
                self.error_at(&tok, format!("unknown statement `{}`", tok.literal));
                self.advance();
                None
            }
        };
        stmt.map(|stmt| StatementNode { line, stmt })
    }

    fn parse_action(&mut self, verb: ActionVerb) -> Option<StmtNode> {
        self.advance();
        let message = self.expect_string("message")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Action { verb, message })
    }

    fn parse_shell(&mut self, mode: ShellMode) -> Option<StmtNode> {
        self.advance();
        let command = self.expect_string("command")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Shell {
            mode,
            command,
            capture_var: None,
        })
    }

    /// `capture "<command>" as <var>`.
    fn parse_capture(&mut self) -> Option<StmtNode> {
        self.advance();
        let command = self.expect_string("command")?;
        self.expect(TokenKind::As, "`as` after capture command")?;
        let capture_var = self.expect_word("capture variable")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Shell {
            mode: ShellMode::Capture,
            command,
            capture_var: Some(capture_var),
        })
    }

    /// `set <name> to <value>` / `let <name> to <value>`.
    fn parse_assignment(&mut self, op: VarOp) -> Option<StmtNode> {
        self.advance();
        let name = self.expect_word("variable name")?;
        self.expect(TokenKind::To, "`to`")?;
        let value = self.parse_value_expr()?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Variable { op, name, value })
    }

    /// `transform <name> with <expr>` where expr is a pipeline string or
    /// a builtin function call.
    fn parse_transform(&mut self) -> Option<StmtNode> {
        self.advance();
        let name = self.expect_word("variable name")?;
        self.expect(TokenKind::With, "`with`")?;
        let value = self.parse_value_expr()?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Variable {
            op: VarOp::Transform,
            name,
            value,
        })
    }

    /// Value expression: a lone literal keeps its content; anything more
    /// (a function call, an unquoted fragment) is kept as raw source.
    fn parse_value_expr(&mut self) -> Option<String> {
        match self.current().kind {
            TokenKind::StringLit if self.peek(1).kind == TokenKind::Newline => {
                Some(self.advance().literal)
            }
            TokenKind::NumberLit | TokenKind::True | TokenKind::False
                if self.peek(1).kind == TokenKind::Newline =>
            {
                Some(self.advance().literal)
            }
            TokenKind::VarRef if self.peek(1).kind == TokenKind::Newline => {
                Some(format!("${}", self.advance().literal))
            }
            TokenKind::Newline | TokenKind::Eof => {
                self.error_here("expected a value");
                None
            }
            _ => Some(self.slurp_until(&[])),
        }
    }

    /// `when ...`: either an environment gate or a plain conditional.
    fn parse_when(&mut self) -> Option<StmtNode> {
        if self.peek(1).kind == TokenKind::In {
            // `when in ci environment:`
            self.advance();
            self.advance();
            let environment = self.expect_word("environment name")?;
            self.expect(TokenKind::Environment, "`environment`")?;
            let body = self.parse_block();
            let else_body = self.parse_else_block();
            return Some(StmtNode::Detection(DetectionNode::WhenEnvironment {
                environment,
                body,
                else_body,
            }));
        }
        self.advance();
        self.parse_conditional_tail()
    }

    /// `if ...`: availability gate, version gate, or plain conditional.
    fn parse_if(&mut self) -> Option<StmtNode> {
        let gate = self.peek(1).is_word()
            && (self.peek(2).kind == TokenKind::Is
                && self.peek(3).kind == TokenKind::Available
                || self.peek(2).kind == TokenKind::Version);
        if gate {
            self.advance();
            let tool = self.expect_word("tool name")?;
            if self.accept(TokenKind::Is).is_some() {
                self.expect(TokenKind::Available, "`available`")?;
                let body = self.parse_block();
                let else_body = self.parse_else_block();
                return Some(StmtNode::Detection(DetectionNode::IfAvailable {
                    tool,
                    body,
                    else_body,
                }));
            }
            self.expect(TokenKind::Version, "`version`")?;
            let op = match self.current().kind {
                TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::Lte
                | TokenKind::Gt
                | TokenKind::Gte => self.advance().literal,
                _ => {
                    self.error_here("expected a comparison operator");
                    self.sync_to_line_end();
                    return None;
                }
            };
            let value = self.expect_string("version string")?;
            let body = self.parse_block();
            let else_body = self.parse_else_block();
            return Some(StmtNode::Detection(DetectionNode::IfVersion {
                tool,
                op,
                value,
                body,
                else_body,
            }));
        }
        self.advance();
        self.parse_conditional_tail()
    }

    /// Condition text up to `:`, block, optional else block.
    fn parse_conditional_tail(&mut self) -> Option<StmtNode> {
        let condition = self.slurp_until(&[TokenKind::Colon]);
        if condition.is_empty() {
            self.error_here("expected a condition");
        }
        let body = self.parse_block();
        let else_body = self.parse_else_block();
        Some(StmtNode::Conditional {
            condition,
            body,
            else_body,
        })
    }

    /// Consume `otherwise:`/`else:` at the current level, if present.
    fn parse_else_block(&mut self) -> Vec<StatementNode> {
        self.skip_newlines();
        if matches!(self.current().kind, TokenKind::Otherwise | TokenKind::Else) {
            self.advance();
            self.parse_block()
        } else {
            Vec::new()
        }
    }

    /// `for each <var> in <iterable> [where ...] [in parallel ...]:`.
    fn parse_loop(&mut self) -> Option<StmtNode> {
        self.advance();
        self.expect(TokenKind::Each, "`each` after `for`")?;
        let loop_var = self.expect_word("loop variable")?;
        self.expect(TokenKind::In, "`in`")?;

        let iterable = match self.current().kind {
            TokenKind::LBracket => IterableNode::Items(self.parse_string_list()),
            TokenKind::VarRef => IterableNode::Ref(self.advance().literal),
            TokenKind::Range => {
                self.advance();
                let start = self.parse_range_bound()?;
                self.expect(TokenKind::To, "`to`")?;
                let end = self.parse_range_bound()?;
                let step = if self.accept(TokenKind::Step).is_some() {
                    Some(self.parse_range_bound()?)
                } else {
                    None
                };
                IterableNode::Range { start, end, step }
            }
            TokenKind::Line => {
                self.advance();
                IterableNode::FileLines(self.expect_string("file path")?)
            }
            TokenKind::Match => {
                self.advance();
                let pattern = self.expect_string("regex pattern")?;
                self.expect(TokenKind::In, "`in`")?;
                let source = self.expect_string("match source")?;
                IterableNode::Matches { pattern, source }
            }
            _ if self.current().is_word() => IterableNode::Ref(self.advance().literal),
            _ => {
                self.error_here("expected an iterable");
                self.sync_to_line_end();
                return None;
            }
        };

        let filter = if self.accept(TokenKind::Where).is_some() {
            self.parse_filter()
        } else {
            None
        };

        let mut parallel = false;
        let mut max_workers = None;
        let mut fail_fast = false;
        if self.check(TokenKind::In) && self.peek(1).kind == TokenKind::Parallel {
            self.advance();
            self.advance();
            parallel = true;
            if self.accept(TokenKind::With).is_some() {
                let count = self.expect_number("worker count");
                self.accept_word("workers");
                max_workers = count.and_then(|c| c.parse().ok());
            }
            if self.accept(TokenKind::Fail).is_some() {
                self.accept_word("fast");
                fail_fast = true;
            }
        }

        let body = self.parse_block();
        Some(StmtNode::Loop {
            loop_var,
            iterable,
            filter,
            parallel,
            max_workers,
            fail_fast,
            body,
        })
    }

    fn parse_range_bound(&mut self) -> Option<String> {
        match self.current().kind {
            TokenKind::NumberLit => Some(self.advance().literal),
            TokenKind::VarRef => Some(format!("${}", self.advance().literal)),
            TokenKind::LBrace => Some(self.slurp_until(&[TokenKind::To, TokenKind::Step, TokenKind::Colon])),
            _ => {
                self.error_here("expected a range bound");
                None
            }
        }
    }

    /// `where <var> (contains | starts with | ends with | matches | == | !=) <value>`.
    fn parse_filter(&mut self) -> Option<FilterNode> {
        let variable = self.expect_word("filter variable")?;
        let op = match self.current().kind {
            TokenKind::Contains => {
                self.advance();
                FilterOp::Contains
            }
            TokenKind::Starts => {
                self.advance();
                self.expect(TokenKind::With, "`with` after `starts`")?;
                FilterOp::StartsWith
            }
            TokenKind::Ends => {
                self.advance();
                self.expect(TokenKind::With, "`with` after `ends`")?;
                FilterOp::EndsWith
            }
            TokenKind::Matches => {
                self.advance();
                FilterOp::Matches
            }
            TokenKind::EqEq => {
                self.advance();
                FilterOp::Eq
            }
            TokenKind::NotEq => {
                self.advance();
                FilterOp::NotEq
            }
            _ => {
                self.error_here("expected a filter operator");
                return None;
            }
        };
        let value = match self.current().kind {
            TokenKind::StringLit | TokenKind::NumberLit => self.advance().literal,
            TokenKind::VarRef => format!("${}", self.advance().literal),
            _ if self.current().is_word() => self.advance().literal,
            _ => {
                self.error_here("expected a filter value");
                return None;
            }
        };
        Some(FilterNode {
            variable,
            op,
            value,
        })
    }

    /// `try:` block with catch clauses and an optional finally block.
    fn parse_try(&mut self) -> Option<StmtNode> {
        self.advance();
        let try_body = self.parse_block();
        let mut catches = Vec::new();
        let mut finally_body = Vec::new();
        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Catch => {
                    self.advance();
                    let error_type = if self.current().is_word() && !self.check(TokenKind::As) {
                        Some(self.advance().literal)
                    } else {
                        None
                    };
                    let error_var = if self.accept(TokenKind::As).is_some() {
                        self.expect_word("error variable")
                    } else {
                        None
                    };
                    let body = self.parse_block();
                    catches.push(CatchNode {
                        error_type,
                        error_var,
                        body,
                    });
                }
                TokenKind::Finally => {
                    self.advance();
                    finally_body = self.parse_block();
                    break;
                }
                _ => break,
            }
        }
        if catches.is_empty() && finally_body.is_empty() {
            self.error_here("`try` requires at least one `catch` or `finally`");
        }
        Some(StmtNode::Try {
            try_body,
            catches,
            finally_body,
        })
    }

    fn parse_throw(&mut self) -> Option<StmtNode> {
        self.advance();
        let message = self.expect_string("error message")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Throw {
            kind: ThrowKind::Throw,
            message,
        })
    }

    /// `break [when <cond>]` / `continue [if <cond>]`.
    fn parse_break_continue(&mut self, is_break: bool) -> Option<StmtNode> {
        self.advance();
        let condition = if matches!(self.current().kind, TokenKind::When | TokenKind::If) {
            self.advance();
            let text = self.slurp_until(&[]);
            if text.is_empty() {
                self.error_here("expected a condition");
                None
            } else {
                Some(text)
            }
        } else {
            None
        };
        self.accept(TokenKind::Newline);
        Some(if is_break {
            StmtNode::Break { condition }
        } else {
            StmtNode::Continue { condition }
        })
    }

    /// `call task "<name>" [with <key> "<value>" ...]`.
    fn parse_task_call(&mut self) -> Option<StmtNode> {
        self.advance();
        self.expect(TokenKind::Task, "`task` after `call`")?;
        let task = self.expect_string("task name")?;
        let args = self.parse_with_args();
        self.accept(TokenKind::Newline);
        Some(StmtNode::TaskCall { task, args })
    }

    /// `task "<name>" from template "<template>" [with <key> "<value>" ...]`.
    fn parse_task_from_template(&mut self) -> Option<StmtNode> {
        self.advance();
        let name = self.expect_string("task name")?;
        self.expect(TokenKind::From, "`from`")?;
        if !self.accept_word("template") {
            self.error_here("expected `template`");
            self.sync_to_line_end();
            return None;
        }
        let template = self.expect_string("template name")?;
        let overrides = self.parse_with_args();
        self.accept(TokenKind::Newline);
        Some(StmtNode::TaskFromTemplate {
            name,
            template,
            overrides,
        })
    }

    /// Optional `with key "value" key2 "value2"` argument tail.
    fn parse_with_args(&mut self) -> Vec<(String, String)> {
        let mut args = Vec::new();
        if self.accept(TokenKind::With).is_none() {
            return args;
        }
        while self.current().is_word() {
            let key = self.advance().literal;
            match self.expect_string("argument value") {
                Some(value) => args.push((key, value)),
                None => break,
            }
        }
        args
    }

    /// `use snippet "<name>"`.
    fn parse_use_snippet(&mut self) -> Option<StmtNode> {
        self.advance();
        if !self.accept_word("snippet") {
            self.error_here("expected `snippet` after `use`");
            self.sync_to_line_end();
            return None;
        }
        let name = self.expect_string("snippet name")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::UseSnippet { name })
    }

    /// `docker <operation> [image|container] ["name"] [opts]` and
    /// `docker compose <operation> [opts]`.
    fn parse_docker(&mut self) -> Option<StmtNode> {
        self.advance();
        let mut operation = self.expect_word("docker operation")?;
        let mut resource = None;
        if operation == "compose" {
            resource = Some("compose".to_string());
            operation = self.expect_word("compose operation")?;
        } else if matches!(self.current().kind, TokenKind::Image | TokenKind::Container) {
            resource = Some(self.advance().literal);
        }
        let name = self
            .check(TokenKind::StringLit)
            .then(|| self.advance().literal);
        let options = self.parse_option_pairs();
        self.accept(TokenKind::Newline);
        Some(StmtNode::Docker {
            operation,
            resource,
            name,
            options,
        })
    }

    /// `git <operation> ["target"] [opts]`.
    fn parse_git(&mut self) -> Option<StmtNode> {
        self.advance();
        let operation = self.expect_word("git operation")?;
        let target = self
            .check(TokenKind::StringLit)
            .then(|| self.advance().literal);
        let options = self.parse_option_pairs();
        self.accept(TokenKind::Newline);
        Some(StmtNode::Git {
            operation,
            target,
            options,
        })
    }

    /// `word "value"` pairs up to end of line.
    fn parse_option_pairs(&mut self) -> Vec<(String, String)> {
        let mut options = Vec::new();
        while self.current().is_word() && self.peek(1).kind == TokenKind::StringLit {
            let key = self.advance().literal;
            options.push((key, self.advance().literal));
        }
        options
    }

    /// `http <method> "<url>"` with header/auth/body/timeout clauses.
    fn parse_http(&mut self) -> Option<StmtNode> {
        self.advance();
        let method = self.expect_word("http method")?;
        let url = self.expect_string("url")?;
        let mut headers = Vec::new();
        let mut auth = None;
        let mut body = None;
        let mut timeout_secs = None;
        let mut content_type = None;
        let mut accept = None;
        let mut capture_var = None;
        loop {
            match self.current().kind {
                TokenKind::Header => {
                    self.advance();
                    if let Some(h) = self.expect_string("header") {
                        headers.push(h);
                    }
                }
                TokenKind::Auth => {
                    self.advance();
                    auth = self.parse_auth_clause();
                }
                TokenKind::Body => {
                    self.advance();
                    body = self.expect_string("request body");
                }
                TokenKind::Timeout => {
                    self.advance();
                    timeout_secs = self
                        .expect_number("timeout seconds")
                        .and_then(|n| n.parse().ok());
                }
                TokenKind::Content => {
                    self.advance();
                    self.expect(TokenKind::Type, "`type` after `content`")?;
                    content_type = self.expect_string("content type");
                }
                TokenKind::Accept => {
                    self.advance();
                    accept = self.expect_string("accept type");
                }
                TokenKind::Capture => {
                    self.advance();
                    self.expect(TokenKind::As, "`as` after `capture`")?;
                    capture_var = self.expect_word("capture variable");
                }
                _ => break,
            }
        }
        self.accept(TokenKind::Newline);
        Some(StmtNode::Http {
            method,
            url,
            headers,
            auth,
            body,
            timeout_secs,
            content_type,
            accept,
            capture_var,
        })
    }

    /// `bearer "<token>"` / `basic "<user:pass>"` / `token "<value>"`.
    fn parse_auth_clause(&mut self) -> Option<AuthNode> {
        match self.current().kind {
            TokenKind::Bearer => {
                self.advance();
                self.expect_string("bearer token").map(AuthNode::Bearer)
            }
            TokenKind::Basic => {
                self.advance();
                self.expect_string("basic credentials").map(AuthNode::Basic)
            }
            TokenKind::Token => {
                self.advance();
                self.expect_string("token value").map(AuthNode::Token)
            }
            _ => {
                self.error_here("expected `bearer`, `basic`, or `token`");
                None
            }
        }
    }

    /// `download "<url>" to "<path>"` with overwrite/permission/extract
    /// clauses.
    fn parse_download(&mut self) -> Option<StmtNode> {
        self.advance();
        let url = self.expect_string("download url")?;
        self.expect(TokenKind::To, "`to`")?;
        let path = self.expect_string("destination path")?;
        let mut allow_overwrite = false;
        let mut permissions = Vec::new();
        let mut extract_to = None;
        let mut remove_archive = false;
        let mut headers = Vec::new();
        let mut auth = None;
        loop {
            match self.current().kind {
                TokenKind::Header => {
                    self.advance();
                    if let Some(h) = self.expect_string("header") {
                        headers.push(h);
                    }
                }
                TokenKind::Auth => {
                    self.advance();
                    auth = self.parse_auth_clause();
                }
                TokenKind::Remove => {
                    self.advance();
                    self.accept_word("archive");
                    remove_archive = true;
                }
                TokenKind::With => {
                    self.advance();
                    if !self.accept_word("permissions") {
                        self.error_here("expected `permissions` after `with`");
                        break;
                    }
                    let mode = self.expect_string("permission mode");
                    if self.expect(TokenKind::On, "`on`").is_none() {
                        break;
                    }
                    let target = self.expect_string("permission target");
                    if let (Some(mode), Some(target)) = (mode, target) {
                        permissions.push(PermissionSpec { mode, target });
                    }
                }
                _ if self.at_word("allow") => {
                    self.advance();
                    self.accept_word("overwrite");
                    allow_overwrite = true;
                }
                _ if self.at_word("extract") => {
                    self.advance();
                    if self.expect(TokenKind::To, "`to` after `extract`").is_none() {
                        break;
                    }
                    extract_to = self.expect_string("extraction directory");
                }
                _ => break,
            }
        }
        self.accept(TokenKind::Newline);
        Some(StmtNode::Download {
            url,
            path,
            allow_overwrite,
            permissions,
            extract_to,
            remove_archive,
            headers,
            auth,
        })
    }

    /// `ping "<host>" [timeout <secs>] [as <var>]`.
    fn parse_ping(&mut self) -> Option<StmtNode> {
        self.advance();
        let target = self.expect_string("host")?;
        let timeout_secs = if self.accept(TokenKind::Timeout).is_some() {
            self.expect_number("timeout seconds").and_then(|n| n.parse().ok())
        } else {
            None
        };
        let capture_var = if self.accept(TokenKind::As).is_some() {
            self.expect_word("capture variable")
        } else {
            None
        };
        self.accept(TokenKind::Newline);
        Some(StmtNode::Network {
            action: NetworkAction::Ping,
            target,
            port: None,
            timeout_secs,
            capture_var,
        })
    }

    /// `check port <n> on "<host>"` / `check health of "<url>"`.
    fn parse_check(&mut self) -> Option<StmtNode> {
        self.advance();
        if self.accept_word("port") {
            let port = self
                .expect_number("port number")
                .and_then(|n| n.parse().ok());
            self.expect(TokenKind::On, "`on`")?;
            let target = self.expect_string("host")?;
            let timeout_secs = if self.accept(TokenKind::Timeout).is_some() {
                self.expect_number("timeout seconds").and_then(|n| n.parse().ok())
            } else {
                None
            };
            let capture_var = if self.accept(TokenKind::As).is_some() {
                self.expect_word("capture variable")
            } else {
                None
            };
            self.accept(TokenKind::Newline);
            return Some(StmtNode::Network {
                action: NetworkAction::PortCheck,
                target,
                port,
                timeout_secs,
                capture_var,
            });
        }
        if self.accept_word("health") {
            self.expect(TokenKind::Of, "`of`")?;
            let target = self.expect_string("health url")?;
            let capture_var = if self.accept(TokenKind::As).is_some() {
                self.expect_word("capture variable")
            } else {
                None
            };
            self.accept(TokenKind::Newline);
            return Some(StmtNode::Network {
                action: NetworkAction::Health,
                target,
                port: None,
                timeout_secs: None,
                capture_var,
            });
        }
        self.error_here("expected `port` or `health` after `check`");
        self.sync_to_line_end();
        None
    }

    /// `create file "<p>"` / `create dir "<p>"`.
    fn parse_create(&mut self) -> Option<StmtNode> {
        self.advance();
        let op = match self.current().kind {
            TokenKind::File => {
                self.advance();
                FileOp::CreateFile
            }
            TokenKind::Dir => {
                self.advance();
                FileOp::CreateDir
            }
            _ => {
                self.error_here("expected `file` or `dir` after `create`");
                self.sync_to_line_end();
                return None;
            }
        };
        let path = self.expect_string("path")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::File {
            op,
            path,
            dest: None,
            content: None,
            capture_var: None,
        })
    }

    /// `copy "<src>" to "<dest>"` / `move "<src>" to "<dest>"`.
    fn parse_transfer(&mut self, op: FileOp) -> Option<StmtNode> {
        self.advance();
        let path = self.expect_string("source path")?;
        self.expect(TokenKind::To, "`to`")?;
        let dest = self.expect_string("destination path")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::File {
            op,
            path,
            dest: Some(dest),
            content: None,
            capture_var: None,
        })
    }

    /// `delete [file|dir] "<p>"` (idempotent at run time).
    fn parse_delete(&mut self) -> Option<StmtNode> {
        self.advance();
        if matches!(self.current().kind, TokenKind::File | TokenKind::Dir) {
            self.advance();
        }
        let path = self.expect_string("path")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::File {
            op: FileOp::Delete,
            path,
            dest: None,
            content: None,
            capture_var: None,
        })
    }

    /// `read file "<p>" as <var>`.
    fn parse_read(&mut self) -> Option<StmtNode> {
        self.advance();
        self.expect(TokenKind::File, "`file` after `read`")?;
        let path = self.expect_string("path")?;
        self.expect(TokenKind::As, "`as`")?;
        let capture_var = self.expect_word("variable name")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::File {
            op: FileOp::Read,
            path,
            dest: None,
            content: None,
            capture_var: Some(capture_var),
        })
    }

    /// `write "<content>" to file "<p>"` / `append "<content>" to file "<p>"`.
    fn parse_write(&mut self, op: FileOp) -> Option<StmtNode> {
        self.advance();
        let content = self.expect_string("content")?;
        self.expect(TokenKind::To, "`to`")?;
        self.expect(TokenKind::File, "`file`")?;
        let path = self.expect_string("path")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::File {
            op,
            path,
            dest: None,
            content: Some(content),
            capture_var: None,
        })
    }

    /// `file "<p>" exists as <var>`: existence probe into a variable.
    fn parse_file_exists(&mut self) -> Option<StmtNode> {
        self.advance();
        let path = self.expect_string("path")?;
        self.expect(TokenKind::Exists, "`exists`")?;
        self.expect(TokenKind::As, "`as`")?;
        let capture_var = self.expect_word("variable name")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::File {
            op: FileOp::Exists,
            path,
            dest: None,
            content: None,
            capture_var: Some(capture_var),
        })
    }

    /// `detect <tool> as <var>` / `detect available <a> or <b> as <var>`.
    fn parse_detect(&mut self) -> Option<StmtNode> {
        self.advance();
        if self.accept(TokenKind::Available).is_some() {
            let mut alternatives = Vec::new();
            loop {
                match self.expect_word("tool name") {
                    Some(tool) => alternatives.push(tool),
                    None => {
                        self.sync_to_line_end();
                        return None;
                    }
                }
                if !self.accept_word("or") {
                    break;
                }
            }
            self.expect(TokenKind::As, "`as`")?;
            let capture_var = self.expect_word("capture variable")?;
            self.accept(TokenKind::Newline);
            return Some(StmtNode::Detection(DetectionNode::DetectAvailable {
                alternatives,
                capture_var,
            }));
        }
        let tool = self.expect_word("tool name")?;
        self.expect(TokenKind::As, "`as`")?;
        let capture_var = self.expect_word("capture variable")?;
        self.accept(TokenKind::Newline);
        Some(StmtNode::Detection(DetectionNode::Detect {
            tool,
            capture_var,
        }))
    }

    /// `secret get|set|delete|exists|list ...`.
    fn parse_secret(&mut self) -> Option<StmtNode> {
        self.advance();
        let (op, needs_key) = match self.current().kind {
            TokenKind::Set => (SecretOp::Set, true),
            TokenKind::Delete => (SecretOp::Delete, true),
            TokenKind::Exists => (SecretOp::Exists, true),
            TokenKind::List => (SecretOp::List, false),
            _ if self.at_word("get") => (SecretOp::Get, true),
            _ => {
                self.error_here("expected `get`, `set`, `delete`, `exists`, or `list`");
                self.sync_to_line_end();
                return None;
            }
        };
        self.advance();
        let key = if needs_key {
            self.expect_string("secret key")?
        } else if self.check(TokenKind::StringLit) {
            // Optional name pattern for `secret list`.
            self.advance().literal
        } else {
            String::new()
        };
        let value = if op == SecretOp::Set {
            self.expect(TokenKind::To, "`to`")?;
            Some(self.expect_string("secret value")?)
        } else {
            None
        };
        let capture_var = if self.accept(TokenKind::As).is_some() {
            self.expect_word("capture variable")
        } else {
            None
        };
        self.accept(TokenKind::Newline);
        Some(StmtNode::Secret {
            op,
            key,
            value,
            capture_var,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    fn body_of(source: &str) -> Vec<StatementNode> {
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "unexpected errors: {errors:?}");
        program.tasks.into_iter().next().unwrap().body
    }

    fn task_src(body: &str) -> String {
        let indented: String = body
            .lines()
            .map(|l| format!("    {l}\n"))
            .collect();
        format!("version: 2.0\ntask \"t\":\n{indented}")
    }

    #[test]
    fn test_actions_and_shell() {
        let body = body_of(&task_src(
            "info \"hi\"\nstep \"working\"\nrun \"echo 1\"\ncapture \"git rev-parse HEAD\" as commit\n",
        ));
        assert_eq!(body.len(), 4);
        assert!(matches!(
            body[0].stmt,
            StmtNode::Action {
                verb: ActionVerb::Info,
                ..
            }
        ));
        match &body[3].stmt {
            StmtNode::Shell {
                mode: ShellMode::Capture,
                capture_var,
                ..
            } => assert_eq!(capture_var.as_deref(), Some("commit")),
            other => panic!("expected capture, got {other:?}"),
        }
    }

    #[test]
    fn test_conditional_with_otherwise() {
        let body = body_of(&task_src(
            "when $env is \"prod\":\n    info \"careful\"\notherwise:\n    info \"fast\"\n",
        ));
        match &body[0].stmt {
            StmtNode::Conditional {
                condition,
                body,
                else_body,
            } => {
                assert_eq!(condition, "$env is \"prod\"");
                assert_eq!(body.len(), 1);
                assert_eq!(else_body.len(), 1);
            }
            other => panic!("expected conditional, got {other:?}"),
        }
    }

    #[test]
    fn test_loop_parallel_tail() {
        let body = body_of(&task_src(
            "for each host in $hosts in parallel with 4 workers fail fast:\n    run \"ssh {host} uptime\"\n",
        ));
        match &body[0].stmt {
            StmtNode::Loop {
                loop_var,
                iterable,
                parallel,
                max_workers,
                fail_fast,
                ..
            } => {
                assert_eq!(loop_var, "host");
                assert!(matches!(iterable, IterableNode::Ref(r) if r == "hosts"));
                assert!(parallel);
                assert_eq!(*max_workers, Some(4));
                assert!(fail_fast);
            }
            other => panic!("expected loop, got {other:?}"),
        }
    }

    #[test]
    fn test_loop_range_and_filter() {
        let body = body_of(&task_src(
            "for each i in range 1 to 10 step 2:\n    info \"{i}\"\nfor each f in $files where f ends with \".md\":\n    info \"{f}\"\n",
        ));
        assert!(matches!(
            &body[0].stmt,
            StmtNode::Loop {
                iterable: IterableNode::Range { .. },
                ..
            }
        ));
        match &body[1].stmt {
            StmtNode::Loop { filter: Some(f), .. } => {
                assert_eq!(f.op, FilterOp::EndsWith);
                assert_eq!(f.value, ".md");
            }
            other => panic!("expected filtered loop, got {other:?}"),
        }
    }

    #[test]
    fn test_try_catch_finally() {
        let body = body_of(&task_src(
            "try:\n    fail \"boom\"\ncatch validation as err:\n    warn \"{err}\"\ncatch:\n    info \"handled\"\nfinally:\n    step \"always\"\n",
        ));
        match &body[0].stmt {
            StmtNode::Try {
                try_body,
                catches,
                finally_body,
            } => {
                assert_eq!(try_body.len(), 1);
                assert_eq!(catches.len(), 2);
                assert_eq!(catches[0].error_type.as_deref(), Some("validation"));
                assert_eq!(catches[0].error_var.as_deref(), Some("err"));
                assert!(catches[1].error_type.is_none());
                assert_eq!(finally_body.len(), 1);
            }
            other => panic!("expected try, got {other:?}"),
        }
    }

    #[test]
    fn test_task_call_and_template() {
        let body = body_of(&task_src(
            "call task \"build\" with profile \"release\"\ntask \"deploy-api\" from template \"svc\" with service \"api\"\nuse snippet \"announce\"\n",
        ));
        assert!(matches!(&body[0].stmt, StmtNode::TaskCall { task, args }
            if task == "build" && args == &[("profile".to_string(), "release".to_string())]));
        assert!(matches!(&body[1].stmt, StmtNode::TaskFromTemplate { template, .. }
            if template == "svc"));
        assert!(matches!(&body[2].stmt, StmtNode::UseSnippet { name } if name == "announce"));
    }

    #[test]
    fn test_docker_git_http() {
        let body = body_of(&task_src(
            "docker build image \"app\" tag \"v1\"\ngit clone \"https://example.com/r.git\" to \"src\"\nhttp get \"https://api.test/health\" header \"Accept: application/json\" auth bearer \"tok\" timeout 30 capture as health\n",
        ));
        match &body[0].stmt {
            StmtNode::Docker {
                operation,
                resource,
                name,
                options,
            } => {
                assert_eq!(operation, "build");
                assert_eq!(resource.as_deref(), Some("image"));
                assert_eq!(name.as_deref(), Some("app"));
                assert_eq!(options, &[("tag".to_string(), "v1".to_string())]);
            }
            other => panic!("expected docker, got {other:?}"),
        }
        assert!(matches!(&body[1].stmt, StmtNode::Git { operation, .. } if operation == "clone"));
        let body2 = body_of(&task_src("docker compose up\n"));
        assert!(matches!(&body2[0].stmt, StmtNode::Docker { operation, resource, .. }
            if operation == "up" && resource.as_deref() == Some("compose")));
        match &body[2].stmt {
            StmtNode::Http {
                method,
                headers,
                auth,
                timeout_secs,
                capture_var,
                ..
            } => {
                assert_eq!(method, "get");
                assert_eq!(headers.len(), 1);
                assert!(matches!(auth, Some(AuthNode::Bearer(t)) if t == "tok"));
                assert_eq!(*timeout_secs, Some(30));
                assert_eq!(capture_var.as_deref(), Some("health"));
            }
            other => panic!("expected http, got {other:?}"),
        }
    }

    #[test]
    fn test_download_clauses() {
        let body = body_of(&task_src(
            "download \"https://x.test/cli.tar.gz\" to \"bin/cli.tar.gz\" allow overwrite extract to \"bin\" remove archive with permissions \"755\" on \"bin/cli\"\n",
        ));
        match &body[0].stmt {
            StmtNode::Download {
                allow_overwrite,
                extract_to,
                remove_archive,
                permissions,
                ..
            } => {
                assert!(allow_overwrite);
                assert_eq!(extract_to.as_deref(), Some("bin"));
                assert!(remove_archive);
                assert_eq!(permissions.len(), 1);
                assert_eq!(permissions[0].mode, "755");
            }
            other => panic!("expected download, got {other:?}"),
        }
    }

    #[test]
    fn test_network_and_files() {
        let body = body_of(&task_src(
            "ping \"db.internal\" timeout 5\ncheck port 5432 on \"db.internal\"\ncheck health of \"https://x.test/up\"\ncreate dir \"dist\"\nread file \"VERSION\" as v\nwrite \"ok\" to file \"status\"\nfile \"Cargo.toml\" exists as present\n",
        ));
        assert!(matches!(
            &body[0].stmt,
            StmtNode::Network {
                action: NetworkAction::Ping,
                timeout_secs: Some(5),
                ..
            }
        ));
        assert!(matches!(
            &body[1].stmt,
            StmtNode::Network {
                action: NetworkAction::PortCheck,
                port: Some(5432),
                ..
            }
        ));
        assert!(matches!(
            &body[2].stmt,
            StmtNode::Network {
                action: NetworkAction::Health,
                ..
            }
        ));
        assert!(matches!(
            &body[3].stmt,
            StmtNode::File {
                op: FileOp::CreateDir,
                ..
            }
        ));
        assert!(matches!(&body[4].stmt, StmtNode::File { op: FileOp::Read, capture_var: Some(v), .. } if v == "v"));
        assert!(matches!(
            &body[5].stmt,
            StmtNode::File {
                op: FileOp::Write,
                ..
            }
        ));
        assert!(matches!(&body[6].stmt, StmtNode::File { op: FileOp::Exists, capture_var: Some(v), .. } if v == "present"));
    }

    #[test]
    fn test_detection_variants() {
        let body = body_of(&task_src(
            "detect node as node_version\ndetect available node or nodejs as runtime\nif docker is available:\n    info \"yes\"\nif node version >= \"18\":\n    info \"modern\"\nwhen in ci environment:\n    info \"ci\"\n",
        ));
        assert!(matches!(
            &body[0].stmt,
            StmtNode::Detection(DetectionNode::Detect { .. })
        ));
        assert!(matches!(
            &body[1].stmt,
            StmtNode::Detection(DetectionNode::DetectAvailable { alternatives, .. })
                if alternatives.len() == 2
        ));
        assert!(matches!(
            &body[2].stmt,
            StmtNode::Detection(DetectionNode::IfAvailable { tool, .. }) if tool == "docker"
        ));
        assert!(matches!(
            &body[3].stmt,
            StmtNode::Detection(DetectionNode::IfVersion { op, value, .. })
                if op == ">=" && value == "18"
        ));
        assert!(matches!(
            &body[4].stmt,
            StmtNode::Detection(DetectionNode::WhenEnvironment { environment, .. })
                if environment == "ci"
        ));
    }

    #[test]
    fn test_secret_ops() {
        let body = body_of(&task_src(
            "secret set \"k\" to \"v\"\nsecret get \"k\" as out\nsecret exists \"k\" as has\nsecret delete \"k\"\n",
        ));
        assert!(matches!(&body[0].stmt, StmtNode::Secret { op: SecretOp::Set, value: Some(v), .. } if v == "v"));
        assert!(matches!(
            &body[1].stmt,
            StmtNode::Secret {
                op: SecretOp::Get,
                ..
            }
        ));
        assert!(matches!(
            &body[2].stmt,
            StmtNode::Secret {
                op: SecretOp::Exists,
                ..
            }
        ));
        assert!(matches!(
            &body[3].stmt,
            StmtNode::Secret {
                op: SecretOp::Delete,
                ..
            }
        ));
    }

    #[test]
    fn test_break_continue_conditions() {
        let body = body_of(&task_src(
            "for each x in [\"a\", \"b\"]:\n    break when $x is \"a\"\n    continue if $x is \"b\"\n",
        ));
        match &body[0].stmt {
            StmtNode::Loop { body, .. } => {
                assert!(matches!(&body[0].stmt, StmtNode::Break { condition: Some(c) } if c == "$x is \"a\""));
                assert!(matches!(&body[1].stmt, StmtNode::Continue { condition: Some(c) } if c == "$x is \"b\""));
            }
            other => panic!("expected loop, got {other:?}"),
        }
    }

    #[test]
    fn test_assignment_and_transform() {
        let body = body_of(&task_src(
            "set target to \"{env}-cluster\"\nlet greeting to \"hello\"\ntransform files with \"filtered by extension .md|sorted by name\"\ntransform name with uppercase(\"{name}\")\n",
        ));
        assert!(matches!(&body[0].stmt, StmtNode::Variable { op: VarOp::Set, value, .. }
            if value == "{env}-cluster"));
        assert!(matches!(&body[1].stmt, StmtNode::Variable { op: VarOp::Let, .. }));
        assert!(matches!(&body[2].stmt, StmtNode::Variable { op: VarOp::Transform, value, .. }
            if value.contains("sorted by name")));
        assert!(matches!(&body[3].stmt, StmtNode::Variable { op: VarOp::Transform, value, .. }
            if value.starts_with("uppercase(")));
    }

    #[test]
    fn test_param_decl_in_body_is_kept_as_parameter_statement() {
        let body = body_of(&task_src(
            "when $x is \"y\":\n    requires nested\n",
        ));
        match &body[0].stmt {
            StmtNode::Conditional { body, .. } => {
                assert!(matches!(&body[0].stmt, StmtNode::Parameter(_)));
            }
            other => panic!("expected conditional, got {other:?}"),
        }
    }
}
