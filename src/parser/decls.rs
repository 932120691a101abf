//! Declaration parsing: project blocks, tasks, parameters, dependencies.

use super::Parser;
use super::ast::*;
use crate::lexer::TokenKind;

impl Parser<'_> {
    /// `project "<name>" [version "<x>"]:` with its settings block.
    pub(crate) fn parse_project_decl(&mut self) -> Option<ProjectDecl> {
        self.expect(TokenKind::Project, "`project`")?;
        let name = self.expect_string("project name")?;
        let mut decl = ProjectDecl {
            name,
            ..ProjectDecl::default()
        };
        if self.accept(TokenKind::Version).is_some() {
            decl.version = self.expect_string("project version");
        }
        if self.expect(TokenKind::Colon, "`:` after project header").is_none() {
            self.sync_to_line_end();
            return Some(decl);
        }
        self.accept(TokenKind::Newline);
        if self.expect(TokenKind::Indent, "an indented project block").is_none() {
            return Some(decl);
        }

        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Dedent | TokenKind::Eof => {
                    self.advance();
                    break;
                }
                TokenKind::Set => self.parse_project_setting(&mut decl),
                TokenKind::Include => self.parse_include(&mut decl),
                TokenKind::Shell => self.parse_shell_config(&mut decl),
                TokenKind::Before | TokenKind::After => self.parse_task_hook(&mut decl),
                TokenKind::Setup => {
                    self.advance();
                    let body = self.parse_block();
                    decl.hooks.push(HookDecl {
                        kind: HookKind::Setup,
                        body,
                    });
                }
                TokenKind::Teardown => {
                    self.advance();
                    let body = self.parse_block();
                    decl.hooks.push(HookDecl {
                        kind: HookKind::Teardown,
                        body,
                    });
                }
                _ if self.at_word("snippet") => {
                    self.advance();
                    if let Some(name) = self.expect_string("snippet name") {
                        let body = self.parse_block();
                        decl.snippets.push(SnippetDecl { name, body });
                    } else {
                        self.sync_to_line_end();
                    }
                }
                _ if self.at_word("template") => {
                    self.advance();
                    if let Some(name) = self.expect_string("template name") {
                        let body = self.parse_block();
                        decl.templates.push(TemplateDecl { name, body });
                    } else {
                        self.sync_to_line_end();
                    }
                }
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
                    self.error_here("expected a project setting");
                    self.advance();
                }
            }
        }
        Some(decl)
    }

    /// `set <key> to "<value>"`.
    fn parse_project_setting(&mut self, decl: &mut ProjectDecl) {
        self.advance();
        let Some(key) = self.expect_word("setting name") else {
            self.sync_to_line_end();
            return;
        };
        if self.expect(TokenKind::To, "`to`").is_none() {
            self.sync_to_line_end();
            return;
        }
        if let Some(value) = self.expect_string("setting value") {
            decl.settings.push((key, value));
        }
        self.sync_to_line_end();
    }

    /// `include "<path>" [as <namespace>]`.
    fn parse_include(&mut self, decl: &mut ProjectDecl) {
        self.advance();
        let Some(path) = self.expect_string("include path") else {
            self.sync_to_line_end();
            return;
        };
        let namespace = if self.accept(TokenKind::As).is_some() {
            self.expect_word("include namespace")
        } else {
            None
        };
        decl.includes.push(IncludeDecl { path, namespace });
        self.sync_to_line_end();
    }

    /// `shell config for <platform>:` with executable/arg/env lines.
    fn parse_shell_config(&mut self, decl: &mut ProjectDecl) {
        self.advance();
        if !self.accept_word("config") {
            self.error_here("expected `config` after `shell`");
            self.sync_to_line_end();
            return;
        }
        if self.expect(TokenKind::For, "`for`").is_none() {
            self.sync_to_line_end();
            return;
        }
        let Some(platform) = self.expect_word("platform name") else {
            self.sync_to_line_end();
            return;
        };
        let mut config = ShellConfigDecl {
            platform,
            ..ShellConfigDecl::default()
        };
        if self.expect(TokenKind::Colon, "`:`").is_none() {
            self.sync_to_line_end();
            return;
        }
        self.accept(TokenKind::Newline);
        if self.expect(TokenKind::Indent, "an indented shell config block").is_none() {
            decl.shell_configs.push(config);
            return;
        }
        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Dedent | TokenKind::Eof => {
                    self.advance();
                    break;
                }
                _ if self.at_word("executable") => {
                    self.advance();
                    config.executable = self.expect_string("executable path");
                    self.sync_to_line_end();
                }
                _ if self.at_word("arg") => {
                    self.advance();
                    if let Some(arg) = self.expect_string("shell argument") {
                        config.args.push(arg);
                    }
                    self.sync_to_line_end();
                }
                _ if self.at_word("env") => {
                    self.advance();
                    let key = self.expect_string("environment variable name");
                    let value = self.expect_string("environment variable value");
                    if let (Some(key), Some(value)) = (key, value) {
                        config.env.push((key, value));
                    }
                    self.sync_to_line_end();
                }
                _ => {
                    self.error_here("expected `executable`, `arg`, or `env`");
                    self.sync_to_line_end();
                }
            }
        }
        decl.shell_configs.push(config);
    }

    /// `before any task:` / `after any task:` lifecycle hooks.
    fn parse_task_hook(&mut self, decl: &mut ProjectDecl) {
        let kind = if self.check(TokenKind::Before) {
            HookKind::BeforeTask
        } else {
            HookKind::AfterTask
        };
        self.advance();
        if self.expect(TokenKind::Any, "`any`").is_none()
            || self.expect(TokenKind::Task, "`task`").is_none()
        {
            self.sync_to_line_end();
            return;
        }
        let body = self.parse_block();
        decl.hooks.push(HookDecl { kind, body });
    }

    /// `task "<name>" [means "<desc>"]:` with parameters, dependencies,
    /// matrix declarations, and body statements.
    pub(crate) fn parse_task_decl(&mut self) -> Option<TaskDecl> {
        let header = self.expect(TokenKind::Task, "`task`")?;
        let name = self.expect_string("task name")?;
        let mut task = TaskDecl {
            name,
            line: header.line,
            ..TaskDecl::default()
        };
        if self.accept(TokenKind::Means).is_some() {
            task.description = self.expect_string("task description");
        }
        if self.expect(TokenKind::Colon, "`:` after task header").is_none() {
            self.sync_to_line_end();
            return Some(task);
        }
        self.accept(TokenKind::Newline);
        if self.expect(TokenKind::Indent, "an indented task body").is_none() {
            return Some(task);
        }

        loop {
            self.skip_newlines();
            match self.current().kind {
                TokenKind::Dedent | TokenKind::Eof => {
                    self.advance();
                    break;
                }
                TokenKind::Requires | TokenKind::Given | TokenKind::Accepts => {
                    if let Some(param) = self.parse_param_decl() {
                        task.parameters.push(param);
                    }
                }
                TokenKind::Depends => self.parse_dependency_decl(&mut task),
                _ if self.at_word("matrix") => self.parse_matrix_decl(&mut task),
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
                        task.body.push(stmt);
                    }
                }
            }
        }
        Some(task)
    }

    /// Parameter declaration with optional type and constraint clauses.
    pub(crate) fn parse_param_decl(&mut self) -> Option<ParamDecl> {
        let kind = match self.current().kind {
            TokenKind::Requires => ParamKindDecl::Requires,
            TokenKind::Given => ParamKindDecl::Given,
            TokenKind::Accepts => ParamKindDecl::Accepts,
            _ => return None,
        };
        self.advance();
        let name = self.expect_word("parameter name")?;
        let mut param = ParamDecl {
            name,
            kind,
            ..ParamDecl::default()
        };

        loop {
            match self.current().kind {
                TokenKind::Newline | TokenKind::Eof | TokenKind::Dedent => break,
                TokenKind::As => {
                    self.advance();
                    param.data_type = self.parse_data_type();
                }
                TokenKind::Defaults => {
                    self.advance();
                    if self.expect(TokenKind::To, "`to` after `defaults`").is_none() {
                        self.sync_to_line_end();
                        break;
                    }
                    param.default = match self.current().kind {
                        TokenKind::StringLit | TokenKind::NumberLit => {
                            Some(self.advance().literal)
                        }
                        TokenKind::True | TokenKind::False => Some(self.advance().literal),
                        _ => {
                            self.error_here("expected a default value");
                            None
                        }
                    };
                }
                TokenKind::From => {
                    self.advance();
                    param.constraints = self.parse_string_list();
                }
                TokenKind::Matches => {
                    // `matching` reads better, but accept the reserved
                    // word too since users reach for it.
                    self.advance();
                    self.parse_matching_clause(&mut param);
                }
                _ if self.at_word("matching") => {
                    self.advance();
                    self.parse_matching_clause(&mut param);
                }
                _ if self.at_word("between") => {
                    self.advance();
                    let min = self.expect_number("minimum value");
                    if self.expect(TokenKind::And, "`and`").is_none() {
                        self.sync_to_line_end();
                        break;
                    }
                    let max = self.expect_number("maximum value");
                    param.min = min.and_then(|v| v.parse().ok());
                    param.max = max.and_then(|v| v.parse().ok());
                }
                _ if self.at_word("variadic") => {
                    self.advance();
                    param.variadic = true;
                }
                _ => {
                    self.error_here("unexpected token in parameter declaration");
                    self.sync_to_line_end();
                    return Some(param);
                }
            }
        }
        self.accept(TokenKind::Newline);
        Some(param)
    }

    /// `string | number | boolean | list [of <scalar>]`.
    fn parse_data_type(&mut self) -> Option<String> {
        match self.current().kind {
            TokenKind::StringType => {
                self.advance();
                Some("string".to_string())
            }
            TokenKind::NumberType => {
                self.advance();
                Some("number".to_string())
            }
            TokenKind::BooleanType => {
                self.advance();
                Some("boolean".to_string())
            }
            TokenKind::List => {
                self.advance();
                if self.accept(TokenKind::Of).is_some() {
                    // Element type is documentation; values stay strings
                    // at run time.
                    self.expect_word("list element type");
                }
                Some("list".to_string())
            }
            _ => {
                self.error_here("expected `string`, `number`, `boolean`, or `list`");
                None
            }
        }
    }

    /// Clause after `matching`: a pattern literal, the email flag, or a
    /// named macro.
    fn parse_matching_clause(&mut self, param: &mut ParamDecl) {
        if self.accept(TokenKind::Pattern).is_some() {
            param.pattern = self.expect_string("pattern regex");
            return;
        }
        if self.at_word("email") {
            self.advance();
            self.accept_word("format");
            param.email_format = true;
            return;
        }
        match self.word() {
            Some(name) => param.pattern_macro = Some(name),
            None => self.error_here("expected `pattern`, `email format`, or a macro name"),
        }
    }

    /// `depends on a, b and c then d`: comma edges are parallel,
    /// `and`/`then` edges sequential; items may carry `in parallel`.
    fn parse_dependency_decl(&mut self, task: &mut TaskDecl) {
        self.advance();
        if self.expect(TokenKind::On, "`on` after `depends`").is_none() {
            self.sync_to_line_end();
            return;
        }
        let mut sequential = false;
        loop {
            let name = match self.current().kind {
                TokenKind::StringLit => self.advance().literal,
                _ if self.current().is_word() => self.advance().literal,
                _ => {
                    self.error_here("expected a dependency name");
                    self.sync_to_line_end();
                    return;
                }
            };
            let mut parallel_marked = false;
            if self.check(TokenKind::In) && self.peek(1).kind == TokenKind::Parallel {
                self.advance();
                self.advance();
                parallel_marked = true;
            }
            task.dependencies.push(DependencyItem {
                name,
                sequential,
                parallel_marked,
            });
            match self.current().kind {
                TokenKind::Comma => {
                    self.advance();
                    sequential = false;
                }
                TokenKind::And | TokenKind::Then => {
                    self.advance();
                    sequential = true;
                }
                _ => break,
            }
        }
        self.accept(TokenKind::Newline);
    }

    /// `matrix <key> from ["a", "b"]`.
    fn parse_matrix_decl(&mut self, task: &mut TaskDecl) {
        self.advance();
        let Some(key) = self.expect_word("matrix key") else {
            self.sync_to_line_end();
            return;
        };
        if self.expect(TokenKind::From, "`from`").is_none() {
            self.sync_to_line_end();
            return;
        }
        let values = self.parse_string_list();
        task.matrix.push(MatrixDecl { key, values });
        self.accept(TokenKind::Newline);
    }
}

#[cfg(test)]
mod tests {
    use super::super::parse;
    use super::*;

    #[test]
    fn test_project_decl() {
        let source = r#"version: 2.0
project "shop" version "1.2":
    set registry to "ghcr.io/acme"
    include "ci/common.drv" as ci
    shell config for linux:
        executable "/bin/bash"
        arg "--noprofile"
        env "CI" "true"
    before any task:
        info "starting"
    teardown:
        info "bye"
    snippet "announce":
        info "release"
    template "svc":
        info "deploy {service}"

task "noop":
    info "x"
"#;
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let project = program.project.unwrap();
        assert_eq!(project.name, "shop");
        assert_eq!(project.version.as_deref(), Some("1.2"));
        assert_eq!(project.settings, vec![("registry".into(), "ghcr.io/acme".into())]);
        assert_eq!(project.includes.len(), 1);
        assert_eq!(project.includes[0].namespace.as_deref(), Some("ci"));
        assert_eq!(project.shell_configs.len(), 1);
        assert_eq!(project.shell_configs[0].args, vec!["--noprofile"]);
        assert_eq!(project.hooks.len(), 2);
        assert_eq!(project.snippets.len(), 1);
        assert_eq!(project.templates.len(), 1);
    }

    #[test]
    fn test_param_decls() {
        let source = r#"version: 2.0
task "deploy":
    requires env from ["dev", "prod"]
    given tag defaults to "latest"
    given replicas as number defaults to "2" between 1 and 10
    accepts flags as list
    requires release matching semver
    requires contact matching email format
    requires build_id matching pattern "^[a-z0-9-]+$"
    accepts targets variadic
    info "ok"
"#;
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let task = &program.tasks[0];
        assert_eq!(task.parameters.len(), 8);
        assert_eq!(task.parameters[0].constraints, vec!["dev", "prod"]);
        assert_eq!(task.parameters[1].default.as_deref(), Some("latest"));
        assert_eq!(task.parameters[2].min, Some(1.0));
        assert_eq!(task.parameters[2].max, Some(10.0));
        assert_eq!(task.parameters[2].data_type.as_deref(), Some("number"));
        assert_eq!(task.parameters[3].data_type.as_deref(), Some("list"));
        assert_eq!(task.parameters[4].pattern_macro.as_deref(), Some("semver"));
        assert!(task.parameters[5].email_format);
        assert_eq!(
            task.parameters[6].pattern.as_deref(),
            Some("^[a-z0-9-]+$")
        );
        assert!(task.parameters[7].variadic);
        assert_eq!(task.body.len(), 1);
    }

    #[test]
    fn test_dependency_edges() {
        let source = "version: 2.0\ntask \"d\":\n    depends on build and test, lint then package\n    info \"x\"\n";
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let deps = &program.tasks[0].dependencies;
        let names: Vec<_> = deps.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["build", "test", "lint", "package"]);
        // First edge has no preceding separator.
        assert!(!deps[0].sequential);
        assert!(deps[1].sequential); // and
        assert!(!deps[2].sequential); // comma
        assert!(deps[3].sequential); // then
    }

    #[test]
    fn test_matrix_decl() {
        let source = "version: 2.0\ntask \"deploy\":\n    matrix region from [\"us\", \"eu\"]\n    matrix env from [\"dev\", \"prod\"]\n    info \"x\"\n";
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        let task = &program.tasks[0];
        assert_eq!(task.matrix.len(), 2);
        assert_eq!(task.matrix[0].key, "region");
        assert_eq!(task.matrix[1].values, vec!["dev", "prod"]);
    }

    #[test]
    fn test_dependency_in_parallel_suffix() {
        let source = "version: 2.0\ntask \"d\":\n    depends on build in parallel, test\n    info \"x\"\n";
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        assert!(program.tasks[0].dependencies[0].parallel_marked);
        assert!(!program.tasks[0].dependencies[1].parallel_marked);
    }

    #[test]
    fn test_keyword_parameter_names_allowed() {
        // `env` and `tag` are reserved words but legal as parameter names.
        let source = "version: 2.0\ntask \"t\":\n    requires env\n    given tag defaults to \"latest\"\n    info \"x\"\n";
        let (program, errors) = parse(source);
        assert!(errors.is_empty(), "{errors:?}");
        assert_eq!(program.tasks[0].parameters[0].name, "env");
        assert_eq!(program.tasks[0].parameters[0].kind, ParamKindDecl::Requires);
        assert_eq!(program.tasks[0].parameters[1].name, "tag");
    }
}
