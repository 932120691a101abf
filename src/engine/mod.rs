//! Statement interpreter.
//!
//! Drives an [`ExecutionPlan`]: setup hooks, each task in order with its
//! before/after hooks, teardown at the end. Statements execute against a
//! per-task [`ExecutionContext`]; every side effect goes through the
//! capability bundle, which is also where dry-run mode short-circuits.
//!
//! Control flow (`break`/`continue`) is modeled as explicit [`Flow`]
//! values returned from statement execution, never as errors or
//! unwinding. Errors carry a classification used by `try/catch`.

pub mod condition;
pub mod context;
pub mod error;
pub mod interpolate;
pub mod loops;
pub mod pipeline;


pub use context::{ExecutionContext, HandledError};
pub use error::EngineError;
pub use interpolate::Interpolator;

use crate::capability::{
    Capabilities, CapabilityError, DownloadRequest, HttpAuth, HttpRequest, OutputSink,
    PermissionAssignment, ProbeKind, ShellRequest, compare_versions,
};
use crate::model::{
    ActionVerb, AuthNode, Detection, FileOp, NetworkAction, Project, SecretOp, Statement,
    ThrowKind, VarOp,
};
use crate::planner::{ExecutionPlan, TaskPlan};
use crate::registry::{TaskRegistry, validator};
use async_recursion::async_recursion;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine tunables.
#[derive(Debug, Clone, Copy, Default)]
pub struct EngineOptions {
    /// Announce side effects instead of performing them.
    pub dry_run: bool,
    /// Unknown `{name}` interpolations become errors.
    pub strict_interpolation: bool,
}

/// Result of one statement: continue normally, or unwind to the nearest
/// enclosing loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Normal,
    Break,
    Continue,
}

/// Outcome record for one executed task node.
#[derive(Debug, Clone)]
pub struct TaskRunRecord {
    pub name: String,
    pub duration: Duration,
    pub succeeded: bool,
}

/// Summary of a full run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub target: String,
    pub tasks: Vec<TaskRunRecord>,
}

/// The statement interpreter. Cheap to clone; parallel loop workers each
/// hold a clone.
#[derive(Clone)]
pub struct Engine {
    registry: Arc<TaskRegistry>,
    project: Arc<Project>,
    capabilities: Capabilities,
    sink: Arc<dyn OutputSink>,
    interpolator: Interpolator,
    options: EngineOptions,
    cancel: Arc<AtomicBool>,
}

impl Engine {
    pub fn new(
        registry: Arc<TaskRegistry>,
        project: Arc<Project>,
        capabilities: Capabilities,
        sink: Arc<dyn OutputSink>,
        options: EngineOptions,
    ) -> Self {
        let interpolator = Interpolator::new(
            Arc::clone(&capabilities.time),
            options.strict_interpolation,
        );
        Self {
            registry,
            project,
            capabilities,
            sink,
            interpolator,
            options,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Handle for external cancellation: setting the flag aborts new
    /// capability calls and unblocks parallel workers.
    pub fn cancel_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancel)
    }

    fn guard(&self) -> Result<(), EngineError> {
        if self.cancel.load(Ordering::Relaxed) {
            return Err(EngineError::Cancelled);
        }
        Ok(())
    }

    /// Emit the dry-run line for a side effect; returns true when the
    /// effect must be skipped.
    fn dry_run(&self, description: &str) -> bool {
        if self.options.dry_run {
            self.sink.line(&format!("[DRY RUN] {description}"));
            true
        } else {
            false
        }
    }

    // ------------------------------------------------------------------
    // Plan driver
    // ------------------------------------------------------------------

    /// Execute a plan. Initial parameters bind to the target task only;
    /// dependency tasks bind their declared defaults.
    pub async fn run_plan(
        &self,
        plan: &ExecutionPlan,
        initial_params: &HashMap<String, String>,
    ) -> Result<RunReport, EngineError> {
        let run_id = Uuid::new_v4();
        info!(run = %run_id, target = %plan.target, "starting run");

        let mut hook_ctx =
            ExecutionContext::new("setup", HashMap::new(), Arc::clone(&self.project));
        self.run_hooks(&plan.hooks.setup, &mut hook_ctx, true)
            .await?;

        let mut report = RunReport {
            run_id,
            target: plan.target.clone(),
            tasks: Vec::new(),
        };
        let result = self.run_tasks(plan, initial_params, &mut report).await;

        // Teardown runs on success, failure, and cancellation alike.
        let mut teardown_ctx =
            ExecutionContext::new("teardown", HashMap::new(), Arc::clone(&self.project));
        self.run_hooks(&plan.hooks.teardown, &mut teardown_ctx, false)
            .await
            .ok();

        result.map(|()| report)
    }

    async fn run_tasks(
        &self,
        plan: &ExecutionPlan,
        initial_params: &HashMap<String, String>,
        report: &mut RunReport,
    ) -> Result<(), EngineError> {
        let empty = HashMap::new();
        for node_name in &plan.execution_order {
            let Some(node) = plan.task(node_name) else {
                continue;
            };
            let is_target =
                node.task_name == plan.target || node.name == plan.target;
            let provided = if is_target { initial_params } else { &empty };

            let start = Instant::now();
            let result = self.run_task_node(node, provided, &plan.hooks).await;
            report.tasks.push(TaskRunRecord {
                name: node.name.clone(),
                duration: start.elapsed(),
                succeeded: result.is_ok(),
            });
            result.map_err(|e| e.in_task(&node.name))?;
        }
        Ok(())
    }

    async fn run_task_node(
        &self,
        node: &TaskPlan,
        provided: &HashMap<String, String>,
        hooks: &crate::model::Hooks,
    ) -> Result<(), EngineError> {
        debug!(task = %node.name, "executing task");
        let bound = validator::bind_parameter_list(&node.name, &node.parameters, provided)?;
        let mut ctx = ExecutionContext::new(&node.name, bound, Arc::clone(&self.project));
        for (key, value) in &node.matrix_context {
            ctx.set_var(key.clone(), value.clone());
        }

        let mut before_ctx = ctx.child();
        self.run_hooks(&hooks.before_task, &mut before_ctx, true)
            .await?;

        let result = self.execute_block(&node.body, &mut ctx).await.map(|_| ());

        // After hooks are best-effort, even when the body failed.
        let mut after_ctx = ctx.child();
        self.run_hooks(&hooks.after_task, &mut after_ctx, false)
            .await
            .ok();

        result
    }

    /// Run a hook statement list. Fail-fast hooks propagate the first
    /// error; best-effort hooks log and continue.
    async fn run_hooks(
        &self,
        hooks: &[Statement],
        ctx: &mut ExecutionContext,
        fail_fast: bool,
    ) -> Result<(), EngineError> {
        for statement in hooks {
            match self.execute_statement(statement, ctx).await {
                Ok(_) => {}
                Err(e) if fail_fast => return Err(e),
                Err(e) => warn!(error = %e, "hook failed"),
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Statement execution
    // ------------------------------------------------------------------

    /// Execute a statement block, stopping at the first `break`/
    /// `continue` (returned to the enclosing loop) or error.
    #[async_recursion]
    pub async fn execute_block(
        &self,
        statements: &[Statement],
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        for statement in statements {
            match self.execute_statement(statement, ctx).await? {
                Flow::Normal => {}
                flow => return Ok(flow),
            }
        }
        Ok(Flow::Normal)
    }

    pub(crate) async fn execute_statement(
        &self,
        statement: &Statement,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        self.guard()?;
        let kind = statement.kind();
        self.dispatch(statement, ctx)
            .await
            .map_err(|e| e.in_statement(kind))
    }

    async fn dispatch(
        &self,
        statement: &Statement,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        match statement {
            Statement::Action { verb, message } => self.exec_action(*verb, message, ctx),
            Statement::Shell {
                command,
                capture_var,
                stream_output,
                ..
            } => {
                self.exec_shell(command, capture_var.as_deref(), *stream_output, ctx)
                    .await
            }
            Statement::Variable { op, name, value } => self.exec_variable(*op, name, value, ctx),
            Statement::Conditional {
                condition,
                body,
                else_body,
            } => {
                if condition::evaluate(condition, ctx, &self.interpolator)? {
                    self.execute_block(body, ctx).await
                } else {
                    self.execute_block(else_body, ctx).await
                }
            }
            Statement::Loop(spec) => self.execute_loop(spec, ctx).await,
            Statement::Try {
                try_body,
                catches,
                finally_body,
            } => self.exec_try(try_body, catches, finally_body, ctx).await,
            Statement::Throw { kind, message } => self.exec_throw(*kind, message, ctx),
            Statement::Break { condition } => {
                self.flow_if(condition.as_deref(), Flow::Break, ctx)
            }
            Statement::Continue { condition } => {
                self.flow_if(condition.as_deref(), Flow::Continue, ctx)
            }
            Statement::TaskCall { task, args } => self.exec_task_call(task, args, ctx).await,
            Statement::TaskFromTemplate {
                name,
                template,
                overrides,
            } => self.exec_template(name, template, overrides, ctx).await,
            Statement::Docker {
                operation,
                resource,
                name,
                options,
            } => {
                self.exec_docker(operation, resource.as_deref(), name.as_deref(), options, ctx)
                    .await
            }
            Statement::Git {
                operation,
                target,
                options,
            } => self.exec_git(operation, target.as_deref(), options, ctx).await,
            Statement::Http(spec) => self.exec_http(spec, ctx).await,
            Statement::Download(spec) => self.exec_download(spec, ctx).await,
            Statement::Network {
                action,
                target,
                port,
                timeout_secs,
                capture_var,
            } => {
                self.exec_network(*action, target, *port, *timeout_secs, capture_var.as_deref(), ctx)
                    .await
            }
            Statement::File {
                op,
                path,
                dest,
                content,
                capture_var,
            } => {
                self.exec_file(
                    *op,
                    path,
                    dest.as_deref(),
                    content.as_deref(),
                    capture_var.as_deref(),
                    ctx,
                )
                .await
            }
            Statement::Detection(detection) => self.exec_detection(detection, ctx).await,
            Statement::UseSnippet { name } => self.exec_snippet(name, ctx).await,
            Statement::Secret {
                op,
                key,
                value,
                capture_var,
            } => {
                self.exec_secret(*op, key, value.as_deref(), capture_var.as_deref(), ctx)
                    .await
            }
        }
    }

    fn exec_action(
        &self,
        verb: ActionVerb,
        message: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let message = self.interpolator.interpolate(message, ctx)?;
        let line = match verb {
            ActionVerb::Info => format!("ℹ {message}"),
            ActionVerb::Step => format!("→ {message}"),
            ActionVerb::Warn => format!("⚠ {message}"),
            ActionVerb::Error => format!("✖ {message}"),
            ActionVerb::Success => format!("✓ {message}"),
            ActionVerb::Fail => format!("✖ {message}"),
        };
        self.sink.line(&line);
        if verb == ActionVerb::Fail {
            return Err(EngineError::user(message));
        }
        Ok(Flow::Normal)
    }

    async fn exec_shell(
        &self,
        command: &str,
        capture_var: Option<&str>,
        stream_output: bool,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let command = self.interpolator.interpolate(command, ctx)?;
        if self.dry_run(&format!("shell: {command}")) {
            if let Some(var) = capture_var {
                ctx.set_var(var, "");
            }
            return Ok(Flow::Normal);
        }
        let mut request = ShellRequest::new(command);
        request.stream = stream_output;
        let outcome = self.capabilities.shell.execute(request).await?;
        if let Some(var) = capture_var {
            ctx.set_var(var, outcome.stdout.trim());
        }
        Ok(Flow::Normal)
    }

    fn exec_variable(
        &self,
        op: VarOp,
        name: &str,
        value: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let resolved = match op {
            VarOp::Let | VarOp::Set => pipeline::evaluate_expr(value, ctx, &self.interpolator)?,
            VarOp::Transform => {
                let current = ctx.lookup(name).unwrap_or_default();
                pipeline::evaluate_transform(&current, value, ctx, &self.interpolator)?
            }
        };
        ctx.set_var(name, resolved);
        Ok(Flow::Normal)
    }

    async fn exec_try(
        &self,
        try_body: &[Statement],
        catches: &[crate::model::CatchClause],
        finally_body: &[Statement],
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let handled = match self.execute_block(try_body, ctx).await {
            Ok(flow) => Ok(flow),
            Err(error) => {
                match catches
                    .iter()
                    .find(|c| error.matches_catch(c.error_type.as_deref()))
                {
                    Some(clause) => {
                        debug!(error = %error, "caught error");
                        let mut catch_ctx = ctx.child();
                        catch_ctx.handled_error = Some(HandledError {
                            classification: error.classification().to_string(),
                            message: error.to_string(),
                        });
                        if let Some(var) = &clause.error_var {
                            catch_ctx.set_var(var.clone(), error.to_string());
                        }
                        self.execute_block(&clause.body, &mut catch_ctx).await
                    }
                    None => Err(error),
                }
            }
        };

        // Finally always runs; its error supersedes the body's outcome.
        if !finally_body.is_empty() {
            let mut finally_ctx = ctx.child();
            self.execute_block(finally_body, &mut finally_ctx).await?;
        }
        handled
    }

    fn exec_throw(
        &self,
        kind: ThrowKind,
        message: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        match kind {
            ThrowKind::Throw => {
                let message = self.interpolator.interpolate(message, ctx)?;
                Err(EngineError::user(message))
            }
            ThrowKind::Rethrow => match &ctx.handled_error {
                Some(handled) => Err(EngineError::user(handled.message.clone())),
                None => Err(EngineError::RethrowOutsideCatch),
            },
            ThrowKind::Ignore => {
                ctx.handled_error = None;
                Ok(Flow::Normal)
            }
        }
    }

    fn flow_if(
        &self,
        condition: Option<&str>,
        flow: Flow,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        match condition {
            Some(condition) => {
                if condition::evaluate(condition, ctx, &self.interpolator)? {
                    Ok(flow)
                } else {
                    Ok(Flow::Normal)
                }
            }
            None => Ok(flow),
        }
    }

    /// `call task` executes the callee's body in a fresh context; hooks
    /// are not re-run for internal calls.
    async fn exec_task_call(
        &self,
        task: &str,
        args: &[(String, String)],
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let task_name = self.interpolator.interpolate(task, ctx)?;
        let callee = self.registry.get(&task_name)?;
        let mut provided = HashMap::new();
        for (key, value) in args {
            provided.insert(key.clone(), self.interpolator.interpolate(value, ctx)?);
        }
        let bound = validator::bind_parameters(callee.as_ref(), &provided)?;
        let mut callee_ctx =
            ExecutionContext::new(callee.full_name(), bound, Arc::clone(&self.project));
        self.execute_block(&callee.body, &mut callee_ctx)
            .await
            .map(|_| Flow::Normal)
            .map_err(|e| e.in_task(&callee.full_name()))
    }

    /// Instantiate a project template with overrides bound as variables.
    async fn exec_template(
        &self,
        name: &str,
        template: &str,
        overrides: &[(String, String)],
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let body = self
            .project
            .templates
            .get(template)
            .cloned()
            .ok_or_else(|| EngineError::UnknownTemplate {
                name: template.to_string(),
            })?;
        let task_name = self.interpolator.interpolate(name, ctx)?;
        let mut template_ctx =
            ExecutionContext::new(&task_name, HashMap::new(), Arc::clone(&self.project));
        for (key, value) in overrides {
            let value = self.interpolator.interpolate(value, ctx)?;
            template_ctx.set_var(key.clone(), value);
        }
        self.execute_block(&body, &mut template_ctx)
            .await
            .map(|_| Flow::Normal)
            .map_err(|e| e.in_task(&task_name))
    }

    async fn exec_docker(
        &self,
        operation: &str,
        resource: Option<&str>,
        name: Option<&str>,
        options: &[(String, String)],
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let name = match name {
            Some(n) => Some(self.interpolator.interpolate(n, ctx)?),
            None => None,
        };
        let options = self.interpolate_pairs(options, ctx)?;
        if self.dry_run(&format!(
            "docker {operation} {}",
            name.as_deref().unwrap_or_default()
        )) {
            return Ok(Flow::Normal);
        }
        self.capabilities
            .docker
            .run(operation, resource, name.as_deref(), &options)
            .await?;
        Ok(Flow::Normal)
    }

    async fn exec_git(
        &self,
        operation: &str,
        target: Option<&str>,
        options: &[(String, String)],
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let target = match target {
            Some(t) => Some(self.interpolator.interpolate(t, ctx)?),
            None => None,
        };
        let options = self.interpolate_pairs(options, ctx)?;
        if self.dry_run(&format!(
            "git {operation} {}",
            target.as_deref().unwrap_or_default()
        )) {
            return Ok(Flow::Normal);
        }
        self.capabilities
            .git
            .run(operation, target.as_deref(), &options)
            .await?;
        Ok(Flow::Normal)
    }

    async fn exec_http(
        &self,
        spec: &crate::model::HttpSpec,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let url = self.interpolator.interpolate(&spec.url, ctx)?;
        if self.dry_run(&format!("http {} {url}", spec.method)) {
            if let Some(var) = &spec.capture_var {
                ctx.set_var(var.clone(), "");
            }
            return Ok(Flow::Normal);
        }
        let mut headers = Vec::new();
        for header in &spec.headers {
            headers.push(self.interpolator.interpolate(header, ctx)?);
        }
        let body = match &spec.body {
            Some(body) => Some(self.interpolator.interpolate(body, ctx)?),
            None => None,
        };
        let request = HttpRequest {
            method: spec.method.clone(),
            url,
            headers,
            auth: self.resolve_auth(&spec.auth, ctx)?,
            body,
            timeout: spec.timeout_secs.map(Duration::from_secs),
            content_type: spec.content_type.clone(),
            accept: spec.accept.clone(),
        };
        let response = self.capabilities.http.request(request).await?;
        if !(200..300).contains(&response.status) {
            return Err(CapabilityError::HttpStatus {
                status: response.status,
            }
            .into());
        }
        if let Some(var) = &spec.capture_var {
            ctx.set_var(var.clone(), response.body.trim());
        }
        Ok(Flow::Normal)
    }

    async fn exec_download(
        &self,
        spec: &crate::model::DownloadSpec,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let url = self.interpolator.interpolate(&spec.url, ctx)?;
        let path = self.interpolator.interpolate(&spec.path, ctx)?;
        if !spec.allow_overwrite && self.capabilities.file.exists(&path).await {
            return Err(CapabilityError::Download(format!(
                "target `{path}` already exists (use `allow overwrite`)"
            ))
            .into());
        }
        if self.dry_run(&format!("download {url} -> {path}")) {
            return Ok(Flow::Normal);
        }
        let mut headers = Vec::new();
        for header in &spec.headers {
            headers.push(self.interpolator.interpolate(header, ctx)?);
        }
        let mut permissions = Vec::new();
        for perm in &spec.permissions {
            permissions.push(PermissionAssignment {
                mode: self.interpolator.interpolate(&perm.mode, ctx)?,
                target: self.interpolator.interpolate(&perm.target, ctx)?,
            });
        }
        let extract_to = match &spec.extract_to {
            Some(dir) => Some(self.interpolator.interpolate(dir, ctx)?),
            None => None,
        };
        let request = DownloadRequest {
            url,
            path,
            headers,
            auth: self.resolve_auth(&spec.auth, ctx)?,
            overwrite: spec.allow_overwrite,
            permissions,
            extract_to,
            remove_archive: spec.remove_archive,
        };
        self.capabilities.download.download(request).await?;
        Ok(Flow::Normal)
    }

    async fn exec_network(
        &self,
        action: NetworkAction,
        target: &str,
        port: Option<u16>,
        timeout_secs: Option<u64>,
        capture_var: Option<&str>,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let target = self.interpolator.interpolate(target, ctx)?;
        let kind = match action {
            NetworkAction::Ping => ProbeKind::Ping,
            NetworkAction::PortCheck => ProbeKind::PortCheck,
            NetworkAction::Health => ProbeKind::Health,
        };
        if self.dry_run(&format!("network probe: {target}")) {
            if let Some(var) = capture_var {
                ctx.set_var(var, "true");
            }
            return Ok(Flow::Normal);
        }
        let result = self
            .capabilities
            .network
            .probe(kind, &target, port, timeout_secs.map(Duration::from_secs))
            .await?;
        match capture_var {
            Some(var) => {
                ctx.set_var(var, if result.reachable { "true" } else { "false" });
            }
            None if !result.reachable => {
                return Err(CapabilityError::Network(format!("`{target}` is unreachable")).into());
            }
            None => {}
        }
        Ok(Flow::Normal)
    }

    async fn exec_file(
        &self,
        op: FileOp,
        path: &str,
        dest: Option<&str>,
        content: Option<&str>,
        capture_var: Option<&str>,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let path = self.interpolator.interpolate(path, ctx)?;
        let files = &self.capabilities.file;
        match op {
            FileOp::CreateFile => {
                if !self.dry_run(&format!("create file {path}")) {
                    files.create_file(&path).await?;
                }
            }
            FileOp::CreateDir => {
                if !self.dry_run(&format!("create dir {path}")) {
                    files.create_dir(&path).await?;
                }
            }
            FileOp::Copy | FileOp::Move => {
                let dest = self
                    .interpolator
                    .interpolate(dest.unwrap_or_default(), ctx)?;
                let verb = if op == FileOp::Copy { "copy" } else { "move" };
                if !self.dry_run(&format!("{verb} {path} -> {dest}")) {
                    if op == FileOp::Copy {
                        files.copy(&path, &dest).await?;
                    } else {
                        files.rename(&path, &dest).await?;
                    }
                }
            }
            FileOp::Delete => {
                if !self.dry_run(&format!("delete {path}")) {
                    files.delete(&path).await?;
                }
            }
            FileOp::Read => {
                let value = if self.dry_run(&format!("read {path}")) {
                    String::new()
                } else {
                    files.read(&path).await?
                };
                if let Some(var) = capture_var {
                    ctx.set_var(var, value.trim_end());
                }
            }
            FileOp::Write | FileOp::Append => {
                let content = self
                    .interpolator
                    .interpolate(content.unwrap_or_default(), ctx)?;
                let verb = if op == FileOp::Write { "write" } else { "append" };
                if !self.dry_run(&format!("{verb} {path}")) {
                    if op == FileOp::Write {
                        files.write(&path, &content).await?;
                    } else {
                        files.append(&path, &content).await?;
                    }
                }
            }
            FileOp::Exists => {
                let exists = files.exists(&path).await;
                if let Some(var) = capture_var {
                    ctx.set_var(var, if exists { "true" } else { "false" });
                }
            }
        }
        Ok(Flow::Normal)
    }

    async fn exec_detection(
        &self,
        detection: &Detection,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        match detection {
            Detection::Detect { tool, capture_var } => {
                let probe = self.capabilities.detect.detect(tool).await?;
                if !probe.available {
                    return Err(
                        CapabilityError::Detection(format!("tool `{tool}` not found")).into()
                    );
                }
                ctx.set_var(
                    capture_var.clone(),
                    probe.version.unwrap_or_else(|| "unknown".to_string()),
                );
                Ok(Flow::Normal)
            }
            Detection::DetectAvailable {
                alternatives,
                capture_var,
            } => {
                for tool in alternatives {
                    if self.capabilities.detect.detect(tool).await?.available {
                        ctx.set_var(capture_var.clone(), tool.clone());
                        return Ok(Flow::Normal);
                    }
                }
                Err(CapabilityError::Detection(format!(
                    "none of [{}] is available",
                    alternatives.join(", ")
                ))
                .into())
            }
            Detection::IfAvailable {
                tool,
                body,
                else_body,
            } => {
                let probe = self.capabilities.detect.detect(tool).await?;
                if probe.available {
                    self.execute_block(body, ctx).await
                } else {
                    self.execute_block(else_body, ctx).await
                }
            }
            Detection::IfVersion {
                tool,
                op,
                value,
                body,
                else_body,
            } => {
                let probe = self.capabilities.detect.detect(tool).await?;
                let satisfied = match &probe.version {
                    Some(version) if probe.available => {
                        let ordering = compare_versions(version, value);
                        match op.as_str() {
                            "==" => ordering.is_eq(),
                            "!=" => !ordering.is_eq(),
                            "<" => ordering.is_lt(),
                            "<=" => ordering.is_le(),
                            ">" => ordering.is_gt(),
                            ">=" => ordering.is_ge(),
                            _ => false,
                        }
                    }
                    _ => false,
                };
                if satisfied {
                    self.execute_block(body, ctx).await
                } else {
                    self.execute_block(else_body, ctx).await
                }
            }
            Detection::WhenEnvironment {
                environment,
                body,
                else_body,
            } => {
                if self.capabilities.detect.environment() == *environment {
                    self.execute_block(body, ctx).await
                } else {
                    self.execute_block(else_body, ctx).await
                }
            }
        }
    }

    /// Snippets execute in the caller's context so their variable writes
    /// are visible after the statement.
    async fn exec_snippet(
        &self,
        name: &str,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let body = self
            .project
            .snippets
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::UnknownSnippet {
                name: name.to_string(),
            })?;
        self.execute_block(&body, ctx).await
    }

    async fn exec_secret(
        &self,
        op: SecretOp,
        key: &str,
        value: Option<&str>,
        capture_var: Option<&str>,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let namespace = if self.project.name.is_empty() {
            "default".to_string()
        } else {
            self.project.name.clone()
        };
        let key = self.interpolator.interpolate(key, ctx)?;
        let secrets = &self.capabilities.secrets;
        match op {
            SecretOp::Get => {
                let value = secrets.get(&namespace, &key).await?;
                if let Some(var) = capture_var {
                    ctx.set_var(var, value);
                }
            }
            SecretOp::Set => {
                let value = self
                    .interpolator
                    .interpolate(value.unwrap_or_default(), ctx)?;
                if !self.dry_run(&format!("secret set {key}")) {
                    secrets.set(&namespace, &key, &value).await?;
                }
            }
            SecretOp::Delete => {
                if !self.dry_run(&format!("secret delete {key}")) {
                    secrets.delete(&namespace, &key).await?;
                }
            }
            SecretOp::Exists => {
                let exists = secrets.exists(&namespace, &key).await;
                if let Some(var) = capture_var {
                    ctx.set_var(var, if exists { "true" } else { "false" });
                }
            }
            SecretOp::List => {
                let keys = secrets.list(&namespace, &key).await;
                if let Some(var) = capture_var {
                    ctx.set_var(var, keys.join(" "));
                }
            }
        }
        Ok(Flow::Normal)
    }

    fn resolve_auth(
        &self,
        auth: &Option<AuthNode>,
        ctx: &ExecutionContext,
    ) -> Result<Option<HttpAuth>, EngineError> {
        Ok(match auth {
            Some(AuthNode::Bearer(token)) => {
                Some(HttpAuth::Bearer(self.interpolator.interpolate(token, ctx)?))
            }
            Some(AuthNode::Basic(credentials)) => Some(HttpAuth::Basic(
                self.interpolator.interpolate(credentials, ctx)?,
            )),
            Some(AuthNode::Token(value)) => {
                Some(HttpAuth::Token(self.interpolator.interpolate(value, ctx)?))
            }
            None => None,
        })
    }

    fn interpolate_pairs(
        &self,
        pairs: &[(String, String)],
        ctx: &ExecutionContext,
    ) -> Result<Vec<(String, String)>, EngineError> {
        pairs
            .iter()
            .map(|(key, value)| {
                Ok((key.clone(), self.interpolator.interpolate(value, ctx)?))
            })
            .collect()
    }
}
