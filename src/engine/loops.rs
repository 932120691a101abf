//! Loop execution: sequential iteration and the parallel worker pool.
//!
//! Parallel loops follow a producer/worker/collector shape: a bounded
//! work channel feeds up to `max_workers` workers, each executing the
//! body in an isolated child context and reporting `{index, item,
//! error, duration}` on a result channel. Results are collected by
//! original index, so output is deterministic regardless of completion
//! order. Fail-fast raises a cancel flag that makes workers drain the
//! remaining queue without executing it.

use super::context::ExecutionContext;
use super::error::EngineError;
use super::{Engine, Flow};
use crate::model::{Filter, FilterOp, Iterable, LoopSpec, split_list};
use regex::Regex;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tracing::debug;

/// Worker count when `with N workers` is not given.
const DEFAULT_PARALLEL_WORKERS: usize = 5;

/// One iteration outcome, reported on the result channel.
#[derive(Debug)]
struct WorkerResult {
    index: usize,
    item: String,
    error: Option<EngineError>,
    duration: Duration,
    skipped: bool,
}

impl Engine {
    pub(super) async fn execute_loop(
        &self,
        spec: &LoopSpec,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let items = self.resolve_items(&spec.iterable, ctx).await?;
        let items = self.apply_filter(items, spec, ctx)?;
        debug!(count = items.len(), parallel = spec.parallel, "loop items resolved");
        if spec.parallel {
            self.run_parallel(spec, items, ctx).await
        } else {
            self.run_sequential(spec, items, ctx).await
        }
    }

    async fn run_sequential(
        &self,
        spec: &LoopSpec,
        items: Vec<String>,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        for item in items {
            self.guard()?;
            let mut child = ctx.child();
            child.set_var(spec.loop_var.clone(), item);
            match self.execute_block(&spec.body, &mut child).await? {
                Flow::Break => break,
                Flow::Continue | Flow::Normal => {}
            }
        }
        Ok(Flow::Normal)
    }

    async fn run_parallel(
        &self,
        spec: &LoopSpec,
        items: Vec<String>,
        ctx: &mut ExecutionContext,
    ) -> Result<Flow, EngineError> {
        let total = items.len();
        if total == 0 {
            return Ok(Flow::Normal);
        }
        let workers = spec
            .max_workers
            .unwrap_or(DEFAULT_PARALLEL_WORKERS)
            .clamp(1, total);
        let fail_fast = spec.fail_fast;
        let body = Arc::new(spec.body.clone());
        let cancel = Arc::new(AtomicBool::new(false));

        let (work_tx, work_rx) = mpsc::channel::<(usize, String)>(workers);
        let work_rx = Arc::new(Mutex::new(work_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel::<WorkerResult>();

        // Producer: enqueue every item, then close the channel.
        let producer = tokio::spawn(async move {
            for pair in items.into_iter().enumerate() {
                if work_tx.send(pair).await.is_err() {
                    break;
                }
            }
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let engine = self.clone();
            let body = Arc::clone(&body);
            let loop_var = spec.loop_var.clone();
            let parent = ctx.child();
            let work_rx = Arc::clone(&work_rx);
            let result_tx = result_tx.clone();
            let cancel = Arc::clone(&cancel);
            handles.push(tokio::spawn(async move {
                loop {
                    let next = { work_rx.lock().await.recv().await };
                    let Some((index, item)) = next else {
                        break;
                    };
                    // On cancellation the queue is drained without
                    // executing, so the producer never blocks.
                    if cancel.load(Ordering::Relaxed)
                        || engine.cancel.load(Ordering::Relaxed)
                    {
                        let _ = result_tx.send(WorkerResult {
                            index,
                            item,
                            error: None,
                            duration: Duration::ZERO,
                            skipped: true,
                        });
                        continue;
                    }
                    let start = Instant::now();
                    let mut child = parent.child();
                    child.set_var(loop_var.clone(), item.clone());
                    let error = engine.execute_block(&body, &mut child).await.err();
                    if error.is_some() && fail_fast {
                        cancel.store(true, Ordering::Relaxed);
                    }
                    let _ = result_tx.send(WorkerResult {
                        index,
                        item,
                        error,
                        duration: start.elapsed(),
                        skipped: false,
                    });
                }
            }));
        }
        drop(result_tx);

        // Collect by original index; emit progress at 10% boundaries.
        let mut results: Vec<Option<WorkerResult>> = (0..total).map(|_| None).collect();
        let mut done = 0usize;
        let mut last_decile = 0usize;
        while let Some(result) = result_rx.recv().await {
            done += 1;
            if !result.skipped {
                debug!(
                    index = result.index,
                    ms = result.duration.as_millis() as u64,
                    ok = result.error.is_none(),
                    "iteration finished"
                );
            }
            let decile = done * 10 / total;
            if decile > last_decile {
                last_decile = decile;
                self.sink
                    .line(&format!("progress: {done}/{total} ({}%)", done * 100 / total));
            }
            let index = result.index;
            results[index] = Some(result);
        }
        producer.await.ok();
        futures::future::join_all(handles).await;

        let mut error_count = 0usize;
        let mut first_error = None;
        for result in results.into_iter().flatten() {
            if result.skipped {
                continue;
            }
            if let Some(error) = result.error {
                self.sink.line(&format!("✖ [{}] {error}", result.item));
                error_count += 1;
                if first_error.is_none() {
                    first_error = Some(error);
                }
            }
        }

        if fail_fast {
            if let Some(error) = first_error {
                return Err(error);
            }
        } else if error_count > 0 {
            self.sink
                .line(&format!("completed with {error_count} errors"));
            return Err(EngineError::LoopErrors { count: error_count });
        }
        Ok(Flow::Normal)
    }

    // ------------------------------------------------------------------
    // Iterables and filters
    // ------------------------------------------------------------------

    async fn resolve_items(
        &self,
        iterable: &Iterable,
        ctx: &ExecutionContext,
    ) -> Result<Vec<String>, EngineError> {
        match iterable {
            Iterable::Items(items) => items
                .iter()
                .map(|item| self.interpolator.interpolate(item, ctx))
                .collect(),
            Iterable::Ref(name) => {
                let raw = self.interpolator.resolve_ref(name, ctx)?;
                Ok(split_list(&raw))
            }
            Iterable::Range { start, end, step } => {
                let start = self.resolve_bound(start, ctx)?;
                let end = self.resolve_bound(end, ctx)?;
                let step = match step {
                    Some(step) => self.resolve_bound(step, ctx)?,
                    None => 1,
                };
                if step <= 0 {
                    return Err(EngineError::InvalidRange {
                        message: format!("step must be positive, got {step}"),
                    });
                }
                let mut items = Vec::new();
                if start <= end {
                    let mut i = start;
                    while i <= end {
                        items.push(i.to_string());
                        i += step;
                    }
                } else {
                    let mut i = start;
                    while i >= end {
                        items.push(i.to_string());
                        i -= step;
                    }
                }
                Ok(items)
            }
            Iterable::FileLines(path) => {
                let path = self.interpolator.interpolate(path, ctx)?;
                Ok(self.capabilities.file.read_lines(&path).await?)
            }
            Iterable::Matches { pattern, source } => {
                let pattern = self.interpolator.interpolate(pattern, ctx)?;
                let source = self.interpolator.interpolate(source, ctx)?;
                let regex = Regex::new(&pattern).map_err(|e| EngineError::InvalidRegex {
                    pattern: pattern.clone(),
                    message: e.to_string(),
                })?;
                // The source is a file when one exists at that path,
                // literal text otherwise.
                let haystack = if self.capabilities.file.exists(&source).await {
                    self.capabilities.file.read(&source).await?
                } else {
                    source
                };
                Ok(regex
                    .find_iter(&haystack)
                    .map(|m| m.as_str().to_string())
                    .collect())
            }
        }
    }

    fn resolve_bound(&self, raw: &str, ctx: &ExecutionContext) -> Result<i64, EngineError> {
        let resolved = if let Some(name) = raw.strip_prefix('$') {
            self.interpolator.resolve_ref(name, ctx)?
        } else {
            self.interpolator.interpolate(raw, ctx)?
        };
        resolved
            .trim()
            .parse::<f64>()
            .map(|n| n as i64)
            .map_err(|_| EngineError::InvalidRange {
                message: format!("`{resolved}` is not a number"),
            })
    }

    fn apply_filter(
        &self,
        items: Vec<String>,
        spec: &LoopSpec,
        ctx: &ExecutionContext,
    ) -> Result<Vec<String>, EngineError> {
        let Some(filter) = &spec.filter else {
            return Ok(items);
        };
        let wanted = self.resolve_filter_value(filter, ctx)?;
        let regex = match filter.op {
            FilterOp::Matches => Some(Regex::new(&wanted).map_err(|e| {
                EngineError::InvalidRegex {
                    pattern: wanted.clone(),
                    message: e.to_string(),
                }
            })?),
            _ => None,
        };

        let mut kept = Vec::new();
        for item in items {
            let mut child = ctx.child();
            child.set_var(spec.loop_var.clone(), item.clone());
            let subject = child.lookup(&filter.variable).unwrap_or_else(|| item.clone());
            let keep = match filter.op {
                FilterOp::Contains => subject.contains(&wanted),
                FilterOp::StartsWith => subject.starts_with(&wanted),
                FilterOp::EndsWith => subject.ends_with(&wanted),
                FilterOp::Matches => regex.as_ref().is_some_and(|r| r.is_match(&subject)),
                FilterOp::Eq => subject == wanted,
                FilterOp::NotEq => subject != wanted,
            };
            if keep {
                kept.push(item);
            }
        }
        Ok(kept)
    }

    fn resolve_filter_value(
        &self,
        filter: &Filter,
        ctx: &ExecutionContext,
    ) -> Result<String, EngineError> {
        if let Some(name) = filter.value.strip_prefix('$') {
            return self.interpolator.resolve_ref(name, ctx);
        }
        self.interpolator.interpolate(&filter.value, ctx)
    }
}
