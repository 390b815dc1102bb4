//! Stage graph execution engine.
//!
//! Executes stages as soon as every stage they read from has succeeded, so
//! independent stages run concurrently and a join waits for all of its inputs.

use super::{RunOptions, RunReport, StageReport, StageSpec};
use crate::context::{PipelineContext, StageContext, StageInputs};
use crate::core::StageOutput;
use crate::errors::{AnalystflowError, PipelineValidationError, StageError};
use crate::events::PipelineEvent;
use crate::records::StageKey;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

type StageTask = tokio::task::JoinHandle<Result<(usize, StageOutput), AnalystflowError>>;

/// A validated directed acyclic graph of stages.
///
/// Built by [`super::PipelineBuilder`]; edges run from the stage producing a
/// key to every stage declaring that key as an input.
#[derive(Debug, Clone)]
pub struct StageGraph {
    /// The pipeline name.
    name: String,
    /// Stage specifications in declaration order.
    stages: Vec<StageSpec>,
    /// Indices of the stages each stage reads from.
    deps: Vec<Vec<usize>>,
    /// Indices of the stages reading each stage's output.
    dependents: Vec<Vec<usize>>,
    /// Longest-path depth of each stage.
    levels: Vec<usize>,
}

impl StageGraph {
    /// Creates a graph from stages that already passed builder validation.
    pub(crate) fn new(name: String, stages: Vec<StageSpec>) -> Self {
        let producers: HashMap<StageKey, usize> = stages
            .iter()
            .enumerate()
            .map(|(idx, spec)| (spec.output, idx))
            .collect();

        let deps: Vec<Vec<usize>> = stages
            .iter()
            .map(|spec| {
                let mut deps: Vec<usize> = spec
                    .stage_inputs()
                    .filter_map(|key| producers.get(&key).copied())
                    .collect();
                deps.sort_unstable();
                deps.dedup();
                deps
            })
            .collect();

        let mut dependents = vec![Vec::new(); stages.len()];
        for (idx, stage_deps) in deps.iter().enumerate() {
            for &dep in stage_deps {
                dependents[dep].push(idx);
            }
        }

        let levels = compute_levels(&deps);

        Self {
            name,
            stages,
            deps,
            dependents,
            levels,
        }
    }

    /// Returns the pipeline name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of stages.
    #[must_use]
    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    /// Returns the stage names in declaration order.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&str> {
        self.stages.iter().map(|spec| spec.name.as_str()).collect()
    }

    /// Returns the stage with the given name.
    #[must_use]
    pub fn stage(&self, name: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|spec| spec.name == name)
    }

    /// Returns the stage writing `key`.
    #[must_use]
    pub fn producer_of(&self, key: StageKey) -> Option<&StageSpec> {
        self.stages.iter().find(|spec| spec.output == key)
    }

    /// Returns the execution waves.
    ///
    /// Stages in the same wave have no dependency on one another; each wave
    /// lists its stages in declaration order.
    #[must_use]
    pub fn waves(&self) -> Vec<Vec<String>> {
        let depth = self.levels.iter().copied().max().map_or(0, |max| max + 1);
        let mut waves = vec![Vec::new(); depth];
        for (spec, &level) in self.stages.iter().zip(&self.levels) {
            waves[level].push(spec.name.clone());
        }
        waves
    }

    /// Runs every stage of the graph against the context's run state.
    ///
    /// A failed stage never aborts its siblings; its dependents are reported
    /// as blocked. Stages whose outputs already hold records are skipped
    /// unless `options` asks for a re-run.
    ///
    /// # Errors
    ///
    /// Returns an error only for graph-level faults: a stage scheduled
    /// before its inputs existed, or a crashed stage task.
    pub async fn run(
        &self,
        ctx: &Arc<PipelineContext>,
        options: &RunOptions,
    ) -> Result<RunReport, AnalystflowError> {
        let span = tracing::info_span!("pipeline.run", pipeline = %self.name, run_id = %ctx.run_id());
        self.run_inner(ctx, options).instrument(span).await
    }

    async fn run_inner(
        &self,
        ctx: &Arc<PipelineContext>,
        options: &RunOptions,
    ) -> Result<RunReport, AnalystflowError> {
        let start = Instant::now();
        let run_id = ctx.run_id();
        ctx.emit(&PipelineEvent::RunStarted {
            run_id,
            pipeline: self.name.clone(),
            stages: self.stages.len(),
        });
        info!(stages = self.stages.len(), "Pipeline run started");

        let mut outputs: Vec<Option<StageOutput>> = vec![None; self.stages.len()];
        let mut remaining: Vec<usize> = self.deps.iter().map(Vec::len).collect();
        let mut active: FuturesUnordered<StageTask> = FuturesUnordered::new();

        for (idx, count) in remaining.iter().enumerate() {
            if *count == 0 {
                active.push(self.spawn_stage(idx, ctx, options));
            }
        }

        while let Some(joined) = active.next().await {
            let (idx, output) = match joined {
                Ok(Ok(done)) => done,
                Ok(Err(err)) => {
                    abort_all(&active);
                    return Err(err);
                }
                Err(join_err) => {
                    abort_all(&active);
                    return Err(AnalystflowError::Internal(format!(
                        "Stage task crashed: {join_err}"
                    )));
                }
            };

            let succeeded = output.is_success();
            outputs[idx] = Some(output);
            if !succeeded {
                continue;
            }

            for &child in &self.dependents[idx] {
                remaining[child] = remaining[child].saturating_sub(1);
                if remaining[child] == 0 {
                    active.push(self.spawn_stage(child, ctx, options));
                }
            }
        }

        self.settle_unscheduled(ctx, &mut outputs);

        let stages: Vec<StageReport> = self
            .stages
            .iter()
            .zip(outputs)
            .map(|(spec, output)| {
                StageReport::new(
                    spec.name.clone(),
                    spec.output,
                    output.unwrap_or_else(|| StageOutput::blocked(Vec::new())),
                )
            })
            .collect();

        let duration_ms = start.elapsed().as_secs_f64() * 1000.0;
        let report = RunReport {
            run_id,
            pipeline: self.name.clone(),
            stages,
            waves: self.waves(),
            duration_ms,
        };

        let complete = report.is_complete();
        ctx.emit(&PipelineEvent::RunCompleted {
            run_id,
            complete,
            duration_ms,
        });
        if complete {
            info!(duration_ms, "Pipeline run completed");
        } else {
            warn!(duration_ms, summary = %report.summary(), "Pipeline run incomplete");
        }

        Ok(report)
    }

    /// Runs a single stage by name, ignoring the rest of the graph.
    ///
    /// Used to reissue one stage explicitly; its inputs must already exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is unknown or an input is missing.
    pub async fn run_stage(
        &self,
        name: &str,
        ctx: &Arc<PipelineContext>,
        rerun: bool,
    ) -> Result<StageOutput, AnalystflowError> {
        let spec = self.stage(name).ok_or_else(|| {
            PipelineValidationError::new(format!("Unknown stage '{name}'"))
                .with_stages(vec![name.to_string()])
        })?;
        let span = tracing::info_span!("stage", stage = %spec.name, run_id = %ctx.run_id());
        execute_stage(spec, ctx, rerun, None).instrument(span).await
    }

    /// Runs a single stage by name on caller-supplied inputs.
    ///
    /// The run state is not consulted for inputs, so a stage can be reissued
    /// on corrected upstream data. The result is still written under the
    /// stage's output key.
    ///
    /// # Errors
    ///
    /// Returns an error if the stage is unknown, if `inputs` declare a
    /// different input list than the stage, or if a declared input is absent.
    pub async fn run_stage_with_inputs(
        &self,
        name: &str,
        ctx: &Arc<PipelineContext>,
        inputs: StageInputs,
        rerun: bool,
    ) -> Result<StageOutput, AnalystflowError> {
        let spec = self.stage(name).ok_or_else(|| {
            PipelineValidationError::new(format!("Unknown stage '{name}'"))
                .with_stages(vec![name.to_string()])
        })?;
        if inputs.declared() != spec.inputs.as_slice() {
            return Err(PipelineValidationError::new(format!(
                "Inputs for '{name}' declare {:?}, stage declares {:?}",
                inputs.declared(),
                spec.inputs
            ))
            .with_stages(vec![name.to_string()])
            .into());
        }
        inputs.ensure_complete()?;

        let span = tracing::info_span!("stage", stage = %spec.name, run_id = %ctx.run_id());
        execute_stage(spec, ctx, rerun, Some(inputs)).instrument(span).await
    }

    fn spawn_stage(
        &self,
        idx: usize,
        ctx: &Arc<PipelineContext>,
        options: &RunOptions,
    ) -> StageTask {
        let spec = self.stages[idx].clone();
        let ctx = Arc::clone(ctx);
        let rerun = options.should_rerun(spec.output);
        let span = tracing::info_span!("stage", stage = %spec.name);

        tokio::spawn(
            async move {
                execute_stage(&spec, &ctx, rerun, None)
                    .await
                    .map(|output| (idx, output))
            }
            .instrument(span),
        )
    }

    /// Marks every stage that never ran as cancelled or blocked.
    fn settle_unscheduled(&self, ctx: &PipelineContext, outputs: &mut [Option<StageOutput>]) {
        let cancelled = ctx.is_cancelled();

        for idx in 0..self.stages.len() {
            if outputs[idx].is_some() {
                continue;
            }
            let spec = &self.stages[idx];

            let output = if cancelled {
                let reason = cancel_reason(ctx);
                ctx.emit(&PipelineEvent::StageCancelled {
                    run_id: ctx.run_id(),
                    stage: spec.name.clone(),
                    reason: reason.clone(),
                });
                StageOutput::cancel(reason)
            } else {
                let waiting_on: Vec<String> = self.deps[idx]
                    .iter()
                    .filter(|&&dep| !outputs[dep].as_ref().is_some_and(StageOutput::is_success))
                    .map(|&dep| self.stages[dep].output.as_str().to_string())
                    .collect();
                debug!(stage = %spec.name, ?waiting_on, "Stage blocked");
                ctx.emit(&PipelineEvent::StageBlocked {
                    run_id: ctx.run_id(),
                    stage: spec.name.clone(),
                    waiting_on: waiting_on.clone(),
                });
                StageOutput::blocked(waiting_on)
            };

            outputs[idx] = Some(output);
        }
    }
}

/// Executes one stage: skip check, input snapshot, bounded call, write.
///
/// `provided` replaces the snapshot taken from the run state. The stage's guard is held from the skip check until the write, so two
/// runs sharing a run state never execute the same stage twice.
async fn execute_stage(
    spec: &StageSpec,
    ctx: &Arc<PipelineContext>,
    rerun: bool,
    provided: Option<StageInputs>,
) -> Result<StageOutput, AnalystflowError> {
    let run_id = ctx.run_id();
    let state = ctx.run_state();
    let guard = state.stage_guard(spec.output);
    let _held = guard.lock().await;

    if ctx.is_cancelled() {
        return Ok(cancelled(spec, ctx, cancel_reason(ctx)));
    }

    if !rerun && state.is_populated(spec.output) {
        let reason = format!("Output '{}' already exists", spec.output);
        debug!(output = %spec.output, "Skipping stage");
        ctx.emit(&PipelineEvent::StageSkipped {
            run_id,
            stage: spec.name.clone(),
            reason: reason.clone(),
        });
        return Ok(StageOutput::skip(reason, state.get(spec.output)));
    }

    let inputs = match provided {
        Some(inputs) => inputs,
        None => StageInputs::collect(&spec.name, &spec.inputs, state)?,
    };
    let stage_ctx = StageContext::new(Arc::clone(ctx), spec.name.clone(), inputs);

    ctx.emit(&PipelineEvent::StageStarted {
        run_id,
        stage: spec.name.clone(),
    });

    let start = Instant::now();
    let limit = ctx.stage_timeout();
    let result = tokio::select! {
        biased;
        () = ctx.cancellation().cancelled() => None,
        outcome = tokio::time::timeout(limit, spec.runner.execute(&stage_ctx)) => Some(outcome),
    };
    let duration_ms = start.elapsed().as_secs_f64() * 1000.0;

    let result = match result {
        None => return Ok(cancelled(spec, ctx, cancel_reason(ctx))),
        Some(Err(_elapsed)) => Err(StageError::timeout(&spec.name, limit)),
        Some(Ok(Err(StageError::Cancelled { reason, .. }))) => {
            return Ok(cancelled(spec, ctx, reason));
        }
        Some(Ok(outcome)) => outcome.and_then(|value| {
            if value.key() == spec.output {
                Ok(value)
            } else {
                Err(StageError::schema_violation(
                    &spec.name,
                    format!("Stage produced '{}' but declares '{}'", value.key(), spec.output),
                ))
            }
        }),
    };

    match result {
        Ok(value) => {
            let records = value.record_count();
            if rerun {
                state.replace(value.clone());
            } else {
                state.set(value.clone())?;
            }
            info!(records, duration_ms, "Stage completed");
            ctx.emit(&PipelineEvent::StageCompleted {
                run_id,
                stage: spec.name.clone(),
                records,
                duration_ms,
            });
            Ok(StageOutput::ok(value).with_duration(duration_ms))
        }
        Err(err) => {
            warn!(kind = %err.kind(), error = %err, "Stage failed");
            ctx.emit(&PipelineEvent::StageFailed {
                run_id,
                stage: spec.name.clone(),
                kind: err.kind(),
                error: err.to_string(),
                duration_ms,
            });
            Ok(StageOutput::fail(err).with_duration(duration_ms))
        }
    }
}

fn cancelled(spec: &StageSpec, ctx: &PipelineContext, reason: String) -> StageOutput {
    debug!(%reason, "Stage cancelled");
    ctx.emit(&PipelineEvent::StageCancelled {
        run_id: ctx.run_id(),
        stage: spec.name.clone(),
        reason: reason.clone(),
    });
    StageOutput::cancel(reason)
}

fn cancel_reason(ctx: &PipelineContext) -> String {
    ctx.cancellation()
        .reason()
        .unwrap_or_else(|| "Run cancelled".to_string())
}

fn abort_all(active: &FuturesUnordered<StageTask>) {
    for task in active.iter() {
        task.abort();
    }
}

fn compute_levels(deps: &[Vec<usize>]) -> Vec<usize> {
    fn level(idx: usize, deps: &[Vec<usize>], memo: &mut [Option<usize>]) -> usize {
        if let Some(known) = memo[idx] {
            return known;
        }
        let depth = deps[idx]
            .iter()
            .map(|&dep| level(dep, deps, memo) + 1)
            .max()
            .unwrap_or(0);
        memo[idx] = Some(depth);
        depth
    }

    let mut memo = vec![None; deps.len()];
    (0..deps.len()).map(|idx| level(idx, deps, &mut memo)).collect()
}
