// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The directed-acyclic step graph (spec §3/§4.4): topological scheduling,
//! invalidation of stale outputs, and the per-step execution algorithm.

use crate::error::EngineError;
use crate::hooks::Hooks;
use crate::retry::{self, RetryPolicy};
use crate::step::Step;
use loom_core::{KeyId, ShapeSpec, SourceTrackedContext, StepSource};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, error, warn};

/// An ordered set of steps, with an optional shared retry policy, whose
/// dependency graph (edge `A -> B` iff `A.produces() ∩ B.consumes() != ∅`)
/// must be acyclic (spec §3).
pub struct Pipeline {
    id: String,
    steps: Vec<Step>,
    /// Indices into `steps`, in topological (then declaration-index
    /// tie-break) order — computed once at build time (spec §4.4.1).
    order: Vec<usize>,
    retry: Option<RetryPolicy>,
}

impl Pipeline {
    pub fn builder(id: impl Into<String>) -> PipelineBuilder {
        PipelineBuilder::new(id.into())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Steps in declaration order (not execution order).
    pub fn steps(&self) -> &[Step] {
        &self.steps
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.retry.as_ref()
    }

    /// The union of every step's `consumes` (and, if requested, `produces`)
    /// — used by the persistence loader to decide what to load, and by
    /// `invalidate` to decide what to sweep.
    pub fn all_variables(&self, include_outputs: bool) -> HashSet<KeyId> {
        let mut keys = HashSet::new();
        for step in &self.steps {
            keys.extend(step.consumes().iter().cloned());
            if include_outputs {
                keys.extend(step.produces().iter().cloned());
            }
        }
        keys
    }

    /// Remove any context entry whose recorded `StepSource` no longer
    /// matches a fresh `hash_inputs` of its producing step (spec §4.2's
    /// `SourceTrackedContext::invalidate`). Walking steps in topological
    /// order means an upstream invalidation is visible (as a now-missing
    /// input) before a downstream step's own hash is recomputed, which is
    /// what makes invalidation cascade through the dependency graph.
    pub fn invalidate(&self, ctx: &mut SourceTrackedContext) {
        for &idx in &self.order {
            let step = &self.steps[idx];
            for key in step.produces() {
                let stale = match ctx.source_of(key) {
                    Some(Some(source)) if source.step == step.name() => {
                        step.hash_inputs(ctx) != source.input_hash
                    }
                    _ => false,
                };
                if stale {
                    debug!(pipeline = %self.id, step = step.name(), key = key.name, "invalidating stale output");
                    ctx.remove_erased(key);
                }
            }
        }
    }

    /// Run the pipeline to completion against `ctx`, returning the context
    /// with every executed or skipped step's writes committed (spec §4.4.2).
    pub async fn run(&self, mut ctx: SourceTrackedContext, hooks: &Hooks) -> Result<SourceTrackedContext, EngineError> {
        self.invalidate(&mut ctx);
        hooks.fire_before_execution(&ctx)?;

        for &idx in &self.order {
            let step = &self.steps[idx];
            let skip = step.produces().iter().all(|k| ctx.as_typed_map().contains_key(k));
            hooks.fire_before_each_step(step.name(), &ctx, skip)?;

            if skip {
                debug!(pipeline = %self.id, step = step.name(), "skipped: outputs already present and valid");
                continue;
            }
            debug!(pipeline = %self.id, step = step.name(), "executing");

            let base = ctx.snapshot_values();
            let consumes_set: HashSet<KeyId> = step.consumes().iter().cloned().collect();
            let produces_set: HashSet<KeyId> = step.produces().iter().cloned().collect();

            let attempt = retry::retry(self.retry.as_ref(), || {
                let view = loom_core::MutableView::new(base.clone(), Some(consumes_set.clone()), Some(produces_set.clone()));
                let step = step;
                async move { step.run(view).await }
            })
            .await;

            let view = match attempt {
                Ok(view) => view,
                Err(err) => {
                    let engine_err = EngineError::from_retry(err);
                    error!(pipeline = %self.id, step = step.name(), error = %engine_err, "step failed");
                    hooks.fire_on_step_failure(step.name(), &ctx, &engine_err.to_string())?;
                    return Err(engine_err);
                }
            };

            let missing: Vec<String> = step
                .produces()
                .iter()
                .filter(|k| !view.has_pending(k))
                .map(|k| k.name.to_string())
                .collect();
            if !missing.is_empty() {
                let err = EngineError::StepDidNotProduce(step.name().to_string(), missing);
                error!(pipeline = %self.id, step = step.name(), error = %err, "step did not produce its declared outputs");
                hooks.fire_on_step_failure(step.name(), &ctx, &err.to_string())?;
                return Err(err);
            }

            let step_hash = step.hash_inputs(&ctx);
            let source = Some(StepSource {
                step: step.name().to_string(),
                input_hash: step_hash,
            });
            for (key_id, value) in view.into_pending() {
                ctx.set_erased(key_id, value, source.clone());
            }

            hooks.fire_after_each_step(step.name(), &ctx)?;
        }

        hooks.fire_after_execution(&ctx)?;
        Ok(ctx)
    }
}

/// Builds a [`Pipeline`] from its steps, validating step-name uniqueness
/// and computing the topological order once up front.
pub struct PipelineBuilder {
    id: String,
    steps: Vec<Step>,
    retry: Option<RetryPolicy>,
}

impl PipelineBuilder {
    fn new(id: String) -> Self {
        Self {
            id,
            steps: Vec::new(),
            retry: None,
        }
    }

    pub fn step(mut self, step: Step) -> Self {
        self.steps.push(step);
        self
    }

    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn build(self) -> Result<Pipeline, EngineError> {
        let mut seen = HashSet::new();
        for step in &self.steps {
            if !seen.insert(step.name().to_string()) {
                return Err(EngineError::DuplicateStepName(step.name().to_string()));
            }
        }
        let order = topological_order(&self.steps)?;
        Ok(Pipeline {
            id: self.id,
            steps: self.steps,
            order,
            retry: self.retry,
        })
    }
}

/// Kahn's algorithm (spec §4.4.1) over the `consumes`/`produces` edge
/// relation. Ties among simultaneously-ready steps break on declaration
/// index — a `BTreeSet` queue pops its smallest index first, so this is
/// deterministic without any extra bookkeeping.
fn topological_order(steps: &[Step]) -> Result<Vec<usize>, EngineError> {
    let n = steps.len();
    let mut in_degree = vec![0usize; n];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); n];

    for (i, step) in steps.iter().enumerate() {
        for key in step.consumes() {
            for (j, producer) in steps.iter().enumerate() {
                if i != j && producer.produces().contains(key) {
                    dependents[j].push(i);
                    in_degree[i] += 1;
                }
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(i) = ready.pop_first() {
        order.push(i);
        for &j in &dependents[i] {
            in_degree[j] -= 1;
            if in_degree[j] == 0 {
                ready.insert(j);
            }
        }
    }

    if order.len() < n {
        warn!(total = n, emitted = order.len(), "pipeline dependency graph is cyclic");
        return Err(EngineError::CyclicPipeline);
    }
    Ok(order)
}

/// Simulate execution from `starting_keys` to count how many steps must run
/// before some option of `output_spec` is satisfied (spec §4.4.4). On each
/// iteration, picks the first not-yet-run step (by declaration order) whose
/// `consumes` are all available and — when `skip_satisfied` is set — that
/// would actually add something new.
pub fn count_steps_to_terminal(
    steps: &[Step],
    starting_keys: &HashSet<KeyId>,
    output_spec: &ShapeSpec,
    skip_satisfied: bool,
) -> Result<usize, EngineError> {
    let mut available = starting_keys.clone();
    let mut executed = vec![false; steps.len()];
    let mut count = 0usize;

    loop {
        let names: HashSet<&str> = available.iter().map(|k| k.name).collect();
        if output_spec.is_satisfied(&names) {
            return Ok(count);
        }

        let next = steps.iter().enumerate().find(|(i, step)| {
            !executed[*i]
                && step.consumes().iter().all(|k| available.contains(k))
                && (!skip_satisfied || step.produces().iter().any(|k| !available.contains(k)))
        });

        match next {
            Some((i, step)) => {
                executed[i] = true;
                available.extend(step.produces().iter().cloned());
                count += 1;
            }
            None => return Err(EngineError::Unreachable),
        }
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
