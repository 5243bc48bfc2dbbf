// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution hooks (spec §4.6): synchronous observers fired at five points
//! around a pipeline run. Every hook receives an independent clone of the
//! current context — never the context the engine is about to mutate — and
//! may abort the run by returning an error.

use crate::error::EngineError;
use loom_core::SourceTrackedContext;
use std::sync::Arc;

type BeforeExecutionHook = Arc<dyn Fn(SourceTrackedContext) -> Result<(), String> + Send + Sync>;
type BeforeEachStepHook = Arc<dyn Fn(&str, SourceTrackedContext, bool) -> Result<(), String> + Send + Sync>;
type AfterEachStepHook = Arc<dyn Fn(&str, SourceTrackedContext) -> Result<(), String> + Send + Sync>;
type OnStepFailureHook = Arc<dyn Fn(&str, SourceTrackedContext, &str) -> Result<(), String> + Send + Sync>;
type AfterExecutionHook = Arc<dyn Fn(SourceTrackedContext) -> Result<(), String> + Send + Sync>;

/// A registration-ordered set of hook callbacks for one pipeline execution.
#[derive(Default, Clone)]
pub struct Hooks {
    before_execution: Vec<BeforeExecutionHook>,
    before_each_step: Vec<BeforeEachStepHook>,
    after_each_step: Vec<AfterEachStepHook>,
    on_step_failure: Vec<OnStepFailureHook>,
    after_execution: Vec<AfterExecutionHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fires once, before the first step runs (after invalidation).
    pub fn before_execution(mut self, hook: impl Fn(SourceTrackedContext) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.before_execution.push(Arc::new(hook));
        self
    }

    /// Fires before each step attempt; the `bool` reports whether the step
    /// will be skipped because its outputs are already present.
    pub fn before_each_step(
        mut self,
        hook: impl Fn(&str, SourceTrackedContext, bool) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.before_each_step.push(Arc::new(hook));
        self
    }

    /// Fires after a step commits its produced values.
    pub fn after_each_step(mut self, hook: impl Fn(&str, SourceTrackedContext) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.after_each_step.push(Arc::new(hook));
        self
    }

    /// Fires when a step's retry budget is exhausted or it is aborted by a
    /// retry filter, with the resulting error's message.
    pub fn on_step_failure(
        mut self,
        hook: impl Fn(&str, SourceTrackedContext, &str) -> Result<(), String> + Send + Sync + 'static,
    ) -> Self {
        self.on_step_failure.push(Arc::new(hook));
        self
    }

    /// Fires once, after every step has run (or been skipped) successfully.
    pub fn after_execution(mut self, hook: impl Fn(SourceTrackedContext) -> Result<(), String> + Send + Sync + 'static) -> Self {
        self.after_execution.push(Arc::new(hook));
        self
    }

    pub(crate) fn fire_before_execution(&self, ctx: &SourceTrackedContext) -> Result<(), EngineError> {
        for hook in &self.before_execution {
            hook(ctx.clone_for_hook()).map_err(EngineError::HookFailed)?;
        }
        Ok(())
    }

    pub(crate) fn fire_before_each_step(&self, step: &str, ctx: &SourceTrackedContext, skipped: bool) -> Result<(), EngineError> {
        for hook in &self.before_each_step {
            hook(step, ctx.clone_for_hook(), skipped).map_err(EngineError::HookFailed)?;
        }
        Ok(())
    }

    pub(crate) fn fire_after_each_step(&self, step: &str, ctx: &SourceTrackedContext) -> Result<(), EngineError> {
        for hook in &self.after_each_step {
            hook(step, ctx.clone_for_hook()).map_err(EngineError::HookFailed)?;
        }
        Ok(())
    }

    pub(crate) fn fire_on_step_failure(&self, step: &str, ctx: &SourceTrackedContext, message: &str) -> Result<(), EngineError> {
        for hook in &self.on_step_failure {
            hook(step, ctx.clone_for_hook(), message).map_err(EngineError::HookFailed)?;
        }
        Ok(())
    }

    pub(crate) fn fire_after_execution(&self, ctx: &SourceTrackedContext) -> Result<(), EngineError> {
        for hook in &self.after_execution {
            hook(ctx.clone_for_hook()).map_err(EngineError::HookFailed)?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "hooks_tests.rs"]
mod tests;
