// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The fluent pre-/post-execution façade (spec §4.8): binds a pipeline to a
//! context, runs a user setup block, executes, and exposes typed lookups
//! over the result.

use crate::error::EngineError;
use crate::hooks::Hooks;
use crate::pipeline::Pipeline;
use loom_core::{CoreError, Key, MutableView, PlainContext, SourceTrackedContext, VariableSet, VariableSetHandle};
use tracing::Instrument;

/// Entry point: bind a [`Pipeline`] and its declared [`VariableSetHandle`]
/// to a context, ready for a user setup block.
pub struct Executor;

impl Executor {
    /// Start preparing a run. `ctx` seeds the initial values; omit it to
    /// start from an empty context.
    pub fn prepare<'a, V: VariableSet>(
        vars: &'a VariableSetHandle<V>,
        pipeline: &'a Pipeline,
        ctx: Option<SourceTrackedContext>,
    ) -> PreparedExecution<'a, V> {
        PreparedExecution {
            vars,
            pipeline,
            ctx: ctx.unwrap_or_default(),
            hooks: Hooks::new(),
        }
    }
}

/// Pre-execution builder: seed/modify the context and register hooks before
/// running the pipeline.
pub struct PreparedExecution<'a, V: VariableSet> {
    vars: &'a VariableSetHandle<V>,
    pipeline: &'a Pipeline,
    ctx: SourceTrackedContext,
    hooks: Hooks,
}

impl<'a, V: VariableSet> PreparedExecution<'a, V> {
    /// Seed or modify the context through a typed view of the variable set.
    /// Values the closure sets are merged in with `source = None` (spec §3:
    /// null provenance marks externally seeded values).
    pub fn context<F>(mut self, f: F) -> Result<Self, EngineError>
    where
        F: FnOnce(&V, MutableView) -> Result<MutableView, CoreError>,
    {
        let base = self.ctx.snapshot_values();
        let view = MutableView::unrestricted(base);
        let view = f(self.vars.vars(), view)?;
        for (key_id, value) in view.into_pending() {
            self.ctx.set_erased(key_id, value, None);
        }
        Ok(self)
    }

    /// Register the hook callbacks fired during execution (spec §4.6).
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// Validate the seed context against the declared input shape (spec
    /// §4.4.3), then run the pipeline to completion.
    pub async fn execute(self) -> Result<Executed<'a, V>, EngineError> {
        let available: std::collections::HashSet<&str> = self.ctx.available_keys().map(|k| k.name).collect();
        if !self.vars.input_spec().is_satisfied(&available) {
            return Err(EngineError::InvalidInputShape);
        }

        let span = tracing::info_span!("pipeline_execute", pipeline = self.pipeline.id());
        let ctx = self.pipeline.run(self.ctx, &self.hooks).instrument(span).await?;
        Ok(Executed { vars: self.vars, ctx })
    }

    /// `execute()` composed with a full `serialize_pipeline` (spec §4.8):
    /// persistence runs only once the whole pipeline has succeeded.
    /// Per-step checkpointing is explicitly out of scope (spec §9).
    pub async fn execute_and_save(self, run_id: &str, store: &loom_storage::PersistenceStore) -> Result<Executed<'a, V>, EngineError> {
        let vars = self.vars;
        let pipeline = self.pipeline;
        let executed = self.execute().await?;
        let declared = pipeline.all_variables(true);
        store.serialize_pipeline(run_id, pipeline.id(), vars, declared, &executed.ctx)?;
        Ok(executed)
    }
}

/// Post-execution builder: typed lookups over the resulting context.
pub struct Executed<'a, V: VariableSet> {
    vars: &'a VariableSetHandle<V>,
    ctx: SourceTrackedContext,
}

impl<'a, V: VariableSet> Executed<'a, V> {
    /// Fetch one key, typed through a closure over the declared variable set.
    pub fn get<T, F>(&self, select: F) -> Result<T, EngineError>
    where
        F: FnOnce(&V) -> &Key<T>,
        T: Clone + 'static,
    {
        Ok(self.ctx.get(select(self.vars.vars()))?)
    }

    pub fn get_or_null<T, F>(&self, select: F) -> Option<T>
    where
        F: FnOnce(&V) -> &Key<T>,
        T: Clone + 'static,
    {
        self.ctx.get_or_null(select(self.vars.vars()))
    }

    /// Convenience for collecting several distinct keys of the same type in
    /// one call. Takes non-capturing fn pointers rather than a generic `F`
    /// so an array literal of distinct field-selector closures coerces to a
    /// single element type instead of failing to unify.
    pub fn multi<T>(&self, selectors: &[fn(&V) -> &Key<T>]) -> Result<Vec<T>, EngineError>
    where
        T: Clone + 'static,
    {
        selectors.iter().map(|select| self.get(select)).collect()
    }

    /// A read-only snapshot plus the variable set it's shaped by.
    pub fn vars(&self) -> (PlainContext, &'a VariableSetHandle<V>) {
        (self.ctx.to_plain(), self.vars)
    }

    /// The full source-tracked context plus the variable set it's shaped by.
    pub fn tracked(&self) -> (&SourceTrackedContext, &'a VariableSetHandle<V>) {
        (&self.ctx, self.vars)
    }

    /// Consume the builder, returning the raw source-tracked context (for
    /// persistence or further composition).
    pub fn into_tracked(self) -> SourceTrackedContext {
        self.ctx
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
