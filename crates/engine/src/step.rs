// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! A single unit of pipeline work: a named action over a restricted view of
//! the running context, plus the `consumes`/`produces` declaration the
//! scheduler and invalidation logic key off of.

use loom_core::{CoreError, Key, KeyId, MutableView, SourceTrackedContext};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use thiserror::Error;

/// The future a step's action returns: the mutated view, or a failure.
pub type StepFuture = Pin<Box<dyn Future<Output = Result<MutableView, StepError>> + Send>>;

type Action = Arc<dyn Fn(MutableView) -> StepFuture + Send + Sync>;

/// A step action's failure, either bubbled up from the context it was given
/// or raised directly by the action body.
#[derive(Debug, Error)]
pub enum StepError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("{0}")]
    Action(String),
}

impl StepError {
    /// Construct a plain message failure, for actions with no `CoreError` to wrap.
    pub fn msg(message: impl Into<String>) -> Self {
        StepError::Action(message.into())
    }
}

/// One node in a [`crate::Pipeline`]'s dependency graph.
///
/// A step declares the keys its action reads (`consumes`) and writes
/// (`produces`) up front; the pipeline derives scheduling order and
/// invalidation from those declarations rather than from inspecting the
/// action body.
pub struct Step {
    name: String,
    consumes: Vec<KeyId>,
    produces: Vec<KeyId>,
    action: Action,
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Step")
            .field("name", &self.name)
            .field("consumes", &self.consumes)
            .field("produces", &self.produces)
            .finish()
    }
}

impl Step {
    pub fn builder(name: impl Into<String>) -> StepBuilder {
        StepBuilder::new(name.into())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn consumes(&self) -> &[KeyId] {
        &self.consumes
    }

    pub fn produces(&self) -> &[KeyId] {
        &self.produces
    }

    /// Fingerprint of this step's consumed inputs as they stand in `ctx`
    /// right now (spec §4.1/§4.2): the structured-text encoding of each
    /// consumed key's current value, in declaration order, folded through
    /// the same stable hash `VariableSet::structural_hash` uses. A missing
    /// input hashes as JSON `null`.
    pub fn hash_inputs(&self, ctx: &SourceTrackedContext) -> u64 {
        let values: Vec<serde_json::Value> = self
            .consumes
            .iter()
            .map(|id| ctx.as_typed_map().get(id).map(|(v, _)| v.to_json()).unwrap_or(serde_json::Value::Null))
            .collect();
        loom_core::hash::fold_values(values.iter())
    }

    pub(crate) async fn run(&self, view: MutableView) -> Result<MutableView, StepError> {
        (self.action)(view).await
    }
}

/// Builds a [`Step`] by declaring its consumed/produced keys, then its action.
pub struct StepBuilder {
    name: String,
    consumes: Vec<KeyId>,
    produces: Vec<KeyId>,
}

impl StepBuilder {
    fn new(name: String) -> Self {
        Self {
            name,
            consumes: Vec::new(),
            produces: Vec::new(),
        }
    }

    pub fn consumes<T>(mut self, key: &Key<T>) -> Self {
        self.consumes.push(key.id());
        self
    }

    pub fn produces<T>(mut self, key: &Key<T>) -> Self {
        self.produces.push(key.id());
        self
    }

    /// Finish the declaration with the action body. The action receives an
    /// owned [`MutableView`] restricted to exactly the declared
    /// `consumes`/`produces`, and must return it back (with the produced
    /// keys set) on success.
    pub fn action<F, Fut>(self, f: F) -> Step
    where
        F: Fn(MutableView) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<MutableView, StepError>> + Send + 'static,
    {
        Step {
            name: self.name,
            consumes: self.consumes,
            produces: self.produces,
            action: Arc::new(move |view| Box::pin(f(view))),
        }
    }
}
