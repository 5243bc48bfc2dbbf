// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for pipeline scheduling, execution, and retry.

use crate::retry::RetryError;
use crate::step::StepError;
use loom_core::CoreError;
use loom_storage::StorageError;
use thiserror::Error;

/// Errors raised while building or executing a [`crate::Pipeline`].
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Core(#[from] CoreError),
    #[error("step failed: {0}")]
    Step(#[from] StepError),
    #[error("cyclic pipeline")]
    CyclicPipeline,
    #[error("duplicate step name: {0}")]
    DuplicateStepName(String),
    #[error("seed context does not satisfy the input shape")]
    InvalidInputShape,
    #[error("step '{0}' did not produce: {1:?}")]
    StepDidNotProduce(String, Vec<String>),
    #[error("exceeded retry attempts: {}", .0.join("; "))]
    ExceededRetryAttempts(Vec<String>),
    #[error("no step can progress toward the output shape")]
    Unreachable,
    #[error("hook failed: {0}")]
    HookFailed(String),
    #[error("failed to persist pipeline results: {0}")]
    Persist(#[from] StorageError),
}

impl EngineError {
    /// Unwrap a retry loop's outcome: a filter-rejected failure propagates as
    /// the original step error; an exhausted retry budget becomes
    /// `ExceededRetryAttempts` with every accumulated failure's message.
    pub(crate) fn from_retry(err: RetryError<StepError>) -> Self {
        match err {
            RetryError::Direct(inner) => EngineError::Step(inner),
            RetryError::Exhausted(failures) => {
                EngineError::ExceededRetryAttempts(failures.into_iter().map(|f| f.to_string()).collect())
            }
        }
    }
}
