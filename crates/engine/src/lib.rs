// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! loom-engine: the pipeline scheduler, retry orchestration, and execution
//! façade built over `loom-core`'s key/context model.
//!
//! A [`Pipeline`] is a named, acyclic graph of [`Step`]s. [`Executor`] binds
//! one to a [`loom_core::VariableSetHandle`] and a seed context, runs it
//! (applying cascading invalidation, skip-if-satisfied, and retries per
//! step), and hands back typed lookups over the result through [`Executed`].

pub mod error;
pub mod executor;
pub mod hooks;
pub mod pipeline;
pub mod retry;
pub mod step;

pub use error::EngineError;
pub use executor::{Executed, Executor, PreparedExecution};
pub use hooks::Hooks;
pub use pipeline::{count_steps_to_terminal, Pipeline, PipelineBuilder};
pub use retry::{controlled_retry, retry, RetryError, RetryFilter, RetryPolicy, RetryState};
pub use step::{Step, StepBuilder, StepError, StepFuture};
