// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the key/context model.

use thiserror::Error;

/// Errors raised by context and variable-set operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("missing value for key '{0}'")]
    MissingValue(String),
    #[error("illegal read of key '{0}'")]
    IllegalVariableAccess(String),
    #[error("illegal write of key '{0}'")]
    IllegalVariableSet(String),
    #[error("type mismatch decoding key '{0}'")]
    TypeMismatch(String),
    #[error("failed to decode value: {0}")]
    Decode(String),
    #[error("invalid shape declaration: {0}")]
    InvalidShape(String),
}
