// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the persistence store and its optional on-disk
//! snapshot layer.
//!
//! A record with an unsupported structural hash is not an error (spec
//! §4.7): it is skipped and logged, which is why that case has no variant
//! here at all.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("compression error: {0}")]
    Compress(String),
    #[error("snapshot is corrupt: {0}")]
    CorruptSnapshot(String),
}
