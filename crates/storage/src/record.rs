// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persisted record format (spec §6): field names are normative, since
//! they double as the on-disk/wire shape a future out-of-process reader
//! would decode.

use serde::{Deserialize, Serialize};

/// A single variable's value as committed to the persistence store, plus
/// enough provenance to drive skip/invalidation decisions on reload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedVariable {
    pub run_id: String,
    pub pipeline_id: String,
    pub structural_hash: u64,
    pub source: Option<SerializedSource>,
    pub timestamp: u64,
    pub key_name: String,
    pub value: serde_json::Value,
}

/// The `(step, input_hash)` pair recorded alongside a serialized variable,
/// mirroring [`loom_core::StepSource`] in a form independent of the engine
/// crate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerializedSource {
    pub step: String,
    pub input_hash: u64,
}
