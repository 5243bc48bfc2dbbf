// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The keyed persistence store (spec §4.7): two ordered maps — `latest`,
//! overwritten per run/pipeline/variable, and `historical`, append-only by
//! timestamp — holding structured-text-encoded variable snapshots.

use crate::error::StorageError;
use crate::record::{SerializedSource, SerializedVariable};
use loom_core::{Clock, KeyId, SourceTrackedContext, StepSource, SystemClock, VariableSet, VariableSetHandle};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

fn latest_key(run_id: &str, pipeline_id: &str, var_name: &str) -> String {
    format!("{run_id}|{pipeline_id}|{var_name}")
}

fn historical_key(run_id: &str, pipeline_id: &str, var_name: &str, timestamp: u64) -> String {
    format!("{run_id}|{pipeline_id}|{var_name}|{timestamp}")
}

/// Two keyed stores backed by ordered maps (spec §4.7): `latest` for
/// point-in-time lookups by `"{run_id}|{pipeline_id}|{var_name}"`,
/// `historical` for every write ever committed, additionally keyed by
/// timestamp.
pub struct PersistenceStore {
    clock: Arc<dyn Clock>,
    latest: RwLock<BTreeMap<String, SerializedVariable>>,
    historical: RwLock<BTreeMap<String, SerializedVariable>>,
}

impl Default for PersistenceStore {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceStore {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            latest: RwLock::new(BTreeMap::new()),
            historical: RwLock::new(BTreeMap::new()),
        }
    }

    /// Serialize each of `keys` that is both non-transient and present in
    /// `ctx`, writing `latest` and `historical` together under one lock so
    /// the call commits as a unit (spec §5).
    pub fn serialize_keys<V: VariableSet>(
        &self,
        run_id: &str,
        pipeline_id: &str,
        vars: &VariableSetHandle<V>,
        keys: &[KeyId],
        ctx: &SourceTrackedContext,
    ) -> Result<(), StorageError> {
        let structural_hash = vars.structural_hash(false);
        let mut latest = self.latest.write();
        let mut historical = self.historical.write();

        for key_id in keys {
            let transient = vars.keys().iter().any(|meta| meta.name == key_id.name && meta.transient);
            if transient {
                continue;
            }
            let Some((value, source)) = ctx.as_typed_map().get(key_id) else {
                continue;
            };

            let lkey = latest_key(run_id, pipeline_id, key_id.name);
            // Clamp forward when wall-clock time hasn't advanced past the
            // most recent historical write for this key (open question in
            // spec §9, resolved in DESIGN.md).
            let floor = latest.get(&lkey).map(|r| r.timestamp.saturating_add(1)).unwrap_or(0);
            let timestamp = self.clock.epoch_ms().max(floor);

            let record = SerializedVariable {
                run_id: run_id.to_string(),
                pipeline_id: pipeline_id.to_string(),
                structural_hash,
                source: source.clone().map(|s| SerializedSource {
                    step: s.step,
                    input_hash: s.input_hash,
                }),
                timestamp,
                key_name: key_id.name.to_string(),
                value: value.to_json(),
            };

            let hkey = historical_key(run_id, pipeline_id, key_id.name, timestamp);
            historical.insert(hkey, record.clone());
            latest.insert(lkey, record);
        }
        Ok(())
    }

    /// Serialize every key in `declared_keys` — the Rust realization of spec
    /// §4.7's `serialize_pipeline` ("= serialize all declared-by-steps
    /// keys"). Callers pass a pipeline's `all_variables(include_outputs)`;
    /// this crate takes the resolved key list rather than the `Pipeline`
    /// type itself to avoid a storage → engine dependency (see DESIGN.md).
    pub fn serialize_pipeline<V: VariableSet>(
        &self,
        run_id: &str,
        pipeline_id: &str,
        vars: &VariableSetHandle<V>,
        declared_keys: impl IntoIterator<Item = KeyId>,
        ctx: &SourceTrackedContext,
    ) -> Result<(), StorageError> {
        let keys: Vec<KeyId> = declared_keys.into_iter().collect();
        self.serialize_keys(run_id, pipeline_id, vars, &keys, ctx)
    }

    /// Load every entry in `declared_keys` into `seed_ctx` (spec §4.7). A
    /// missing `latest` entry is skipped. A present record whose
    /// `structural_hash` no longer matches the variable set's current
    /// (non-transient) layout is skipped with a warning — a stale layout,
    /// not an error. Otherwise the value is decoded through the key's
    /// registered deserializer and set with its recorded provenance.
    /// `overwrite=false` leaves any key `seed_ctx` already carries untouched.
    pub fn load_context_for_pipeline<V: VariableSet>(
        &self,
        run_id: &str,
        pipeline_id: &str,
        vars: &VariableSetHandle<V>,
        declared_keys: impl IntoIterator<Item = KeyId>,
        mut seed_ctx: SourceTrackedContext,
        overwrite: bool,
    ) -> SourceTrackedContext {
        let current_hash = vars.structural_hash(false);
        let latest = self.latest.read();

        for key_id in declared_keys {
            if !overwrite && seed_ctx.as_typed_map().contains_key(&key_id) {
                continue;
            }
            let lkey = latest_key(run_id, pipeline_id, key_id.name);
            let Some(record) = latest.get(&lkey) else {
                continue;
            };
            if record.structural_hash != current_hash {
                warn!(run_id, pipeline = pipeline_id, key = key_id.name, "skipping stale structural-hash record on load");
                continue;
            }
            let Some(deserializer) = vars.deserializer_for(key_id.name) else {
                continue;
            };
            match deserializer(&record.value) {
                Ok(decoded) => {
                    let source = record.source.clone().map(|s| StepSource {
                        step: s.step,
                        input_hash: s.input_hash,
                    });
                    seed_ctx.set_erased(key_id, decoded, source);
                }
                Err(err) => {
                    warn!(run_id, pipeline = pipeline_id, key = key_id.name, error = %err, "failed to decode persisted value");
                }
            }
        }
        seed_ctx
    }

    /// A point-in-time clone of both maps, for the on-disk snapshot layer.
    pub(crate) fn export(&self) -> (BTreeMap<String, SerializedVariable>, BTreeMap<String, SerializedVariable>) {
        (self.latest.read().clone(), self.historical.read().clone())
    }

    /// Replace both maps wholesale, as when restoring from an on-disk
    /// snapshot.
    pub(crate) fn import(&self, latest: BTreeMap<String, SerializedVariable>, historical: BTreeMap<String, SerializedVariable>) {
        *self.latest.write() = latest;
        *self.historical.write() = historical;
    }

    pub fn latest_len(&self) -> usize {
        self.latest.read().len()
    }

    pub fn historical_len(&self) -> usize {
        self.historical.read().len()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
