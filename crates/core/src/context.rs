// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The three layered context shapes (spec §4.2): a read-only snapshot, a
//! mutable source-tracked map, and a scoped overlay used while a single
//! step's action runs.

use crate::error::CoreError;
use crate::key::{Key, KeyId};
use crate::value::{clone_map, downcast, BoxedValue};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// Provenance of one context value: which step produced it, and with what
/// input fingerprint. `None` marks a value seeded from outside the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepSource {
    pub step: String,
    pub input_hash: u64,
}

/// Tagged provenance for a [`SourceTrackedContext`] entry.
pub type ContextValueSource = Option<StepSource>;

/// An immutable `{Key -> Value}` snapshot.
#[derive(Default)]
pub struct PlainContext {
    values: HashMap<KeyId, BoxedValue>,
}

impl PlainContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get<T: Clone + 'static>(&self, key: &Key<T>) -> Result<T, CoreError> {
        let entry = self.values.get(&key.id()).ok_or_else(|| CoreError::MissingValue(key.name().to_string()))?;
        downcast::<T>(entry).cloned().ok_or_else(|| CoreError::TypeMismatch(key.name().to_string()))
    }

    pub fn get_or_null<T: Clone + 'static>(&self, key: &Key<T>) -> Option<T> {
        self.values.get(&key.id()).and_then(|v| downcast::<T>(v).cloned())
    }

    pub fn exists<T>(&self, key: &Key<T>) -> bool {
        self.values.contains_key(&key.id())
    }

    /// Read-only view of every value currently present, by erased key.
    pub fn as_typed_map(&self) -> &HashMap<KeyId, BoxedValue> {
        &self.values
    }

    pub fn set<T>(&mut self, key: &Key<T>, value: T)
    where
        T: Clone + std::fmt::Debug + serde::Serialize + Send + Sync + 'static,
    {
        self.values.insert(key.id(), Box::new(value));
    }
}

/// A mutable `{Key -> (Value, Option<Source>)}` map.
///
/// Lifecycle: built empty or lifted from a [`PlainContext`], mutated by the
/// engine as steps commit, optionally serialized, discarded when the run ends.
#[derive(Default)]
pub struct SourceTrackedContext {
    entries: HashMap<KeyId, (BoxedValue, ContextValueSource)>,
}

impl SourceTrackedContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lift a plain snapshot: every entry is tagged `source = None`.
    pub fn from_plain(ctx: PlainContext) -> Self {
        Self {
            entries: ctx.values.into_iter().map(|(k, v)| (k, (v, None))).collect(),
        }
    }

    pub fn get<T: Clone + 'static>(&self, key: &Key<T>) -> Result<T, CoreError> {
        let (value, _) = self.entries.get(&key.id()).ok_or_else(|| CoreError::MissingValue(key.name().to_string()))?;
        downcast::<T>(value).cloned().ok_or_else(|| CoreError::TypeMismatch(key.name().to_string()))
    }

    pub fn get_or_null<T: Clone + 'static>(&self, key: &Key<T>) -> Option<T> {
        self.entries.get(&key.id()).and_then(|(v, _)| downcast::<T>(v).cloned())
    }

    pub fn exists<T>(&self, key: &Key<T>) -> bool {
        self.entries.contains_key(&key.id())
    }

    pub fn get_tracked<T: Clone + 'static>(&self, key: &Key<T>) -> Result<(T, ContextValueSource), CoreError> {
        let (value, source) = self.entries.get(&key.id()).ok_or_else(|| CoreError::MissingValue(key.name().to_string()))?;
        let typed = downcast::<T>(value).cloned().ok_or_else(|| CoreError::TypeMismatch(key.name().to_string()))?;
        Ok((typed, source.clone()))
    }

    pub fn set<T>(&mut self, key: &Key<T>, value: T, source: ContextValueSource)
    where
        T: Clone + std::fmt::Debug + serde::Serialize + Send + Sync + 'static,
    {
        self.entries.insert(key.id(), (Box::new(value), source));
    }

    /// Insert an already-erased value (used by the persistence loader, which
    /// decodes through a captured `Deserializer` rather than a typed `Key`).
    pub fn set_erased(&mut self, id: KeyId, value: BoxedValue, source: ContextValueSource) {
        self.entries.insert(id, (value, source));
    }

    pub fn remove<T>(&mut self, key: &Key<T>) {
        self.entries.remove(&key.id());
    }

    pub fn remove_erased(&mut self, id: &KeyId) {
        self.entries.remove(id);
    }

    pub fn source_of(&self, id: &KeyId) -> Option<&ContextValueSource> {
        self.entries.get(id).map(|(_, s)| s)
    }

    /// Keys currently present, for shape-spec evaluation and invalidation.
    pub fn available_keys(&self) -> impl Iterator<Item = &KeyId> {
        self.entries.keys()
    }

    /// Read-only view of every tracked entry, by erased key.
    pub fn as_typed_map(&self) -> &HashMap<KeyId, (BoxedValue, ContextValueSource)> {
        &self.entries
    }

    /// Snapshot the current values (without provenance) as the frozen base
    /// for a [`MutableView`].
    pub fn snapshot_values(&self) -> Arc<HashMap<KeyId, BoxedValue>> {
        Arc::new(self.entries.iter().map(|(k, (v, _))| (k.clone(), v.clone_boxed())).collect())
    }

    /// An independent clone, for hook dispatch (spec §4.6: hooks must never
    /// alias the running context).
    pub fn clone_for_hook(&self) -> Self {
        Self {
            entries: self.entries.iter().map(|(k, (v, s))| (k.clone(), (v.clone_boxed(), s.clone()))).collect(),
        }
    }

    /// Drop provenance, keeping only the current values (spec §4.8's
    /// `vars()` post-execution lookup).
    pub fn to_plain(&self) -> PlainContext {
        PlainContext {
            values: self.entries.iter().map(|(k, (v, _))| (k.clone(), v.clone_boxed())).collect(),
        }
    }
}

/// A scoped overlay over a frozen base, restricting the visible/writable
/// surface for a single step's body (spec §4.2/§4.3).
pub struct MutableView {
    base: Arc<HashMap<KeyId, BoxedValue>>,
    pending: HashMap<KeyId, BoxedValue>,
    allow_get: Option<HashSet<KeyId>>,
    allow_set: Option<HashSet<KeyId>>,
}

impl MutableView {
    pub fn new(
        base: Arc<HashMap<KeyId, BoxedValue>>,
        allow_get: Option<HashSet<KeyId>>,
        allow_set: Option<HashSet<KeyId>>,
    ) -> Self {
        Self {
            base,
            pending: HashMap::new(),
            allow_get,
            allow_set,
        }
    }

    /// An overlay with no restrictions, for use outside step execution
    /// (e.g. a pipeline's user `context(..)` setup block).
    pub fn unrestricted(base: Arc<HashMap<KeyId, BoxedValue>>) -> Self {
        Self::new(base, None, None)
    }

    pub fn get<T: Clone + 'static>(&self, key: &Key<T>) -> Result<T, CoreError> {
        let id = key.id();
        self.check_get(&id, key.name())?;
        if let Some(v) = self.pending.get(&id) {
            return downcast::<T>(v).cloned().ok_or_else(|| CoreError::TypeMismatch(key.name().to_string()));
        }
        self.base
            .get(&id)
            .ok_or_else(|| CoreError::MissingValue(key.name().to_string()))
            .and_then(|v| downcast::<T>(v).cloned().ok_or_else(|| CoreError::TypeMismatch(key.name().to_string())))
    }

    pub fn get_or_null<T: Clone + 'static>(&self, key: &Key<T>) -> Result<Option<T>, CoreError> {
        let id = key.id();
        self.check_get(&id, key.name())?;
        if let Some(v) = self.pending.get(&id) {
            return Ok(downcast::<T>(v).cloned());
        }
        Ok(self.base.get(&id).and_then(|v| downcast::<T>(v).cloned()))
    }

    /// Presence check ignores `allow_get`/`allow_set` restrictions (spec §4.2).
    pub fn exists<T>(&self, key: &Key<T>) -> bool {
        let id = key.id();
        self.pending.contains_key(&id) || self.base.contains_key(&id)
    }

    pub fn set<T>(&mut self, key: &Key<T>, value: T) -> Result<(), CoreError>
    where
        T: Clone + std::fmt::Debug + serde::Serialize + Send + Sync + 'static,
    {
        let id = key.id();
        if let Some(allow) = &self.allow_set {
            if !allow.contains(&id) {
                return Err(CoreError::IllegalVariableSet(key.name().to_string()));
            }
        }
        self.pending.insert(id, Box::new(value));
        Ok(())
    }

    fn check_get(&self, id: &KeyId, name: &str) -> Result<(), CoreError> {
        if let Some(allow) = &self.allow_get {
            if !allow.contains(id) {
                return Err(CoreError::IllegalVariableAccess(name.to_string()));
            }
        }
        Ok(())
    }

    /// Which declared keys have a pending write (used to check a step
    /// "succeeded": every `produces` key must appear here).
    pub fn has_pending(&self, id: &KeyId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn pending(&self) -> &HashMap<KeyId, BoxedValue> {
        &self.pending
    }

    pub fn into_pending(self) -> HashMap<KeyId, BoxedValue> {
        self.pending
    }

    /// Merge pending writes into a clone of the base, discarding provenance.
    pub fn freeze(self) -> PlainContext {
        let mut values = clone_map(&self.base);
        values.extend(self.pending);
        PlainContext { values }
    }

    /// Merge pending writes into a clone of the base, tagging every merged
    /// write (but not pre-existing base entries) with `source`.
    pub fn freeze_tracked(self, source: ContextValueSource) -> SourceTrackedContext {
        let mut entries: HashMap<KeyId, (BoxedValue, ContextValueSource)> =
            clone_map(&self.base).into_iter().map(|(k, v)| (k, (v, None))).collect();
        for (k, v) in self.pending {
            entries.insert(k, (v, source.clone()));
        }
        SourceTrackedContext { entries }
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
