// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The declarative container of keys scoped to one pipeline.

use crate::error::CoreError;
use crate::hash::fold_structural;
use crate::key::{Key, VariableSetId};
use crate::shape::ShapeSpec;
use crate::value::{deserializer_for, Deserializer};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

/// Metadata recorded for one registered key, independent of its compile-time type.
#[derive(Debug, Clone)]
pub struct KeyMeta {
    pub name: &'static str,
    pub type_name: &'static str,
    pub transient: bool,
}

/// Registrar passed to [`VariableSet::build`].
///
/// The Rust realization of the "explicit `register(name, type_tag,
/// transient)`" redesign note in spec §9: field names are spelled literally
/// at the call site, no runtime reflection involved.
pub struct VariableSetBuilder {
    owner: VariableSetId,
    keys: Vec<KeyMeta>,
    deserializers: HashMap<&'static str, Deserializer>,
}

impl VariableSetBuilder {
    fn new(owner: VariableSetId) -> Self {
        Self {
            owner,
            keys: Vec::new(),
            deserializers: HashMap::new(),
        }
    }

    /// Register one field, returning its typed [`Key`].
    ///
    /// Panics in debug builds are deliberately avoided here: a duplicate
    /// field name is a programmer error caught by
    /// [`VariableSetHandle::new`]'s invariant check, not swallowed silently.
    pub fn register<T>(&mut self, name: &'static str, transient: bool) -> Key<T>
    where
        T: DeserializeOwned + Clone + fmt::Debug + Serialize + Send + Sync + 'static,
    {
        let key = Key::<T>::new(name, self.owner, transient);
        self.keys.push(KeyMeta {
            name,
            type_name: key.type_tag().as_str(),
            transient,
        });
        self.deserializers.insert(name, deserializer_for::<T>());
        key
    }
}

/// A declared set of keys for one pipeline, plus its input/output shape specs.
///
/// Implementors are plain structs of [`Key<T>`] fields; [`VariableSetHandle`]
/// drives `build` exactly once and derives the structural hash and
/// deserializer table from what was registered.
pub trait VariableSet: Sized + Send + Sync + 'static {
    /// Register every field and return the constructed struct of keys.
    fn build(registrar: &mut VariableSetBuilder) -> Self;

    /// Admissible shapes for a seed context (spec §4.4.3). Defaults to "any".
    fn input_spec() -> ShapeSpec {
        ShapeSpec::any()
    }

    /// Admissible terminal-output shapes, used by `count_steps_to_terminal`
    /// and test tooling. Defaults to "any".
    fn output_spec() -> ShapeSpec {
        ShapeSpec::any()
    }
}

/// Owns one instantiation of a [`VariableSet`]: the typed keys, the
/// structural hash derived from them, and the metadata needed to decode
/// persisted values without the caller's compile-time types in scope.
pub struct VariableSetHandle<V> {
    id: VariableSetId,
    keys: Vec<KeyMeta>,
    deserializers: HashMap<&'static str, Deserializer>,
    input_spec: ShapeSpec,
    output_spec: ShapeSpec,
    vars: V,
}

impl<V: VariableSet> VariableSetHandle<V> {
    /// Build a fresh handle, registering every field exactly once.
    pub fn new() -> Result<Self, CoreError> {
        let owner = VariableSetId::fresh();
        let mut builder = VariableSetBuilder::new(owner);
        let vars = V::build(&mut builder);

        let mut seen = std::collections::HashSet::new();
        for meta in &builder.keys {
            if !seen.insert(meta.name) {
                return Err(CoreError::InvalidShape(format!("duplicate key name '{}' in variable set", meta.name)));
            }
        }

        let input_spec = V::input_spec();
        let output_spec = V::output_spec();
        input_spec.validate()?;
        output_spec.validate()?;

        Ok(Self {
            id: owner,
            keys: builder.keys,
            deserializers: builder.deserializers,
            input_spec,
            output_spec,
            vars,
        })
    }

    pub fn id(&self) -> VariableSetId {
        self.id
    }

    /// The typed keys declared by this variable set.
    pub fn vars(&self) -> &V {
        &self.vars
    }

    pub fn input_spec(&self) -> &ShapeSpec {
        &self.input_spec
    }

    pub fn output_spec(&self) -> &ShapeSpec {
        &self.output_spec
    }

    pub fn keys(&self) -> &[KeyMeta] {
        &self.keys
    }

    /// Look up the deserializer captured at registration time for `name`.
    pub fn deserializer_for(&self, name: &str) -> Option<&Deserializer> {
        self.deserializers.get(name)
    }

    /// Deterministic hash over the sorted non-transient keys' names,
    /// fully-qualified types, and transience flags (spec §4.1).
    ///
    /// Stable under reordering of field declarations; changes whenever any
    /// non-transient field's name or type changes.
    pub fn structural_hash(&self, include_transients: bool) -> u64 {
        let mut entries: Vec<&KeyMeta> = self.keys.iter().filter(|k| include_transients || !k.transient).collect();
        entries.sort_by_key(|k| k.name);
        fold_structural(entries.iter().map(|k| (k.name, k.type_name, k.transient)))
    }
}

#[cfg(test)]
#[path = "variable_set_tests.rs"]
mod tests;
