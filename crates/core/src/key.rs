// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Named, typed handles into a pipeline context.

use crate::tag::TypeTag;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one declared [`crate::VariableSet`] instance.
///
/// Two [`Key`]s are equal only when they share both a field name and an
/// owning variable set. Rather than have a `Key` hold a back-reference to
/// its owning set (a cyclic reference in a strict-ownership model), the
/// owner is this small opaque id; the set that minted it is looked up
/// through the `VariableSetHandle` that created it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VariableSetId(u64);

impl VariableSetId {
    /// Allocate a fresh id, distinct from every other id allocated in this process.
    pub fn fresh() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for VariableSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "vs{}", self.0)
    }
}

/// Erased identity of a [`Key`]: what the context and persistence layers
/// index by, since they cannot carry the generic `T`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct KeyId {
    pub name: &'static str,
    pub owner: VariableSetId,
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// A named, typed handle for one slot in a pipeline [`crate::Context`].
///
/// Carries the field name, a captured [`TypeTag`] (used only for structural
/// hashing and deserialization dispatch — the actual contract is the
/// generic `T`), a transience flag, and the id of the owning variable set.
pub struct Key<T> {
    id: KeyId,
    type_tag: TypeTag,
    transient: bool,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Clone for Key<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            type_tag: self.type_tag.clone(),
            transient: self.transient,
            _marker: PhantomData,
        }
    }
}

impl<T> fmt::Debug for Key<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("name", &self.id.name)
            .field("type", &self.type_tag)
            .field("transient", &self.transient)
            .finish()
    }
}

impl<T> PartialEq for Key<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Key<T> {}

impl<T> Hash for Key<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T: 'static> Key<T> {
    pub(crate) fn new(name: &'static str, owner: VariableSetId, transient: bool) -> Self {
        Self {
            id: KeyId { name, owner },
            type_tag: TypeTag::of::<T>(),
            transient,
            _marker: PhantomData,
        }
    }

    /// The field name this key was registered under.
    pub fn name(&self) -> &'static str {
        self.id.name
    }

    /// The variable set that declared this key.
    pub fn owner(&self) -> VariableSetId {
        self.id.owner
    }

    /// Whether this key is excluded from persistence across runs.
    pub fn transient(&self) -> bool {
        self.transient
    }

    /// The captured type identity, used for structural hashing.
    pub fn type_tag(&self) -> &TypeTag {
        &self.type_tag
    }

    /// Erase the compile-time type, keeping only what the context and
    /// persistence layers need to index by.
    pub fn id(&self) -> KeyId {
        self.id.clone()
    }
}
