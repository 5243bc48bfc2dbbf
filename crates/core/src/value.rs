// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Type-erased value envelope stored in a context.

use crate::error::CoreError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

/// Type-erased envelope around a typed context value.
///
/// Typed retrieval downcasts through [`Any`]; the structured-text form
/// (`to_json`) backs both stable hashing (`Step::hash_inputs` in
/// `loom-engine`) and persistence (`loom-storage`).
pub trait Variable: Any + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn clone_boxed(&self) -> BoxedValue;
    fn to_json(&self) -> serde_json::Value;
    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result;
}

impl<T> Variable for T
where
    T: Any + Clone + fmt::Debug + Serialize + Send + Sync + 'static,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn clone_boxed(&self) -> BoxedValue {
        Box::new(self.clone())
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }

    fn fmt_debug(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Debug for dyn Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_debug(f)
    }
}

/// A context value behind its type-erased envelope.
pub type BoxedValue = Box<dyn Variable>;

pub(crate) fn downcast<T: 'static>(value: &BoxedValue) -> Option<&T> {
    value.as_any().downcast_ref::<T>()
}

/// A deserializer captured at [`crate::VariableSet`] registration time,
/// closing over the concrete `T` so the persistence loader can decode a
/// stored value without any runtime reflection.
pub type Deserializer = Arc<dyn Fn(&serde_json::Value) -> Result<BoxedValue, CoreError> + Send + Sync>;

/// Build a [`Deserializer`] for `T`, used by `VariableSetBuilder::register`.
pub fn deserializer_for<T>() -> Deserializer
where
    T: DeserializeOwned + Clone + fmt::Debug + Serialize + Send + Sync + 'static,
{
    Arc::new(|value| {
        serde_json::from_value::<T>(value.clone()).map(|v| Box::new(v) as BoxedValue).map_err(|e| CoreError::Decode(e.to_string()))
    })
}

pub(crate) fn clone_map(
    map: &std::collections::HashMap<crate::key::KeyId, BoxedValue>,
) -> std::collections::HashMap<crate::key::KeyId, BoxedValue> {
    map.iter().map(|(k, v)| (k.clone(), v.clone_boxed())).collect()
}
