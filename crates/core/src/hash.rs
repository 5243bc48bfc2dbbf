// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stable hashing over structured-text encodings.
//!
//! Both `VariableSet::structural_hash` and `Step::hash_inputs` (in
//! `loom-engine`) need a deterministic fingerprint that is stable across
//! runs and process restarts. We fold the canonical JSON encoding of each
//! input through SHA-256 and truncate to a `u64`, the same canonical-JSON +
//! `Sha256::digest` idiom already used elsewhere in this workspace for
//! content hashing (runbook hashes), except truncated since callers only
//! need a stable fingerprint, not a cryptographic digest.

use sha2::{Digest, Sha256};

/// Fold the structured-text (canonical JSON) form of a sequence of values
/// into a single stable `u64`. `serde_json` serializes object keys in
/// `BTreeMap` order by default, so two equal values always hash identically
/// regardless of field declaration order.
pub fn fold_values<'a>(values: impl Iterator<Item = &'a serde_json::Value>) -> u64 {
    let mut hasher = Sha256::new();
    for value in values {
        let canonical = serde_json::to_string(value).unwrap_or_default();
        hasher.update(canonical.as_bytes());
        hasher.update([0u8]);
    }
    truncate(hasher.finalize().as_slice())
}

/// Fold a variable set's sorted `(name, fully-qualified type, transient)`
/// triples into its structural hash.
pub fn fold_structural<'a>(entries: impl Iterator<Item = (&'a str, &'a str, bool)>) -> u64 {
    let mut hasher = Sha256::new();
    for (name, type_str, transient) in entries {
        hasher.update(name.as_bytes());
        hasher.update([0u8]);
        hasher.update(type_str.as_bytes());
        hasher.update([u8::from(transient)]);
        hasher.update([0xFFu8]);
    }
    truncate(hasher.finalize().as_slice())
}

fn truncate(digest: &[u8]) -> u64 {
    let mut buf = [0u8; 8];
    let n = digest.len().min(8);
    buf[..n].copy_from_slice(&digest[..n]);
    u64::from_be_bytes(buf)
}
