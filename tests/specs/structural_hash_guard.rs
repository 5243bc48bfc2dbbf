//! Scenario: a persisted record's structural hash no longer matches the
//! variable set that declared it — the loader must skip it rather than
//! decode garbage through a deserializer built for a different type
//! (spec §4.1, §4.7).

use loom_core::{Key, KeyId, SourceTrackedContext, VariableSet, VariableSetBuilder, VariableSetHandle};
use loom_storage::PersistenceStore;

struct VarsV1 {
    count: Key<i64>,
}

impl VariableSet for VarsV1 {
    fn build(reg: &mut VariableSetBuilder) -> Self {
        Self {
            count: reg.register("count", false),
        }
    }
}

/// Same field name, incompatible type: a stand-in for a variable set whose
/// declaration changed between the run that persisted `count` and the run
/// that's trying to load it back.
struct VarsV2 {
    count: Key<String>,
}

impl VariableSet for VarsV2 {
    fn build(reg: &mut VariableSetBuilder) -> Self {
        Self {
            count: reg.register("count", false),
        }
    }
}

#[test]
fn load_skips_a_record_whose_structural_hash_has_drifted() {
    let store = PersistenceStore::new();

    let v1 = VariableSetHandle::<VarsV1>::new().expect("v1 builds");
    let mut ctx = SourceTrackedContext::new();
    ctx.set(&v1.vars().count, 42, None);
    store
        .serialize_keys("run-1", "pipeline-a", &v1, &[v1.vars().count.id()], &ctx)
        .expect("serializes");
    assert_eq!(store.latest_len(), 1);

    // A fresh handle with the same field name but a different type has a
    // different structural hash, so the record written under `VarsV1`
    // cannot be decoded through it.
    let v2 = VariableSetHandle::<VarsV2>::new().expect("v2 builds");
    assert_ne!(v1.structural_hash(false), v2.structural_hash(false));

    let declared: Vec<KeyId> = vec![v2.vars().count.id()];
    let loaded = store.load_context_for_pipeline("run-1", "pipeline-a", &v2, declared, SourceTrackedContext::new(), true);

    assert!(!loaded.exists(&v2.vars().count), "stale-structural-hash record must not be decoded");
}

#[test]
fn load_accepts_a_record_whose_structural_hash_still_matches() {
    let store = PersistenceStore::new();

    let handle = VariableSetHandle::<VarsV1>::new().expect("builds");
    let mut ctx = SourceTrackedContext::new();
    ctx.set(&handle.vars().count, 7, None);
    store
        .serialize_keys("run-2", "pipeline-a", &handle, &[handle.vars().count.id()], &ctx)
        .expect("serializes");

    let declared: Vec<KeyId> = vec![handle.vars().count.id()];
    let loaded = store.load_context_for_pipeline("run-2", "pipeline-a", &handle, declared, SourceTrackedContext::new(), true);

    assert_eq!(loaded.get(&handle.vars().count).unwrap(), 7);
}
