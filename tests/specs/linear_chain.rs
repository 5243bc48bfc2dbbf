//! Scenario: a three-step linear chain, executed end to end through the
//! public `Executor` façade and persisted via `loom_storage`.

use crate::common::{build_arith_pipeline, ArithVars};
use loom_core::VariableSetHandle;
use loom_engine::Executor;
use loom_storage::PersistenceStore;

#[tokio::test]
async fn executes_full_chain_and_persists_every_declared_key() {
    let handle = VariableSetHandle::<ArithVars>::new().expect("variable set builds");
    let pipeline = build_arith_pipeline(handle.vars(), None);
    let store = PersistenceStore::new();

    let executed = Executor::prepare(&handle, &pipeline, None)
        .context(|vars, mut view| {
            view.set(&vars.input, "5".to_string())?;
            Ok(view)
        })
        .expect("seed accepted")
        .execute_and_save("run-1", &store)
        .await
        .expect("pipeline executes and persists");

    assert_eq!(executed.get(|v| &v.output).unwrap(), 500);
    // input, m, converted, output: every key any step declares.
    assert_eq!(store.latest_len(), 4);
}

#[tokio::test]
async fn seeding_a_produced_key_skips_its_step() {
    let handle = VariableSetHandle::<ArithVars>::new().expect("variable set builds");
    let pipeline = build_arith_pipeline(handle.vars(), None);

    let executed = Executor::prepare(&handle, &pipeline, None)
        .context(|vars, mut view| {
            view.set(&vars.input, "5".to_string())?;
            view.set(&vars.m, 9)?;
            Ok(view)
        })
        .expect("seed accepted")
        .execute()
        .await
        .expect("pipeline executes");

    // `ask_multiplier` never ran: the caller's own `m` wins.
    assert_eq!(executed.get(|v| &v.output).unwrap(), 45);
    let (tracked, vars) = executed.tracked();
    assert_eq!(tracked.source_of(&vars.vars().m.id()), Some(&None));
}

#[tokio::test]
async fn rejects_seed_missing_a_required_input() {
    let handle = VariableSetHandle::<ArithVars>::new().expect("variable set builds");
    let pipeline = build_arith_pipeline(handle.vars(), None);

    let err = Executor::prepare(&handle, &pipeline, None).execute().await.unwrap_err();
    assert!(matches!(err, loom_engine::EngineError::InvalidInputShape));
}
