//! Scenario 2 (spec.md §8): run the linear chain, persist it, reload the
//! context, clear one intermediate key, reseed it with a different value,
//! and confirm only the step downstream of that key re-executes.

use loom_core::{Key, VariableSet, VariableSetBuilder, VariableSetHandle};
use loom_engine::{Executor, Pipeline, Step, StepError};
use loom_storage::PersistenceStore;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

struct Vars {
    input: Key<String>,
    m: Key<i64>,
    converted: Key<i64>,
    output: Key<i64>,
}

impl VariableSet for Vars {
    fn build(reg: &mut VariableSetBuilder) -> Self {
        Self {
            input: reg.register("input", false),
            m: reg.register("m", false),
            converted: reg.register("converted", false),
            output: reg.register("output", false),
        }
    }
}

struct Counters {
    ask_multiplier: Arc<AtomicU32>,
    parse: Arc<AtomicU32>,
    multiply: Arc<AtomicU32>,
}

fn build_counted_pipeline(vars: &Vars) -> (Pipeline, Counters) {
    let ask_multiplier_calls = Arc::new(AtomicU32::new(0));
    let parse_calls = Arc::new(AtomicU32::new(0));
    let multiply_calls = Arc::new(AtomicU32::new(0));

    let ask_multiplier = Step::builder("ask_multiplier").produces(&vars.m).action({
        let (m, calls) = (vars.m.clone(), ask_multiplier_calls.clone());
        move |mut view| {
            let (m, calls) = (m.clone(), calls.clone());
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                view.set(&m, 100)?;
                Ok(view)
            }
        }
    });

    let parse = Step::builder("parse").consumes(&vars.input).produces(&vars.converted).action({
        let (input, converted, calls) = (vars.input.clone(), vars.converted.clone(), parse_calls.clone());
        move |mut view| {
            let (input, converted, calls) = (input.clone(), converted.clone(), calls.clone());
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let raw: String = view.get(&input)?;
                let parsed: i64 = raw.parse().map_err(|_| StepError::msg("not a number"))?;
                view.set(&converted, parsed)?;
                Ok(view)
            }
        }
    });

    let multiply = Step::builder("multiply").consumes(&vars.converted).consumes(&vars.m).produces(&vars.output).action({
        let (converted, m, output, calls) = (vars.converted.clone(), vars.m.clone(), vars.output.clone(), multiply_calls.clone());
        move |mut view| {
            let (converted, m, output, calls) = (converted.clone(), m.clone(), output.clone(), calls.clone());
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let c: i64 = view.get(&converted)?;
                let mult: i64 = view.get(&m)?;
                view.set(&output, c * mult)?;
                Ok(view)
            }
        }
    });

    let pipeline = Pipeline::builder("reload_chain").step(ask_multiplier).step(parse).step(multiply).build().expect("acyclic");
    (
        pipeline,
        Counters {
            ask_multiplier: ask_multiplier_calls,
            parse: parse_calls,
            multiply: multiply_calls,
        },
    )
}

#[tokio::test]
async fn reload_clear_and_reseed_reruns_only_the_step_downstream_of_the_cleared_key() {
    let handle = VariableSetHandle::<Vars>::new().expect("variable set builds");
    let (pipeline, counters) = build_counted_pipeline(handle.vars());
    let store = PersistenceStore::new();

    // Scenario 1: input="5", m=100 seeded. ask_multiplier is skipped (m
    // already present); output = 5 * 100 = 500.
    let first = Executor::prepare(&handle, &pipeline, None)
        .context(|vars, mut view| {
            view.set(&vars.input, "5".to_string())?;
            view.set(&vars.m, 100)?;
            Ok(view)
        })
        .expect("seed")
        .execute_and_save("R", &store)
        .await
        .expect("first run executes and persists");
    assert_eq!(first.get(|v| &v.output).unwrap(), 500);
    assert_eq!(counters.ask_multiplier.load(Ordering::SeqCst), 0);
    assert_eq!(counters.parse.load(Ordering::SeqCst), 1);
    assert_eq!(counters.multiply.load(Ordering::SeqCst), 1);

    // Reload the persisted context, then clear `converted` from it.
    let declared = pipeline.all_variables(true);
    let mut reloaded = store.load_context_for_pipeline(
        "R",
        pipeline.id(),
        &handle,
        declared,
        loom_core::SourceTrackedContext::new(),
        true,
    );
    reloaded.remove(&handle.vars().converted);

    // Re-execute, reseeding `input="5"` (unchanged) and `converted=100`
    // directly (an externally-provided value, not produced by `parse`).
    let second = Executor::prepare(&handle, &pipeline, Some(reloaded))
        .context(|vars, mut view| {
            view.set(&vars.input, "5".to_string())?;
            view.set(&vars.converted, 100)?;
            Ok(view)
        })
        .expect("seed")
        .execute()
        .await
        .expect("second run executes");

    // `ask_multiplier` stays skipped: `m`'s source was never tied to it.
    assert_eq!(counters.ask_multiplier.load(Ordering::SeqCst), 0);
    // `parse` is skipped: `converted` is present and carries no stale
    // step-provenance to invalidate against (it was seeded directly).
    assert_eq!(counters.parse.load(Ordering::SeqCst), 1);
    // `multiply` reruns: its recorded source hash was computed over the
    // original `converted=5`, which no longer matches `converted=100`.
    assert_eq!(counters.multiply.load(Ordering::SeqCst), 2);
    assert_eq!(second.get(|v| &v.output).unwrap(), 10_000);
}
