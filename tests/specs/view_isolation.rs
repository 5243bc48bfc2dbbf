//! Scenario: a step's `MutableView` only exposes the keys it declared
//! through `consumes`/`produces`; reaching outside that restriction surfaces
//! as a `CoreError`, not a silent no-op (spec §4.2/§4.3).

use loom_core::{CoreError, Key, VariableSet, VariableSetBuilder, VariableSetHandle};
use loom_engine::{EngineError, Pipeline, Step, StepError};

struct Vars {
    a: Key<i64>,
    b: Key<i64>,
    c: Key<i64>,
}

impl VariableSet for Vars {
    fn build(reg: &mut VariableSetBuilder) -> Self {
        Self {
            a: reg.register("a", false),
            b: reg.register("b", false),
            c: reg.register("c", false),
        }
    }
}

#[tokio::test]
async fn reading_an_undeclared_key_is_an_illegal_access() {
    let handle = VariableSetHandle::<Vars>::new().expect("builds");
    let (a, b, c) = (handle.vars().a.clone(), handle.vars().b.clone(), handle.vars().c.clone());

    let step = Step::builder("reads_undeclared").consumes(&a).produces(&b).action(move |view| {
        let c = c.clone();
        async move {
            let _ = view.get(&c)?;
            Ok(view)
        }
    });

    let pipeline = Pipeline::builder("isolation_get").step(step).build().expect("builds");
    let mut ctx = loom_core::SourceTrackedContext::new();
    ctx.set(&a, 1, None);
    ctx.set(&c, 99, None);

    let hooks = loom_engine::Hooks::new();
    let err = pipeline.run(ctx, &hooks).await.unwrap_err();
    match err {
        EngineError::Step(StepError::Core(CoreError::IllegalVariableAccess(name))) => assert_eq!(name, "c"),
        other => panic!("expected IllegalVariableAccess, got {other:?}"),
    }
}

#[tokio::test]
async fn writing_an_undeclared_key_is_an_illegal_set() {
    let handle = VariableSetHandle::<Vars>::new().expect("builds");
    let (a, b, c) = (handle.vars().a.clone(), handle.vars().b.clone(), handle.vars().c.clone());

    let step = Step::builder("writes_undeclared").consumes(&a).produces(&b).action(move |mut view| {
        let (b, c) = (b.clone(), c.clone());
        async move {
            view.set(&b, 1)?;
            view.set(&c, 1)?;
            Ok(view)
        }
    });

    let pipeline = Pipeline::builder("isolation_set").step(step).build().expect("builds");
    let mut ctx = loom_core::SourceTrackedContext::new();
    ctx.set(&a, 1, None);

    let hooks = loom_engine::Hooks::new();
    let err = pipeline.run(ctx, &hooks).await.unwrap_err();
    match err {
        EngineError::Step(StepError::Core(CoreError::IllegalVariableSet(name))) => assert_eq!(name, "c"),
        other => panic!("expected IllegalVariableSet, got {other:?}"),
    }
}

#[tokio::test]
async fn the_setup_block_view_is_unrestricted() {
    // Unlike a step's view, `PreparedExecution::context`'s view has no
    // `allow_get`/`allow_set` restriction: a caller may seed any declared
    // key regardless of which step produces it.
    let handle = VariableSetHandle::<Vars>::new().expect("builds");

    let pipeline = Pipeline::builder("setup_unrestricted")
        .step(
            Step::builder("passthrough")
                .consumes(&handle.vars().a)
                .produces(&handle.vars().b)
                .action({
                    let (a, b) = (handle.vars().a.clone(), handle.vars().b.clone());
                    move |mut view| {
                        let (a, b) = (a.clone(), b.clone());
                        async move {
                            let v: i64 = view.get(&a)?;
                            view.set(&b, v)?;
                            Ok(view)
                        }
                    }
                }),
        )
        .build()
        .expect("builds");

    let executed = loom_engine::Executor::prepare(&handle, &pipeline, None)
        .context(|vars, mut view| {
            view.set(&vars.a, 3)?;
            view.set(&vars.c, 7)?;
            Ok(view)
        })
        .expect("unrestricted setup accepts any declared key")
        .execute()
        .await
        .expect("executes");

    assert_eq!(executed.get(|v| &v.b).unwrap(), 3);
    assert_eq!(executed.get(|v| &v.c).unwrap(), 7);
}
