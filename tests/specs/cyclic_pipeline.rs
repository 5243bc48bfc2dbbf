//! Scenario: a pipeline whose step declarations form a cycle is rejected at
//! build time, before any step ever runs (spec §3/§4.4.1).

use loom_core::{Key, VariableSet, VariableSetBuilder, VariableSetHandle};
use loom_engine::{EngineError, Pipeline, Step};

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

fn passthrough(name: &'static str, from: Key<i64>, to: Key<i64>) -> Step {
    Step::builder(name).consumes(&from).produces(&to).action(move |mut view| {
        let (from, to) = (from.clone(), to.clone());
        async move {
            let v: i64 = view.get(&from)?;
            view.set(&to, v)?;
            Ok(view)
        }
    })
}

#[test]
fn a_three_node_cycle_is_rejected_at_build_time() {
    let handle = VariableSetHandle::<Vars>::new().expect("builds");
    let (a, b, c) = (handle.vars().a.clone(), handle.vars().b.clone(), handle.vars().c.clone());

    // a -> b -> c -> a
    let step_ab = passthrough("a_to_b", a.clone(), b.clone());
    let step_bc = passthrough("b_to_c", b.clone(), c.clone());
    let step_ca = passthrough("c_to_a", c.clone(), a.clone());

    let err = Pipeline::builder("cycle").step(step_ab).step(step_bc).step(step_ca).build().unwrap_err();
    assert!(matches!(err, EngineError::CyclicPipeline));
}
