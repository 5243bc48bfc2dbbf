//! Shared variable-set and pipeline declarations for the scenario specs.
//!
//! Mirrors the linear-chain example used throughout spec.md §8: a step that
//! asks for a multiplier, a step that parses a string input, and a step
//! that multiplies the two.

#![allow(dead_code)]

use loom_core::{Key, ShapeOption, ShapeSpec, VariableSet, VariableSetBuilder};
use loom_engine::{Pipeline, RetryPolicy, Step, StepError};

pub struct ArithVars {
    pub input: Key<String>,
    pub m: Key<i64>,
    pub converted: Key<i64>,
    pub output: Key<i64>,
}

impl VariableSet for ArithVars {
    fn build(reg: &mut VariableSetBuilder) -> Self {
        Self {
            input: reg.register("input", false),
            m: reg.register("m", false),
            converted: reg.register("converted", false),
            output: reg.register("output", false),
        }
    }

    fn input_spec() -> ShapeSpec {
        ShapeSpec::option(ShapeOption::new().required(&["input"]))
    }

    fn output_spec() -> ShapeSpec {
        ShapeSpec::option(ShapeOption::new().required(&["output"]))
    }
}

/// Builds the three-step chain: `ask_multiplier` (produces `m`), `parse`
/// (consumes `input`, produces `converted`), `multiply` (consumes
/// `converted, m`, produces `output`).
pub fn build_arith_pipeline(vars: &ArithVars, retry: Option<RetryPolicy>) -> Pipeline {
    let ask_multiplier = Step::builder("ask_multiplier").produces(&vars.m).action({
        let m = vars.m.clone();
        move |mut view| {
            let m = m.clone();
            async move {
                view.set(&m, 100)?;
                Ok(view)
            }
        }
    });

    let parse = Step::builder("parse").consumes(&vars.input).produces(&vars.converted).action({
        let (input, converted) = (vars.input.clone(), vars.converted.clone());
        move |mut view| {
            let (input, converted) = (input.clone(), converted.clone());
            async move {
                let raw: String = view.get(&input)?;
                let parsed: i64 = raw.parse().map_err(|_| StepError::msg(format!("'{raw}' is not a number")))?;
                view.set(&converted, parsed)?;
                Ok(view)
            }
        }
    });

    let multiply = Step::builder("multiply").consumes(&vars.converted).consumes(&vars.m).produces(&vars.output).action({
        let (converted, m, output) = (vars.converted.clone(), vars.m.clone(), vars.output.clone());
        move |mut view| {
            let (converted, m, output) = (converted.clone(), m.clone(), output.clone());
            async move {
                let c: i64 = view.get(&converted)?;
                let mult: i64 = view.get(&m)?;
                view.set(&output, c * mult)?;
                Ok(view)
            }
        }
    });

    let mut builder = Pipeline::builder("arith").step(ask_multiplier).step(parse).step(multiply);
    if let Some(policy) = retry {
        builder = builder.retry_policy(policy);
    }
    builder.build().expect("linear chain has no cycle")
}
