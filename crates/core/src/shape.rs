// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative input/output shape constraints.
//!
//! A [`ShapeSpec`] is a disjunction of [`ShapeOption`]s; each option is a
//! conjunction of [`Constraint`]s over the set of key names currently
//! available. Used to describe admissible seed-context shapes
//! (`VariableSet::input_spec`) and terminal-output shapes
//! (`VariableSet::output_spec`).

use crate::error::CoreError;
use std::collections::HashSet;

/// A single presence constraint over a set of key names.
#[derive(Debug, Clone)]
pub enum Constraint {
    Required(Vec<&'static str>),
    Forbidden(Vec<&'static str>),
    AtLeastOneOf(Vec<&'static str>),
    ExactlyOneOf(Vec<&'static str>),
    AtMostOneOf(Vec<&'static str>),
    Conditional(Condition, Vec<Constraint>),
}

/// The guard under which a [`Constraint::Conditional`]'s inner constraints apply.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Active when at least one of the named keys is missing.
    IfMissingAny(Vec<&'static str>),
    /// Active when every named key is present.
    IfProvided(Vec<&'static str>),
}

fn is_active(cond: &Condition, available: &HashSet<&str>) -> bool {
    match cond {
        Condition::IfMissingAny(keys) => keys.iter().any(|k| !available.contains(k)),
        Condition::IfProvided(keys) => keys.iter().all(|k| available.contains(k)),
    }
}

fn constraint_satisfied(constraint: &Constraint, available: &HashSet<&str>) -> bool {
    match constraint {
        Constraint::Required(keys) => keys.iter().all(|k| available.contains(k)),
        Constraint::Forbidden(keys) => keys.iter().all(|k| !available.contains(k)),
        Constraint::AtLeastOneOf(keys) => keys.iter().any(|k| available.contains(k)),
        Constraint::ExactlyOneOf(keys) => keys.iter().filter(|k| available.contains(*k)).count() == 1,
        Constraint::AtMostOneOf(keys) => keys.iter().filter(|k| available.contains(*k)).count() <= 1,
        Constraint::Conditional(cond, inner) => {
            if is_active(cond, available) {
                inner.iter().all(|c| constraint_satisfied(c, available))
            } else {
                true
            }
        }
    }
}

/// Flatten a constraint tree, walking into `Conditional`'s inner constraints
/// as well as the top level — the declaration-time invariants below apply
/// transitively, regardless of how deep a constraint sits under a guard.
fn flatten(constraints: &[Constraint]) -> Vec<&Constraint> {
    let mut out = Vec::new();
    for c in constraints {
        out.push(c);
        if let Constraint::Conditional(_, inner) = c {
            out.extend(flatten(inner));
        }
    }
    out
}

fn collect_required<'a>(constraints: &[&'a Constraint]) -> HashSet<&'a str> {
    constraints
        .iter()
        .filter_map(|c| match c {
            Constraint::Required(keys) => Some(keys.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect()
}

fn collect_forbidden<'a>(constraints: &[&'a Constraint]) -> HashSet<&'a str> {
    constraints
        .iter()
        .filter_map(|c| match c {
            Constraint::Forbidden(keys) => Some(keys.iter().copied()),
            _ => None,
        })
        .flatten()
        .collect()
}

/// One conjunction of constraints within a [`ShapeSpec`].
#[derive(Debug, Clone, Default)]
pub struct ShapeOption {
    constraints: Vec<Constraint>,
}

impl ShapeOption {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn required(mut self, keys: &[&'static str]) -> Self {
        self.constraints.push(Constraint::Required(keys.to_vec()));
        self
    }

    pub fn forbidden(mut self, keys: &[&'static str]) -> Self {
        self.constraints.push(Constraint::Forbidden(keys.to_vec()));
        self
    }

    pub fn at_least_one_of(mut self, keys: &[&'static str]) -> Self {
        self.constraints.push(Constraint::AtLeastOneOf(keys.to_vec()));
        self
    }

    pub fn exactly_one_of(mut self, keys: &[&'static str]) -> Self {
        self.constraints.push(Constraint::ExactlyOneOf(keys.to_vec()));
        self
    }

    pub fn at_most_one_of(mut self, keys: &[&'static str]) -> Self {
        self.constraints.push(Constraint::AtMostOneOf(keys.to_vec()));
        self
    }

    pub fn conditional(mut self, cond: Condition, inner: Vec<Constraint>) -> Self {
        self.constraints.push(Constraint::Conditional(cond, inner));
        self
    }

    fn is_satisfied(&self, available: &HashSet<&str>) -> bool {
        self.constraints.iter().all(|c| constraint_satisfied(c, available))
    }

    /// Validate the declaration-time invariants from spec §3:
    /// a key may not be both required and forbidden in the same option;
    /// cardinality constraints may not mention a forbidden key; and
    /// `ExactlyOneOf`/`AtMostOneOf` may not be contradicted by more than
    /// one of their keys also being `Required`.
    pub fn validate(&self) -> Result<(), CoreError> {
        let flat = flatten(&self.constraints);
        let required = collect_required(&flat);
        let forbidden = collect_forbidden(&flat);
        if let Some(key) = required.intersection(&forbidden).next() {
            return Err(CoreError::InvalidShape(format!(
                "key '{key}' is both required and forbidden in the same option"
            )));
        }
        for constraint in flat.iter().copied() {
            if let Constraint::AtLeastOneOf(keys) | Constraint::ExactlyOneOf(keys) | Constraint::AtMostOneOf(keys) =
                constraint
            {
                if let Some(key) = keys.iter().find(|k| forbidden.contains(*k)) {
                    return Err(CoreError::InvalidShape(format!(
                        "key '{key}' is both forbidden and part of a cardinality constraint"
                    )));
                }
            }
            if let Constraint::ExactlyOneOf(keys) | Constraint::AtMostOneOf(keys) = constraint {
                let forced = keys.iter().filter(|k| required.contains(**k)).count();
                if forced > 1 {
                    return Err(CoreError::InvalidShape(
                        "more than one key in a cardinality constraint is independently required".into(),
                    ));
                }
            }
        }
        Ok(())
    }
}

/// A disjunction of [`ShapeOption`]s describing admissible key-presence shapes.
#[derive(Debug, Clone, Default)]
pub struct ShapeSpec {
    options: Vec<ShapeOption>,
}

impl ShapeSpec {
    /// A spec satisfied by any context (no constraints at all).
    pub fn any() -> Self {
        Self {
            options: vec![ShapeOption::new()],
        }
    }

    /// A spec with a single option.
    pub fn option(opt: ShapeOption) -> Self {
        Self { options: vec![opt] }
    }

    /// Add another option to the disjunction.
    pub fn with_option(mut self, opt: ShapeOption) -> Self {
        self.options.push(opt);
        self
    }

    /// Validate every option's declaration-time invariants.
    pub fn validate(&self) -> Result<(), CoreError> {
        for opt in &self.options {
            opt.validate()?;
        }
        Ok(())
    }

    /// True when at least one option is satisfied by `available`.
    pub fn is_satisfied(&self, available: &HashSet<&str>) -> bool {
        self.options.iter().any(|opt| opt.is_satisfied(available))
    }
}

#[cfg(test)]
#[path = "shape_tests.rs"]
mod tests;
