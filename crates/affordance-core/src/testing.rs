//! Shared fixtures: a one-dimensional line world over `i32` states

use std::collections::HashMap;
use std::sync::Arc;

use affordance_common::{
    Action, ActionKey, Domain, FnPropositionalFunction, GroundedAction, GroundedProp,
    LogicalExpression, PfAtom, PropositionalFunction, TransitionProbability,
};

use crate::affordance::record::{ActionCounts, AffordanceRecord};
use crate::delegate::AffordanceDelegate;

/// Deterministic move by `delta`
pub struct Shift {
    name: String,
    delta: i32,
    classes: Vec<String>,
}

impl Shift {
    pub fn new(name: &str, delta: i32, classes: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            delta,
            classes: classes.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl Action<i32> for Shift {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_classes(&self) -> &[String] {
        &self.classes
    }

    fn transitions(&self, state: &i32, _params: &[String]) -> Vec<TransitionProbability<i32>> {
        vec![TransitionProbability::certain(state + self.delta)]
    }
}

pub struct LineDomain {
    actions: HashMap<String, Arc<dyn Action<i32>>>,
    predicates: HashMap<String, Arc<dyn PropositionalFunction<i32>>>,
}

impl LineDomain {
    pub fn new() -> Self {
        let mut actions: HashMap<String, Arc<dyn Action<i32>>> = HashMap::new();
        actions.insert("inc".into(), Arc::new(Shift::new("inc", 1, &[])));
        actions.insert("dec".into(), Arc::new(Shift::new("dec", -1, &[])));
        actions.insert("stay".into(), Arc::new(Shift::new("stay", 0, &[])));
        actions.insert("jump".into(), Arc::new(Shift::new("jump", 3, &["agent"])));

        let mut predicates: HashMap<String, Arc<dyn PropositionalFunction<i32>>> = HashMap::new();
        let table: [(&str, fn(&i32) -> bool); 6] = [
            ("positive", |s| *s > 0),
            ("negative", |s| *s < 0),
            ("even", |s| s % 2 == 0),
            ("at_goal", |s| *s == 5),
            ("always", |_| true),
            ("never", |_| false),
        ];
        for (name, test) in table {
            predicates.insert(
                name.to_string(),
                Arc::new(FnPropositionalFunction::new(
                    name,
                    vec!["agent".to_string()],
                    move |s: &i32, _: &[String]| test(s),
                )),
            );
        }

        Self {
            actions,
            predicates,
        }
    }
}

impl Domain<i32> for LineDomain {
    fn action(&self, name: &str) -> Option<Arc<dyn Action<i32>>> {
        self.actions.get(name).cloned()
    }

    fn propositional_function(&self, name: &str) -> Option<Arc<dyn PropositionalFunction<i32>>> {
        self.predicates.get(name).cloned()
    }

    fn actions(&self) -> Vec<Arc<dyn Action<i32>>> {
        let mut names: Vec<_> = self.actions.keys().cloned().collect();
        names.sort();
        names.iter().map(|n| Arc::clone(&self.actions[n])).collect()
    }
}

/// Free-variable atom over a line-world predicate
pub fn atom(name: &str) -> Arc<dyn LogicalExpression<i32>> {
    let domain = LineDomain::new();
    let pf = domain.propositional_function(name).expect("unknown predicate");
    Arc::new(PfAtom::new(GroundedProp::with_free_variables(pf)))
}

/// Free-variable grounding of a line-world action
pub fn grounded(name: &str) -> GroundedAction<i32> {
    let domain = LineDomain::new();
    GroundedAction::with_free_variables(domain.action(name).expect("unknown action"))
}

pub fn key(name: &str) -> ActionKey {
    grounded(name).key().clone()
}

/// Delegate over `precondition`/`goal` with `(action, active, total)` counts
pub fn delegate(
    precondition: &str,
    goal: &str,
    entries: &[(&str, u64, u64)],
) -> AffordanceDelegate<i32> {
    let record = AffordanceRecord::with_counts(
        atom(precondition),
        atom(goal),
        entries
            .iter()
            .map(|(name, active, total)| (grounded(name), ActionCounts::new(*active, *total)))
            .collect(),
    )
    .expect("valid counts");
    AffordanceDelegate::new(record)
}
