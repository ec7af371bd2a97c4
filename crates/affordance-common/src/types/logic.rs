//! Logical expressions over states
//!
//! Preconditions and goal descriptions are boolean predicates evaluated by
//! the domain. The only expression form the knowledge base can persist is a
//! single propositional-function atom with free variables, [`PfAtom`].

use std::sync::Arc;

/// A boolean predicate over states
pub trait LogicalExpression<S> {
    /// Evaluate the expression in `state`
    fn evaluate(&self, state: &S) -> bool;

    /// Canonical description, used for structural equality and persistence
    fn description(&self) -> String;
}

/// A named, parameterised predicate provided by the domain
pub trait PropositionalFunction<S> {
    /// Name as registered with the domain
    fn name(&self) -> &str;

    /// Object classes of the formal parameters
    fn parameter_classes(&self) -> &[String];

    /// Evaluate the function under the given bindings. Bindings starting with
    /// `?` are free variables; interpreting them is up to the domain.
    fn is_true(&self, state: &S, params: &[String]) -> bool;
}

/// Synthesize a free variable per object class: `?` followed by the first
/// character of the class name.
pub fn free_variables(object_classes: &[String]) -> Vec<String> {
    object_classes
        .iter()
        .map(|class| match class.chars().next() {
            Some(c) => format!("?{}", c),
            None => "?".to_string(),
        })
        .collect()
}

/// A propositional function bound to parameters
pub struct GroundedProp<S> {
    function: Arc<dyn PropositionalFunction<S>>,
    params: Vec<String>,
}

impl<S> GroundedProp<S> {
    pub fn new(function: Arc<dyn PropositionalFunction<S>>, params: Vec<String>) -> Self {
        Self { function, params }
    }

    /// Bind every parameter to a free variable
    pub fn with_free_variables(function: Arc<dyn PropositionalFunction<S>>) -> Self {
        let params = free_variables(function.parameter_classes());
        Self::new(function, params)
    }

    pub fn name(&self) -> &str {
        self.function.name()
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn is_true(&self, state: &S) -> bool {
        self.function.is_true(state, &self.params)
    }
}

/// Atomic logical expression wrapping one grounded propositional function
pub struct PfAtom<S> {
    prop: GroundedProp<S>,
}

impl<S> PfAtom<S> {
    pub fn new(prop: GroundedProp<S>) -> Self {
        Self { prop }
    }

    pub fn prop(&self) -> &GroundedProp<S> {
        &self.prop
    }
}

impl<S> LogicalExpression<S> for PfAtom<S> {
    fn evaluate(&self, state: &S) -> bool {
        self.prop.is_true(state)
    }

    fn description(&self) -> String {
        // Free-variable atoms are described by their function name alone so the
        // description survives a write/read cycle through the record format
        if self.prop.params().iter().all(|p| p.starts_with('?')) {
            self.prop.name().to_string()
        } else {
            format!("{}({})", self.prop.name(), self.prop.params().join(","))
        }
    }
}

/// Propositional function backed by a closure
pub struct FnPropositionalFunction<S> {
    name: String,
    parameter_classes: Vec<String>,
    predicate: Box<dyn Fn(&S, &[String]) -> bool + Send + Sync>,
}

impl<S> FnPropositionalFunction<S> {
    pub fn new(
        name: impl Into<String>,
        parameter_classes: Vec<String>,
        predicate: impl Fn(&S, &[String]) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            parameter_classes,
            predicate: Box::new(predicate),
        }
    }
}

impl<S> PropositionalFunction<S> for FnPropositionalFunction<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn parameter_classes(&self) -> &[String] {
        &self.parameter_classes
    }

    fn is_true(&self, state: &S, params: &[String]) -> bool {
        (self.predicate)(state, params)
    }
}
