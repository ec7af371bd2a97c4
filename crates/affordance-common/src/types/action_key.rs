//! ActionKey - value identity for grounded actions
//!
//! Every count table is keyed on `ActionKey`, never on the identity of an
//! action object. Two grounded actions with the same name and the same
//! parameter bindings (in formal-parameter order) are the same action.

use serde::{Deserialize, Serialize};

/// Canonical key for a grounded action
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ActionKey {
    /// Action name as registered with the domain
    name: String,

    /// Parameter bindings in formal-parameter order
    params: Vec<String>,
}

impl ActionKey {
    /// Create a key from an action name and its bound parameters
    pub fn new(name: impl Into<String>, params: Vec<String>) -> Self {
        Self {
            name: name.into(),
            params,
        }
    }

    /// Create a key for an action without parameters
    pub fn simple(name: impl Into<String>) -> Self {
        Self::new(name, Vec::new())
    }

    /// Action name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Parameter bindings
    pub fn params(&self) -> &[String] {
        &self.params
    }
}

impl std::fmt::Display for ActionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.params.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{}({})", self.name, self.params.join(","))
        }
    }
}

impl From<&str> for ActionKey {
    fn from(name: &str) -> Self {
        Self::simple(name)
    }
}
