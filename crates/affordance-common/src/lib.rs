//! # Affordance Common
//!
//! Shared types, errors, and MDP collaborator interfaces for affordance-aware
//! planning.
//!
//! ## Core Types
//!
//! - [`ActionKey`]: value identity of a grounded action, the key of every count table
//! - [`GroundedAction`]: an executable action schema bound to parameters
//! - [`LogicalExpression`] / [`PfAtom`]: preconditions and goal descriptions
//!
//! ## Collaborators
//!
//! - [`Domain`]: action and predicate registry
//! - [`Action`]: transition model
//! - [`RewardFunction`] / [`TerminalFunction`]: task definition

pub mod error;
pub mod types;

// Re-export commonly used types at crate root
pub use error::{
    AffordanceError, ConfigError, ControllerError, LoadError, PlannerError, RecordError, Result,
};
pub use types::{
    action_key::ActionKey,
    logic::{
        free_variables, FnPropositionalFunction, GroundedProp, LogicalExpression, PfAtom,
        PropositionalFunction,
    },
    mdp::{
        Action, Domain, GroundedAction, MdpState, RewardFunction, TerminalFunction,
        TransitionProbability,
    },
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Record terminator in the persisted knowledge-base format
pub const RECORD_TERMINATOR: &str = "===";

/// Separator introducing the legacy action-set-size section of a record
pub const LEGACY_SECTION_SEPARATOR: &str = "---";
