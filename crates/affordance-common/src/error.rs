//! Error types for affordance-aware planning
//!
//! Provides a unified error type and domain-specific error variants

use thiserror::Error;

/// Result type alias using AffordanceError
pub type Result<T> = std::result::Result<T, AffordanceError>;

/// Unified error type for affordance operations
#[derive(Debug, Error)]
pub enum AffordanceError {
    // Count table errors
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    // Knowledge base errors
    #[error("Load error: {0}")]
    Load(#[from] LoadError),

    // Pruning controller errors
    #[error("Controller error: {0}")]
    Controller(#[from] ControllerError),

    // Planner usage errors
    #[error("Planner error: {0}")]
    Planner(#[from] PlannerError),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),
}

/// Count table errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("Action not in the record's known action set: {0}")]
    UnknownAction(String),

    #[error("Active count exceeds total count for {action}: {active} > {total}")]
    CountInvariant {
        action: String,
        active: u64,
        total: u64,
    },

    #[error("Count table for {0} exceeds the u64 range")]
    CountOverflow(String),
}

/// Persisted affordance parse errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LoadError {
    #[error("Missing header line")]
    MissingHeader,

    #[error("Malformed header (expected `precondition,goal`): {0}")]
    MalformedHeader(String),

    #[error("Unknown propositional function: {0}")]
    UnknownPredicate(String),

    #[error("Unknown action: {0}")]
    UnknownAction(String),

    #[error("Malformed count line {line_no}: {line}")]
    MalformedCountLine { line_no: usize, line: String },

    #[error("Invalid count on line {line_no}: {value}")]
    InvalidCount { line_no: usize, value: String },

    #[error("Duplicate action line for {0}")]
    DuplicateAction(String),

    #[error("Affordance {0} lists no actions")]
    EmptyRecord(String),

    #[error("Missing `===` terminator")]
    MissingTerminator,

    #[error("Invalid counts: {0}")]
    Counts(#[from] RecordError),
}

/// Pruning controller errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ControllerError {
    #[error("A pruning controller requires at least one affordance delegate")]
    NoDelegates,

    #[error("Registered affordances expose no actions")]
    EmptyActionSet,
}

/// Planner usage errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlannerError {
    #[error("Cannot run backups before reachable states have been discovered")]
    ReachabilityNotPerformed,

    #[error("Invalid discount factor: {0} (must be in (0, 1])")]
    InvalidDiscount(String),
}

/// Configuration validation errors
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Unknown selection policy: {0}")]
    UnknownPolicy(String),

    #[error("Unknown prior source: {0}")]
    UnknownPriorSource(String),

    #[error("Invalid value for {key}: {reason}")]
    InvalidValue { key: String, reason: String },
}

impl From<std::io::Error> for AffordanceError {
    fn from(err: std::io::Error) -> Self {
        AffordanceError::Storage(err.to_string())
    }
}
