//! Planning logic
//!
//! Task definition, value function and Bellman backup, and the planners.

pub mod bounded_rtdp;
pub mod mdp;
pub mod rtdp;
pub mod value_function;
pub mod value_iteration;
