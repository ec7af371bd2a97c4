//! Core data types for affordance-aware planning

pub mod action_key;
pub mod logic;
pub mod mdp;
