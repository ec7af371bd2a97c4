//! Affordance count model
pub mod record;

pub use self::record::AffordanceRecord;
