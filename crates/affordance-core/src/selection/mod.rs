//! Selection policies
pub mod policy;

pub use self::policy::SelectionPolicy;
