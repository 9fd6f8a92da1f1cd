mod kind;

pub use kind::ElectionType;

/// Graduation years gate eligibility.
pub type GradYear = i32;
