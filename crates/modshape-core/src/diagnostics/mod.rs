//! Mismatch detection over probe results and declared surfaces.

mod compare;
mod types;

pub use compare::{diagnose_declarations, diagnose_views};
pub use types::{Finding, MismatchKind, Severity, ShapeReport};
