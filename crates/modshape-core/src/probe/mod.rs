//! The export-shape probe: load a module under a strategy, inspect what the
//! loaded view actually exposes, optionally invoke an entry point.

mod inspect;
mod types;

pub use inspect::{attempt_call, inspect, ExportShapeProbe};
pub use types::{InvocationOutcome, ProbeResult, ProbeSpec, PropertyPath};
