//! A minimal JavaScript value realm.
//!
//! Module loading and shape probing both need real JavaScript identity and
//! access semantics: `default === namespace` checks, `typeof` checks, and the
//! `TypeError`s thrown when code reaches through a binding that is not there.
//! The realm provides exactly those and nothing more: no prototype chains,
//! no getters, no GC.

mod heap;
mod value;

pub use heap::{NativeCall, Realm};
pub use value::{FunctionId, ObjectId, Thrown, ThrownKind, Value};
