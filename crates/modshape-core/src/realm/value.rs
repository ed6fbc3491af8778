//! JavaScript-like values with identity semantics.
//!
//! Objects and functions are handles into a [`Realm`](super::Realm) arena, so
//! strict equality on them is arena-index equality. That is the `===` identity
//! the probe relies on when it checks `default` against the namespace object.

use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub struct $name(pub(crate) u32);

        impl $name {
            pub(crate) fn new(index: usize) -> Self {
                Self(index as u32)
            }

            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }
    };
}

define_id!(
    /// Handle to an object in a realm. Only meaningful within the realm that
    /// minted it.
    ObjectId
);

define_id!(
    /// Handle to a function in a realm.
    FunctionId
);

/// A JavaScript-like value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    Str(String),
    Object(ObjectId),
    Function(FunctionId),
}

impl Value {
    /// The `typeof` string for this value, including the historical
    /// `typeof null === "object"` quirk.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::Str(_) => "string",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// JavaScript `ToBoolean`.
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => *n != 0.0 && !n.is_nan(),
            Value::Str(s) => !s.is_empty(),
            Value::Object(_) | Value::Function(_) => true,
        }
    }

    /// JavaScript strict equality (`===`).
    ///
    /// For the value kinds modeled here this coincides with Rust equality:
    /// objects and functions compare by handle, primitives by value, and
    /// `NaN !== NaN` falls out of `f64` comparison.
    pub fn strict_eq(&self, other: &Value) -> bool {
        self == other
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_))
    }
}

/// The error classes a realm operation can throw.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThrownKind {
    Error,
    TypeError,
    RangeError,
}

impl ThrownKind {
    pub fn name(self) -> &'static str {
        match self {
            ThrownKind::Error => "Error",
            ThrownKind::TypeError => "TypeError",
            ThrownKind::RangeError => "RangeError",
        }
    }
}

/// A thrown JavaScript error. This is runtime data observed by the probe, not
/// a Rust-level failure: it only ever surfaces as a captured invocation
/// outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct Thrown {
    pub kind: ThrownKind,
    pub message: String,
}

impl Thrown {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: ThrownKind::Error,
            message: message.into(),
        }
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self {
            kind: ThrownKind::TypeError,
            message: message.into(),
        }
    }

    /// The error message without the class prefix, as `e.message` reads it.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Thrown {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.name(), self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn typeof_matches_javascript() {
        assert_eq!(Value::Undefined.type_of(), "undefined");
        assert_eq!(Value::Null.type_of(), "object");
        assert_eq!(Value::Bool(true).type_of(), "boolean");
        assert_eq!(Value::Number(1.5).type_of(), "number");
        assert_eq!(Value::Str("x".into()).type_of(), "string");
        assert_eq!(Value::Object(ObjectId::new(0)).type_of(), "object");
        assert_eq!(Value::Function(FunctionId::new(0)).type_of(), "function");
    }

    #[test]
    fn truthiness_matches_javascript() {
        assert!(!Value::Undefined.is_truthy());
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Bool(false).is_truthy());
        assert!(!Value::Number(0.0).is_truthy());
        assert!(!Value::Number(f64::NAN).is_truthy());
        assert!(!Value::Str(String::new()).is_truthy());
        assert!(Value::Number(-1.0).is_truthy());
        assert!(Value::Str("0".into()).is_truthy());
        assert!(Value::Object(ObjectId::new(0)).is_truthy());
    }

    #[test]
    fn strict_eq_is_identity_for_handles_and_value_for_primitives() {
        let a = Value::Object(ObjectId::new(1));
        let b = Value::Object(ObjectId::new(1));
        let c = Value::Object(ObjectId::new(2));
        assert!(a.strict_eq(&b));
        assert!(!a.strict_eq(&c));
        assert!(!Value::Number(f64::NAN).strict_eq(&Value::Number(f64::NAN)));
        assert!(Value::Str("x".into()).strict_eq(&Value::Str("x".into())));
        assert!(!Value::Undefined.strict_eq(&Value::Null));
    }

    #[test]
    fn thrown_displays_with_class_prefix() {
        let t = Thrown::type_error("Parser is not a function");
        assert_eq!(t.to_string(), "TypeError: Parser is not a function");
        assert_eq!(t.message(), "Parser is not a function");
    }
}
