//! The realm arena: object and function storage plus the handful of abstract
//! operations the probe exercises (property access, calls).
//!
//! Property reads follow JavaScript semantics exactly where the diagnostics
//! depend on them: reading a missing key off an object yields `Undefined`,
//! reading any key off `undefined` or `null` throws, and calling a
//! non-function throws. Those thrown messages mirror the V8 wording because
//! they are the observable symptom the probe exists to capture.

use std::rc::Rc;

use rustc_hash::FxHashMap;

use super::value::{FunctionId, ObjectId, Thrown, Value};

/// Native behavior attached to a realm function. Receives the realm so it can
/// allocate or inspect while running.
pub type NativeCall = Rc<dyn Fn(&mut Realm, &[Value]) -> Result<Value, Thrown>>;

struct ObjectEntry {
    properties: FxHashMap<String, Value>,
}

struct FunctionEntry {
    name: String,
    properties: FxHashMap<String, Value>,
    /// `None` means a stub: callable, returns `Undefined`.
    call: Option<NativeCall>,
}

/// A single-threaded arena of JavaScript-like objects and functions.
///
/// Handles index into the arena and entries are never removed, so a handle
/// stays valid for the life of the realm. Identity comparisons (`===`) reduce
/// to handle equality.
#[derive(Default)]
pub struct Realm {
    objects: Vec<ObjectEntry>,
    functions: Vec<FunctionEntry>,
}

impl Realm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_object(&mut self) -> ObjectId {
        let id = ObjectId::new(self.objects.len());
        self.objects.push(ObjectEntry {
            properties: FxHashMap::default(),
        });
        id
    }

    /// Allocates a stub function: callable, no behavior, returns `Undefined`.
    pub fn new_function(&mut self, name: &str) -> FunctionId {
        self.alloc_function(name, None)
    }

    pub fn new_function_with(
        &mut self,
        name: &str,
        call: impl Fn(&mut Realm, &[Value]) -> Result<Value, Thrown> + 'static,
    ) -> FunctionId {
        self.alloc_function(name, Some(Rc::new(call)))
    }

    fn alloc_function(&mut self, name: &str, call: Option<NativeCall>) -> FunctionId {
        let id = FunctionId::new(self.functions.len());
        self.functions.push(FunctionEntry {
            name: name.to_string(),
            properties: FxHashMap::default(),
            call,
        });
        id
    }

    pub fn function_name(&self, id: FunctionId) -> &str {
        &self.functions[id.index()].name
    }

    pub fn set(&mut self, object: ObjectId, key: impl Into<String>, value: Value) {
        self.objects[object.index()]
            .properties
            .insert(key.into(), value);
    }

    /// Sets a property on a function object, which is how class statics like
    /// `Parser.init` are modeled.
    pub fn set_fn(&mut self, function: FunctionId, key: impl Into<String>, value: Value) {
        self.functions[function.index()]
            .properties
            .insert(key.into(), value);
    }

    /// Own-property read on an object handle. `None` means the key is absent,
    /// which JavaScript code cannot distinguish from `undefined` via `.` but
    /// the inspection layer can via `in`-style checks.
    pub fn get_own(&self, object: ObjectId, key: &str) -> Option<Value> {
        self.objects[object.index()].properties.get(key).cloned()
    }

    pub fn has_own(&self, object: ObjectId, key: &str) -> bool {
        self.objects[object.index()].properties.contains_key(key)
    }

    /// Own property keys of an object or function, sorted for determinism.
    /// Primitives have none.
    pub fn own_keys(&self, base: &Value) -> Vec<String> {
        let mut keys: Vec<String> = match base {
            Value::Object(id) => self.objects[id.index()].properties.keys().cloned().collect(),
            Value::Function(id) => self.functions[id.index()]
                .properties
                .keys()
                .cloned()
                .collect(),
            _ => Vec::new(),
        };
        keys.sort_unstable();
        keys
    }

    /// `base[key]` with JavaScript semantics: missing keys read as
    /// `Undefined`, property access on `undefined` or `null` throws a
    /// `TypeError` with the V8 wording.
    pub fn get_property(&self, base: &Value, key: &str) -> Result<Value, Thrown> {
        match base {
            Value::Undefined => Err(Thrown::type_error(format!(
                "Cannot read properties of undefined (reading '{key}')"
            ))),
            Value::Null => Err(Thrown::type_error(format!(
                "Cannot read properties of null (reading '{key}')"
            ))),
            Value::Object(id) => Ok(self.objects[id.index()]
                .properties
                .get(key)
                .cloned()
                .unwrap_or(Value::Undefined)),
            Value::Function(id) => Ok(self.functions[id.index()]
                .properties
                .get(key)
                .cloned()
                .unwrap_or(Value::Undefined)),
            // Boxed-primitive lookups all read as undefined here; nothing the
            // probe checks lives on a primitive wrapper.
            Value::Bool(_) | Value::Number(_) | Value::Str(_) => Ok(Value::Undefined),
        }
    }

    /// Calls `callee` with `args`. Non-functions throw a `TypeError`; stub
    /// functions return `Undefined`.
    pub fn call(&mut self, callee: &Value, args: &[Value]) -> Result<Value, Thrown> {
        match callee {
            Value::Function(id) => {
                let native = self.functions[id.index()].call.clone();
                match native {
                    Some(f) => f(self, args),
                    None => Ok(Value::Undefined),
                }
            }
            other => Err(Thrown::type_error(format!(
                "{} is not a function",
                self.describe(other)
            ))),
        }
    }

    /// Short value description for error messages.
    fn describe(&self, value: &Value) -> String {
        match value {
            Value::Undefined => "undefined".to_string(),
            Value::Null => "null".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            Value::Str(s) => format!("\"{s}\""),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Function(id) => self.functions[id.index()].name.clone(),
        }
    }
}
