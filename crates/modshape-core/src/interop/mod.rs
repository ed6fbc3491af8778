//! TypeScript emit-helper semantics: `__importDefault` and `__importStar`.
//!
//! These reproduce what `esModuleInterop` compiles default and namespace
//! imports into. They are where the headline defect becomes visible: a
//! flagged module without a `default` binding sails through `__importDefault`
//! and hands the consumer `undefined` where the types promised a value.

use crate::host::ESMODULE_FLAG;
use crate::realm::{Realm, Thrown, Value};

/// The helpers' flag test: a truthy module carrying a truthy `__esModule`.
/// Never throws, even for primitives and `null`.
pub fn is_flagged(realm: &Realm, module: &Value) -> bool {
    if !module.is_truthy() {
        return false;
    }
    realm
        .get_property(module, ESMODULE_FLAG)
        .map(|flag| flag.is_truthy())
        .unwrap_or(false)
}

/// `__importDefault(mod)`: the module itself when it carries the interop
/// flag, otherwise a wrapper object with the module as its `default`.
pub fn import_default(realm: &mut Realm, module: &Value) -> Value {
    if is_flagged(realm, module) {
        return module.clone();
    }
    let wrapper = realm.new_object();
    realm.set(wrapper, "default", module.clone());
    Value::Object(wrapper)
}

/// The value a compiled default import actually binds: the `default`
/// property of the `__importDefault` result. This is the expression that
/// comes back `undefined` when the flag is set but no default exists.
pub fn default_import_binding(realm: &mut Realm, module: &Value) -> Result<Value, Thrown> {
    let imported = import_default(realm, module);
    realm.get_property(&imported, "default")
}

/// `__importStar(mod)`: the module itself when flagged, otherwise a fresh
/// namespace-like object with the module's own keys copied over (minus
/// `default`) and `default` bound to the whole module.
pub fn import_star(realm: &mut Realm, module: &Value) -> Value {
    if is_flagged(realm, module) {
        return module.clone();
    }
    let namespace = realm.new_object();
    for key in realm.own_keys(module) {
        if key == "default" {
            continue;
        }
        if let Ok(value) = realm.get_property(module, &key) {
            realm.set(namespace, key, value);
        }
    }
    realm.set(namespace, "default", module.clone());
    Value::Object(namespace)
}
