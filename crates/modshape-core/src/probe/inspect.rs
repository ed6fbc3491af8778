//! Shape inspection and entry-point invocation.
//!
//! Inspection is read-only and idempotent: probing the same view twice
//! yields equal results. Invocation walks a property path with real
//! JavaScript access semantics and captures any throw as data. A throw here
//! is the symptom under study, not a failure of the probe.

use std::collections::BTreeSet;

use tracing::debug;

use crate::errors::HostError;
use crate::host::{LoadStrategy, ModuleHost};
use crate::realm::{ObjectId, Realm, Value};

use super::types::{InvocationOutcome, ProbeResult, ProbeSpec, PropertyPath};

/// Records what one loaded view looks like: default binding, namespace
/// identity, configured entry points, interop flag.
pub fn inspect(
    realm: &Realm,
    view: ObjectId,
    strategy: LoadStrategy,
    spec: &ProbeSpec,
) -> ProbeResult {
    let default = realm.get_own(view, "default");
    let has_default_binding = matches!(&default, Some(v) if !v.is_undefined());
    let default_equals_namespace = default
        .map(|v| v.strict_eq(&Value::Object(view)))
        .unwrap_or(false);

    let named_bindings_present: BTreeSet<String> = spec
        .entry_points
        .iter()
        .filter(|name| matches!(realm.get_own(view, name), Some(v) if !v.is_undefined()))
        .cloned()
        .collect();

    let interop_flag = realm
        .get_own(view, &spec.interop_flag)
        .map(|v| v.is_truthy());

    ProbeResult {
        strategy,
        has_default_binding,
        default_equals_namespace,
        named_bindings_present,
        interop_flag,
        invocation: None,
    }
}

/// Walks `path` from `candidate` and calls whatever it lands on, capturing
/// throws from both the traversal and the call. An empty path calls the
/// candidate itself.
pub fn attempt_call(realm: &mut Realm, candidate: Value, path: &PropertyPath) -> InvocationOutcome {
    let mut current = candidate;
    for segment in path.segments() {
        match realm.get_property(&current, segment) {
            Ok(next) => current = next,
            Err(thrown) => {
                return InvocationOutcome::Threw {
                    reason: thrown.message().to_string(),
                }
            }
        }
    }
    match realm.call(&current, &[]) {
        Ok(_) => InvocationOutcome::Succeeded,
        Err(thrown) => InvocationOutcome::Threw {
            reason: thrown.message().to_string(),
        },
    }
}

/// Loads a module under a strategy and records the shape of what came back.
#[derive(Debug, Clone, Default)]
pub struct ExportShapeProbe {
    spec: ProbeSpec,
}

impl ExportShapeProbe {
    pub fn new(spec: ProbeSpec) -> Self {
        Self { spec }
    }

    pub fn spec(&self) -> &ProbeSpec {
        &self.spec
    }

    /// Resolve, evict, require, inspect.
    pub fn probe_cached_reload(
        &self,
        host: &mut ModuleHost,
        specifier: &str,
    ) -> Result<ProbeResult, HostError> {
        let view = host.require_fresh(specifier)?;
        Ok(self.finish(host, view, LoadStrategy::CachedReload))
    }

    /// Dynamic import, inspect.
    pub async fn probe_dynamic(
        &self,
        host: &mut ModuleHost,
        specifier: &str,
    ) -> Result<ProbeResult, HostError> {
        let view = host.dynamic_import(specifier).await?;
        Ok(self.finish(host, view, LoadStrategy::FreshDynamicLoad))
    }

    pub async fn probe(
        &self,
        host: &mut ModuleHost,
        specifier: &str,
        strategy: LoadStrategy,
    ) -> Result<ProbeResult, HostError> {
        match strategy {
            LoadStrategy::CachedReload => self.probe_cached_reload(host, specifier),
            LoadStrategy::FreshDynamicLoad => self.probe_dynamic(host, specifier).await,
        }
    }

    /// Probes the same specifier under both strategies; the pair is what the
    /// divergence diagnostics compare.
    pub async fn probe_both(
        &self,
        host: &mut ModuleHost,
        specifier: &str,
    ) -> Result<(ProbeResult, ProbeResult), HostError> {
        let cached = self.probe_cached_reload(host, specifier)?;
        let dynamic = self.probe_dynamic(host, specifier).await?;
        Ok((cached, dynamic))
    }

    fn finish(&self, host: &mut ModuleHost, view: ObjectId, strategy: LoadStrategy) -> ProbeResult {
        let mut result = inspect(host.realm(), view, strategy, &self.spec);
        if let Some(path) = &self.spec.invoke {
            result.invocation = Some(attempt_call(host.realm_mut(), Value::Object(view), path));
        }
        debug!(
            target: "modshape::probe",
            %strategy,
            has_default = result.has_default_binding,
            default_is_namespace = result.default_equals_namespace,
            named = result.named_bindings_present.len(),
            "probe complete"
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::realm::Thrown;

    #[test]
    fn empty_path_calls_the_candidate() {
        let mut realm = Realm::new();
        let f = realm.new_function("factory");
        let outcome = attempt_call(&mut realm, Value::Function(f), &PropertyPath::parse(""));
        assert_eq!(outcome, InvocationOutcome::Succeeded);
    }

    #[test]
    fn traversal_through_undefined_is_captured() {
        let mut realm = Realm::new();
        let view = realm.new_object();
        let outcome = attempt_call(
            &mut realm,
            Value::Object(view),
            &PropertyPath::parse("default.init"),
        );
        match outcome {
            InvocationOutcome::Threw { reason } => {
                assert_eq!(
                    reason,
                    "Cannot read properties of undefined (reading 'init')"
                );
            }
            InvocationOutcome::Succeeded => panic!("expected a captured throw"),
        }
    }

    #[test]
    fn a_throwing_entry_point_is_captured_not_propagated() {
        let mut realm = Realm::new();
        let view = realm.new_object();
        let f = realm.new_function_with("init", |_, _| Err(Thrown::error("wasm init failed")));
        realm.set(view, "init", Value::Function(f));
        let outcome = attempt_call(&mut realm, Value::Object(view), &PropertyPath::parse("init"));
        assert_eq!(
            outcome,
            InvocationOutcome::Threw {
                reason: "wasm init failed".into()
            }
        );
    }

    #[test]
    fn inspect_is_idempotent() {
        let mut realm = Realm::new();
        let view = realm.new_object();
        realm.set(view, "default", Value::Object(view));
        realm.set(view, "__esModule", Value::Bool(true));
        let spec = ProbeSpec::with_entry_points(&["Parser"]);
        let first = inspect(&realm, view, LoadStrategy::CachedReload, &spec);
        let second = inspect(&realm, view, LoadStrategy::CachedReload, &spec);
        assert_eq!(first, second);
        assert!(first.default_equals_namespace);
        assert!(first.named_bindings_present.is_empty());
    }

    #[test]
    fn present_but_undefined_binding_does_not_count() {
        let mut realm = Realm::new();
        let view = realm.new_object();
        realm.set(view, "default", Value::Undefined);
        realm.set(view, "Parser", Value::Undefined);
        let spec = ProbeSpec::with_entry_points(&["Parser"]);
        let result = inspect(&realm, view, LoadStrategy::FreshDynamicLoad, &spec);
        assert!(!result.has_default_binding);
        assert!(result.named_bindings_present.is_empty());
    }
}
