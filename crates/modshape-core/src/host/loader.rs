//! The module host: a CommonJS `require` with an evictable instance cache,
//! and an asynchronous dynamic-import path with Node-style interop synthesis
//! for CommonJS artifacts.
//!
//! Two caches, two lifecycles. The CommonJS cache can be evicted per path,
//! which is what makes the cached-reload strategy observable. The ES module
//! map is append-only: once a specifier has been imported, every later
//! import sees the same namespace object, eviction or not.

use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::{HostError, ResolveError};
use crate::realm::{ObjectId, Realm, Value};

use super::resolver::Registry;
use super::types::{
    ArtifactSource, Condition, DefaultBinding, ExportShape, ExportSurface, ExportsMap,
    ModuleArtifact, ModuleFormat, ESMODULE_FLAG,
};

/// Owns the realm, the registry, and both module caches. Single-threaded by
/// construction: artifact factories are realm-bound `Rc` closures, so the
/// host is deliberately `!Send`.
pub struct ModuleHost {
    realm: Realm,
    registry: Registry,
    cjs_cache: FxHashMap<String, ObjectId>,
    esm_modules: FxHashMap<String, ObjectId>,
}

impl Default for ModuleHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleHost {
    pub fn new() -> Self {
        Self {
            realm: Realm::new(),
            registry: Registry::default(),
            cjs_cache: FxHashMap::default(),
            esm_modules: FxHashMap::default(),
        }
    }

    pub fn realm(&self) -> &Realm {
        &self.realm
    }

    pub fn realm_mut(&mut self) -> &mut Realm {
        &mut self.realm
    }

    pub fn register_artifact(&mut self, path: impl Into<String>, artifact: ModuleArtifact) {
        self.registry.register_artifact(path.into(), artifact);
    }

    pub fn register_package(&mut self, specifier: impl Into<String>, exports: ExportsMap) {
        self.registry.register_package(specifier.into(), exports);
    }

    /// Maps a specifier to an artifact path without loading anything.
    pub fn resolve(&self, specifier: &str, condition: Condition) -> Result<String, ResolveError> {
        self.registry.resolve(specifier, condition)
    }

    /// Synchronous CommonJS load. Cached: requiring the same path twice
    /// yields the identical exports object.
    pub fn require(&mut self, specifier: &str) -> Result<ObjectId, HostError> {
        let path = self.resolve(specifier, Condition::Require)?;
        self.require_resolved(&path, specifier)
    }

    /// Drops the cached CommonJS instance for a path. Returns whether an
    /// instance was actually cached. The ES module map is unaffected.
    pub fn evict(&mut self, path: &str) -> bool {
        let evicted = self.cjs_cache.remove(path).is_some();
        debug!(target: "modshape::host", %path, evicted, "cache eviction");
        evicted
    }

    /// Resolve, evict, require: the cached-reload strategy. The returned
    /// exports object is a fresh instance, never a cache hit.
    pub fn require_fresh(&mut self, specifier: &str) -> Result<ObjectId, HostError> {
        let path = self.resolve(specifier, Condition::Require)?;
        self.evict(&path);
        self.require_resolved(&path, specifier)
    }

    /// Asynchronous dynamic import: the fresh-dynamic-load strategy.
    ///
    /// Resolves under the `import` condition. An ES module artifact is
    /// instantiated as a namespace; a CommonJS artifact is required and then
    /// wrapped in a synthesized namespace the way Node's interop layer does
    /// it, with `default` bound to the whole exports object. The namespace is
    /// recorded in the module map and reused on every later import of the
    /// same path.
    ///
    /// Completion takes at least one suspension, mirroring the microtask hop
    /// a real `import()` never skips.
    pub async fn dynamic_import(&mut self, specifier: &str) -> Result<ObjectId, HostError> {
        let path = self.resolve(specifier, Condition::Import)?;
        if let Some(&namespace) = self.esm_modules.get(&path) {
            debug!(target: "modshape::host", %path, "module map hit");
            return Ok(namespace);
        }

        // import() settles no earlier than the next microtask turn.
        tokio::task::yield_now().await;

        let artifact = self.artifact_for(specifier, &path)?;
        let namespace = match artifact.format {
            ModuleFormat::EsModule => self.instantiate_namespace(&path, &artifact)?,
            ModuleFormat::CommonJs => {
                let exports = self.require_resolved(&path, specifier)?;
                self.synthesize_cjs_namespace(&artifact, exports)
            }
        };

        debug!(target: "modshape::host", %path, "namespace instantiated");
        self.esm_modules.insert(path, namespace);
        Ok(namespace)
    }

    fn require_resolved(&mut self, path: &str, specifier: &str) -> Result<ObjectId, HostError> {
        if let Some(&exports) = self.cjs_cache.get(path) {
            debug!(target: "modshape::host", %path, "require cache hit");
            return Ok(exports);
        }

        let artifact = self.artifact_for(specifier, path)?;
        if artifact.format == ModuleFormat::EsModule {
            return Err(HostError::RequireEsm {
                specifier: specifier.to_string(),
            });
        }

        let exports = self.execute_commonjs(path, &artifact)?;
        self.cjs_cache.insert(path.to_string(), exports);
        debug!(target: "modshape::host", %path, "commonjs instantiated");
        Ok(exports)
    }

    fn artifact_for(&self, specifier: &str, path: &str) -> Result<ModuleArtifact, HostError> {
        self.registry
            .artifact(path)
            .cloned()
            .ok_or_else(|| {
                ResolveError::UnregisteredArtifact {
                    specifier: specifier.to_string(),
                    path: path.to_string(),
                }
                .into()
            })
    }

    /// Runs a CommonJS artifact: fresh exports object, populated from the
    /// surface or by the native factory.
    fn execute_commonjs(&mut self, path: &str, artifact: &ModuleArtifact) -> Result<ObjectId, HostError> {
        let exports = self.realm.new_object();
        match &artifact.source {
            ArtifactSource::Native(factory) => {
                let factory = factory.clone();
                factory(&mut self.realm, exports)?;
            }
            ArtifactSource::Surface(surface) => {
                self.materialize_commonjs(path, surface, exports)?;
            }
        }
        Ok(exports)
    }

    fn materialize_commonjs(
        &mut self,
        path: &str,
        surface: &ExportSurface,
        exports: ObjectId,
    ) -> Result<(), HostError> {
        if surface.esmodule_flag {
            self.realm.set(exports, ESMODULE_FLAG, Value::Bool(true));
        }
        for named in &surface.named {
            let value = self.materialize_shape(&named.name, &named.shape);
            self.realm.set(exports, named.name.clone(), value);
        }
        match &surface.default_binding {
            DefaultBinding::Absent => {}
            DefaultBinding::SelfReference => {
                self.realm.set(exports, "default", Value::Object(exports));
            }
            DefaultBinding::Alias(name) => {
                let target = self.realm.get_own(exports, name).ok_or_else(|| {
                    HostError::Surface {
                        path: path.to_string(),
                        message: format!("default aliases unknown export '{name}'"),
                    }
                })?;
                self.realm.set(exports, "default", target);
            }
            DefaultBinding::Stub => {
                let stub = self.realm.new_object();
                self.realm.set(exports, "default", Value::Object(stub));
            }
        }
        Ok(())
    }

    /// Builds an ES namespace object from an ES module artifact. Namespaces
    /// never carry the interop flag, and a self-referential default is a
    /// CommonJS pattern that has no ES equivalent.
    fn instantiate_namespace(
        &mut self,
        path: &str,
        artifact: &ModuleArtifact,
    ) -> Result<ObjectId, HostError> {
        let namespace = self.realm.new_object();
        match &artifact.source {
            ArtifactSource::Native(factory) => {
                let factory = factory.clone();
                factory(&mut self.realm, namespace)?;
            }
            ArtifactSource::Surface(surface) => {
                if surface.default_binding == DefaultBinding::SelfReference {
                    return Err(HostError::Surface {
                        path: path.to_string(),
                        message: "self-referential default is a CommonJS pattern".to_string(),
                    });
                }
                for named in &surface.named {
                    let value = self.materialize_shape(&named.name, &named.shape);
                    self.realm.set(namespace, named.name.clone(), value);
                }
                match &surface.default_binding {
                    DefaultBinding::Absent | DefaultBinding::SelfReference => {}
                    DefaultBinding::Alias(name) => {
                        // Live-binding alias: default is the very same value
                        // as the named export.
                        let target =
                            self.realm.get_own(namespace, name).ok_or_else(|| {
                                HostError::Surface {
                                    path: path.to_string(),
                                    message: format!("default aliases unknown export '{name}'"),
                                }
                            })?;
                        self.realm.set(namespace, "default", target);
                    }
                    DefaultBinding::Stub => {
                        let stub = self.realm.new_object();
                        self.realm.set(namespace, "default", Value::Object(stub));
                    }
                }
            }
        }
        Ok(namespace)
    }

    /// Node's CommonJS-to-ESM interop view: `default` is bound to the whole
    /// exports object, and the statically detectable named exports are
    /// re-exposed on the namespace.
    fn synthesize_cjs_namespace(&mut self, artifact: &ModuleArtifact, exports: ObjectId) -> ObjectId {
        let namespace = self.realm.new_object();
        match &artifact.source {
            ArtifactSource::Surface(surface) => {
                if surface.esmodule_flag {
                    if let Some(flag) = self.realm.get_own(exports, ESMODULE_FLAG) {
                        self.realm.set(namespace, ESMODULE_FLAG, flag);
                    }
                }
                for named in &surface.named {
                    if let Some(value) = self.realm.get_own(exports, &named.name) {
                        self.realm.set(namespace, named.name.clone(), value);
                    }
                }
            }
            ArtifactSource::Native(_) => {
                // No source text to lex; every own key stands in for what the
                // CJS lexer would have found.
                for key in self.realm.own_keys(&Value::Object(exports)) {
                    if key == "default" {
                        continue;
                    }
                    if let Some(value) = self.realm.get_own(exports, &key) {
                        self.realm.set(namespace, key, value);
                    }
                }
            }
        }
        self.realm.set(namespace, "default", Value::Object(exports));
        namespace
    }

    /// Materializes a stand-in value for one exported binding.
    fn materialize_shape(&mut self, name: &str, shape: &ExportShape) -> Value {
        match shape {
            ExportShape::Class { statics } => {
                let class = self.realm.new_function(name);
                for static_name in statics {
                    let method = self
                        .realm
                        .new_function(&format!("{name}.{static_name}"));
                    self.realm
                        .set_fn(class, static_name.clone(), Value::Function(method));
                }
                Value::Function(class)
            }
            ExportShape::Function => Value::Function(self.realm.new_function(name)),
            ExportShape::Object => Value::Object(self.realm.new_object()),
            ExportShape::Bool(b) => Value::Bool(*b),
            ExportShape::Number(n) => Value::Number(*n),
            ExportShape::Str(s) => Value::Str(s.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::types::NamedExport;

    fn patched_bundle() -> ExportSurface {
        ExportSurface {
            format: ModuleFormat::CommonJs,
            esmodule_flag: true,
            default_binding: DefaultBinding::SelfReference,
            named: vec![
                NamedExport::class("Parser", &["init"]),
                NamedExport::class("Language", &["load"]),
            ],
        }
    }

    fn host_with(path: &str, surface: ExportSurface) -> ModuleHost {
        let mut host = ModuleHost::new();
        host.register_artifact(path, ModuleArtifact::from_surface(surface));
        host
    }

    #[test]
    fn require_caches_and_evict_invalidates() {
        let mut host = host_with("./bundle.cjs", patched_bundle());
        let first = host.require("./bundle.cjs").unwrap();
        let second = host.require("./bundle.cjs").unwrap();
        assert_eq!(first, second);

        assert!(host.evict("./bundle.cjs"));
        assert!(!host.evict("./bundle.cjs"));

        let third = host.require("./bundle.cjs").unwrap();
        assert_ne!(first, third);
    }

    #[test]
    fn require_fresh_always_reinstantiates() {
        let mut host = host_with("./bundle.cjs", patched_bundle());
        let first = host.require_fresh("./bundle.cjs").unwrap();
        let second = host.require_fresh("./bundle.cjs").unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn self_reference_default_points_at_exports() {
        let mut host = host_with("./bundle.cjs", patched_bundle());
        let exports = host.require("./bundle.cjs").unwrap();
        let default = host.realm().get_own(exports, "default").unwrap();
        assert!(default.strict_eq(&Value::Object(exports)));
        let flag = host.realm().get_own(exports, ESMODULE_FLAG).unwrap();
        assert!(flag.is_truthy());
    }

    #[test]
    fn single_target_package_serves_both_conditions() {
        let mut host = host_with("./bundle.cjs", patched_bundle());
        host.register_package("tree-sitter-wasm", ExportsMap::single("./bundle.cjs"));
        assert_eq!(
            host.resolve("tree-sitter-wasm", Condition::Require).unwrap(),
            "./bundle.cjs"
        );
        assert_eq!(
            host.resolve("tree-sitter-wasm", Condition::Import).unwrap(),
            "./bundle.cjs"
        );
    }

    #[test]
    fn function_and_value_shapes_materialize() {
        let mut surface = ExportSurface::commonjs();
        surface.named = vec![
            NamedExport::function("parse"),
            NamedExport::value("version", ExportShape::Str("0.25.0".into())),
        ];
        let mut host = host_with("./util.cjs", surface);
        let exports = host.require("./util.cjs").unwrap();
        let parse = host.realm().get_own(exports, "parse").unwrap();
        assert_eq!(parse.type_of(), "function");
        assert_eq!(
            host.realm().get_own(exports, "version"),
            Some(Value::Str("0.25.0".into()))
        );
    }

    #[test]
    fn alias_default_shares_identity_with_named() {
        let mut surface = ExportSurface::commonjs();
        surface.named = vec![NamedExport::class("Parser", &[])];
        surface.default_binding = DefaultBinding::Alias("Parser".into());
        let mut host = host_with("./aliased.cjs", surface);
        let exports = host.require("./aliased.cjs").unwrap();
        let default = host.realm().get_own(exports, "default").unwrap();
        let parser = host.realm().get_own(exports, "Parser").unwrap();
        assert!(default.strict_eq(&parser));
    }

    #[test]
    fn alias_to_unknown_export_is_a_surface_error() {
        let mut surface = ExportSurface::commonjs();
        surface.default_binding = DefaultBinding::Alias("Missing".into());
        let mut host = host_with("./broken.cjs", surface);
        let err = host.require("./broken.cjs").unwrap_err();
        assert!(matches!(err, HostError::Surface { .. }));
    }

    #[test]
    fn require_of_es_module_is_refused() {
        let mut surface = ExportSurface::es_module();
        surface.named = vec![NamedExport::class("Parser", &[])];
        let mut host = host_with("./index.mjs", surface);
        let err = host.require("./index.mjs").unwrap_err();
        assert!(matches!(err, HostError::RequireEsm { .. }));
    }

    #[tokio::test]
    async fn dynamic_import_of_es_module_has_no_interop_flag() {
        let mut surface = ExportSurface::es_module();
        surface.named = vec![NamedExport::class("Parser", &["init"])];
        let mut host = host_with("./index.mjs", surface);
        let namespace = host.dynamic_import("./index.mjs").await.unwrap();
        assert_eq!(host.realm().get_own(namespace, "default"), None);
        assert_eq!(host.realm().get_own(namespace, ESMODULE_FLAG), None);
        let parser = host.realm().get_own(namespace, "Parser").unwrap();
        assert_eq!(parser.type_of(), "function");
    }

    #[tokio::test]
    async fn module_map_survives_cjs_eviction() {
        let mut host = host_with("./bundle.cjs", patched_bundle());
        let first = host.dynamic_import("./bundle.cjs").await.unwrap();
        host.evict("./bundle.cjs");
        let second = host.dynamic_import("./bundle.cjs").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn cjs_import_synthesizes_default_as_whole_exports() {
        let mut host = host_with("./bundle.cjs", patched_bundle());
        let exports = host.require("./bundle.cjs").unwrap();
        let namespace = host.dynamic_import("./bundle.cjs").await.unwrap();
        assert_ne!(namespace, exports);
        let default = host.realm().get_own(namespace, "default").unwrap();
        assert!(default.strict_eq(&Value::Object(exports)));
        // Named exports are re-exposed with the same identity.
        let ns_parser = host.realm().get_own(namespace, "Parser").unwrap();
        let cjs_parser = host.realm().get_own(exports, "Parser").unwrap();
        assert!(ns_parser.strict_eq(&cjs_parser));
    }

    #[tokio::test]
    async fn native_cjs_import_copies_own_keys() {
        let mut host = ModuleHost::new();
        host.register_artifact(
            "./native.cjs",
            ModuleArtifact::native(ModuleFormat::CommonJs, |realm, exports| {
                let probe = realm.new_function("probe");
                realm.set(exports, "probe", Value::Function(probe));
                realm.set(exports, "version", Value::Str("0.25.0".into()));
                Ok(())
            }),
        );
        let namespace = host.dynamic_import("./native.cjs").await.unwrap();
        let probe = host.realm().get_own(namespace, "probe").unwrap();
        assert_eq!(probe.type_of(), "function");
        assert_eq!(
            host.realm().get_own(namespace, "version"),
            Some(Value::Str("0.25.0".into()))
        );
        assert!(host.realm().get_own(namespace, "default").is_some());
    }

    #[test]
    fn native_factory_failures_surface() {
        let mut host = ModuleHost::new();
        host.register_artifact(
            "./faulty.cjs",
            ModuleArtifact::native(ModuleFormat::CommonJs, |_, _| {
                Err(HostError::Factory {
                    path: "./faulty.cjs".into(),
                    message: "wasm blob missing".into(),
                })
            }),
        );
        let err = host.require("./faulty.cjs").unwrap_err();
        assert!(matches!(err, HostError::Factory { .. }));
    }

    #[tokio::test]
    async fn self_referential_default_in_es_surface_is_rejected() {
        let mut surface = ExportSurface::es_module();
        surface.default_binding = DefaultBinding::SelfReference;
        let mut host = host_with("./weird.mjs", surface);
        let err = host.dynamic_import("./weird.mjs").await.unwrap_err();
        assert!(matches!(err, HostError::Surface { .. }));
    }
}
