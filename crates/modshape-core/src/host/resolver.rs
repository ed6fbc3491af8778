//! Specifier resolution against the registered package and artifact tables.

use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::FxHashMap;
use tracing::debug;

use crate::errors::ResolveError;

use super::types::{Condition, ExportsMap, ModuleArtifact};

/// npm-style package name: optional lowercase scope, lowercase name, optional
/// subpath segments.
static BARE_SPECIFIER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(@[a-z0-9\-~][a-z0-9\-._~]*/)?[a-z0-9\-~][a-z0-9\-._~]*(/[a-zA-Z0-9._\-]+)*$")
        .unwrap()
});

fn is_path_specifier(specifier: &str) -> bool {
    specifier.starts_with("./") || specifier.starts_with("../") || specifier.starts_with('/')
}

/// The host's registration tables: package specifiers with their exports
/// maps, and artifact paths with the modules behind them.
#[derive(Debug, Default)]
pub(crate) struct Registry {
    packages: FxHashMap<String, ExportsMap>,
    artifacts: FxHashMap<String, ModuleArtifact>,
}

impl Registry {
    pub fn register_package(&mut self, specifier: String, exports: ExportsMap) {
        debug!(target: "modshape::host", %specifier, "registered package");
        self.packages.insert(specifier, exports);
    }

    pub fn register_artifact(&mut self, path: String, artifact: ModuleArtifact) {
        debug!(target: "modshape::host", %path, format = %artifact.format, "registered artifact");
        self.artifacts.insert(path, artifact);
    }

    pub fn artifact(&self, path: &str) -> Option<&ModuleArtifact> {
        self.artifacts.get(path)
    }

    /// Maps a specifier to the artifact path the given condition selects.
    ///
    /// Path specifiers must name a registered artifact directly. Bare
    /// specifiers go through the package table and its exports map, and the
    /// selected target must itself be registered.
    pub fn resolve(&self, specifier: &str, condition: Condition) -> Result<String, ResolveError> {
        if is_path_specifier(specifier) {
            if self.artifacts.contains_key(specifier) {
                return Ok(specifier.to_string());
            }
            return Err(ResolveError::NotFound {
                specifier: specifier.to_string(),
            });
        }

        if !BARE_SPECIFIER_RE.is_match(specifier) {
            return Err(ResolveError::InvalidSpecifier {
                specifier: specifier.to_string(),
            });
        }

        let exports = self
            .packages
            .get(specifier)
            .ok_or_else(|| ResolveError::NotFound {
                specifier: specifier.to_string(),
            })?;

        let path = exports
            .target(condition)
            .ok_or_else(|| ResolveError::NoConditionMatch {
                specifier: specifier.to_string(),
                condition: condition.as_str(),
            })?;

        if !self.artifacts.contains_key(path) {
            return Err(ResolveError::UnregisteredArtifact {
                specifier: specifier.to_string(),
                path: path.to_string(),
            });
        }

        debug!(
            target: "modshape::host",
            %specifier,
            condition = condition.as_str(),
            %path,
            "resolved"
        );
        Ok(path.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::types::{ExportSurface, ModuleArtifact};

    fn registry_with(path: &str) -> Registry {
        let mut registry = Registry::default();
        registry.register_artifact(
            path.to_string(),
            ModuleArtifact::from_surface(ExportSurface::commonjs()),
        );
        registry
    }

    #[test]
    fn path_specifiers_resolve_to_themselves() {
        let registry = registry_with("./pkg/index.cjs");
        let path = registry
            .resolve("./pkg/index.cjs", Condition::Require)
            .unwrap();
        assert_eq!(path, "./pkg/index.cjs");
    }

    #[test]
    fn unknown_path_is_not_found() {
        let registry = Registry::default();
        let err = registry
            .resolve("./missing.cjs", Condition::Require)
            .unwrap_err();
        assert!(matches!(err, ResolveError::NotFound { .. }));
    }

    #[test]
    fn malformed_bare_specifier_is_invalid() {
        let registry = Registry::default();
        for bad in ["Not A Module", "UPPER", "!bang", ""] {
            let err = registry.resolve(bad, Condition::Import).unwrap_err();
            assert!(
                matches!(err, ResolveError::InvalidSpecifier { .. }),
                "{bad:?} should be invalid"
            );
        }
    }

    #[test]
    fn scoped_names_and_subpaths_are_valid_shapes() {
        let registry = Registry::default();
        for name in ["web-tree-sitter", "@scope/pkg", "pkg/subpath"] {
            let err = registry.resolve(name, Condition::Import).unwrap_err();
            assert!(
                matches!(err, ResolveError::NotFound { .. }),
                "{name:?} should be well-formed but unregistered"
            );
        }
    }

    #[test]
    fn package_resolution_honors_conditions() {
        let mut registry = registry_with("./index.cjs");
        registry.register_package(
            "dual".into(),
            ExportsMap::conditional("./index.cjs", "./index.mjs"),
        );

        let path = registry.resolve("dual", Condition::Require).unwrap();
        assert_eq!(path, "./index.cjs");

        // The import target was never registered as an artifact.
        let err = registry.resolve("dual", Condition::Import).unwrap_err();
        assert!(matches!(err, ResolveError::UnregisteredArtifact { .. }));
    }

    #[test]
    fn missing_condition_is_reported() {
        let mut registry = Registry::default();
        registry.register_package(
            "import-only".into(),
            ExportsMap {
                require: None,
                import: Some("./index.mjs".into()),
                default: None,
            },
        );
        let err = registry
            .resolve("import-only", Condition::Require)
            .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::NoConditionMatch {
                condition: "require",
                ..
            }
        ));
    }
}
