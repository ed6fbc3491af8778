//! Error types for resolution, module loading, and source scanning.
//!
//! The split matters: failing to *reach* a module (resolution, registry,
//! format violations) is a Rust-level error and surfaces through these enums,
//! while a throw *inside* a loaded module's exports is runtime data the probe
//! captures as an invocation outcome and is deliberately not represented
//! here.

use std::path::PathBuf;

use thiserror::Error;

/// Failure to map a specifier to a registered artifact.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// No package or artifact is registered under the specifier.
    #[error("Cannot find module '{specifier}'")]
    NotFound { specifier: String },

    /// The specifier is neither a valid bare package name nor a path.
    #[error("Invalid module specifier '{specifier}'")]
    InvalidSpecifier { specifier: String },

    /// The package exists but its exports map has no target for the
    /// resolution condition in effect.
    #[error("No '{condition}' condition matched for package '{specifier}'")]
    NoConditionMatch {
        specifier: String,
        condition: &'static str,
    },

    /// The exports map points at a path with no registered artifact behind
    /// it. Registry misconfiguration, not a module defect.
    #[error("Package '{specifier}' resolved to unregistered artifact '{path}'")]
    UnregisteredArtifact { specifier: String, path: String },
}

/// Failure to load a module through the host.
#[derive(Debug, Error)]
pub enum HostError {
    #[error(transparent)]
    Resolve(#[from] ResolveError),

    /// `require()` reached an ES module artifact. Node refuses this; so do
    /// we.
    #[error("require() of ES Module '{specifier}' is not supported; use dynamic import instead")]
    RequireEsm { specifier: String },

    /// An export surface could not be materialized as described.
    #[error("Invalid export surface for '{path}': {message}")]
    Surface { path: String, message: String },

    /// A native module factory failed while populating its exports.
    #[error("Module factory for '{path}' failed: {message}")]
    Factory { path: String, message: String },
}

/// Failure while extracting an export surface from source text.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Failed to load grammar: {0}")]
    Grammar(#[from] tree_sitter::LanguageError),

    #[error("Failed to build query: {0}")]
    Query(#[from] tree_sitter::QueryError),

    #[error("Failed to parse source: {message}")]
    Parse { message: String },

    #[error("Unsupported source extension '{extension}'")]
    UnsupportedExtension { extension: String },

    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_errors_read_like_node() {
        let err = ResolveError::NotFound {
            specifier: "web-tree-sitter".into(),
        };
        assert_eq!(err.to_string(), "Cannot find module 'web-tree-sitter'");

        let err = ResolveError::NoConditionMatch {
            specifier: "esm-only".into(),
            condition: "require",
        };
        assert!(err.to_string().contains("'require'"));
    }

    #[test]
    fn host_error_wraps_resolution_transparently() {
        let inner = ResolveError::NotFound {
            specifier: "missing".into(),
        };
        let outer: HostError = inner.into();
        assert_eq!(outer.to_string(), "Cannot find module 'missing'");
    }

    #[test]
    fn require_esm_names_the_remedy() {
        let err = HostError::RequireEsm {
            specifier: "esm-only".into(),
        };
        assert!(err.to_string().contains("dynamic import"));
    }
}
