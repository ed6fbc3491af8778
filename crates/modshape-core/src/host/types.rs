//! Module host data model: formats, load strategies, export surfaces,
//! artifacts, and package exports maps.

use std::fmt;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::errors::HostError;
use crate::realm::{ObjectId, Realm};

/// Name of the interop marker property CommonJS transpilers set
/// (`exports.__esModule = true`).
pub const ESMODULE_FLAG: &str = "__esModule";

/// The module system an artifact belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModuleFormat {
    /// CommonJS: a mutable `exports` object, synchronous `require`.
    #[serde(rename = "commonjs")]
    CommonJs,
    /// An ES module: an immutable namespace, asynchronous import.
    #[serde(rename = "module")]
    EsModule,
}

impl fmt::Display for ModuleFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModuleFormat::CommonJs => f.write_str("commonjs"),
            ModuleFormat::EsModule => f.write_str("module"),
        }
    }
}

/// How the probe loads the module under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LoadStrategy {
    /// Resolve, evict any cached instance, then require a fresh copy
    /// synchronously through the CommonJS path.
    CachedReload,
    /// Ordinary asynchronous dynamic import.
    FreshDynamicLoad,
}

impl fmt::Display for LoadStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LoadStrategy::CachedReload => f.write_str("cached-reload"),
            LoadStrategy::FreshDynamicLoad => f.write_str("fresh-dynamic-load"),
        }
    }
}

/// What a module's `default` binding is, described statically.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DefaultBinding {
    /// No default binding at all.
    #[default]
    Absent,
    /// The CommonJS self-reference patch, `exports.default = exports`, which
    /// makes interop helpers resolve the whole module as the default.
    SelfReference,
    /// The default is the same binding as a named export
    /// (`export { Parser as default }` or `exports.default = Parser`).
    Alias(String),
    /// An independent default value.
    Stub,
}

/// Shape of a single exported binding, rich enough to materialize a stand-in
/// the probe can poke at.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ExportShape {
    /// A class-like callable with static members (`Parser.init`).
    Class { statics: Vec<String> },
    /// A plain callable.
    Function,
    /// An opaque object.
    Object,
    Bool(bool),
    Number(f64),
    Str(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NamedExport {
    pub name: String,
    pub shape: ExportShape,
}

impl NamedExport {
    pub fn class(name: impl Into<String>, statics: &[&str]) -> Self {
        Self {
            name: name.into(),
            shape: ExportShape::Class {
                statics: statics.iter().map(|s| s.to_string()).collect(),
            },
        }
    }

    pub fn function(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            shape: ExportShape::Function,
        }
    }

    pub fn value(name: impl Into<String>, shape: ExportShape) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }
}

/// A declarative description of what a module exports, rich enough to
/// materialize a faithful stand-in for its export object or namespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSurface {
    pub format: ModuleFormat,
    /// Whether the module sets the `__esModule` interop marker. Only
    /// meaningful for CommonJS transpiler output.
    #[serde(default)]
    pub esmodule_flag: bool,
    #[serde(default)]
    pub default_binding: DefaultBinding,
    #[serde(default)]
    pub named: Vec<NamedExport>,
}

impl ExportSurface {
    pub fn commonjs() -> Self {
        Self {
            format: ModuleFormat::CommonJs,
            esmodule_flag: false,
            default_binding: DefaultBinding::Absent,
            named: Vec::new(),
        }
    }

    pub fn es_module() -> Self {
        Self {
            format: ModuleFormat::EsModule,
            esmodule_flag: false,
            default_binding: DefaultBinding::Absent,
            named: Vec::new(),
        }
    }
}

/// Native population logic for an artifact: receives the realm and the fresh
/// exports object and fills it in.
pub type NativeFactory = Rc<dyn Fn(&mut Realm, ObjectId) -> Result<(), HostError>>;

/// Where an artifact's exports come from.
#[derive(Clone)]
pub enum ArtifactSource {
    /// Materialized from a declarative surface.
    Surface(ExportSurface),
    /// Populated by a native factory closure.
    Native(NativeFactory),
}

impl fmt::Debug for ArtifactSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArtifactSource::Surface(surface) => f.debug_tuple("Surface").field(surface).finish(),
            ArtifactSource::Native(_) => f.write_str("Native(..)"),
        }
    }
}

/// A loadable module registered with the host under a path.
#[derive(Debug, Clone)]
pub struct ModuleArtifact {
    pub format: ModuleFormat,
    pub source: ArtifactSource,
}

impl ModuleArtifact {
    pub fn from_surface(surface: ExportSurface) -> Self {
        Self {
            format: surface.format,
            source: ArtifactSource::Surface(surface),
        }
    }

    pub fn native(
        format: ModuleFormat,
        factory: impl Fn(&mut Realm, ObjectId) -> Result<(), HostError> + 'static,
    ) -> Self {
        Self {
            format,
            source: ArtifactSource::Native(Rc::new(factory)),
        }
    }
}

/// Resolution condition, mirroring the package.json `exports` conditions the
/// two loader paths use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Require,
    Import,
}

impl Condition {
    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Require => "require",
            Condition::Import => "import",
        }
    }
}

/// A package's conditional exports map. `default` is the fallback target when
/// no condition-specific entry matches.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportsMap {
    pub require: Option<String>,
    pub import: Option<String>,
    pub default: Option<String>,
}

impl ExportsMap {
    /// One artifact for every condition.
    pub fn single(path: impl Into<String>) -> Self {
        Self {
            require: None,
            import: None,
            default: Some(path.into()),
        }
    }

    /// The dual-package layout: one artifact for `require`, another for
    /// `import`.
    pub fn conditional(require: impl Into<String>, import: impl Into<String>) -> Self {
        Self {
            require: Some(require.into()),
            import: Some(import.into()),
            default: None,
        }
    }

    pub fn target(&self, condition: Condition) -> Option<&str> {
        let specific = match condition {
            Condition::Require => self.require.as_deref(),
            Condition::Import => self.import.as_deref(),
        };
        specific.or(self.default.as_deref())
    }
}
