//! Types produced by the source scanners.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::host::{DefaultBinding, ExportShape, ExportSurface, ModuleFormat, NamedExport};

/// What the scanner could tell about an exported binding's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScannedExportKind {
    /// The right-hand side is a class or function.
    Callable,
    /// Anything the scanner cannot classify statically.
    Unknown,
}

/// Export surface extracted from CommonJS source text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScannedSurface {
    /// The module sets `__esModule`, by assignment or `defineProperty`.
    pub esmodule_flag: bool,
    pub default_binding: DefaultBinding,
    /// Named exports, excluding `default` and the interop marker.
    pub exports: FxHashMap<String, ScannedExportKind>,
    /// `module.exports = …` replaced the exports object wholesale.
    pub replaced_module_exports: bool,
}

impl ScannedSurface {
    /// Export names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.exports.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Lowers the scan into a loadable surface description.
    pub fn into_export_surface(self) -> ExportSurface {
        let mut named: Vec<NamedExport> = Vec::with_capacity(self.exports.len());
        for name in self.names() {
            let shape = match self.exports[&name] {
                ScannedExportKind::Callable => ExportShape::Class {
                    statics: Vec::new(),
                },
                ScannedExportKind::Unknown => ExportShape::Object,
            };
            named.push(NamedExport { name, shape });
        }
        ExportSurface {
            format: ModuleFormat::CommonJs,
            esmodule_flag: self.esmodule_flag,
            default_binding: self.default_binding,
            named,
        }
    }
}

/// One exported name declared by an ES module or a `.d.ts` file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredExport {
    pub name: String,
    pub kind: ScannedExportKind,
}

/// Export surface declared by ES module or declaration-file source.
///
/// For a `.d.ts` this is the compile-time promise; diffing it against what a
/// probe observed at runtime is how declaration drift shows up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeclaredSurface {
    /// `export default …` (or `export { X as default }`).
    pub has_default: bool,
    /// Named exports, sorted and deduplicated.
    pub named: Vec<DeclaredExport>,
    /// TypeScript `export = …` assignment.
    pub export_assignment: bool,
}

impl DeclaredSurface {
    pub fn names(&self) -> Vec<String> {
        self.named.iter().map(|e| e.name.clone()).collect()
    }

    /// Lowers the declaration into a loadable ES module surface. The default
    /// becomes an opaque stub; declarations say one exists, not what it is.
    pub fn into_export_surface(self) -> ExportSurface {
        let named = self
            .named
            .into_iter()
            .map(|e| NamedExport {
                name: e.name,
                shape: match e.kind {
                    ScannedExportKind::Callable => ExportShape::Class {
                        statics: Vec::new(),
                    },
                    ScannedExportKind::Unknown => ExportShape::Object,
                },
            })
            .collect();
        ExportSurface {
            format: ModuleFormat::EsModule,
            esmodule_flag: false,
            default_binding: if self.has_default {
                DefaultBinding::Stub
            } else {
                DefaultBinding::Absent
            },
            named,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scanned_surface_lowers_callables_to_classes() {
        let mut surface = ScannedSurface {
            esmodule_flag: true,
            ..Default::default()
        };
        surface
            .exports
            .insert("Parser".into(), ScannedExportKind::Callable);
        surface
            .exports
            .insert("version".into(), ScannedExportKind::Unknown);
        let lowered = surface.into_export_surface();
        assert_eq!(lowered.format, ModuleFormat::CommonJs);
        assert!(lowered.esmodule_flag);
        assert_eq!(lowered.named.len(), 2);
        assert!(matches!(
            lowered.named[0].shape,
            ExportShape::Class { .. }
        ));
        assert!(matches!(lowered.named[1].shape, ExportShape::Object));
    }

    #[test]
    fn declared_surface_default_lowers_to_stub() {
        let surface = DeclaredSurface {
            has_default: true,
            named: vec![DeclaredExport {
                name: "Parser".into(),
                kind: ScannedExportKind::Callable,
            }],
            export_assignment: false,
        };
        let lowered = surface.into_export_surface();
        assert_eq!(lowered.format, ModuleFormat::EsModule);
        assert_eq!(lowered.default_binding, DefaultBinding::Stub);
    }
}
