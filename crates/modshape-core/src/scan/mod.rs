//! Static export-surface extraction from module source text.
//!
//! Two scanners, two grammars: the CommonJS scanner reads transpiled bundle
//! output with the JavaScript grammar, the ESM scanner reads module and
//! declaration sources with the TypeScript grammar. Both are lenient the way
//! the runtime lexer is lenient. Error nodes in the tree reduce what the
//! scan sees, they do not fail it.

mod cjs;
mod esm;
mod types;

use std::path::Path;

pub use cjs::CjsScanner;
pub use esm::EsmScanner;
pub use types::{DeclaredExport, DeclaredSurface, ScannedExportKind, ScannedSurface};

use crate::errors::ScanError;
use crate::host::ModuleFormat;

/// What a file scan produced, by format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    CommonJs(ScannedSurface),
    EsModule(DeclaredSurface),
}

/// Both scanners behind one file-level entry point.
pub struct ScannerSet {
    cjs: CjsScanner,
    esm: EsmScanner,
}

impl ScannerSet {
    pub fn new() -> Result<Self, ScanError> {
        Ok(Self {
            cjs: CjsScanner::new()?,
            esm: EsmScanner::new()?,
        })
    }

    pub fn cjs(&mut self) -> &mut CjsScanner {
        &mut self.cjs
    }

    pub fn esm(&mut self) -> &mut EsmScanner {
        &mut self.esm
    }

    /// Module format implied by a file extension: `.cjs` and `.js` scan as
    /// CommonJS bundles, `.mjs`, `.ts`, `.mts` and `.d.ts` as ES module
    /// sources.
    pub fn format_for_path(path: &Path) -> Result<ModuleFormat, ScanError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        match extension {
            "cjs" | "js" => Ok(ModuleFormat::CommonJs),
            "mjs" | "ts" | "mts" => Ok(ModuleFormat::EsModule),
            other => Err(ScanError::UnsupportedExtension {
                extension: other.to_string(),
            }),
        }
    }

    pub fn scan_file(&mut self, path: &Path) -> Result<ScanOutcome, ScanError> {
        match Self::format_for_path(path)? {
            ModuleFormat::CommonJs => Ok(ScanOutcome::CommonJs(self.cjs.scan_file(path)?)),
            ModuleFormat::EsModule => Ok(ScanOutcome::EsModule(self.esm.scan_file(path)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_dispatch_follows_extensions() {
        assert_eq!(
            ScannerSet::format_for_path(Path::new("bundle.cjs")).unwrap(),
            ModuleFormat::CommonJs
        );
        assert_eq!(
            ScannerSet::format_for_path(Path::new("index.mjs")).unwrap(),
            ModuleFormat::EsModule
        );
        assert_eq!(
            ScannerSet::format_for_path(Path::new("types.d.ts")).unwrap(),
            ModuleFormat::EsModule
        );
        assert!(matches!(
            ScannerSet::format_for_path(Path::new("native.wasm")),
            Err(ScanError::UnsupportedExtension { .. })
        ));
    }
}
