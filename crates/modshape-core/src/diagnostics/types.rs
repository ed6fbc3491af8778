//! Mismatch findings and the shape report.

use serde::{Deserialize, Serialize};

use crate::host::LoadStrategy;

/// How bad a finding is. Ordered, so reports can answer "what is the worst
/// thing here".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// The interop mismatches the comparison passes can detect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MismatchKind {
    /// The two load strategies disagree about whether a default binding
    /// exists.
    DefaultBindingDivergence,
    /// The interop marker is set but no default binding exists, the exact
    /// shape that makes `__importDefault` yield `undefined`.
    InteropFlagWithoutDefault,
    /// A configured entry point is missing from a loaded view.
    MissingEntryPoint,
    /// Declarations promise a default export the runtime view does not have.
    DeclaredDefaultMissingAtRuntime,
    /// A declared named export was not observed at runtime.
    DeclaredExportMissing,
}

/// One detected mismatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub kind: MismatchKind,
    pub severity: Severity,
    /// The strategy the finding applies to; `None` for cross-strategy
    /// findings.
    pub strategy: Option<LoadStrategy>,
    /// The binding involved, when the finding is about one.
    pub binding: Option<String>,
    pub message: String,
}

/// Everything the comparison passes found for one specifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShapeReport {
    pub specifier: String,
    pub findings: Vec<Finding>,
}

impl ShapeReport {
    pub fn new(specifier: impl Into<String>) -> Self {
        Self {
            specifier: specifier.into(),
            findings: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn worst_severity(&self) -> Option<Severity> {
        self.findings.iter().map(|f| f.severity).max()
    }

    pub fn has(&self, kind: MismatchKind) -> bool {
        self.findings.iter().any(|f| f.kind == kind)
    }

    pub fn findings_of(&self, kind: MismatchKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub(crate) fn push(
        &mut self,
        kind: MismatchKind,
        severity: Severity,
        strategy: Option<LoadStrategy>,
        binding: Option<String>,
        message: String,
    ) {
        self.findings.push(Finding {
            kind,
            severity,
            strategy,
            binding,
            message,
        });
    }
}
