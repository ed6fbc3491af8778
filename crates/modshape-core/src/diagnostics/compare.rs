//! Comparison passes: view against view, declarations against runtime.

use tracing::debug;

use crate::probe::{ProbeResult, ProbeSpec};
use crate::scan::DeclaredSurface;

use super::types::{MismatchKind, Severity, ShapeReport};

/// Compares what the two load strategies observed for one specifier.
///
/// Per-view checks (missing entry points, the flag-without-default shape)
/// are reported against the strategy that showed them; the default-binding
/// divergence is a cross-strategy finding.
pub fn diagnose_views(
    specifier: &str,
    spec: &ProbeSpec,
    cached: &ProbeResult,
    dynamic: &ProbeResult,
) -> ShapeReport {
    let mut report = ShapeReport::new(specifier);

    for view in [cached, dynamic] {
        for entry_point in &spec.entry_points {
            if !view.named_bindings_present.contains(entry_point) {
                report.push(
                    MismatchKind::MissingEntryPoint,
                    Severity::Critical,
                    Some(view.strategy),
                    Some(entry_point.clone()),
                    format!(
                        "entry point '{entry_point}' is missing under {}",
                        view.strategy
                    ),
                );
            }
        }

        if view.interop_flag == Some(true) && !view.has_default_binding {
            report.push(
                MismatchKind::InteropFlagWithoutDefault,
                Severity::Critical,
                Some(view.strategy),
                None,
                format!(
                    "'{}' is set under {} but no default binding exists; \
                     a compiled default import binds undefined",
                    spec.interop_flag, view.strategy
                ),
            );
        }
    }

    if cached.has_default_binding != dynamic.has_default_binding {
        let (present, absent) = if cached.has_default_binding {
            (cached.strategy, dynamic.strategy)
        } else {
            (dynamic.strategy, cached.strategy)
        };
        report.push(
            MismatchKind::DefaultBindingDivergence,
            Severity::Warning,
            None,
            Some("default".to_string()),
            format!("default binding is present under {present} but absent under {absent}"),
        );
    }

    debug!(
        target: "modshape::probe",
        %specifier,
        findings = report.findings.len(),
        "view comparison complete"
    );
    report
}

/// Compares a declared surface (what a `.d.ts` or module source promises)
/// against what a probe observed at runtime.
///
/// Named exports are only judged through the probe's lens: a declared name
/// the probe was not configured to look for is skipped, not flagged. Pass
/// the declared names as the probe's entry points to check all of them.
pub fn diagnose_declarations(
    specifier: &str,
    spec: &ProbeSpec,
    declared: &DeclaredSurface,
    observed: &ProbeResult,
) -> ShapeReport {
    let mut report = ShapeReport::new(specifier);

    if declared.has_default && !observed.has_default_binding {
        report.push(
            MismatchKind::DeclaredDefaultMissingAtRuntime,
            Severity::Critical,
            Some(observed.strategy),
            Some("default".to_string()),
            format!(
                "declarations promise a default export but the {} view has none",
                observed.strategy
            ),
        );
    }

    for export in &declared.named {
        if !spec.entry_points.iter().any(|e| e == &export.name) {
            continue;
        }
        if !observed.named_bindings_present.contains(&export.name) {
            report.push(
                MismatchKind::DeclaredExportMissing,
                Severity::Critical,
                Some(observed.strategy),
                Some(export.name.clone()),
                format!(
                    "declared export '{}' was not observed under {}",
                    export.name, observed.strategy
                ),
            );
        }
    }

    debug!(
        target: "modshape::probe",
        %specifier,
        findings = report.findings.len(),
        "declaration comparison complete"
    );
    report
}
