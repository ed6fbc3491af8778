//! # modshape-core
//!
//! Export-shape diagnostics for CommonJS/ESM interop mismatches.
//!
//! A transpiled CommonJS bundle and the ES namespace view of the same
//! package routinely disagree about their `default` binding. TypeScript's
//! `esModuleInterop` helpers trust the `__esModule` marker, so when the
//! marker is set but no `default` exists, a typed default import binds
//! `undefined` and the first property access throws at runtime, far from
//! where the type checker said everything was fine. This crate loads a
//! module under both strategies, records what each view actually exposes,
//! and turns the disagreements into findings.
//!
//! ## Modules
//!
//! - [`realm`]: a minimal JavaScript value realm with `===` identity,
//!   `typeof`, property access, and calls
//! - [`host`]: module registry, conditional exports resolution, the
//!   evictable CommonJS cache and the append-only ES module map
//! - [`probe`]: load-and-inspect under a strategy, with optional
//!   entry-point invocation that captures throws as data
//! - [`scan`]: tree-sitter extraction of export surfaces from CommonJS
//!   bundles, ES modules, and `.d.ts` declarations
//! - [`interop`]: the `__importDefault` / `__importStar` emit-helper
//!   semantics
//! - [`diagnostics`]: view-vs-view and declared-vs-observed comparison
//!   passes producing a [`ShapeReport`]

pub mod diagnostics;
pub mod errors;
pub mod host;
pub mod interop;
pub mod probe;
pub mod realm;
pub mod scan;
pub mod trace;

pub use diagnostics::{diagnose_declarations, diagnose_views, Finding, MismatchKind, Severity, ShapeReport};
pub use errors::{HostError, ResolveError, ScanError};
pub use host::{
    ArtifactSource, Condition, DefaultBinding, ExportShape, ExportSurface, ExportsMap,
    LoadStrategy, ModuleArtifact, ModuleFormat, ModuleHost, NamedExport, ESMODULE_FLAG,
};
pub use interop::{default_import_binding, import_default, import_star, is_flagged};
pub use probe::{
    attempt_call, inspect, ExportShapeProbe, InvocationOutcome, ProbeResult, ProbeSpec,
    PropertyPath,
};
pub use realm::{FunctionId, ObjectId, Realm, Thrown, ThrownKind, Value};
pub use scan::{
    CjsScanner, DeclaredExport, DeclaredSurface, EsmScanner, ScanOutcome, ScannedExportKind,
    ScannedSurface, ScannerSet,
};
pub use trace::init_tracing;
