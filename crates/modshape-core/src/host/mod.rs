//! Module registry, specifier resolution, and the two loader paths.

mod loader;
mod resolver;
mod types;

pub use loader::ModuleHost;
pub use types::{
    ArtifactSource, Condition, DefaultBinding, ExportShape, ExportSurface, ExportsMap,
    LoadStrategy, ModuleArtifact, ModuleFormat, NamedExport, NativeFactory, ESMODULE_FLAG,
};
