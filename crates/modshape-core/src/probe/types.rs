//! Probe configuration and the observation record it produces.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use smallvec::SmallVec;

use crate::host::{LoadStrategy, ESMODULE_FLAG};

/// A dot-separated property path, e.g. `default.init` or `Parser.init`.
/// Traversal depth stays tiny in practice, hence the inline capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath(SmallVec<[String; 4]>);

impl PropertyPath {
    /// Parses a dotted path. Empty segments are dropped, so `""` is the
    /// empty path, meaning: call the loaded view itself.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|segment| !segment.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join("."))
    }
}

impl From<&str> for PropertyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

// Serialized as the dotted string, which is how configs spell it.
impl Serialize for PropertyPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PropertyPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let path = String::deserialize(deserializer)?;
        Ok(PropertyPath::parse(&path))
    }
}

/// What the probe looks for on each loaded view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeSpec {
    /// Named bindings whose presence the probe records.
    pub entry_points: Vec<String>,
    /// Marker property consulted for the interop flag.
    pub interop_flag: String,
    /// Optional property path to invoke from the loaded view, capturing any
    /// throw instead of propagating it.
    pub invoke: Option<PropertyPath>,
}

impl Default for ProbeSpec {
    fn default() -> Self {
        Self {
            entry_points: Vec::new(),
            interop_flag: ESMODULE_FLAG.to_string(),
            invoke: None,
        }
    }
}

impl ProbeSpec {
    pub fn with_entry_points(names: &[&str]) -> Self {
        Self {
            entry_points: names.iter().map(|n| n.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn invoke(mut self, path: &str) -> Self {
        self.invoke = Some(PropertyPath::parse(path));
        self
    }
}

/// Outcome of the optional entry-point invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationOutcome {
    Succeeded,
    /// The call threw; `reason` is the thrown error's message.
    Threw { reason: String },
}

impl InvocationOutcome {
    pub fn threw(&self) -> bool {
        matches!(self, InvocationOutcome::Threw { .. })
    }
}

/// What one load-and-inspect pass observed. Pure data: serializable,
/// comparable, no realm handles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub strategy: LoadStrategy,
    /// A `default` binding exists and is defined.
    pub has_default_binding: bool,
    /// `default` is strictly equal to the loaded view itself, which is the
    /// self-reference patch observed from the outside.
    pub default_equals_namespace: bool,
    /// The configured entry points that are present and defined.
    pub named_bindings_present: BTreeSet<String>,
    /// `None` when the marker property is absent, otherwise its truthiness.
    pub interop_flag: Option<bool>,
    /// `None` when the probe spec requested no invocation.
    pub invocation: Option<InvocationOutcome>,
}
