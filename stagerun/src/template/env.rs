//! The variable environment templates render against.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Names of the variables injected at run time.
pub struct BuiltinVars;

impl BuiltinVars {
    /// The process working directory.
    pub const CWD: &'static str = "cwd";
    /// The compact invocation timestamp.
    pub const TIMESTAMP: &'static str = "timestamp";
    /// The device under test.
    pub const DUT: &'static str = "dut";
    /// Root directory for build logs (declared by the workflow, not injected).
    pub const LOGS_DIR: &'static str = "logs_dir";
}

/// Mapping from variable name to (possibly templated) value.
///
/// Iteration is ordered by name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VariableEnv {
    vars: BTreeMap<String, String>,
}

impl VariableEnv {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value of `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    /// Sets `name`, returning the previous value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.vars.insert(name.into(), value.into())
    }

    /// Returns true if `name` is defined.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    /// Returns the number of variables.
    #[must_use]
    pub fn len(&self) -> usize {
        self.vars.len()
    }

    /// Returns true if no variables are defined.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    /// Iterates over `(name, value)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Returns the variable names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.vars.keys().map(String::as_str)
    }

    /// Overlays the runtime-derived variables, replacing declared ones.
    #[must_use]
    pub fn with_runtime(mut self, runtime: &RuntimeVars) -> Self {
        self.insert(BuiltinVars::CWD, runtime.cwd.clone());
        self.insert(BuiltinVars::TIMESTAMP, runtime.timestamp.clone());
        self.insert(BuiltinVars::DUT, runtime.dut.clone());
        self
    }
}

impl<K, V> FromIterator<(K, V)> for VariableEnv
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            vars: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

impl From<BTreeMap<String, String>> for VariableEnv {
    fn from(vars: BTreeMap<String, String>) -> Self {
        Self { vars }
    }
}

/// Values derived from the invocation rather than the workflow document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeVars {
    /// Current working directory.
    pub cwd: String,
    /// Compact invocation timestamp (`%Y%m%d_%H%M%S`).
    pub timestamp: String,
    /// Device-under-test identifier.
    pub dut: String,
}
