use indexmap::IndexMap;

use crate::error::{CitrigError, Result};

/// Security mirrors live under this namespace (or a subgroup of it).
const SECURITY_NAMESPACE: &str = "gitlab-org/security";

/// Immutable snapshot of the CI environment, captured once per invocation.
///
/// Distinguishes variables that are unset from variables set to an empty
/// string; several trigger rules treat the two differently.
pub struct CiContext {
    vars: IndexMap<String, String>,
}

impl CiContext {
    /// Snapshots the process environment.
    pub fn from_env() -> Self {
        Self {
            vars: std::env::vars().collect(),
        }
    }

    /// Builds a snapshot from explicit pairs; later duplicates win.
    #[cfg(test)]
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        }
    }

    /// Value of `key`, if the variable is set (possibly to an empty string).
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars.get(key).map(String::as_str)
    }

    /// Value of `key`, treating unset and set-to-empty alike as absent.
    pub fn non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|value| !value.is_empty())
    }

    /// Value of `key`, or a configuration error naming the variable.
    pub fn require(&self, key: &str) -> Result<&str> {
        self.get(key)
            .ok_or_else(|| CitrigError::Config(format!("{key} is not set")))
    }

    /// Whether the upstream project builds the EE edition.
    pub fn ee(&self) -> bool {
        matches!(self.get("CI_PROJECT_NAME"), Some("gitlab" | "gitlab-ee"))
    }

    /// Whether the upstream project is a security mirror.
    pub fn security(&self) -> bool {
        match self.get("CI_PROJECT_NAMESPACE") {
            Some(namespace) => {
                namespace == SECURITY_NAMESPACE
                    || namespace.starts_with(&format!("{SECURITY_NAMESPACE}/"))
            }
            None => false,
        }
    }
}
