use indexmap::IndexMap;

use crate::context::CiContext;
use crate::error::Result;

use super::target::Target;
use super::versions::{VersionSource, VERSION_FILES};

/// Ordered trigger parameter set; later rules overwrite earlier ones.
///
/// Values are optional so rules can record "forward this if the upstream has
/// it": a `None` never reaches the wire, while an explicit empty string does.
#[derive(Debug, Default)]
pub struct VariableSet {
    inner: IndexMap<String, Option<String>>,
}

impl VariableSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key`, overwriting any earlier rule.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.inner.insert(key.into(), Some(value.into()));
    }

    /// Set `key` to an optional value; `None` keeps it out of the payload.
    pub fn set_opt(&mut self, key: impl Into<String>, value: Option<impl Into<String>>) {
        self.inner.insert(key.into(), value.map(Into::into));
    }

    pub fn remove(&mut self, key: &str) {
        self.inner.shift_remove(key);
    }

    /// Resolved value for `key`, if it would reach the payload.
    #[cfg(test)]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.inner.get(key).and_then(|value| value.as_deref())
    }

    /// Wire form: valueless entries are dropped rather than sent empty.
    pub fn into_payload(self) -> IndexMap<String, String> {
        self.inner
            .into_iter()
            .filter_map(|(key, value)| value.map(|value| (key, value)))
            .collect()
    }
}

/// Build the full parameter set for `target` from the environment snapshot:
/// forwarded variables, base rules, version pins, then target rules.
pub(super) fn resolve(
    ctx: &CiContext,
    target: Target,
    versions: &dyn VersionSource,
    ref_: &str,
) -> Result<VariableSet> {
    let mut vars = VariableSet::new();

    forwarded_variables(ctx, &mut vars);
    base_variables(ctx, &mut vars);
    version_variables(ctx, target, versions, &mut vars)?;
    target.apply_extra_variables(ctx, ref_, &mut vars)?;

    for key in target.excluded_variables() {
        vars.remove(key);
    }

    Ok(vars)
}

/// Upstream context forwarded verbatim under stable downstream names.
fn forwarded_variables(ctx: &CiContext, vars: &mut VariableSet) {
    vars.set_opt("TRIGGER_SOURCE", ctx.get("CI_JOB_URL"));
    vars.set_opt("TOP_UPSTREAM_SOURCE_PROJECT", ctx.get("CI_PROJECT_PATH"));
    vars.set_opt("TOP_UPSTREAM_SOURCE_REF", ctx.get("CI_COMMIT_REF_NAME"));
    vars.set_opt("TOP_UPSTREAM_SOURCE_JOB", ctx.get("CI_JOB_URL"));
    vars.set_opt(
        "TOP_UPSTREAM_MERGE_REQUEST_PROJECT_ID",
        ctx.get("CI_MERGE_REQUEST_PROJECT_ID"),
    );
    vars.set_opt(
        "TOP_UPSTREAM_MERGE_REQUEST_IID",
        ctx.get("CI_MERGE_REQUEST_IID"),
    );
}

fn base_variables(ctx: &CiContext, vars: &mut VariableSet) {
    let ref_slug = match ctx.get("CI_COMMIT_TAG") {
        Some(tag) => Some(tag),
        None => ctx.get("CI_COMMIT_REF_SLUG"),
    };
    vars.set_opt("GITLAB_REF_SLUG", ref_slug);

    vars.set_opt(
        "TRIGGERED_USER",
        ctx.get("TRIGGERED_USER").or_else(|| ctx.get("GITLAB_USER_NAME")),
    );

    vars.set_opt("TOP_UPSTREAM_SOURCE_SHA", source_sha(ctx));
}

/// The commit the downstream build should check out: a non-empty
/// merge-request source branch SHA wins; unset and set-to-empty both fall
/// back to the commit SHA of the pipeline itself.
pub(super) fn source_sha(ctx: &CiContext) -> Option<&str> {
    ctx.non_empty("CI_MERGE_REQUEST_SOURCE_BRANCH_SHA")
        .or_else(|| ctx.get("CI_COMMIT_SHA"))
}

fn version_variables(
    ctx: &CiContext,
    target: Target,
    versions: &dyn VersionSource,
    vars: &mut VariableSet,
) -> Result<()> {
    for name in VERSION_FILES {
        let raw = match ctx.get(name) {
            Some(from_env) => from_env.to_string(),
            None => versions.read(name)?,
        };
        vars.set(*name, target.version_value(raw));
    }

    Ok(())
}
