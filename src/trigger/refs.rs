use std::sync::OnceLock;

use regex::Regex;

use crate::context::CiContext;

use super::target::Target;

/// Release branches carry an edition suffix upstream but share a single
/// stable branch downstream ("14-10-stable-ee" builds "14-10-stable").
fn stable_branch_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[\d-]+-stable(-ee)?$").unwrap())
}

/// Resolve the ref the downstream pipeline runs on: an explicit override
/// wins, then the stable-branch derivation, then the target default.
pub(super) fn resolve_ref(ctx: &CiContext, target: Target) -> String {
    if let Some(overridden) = ctx.get(target.ref_override_var()) {
        return overridden.to_string();
    }

    if let Some(ref_name) = ctx.get("CI_COMMIT_REF_NAME") {
        if stable_branch_pattern().is_match(ref_name) {
            return ref_name.strip_suffix("-ee").unwrap_or(ref_name).to_string();
        }
    }

    target.default_ref().to_string()
}
