use std::sync::OnceLock;

use regex::Regex;

use crate::auth::Token;
use crate::context::CiContext;
use crate::error::{CitrigError, Result};

use super::variables::{source_sha, VariableSet};

/// Credential sources shared by every target unless overridden.
const BASE_TRIGGER_TOKEN_VAR: &str = "CI_JOB_TOKEN";
pub(super) const BASE_ACCESS_TOKEN_VAR: &str = "GITLAB_BOT_MULTI_PROJECT_PIPELINE_POLLING_TOKEN";

/// Host of the upstream project and of most downstream projects.
pub(super) const UPSTREAM_ENDPOINT: &str = "https://gitlab.com";
/// Host of the database testing downstream project.
const OPS_ENDPOINT: &str = "https://ops.gitlab.net";

/// Upstream projects that feed the documentation site, with the site slug
/// each one publishes under.
const DOCS_PROJECT_SLUGS: &[(&str, &str)] = &[
    ("gitlab-org/gitlab-foss", "ce"),
    ("gitlab-org/gitlab", "ee"),
    ("gitlab-org/gitlab-runner", "runner"),
    ("gitlab-org/omnibus-gitlab", "omnibus"),
    ("gitlab-org/charts/gitlab", "charts"),
];

/// Released component versions look like this; CNG expects them as tags.
fn release_version_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\d+\.\d+\.\d+(-rc\d+)?(-ee)?$").unwrap())
}

/// The closed set of downstream projects this tool can trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Package builds on omnibus-gitlab-mirror
    Omnibus,
    /// Cloud-native image builds on CNG-mirror
    Cng,
    /// Documentation review apps on gitlab-docs
    Docs,
    /// Database testing pipelines on the ops instance
    DatabaseTesting,
}

impl Target {
    /// Branch or tag the downstream pipeline runs on unless overridden.
    pub fn default_ref(self) -> &'static str {
        match self {
            Self::Docs => "main",
            Self::Omnibus | Self::Cng | Self::DatabaseTesting => "master",
        }
    }

    /// Environment variable that overrides the downstream ref.
    pub fn ref_override_var(self) -> &'static str {
        match self {
            Self::Omnibus => "OMNIBUS_BRANCH",
            Self::Cng => "CNG_BRANCH",
            Self::Docs => "DOCS_BRANCH",
            Self::DatabaseTesting => "GITLABCOM_DATABASE_TESTING_TRIGGER_REF",
        }
    }

    fn project_path_var(self) -> &'static str {
        match self {
            Self::Omnibus => "OMNIBUS_PROJECT_PATH",
            Self::Cng => "CNG_PROJECT_PATH",
            Self::Docs => "DOCS_PROJECT_PATH",
            Self::DatabaseTesting => "GITLABCOM_DATABASE_TESTING_PROJECT_PATH",
        }
    }

    fn default_project_path(self) -> &'static str {
        match self {
            Self::Omnibus => "gitlab-org/build/omnibus-gitlab-mirror",
            Self::Cng => "gitlab-org/build/CNG-mirror",
            Self::Docs => "gitlab-org/gitlab-docs",
            Self::DatabaseTesting => "gitlab-com/database-team/gitlab-com-database-testing",
        }
    }

    /// Downstream project receiving the trigger.
    pub fn downstream_project_path<'a>(self, ctx: &'a CiContext) -> &'a str {
        ctx.get(self.project_path_var())
            .unwrap_or_else(|| self.default_project_path())
    }

    /// Host the downstream client talks to.
    pub fn api_endpoint(self) -> &'static str {
        match self {
            Self::DatabaseTesting => OPS_ENDPOINT,
            Self::Omnibus | Self::Cng | Self::Docs => UPSTREAM_ENDPOINT,
        }
    }

    /// Token authorizing the trigger call itself. Required: without it the
    /// downstream pipeline cannot be created at all.
    pub fn trigger_token(self, ctx: &CiContext) -> Result<Token> {
        let var = match self {
            Self::Docs => "DOCS_TRIGGER_TOKEN",
            Self::DatabaseTesting => "GITLABCOM_DATABASE_TESTING_TRIGGER_TOKEN",
            Self::Omnibus | Self::Cng => BASE_TRIGGER_TOKEN_VAR,
        };

        ctx.require(var).map(Token::from)
    }

    /// Token the downstream client reads pipeline state with. Optional; a
    /// missing token surfaces later as an authorization error from the API.
    pub fn access_token(self, ctx: &CiContext) -> Option<Token> {
        let value = match self {
            Self::Omnibus => ctx
                .get("OMNIBUS_GITLAB_PROJECT_ACCESS_TOKEN")
                .or_else(|| ctx.get(BASE_ACCESS_TOKEN_VAR)),
            Self::Docs => ctx
                .get("DOCS_PROJECT_API_TOKEN")
                .or_else(|| ctx.get(BASE_ACCESS_TOKEN_VAR)),
            Self::DatabaseTesting => ctx.get("GITLABCOM_DATABASE_TESTING_ACCESS_TOKEN"),
            Self::Cng => ctx.get(BASE_ACCESS_TOKEN_VAR),
        };

        value.map(Token::from)
    }

    /// Transform applied to raw version pin values before forwarding.
    pub fn version_value(self, raw: String) -> String {
        match self {
            Self::Cng if release_version_pattern().is_match(&raw) => format!("v{raw}"),
            _ => raw,
        }
    }

    /// Whether the invocation finishes by reporting back on the upstream
    /// merge request.
    pub fn posts_status_note(self) -> bool {
        matches!(self, Self::DatabaseTesting)
    }

    /// Target-specific parameter rules, applied after the shared ones.
    pub(super) fn apply_extra_variables(
        self,
        ctx: &CiContext,
        ref_: &str,
        vars: &mut VariableSet,
    ) -> Result<()> {
        match self {
            Self::Omnibus => {
                vars.set_opt("GITLAB_VERSION", source_sha(ctx));
                vars.set_opt("IMAGE_TAG", source_sha(ctx));
                vars.set_opt("QA_IMAGE", ctx.get("QA_IMAGE"));
                vars.set_opt("QA_BRANCH", ctx.get("QA_BRANCH"));
                vars.set_opt("QA_TESTS", ctx.get("QA_TESTS"));
                vars.set_opt("GITLAB_QA_OPTIONS", ctx.get("GITLAB_QA_OPTIONS"));
                vars.set_opt("ALLURE_JOB_NAME", ctx.get("ALLURE_JOB_NAME"));
                vars.set_opt("CACHE_UPDATE", ctx.get("OMNIBUS_GITLAB_CACHE_UPDATE"));
                vars.set("SKIP_QA_DOCKER", "true");
                vars.set("ALTERNATIVE_SOURCES", "true");
                vars.set("SECURITY_SOURCES", bool_str(ctx.security()));
                vars.set("ee", bool_str(ctx.ee()));
            }
            Self::Cng => {
                vars.set("TRIGGER_BRANCH", ref_);
                vars.set_opt("GITLAB_VERSION", source_sha(ctx));
                vars.set_opt("GITLAB_TAG", ctx.get("CI_COMMIT_TAG"));
                // Tag pipelines pin assets to the ref name; everything else
                // uses the same commit the build checks out.
                let assets_tag = match ctx.get("CI_COMMIT_TAG") {
                    Some(_) => ctx.get("CI_COMMIT_REF_NAME"),
                    None => source_sha(ctx),
                };
                vars.set_opt("GITLAB_ASSETS_TAG", assets_tag);
                vars.set("FORCE_RAILS_IMAGE_BUILDS", "true");
                // Exactly one edition flag rides along; the inactive one
                // stays absent rather than carrying a literal "false".
                if ctx.ee() {
                    vars.set("EE_PIPELINE", "true");
                } else {
                    vars.set("CE_PIPELINE", "true");
                }
            }
            Self::Docs => {
                let slug = docs_source_slug(ctx)?;
                vars.set_opt(
                    format!("BRANCH_{}", slug.to_uppercase()),
                    ctx.get("CI_COMMIT_REF_NAME"),
                );
                vars.set("REVIEW_SLUG", docs_review_slug(ctx, slug));
            }
            Self::DatabaseTesting => {
                vars.set_opt("TRIGGERED_USER_LOGIN", ctx.get("GITLAB_USER_LOGIN"));
                vars.set_opt("GITLAB_COMMIT_SHA", source_sha(ctx));
            }
        }

        Ok(())
    }

    /// Shared parameters this target strips again after the shared rules ran.
    pub(super) fn excluded_variables(self) -> &'static [&'static str] {
        match self {
            Self::Cng => &["TRIGGER_SOURCE", "TRIGGERED_USER"],
            Self::Omnibus | Self::Docs | Self::DatabaseTesting => &[],
        }
    }
}

fn bool_str(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Documentation site slug of the upstream project, or a configuration error
/// for projects that do not publish docs.
pub(super) fn docs_source_slug(ctx: &CiContext) -> Result<&'static str> {
    let project = ctx.get("CI_PROJECT_PATH").unwrap_or_default();

    DOCS_PROJECT_SLUGS
        .iter()
        .find(|(path, _)| *path == project)
        .map(|(_, slug)| *slug)
        .ok_or_else(|| {
            CitrigError::Config(format!(
                "No documentation branch mapping for project '{project}'"
            ))
        })
}

/// Per-source suffix that keeps concurrent review apps apart: the merge
/// request IID when there is one, the ref slug otherwise.
pub(super) fn docs_review_slug(ctx: &CiContext, slug: &str) -> String {
    let identifier = ctx
        .get("CI_MERGE_REQUEST_IID")
        .or_else(|| ctx.get("CI_COMMIT_REF_SLUG"))
        .unwrap_or_default();

    format!("-{slug}-{identifier}")
}

#[cfg(test)]
mod tests {
    use super::*;

    mod endpoints {
        use super::*;

        #[test]
        fn database_testing_triggers_on_the_ops_instance() {
            assert_eq!(Target::DatabaseTesting.api_endpoint(), "https://ops.gitlab.net");
        }

        #[test]
        fn every_other_target_triggers_on_the_main_instance() {
            for target in [Target::Omnibus, Target::Cng, Target::Docs] {
                assert_eq!(target.api_endpoint(), "https://gitlab.com");
            }
        }
    }

    mod project_paths {
        use super::*;

        #[test]
        fn each_target_has_a_default_project() {
            let ctx = CiContext::from_pairs(Vec::<(&str, &str)>::new());

            assert_eq!(
                Target::Omnibus.downstream_project_path(&ctx),
                "gitlab-org/build/omnibus-gitlab-mirror"
            );
            assert_eq!(Target::Cng.downstream_project_path(&ctx), "gitlab-org/build/CNG-mirror");
            assert_eq!(Target::Docs.downstream_project_path(&ctx), "gitlab-org/gitlab-docs");
            assert_eq!(
                Target::DatabaseTesting.downstream_project_path(&ctx),
                "gitlab-com/database-team/gitlab-com-database-testing"
            );
        }

        #[test]
        fn the_project_can_be_overridden_per_target() {
            let ctx = CiContext::from_pairs([("OMNIBUS_PROJECT_PATH", "my-fork/omnibus")]);

            assert_eq!(Target::Omnibus.downstream_project_path(&ctx), "my-fork/omnibus");
            assert_eq!(Target::Cng.downstream_project_path(&ctx), "gitlab-org/build/CNG-mirror");
        }
    }

    mod tokens {
        use super::*;

        #[test]
        fn omnibus_and_cng_trigger_with_the_job_token() {
            let ctx = CiContext::from_pairs([("CI_JOB_TOKEN", "job-token")]);

            for target in [Target::Omnibus, Target::Cng] {
                assert_eq!(target.trigger_token(&ctx).unwrap().as_str(), "job-token");
            }
        }

        #[test]
        fn docs_requires_its_dedicated_trigger_token() {
            let ctx = CiContext::from_pairs([("CI_JOB_TOKEN", "job-token")]);

            let error = Target::Docs.trigger_token(&ctx).unwrap_err();

            assert!(matches!(
                error,
                CitrigError::Config(message) if message.contains("DOCS_TRIGGER_TOKEN")
            ));
        }

        #[test]
        fn database_testing_has_its_own_trigger_token() {
            let ctx = CiContext::from_pairs([
                ("CI_JOB_TOKEN", "job-token"),
                ("GITLABCOM_DATABASE_TESTING_TRIGGER_TOKEN", "dbt-token"),
            ]);

            assert_eq!(
                Target::DatabaseTesting.trigger_token(&ctx).unwrap().as_str(),
                "dbt-token"
            );
        }

        #[test]
        fn access_tokens_fall_back_to_the_bot_token() {
            let ctx = CiContext::from_pairs([(BASE_ACCESS_TOKEN_VAR, "bot-token")]);

            for target in [Target::Omnibus, Target::Cng, Target::Docs] {
                assert_eq!(target.access_token(&ctx).unwrap().as_str(), "bot-token");
            }
        }

        #[test]
        fn dedicated_access_tokens_win_over_the_bot_token() {
            let ctx = CiContext::from_pairs([
                (BASE_ACCESS_TOKEN_VAR, "bot-token"),
                ("OMNIBUS_GITLAB_PROJECT_ACCESS_TOKEN", "omnibus-token"),
                ("DOCS_PROJECT_API_TOKEN", "docs-token"),
            ]);

            assert_eq!(Target::Omnibus.access_token(&ctx).unwrap().as_str(), "omnibus-token");
            assert_eq!(Target::Docs.access_token(&ctx).unwrap().as_str(), "docs-token");
            assert_eq!(Target::Cng.access_token(&ctx).unwrap().as_str(), "bot-token");
        }

        #[test]
        fn database_testing_does_not_fall_back_to_the_bot_token() {
            let ctx = CiContext::from_pairs([(BASE_ACCESS_TOKEN_VAR, "bot-token")]);

            assert!(Target::DatabaseTesting.access_token(&ctx).is_none());
        }
    }

    mod version_values {
        use super::*;

        #[test]
        fn cng_prefixes_release_versions_with_v() {
            for (raw, expected) in [
                ("1.2.3", "v1.2.3"),
                ("1.2.3-rc1", "v1.2.3-rc1"),
                ("1.2.3-ee", "v1.2.3-ee"),
                ("1.2.3-rc1-ee", "v1.2.3-rc1-ee"),
            ] {
                assert_eq!(Target::Cng.version_value(raw.to_string()), expected);
            }
        }

        #[test]
        fn cng_leaves_branches_and_shas_alone() {
            for raw in ["master", "1.2.3.4", "e18e2e90f40bbd0b0ef5b7cb60e7f1b53e51d6ae", "v1.2.3"] {
                assert_eq!(Target::Cng.version_value(raw.to_string()), raw);
            }
        }

        #[test]
        fn other_targets_forward_release_versions_untouched() {
            assert_eq!(Target::Omnibus.version_value("1.2.3".to_string()), "1.2.3");
        }
    }

    mod docs_slugs {
        use super::*;

        #[test]
        fn each_documentation_source_maps_to_its_slug() {
            for (project, slug) in [
                ("gitlab-org/gitlab-foss", "ce"),
                ("gitlab-org/gitlab", "ee"),
                ("gitlab-org/gitlab-runner", "runner"),
                ("gitlab-org/omnibus-gitlab", "omnibus"),
                ("gitlab-org/charts/gitlab", "charts"),
            ] {
                let ctx = CiContext::from_pairs([("CI_PROJECT_PATH", project)]);

                assert_eq!(docs_source_slug(&ctx).unwrap(), slug);
            }
        }

        #[test]
        fn unknown_projects_are_a_configuration_error() {
            let ctx = CiContext::from_pairs([("CI_PROJECT_PATH", "gitlab-org/gitaly")]);

            let error = docs_source_slug(&ctx).unwrap_err();

            assert!(matches!(
                error,
                CitrigError::Config(message) if message.contains("gitlab-org/gitaly")
            ));
        }

        #[test]
        fn review_slug_prefers_the_merge_request_iid() {
            let ctx = CiContext::from_pairs([
                ("CI_MERGE_REQUEST_IID", "1234"),
                ("CI_COMMIT_REF_SLUG", "my-branch"),
            ]);

            assert_eq!(docs_review_slug(&ctx, "ee"), "-ee-1234");
        }

        #[test]
        fn review_slug_falls_back_to_the_ref_slug() {
            let ctx = CiContext::from_pairs([("CI_COMMIT_REF_SLUG", "my-branch")]);

            assert_eq!(docs_review_slug(&ctx, "ce"), "-ce-my-branch");
        }
    }
}
