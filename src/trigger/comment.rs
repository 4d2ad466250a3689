use log::info;

use crate::api::GitLabClient;
use crate::context::CiContext;
use crate::error::Result;

use super::PipelineHandle;

/// Marker embedded in the status note so later invocations update the same
/// note instead of stacking new ones.
pub const NOTE_IDENTITY_MARKER: &str =
    "gitlab-org/database-team/gitlab-com-database-testing:identifiable-note";

/// Create or refresh the marked status note on the upstream merge request.
///
/// Skipped with a log line when the job is not part of a merge request
/// pipeline; a note without a merge request has nowhere to go.
pub(super) async fn publish_status_note(
    client: &GitLabClient,
    ctx: &CiContext,
    pipeline: &PipelineHandle,
) -> Result<()> {
    let Some(merge_request_iid) = ctx.non_empty("CI_MERGE_REQUEST_IID") else {
        info!("Not a merge request pipeline, skipping the status note");
        return Ok(());
    };
    let project = ctx.require("CI_PROJECT_PATH")?;

    let body = note_body(pipeline);
    let notes = client.merge_request_notes(project, merge_request_iid).await?;

    match notes.iter().find(|note| note.body.contains(NOTE_IDENTITY_MARKER)) {
        Some(existing) => {
            client
                .update_merge_request_note(project, merge_request_iid, existing.id, &body)
                .await?;
            info!("Updated status note {} on {project}!{merge_request_iid}", existing.id);
        }
        None => {
            let note = client
                .create_merge_request_note(project, merge_request_iid, &body)
                .await?;
            info!("Posted status note {} on {project}!{merge_request_iid}", note.id);
        }
    }

    Ok(())
}

fn note_body(pipeline: &PipelineHandle) -> String {
    format!(
        "<!-- {NOTE_IDENTITY_MARKER} -->\n\
         Started database testing [pipeline]({}) (limited access). \
         This comment will be updated once the pipeline has finished running.",
        pipeline.url
    )
}
