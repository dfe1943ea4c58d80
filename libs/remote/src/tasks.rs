//! Waiting for remote tasks.

use satrig_poll::{poll, PollConfig, PollError, PollOutcome};
use tracing::info;

use crate::api::TaskApi;
use crate::records::Task;

/// Failure while waiting for tasks.
pub type TaskWaitError = PollError<Vec<Task>>;

/// Poll tasks matching `query` until all of them succeeded.
///
/// An empty result counts as not ready: the task may not have been
/// created yet. Any failed task ends the wait immediately.
pub async fn wait_for_tasks<A>(
    api: &A,
    query: &str,
    config: &PollConfig,
) -> Result<PollOutcome<Vec<Task>>, TaskWaitError>
where
    A: TaskApi + ?Sized,
{
    let outcome = poll(
        query,
        config,
        || api.search_tasks(query),
        |tasks: &Vec<Task>| !tasks.is_empty() && tasks.iter().all(Task::succeeded),
        |tasks: &Vec<Task>| tasks.iter().any(Task::failed),
    )
    .await?;

    info!(
        query = %query,
        tasks = outcome.state.len(),
        attempts = outcome.attempts,
        "Tasks finished"
    );
    Ok(outcome)
}

/// Poll a single task by id until it succeeds or fails.
pub async fn wait_for_task<A>(
    api: &A,
    id: &str,
    config: &PollConfig,
) -> Result<PollOutcome<Task>, PollError<Task>>
where
    A: TaskApi + ?Sized,
{
    poll(
        format!("task {id}"),
        config,
        || api.task(id),
        Task::succeeded,
        Task::failed,
    )
    .await
}

/// The humanized messages of every failed task in a wait error.
pub fn failure_messages(err: &TaskWaitError) -> Vec<String> {
    match err {
        PollError::RemoteTaskFailed { state, .. } => state
            .iter()
            .filter(|t| t.failed())
            .map(|t| format!("{} ({}): {}", t.label, t.id, t.humanized))
            .collect(),
        _ => Vec::new(),
    }
}

/// Task search for a repository synchronization.
pub fn repository_sync_query(organization_id: u64, repository_id: u64) -> String {
    format!(
        "Actions::Katello::Repository::Sync and organization_id = {organization_id} \
         and resource_id = {repository_id} and resource_type = Katello::Repository"
    )
}

/// Task search for a remote execution job.
pub fn job_invocation_query(job_id: u64) -> String {
    format!("resource_type = JobInvocation and resource_id = {job_id}")
}

/// Task search for a content view publish.
pub fn content_view_publish_query(content_view_id: u64) -> String {
    format!(
        "Actions::Katello::ContentView::Publish and resource_id = {content_view_id} \
         and resource_type = Katello::ContentView"
    )
}
