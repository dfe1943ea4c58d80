//! Subscription manifests.

use anyhow::{Context, Result};
use satrig_remote::{CommandResult, EntityApi, EntityApiExt, Subscription};
use tracing::info;

use crate::target::Target;

pub fn upload_command(organization_id: u64, manifest_path: &str) -> String {
    format!("hammer subscription upload --organization-id {organization_id} --file {manifest_path}")
}

pub fn delete_command(organization_id: u64) -> String {
    format!("hammer subscription delete-manifest --organization-id {organization_id}")
}

/// Import a manifest into an organization. The result is returned whatever
/// the exit status, since a rejected import is an expected outcome.
pub async fn upload_manifest(
    target: &Target,
    organization_id: u64,
    manifest_path: &str,
) -> Result<CommandResult> {
    let result = target
        .execute(&upload_command(organization_id, manifest_path))
        .await?;
    info!(
        organization = organization_id,
        manifest = manifest_path,
        status = result.status,
        "Manifest upload finished"
    );
    Ok(result)
}

/// Remove an organization's manifest and its subscriptions.
pub async fn delete_manifest(target: &Target, organization_id: u64) -> Result<()> {
    target.execute_ok(&delete_command(organization_id)).await?;
    info!(organization = organization_id, "Manifest deleted");
    Ok(())
}

pub async fn subscriptions(api: &dyn EntityApi, organization_id: u64) -> Result<Vec<Subscription>> {
    api.search_as(&format!("organization_id = {organization_id}"))
        .await
        .with_context(|| format!("failed to list subscriptions of organization {organization_id}"))
}
