//! Content view, activation key, product, repository and sync plan fixtures.

use anyhow::{Context, Result};
use satrig_fixtures::{Created, FixtureDef, FixtureError, FixtureRegistry, FixtureRequest, Scope};
use satrig_remote::{
    repository_sync_query, ActivationKey, ContentView, EntityApiExt, EntityKind,
    LifecycleEnvironment, Organization, Product, Repository, SyncInterval, SyncPlan,
};
use serde_json::json;
use tracing::info;

use super::lce::MODULE_LCE;
use super::org::MODULE_ORG;
use super::{create_owned, owned};
use crate::datafactory::{gen_string, StringKind};
use crate::schedule::format_sync_date;
use crate::syncplan::remove_sync_plan;
use crate::target::Target;

pub const MODULE_CV: &str = "module_cv";
pub const MODULE_AK_WITH_CV: &str = "module_ak_with_cv";
pub const MODULE_SYNC_PLAN: &str = "module_sync_plan";
pub const MODULE_PRODUCT: &str = "module_product";
pub const MODULE_SYNCED_REPO: &str = "module_synced_repo";
pub const FUNCTION_CV_WITH_REPO: &str = "function_cv_with_repo";

/// Upstream of the yum repository the synced repository fixture mirrors.
pub const YUM_FIXTURE_URL: &str = "https://fixtures.example.com/yum/zoo/";

pub(super) fn register(
    registry: &mut FixtureRegistry,
    target: &Target,
) -> Result<(), FixtureError> {
    let t = target.clone();
    registry.register(
        FixtureDef::new(MODULE_CV, Scope::Module, move |req| module_cv(t.clone(), req))
            .requires(MODULE_ORG),
    )?;

    let t = target.clone();
    registry.register(
        FixtureDef::new(MODULE_AK_WITH_CV, Scope::Module, move |req| {
            module_ak_with_cv(t.clone(), req)
        })
        .requires(MODULE_ORG)
        .requires(MODULE_LCE)
        .requires(MODULE_CV),
    )?;

    let t = target.clone();
    registry.register(
        FixtureDef::new(MODULE_SYNC_PLAN, Scope::Module, move |req| {
            module_sync_plan(t.clone(), req)
        })
        .requires(MODULE_ORG),
    )?;

    let t = target.clone();
    registry.register(
        FixtureDef::new(MODULE_PRODUCT, Scope::Module, move |req| {
            module_product(t.clone(), req)
        })
        .requires(MODULE_ORG),
    )?;

    let t = target.clone();
    registry.register(
        FixtureDef::new(MODULE_SYNCED_REPO, Scope::Module, move |req| {
            module_synced_repo(t.clone(), req)
        })
        .requires(MODULE_ORG)
        .requires(MODULE_PRODUCT),
    )?;

    let t = target.clone();
    registry.register(
        FixtureDef::new(FUNCTION_CV_WITH_REPO, Scope::Function, move |req| {
            function_cv_with_repo(t.clone(), req)
        })
        .requires(MODULE_ORG)
        .requires(MODULE_SYNCED_REPO),
    )?;
    Ok(())
}

async fn module_cv(target: Target, req: FixtureRequest) -> Result<Created> {
    let org_id = req.dep_value::<Organization>(MODULE_ORG)?.id;
    let body = json!({
        "name": gen_string(StringKind::Alpha, 10),
        "organization_id": org_id,
    });
    create_owned::<ContentView>(&target, body).await
}

async fn module_ak_with_cv(target: Target, req: FixtureRequest) -> Result<Created> {
    let org_id = req.dep_value::<Organization>(MODULE_ORG)?.id;
    let lce_id = req.dep_value::<LifecycleEnvironment>(MODULE_LCE)?.id;
    let cv_id = req.dep_value::<ContentView>(MODULE_CV)?.id;
    let body = json!({
        "name": gen_string(StringKind::Alpha, 10),
        "organization_id": org_id,
        "environment_id": lce_id,
        "content_view_id": cv_id,
    });
    create_owned::<ActivationKey>(&target, body).await
}

/// A disabled daily plan. Teardown disables it again before deleting, in
/// case the test enabled it.
async fn module_sync_plan(target: Target, req: FixtureRequest) -> Result<Created> {
    let org_id = req.dep_value::<Organization>(MODULE_ORG)?.id;
    let body = json!({
        "name": gen_string(StringKind::Alpha, 10),
        "organization_id": org_id,
        "interval": SyncInterval::Daily.as_str(),
        "enabled": false,
        "sync_date": format_sync_date(target.clock().now()),
    });
    let plan: SyncPlan = target
        .api()
        .create_as(body)
        .await
        .context("failed to create sync plan")?;

    let api = target.api_handle();
    let plan_id = plan.id;
    Ok(Created::new(plan_id.to_string(), plan).with_teardown(move || async move {
        remove_sync_plan(api.as_ref(), plan_id).await
    }))
}

async fn module_product(target: Target, req: FixtureRequest) -> Result<Created> {
    let org_id = req.dep_value::<Organization>(MODULE_ORG)?.id;
    let body = json!({
        "name": gen_string(StringKind::Alpha, 10),
        "organization_id": org_id,
    });
    create_owned::<Product>(&target, body).await
}

/// A yum repository, returned once its first sync task has finished.
async fn module_synced_repo(target: Target, req: FixtureRequest) -> Result<Created> {
    let org_id = req.dep_value::<Organization>(MODULE_ORG)?.id;
    let product_id = req.dep_value::<Product>(MODULE_PRODUCT)?.id;
    let repo: Repository = target
        .api()
        .create_as(json!({
            "name": gen_string(StringKind::Alpha, 10),
            "product_id": product_id,
            "content_type": "yum",
            "url": YUM_FIXTURE_URL,
        }))
        .await
        .context("failed to create repository")?;

    sync_repository(&target, org_id, repo.id).await?;
    let repo = target.api().refresh(&repo).await?;
    Ok(owned(&target, repo))
}

async fn sync_repository(target: &Target, org_id: u64, repo_id: u64) -> Result<()> {
    target
        .api()
        .action(EntityKind::Repository, &repo_id.to_string(), "sync", json!({}))
        .await
        .with_context(|| format!("failed to start sync of repository {repo_id}"))?;
    let outcome = target
        .wait_for_tasks(&repository_sync_query(org_id, repo_id))
        .await
        .with_context(|| format!("sync of repository {repo_id} did not finish"))?;
    info!(repository = repo_id, attempts = outcome.attempts, "Repository synced");
    Ok(())
}

async fn function_cv_with_repo(target: Target, req: FixtureRequest) -> Result<Created> {
    let org_id = req.dep_value::<Organization>(MODULE_ORG)?.id;
    let repo_id = req.dep_value::<Repository>(MODULE_SYNCED_REPO)?.id;
    let body = json!({
        "name": gen_string(StringKind::Alpha, 10),
        "organization_id": org_id,
        "repository_ids": [repo_id],
    });
    create_owned::<ContentView>(&target, body).await
}
