//! End-to-end happy path.
//!
//! Walks the flow a content administrator follows, through fixtures and the
//! remote boundary together:
//!
//! 1. Organization, lifecycle environment, content view, activation key
//! 2. Product and repository
//! 3. Repository sync and its task
//! 4. Remote execution job
//! 5. Teardown of everything in reverse creation order
//!
//! ## Running
//!
//! ```bash
//! cargo test -p satrig-e2e --test happy_path
//! ```


use common::{product_with_repo, Harness};
use satrig_e2e::catalog::{MODULE_AK_WITH_CV, MODULE_CV, MODULE_LCE, MODULE_ORG};
use satrig_e2e::syncplan::{validate_repo_content, validate_task_status};
use satrig_fixtures::Scope;
use satrig_remote::{
    job_invocation_query, ActivationKey, ContentView, EntityApi, EntityApiExt, EntityKind,
    JobInvocation, LifecycleEnvironment, Organization,
};
use satrig_testing::Call;
use serde_json::json;

#[tokio::test(start_paused = true)]
async fn e2e_happy_path_org_to_job() {
    let mut h = Harness::new();

    // 1. Content scaffolding through fixtures.
    let resolved = h
        .request(&[MODULE_ORG, MODULE_LCE, MODULE_CV, MODULE_AK_WITH_CV])
        .await;
    let org = resolved.value::<Organization>(MODULE_ORG).unwrap().clone();
    let lce = resolved
        .value::<LifecycleEnvironment>(MODULE_LCE)
        .unwrap()
        .clone();
    let cv = resolved.value::<ContentView>(MODULE_CV).unwrap().clone();
    let ak = resolved
        .value::<ActivationKey>(MODULE_AK_WITH_CV)
        .unwrap()
        .clone();

    assert_eq!(ak.organization_id, org.id);
    assert_eq!(ak.environment_id, Some(lce.id));
    assert_eq!(ak.content_view_id, Some(cv.id));

    // 2. A product with one repository, empty until synced.
    let (_, repo) = product_with_repo(&h.target, org.id).await;
    validate_repo_content(h.target.api(), repo.id, &["rpm", "erratum"], false)
        .await
        .unwrap();

    // 3. Sync and wait for the task.
    h.target
        .api()
        .action(EntityKind::Repository, &repo.id.to_string(), "sync", json!({}))
        .await
        .unwrap();
    let outcome = validate_task_status(&h.target, repo.id, org.id, 10)
        .await
        .unwrap();
    assert_eq!(outcome.attempts, 2);
    validate_repo_content(h.target.api(), repo.id, &["rpm", "erratum"], true)
        .await
        .unwrap();

    // 4. Run a job on the registered host.
    let job: JobInvocation = h
        .target
        .api()
        .create_as(json!({
            "job_template_id": 1,
            "search_query": format!("activation_key = {}", ak.name),
        }))
        .await
        .unwrap();
    h.target
        .wait_for_tasks(&job_invocation_query(job.id))
        .await
        .unwrap();
    let job = h.target.api().refresh(&job).await.unwrap();
    assert_eq!(job.succeeded, 1);

    // 5. Module teardown in reverse creation order.
    let report = h.session.exit(Scope::Module).await.unwrap();
    assert!(report.is_clean());
    let torn_down: Vec<&str> = report.torn_down().iter().map(String::as_str).collect();
    assert_eq!(
        torn_down,
        vec![MODULE_AK_WITH_CV, MODULE_CV, MODULE_LCE, MODULE_ORG]
    );

    let deletes: Vec<EntityKind> = h
        .remote
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Delete { kind, .. } => Some(kind),
            _ => None,
        })
        .collect();
    assert_eq!(
        deletes,
        vec![
            EntityKind::ActivationKey,
            EntityKind::ContentView,
            EntityKind::LifecycleEnvironment,
            EntityKind::Organization,
        ]
    );
    assert!(h
        .remote
        .entity(EntityKind::Organization, &org.id.to_string())
        .is_none());
    h.finish().await;
}
