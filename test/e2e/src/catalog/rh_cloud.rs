//! Insights (Red Hat cloud) fixtures.

use anyhow::{bail, Context, Result};
use satrig_fixtures::{Created, FixtureDef, FixtureError, FixtureRegistry, FixtureRequest, Scope};
use satrig_remote::{ActivationKey, Organization};
use serde_json::{json, Value};
use tracing::{info, warn};

use super::create_owned;
use crate::datafactory::{gen_string, StringKind};
use crate::target::Target;

pub const MODULE_TARGET_SAT_INSIGHTS: &str = "module_target_sat_insights";
pub const RHCLOUD_MANIFEST_ORG: &str = "rhcloud_manifest_org";
pub const RHCLOUD_ACTIVATION_KEY: &str = "rhcloud_activation_key";
pub const INVENTORY_SETTINGS: &str = "inventory_settings";

/// Enables the local advisor engine.
pub const IOP_INSTALL_COMMAND: &str =
    "satellite-installer --foreman-plugin-rh-cloud-enable-iop-advisor-engine true";
const IOP_UNINSTALL_COMMAND: &str =
    "satellite-installer --foreman-plugin-rh-cloud-enable-iop-advisor-engine false";
const CUSTOM_HIERA: &str = "/etc/foreman-installer/custom-hiera.yaml";

/// Settings that shape the inventory upload, forced to `false` by
/// `inventory_settings`.
pub const INVENTORY_SETTING_NAMES: [&str; 4] = [
    "obfuscate_inventory_hostnames",
    "obfuscate_inventory_ips",
    "exclude_installed_packages",
    "include_parameter_tags",
];

/// A target configured for Insights.
///
/// Hosted by default. With `{"hosted": false}` the local advisor engine is
/// installed on the target first.
#[derive(Debug, Clone)]
pub struct InsightsTarget {
    pub target: Target,
    pub hosted: bool,
}

impl InsightsTarget {
    pub fn local_advisor_enabled(&self) -> bool {
        !self.hosted
    }
}

/// Inventory settings as they were before the fixture changed them.
#[derive(Debug, Clone, PartialEq)]
pub struct InventorySettings {
    pub previous: Vec<(String, Value)>,
}

pub(super) fn register(
    registry: &mut FixtureRegistry,
    target: &Target,
) -> Result<(), FixtureError> {
    let t = target.clone();
    registry.register(FixtureDef::new(
        MODULE_TARGET_SAT_INSIGHTS,
        Scope::Module,
        move |req| insights_target(t.clone(), req),
    ))?;

    registry.register(
        FixtureDef::new(RHCLOUD_MANIFEST_ORG, Scope::Module, manifest_org)
            .requires(MODULE_TARGET_SAT_INSIGHTS),
    )?;

    registry.register(
        FixtureDef::new(RHCLOUD_ACTIVATION_KEY, Scope::Module, activation_key)
            .requires(MODULE_TARGET_SAT_INSIGHTS)
            .requires(RHCLOUD_MANIFEST_ORG),
    )?;

    registry.register(
        FixtureDef::new(INVENTORY_SETTINGS, Scope::Function, inventory_settings)
            .requires(MODULE_TARGET_SAT_INSIGHTS),
    )?;
    Ok(())
}

async fn insights_target(target: Target, req: FixtureRequest) -> Result<Created> {
    let hosted = req
        .params()
        .bool_or("hosted", target.settings().rh_cloud.hosted_insights);
    let hostname = target.settings().server.hostname.clone();

    if hosted {
        return Ok(Created::new(hostname, InsightsTarget { target, hosted }));
    }

    let rh_cloud = &target.settings().rh_cloud;
    if !rh_cloud.iop_advisor_image.is_empty() {
        target
            .execute_ok(&format!(
                "echo \"iop_advisor_engine::image: '{}'\" >> {CUSTOM_HIERA}",
                rh_cloud.iop_advisor_image
            ))
            .await?;
    }

    let result = target.execute(IOP_INSTALL_COMMAND).await?;
    if !result.success() {
        bail!("Error installing advisor engine: {}", result.stdout.trim());
    }

    for command in rh_cloud.setup_commands() {
        let result = target.execute(command).await?;
        if !result.success() {
            bail!(
                "Error during post-install of advisor engine: {}",
                result.stdout.trim()
            );
        }
    }
    info!(host = %hostname, "Local advisor engine installed");

    let teardown_target = target.clone();
    Ok(
        Created::new(hostname, InsightsTarget { target, hosted }).with_teardown(
            move || async move {
                teardown_target
                    .execute_ok(IOP_UNINSTALL_COMMAND)
                    .await
                    .context("failed to disable the local advisor engine")?;
                Ok(())
            },
        ),
    )
}

async fn manifest_org(req: FixtureRequest) -> Result<Created> {
    let insights = req.dep_value::<InsightsTarget>(MODULE_TARGET_SAT_INSIGHTS)?;
    let name = gen_string(StringKind::Alphanumeric, 12);
    create_owned::<Organization>(&insights.target, json!({ "name": name })).await
}

async fn activation_key(req: FixtureRequest) -> Result<Created> {
    let insights = req.dep_value::<InsightsTarget>(MODULE_TARGET_SAT_INSIGHTS)?;
    let org = req.dep_value::<Organization>(RHCLOUD_MANIFEST_ORG)?;
    let body = json!({
        "name": gen_string(StringKind::Alpha, 10),
        "organization_id": org.id,
        "environment_id": org.library_id,
        "content_view_id": org.default_content_view_id,
        "service_level": "Self-Support",
        "purpose_usage": "test-usage",
        "purpose_role": "test-role",
        "auto_attach": false,
    });
    create_owned::<ActivationKey>(&insights.target, body).await
}

async fn inventory_settings(req: FixtureRequest) -> Result<Created> {
    let target = req
        .dep_value::<InsightsTarget>(MODULE_TARGET_SAT_INSIGHTS)?
        .target
        .clone();

    let mut previous = Vec::with_capacity(INVENTORY_SETTING_NAMES.len());
    for name in INVENTORY_SETTING_NAMES {
        let old = target.update_setting(name, Value::Bool(false)).await?;
        previous.push((name.to_string(), old));
    }

    let restore = previous.clone();
    Ok(
        Created::new(INVENTORY_SETTINGS, InventorySettings { previous }).with_teardown(
            move || async move {
                let mut failed = Vec::new();
                for (name, value) in restore {
                    if let Err(e) = target.update_setting(&name, value).await {
                        warn!(setting = %name, error = %e, "Failed to restore setting");
                        failed.push(name);
                    }
                }
                if !failed.is_empty() {
                    bail!("failed to restore settings: {}", failed.join(", "));
                }
                Ok(())
            },
        ),
    )
}
