//! Typed records returned by the remote system.

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Format of sync plan dates on the wire.
pub const SYNC_DATE_FMT: &str = "%Y-%m-%d %H:%M:%S UTC";

/// Entity collections exposed by the remote API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Organization,
    LifecycleEnvironment,
    ContentView,
    ContentViewFilter,
    ContentViewVersion,
    ActivationKey,
    Product,
    Repository,
    SyncPlan,
    JobInvocation,
    Setting,
    Host,
    Subscription,
    /// Create-only: returns a generated registration command.
    RegistrationCommand,
}

impl EntityKind {
    /// Collection path relative to the server root.
    pub fn endpoint(self) -> &'static str {
        match self {
            Self::Organization => "/katello/api/organizations",
            Self::LifecycleEnvironment => "/katello/api/environments",
            Self::ContentView => "/katello/api/content_views",
            Self::ContentViewFilter => "/katello/api/content_view_filters",
            Self::ContentViewVersion => "/katello/api/content_view_versions",
            Self::ActivationKey => "/katello/api/activation_keys",
            Self::Product => "/katello/api/products",
            Self::Repository => "/katello/api/repositories",
            Self::SyncPlan => "/katello/api/sync_plans",
            Self::JobInvocation => "/api/job_invocations",
            Self::Setting => "/api/settings",
            Self::Host => "/api/hosts",
            Self::Subscription => "/katello/api/subscriptions",
            Self::RegistrationCommand => "/api/registration_commands",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Organization => "organization",
            Self::LifecycleEnvironment => "lifecycle_environment",
            Self::ContentView => "content_view",
            Self::ContentViewFilter => "content_view_filter",
            Self::ContentViewVersion => "content_view_version",
            Self::ActivationKey => "activation_key",
            Self::Product => "product",
            Self::Repository => "repository",
            Self::SyncPlan => "sync_plan",
            Self::JobInvocation => "job_invocation",
            Self::Setting => "setting",
            Self::Host => "host",
            Self::Subscription => "subscription",
            Self::RegistrationCommand => "registration_command",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A record type stored in one entity collection.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: EntityKind;

    /// Identifier used in entity paths.
    fn remote_id(&self) -> String;
}

macro_rules! numeric_entity {
    ($ty:ty, $kind:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = $kind;

            fn remote_id(&self) -> String {
                self.id.to_string()
            }
        }
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// The organization's Library environment.
    #[serde(default)]
    pub library_id: Option<u64>,
    #[serde(default)]
    pub default_content_view_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEnvironment {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub prior_id: Option<u64>,
    #[serde(default)]
    pub library: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentView {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    #[serde(default)]
    pub composite: bool,
    /// True for the organization's built-in view.
    #[serde(default)]
    pub default: bool,
    #[serde(default)]
    pub environment_ids: Vec<u64>,
    #[serde(default)]
    pub repository_ids: Vec<u64>,
}

/// Content unit types a view filter can select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterType {
    Rpm,
    Erratum,
    PackageGroup,
    Modulemd,
    Docker,
}

impl FilterType {
    pub const ALL: [FilterType; 5] = [
        FilterType::Rpm,
        FilterType::Erratum,
        FilterType::PackageGroup,
        FilterType::Modulemd,
        FilterType::Docker,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rpm => "rpm",
            Self::Erratum => "erratum",
            Self::PackageGroup => "package_group",
            Self::Modulemd => "modulemd",
            Self::Docker => "docker",
        }
    }
}

impl std::fmt::Display for FilterType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Include or exclude rule set attached to one content view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentViewFilter {
    pub id: u64,
    pub name: String,
    pub content_view_id: u64,
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub inclusion: bool,
    /// Also match packages with no errata.
    #[serde(default)]
    pub original_packages: bool,
    #[serde(default)]
    pub description: Option<String>,
    /// Restricts the filter to these repositories of the view; empty means all.
    #[serde(default)]
    pub repository_ids: Vec<u64>,
}

/// A published snapshot of a content view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentViewVersion {
    pub id: u64,
    pub content_view_id: u64,
    pub version: String,
    /// True when any filter shaped this version's content.
    #[serde(default)]
    pub filters_applied: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivationKey {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    #[serde(default)]
    pub environment_id: Option<u64>,
    #[serde(default)]
    pub content_view_id: Option<u64>,
    #[serde(default)]
    pub max_hosts: Option<u32>,
    #[serde(default = "default_true")]
    pub unlimited_hosts: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    #[serde(default)]
    pub sync_plan_id: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub product_id: u64,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Units per content type, e.g. `rpm` or `erratum`.
    #[serde(default)]
    pub content_counts: BTreeMap<String, u64>,
}

impl Repository {
    /// Count for one content type; absent types count as zero.
    pub fn content_count(&self, content_type: &str) -> u64 {
        self.content_counts.get(content_type).copied().unwrap_or(0)
    }
}

/// A registered content host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Host {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    #[serde(default)]
    pub content_view_id: Option<u64>,
    #[serde(default)]
    pub lifecycle_environment_id: Option<u64>,
    /// Consumer identity handed to the host at registration.
    #[serde(default)]
    pub subscription_uuid: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
}

/// A subscription pool imported from a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    #[serde(default)]
    pub quantity: i64,
    #[serde(default)]
    pub consumed: i64,
    #[serde(default)]
    pub upstream_pool_id: Option<String>,
}

/// How often a sync plan fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncInterval {
    #[serde(rename = "hourly")]
    Hourly,
    #[serde(rename = "daily")]
    Daily,
    #[serde(rename = "weekly")]
    Weekly,
    #[serde(rename = "custom cron")]
    CustomCron,
}

impl SyncInterval {
    pub const ALL: [SyncInterval; 4] = [
        SyncInterval::Hourly,
        SyncInterval::Daily,
        SyncInterval::Weekly,
        SyncInterval::CustomCron,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Hourly => "hourly",
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::CustomCron => "custom cron",
        }
    }
}

impl std::fmt::Display for SyncInterval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncPlan {
    pub id: u64,
    pub name: String,
    pub organization_id: u64,
    pub interval: SyncInterval,
    /// Start date in [`SYNC_DATE_FMT`].
    pub sync_date: String,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub cron_expression: Option<String>,
    #[serde(default)]
    pub product_ids: Vec<u64>,
}

impl SyncPlan {
    /// Parsed start date, if it is in the wire format or RFC 3339.
    pub fn sync_date_utc(&self) -> Option<DateTime<Utc>> {
        NaiveDateTime::parse_from_str(&self.sync_date, SYNC_DATE_FMT)
            .map(|naive| naive.and_utc())
            .ok()
            .or_else(|| {
                DateTime::parse_from_rfc3339(&self.sync_date)
                    .ok()
                    .map(|dt| dt.with_timezone(&Utc))
            })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobInvocation {
    pub id: u64,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub job_template_id: Option<u64>,
    #[serde(default)]
    pub search_query: Option<String>,
    #[serde(default)]
    pub succeeded: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub pending: u32,
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl JobInvocation {
    /// True once no target is pending.
    pub fn is_complete(&self) -> bool {
        self.pending == 0 && self.succeeded + self.failed == self.total
    }
}

/// A global setting. Settings are addressed by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Setting {
    pub name: String,
    #[serde(default)]
    pub value: serde_json::Value,
    #[serde(default)]
    pub description: Option<String>,
}

impl Entity for Setting {
    const KIND: EntityKind = EntityKind::Setting;

    fn remote_id(&self) -> String {
        self.name.clone()
    }
}

numeric_entity!(Organization, EntityKind::Organization);
numeric_entity!(LifecycleEnvironment, EntityKind::LifecycleEnvironment);
numeric_entity!(ContentView, EntityKind::ContentView);
numeric_entity!(ContentViewFilter, EntityKind::ContentViewFilter);
numeric_entity!(ContentViewVersion, EntityKind::ContentViewVersion);
numeric_entity!(ActivationKey, EntityKind::ActivationKey);
numeric_entity!(Product, EntityKind::Product);
numeric_entity!(Repository, EntityKind::Repository);
numeric_entity!(SyncPlan, EntityKind::SyncPlan);
numeric_entity!(JobInvocation, EntityKind::JobInvocation);
numeric_entity!(Host, EntityKind::Host);
numeric_entity!(Subscription, EntityKind::Subscription);

/// Status of an asynchronous remote task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for TaskState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    #[serde(default)]
    pub label: String,
    pub state: TaskState,
    /// Human-readable status or error text.
    #[serde(default)]
    pub humanized: String,
    #[serde(default)]
    pub progress: f64,
}

impl Task {
    pub fn succeeded(&self) -> bool {
        self.state == TaskState::Succeeded
    }

    pub fn failed(&self) -> bool {
        self.state == TaskState::Failed
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceStatus {
    pub status: String,
    #[serde(default)]
    pub duration_ms: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Overall and per-service health.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PingReport {
    pub status: String,
    #[serde(default)]
    pub services: BTreeMap<String, ServiceStatus>,
}

impl PingReport {
    pub const OK: &'static str = "ok";

    pub fn is_ok(&self) -> bool {
        self.status == Self::OK
    }

    /// Names of services not reporting `ok`.
    pub fn failing_services(&self) -> Vec<&str> {
        self.services
            .iter()
            .filter(|(_, s)| s.status != Self::OK)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// Output of a raw command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandResult {
    pub status: i32,
    #[serde(default)]
    pub stdout: String,
    #[serde(default)]
    pub stderr: String,
}

impl CommandResult {
    pub fn success(&self) -> bool {
        self.status == 0
    }

    pub fn stdout_lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines()
    }
}

fn default_true() -> bool {
    true
}
