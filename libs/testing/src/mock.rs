//! Scripted in-memory remote.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use satrig_remote::{
    content_view_publish_query, job_invocation_query, repository_sync_query, Clock,
    CommandResult, CommandRunner, EntityApi, EntityKind, PingReport, RemoteError, Result,
    ServiceStatus, SyncInterval, SyncPlan, Task, TaskApi, TaskState, SYNC_DATE_FMT,
};
use serde_json::{json, Value};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::appliance::Appliance;
use crate::clock::MockClock;
use crate::query::normalize;
use crate::store::{record_id, Store};

const SYNC_LABEL: &str = "Actions::Katello::Repository::Sync";
const JOB_LABEL: &str = "Actions::RemoteExecution::RunHostsJob";
const PUBLISH_LABEL: &str = "Actions::Katello::ContentView::Publish";
const DEFAULT_SERVICES: [&str; 6] = [
    "candlepin",
    "candlepin_auth",
    "candlepin_events",
    "foreman_tasks",
    "katello_events",
    "pulp3",
];

/// A recorded call against the mock.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { kind: EntityKind, name: Option<String> },
    Read { kind: EntityKind, id: String },
    Update { kind: EntityKind, id: String },
    Delete { kind: EntityKind, id: String },
    Search { kind: EntityKind, query: String },
    Action { kind: EntityKind, id: String, action: String },
    Task(String),
    SearchTasks(String),
    Ping,
    Execute(String),
}

/// How a scripted task evolves each time it is observed.
#[derive(Debug, Clone)]
pub struct TaskScript {
    label: String,
    states: Vec<TaskState>,
    humanized: String,
    delay: Duration,
}

impl TaskScript {
    /// States reported on successive observations; the last one repeats.
    pub fn new(states: impl IntoIterator<Item = TaskState>) -> Self {
        Self {
            label: "Actions::Mock::Task".to_string(),
            states: states.into_iter().collect(),
            humanized: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn succeeding() -> Self {
        Self::new([TaskState::Running, TaskState::Succeeded])
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new([TaskState::Running, TaskState::Failed]).with_humanized(message)
    }

    /// A task that never reaches a terminal state.
    pub fn stuck() -> Self {
        Self::new([TaskState::Running])
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn with_humanized(mut self, humanized: impl Into<String>) -> Self {
        self.humanized = humanized.into();
        self
    }

    /// Hide the task until `delay` has passed on the tokio clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[derive(Debug)]
struct ScriptedTask {
    id: String,
    query: String,
    script: TaskScript,
    observed: usize,
    visible_at: Instant,
}

impl ScriptedTask {
    fn observe(&mut self) -> Option<Task> {
        if Instant::now() < self.visible_at {
            return None;
        }
        let states = &self.script.states;
        let state = states
            .get(self.observed.min(states.len().saturating_sub(1)))
            .copied()
            .unwrap_or(TaskState::Pending);
        self.observed += 1;
        Some(Task {
            id: self.id.clone(),
            label: self.script.label.clone(),
            state,
            humanized: self.script.humanized.clone(),
            progress: if state == TaskState::Succeeded { 1.0 } else { 0.0 },
        })
    }
}

#[derive(Debug)]
struct State {
    store: Store,
    next_task: u64,
    tasks: Vec<ScriptedTask>,
    ping: PingReport,
    commands: Vec<(String, CommandResult)>,
    calls: Vec<Call>,
    create_failures: HashMap<EntityKind, VecDeque<(String, String)>>,
    delete_failures: HashMap<EntityKind, VecDeque<String>>,
    job_outcome: TaskScript,
    sync_content: Value,
    /// When each sync plan was (re)scheduled, and its last fired occurrence.
    plan_armed: HashMap<u64, DateTime<Utc>>,
    plan_fired: HashMap<u64, DateTime<Utc>>,
    appliance: Appliance,
}

impl State {
    fn register_task(&mut self, query: &str, script: TaskScript) -> String {
        self.next_task += 1;
        let id = format!("task-{:04}", self.next_task);
        self.tasks.push(ScriptedTask {
            id: id.clone(),
            query: normalize(query),
            visible_at: Instant::now() + script.delay,
            script,
            observed: 0,
        });
        id
    }

    fn sync_repository(&mut self, repository_id: &str) -> Result<String> {
        let org_id = self
            .store
            .repository_org(repository_id)
            .ok_or_else(|| RemoteError::not_found("repository", repository_id))?;
        let repo_num: u64 = repository_id
            .parse()
            .map_err(|_| RemoteError::not_found("repository", repository_id))?;

        self.store
            .set_content_counts(repository_id, self.sync_content.clone())?;
        let query = repository_sync_query(org_id, repo_num);
        Ok(self.register_task(&query, TaskScript::succeeding().with_label(SYNC_LABEL)))
    }

    /// Fire every enabled sync plan whose next occurrence has passed.
    fn fire_due_plans(&mut self, now: DateTime<Utc>) {
        let plans: Vec<SyncPlan> = self
            .store
            .all(EntityKind::SyncPlan)
            .iter()
            .filter_map(|v| serde_json::from_value(v.clone()).ok())
            .collect();

        for plan in plans.into_iter().filter(|p| p.enabled) {
            let Some(armed) = self.plan_armed.get(&plan.id).copied() else {
                continue;
            };
            let Some(due) = latest_occurrence(&plan, armed, now) else {
                continue;
            };
            if self.plan_fired.get(&plan.id).is_some_and(|fired| *fired >= due) {
                continue;
            }
            self.plan_fired.insert(plan.id, due);

            let repos: Vec<String> = self
                .store
                .all(EntityKind::Repository)
                .iter()
                .filter(|r| {
                    r.get("product_id")
                        .and_then(Value::as_u64)
                        .is_some_and(|p| plan.product_ids.contains(&p))
                })
                .map(|r| record_id(EntityKind::Repository, r))
                .collect();

            info!(plan = plan.id, due = %due, repositories = repos.len(), "[MOCK] Sync plan fired");
            for repo in repos {
                if let Err(e) = self.sync_repository(&repo) {
                    warn!(
                        plan = plan.id,
                        repository = %repo,
                        error = %e,
                        "[MOCK] Scheduled sync failed"
                    );
                }
            }
        }
    }
}

/// Most recent occurrence of `plan` in `(armed, now]`.
fn latest_occurrence(
    plan: &SyncPlan,
    armed: DateTime<Utc>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let start = plan.sync_date_utc()?;
    let step = match plan.interval {
        SyncInterval::Hourly => chrono::Duration::hours(1),
        SyncInterval::Daily => chrono::Duration::days(1),
        SyncInterval::Weekly => chrono::Duration::weeks(1),
        SyncInterval::CustomCron => cron_step(plan.cron_expression.as_deref()?)?,
    };
    if now < start || step <= chrono::Duration::zero() {
        return None;
    }

    let periods = (now - start).num_seconds() / step.num_seconds();
    let occurrence = start + step * i32::try_from(periods).ok()?;
    (occurrence > armed).then_some(occurrence)
}

/// Step of a `*/N * * * *` expression.
fn cron_step(expr: &str) -> Option<chrono::Duration> {
    let minutes: i64 = expr.split_whitespace().next()?.strip_prefix("*/")?.parse().ok()?;
    Some(chrono::Duration::minutes(minutes))
}

/// In-memory stand-in for the system under test.
///
/// Entities follow the product's validation rules closely enough for the
/// suite: names are required, at most 255 characters, and unique per
/// organization. Creating an organization seeds its Library environment and
/// default content view. Tasks are scripted per search query. Every call is
/// recorded for assertions.
#[derive(Debug)]
pub struct MockRemote {
    state: Mutex<State>,
    clock: MockClock,
}

impl MockRemote {
    /// A remote with a "Default Organization" and healthy services.
    pub fn new() -> Self {
        Self::with_clock(MockClock::fixed())
    }

    pub fn with_clock(clock: MockClock) -> Self {
        let services = DEFAULT_SERVICES
            .iter()
            .map(|name| {
                (
                    name.to_string(),
                    ServiceStatus {
                        status: PingReport::OK.to_string(),
                        duration_ms: Some("12".to_string()),
                        message: None,
                    },
                )
            })
            .collect();

        let mut store = Store::new();
        let now = clock.now().format(SYNC_DATE_FMT).to_string();
        // Seeding cannot fail on an empty store.
        let _ = store.create(
            EntityKind::Organization,
            json!({"name": "Default Organization", "label": "Default_Organization"}),
            &now,
        );

        Self {
            state: Mutex::new(State {
                store,
                next_task: 0,
                tasks: Vec::new(),
                ping: PingReport {
                    status: PingReport::OK.to_string(),
                    services,
                },
                commands: Vec::new(),
                calls: Vec::new(),
                create_failures: HashMap::new(),
                delete_failures: HashMap::new(),
                job_outcome: TaskScript::succeeding().with_label(JOB_LABEL),
                sync_content: json!({"rpm": 32, "erratum": 4, "package_group": 2}),
                plan_armed: HashMap::new(),
                plan_fired: HashMap::new(),
                appliance: Appliance::default(),
            }),
            clock,
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn clock(&self) -> MockClock {
        self.clock
    }

    /// Seed a global setting.
    pub fn with_setting(self, name: &str, value: Value) -> Self {
        let now = self.now_str();
        {
            let mut state = self.state();
            let _ = state
                .store
                .create(EntityKind::Setting, json!({"name": name, "value": value}), &now);
        }
        self
    }

    /// Register a task visible to `search_tasks(query)`.
    pub fn script_task(&self, query: &str, script: TaskScript) -> String {
        self.state().register_task(query, script)
    }

    /// How tasks of newly created job invocations behave.
    pub fn set_job_outcome(&self, script: TaskScript) {
        self.state().job_outcome = script;
    }

    /// Content counts a repository reports after it syncs.
    pub fn set_sync_content(&self, counts: Value) {
        self.state().sync_content = counts;
    }

    /// Set one service's ping status; the overall status follows.
    pub fn set_service_status(&self, service: &str, status: &str) {
        let mut state = self.state();
        state.ping.services.insert(
            service.to_string(),
            ServiceStatus {
                status: status.to_string(),
                duration_ms: None,
                message: None,
            },
        );
        let healthy = state
            .ping
            .services
            .values()
            .all(|s| s.status == PingReport::OK);
        state.ping.status = if healthy { PingReport::OK } else { "FAIL" }.to_string();
    }

    /// Respond to commands containing `pattern`. Later scripts win, and
    /// scripts take precedence over the simulated server and host shells.
    pub fn on_command(&self, pattern: &str, result: CommandResult) {
        self.state().commands.push((pattern.to_string(), result));
    }

    /// Reject the next create of `kind` with `reason`.
    pub fn fail_next_create(&self, kind: EntityKind, reason: &str, message: &str) {
        self.state()
            .create_failures
            .entry(kind)
            .or_default()
            .push_back((reason.to_string(), message.to_string()));
    }

    /// Fail the next delete of `kind` with a server error.
    pub fn fail_next_delete(&self, kind: EntityKind, message: &str) {
        self.state()
            .delete_failures
            .entry(kind)
            .or_default()
            .push_back(message.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.state().calls.clone()
    }

    /// Ids deleted for `kind`, in call order.
    pub fn deleted(&self, kind: EntityKind) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete { kind: k, id } if k == kind => Some(id),
                _ => None,
            })
            .collect()
    }

    /// Number of create calls for `kind`, including rejected ones.
    pub fn create_count(&self, kind: EntityKind) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, Call::Create { kind: k, .. } if *k == kind))
            .count()
    }

    /// Commands executed, in order.
    pub fn executed(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Execute(cmd) => Some(cmd),
                _ => None,
            })
            .collect()
    }

    /// Current records of `kind`.
    pub fn entities(&self, kind: EntityKind) -> Vec<Value> {
        self.state().store.all(kind).to_vec()
    }

    pub fn entity(&self, kind: EntityKind, id: &str) -> Option<Value> {
        self.state().store.get(kind, id).cloned()
    }

    fn now_str(&self) -> String {
        self.clock.now().format(SYNC_DATE_FMT).to_string()
    }

    fn record(&self, call: Call) -> MutexGuard<'_, State> {
        let mut state = self.state();
        state.calls.push(call);
        state
    }

    fn arm_plan(&self, state: &mut State, record: &Value) {
        if let Some(id) = record.get("id").and_then(Value::as_u64) {
            state.plan_armed.insert(id, self.clock.now());
            state.plan_fired.remove(&id);
        }
    }
}

impl Default for MockRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityApi for MockRemote {
    async fn create(&self, kind: EntityKind, body: Value) -> Result<Value> {
        let name = body
            .get("name")
            .or_else(|| body.get(kind.as_str()).and_then(|b| b.get("name")))
            .and_then(Value::as_str)
            .map(str::to_string);
        let now = self.now_str();
        let mut state = self.record(Call::Create {
            kind,
            name: name.clone(),
        });

        if let Some((reason, message)) = state
            .create_failures
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
        {
            return Err(RemoteError::rejected(reason, message));
        }
        if kind == EntityKind::RegistrationCommand {
            let state = &mut *state;
            return state.appliance.registration_command(&state.store, body);
        }

        let mut record = state.store.create(kind, body, &now)?;
        match kind {
            EntityKind::JobInvocation => {
                let id = record.get("id").and_then(Value::as_u64).unwrap_or_default();
                let script = state.job_outcome.clone();
                let succeeded = script.states.last() == Some(&TaskState::Succeeded);
                let failed = script.states.last() == Some(&TaskState::Failed);
                let task_id = state.register_task(&job_invocation_query(id), script);
                record = state.store.update(
                    kind,
                    &id.to_string(),
                    json!({
                        "task_id": task_id,
                        "total": 1,
                        "succeeded": u32::from(succeeded),
                        "failed": u32::from(failed),
                        "pending": u32::from(!succeeded && !failed),
                    }),
                )?;
            }
            EntityKind::SyncPlan => self.arm_plan(&mut state, &record),
            _ => {}
        }

        info!(kind = %kind, name = ?name, id = %record_id(kind, &record), "[MOCK] Created entity");
        Ok(record)
    }

    async fn read(&self, kind: EntityKind, id: &str) -> Result<Value> {
        let now = self.clock.now();
        let mut state = self.record(Call::Read {
            kind,
            id: id.to_string(),
        });
        if kind == EntityKind::Repository {
            state.fire_due_plans(now);
        }
        state.store.read(kind, id)
    }

    async fn update(&self, kind: EntityKind, id: &str, body: Value) -> Result<Value> {
        let mut state = self.record(Call::Update {
            kind,
            id: id.to_string(),
        });
        let record = state.store.update(kind, id, body)?;
        if kind == EntityKind::SyncPlan {
            self.arm_plan(&mut state, &record);
        }
        debug!(kind = %kind, id = %id, "[MOCK] Updated entity");
        Ok(record)
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let mut state = self.record(Call::Delete {
            kind,
            id: id.to_string(),
        });

        if let Some(message) = state
            .delete_failures
            .get_mut(&kind)
            .and_then(VecDeque::pop_front)
        {
            return Err(RemoteError::api(500, "internal_error", message));
        }

        state.store.delete(kind, id)?;
        info!(kind = %kind, id = %id, "[MOCK] Deleted entity");
        Ok(())
    }

    async fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<Value>> {
        let now = self.clock.now();
        let mut state = self.record(Call::Search {
            kind,
            query: query.to_string(),
        });
        if kind == EntityKind::Repository {
            state.fire_due_plans(now);
        }
        Ok(state.store.search(kind, query))
    }

    async fn action(&self, kind: EntityKind, id: &str, action: &str, body: Value) -> Result<Value> {
        let mut state = self.record(Call::Action {
            kind,
            id: id.to_string(),
            action: action.to_string(),
        });

        let ids: Vec<u64> = body
            .get("product_ids")
            .and_then(Value::as_array)
            .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
            .unwrap_or_default();

        match (kind, action) {
            (EntityKind::Repository, "sync") => {
                let task_id = state.sync_repository(id)?;
                Ok(json!({"id": task_id, "state": "planned", "label": SYNC_LABEL}))
            }
            (EntityKind::ContentView, "publish") => {
                let version = state.store.publish_view(id)?;
                let view_id = version
                    .get("content_view_id")
                    .and_then(Value::as_u64)
                    .unwrap_or_default();
                let task_id = state.register_task(
                    &content_view_publish_query(view_id),
                    TaskScript::succeeding().with_label(PUBLISH_LABEL),
                );
                info!(content_view = view_id, version = %version["version"], "[MOCK] Published");
                Ok(json!({
                    "id": task_id,
                    "state": "planned",
                    "label": PUBLISH_LABEL,
                    "input": {"content_view_version_id": version["id"]},
                }))
            }
            (EntityKind::SyncPlan, "add_products") => {
                state.store.set_plan_products(id, &ids, true)
            }
            (EntityKind::SyncPlan, "remove_products") => {
                state.store.set_plan_products(id, &ids, false)
            }
            _ => Err(RemoteError::rejected(
                "unsupported_action",
                format!("{kind} does not support '{action}'"),
            )),
        }
    }
}

#[async_trait]
impl TaskApi for MockRemote {
    async fn task(&self, id: &str) -> Result<Task> {
        let mut state = self.record(Call::Task(id.to_string()));
        state
            .tasks
            .iter_mut()
            .find(|t| t.id == id)
            .and_then(ScriptedTask::observe)
            .ok_or_else(|| RemoteError::not_found("task", id))
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>> {
        let now = self.clock.now();
        let mut state = self.record(Call::SearchTasks(query.to_string()));
        state.fire_due_plans(now);

        let wanted = normalize(query);
        Ok(state
            .tasks
            .iter_mut()
            .filter(|t| t.query == wanted)
            .filter_map(ScriptedTask::observe)
            .collect())
    }

    async fn ping(&self) -> Result<PingReport> {
        let state = self.record(Call::Ping);
        Ok(state.ping.clone())
    }
}

#[async_trait]
impl CommandRunner for MockRemote {
    async fn execute(&self, command: &str) -> Result<CommandResult> {
        let now = self.clock.now();
        let mut state = self.record(Call::Execute(command.to_string()));
        let scripted = state
            .commands
            .iter()
            .rev()
            .find(|(pattern, _)| command.contains(pattern.as_str()))
            .map(|(_, result)| result.clone());
        let result = match scripted {
            Some(result) => result,
            None => {
                let State {
                    store, appliance, ..
                } = &mut *state;
                appliance
                    .run(store, command, now)
                    .unwrap_or(CommandResult {
                        status: 0,
                        stdout: String::new(),
                        stderr: String::new(),
                    })
            }
        };
        debug!(command = %command, status = result.status, "[MOCK] Executed command");
        Ok(result)
    }
}

impl Clock for MockRemote {
    fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Snapshot of per-kind entity counts, for debugging test failures.
pub fn entity_counts(remote: &MockRemote) -> BTreeMap<EntityKind, usize> {
    let state = remote.state();
    [
        EntityKind::Organization,
        EntityKind::LifecycleEnvironment,
        EntityKind::ContentView,
        EntityKind::ContentViewFilter,
        EntityKind::ContentViewVersion,
        EntityKind::ActivationKey,
        EntityKind::Product,
        EntityKind::Repository,
        EntityKind::SyncPlan,
        EntityKind::JobInvocation,
        EntityKind::Setting,
        EntityKind::Host,
        EntityKind::Subscription,
    ]
    .into_iter()
    .map(|k| (k, state.store.all(k).len()))
    .collect()
}
