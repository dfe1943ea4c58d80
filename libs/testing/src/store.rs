//! In-memory entity collections with the product's validation rules.

use std::collections::BTreeMap;

use satrig_remote::{EntityKind, RemoteError, Result};
use serde_json::{json, Map, Value};

use crate::query::Query;

/// Longest accepted entity name.
pub const MAX_NAME_LEN: usize = 255;

const LIBRARY: &str = "Library";
const DEFAULT_VIEW: &str = "Default Organization View";
const INTERVALS: [&str; 4] = ["hourly", "daily", "weekly", "custom cron"];
const FILTER_TYPES: [&str; 5] = ["rpm", "erratum", "package_group", "modulemd", "docker"];

/// A reference from one record to another.
struct Reference {
    field: &'static str,
    target: EntityKind,
    required: bool,
}

const fn required(field: &'static str, target: EntityKind) -> Reference {
    Reference {
        field,
        target,
        required: true,
    }
}

const fn optional(field: &'static str, target: EntityKind) -> Reference {
    Reference {
        field,
        target,
        required: false,
    }
}

const ORG: Reference = required("organization_id", EntityKind::Organization);

/// Entity records keyed by kind, in creation order.
#[derive(Debug)]
pub(crate) struct Store {
    next_id: u64,
    records: BTreeMap<EntityKind, Vec<Value>>,
}

impl Store {
    pub fn new() -> Self {
        Self {
            next_id: 1,
            records: BTreeMap::new(),
        }
    }

    pub fn all(&self, kind: EntityKind) -> &[Value] {
        self.records.get(&kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn get(&self, kind: EntityKind, id: &str) -> Option<&Value> {
        self.all(kind).iter().find(|r| record_id(kind, r) == id)
    }

    fn get_mut(&mut self, kind: EntityKind, id: &str) -> Option<&mut Value> {
        self.records
            .get_mut(&kind)?
            .iter_mut()
            .find(|r| record_id(kind, r) == id)
    }

    pub fn read(&self, kind: EntityKind, id: &str) -> Result<Value> {
        self.get(kind, id)
            .cloned()
            .ok_or_else(|| RemoteError::not_found(kind.as_str(), id))
    }

    pub fn search(&self, kind: EntityKind, query: &str) -> Vec<Value> {
        let query = Query::parse(query);
        self.all(kind)
            .iter()
            .filter(|r| query.matches(r))
            .cloned()
            .collect()
    }

    fn allocate_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn insert(&mut self, kind: EntityKind, record: Value) -> Value {
        self.records.entry(kind).or_default().push(record.clone());
        record
    }

    /// Validate and store a new entity.
    pub fn create(&mut self, kind: EntityKind, body: Value, now: &str) -> Result<Value> {
        let mut fields = into_object(kind, body)?;

        if has_name(kind) {
            let name = validate_name(&fields)?;
            self.check_unique(kind, &name, scope_of(kind, &fields), None)?;
        }
        self.check_references(kind, &fields, None)?;

        match kind {
            EntityKind::Setting => {
                let name = fields
                    .get("name")
                    .and_then(Value::as_str)
                    .filter(|n| !n.is_empty())
                    .ok_or_else(|| RemoteError::rejected("invalid_name", "Name can't be blank"))?
                    .to_string();
                if self.get(kind, &name).is_some() {
                    return Err(RemoteError::rejected(
                        "duplicate",
                        "Name has already been taken",
                    ));
                }
                return Ok(self.insert(kind, Value::Object(fields)));
            }
            EntityKind::Organization => return Ok(self.create_organization(fields)),
            EntityKind::RegistrationCommand => {
                return Err(RemoteError::rejected(
                    "unsupported_action",
                    "registration commands are generated, not stored",
                ))
            }
            EntityKind::LifecycleEnvironment => {
                let library = self.library_of(fields.get("organization_id"));
                fields.entry("prior_id").or_insert(library);
                fields.insert("library".into(), json!(false));
            }
            EntityKind::ContentView => {
                let library = self.library_of(fields.get("organization_id"));
                fields.insert("default".into(), json!(false));
                fields.entry("composite").or_insert(json!(false));
                fields.entry("environment_ids").or_insert(json!([library]));
                fields.entry("repository_ids").or_insert(json!([]));
            }
            EntityKind::ContentViewFilter => {
                fields.entry("inclusion").or_insert(json!(false));
                fields.entry("original_packages").or_insert(json!(false));
                fields.entry("repository_ids").or_insert(json!([]));
                self.validate_filter(&fields)?;
            }
            EntityKind::ActivationKey => {
                let unlimited = fields.get("max_hosts").is_none_or(Value::is_null);
                fields.entry("unlimited_hosts").or_insert(json!(unlimited));
            }
            EntityKind::Repository => {
                fields.insert("content_counts".into(), json!({}));
            }
            EntityKind::SyncPlan => {
                validate_interval(&fields)?;
                fields.entry("enabled").or_insert(json!(false));
                fields.entry("sync_date").or_insert(json!(now));
                fields.entry("product_ids").or_insert(json!([]));
            }
            EntityKind::Subscription => {
                fields.entry("consumed").or_insert(json!(0));
            }
            EntityKind::JobInvocation
            | EntityKind::Product
            | EntityKind::ContentViewVersion
            | EntityKind::Host => {}
        }

        let id = self.allocate_id();
        fields.insert("id".into(), json!(id));
        if has_name(kind) {
            if let Some(name) = fields.get("name").cloned() {
                fields.entry("label").or_insert(name);
            }
        }
        Ok(self.insert(kind, Value::Object(fields)))
    }

    fn create_organization(&mut self, mut fields: Map<String, Value>) -> Value {
        let org_id = self.allocate_id();
        let library_id = self.allocate_id();
        let view_id = self.allocate_id();

        self.insert(
            EntityKind::LifecycleEnvironment,
            json!({
                "id": library_id,
                "name": LIBRARY,
                "label": LIBRARY,
                "organization_id": org_id,
                "prior_id": null,
                "library": true,
            }),
        );
        self.insert(
            EntityKind::ContentView,
            json!({
                "id": view_id,
                "name": DEFAULT_VIEW,
                "organization_id": org_id,
                "composite": false,
                "default": true,
                "environment_ids": [library_id],
                "repository_ids": [],
            }),
        );

        fields.insert("id".into(), json!(org_id));
        if let Some(name) = fields.get("name").cloned() {
            fields.entry("label").or_insert(name);
        }
        fields.insert("library_id".into(), json!(library_id));
        fields.insert("default_content_view_id".into(), json!(view_id));
        self.insert(EntityKind::Organization, Value::Object(fields))
    }

    /// Merge `body` into an existing entity.
    pub fn update(&mut self, kind: EntityKind, id: &str, body: Value) -> Result<Value> {
        let current = self.read(kind, id)?;
        let mut changes = into_object(kind, body)?;
        changes.remove("id");

        if has_name(kind) && changes.contains_key("name") {
            let name = validate_name(&changes)?;
            let scope = scope_of(kind, current_object(&current));
            self.check_unique(kind, &name, scope, Some(id))?;
        }

        let mut merged = current_object(&current).clone();
        merged.extend(changes.clone());
        self.check_references(kind, &merged, Some(&changes))?;
        if kind == EntityKind::SyncPlan && changes.contains_key("interval") {
            validate_interval(&merged)?;
        }
        if kind == EntityKind::ContentViewFilter
            && ["type", "content_view_id", "repository_ids"]
                .iter()
                .any(|k| changes.contains_key(*k))
        {
            self.validate_filter(&merged)?;
        }

        let record = self
            .get_mut(kind, id)
            .ok_or_else(|| RemoteError::not_found(kind.as_str(), id))?;
        if let Value::Object(map) = record {
            map.extend(changes);
        }
        Ok(record.clone())
    }

    /// Remove an entity. Deleting an organization removes its contents;
    /// deleting a content view removes its filters and versions.
    pub fn delete(&mut self, kind: EntityKind, id: &str) -> Result<Value> {
        let record = self.read(kind, id)?;
        let built_in = record.get("library") == Some(&json!(true))
            || record.get("default") == Some(&json!(true));
        if built_in {
            return Err(RemoteError::rejected(
                "protected",
                format!("{kind} {id} is built in and cannot be deleted"),
            ));
        }

        if let Some(records) = self.records.get_mut(&kind) {
            records.retain(|r| record_id(kind, r) != id);
        }

        let record_key = record.get("id").cloned().unwrap_or(Value::Null);
        match kind {
            EntityKind::Organization => {
                let products = self.ids_where(EntityKind::Product, "organization_id", &record_key);
                let views = self.ids_where(EntityKind::ContentView, "organization_id", &record_key);
                for records in self.records.values_mut() {
                    records.retain(|r| {
                        r.get("organization_id") != Some(&record_key)
                            && r.get("product_id").is_none_or(|p| !products.contains(p))
                            && r.get("content_view_id").is_none_or(|v| !views.contains(v))
                    });
                }
            }
            EntityKind::ContentView => {
                for dependent in [EntityKind::ContentViewFilter, EntityKind::ContentViewVersion] {
                    if let Some(records) = self.records.get_mut(&dependent) {
                        records.retain(|r| r.get("content_view_id") != Some(&record_key));
                    }
                }
            }
            _ => {}
        }

        Ok(record)
    }

    /// Remove every `kind` record whose `field` equals `value`.
    pub fn remove_where(&mut self, kind: EntityKind, field: &str, value: &Value) -> usize {
        let Some(records) = self.records.get_mut(&kind) else {
            return 0;
        };
        let before = records.len();
        records.retain(|r| r.get(field) != Some(value));
        before - records.len()
    }

    /// Ids of `kind` records whose `field` equals `value`.
    fn ids_where(&self, kind: EntityKind, field: &str, value: &Value) -> Vec<Value> {
        self.all(kind)
            .iter()
            .filter(|r| r.get(field) == Some(value))
            .filter_map(|r| r.get("id").cloned())
            .collect()
    }

    /// Replace a repository's content counts.
    pub fn set_content_counts(&mut self, repository_id: &str, counts: Value) -> Result<()> {
        let repo = self
            .get_mut(EntityKind::Repository, repository_id)
            .ok_or_else(|| RemoteError::not_found("repository", repository_id))?;
        if let Value::Object(map) = repo {
            map.insert("content_counts".into(), counts);
        }
        Ok(())
    }

    /// Organization id of a repository, through its product.
    pub fn repository_org(&self, repository_id: &str) -> Option<u64> {
        let repo = self.get(EntityKind::Repository, repository_id)?;
        let product_id = repo.get("product_id")?.as_u64()?.to_string();
        self.get(EntityKind::Product, &product_id)?
            .get("organization_id")?
            .as_u64()
    }

    /// Attach or detach products from a sync plan, keeping both sides in step.
    pub fn set_plan_products(
        &mut self,
        plan_id: &str,
        product_ids: &[u64],
        attach: bool,
    ) -> Result<Value> {
        let plan_num: u64 = plan_id
            .parse()
            .map_err(|_| RemoteError::not_found("sync_plan", plan_id))?;
        let plan = self.read(EntityKind::SyncPlan, plan_id)?;

        for product_id in product_ids {
            let product = self
                .get_mut(EntityKind::Product, &product_id.to_string())
                .ok_or_else(|| {
                    RemoteError::rejected(
                        "invalid_reference",
                        format!("product {product_id} does not exist"),
                    )
                })?;
            if let Value::Object(map) = product {
                let value = if attach { json!(plan_num) } else { Value::Null };
                map.insert("sync_plan_id".into(), value);
            }
        }

        let mut current = id_list(current_object(&plan), "product_ids");
        if attach {
            for id in product_ids {
                if !current.contains(id) {
                    current.push(*id);
                }
            }
        } else {
            current.retain(|id| !product_ids.contains(id));
        }

        self.update(EntityKind::SyncPlan, plan_id, json!({ "product_ids": current }))
    }

    /// Publish a new version of a content view.
    ///
    /// Versions count up from `1.0`; a version records whether any filter
    /// was attached to the view when it was published.
    pub fn publish_view(&mut self, view_id: &str) -> Result<Value> {
        let view = self.read(EntityKind::ContentView, view_id)?;
        if view.get("default") == Some(&json!(true)) {
            return Err(RemoteError::rejected(
                "protected",
                "The default content view cannot be published",
            ));
        }
        let view_key = view.get("id").cloned().unwrap_or(Value::Null);
        let filters = self
            .ids_where(EntityKind::ContentViewFilter, "content_view_id", &view_key)
            .len();
        let published = self
            .ids_where(EntityKind::ContentViewVersion, "content_view_id", &view_key)
            .len();

        let id = self.allocate_id();
        Ok(self.insert(
            EntityKind::ContentViewVersion,
            json!({
                "id": id,
                "content_view_id": view_key,
                "version": format!("{}.0", published + 1),
                "filters_applied": filters > 0,
            }),
        ))
    }

    fn library_of(&self, org_id: Option<&Value>) -> Value {
        self.all(EntityKind::Organization)
            .iter()
            .find(|o| org_id.is_some_and(|id| o.get("id") == Some(id)))
            .and_then(|o| o.get("library_id").cloned())
            .unwrap_or(Value::Null)
    }

    fn check_unique(
        &self,
        kind: EntityKind,
        name: &str,
        scope: Option<&Value>,
        except: Option<&str>,
    ) -> Result<()> {
        let taken = self.all(kind).iter().any(|r| {
            r.get("name").and_then(Value::as_str) == Some(name)
                && scope_of(kind, current_object(r)) == scope
                && except != Some(record_id(kind, r).as_str())
        });
        if taken {
            return Err(RemoteError::rejected(
                "duplicate",
                "Name has already been taken",
            ));
        }
        Ok(())
    }

    /// Check that referenced records exist. With `changed`, only the
    /// references being changed are checked.
    fn check_references(
        &self,
        kind: EntityKind,
        fields: &Map<String, Value>,
        changed: Option<&Map<String, Value>>,
    ) -> Result<()> {
        for reference in references(kind) {
            let field = reference.field;
            if changed.is_some_and(|c| !c.contains_key(field)) {
                continue;
            }
            match fields.get(field) {
                None | Some(Value::Null) if !reference.required => {}
                Some(value) if self.get(reference.target, &value_id(value)).is_some() => {}
                _ => {
                    return Err(RemoteError::rejected(
                        "invalid_reference",
                        format!("{field} does not reference an existing {}", reference.target),
                    ))
                }
            }
        }

        if matches!(kind, EntityKind::ContentView | EntityKind::ContentViewFilter)
            && changed.is_none_or(|c| c.contains_key("repository_ids"))
        {
            for repo in id_list(fields, "repository_ids") {
                if self.get(EntityKind::Repository, &repo.to_string()).is_none() {
                    return Err(RemoteError::rejected(
                        "invalid_reference",
                        format!("repository {repo} does not exist"),
                    ));
                }
            }
        }
        Ok(())
    }

    /// A filter's type must be known and its repositories must belong to
    /// its content view.
    fn validate_filter(&self, fields: &Map<String, Value>) -> Result<()> {
        let filter_type = fields.get("type").and_then(Value::as_str).unwrap_or_default();
        if !FILTER_TYPES.contains(&filter_type) {
            return Err(RemoteError::rejected(
                "invalid_filter_type",
                format!("Type '{filter_type}' is not a valid filter type"),
            ));
        }

        let view_id = fields.get("content_view_id").map(value_id).unwrap_or_default();
        let view_repos = self
            .get(EntityKind::ContentView, &view_id)
            .map(|view| id_list(current_object(view), "repository_ids"))
            .unwrap_or_default();
        let foreign: Vec<String> = id_list(fields, "repository_ids")
            .into_iter()
            .filter(|repo| !view_repos.contains(repo))
            .map(|repo| repo.to_string())
            .collect();
        if !foreign.is_empty() {
            return Err(RemoteError::rejected(
                "invalid_repository",
                format!(
                    "Repositories {} do not belong to content view {view_id}",
                    foreign.join(", ")
                ),
            ));
        }
        Ok(())
    }
}

const ORG_REFS: [Reference; 1] = [ORG];
const KEY_REFS: [Reference; 3] = [
    ORG,
    optional("environment_id", EntityKind::LifecycleEnvironment),
    optional("content_view_id", EntityKind::ContentView),
];
const HOST_REFS: [Reference; 3] = [
    ORG,
    optional("lifecycle_environment_id", EntityKind::LifecycleEnvironment),
    optional("content_view_id", EntityKind::ContentView),
];
const REPOSITORY_REFS: [Reference; 1] = [required("product_id", EntityKind::Product)];
const VIEW_CHILD_REFS: [Reference; 1] = [required("content_view_id", EntityKind::ContentView)];

/// Records that `kind` points at.
fn references(kind: EntityKind) -> &'static [Reference] {
    match kind {
        EntityKind::LifecycleEnvironment
        | EntityKind::ContentView
        | EntityKind::Product
        | EntityKind::SyncPlan
        | EntityKind::Subscription => &ORG_REFS,
        EntityKind::ActivationKey => &KEY_REFS,
        EntityKind::Host => &HOST_REFS,
        EntityKind::Repository => &REPOSITORY_REFS,
        EntityKind::ContentViewFilter | EntityKind::ContentViewVersion => &VIEW_CHILD_REFS,
        EntityKind::Organization
        | EntityKind::JobInvocation
        | EntityKind::Setting
        | EntityKind::RegistrationCommand => &[],
    }
}

/// Accept either `{..fields}` or `{"<kind>": {..fields}}`.
fn into_object(kind: EntityKind, body: Value) -> Result<Map<String, Value>> {
    match body {
        Value::Object(mut map) => {
            if map.len() == 1 {
                if let Some(Value::Object(inner)) = map.remove(kind.as_str()) {
                    return Ok(inner);
                }
            }
            Ok(map)
        }
        Value::Null => Ok(Map::new()),
        other => Err(RemoteError::rejected(
            "invalid_body",
            format!("expected an object, got {other}"),
        )),
    }
}

fn current_object(value: &Value) -> &Map<String, Value> {
    static EMPTY: std::sync::OnceLock<Map<String, Value>> = std::sync::OnceLock::new();
    value
        .as_object()
        .unwrap_or_else(|| EMPTY.get_or_init(Map::new))
}

fn has_name(kind: EntityKind) -> bool {
    !matches!(
        kind,
        EntityKind::JobInvocation
            | EntityKind::Setting
            | EntityKind::ContentViewVersion
            | EntityKind::RegistrationCommand
    )
}

/// The field within which names must be unique.
fn scope_of(kind: EntityKind, fields: &Map<String, Value>) -> Option<&Value> {
    match kind {
        EntityKind::Organization => None,
        EntityKind::Repository => fields.get("product_id"),
        EntityKind::ContentViewFilter => fields.get("content_view_id"),
        _ => fields.get("organization_id"),
    }
}

fn validate_name(fields: &Map<String, Value>) -> Result<String> {
    let name = fields.get("name").and_then(Value::as_str).unwrap_or_default();
    if name.trim().is_empty() {
        return Err(RemoteError::rejected("invalid_name", "Name can't be blank"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(RemoteError::rejected(
            "invalid_name",
            format!("Name is too long (maximum is {MAX_NAME_LEN} characters)"),
        ));
    }
    Ok(name.to_string())
}

fn validate_interval(fields: &Map<String, Value>) -> Result<()> {
    let interval = fields.get("interval").and_then(Value::as_str).unwrap_or_default();
    if !INTERVALS.contains(&interval) {
        return Err(RemoteError::rejected(
            "invalid_interval",
            format!("Interval '{interval}' is not included in the list"),
        ));
    }
    let cron = fields
        .get("cron_expression")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if interval == "custom cron" && cron.trim().is_empty() {
        return Err(RemoteError::rejected(
            "invalid_cron",
            "Cron expression is not valid",
        ));
    }
    Ok(())
}

/// Numeric ids in an array field; non-numeric entries are kept as zero so
/// they fail reference checks.
fn id_list(fields: &Map<String, Value>, field: &str) -> Vec<u64> {
    fields
        .get(field)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().map(|v| v.as_u64().unwrap_or(0)).collect())
        .unwrap_or_default()
}

/// Path identifier of a record: `name` for settings, `id` otherwise.
pub(crate) fn record_id(kind: EntityKind, record: &Value) -> String {
    let key = if kind == EntityKind::Setting { "name" } else { "id" };
    record.get(key).map(value_id).unwrap_or_default()
}

fn value_id(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
