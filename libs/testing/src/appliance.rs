//! Simulated shells of the server and of one content host.
//!
//! Covers the commands the suite drives outside the API: global
//! registration (`curl .. | bash`), manifest upload and removal through
//! `hammer`, `satellite-maintain` services and backups, and
//! `satellite-clone`. Registration state lives in the store as a host
//! record, so deleting the host through the API unregisters it.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use satrig_remote::{CommandResult, EntityKind, RemoteError, Result, SYNC_DATE_FMT};
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::store::{record_id, Store};

/// Hostname of the simulated server.
pub const SERVER_FQDN: &str = "satellite.example.com";
/// Hostname of the simulated content host.
pub const CLIENT_HOSTNAME: &str = "client.example.com";

const OWNER: &str = "Admin User";
const MANIFEST_POOLS: [(&str, i64); 3] = [
    (
        "Red Hat Enterprise Linux Server, Standard (Physical or Virtual Nodes)",
        10,
    ),
    ("Red Hat Satellite Infrastructure Subscription", 5),
    ("Red Hat Ansible Automation Platform, Standard", 100),
];
const CLONE_TASKS: [&str; 5] = [
    "satellite-clone : Check that the backup directory exists",
    "satellite-clone : Stop services",
    "satellite-clone : Restore configuration files",
    "satellite-clone : Restore databases",
    "satellite-clone : Run installer",
];

#[derive(Debug)]
pub(crate) struct Appliance {
    /// Manifest file to the organization that imported it.
    manifests: HashMap<String, u64>,
    consumers: u64,
    services_running: bool,
    packages: BTreeSet<String>,
    client_repos: Vec<String>,
}

impl Default for Appliance {
    fn default() -> Self {
        Self {
            manifests: HashMap::new(),
            consumers: 0,
            services_running: true,
            packages: BTreeSet::new(),
            client_repos: Vec::new(),
        }
    }
}

impl Appliance {
    /// Answer a registration command request.
    pub fn registration_command(&self, store: &Store, body: Value) -> Result<Value> {
        let request = body.get("registration_command").cloned().unwrap_or(body);

        let keys: Vec<&str> = request
            .get("activation_keys")
            .and_then(Value::as_array)
            .map(|keys| keys.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        if keys.is_empty() {
            return Err(RemoteError::rejected(
                "missing_activation_key",
                "Missing activation key!",
            ));
        }

        let org = request.get("organization_id").cloned().unwrap_or(Value::Null);
        let org_id = org.as_u64().unwrap_or_default();
        if store.get(EntityKind::Organization, &org_id.to_string()).is_none() {
            return Err(RemoteError::rejected(
                "invalid_reference",
                format!("organization_id does not reference an existing organization: {org}"),
            ));
        }

        let mut params = vec![
            format!("activation_keys={}", keys.join(",")),
            format!("organization_id={org_id}"),
        ];
        if request.get("force").and_then(Value::as_bool) == Some(true) {
            params.push("force=true".to_string());
        }
        for field in ["location_id", "repo", "repo_gpg_key_url"] {
            match request.get(field) {
                Some(Value::String(v)) => params.push(format!("{field}={v}")),
                Some(Value::Number(v)) => params.push(format!("{field}={v}")),
                _ => {}
            }
        }
        let insecure = if request.get("insecure").and_then(Value::as_bool) == Some(true) {
            "--insecure "
        } else {
            ""
        };

        let command = format!(
            "set -o pipefail && curl -sS {insecure}'https://{SERVER_FQDN}/register?{}' | bash",
            params.join("&")
        );
        Ok(json!({ "registration_command": command }))
    }

    /// Run a built-in command. `None` means the command is not simulated.
    pub fn run(
        &mut self,
        store: &mut Store,
        command: &str,
        now: DateTime<Utc>,
    ) -> Option<CommandResult> {
        if let Some(params) = registration_params(command) {
            return Some(self.register(store, &params, now));
        }

        let words: Vec<&str> = command.split_whitespace().collect();
        let result = match words.as_slice() {
            ["hammer", "subscription", "upload", args @ ..] => self.upload_manifest(store, args),
            ["hammer", "subscription", "delete-manifest", args @ ..] => {
                self.delete_manifest(store, args)
            }
            ["subscription-manager", "identity"] => identity(store),
            ["satellite-maintain", "service", action] => self.service(action),
            ["satellite-maintain", "backup", kind, args @ ..] => self.backup(kind, args, now),
            ["dnf" | "yum", "install", args @ ..] => {
                self.packages.extend(
                    args.iter()
                        .filter(|a| !a.starts_with('-'))
                        .map(|a| a.to_string()),
                );
                ok("Complete!\n")
            }
            ["dnf" | "yum", "-v", "repolist"] => ok(self
                .client_repos
                .iter()
                .map(|repo| format!("Repo-baseurl       : {repo}\n"))
                .collect::<String>()),
            ["satellite-clone", args @ ..] => self.clone_tasks(args)?,
            _ => return None,
        };
        debug!(command = %command, status = result.status, "[MOCK] Simulated command");
        Some(result)
    }

    fn register(
        &mut self,
        store: &mut Store,
        params: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> CommandResult {
        let org_id = params.get("organization_id").cloned().unwrap_or_default();
        let keys: Vec<&str> = params
            .get("activation_keys")
            .map(|k| k.split(',').collect())
            .unwrap_or_default();
        let force = params.get("force").is_some_and(|f| f == "true");

        let key = store.all(EntityKind::ActivationKey).iter().find(|ak| {
            ak.get("organization_id").map(|o| o.to_string()) == Some(org_id.clone())
                && ak
                    .get("name")
                    .and_then(Value::as_str)
                    .is_some_and(|name| keys.contains(&name))
        });
        let Some(key) = key.cloned() else {
            return fail(1, "None of the activation keys specified exist for this org.\n");
        };

        let mut stdout = String::new();
        if let Some(existing) = registered_host(store) {
            if !force {
                return fail(
                    1,
                    "This system is already registered. Use --force to override\n",
                );
            }
            let id = record_id(EntityKind::Host, &existing);
            if let Err(e) = store.delete(EntityKind::Host, &id) {
                return fail(1, &format!("{e}\n"));
            }
            stdout.push_str(&format!("Unregistering from: {SERVER_FQDN}:443/rhsm\n"));
        }

        self.consumers += 1;
        let uuid = format!(
            "{:08x}-5a7e-4c0d-9e57-{:012x}",
            self.consumers,
            self.consumers * 7919
        );
        let host = json!({
            "name": CLIENT_HOSTNAME,
            "organization_id": key.get("organization_id"),
            "content_view_id": key.get("content_view_id"),
            "lifecycle_environment_id": key.get("environment_id"),
            "subscription_uuid": uuid,
            "owner": OWNER,
        });
        let stamp = now.format(SYNC_DATE_FMT).to_string();
        if let Err(e) = store.create(EntityKind::Host, host, &stamp) {
            return fail(1, &format!("{e}\n"));
        }
        if let Some(repo) = params.get("repo") {
            self.client_repos.push(repo.clone());
        }

        info!(host = CLIENT_HOSTNAME, uuid = %uuid, "[MOCK] Host registered");
        stdout.push_str(&format!(
            "The system has been registered with ID: {uuid}\n\
             The registered system name is: {CLIENT_HOSTNAME}\n"
        ));
        ok(stdout)
    }

    fn upload_manifest(&mut self, store: &mut Store, args: &[&str]) -> CommandResult {
        let Some(file) = option(args, "--file") else {
            return fail(64, "Missing arguments for '--file'.\n");
        };
        let org = option(args, "--organization-id").unwrap_or_default();
        let Some(org_id) = org
            .parse::<u64>()
            .ok()
            .filter(|_| store.get(EntityKind::Organization, org).is_some())
        else {
            return fail(65, &format!("Could not find organization {org}.\n"));
        };

        if self.manifests.get(file).is_some_and(|owner| *owner != org_id) {
            return fail(
                70,
                "Could not upload the manifest:\n  Error: This subscription management \
                 application has already been imported by another owner.\n",
            );
        }

        store.remove_where(EntityKind::Subscription, "organization_id", &json!(org_id));
        for (index, (name, quantity)) in MANIFEST_POOLS.iter().enumerate() {
            let pool = json!({
                "name": name,
                "organization_id": org_id,
                "quantity": quantity,
                "upstream_pool_id": format!("8a85f99{org_id:05}{index:04}"),
            });
            if let Err(e) = store.create(EntityKind::Subscription, pool, "") {
                return fail(1, &format!("{e}\n"));
            }
        }
        self.manifests.insert(file.to_string(), org_id);

        info!(organization = org_id, file = %file, "[MOCK] Manifest imported");
        ok("Manifest is being uploaded.\n")
    }

    fn delete_manifest(&mut self, store: &mut Store, args: &[&str]) -> CommandResult {
        let org = option(args, "--organization-id").unwrap_or_default();
        let Ok(org_id) = org.parse::<u64>() else {
            return fail(65, &format!("Could not find organization {org}.\n"));
        };
        let removed =
            store.remove_where(EntityKind::Subscription, "organization_id", &json!(org_id));
        self.manifests.retain(|_, owner| *owner != org_id);

        info!(organization = org_id, subscriptions = removed, "[MOCK] Manifest deleted");
        ok("Manifest is being deleted.\n")
    }

    fn service(&mut self, action: &str) -> CommandResult {
        match action {
            "start" => self.services_running = true,
            "stop" => self.services_running = false,
            "status" if !self.services_running => return fail(1, "Some services are not running\n"),
            "enable" | "disable" | "status" | "restart" => {}
            other => return fail(1, &format!("Unknown service action '{other}'\n")),
        }
        ok(format!("Running {action} services\n[OK]\n"))
    }

    fn backup(&mut self, kind: &str, args: &[&str], now: DateTime<Utc>) -> CommandResult {
        let Some(dir) = args.iter().rev().find(|a| !a.starts_with('-')) else {
            return fail(1, "ERROR: parameter 'BACKUP_DIR': value not specified\n");
        };
        match kind {
            "online" if !self.services_running => {
                return fail(1, "Online backup requires running services\n");
            }
            "online" | "offline" => {}
            other => return fail(1, &format!("Unknown backup type '{other}'\n")),
        }

        let stamp = now.format("%Y-%m-%d-%H-%M-%S");
        let location = format!("{}/satellite-backup-{stamp}", dir.trim_end_matches('/'));
        let mut stdout = format!("Starting backup: {stamp}\n");
        if args.contains(&"--skip-pulp-content") {
            stdout.push_str("Skipping Pulp content\n");
        }
        stdout.push_str(&format!("Done with backup: {stamp}\n"));
        stdout.push_str(&format!(
            "**** BACKUP Complete, contents can be found in: {location} ****\n"
        ));
        ok(stdout)
    }

    fn clone_tasks(&self, args: &[&str]) -> Option<CommandResult> {
        if !self.packages.contains("satellite-clone") {
            return Some(fail(127, "bash: satellite-clone: command not found\n"));
        }
        if !args.contains(&"--list-tasks") {
            return None;
        }
        let listing: String = CLONE_TASKS.iter().map(|t| format!("      {t}\n")).collect();
        Some(ok(format!("playbook: satellite-clone-playbook.yml\n\n  play #1 (all):\n{listing}")))
    }
}

/// The host record of the content host, if registered.
fn registered_host(store: &Store) -> Option<Value> {
    store
        .all(EntityKind::Host)
        .iter()
        .find(|h| h.get("name").and_then(Value::as_str) == Some(CLIENT_HOSTNAME))
        .cloned()
}

fn identity(store: &Store) -> CommandResult {
    match registered_host(store) {
        Some(host) => {
            let uuid = host
                .get("subscription_uuid")
                .and_then(Value::as_str)
                .unwrap_or_default();
            ok(format!("system identity: {uuid}\nname: {CLIENT_HOSTNAME}\n"))
        }
        None => fail(
            1,
            "This system is not yet registered. Try 'subscription-manager register --help' \
             for more information.\n",
        ),
    }
}

/// Query parameters of a generated registration command.
fn registration_params(command: &str) -> Option<HashMap<String, String>> {
    if !command.trim_end().ends_with("| bash") {
        return None;
    }
    let (_, rest) = command.split_once("/register?")?;
    let (query, _) = rest.split_once('\'')?;
    Some(
        query
            .split('&')
            .filter_map(|pair| pair.split_once('='))
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
    )
}

/// Value following `name` in an argument list.
fn option<'a>(args: &[&'a str], name: &str) -> Option<&'a str> {
    let at = args.iter().position(|a| *a == name)?;
    args.get(at + 1).copied()
}

fn ok(stdout: impl Into<String>) -> CommandResult {
    CommandResult {
        status: 0,
        stdout: stdout.into(),
        stderr: String::new(),
    }
}

fn fail(status: i32, stderr: &str) -> CommandResult {
    CommandResult {
        status,
        stdout: String::new(),
        stderr: stderr.to_string(),
    }
}
