//! HTTP implementation of the entity and task interfaces.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::api::{EntityApi, TaskApi};
use crate::error::{RemoteError, Result};
use crate::records::{EntityKind, PingReport, Task, TaskState};

const TASKS_ENDPOINT: &str = "/foreman_tasks/api/tasks";
const PING_ENDPOINT: &str = "/katello/api/ping";
const SEARCH_PAGE_SIZE: &str = "1000";

/// Connection details for [`HttpRemote`].
#[derive(Debug, Clone)]
pub struct HttpRemoteConfig {
    /// Server root, e.g. `https://satellite.example.com`.
    pub base_url: String,
    pub username: String,
    pub password: String,
    pub verify_ssl: bool,
}

/// JSON API client using HTTP basic auth.
#[derive(Debug, Clone)]
pub struct HttpRemote {
    client: reqwest::Client,
    base_url: String,
    username: String,
    password: String,
}

impl HttpRemote {
    pub fn new(config: &HttpRemoteConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Build a URL for a path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        self.client
            .request(method, self.url(path))
            .basic_auth(&self.username, Some(&self.password))
    }

    async fn send<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        subject: Option<Subject<'_>>,
        body: Option<&Value>,
        query: &[(&str, &str)],
    ) -> Result<T> {
        debug!(method = %method, path = %path, "Remote request");

        let mut request = self.request(method, path);
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;

        self.handle_response(subject, response).await
    }

    /// Decode a success body or map an error status.
    async fn handle_response<T: DeserializeOwned>(
        &self,
        subject: Option<Subject<'_>>,
        response: reqwest::Response,
    ) -> Result<T> {
        if response.status().is_success() {
            let bytes = response.bytes().await?;
            Ok(serde_json::from_slice(&bytes)?)
        } else {
            self.handle_error(subject, response).await
        }
    }

    /// Map an error status. A 404 on a member path names the missing
    /// record; on a collection it stays an API error carrying the message.
    async fn handle_error<T>(
        &self,
        subject: Option<Subject<'_>>,
        response: reqwest::Response,
    ) -> Result<T> {
        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);
        let message = error_message(&body);

        match (status, subject) {
            (StatusCode::NOT_FOUND, Some(Subject { kind, id })) => {
                Err(RemoteError::not_found(kind, id))
            }
            (StatusCode::UNPROCESSABLE_ENTITY, _) => {
                Err(RemoteError::rejected(rejection_reason(&message), message))
            }
            _ => Err(RemoteError::api(
                status.as_u16(),
                error_code(&body, status),
                message,
            )),
        }
    }

    fn member_path(kind: EntityKind, id: &str) -> String {
        format!("{}/{}", kind.endpoint(), id)
    }
}

#[async_trait]
impl EntityApi for HttpRemote {
    async fn create(&self, kind: EntityKind, body: Value) -> Result<Value> {
        self.send(Method::POST, kind.endpoint(), None, Some(&body), &[])
            .await
    }

    async fn read(&self, kind: EntityKind, id: &str) -> Result<Value> {
        let subject = Subject::new(kind.as_str(), id);
        self.send(Method::GET, &Self::member_path(kind, id), subject, None, &[])
            .await
    }

    async fn update(&self, kind: EntityKind, id: &str, body: Value) -> Result<Value> {
        let path = Self::member_path(kind, id);
        let subject = Subject::new(kind.as_str(), id);
        self.send(Method::PUT, &path, subject, Some(&body), &[])
            .await
    }

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()> {
        let path = Self::member_path(kind, id);
        debug!(method = "DELETE", path = %path, "Remote request");

        let response = self.request(Method::DELETE, &path).send().await?;
        if response.status().is_success() {
            Ok(())
        } else {
            self.handle_error(Subject::new(kind.as_str(), id), response)
                .await
        }
    }

    async fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<Value>> {
        let page: SearchPage<Value> = self
            .send(
                Method::GET,
                kind.endpoint(),
                None,
                None,
                &[("search", query), ("per_page", SEARCH_PAGE_SIZE)],
            )
            .await?;
        Ok(page.results)
    }

    async fn action(&self, kind: EntityKind, id: &str, action: &str, body: Value) -> Result<Value> {
        let path = format!("{}/{}", Self::member_path(kind, id), action);
        let subject = Subject::new(kind.as_str(), id);
        self.send(Method::POST, &path, subject, Some(&body), &[])
            .await
    }
}

#[async_trait]
impl TaskApi for HttpRemote {
    async fn task(&self, id: &str) -> Result<Task> {
        let raw: RawTask = self
            .send(
                Method::GET,
                &format!("{TASKS_ENDPOINT}/{id}"),
                Subject::new("task", id),
                None,
                &[],
            )
            .await?;
        Ok(raw.into())
    }

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>> {
        let page: SearchPage<RawTask> = self
            .send(
                Method::GET,
                TASKS_ENDPOINT,
                None,
                None,
                &[("search", query), ("per_page", SEARCH_PAGE_SIZE)],
            )
            .await?;
        Ok(page.results.into_iter().map(Task::from).collect())
    }

    async fn ping(&self) -> Result<PingReport> {
        self.send(Method::GET, PING_ENDPOINT, None, None, &[]).await
    }
}

/// The record a member request addresses.
#[derive(Debug, Clone, Copy)]
struct Subject<'a> {
    kind: &'a str,
    id: &'a str,
}

impl<'a> Subject<'a> {
    fn new(kind: &'a str, id: &'a str) -> Option<Self> {
        Some(Self { kind, id })
    }
}

/// Search envelope: `{"total": .., "results": [..]}`.
#[derive(Debug, Deserialize)]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
struct SearchPage<T> {
    #[serde(default)]
    results: Vec<T>,
}

/// Task as reported by the task engine.
#[derive(Debug, Deserialize)]
struct RawTask {
    id: String,
    #[serde(default)]
    label: Option<String>,
    state: String,
    #[serde(default)]
    result: Option<String>,
    #[serde(default)]
    humanized: Value,
    #[serde(default)]
    progress: Option<f64>,
}

impl From<RawTask> for Task {
    fn from(raw: RawTask) -> Self {
        let state = task_state(&raw.state, raw.result.as_deref());
        Task {
            id: raw.id,
            label: raw.label.unwrap_or_default(),
            state,
            humanized: humanized(&raw.humanized),
            progress: raw.progress.unwrap_or_default(),
        }
    }
}

/// Map the engine's (state, result) pair onto [`TaskState`].
///
/// A stopped task succeeded only with result `success`; `warning` and
/// `error` both count as failures, as does a task paused on error.
fn task_state(state: &str, result: Option<&str>) -> TaskState {
    match (state, result) {
        ("stopped", Some("success")) => TaskState::Succeeded,
        ("stopped", _) => TaskState::Failed,
        ("paused", Some("error")) => TaskState::Failed,
        ("running", _) | ("paused", _) => TaskState::Running,
        _ => TaskState::Pending,
    }
}

fn humanized(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Object(map) => {
            let errors: Vec<&str> = map
                .get("errors")
                .and_then(Value::as_array)
                .map(|errs| errs.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            if !errors.is_empty() {
                return errors.join("; ");
            }
            ["output", "action"]
                .iter()
                .find_map(|k| map.get(*k).and_then(Value::as_str))
                .unwrap_or_default()
                .to_string()
        }
        _ => String::new(),
    }
}

fn error_message(body: &Value) -> String {
    let candidates = [
        body.pointer("/error/message"),
        body.pointer("/displayMessage"),
        body.pointer("/error/full_messages/0"),
        body.pointer("/message"),
    ];
    candidates
        .into_iter()
        .flatten()
        .find_map(Value::as_str)
        .unwrap_or("Unknown error")
        .to_string()
}

fn error_code(body: &Value, status: StatusCode) -> String {
    body.pointer("/error/code")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| {
            status
                .canonical_reason()
                .unwrap_or("unknown")
                .to_ascii_lowercase()
                .replace(' ', "_")
        })
}

/// Derive a machine-readable reason from a validation message.
fn rejection_reason(message: &str) -> &'static str {
    let lower = message.to_ascii_lowercase();
    if lower.contains("already been taken") || lower.contains("already exists") {
        "duplicate"
    } else if lower.contains("name")
        && ["can't be blank", "too long", "is invalid"]
            .iter()
            .any(|needle| lower.contains(needle))
    {
        "invalid_name"
    } else {
        "invalid_value"
    }
}
