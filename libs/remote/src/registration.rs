//! Global registration.

use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use crate::api::EntityApi;
use crate::error::{RemoteError, Result};
use crate::records::EntityKind;

/// Options for generating a host registration command.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RegistrationRequest {
    pub organization_id: u64,
    pub activation_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_id: Option<u64>,
    pub insecure: bool,
    /// Re-register a host that is already registered.
    pub force: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repo_gpg_key_url: Option<String>,
}

impl RegistrationRequest {
    pub fn new(organization_id: u64, activation_key: impl Into<String>) -> Self {
        Self {
            organization_id,
            activation_keys: vec![activation_key.into()],
            insecure: true,
            ..Self::default()
        }
    }

    pub fn force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Add a repository (and its GPG key) to configure during registration.
    pub fn with_repo(mut self, repo: impl Into<String>, gpg_key_url: impl Into<String>) -> Self {
        self.repo = Some(repo.into());
        self.repo_gpg_key_url = Some(gpg_key_url.into());
        self
    }
}

/// Ask the server for a shell command that registers a host.
pub async fn generate_registration_command<A>(
    api: &A,
    request: &RegistrationRequest,
) -> Result<String>
where
    A: EntityApi + ?Sized,
{
    let body = json!({ "registration_command": request });
    let response = api.create(EntityKind::RegistrationCommand, body).await?;
    let command = response
        .get("registration_command")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            RemoteError::api(
                200,
                "missing_field",
                "response carries no registration_command",
            )
        })?
        .to_string();

    info!(
        organization_id = request.organization_id,
        force = request.force,
        "Generated registration command"
    );
    Ok(command)
}
