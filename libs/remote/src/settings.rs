//! Global setting helpers.

use serde_json::{json, Value};
use tracing::info;

use crate::api::{EntityApi, EntityApiExt};
use crate::error::Result;
use crate::records::Setting;

/// Set `name` to `value` and return the previous value.
pub async fn update_setting<A>(api: &A, name: &str, value: Value) -> Result<Value>
where
    A: EntityApi + ?Sized,
{
    let current: Setting = api.read_as(name).await?;
    if current.value == value {
        return Ok(current.value);
    }

    let updated: Setting = api
        .update_as(name, json!({ "setting": { "value": value } }))
        .await?;
    info!(setting = %name, old = %current.value, new = %updated.value, "Updated setting");
    Ok(current.value)
}
