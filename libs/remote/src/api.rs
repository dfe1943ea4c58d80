//! Capability traits for the system under test.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{RemoteError, Result};
use crate::records::{CommandResult, Entity, EntityKind, PingReport, Task};

/// Create, read, update, delete and search entities by kind.
#[async_trait]
pub trait EntityApi: Send + Sync {
    async fn create(&self, kind: EntityKind, body: Value) -> Result<Value>;

    async fn read(&self, kind: EntityKind, id: &str) -> Result<Value>;

    async fn update(&self, kind: EntityKind, id: &str, body: Value) -> Result<Value>;

    async fn delete(&self, kind: EntityKind, id: &str) -> Result<()>;

    /// Search with the remote's query syntax, e.g. `name="Library"`.
    async fn search(&self, kind: EntityKind, query: &str) -> Result<Vec<Value>>;

    /// Invoke a member action such as `sync` on a repository.
    async fn action(&self, kind: EntityKind, id: &str, action: &str, body: Value) -> Result<Value>;
}

/// Asynchronous task status and service health.
#[async_trait]
pub trait TaskApi: Send + Sync {
    async fn task(&self, id: &str) -> Result<Task>;

    async fn search_tasks(&self, query: &str) -> Result<Vec<Task>>;

    async fn ping(&self) -> Result<PingReport>;
}

/// Raw command execution on the target.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn execute(&self, command: &str) -> Result<CommandResult>;
}

/// Typed helpers over [`EntityApi`].
#[async_trait]
pub trait EntityApiExt: EntityApi {
    async fn create_as<T: Entity>(&self, body: Value) -> Result<T> {
        let value = self.create(T::KIND, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn read_as<T: Entity>(&self, id: &str) -> Result<T> {
        let value = self.read(T::KIND, id).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn update_as<T: Entity>(&self, id: &str, body: Value) -> Result<T> {
        let value = self.update(T::KIND, id, body).await?;
        Ok(serde_json::from_value(value)?)
    }

    async fn search_as<T: Entity>(&self, query: &str) -> Result<Vec<T>> {
        self.search(T::KIND, query)
            .await?
            .into_iter()
            .map(|v| serde_json::from_value(v).map_err(RemoteError::from))
            .collect()
    }

    /// Re-read an entity to pick up server-side changes.
    async fn refresh<T: Entity>(&self, entity: &T) -> Result<T> {
        self.read_as::<T>(&entity.remote_id()).await
    }

    /// Delete, treating an absent entity as already deleted.
    ///
    /// Returns false if the entity did not exist.
    async fn delete_if_present(&self, kind: EntityKind, id: &str) -> Result<bool> {
        match self.delete(kind, id).await {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

impl<A: EntityApi + ?Sized> EntityApiExt for A {}
