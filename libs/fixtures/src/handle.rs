//! Handles to remotely created resources.

use std::any::Any;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use futures_util::future::BoxFuture;
use satrig_id::{HandleId, ScopeInstanceId};

use crate::error::FixtureError;
use crate::params::Params;
use crate::scope::Scope;

/// Future returned by a teardown action.
pub type TeardownFuture = BoxFuture<'static, anyhow::Result<()>>;

/// Deferred teardown action. Runs at most once.
pub type TeardownFn = Box<dyn FnOnce() -> TeardownFuture + Send>;

/// What a factory hands back to the cache.
pub struct Created {
    remote_id: String,
    value: Arc<dyn Any + Send + Sync>,
    teardown: Option<TeardownFn>,
}

impl Created {
    /// Wrap a typed record identified by `remote_id`.
    pub fn new<T>(remote_id: impl Into<String>, value: T) -> Self
    where
        T: Any + Send + Sync,
    {
        Self {
            remote_id: remote_id.into(),
            value: Arc::new(value),
            teardown: None,
        }
    }

    /// Attach the action that removes the resource when its scope ends.
    pub fn with_teardown<F, Fut>(mut self, teardown: F) -> Self
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        self.teardown = Some(Box::new(move || Box::pin(teardown())));
        self
    }

    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }
}

impl std::fmt::Debug for Created {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Created")
            .field("remote_id", &self.remote_id)
            .field("has_teardown", &self.teardown.is_some())
            .finish()
    }
}

/// A resource created by a fixture and owned by one scope instance.
///
/// Consumers share it through `Arc` and only read it; the scope cache is the
/// only caller of [`ResourceHandle::teardown`].
pub struct ResourceHandle {
    id: HandleId,
    fixture: String,
    scope: Scope,
    instance: ScopeInstanceId,
    remote_id: String,
    params: Params,
    value: Arc<dyn Any + Send + Sync>,
    teardown: Mutex<Option<TeardownFn>>,
    torn_down: AtomicBool,
}

impl ResourceHandle {
    pub(crate) fn new(
        fixture: &str,
        scope: Scope,
        instance: ScopeInstanceId,
        params: Params,
        created: Created,
    ) -> Self {
        Self {
            id: HandleId::new(),
            fixture: fixture.to_string(),
            scope,
            instance,
            remote_id: created.remote_id,
            params,
            value: created.value,
            teardown: Mutex::new(created.teardown),
            torn_down: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> HandleId {
        self.id
    }

    /// Name of the fixture that created this handle.
    pub fn fixture(&self) -> &str {
        &self.fixture
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    /// Scope instance that owns this handle.
    pub fn instance(&self) -> ScopeInstanceId {
        self.instance
    }

    /// Identifier assigned by the remote system.
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// The typed record, if it is a `T`.
    pub fn value<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    /// The typed record, or a `TypeMismatch` error.
    pub fn try_value<T: Any>(&self) -> Result<&T, FixtureError> {
        self.value::<T>().ok_or_else(|| FixtureError::TypeMismatch {
            fixture: self.fixture.clone(),
            expected: std::any::type_name::<T>(),
        })
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Run the teardown action.
    ///
    /// Returns `Ok(false)` when there was nothing left to run: the handle had
    /// no action, or it already ran.
    pub(crate) async fn teardown(&self) -> anyhow::Result<bool> {
        self.torn_down.store(true, Ordering::SeqCst);

        let action = {
            let mut slot = match self.teardown.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            slot.take()
        };

        match action {
            Some(action) => action().await.map(|()| true),
            None => Ok(false),
        }
    }
}

impl std::fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("fixture", &self.fixture)
            .field("scope", &self.scope)
            .field("instance", &self.instance)
            .field("remote_id", &self.remote_id)
            .field("params", &self.params)
            .field("torn_down", &self.is_torn_down())
            .finish()
    }
}
