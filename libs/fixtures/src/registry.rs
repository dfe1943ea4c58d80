//! Fixture definitions.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

use crate::error::FixtureError;
use crate::handle::{Created, ResourceHandle};
use crate::params::Params;
use crate::scope::Scope;

/// Future returned by a factory.
pub type FactoryFuture = BoxFuture<'static, anyhow::Result<Created>>;

/// Creates a resource from its resolved dependencies and parameters.
pub type Factory = Arc<dyn Fn(FixtureRequest) -> FactoryFuture + Send + Sync>;

/// A reference to a fixture, with the parameters it is requested with.
#[derive(Debug, Clone, PartialEq)]
pub struct FixtureRef {
    pub name: String,
    pub params: Params,
}

impl FixtureRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: Params::none(),
        }
    }

    pub fn with_params(name: impl Into<String>, params: impl Into<Params>) -> Self {
        Self {
            name: name.into(),
            params: params.into(),
        }
    }
}

impl From<&str> for FixtureRef {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// Input to a factory call.
pub struct FixtureRequest {
    fixture: String,
    params: Params,
    deps: Vec<Arc<ResourceHandle>>,
}

impl FixtureRequest {
    pub(crate) fn new(fixture: &str, params: Params, deps: Vec<Arc<ResourceHandle>>) -> Self {
        Self {
            fixture: fixture.to_string(),
            params,
            deps,
        }
    }

    /// Name of the fixture being created.
    pub fn fixture(&self) -> &str {
        &self.fixture
    }

    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Resolved dependencies, in declaration order.
    pub fn deps(&self) -> &[Arc<ResourceHandle>] {
        &self.deps
    }

    /// The dependency created by fixture `name`.
    pub fn dep(&self, name: &str) -> Result<&Arc<ResourceHandle>, FixtureError> {
        self.deps
            .iter()
            .find(|h| h.fixture() == name)
            .ok_or_else(|| FixtureError::NotResolved(name.to_string()))
    }

    /// Typed record of the dependency created by fixture `name`.
    pub fn dep_value<T: std::any::Any>(&self, name: &str) -> Result<&T, FixtureError> {
        self.dep(name)?.try_value::<T>()
    }
}

/// A named fixture: scope, declared requirements and factory.
#[derive(Clone)]
pub struct FixtureDef {
    name: String,
    scope: Scope,
    requires: Vec<FixtureRef>,
    factory: Factory,
}

impl FixtureDef {
    pub fn new<F, Fut>(name: impl Into<String>, scope: Scope, factory: F) -> Self
    where
        F: Fn(FixtureRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<Created>> + Send + 'static,
    {
        Self {
            name: name.into(),
            scope,
            requires: Vec::new(),
            factory: Arc::new(move |req| Box::pin(factory(req))),
        }
    }

    /// Declare a requirement. Requirements resolve in declaration order.
    pub fn requires(mut self, dependency: impl Into<FixtureRef>) -> Self {
        self.requires.push(dependency.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn dependencies(&self) -> &[FixtureRef] {
        &self.requires
    }

    pub(crate) fn factory(&self) -> &Factory {
        &self.factory
    }
}

impl std::fmt::Debug for FixtureDef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FixtureDef")
            .field("name", &self.name)
            .field("scope", &self.scope)
            .field("requires", &self.requires)
            .finish()
    }
}

/// All known fixtures, by name.
#[derive(Debug, Clone, Default)]
pub struct FixtureRegistry {
    defs: BTreeMap<String, FixtureDef>,
}

impl FixtureRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, def: FixtureDef) -> Result<(), FixtureError> {
        if self.defs.contains_key(def.name()) {
            return Err(FixtureError::DuplicateFixture(def.name().to_string()));
        }
        self.defs.insert(def.name().to_string(), def);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&FixtureDef> {
        self.defs.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.defs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}
