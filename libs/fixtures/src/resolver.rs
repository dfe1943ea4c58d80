//! Resolves requested fixtures against the scope cache.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::cache::{CacheKey, ScopeCache};
use crate::error::FixtureError;
use crate::graph::{plan, CreationPlan};
use crate::handle::ResourceHandle;
use crate::params::Params;
use crate::registry::{FixtureRef, FixtureRegistry};

/// Executes creation plans.
#[derive(Debug, Clone)]
pub struct Resolver {
    registry: Arc<FixtureRegistry>,
}

impl Resolver {
    pub fn new(registry: FixtureRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
        }
    }

    pub fn registry(&self) -> &FixtureRegistry {
        &self.registry
    }

    /// Plan without creating anything.
    pub fn plan(&self, requests: &[FixtureRef]) -> Result<CreationPlan, FixtureError> {
        plan(&self.registry, requests)
    }

    /// Resolve `requests`, creating whatever the cache does not hold yet.
    ///
    /// The whole plan is validated first; a cycle or unknown fixture fails
    /// before any factory runs. A creation failure aborts the rest of the plan.
    pub async fn resolve(
        &self,
        cache: &mut ScopeCache,
        requests: &[FixtureRef],
    ) -> Result<Resolved, FixtureError> {
        let plan = self.plan(requests)?;
        debug!(order = ?plan.order(), "Resolving fixtures");

        let mut resolved: HashMap<CacheKey, Arc<ResourceHandle>> = HashMap::new();
        for step in plan.steps() {
            let def = self
                .registry
                .get(step.fixture())
                .ok_or_else(|| FixtureError::UnknownFixture {
                    name: step.fixture().to_string(),
                    required_by: "request".to_string(),
                })?;

            let deps = step
                .deps
                .iter()
                .map(|k| {
                    resolved
                        .get(k)
                        .cloned()
                        .ok_or_else(|| FixtureError::NotResolved(k.fixture.clone()))
                })
                .collect::<Result<Vec<_>, _>>()?;

            let handle = cache
                .get_or_create(&step.key, def, &step.params, deps)
                .await?;
            resolved.insert(step.key.clone(), handle);
        }

        let mut roots = Vec::with_capacity(plan.roots().len());
        for (request, key) in plan.roots() {
            let handle = resolved
                .get(key)
                .cloned()
                .ok_or_else(|| FixtureError::NotResolved(key.fixture.clone()))?;
            roots.push((request.clone(), handle));
        }

        Ok(Resolved { roots })
    }
}

/// Handles for the requested fixtures, in request order.
#[derive(Debug, Clone, Default)]
pub struct Resolved {
    roots: Vec<(FixtureRef, Arc<ResourceHandle>)>,
}

impl Resolved {
    /// Handle for the first request of fixture `name`.
    pub fn get(&self, name: &str) -> Result<&Arc<ResourceHandle>, FixtureError> {
        self.roots
            .iter()
            .find(|(r, _)| r.name == name)
            .map(|(_, h)| h)
            .ok_or_else(|| FixtureError::NotResolved(name.to_string()))
    }

    /// Handle for fixture `name` requested with exactly `params`.
    pub fn get_with(
        &self,
        name: &str,
        params: &Params,
    ) -> Result<&Arc<ResourceHandle>, FixtureError> {
        let hash = params.hash();
        self.roots
            .iter()
            .find(|(r, _)| r.name == name && r.params.hash() == hash)
            .map(|(_, h)| h)
            .ok_or_else(|| FixtureError::NotResolved(name.to_string()))
    }

    /// Typed record of fixture `name`.
    pub fn value<T: std::any::Any>(&self, name: &str) -> Result<&T, FixtureError> {
        self.get(name)?.try_value::<T>()
    }

    pub fn handles(&self) -> impl Iterator<Item = &Arc<ResourceHandle>> {
        self.roots.iter().map(|(_, h)| h)
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
