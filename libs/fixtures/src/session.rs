//! A resolver and scope cache bundled for one test process.

use std::sync::Arc;

use satrig_id::{RunId, ScopeInstanceId};
use tracing::info;

use crate::cache::ScopeCache;
use crate::error::FixtureError;
use crate::handle::ResourceHandle;
use crate::registry::{FixtureRef, FixtureRegistry};
use crate::resolver::{Resolved, Resolver};
use crate::scope::Scope;
use crate::teardown::TeardownReport;

/// Process-wide fixture state, passed by reference to each test.
///
/// Created at process start with the process scope active; [`shutdown`]
/// tears everything down at process end.
///
/// [`shutdown`]: FixtureSession::shutdown
#[derive(Debug)]
pub struct FixtureSession {
    run: RunId,
    resolver: Resolver,
    cache: ScopeCache,
}

impl FixtureSession {
    pub fn new(registry: FixtureRegistry) -> Self {
        let run = RunId::new();
        info!(run = %run, fixtures = registry.len(), "Starting fixture session");
        Self {
            run,
            resolver: Resolver::new(registry),
            cache: ScopeCache::new(),
        }
    }

    pub fn run_id(&self) -> RunId {
        self.run
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn cache(&self) -> &ScopeCache {
        &self.cache
    }

    pub fn enter(&mut self, scope: Scope) -> Result<ScopeInstanceId, FixtureError> {
        self.cache.enter(scope)
    }

    /// Exit `scope` and report teardown failures as one error.
    pub async fn exit(&mut self, scope: Scope) -> Result<TeardownReport, FixtureError> {
        self.cache.exit(scope).await.into_result()
    }

    /// Resolve fixtures for a consumer.
    pub async fn request(&mut self, requests: &[FixtureRef]) -> Result<Resolved, FixtureError> {
        self.resolver.resolve(&mut self.cache, requests).await
    }

    /// Resolve a single fixture by name.
    pub async fn request_one(&mut self, name: &str) -> Result<Arc<ResourceHandle>, FixtureError> {
        let resolved = self.request(&[FixtureRef::new(name)]).await?;
        resolved.get(name).cloned()
    }

    /// Tear down every scope, including the process scope.
    pub async fn shutdown(mut self) -> Result<TeardownReport, FixtureError> {
        let report = self.cache.shutdown().await;
        info!(
            run = %self.run,
            torn_down = report.torn_down().len(),
            failures = report.failures().len(),
            "Fixture session finished"
        );
        report.into_result()
    }
}
