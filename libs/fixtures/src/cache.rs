//! Scope cache: one handle per key per active scope instance.

use std::collections::HashMap;
use std::sync::Arc;

use satrig_id::ScopeInstanceId;
use tracing::{debug, info, warn};

use crate::error::FixtureError;
use crate::handle::ResourceHandle;
use crate::params::{Params, ParamsHash};
use crate::registry::{FixtureDef, FixtureRequest};
use crate::scope::Scope;
use crate::teardown::{TeardownFailure, TeardownReport};

/// Identity of a cached resource inside a scope instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CacheKey {
    pub fixture: String,
    pub scope: Scope,
    pub params: ParamsHash,
}

impl CacheKey {
    pub fn new(fixture: impl Into<String>, scope: Scope, params: &Params) -> Self {
        Self {
            fixture: fixture.into(),
            scope,
            params: params.hash(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}[{}]", self.fixture, self.scope, self.params)
    }
}

/// One active scope instance.
struct ScopeFrame {
    scope: Scope,
    instance: ScopeInstanceId,
    entries: HashMap<CacheKey, Arc<ResourceHandle>>,
    /// Creation order; teardown pops from the end.
    stack: Vec<Arc<ResourceHandle>>,
}

impl ScopeFrame {
    fn new(scope: Scope) -> Self {
        Self {
            scope,
            instance: ScopeInstanceId::new(),
            entries: HashMap::new(),
            stack: Vec::new(),
        }
    }

    async fn teardown(mut self) -> TeardownReport {
        let mut report = TeardownReport::new();

        while let Some(handle) = self.stack.pop() {
            match handle.teardown().await {
                Ok(true) => {
                    debug!(
                        fixture = %handle.fixture(),
                        scope = %self.scope,
                        remote_id = %handle.remote_id(),
                        "Tore down fixture"
                    );
                    report.record_success(handle.fixture());
                }
                Ok(false) => {}
                Err(e) => {
                    warn!(
                        fixture = %handle.fixture(),
                        scope = %self.scope,
                        remote_id = %handle.remote_id(),
                        error = %format!("{e:#}"),
                        "Teardown failed"
                    );
                    report.record_failure(TeardownFailure {
                        fixture: handle.fixture().to_string(),
                        scope: self.scope,
                        remote_id: handle.remote_id().to_string(),
                        message: format!("{e:#}"),
                    });
                }
            }
        }

        self.entries.clear();
        report
    }
}

/// Memoizes resource handles per scope instance and owns their teardown.
///
/// The process scope is entered on construction. Other scopes are entered
/// and exited explicitly; exiting a scope first exits every narrower one.
pub struct ScopeCache {
    /// Active frames, widest first.
    frames: Vec<ScopeFrame>,
}

impl ScopeCache {
    pub fn new() -> Self {
        Self {
            frames: vec![ScopeFrame::new(Scope::Process)],
        }
    }

    /// Start a new instance of `scope`.
    pub fn enter(&mut self, scope: Scope) -> Result<ScopeInstanceId, FixtureError> {
        if self.is_active(scope) {
            return Err(FixtureError::ScopeAlreadyActive(scope));
        }

        let frame = ScopeFrame::new(scope);
        let instance = frame.instance;
        let pos = self
            .frames
            .iter()
            .position(|f| f.scope > scope)
            .unwrap_or(self.frames.len());
        self.frames.insert(pos, frame);

        debug!(scope = %scope, instance = %instance, "Entered scope");
        Ok(instance)
    }

    /// End the active instance of `scope`, narrower scopes first.
    ///
    /// Handles are torn down in reverse creation order. Failures are logged
    /// and collected; every remaining teardown still runs.
    pub async fn exit(&mut self, scope: Scope) -> TeardownReport {
        let mut report = TeardownReport::new();

        for narrower in scope.narrower() {
            if let Some(frame) = self.take_frame(narrower) {
                report.merge(frame.teardown().await);
            }
        }

        if let Some(frame) = self.take_frame(scope) {
            let instance = frame.instance;
            report.merge(frame.teardown().await);
            debug!(
                scope = %scope,
                instance = %instance,
                torn_down = report.torn_down().len(),
                failures = report.failures().len(),
                "Exited scope"
            );
        }

        report
    }

    /// Exit every scope, including the process scope.
    pub async fn shutdown(&mut self) -> TeardownReport {
        let report = self.exit(Scope::Process).await;
        if !report.is_clean() {
            warn!(
                failures = report.failures().len(),
                summary = %report.summary(),
                "Shutdown finished with teardown failures"
            );
        }
        report
    }

    pub fn is_active(&self, scope: Scope) -> bool {
        self.frames.iter().any(|f| f.scope == scope)
    }

    /// Instance id of the active `scope`, if any.
    pub fn instance(&self, scope: Scope) -> Option<ScopeInstanceId> {
        self.frame(scope).map(|f| f.instance)
    }

    /// Cached handle for `key` in its active scope instance.
    pub fn get(&self, key: &CacheKey) -> Option<Arc<ResourceHandle>> {
        self.frame(key.scope)
            .and_then(|f| f.entries.get(key))
            .cloned()
    }

    /// Number of live handles across all active scopes.
    pub fn len(&self) -> usize {
        self.frames.iter().map(|f| f.stack.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached handle for `key`, or create it with `def`.
    ///
    /// A failed factory caches nothing, so the next call retries.
    pub async fn get_or_create(
        &mut self,
        key: &CacheKey,
        def: &FixtureDef,
        params: &Params,
        deps: Vec<Arc<ResourceHandle>>,
    ) -> Result<Arc<ResourceHandle>, FixtureError> {
        let frame = self
            .frame_mut(key.scope)
            .ok_or_else(|| FixtureError::ScopeNotActive {
                fixture: key.fixture.clone(),
                scope: key.scope,
            })?;

        if let Some(handle) = frame.entries.get(key) {
            debug!(fixture = %key.fixture, scope = %key.scope, "Reusing cached fixture");
            return Ok(Arc::clone(handle));
        }

        let instance = frame.instance;
        let request = FixtureRequest::new(&key.fixture, params.clone(), deps);

        let created = (def.factory())(request)
            .await
            .map_err(|source| FixtureError::Creation {
                fixture: key.fixture.clone(),
                source,
            })?;

        let handle = Arc::new(ResourceHandle::new(
            &key.fixture,
            key.scope,
            instance,
            params.clone(),
            created,
        ));

        info!(
            fixture = %key.fixture,
            scope = %key.scope,
            remote_id = %handle.remote_id(),
            params = %key.params,
            "Created fixture"
        );

        let frame = self
            .frame_mut(key.scope)
            .ok_or_else(|| FixtureError::ScopeNotActive {
                fixture: key.fixture.clone(),
                scope: key.scope,
            })?;
        frame.entries.insert(key.clone(), Arc::clone(&handle));
        frame.stack.push(Arc::clone(&handle));

        Ok(handle)
    }

    fn frame(&self, scope: Scope) -> Option<&ScopeFrame> {
        self.frames.iter().find(|f| f.scope == scope)
    }

    fn frame_mut(&mut self, scope: Scope) -> Option<&mut ScopeFrame> {
        self.frames.iter_mut().find(|f| f.scope == scope)
    }

    fn take_frame(&mut self, scope: Scope) -> Option<ScopeFrame> {
        let pos = self.frames.iter().position(|f| f.scope == scope)?;
        Some(self.frames.remove(pos))
    }
}

impl Default for ScopeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for ScopeCache {
    fn drop(&mut self) {
        let live: Vec<String> = self
            .frames
            .iter()
            .flat_map(|f| f.stack.iter())
            .filter(|h| !h.is_torn_down())
            .map(|h| format!("{}@{}", h.fixture(), h.scope()))
            .collect();

        if !live.is_empty() {
            warn!(
                count = live.len(),
                fixtures = %live.join(", "),
                "Scope cache dropped without shutdown; resources were not torn down"
            );
        }
    }
}

impl std::fmt::Debug for ScopeCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopeCache")
            .field(
                "active",
                &self.frames.iter().map(|f| f.scope).collect::<Vec<_>>(),
            )
            .field("handles", &self.len())
            .finish()
    }
}
