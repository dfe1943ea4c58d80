//! Fixture errors.

use thiserror::Error;

use crate::scope::Scope;
use crate::teardown::TeardownReport;

/// Errors raised while planning, creating or tearing down fixtures.
#[derive(Debug, Error)]
pub enum FixtureError {
    /// The remote system rejected a create call, or the factory failed.
    #[error("failed to create fixture {fixture}: {source:#}")]
    Creation {
        fixture: String,
        #[source]
        source: anyhow::Error,
    },

    /// A fixture depends on itself transitively.
    #[error("circular fixture dependency: {}", .cycle.join(" -> "))]
    CircularDependency { cycle: Vec<String> },

    /// No fixture registered under this name.
    #[error("unknown fixture '{name}' required by {required_by}")]
    UnknownFixture { name: String, required_by: String },

    /// A fixture requires one with a narrower scope.
    #[error("{fixture} ({scope}) cannot depend on {dependency} ({dependency_scope})")]
    ScopeMismatch {
        fixture: String,
        scope: Scope,
        dependency: String,
        dependency_scope: Scope,
    },

    /// The fixture's scope has not been entered.
    #[error("scope {scope} is not active; cannot create {fixture}")]
    ScopeNotActive { fixture: String, scope: Scope },

    /// `enter` was called for a scope that is already active.
    #[error("scope {0} is already active")]
    ScopeAlreadyActive(Scope),

    /// Two definitions share a name.
    #[error("fixture '{0}' is already registered")]
    DuplicateFixture(String),

    /// A handle's value was read as the wrong type.
    #[error("fixture {fixture} does not hold a {expected}")]
    TypeMismatch {
        fixture: String,
        expected: &'static str,
    },

    /// A resolved set was asked for a fixture it does not contain.
    #[error("fixture {0} was not requested")]
    NotResolved(String),

    /// One or more teardowns failed during scope exit.
    #[error("{} teardown(s) failed: {}", .0.failures().len(), .0.summary())]
    Teardown(TeardownReport),
}

impl FixtureError {
    pub fn is_cycle(&self) -> bool {
        matches!(self, Self::CircularDependency { .. })
    }

    pub fn is_creation(&self) -> bool {
        matches!(self, Self::Creation { .. })
    }
}
