//! Outcome of tearing down a scope instance.

use crate::error::FixtureError;
use crate::scope::Scope;

/// A teardown action that returned an error.
#[derive(Debug, Clone)]
pub struct TeardownFailure {
    pub fixture: String,
    pub scope: Scope,
    pub remote_id: String,
    pub message: String,
}

impl std::fmt::Display for TeardownFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}, remote id {}): {}",
            self.fixture, self.scope, self.remote_id, self.message
        )
    }
}

/// Aggregated result of one or more scope exits.
///
/// Failures never stop the remaining teardowns; they are collected here.
#[derive(Debug, Clone, Default)]
pub struct TeardownReport {
    torn_down: Vec<String>,
    failures: Vec<TeardownFailure>,
}

impl TeardownReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_success(&mut self, fixture: &str) {
        self.torn_down.push(fixture.to_string());
    }

    pub(crate) fn record_failure(&mut self, failure: TeardownFailure) {
        self.failures.push(failure);
    }

    /// Fold another report into this one, keeping order.
    pub fn merge(&mut self, other: TeardownReport) {
        self.torn_down.extend(other.torn_down);
        self.failures.extend(other.failures);
    }

    /// Fixtures whose teardown succeeded, in the order they ran.
    pub fn torn_down(&self) -> &[String] {
        &self.torn_down
    }

    pub fn failures(&self) -> &[TeardownFailure] {
        &self.failures
    }

    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn summary(&self) -> String {
        self.failures
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// `Ok` if every teardown succeeded.
    pub fn into_result(self) -> Result<Self, FixtureError> {
        if self.is_clean() {
            Ok(self)
        } else {
            Err(FixtureError::Teardown(self))
        }
    }
}
