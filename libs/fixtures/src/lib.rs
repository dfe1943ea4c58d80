//! # satrig-fixtures
//!
//! Scoped lifecycle management for resources created on a remote system.
//!
//! - **Registry**: fixture definitions with declared requirements.
//! - **Graph**: a pure planning pass that orders creation depth-first and
//!   rejects cycles, unknown names and scope mismatches before any factory
//!   runs.
//! - **Scope cache**: one handle per (fixture, scope, params) key within an
//!   active scope instance, torn down in reverse creation order when the
//!   scope exits.
//! - **Session**: resolver and cache bundled for test code.
//!
//! ## Invariants
//!
//! - A factory runs at most once per key per scope instance
//! - Dependencies are created before their dependents
//! - Teardown order is the exact reverse of creation order within a scope
//! - A teardown failure never stops sibling teardowns

mod cache;
mod error;
mod graph;
mod handle;
mod params;
mod registry;
mod resolver;
mod scope;
mod session;
mod teardown;

pub use cache::{CacheKey, ScopeCache};
pub use error::FixtureError;
pub use graph::{plan, CreationPlan, PlanStep};
pub use handle::{Created, ResourceHandle, TeardownFn, TeardownFuture};
pub use params::{Params, ParamsHash};
pub use registry::{Factory, FactoryFuture, FixtureDef, FixtureRef, FixtureRegistry, FixtureRequest};
pub use resolver::{Resolved, Resolver};
pub use scope::Scope;
pub use session::FixtureSession;
pub use teardown::{TeardownFailure, TeardownReport};
