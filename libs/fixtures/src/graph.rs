//! Dependency planning.
//!
//! Planning is pure: it walks declared requirements depth-first, left to
//! right, and produces the creation order without calling any factory. Cycles,
//! unknown fixtures and scope mismatches are reported here, before any remote
//! call is made.

use std::collections::HashSet;

use crate::cache::CacheKey;
use crate::error::FixtureError;
use crate::params::Params;
use crate::registry::{FixtureRef, FixtureRegistry};
use crate::scope::Scope;

/// One fixture to create, with the keys of its dependencies.
#[derive(Debug, Clone, PartialEq)]
pub struct PlanStep {
    pub key: CacheKey,
    pub params: Params,
    /// Dependency keys in declaration order.
    pub deps: Vec<CacheKey>,
}

impl PlanStep {
    pub fn fixture(&self) -> &str {
        &self.key.fixture
    }

    pub fn scope(&self) -> Scope {
        self.key.scope
    }
}

/// Ordered creation plan: every step comes after its dependencies.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CreationPlan {
    steps: Vec<PlanStep>,
    roots: Vec<(FixtureRef, CacheKey)>,
}

impl CreationPlan {
    pub fn steps(&self) -> &[PlanStep] {
        &self.steps
    }

    /// The requested fixtures and the keys they resolved to.
    pub fn roots(&self) -> &[(FixtureRef, CacheKey)] {
        &self.roots
    }

    /// Fixture names in creation order.
    pub fn order(&self) -> Vec<&str> {
        self.steps.iter().map(PlanStep::fixture).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

/// Build the creation plan for `requests`.
pub fn plan(
    registry: &FixtureRegistry,
    requests: &[FixtureRef],
) -> Result<CreationPlan, FixtureError> {
    let mut planner = Planner {
        registry,
        path: Vec::new(),
        planned: HashSet::new(),
        plan: CreationPlan::default(),
    };

    for request in requests {
        let key = planner.visit(request, None)?;
        planner.plan.roots.push((request.clone(), key));
    }

    Ok(planner.plan)
}

struct Planner<'a> {
    registry: &'a FixtureRegistry,
    /// Fixture names on the current DFS path.
    path: Vec<String>,
    planned: HashSet<CacheKey>,
    plan: CreationPlan,
}

impl Planner<'_> {
    fn visit(
        &mut self,
        fixture: &FixtureRef,
        parent: Option<(&str, Scope)>,
    ) -> Result<CacheKey, FixtureError> {
        if let Some(pos) = self.path.iter().position(|n| *n == fixture.name) {
            let mut cycle = self.path[pos..].to_vec();
            cycle.push(fixture.name.clone());
            return Err(FixtureError::CircularDependency { cycle });
        }

        let registry = self.registry;
        let def = registry
            .get(&fixture.name)
            .ok_or_else(|| FixtureError::UnknownFixture {
                name: fixture.name.clone(),
                required_by: parent
                    .map(|(name, _)| name.to_string())
                    .unwrap_or_else(|| "request".to_string()),
            })?;

        if let Some((parent_name, parent_scope)) = parent {
            if !parent_scope.may_depend_on(def.scope()) {
                return Err(FixtureError::ScopeMismatch {
                    fixture: parent_name.to_string(),
                    scope: parent_scope,
                    dependency: def.name().to_string(),
                    dependency_scope: def.scope(),
                });
            }
        }

        let key = CacheKey::new(def.name(), def.scope(), &fixture.params);
        if self.planned.contains(&key) {
            return Ok(key);
        }

        self.path.push(fixture.name.clone());
        let mut deps = Vec::with_capacity(def.dependencies().len());
        for dep in def.dependencies() {
            deps.push(self.visit(dep, Some((def.name(), def.scope())))?);
        }
        self.path.pop();

        self.planned.insert(key.clone());
        self.plan.steps.push(PlanStep {
            key: key.clone(),
            params: fixture.params.clone(),
            deps,
        });

        Ok(key)
    }
}
