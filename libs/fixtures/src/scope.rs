//! Fixture scopes.

use serde::{Deserialize, Serialize};

/// Lifetime boundary over which a cached resource is shared.
///
/// Variants are declared from widest to narrowest, so `a <= b` means `a`
/// lives at least as long as `b`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Process,
    Session,
    Module,
    Class,
    Function,
}

impl Scope {
    /// Every scope, widest first.
    pub const ALL: [Scope; 5] = [
        Scope::Process,
        Scope::Session,
        Scope::Module,
        Scope::Class,
        Scope::Function,
    ];

    /// Returns true if a fixture in `self` may depend on one in `other`.
    pub fn may_depend_on(self, other: Scope) -> bool {
        other <= self
    }

    /// Scopes strictly narrower than `self`, narrowest first.
    pub fn narrower(self) -> impl Iterator<Item = Scope> {
        Self::ALL.into_iter().rev().filter(move |s| *s > self)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::Process => "process",
            Scope::Session => "session",
            Scope::Module => "module",
            Scope::Class => "class",
            Scope::Function => "function",
        }
    }
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
