//! Typed ID definitions for harness-owned objects.

use crate::define_id;

// =============================================================================
// Fixtures
// =============================================================================

define_id!(HandleId, "hdl");
define_id!(ScopeInstanceId, "scope");

// =============================================================================
// Polling and runs
// =============================================================================

define_id!(PollId, "poll");
define_id!(RunId, "run");

// =============================================================================
// Tests
// =============================================================================
