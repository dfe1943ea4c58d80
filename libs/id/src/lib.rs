//! # satrig-id
//!
//! Typed identifiers for objects the harness itself owns: resource handles,
//! scope instances, polling tasks and test runs.
//!
//! Identifiers handed out by the system under test are opaque to the harness
//! and are never parsed into these types.
//!
//! ## ID Format
//!
//! All local IDs use a prefixed format: `{prefix}_{ulid}`
//!
//! Examples:
//! - `hdl_01HV4Z2WQXKJNM8GPQY6VBKC3D`
//! - `scope_01HV4Z3MXNKPQR9HSTZ7WCLD4E`
//! - `run_01HV4Z4NYPLTRS0JTUA8XDME5F`
//!
//! ULIDs are time-ordered, so handles sort in creation order when logged.

mod error;
mod macros;
mod types;

pub use error::IdError;
pub use types::*;

/// Re-export ulid for consumers that need raw ULID operations
pub use ulid::Ulid;
