//! # satrig-e2e
//!
//! End-to-end suite for a content and host management server.
//!
//! The library half holds what the test files share: settings, logging, the
//! [`Target`] bundle of remote interfaces, the fixture [`catalog`], random
//! data and schedule helpers, and the steps each area's tests drive (sync
//! plans, content views, registration, manifests, backups and the Ansible
//! collection). Tests live under `tests/` and run against the
//! in-memory remote unless `SATRIG_LIVE=1` points them at a real server.
//!
//! ## Running
//!
//! ```bash
//! cargo test -p satrig-e2e
//! SATRIG_LIVE=1 SATRIG__SERVER__HOSTNAME=sat.example.com cargo test -p satrig-e2e
//! ```

pub mod config;
pub mod schedule;
pub mod subscription;

pub use config::Settings;
pub use target::Target;

/// Set to `1` to run the suite against the configured server.
pub const LIVE_ENV: &str = "SATRIG_LIVE";

/// True when the suite should talk to a real server.
pub fn live() -> bool {
    std::env::var(LIVE_ENV).is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}
