//! Test doubles for satrig.
//!
//! [`MockRemote`] implements every remote trait in memory so fixture and
//! suite tests run without a server. Pair it with
//! `#[tokio::test(start_paused = true)]` and [`MockClock`] to make
//! schedule-driven tests finish instantly.
//!
//! Commands run against the mock reach a simulated server and content host
//! (see [`SERVER_FQDN`] and [`CLIENT_HOSTNAME`]) unless a test scripts them.

mod appliance;
mod clock;
mod mock;
mod query;
mod store;

pub use appliance::{CLIENT_HOSTNAME, SERVER_FQDN};
pub use clock::MockClock;
pub use mock::{entity_counts, Call, MockRemote, TaskScript};
pub use query::Query;
pub use store::MAX_NAME_LEN;
