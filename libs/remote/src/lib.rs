//! # satrig-remote
//!
//! The boundary between the harness and the system under test.
//!
//! Three capability traits cover everything the suite needs:
//!
//! - [`EntityApi`]: CRUD and search over entity collections, with typed
//!   helpers in [`EntityApiExt`]
//! - [`TaskApi`]: asynchronous task status and service health
//! - [`CommandRunner`]: raw commands returning exit status and output
//!
//! [`HttpRemote`] implements the first two over the product's JSON API and
//! [`LocalCommandRunner`] the third. Waiting for tasks goes through the
//! polling engine in [`wait_for_tasks`] and [`wait_for_task`].

mod api;
mod clock;
mod command;
mod error;
mod http;
mod records;
mod registration;
mod settings;
mod tasks;

pub use api::{CommandRunner, EntityApi, EntityApiExt, TaskApi};
pub use clock::{Clock, SystemClock};
pub use command::LocalCommandRunner;
pub use error::{RemoteError, Result};
pub use http::{HttpRemote, HttpRemoteConfig};
pub use records::{
    ActivationKey, CommandResult, ContentView, ContentViewFilter, ContentViewVersion, Entity,
    EntityKind, FilterType, Host, JobInvocation, LifecycleEnvironment, Organization, PingReport,
    Product, Repository, ServiceStatus, Setting, Subscription, SyncInterval, SyncPlan, Task,
    TaskState, SYNC_DATE_FMT,
};
pub use registration::{generate_registration_command, RegistrationRequest};
pub use settings::update_setting;
pub use tasks::{
    content_view_publish_query, failure_messages, job_invocation_query, repository_sync_query,
    wait_for_task, wait_for_tasks, TaskWaitError,
};
