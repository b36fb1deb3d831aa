//! Deployment coordinator for a role-typed server farm: decodes scaling and
//! status-check events and drives each instance through configuration.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod adaptor;
mod config;
mod error;
mod event;
mod reconciler;
mod status;

pub use adaptor::{
    CommandExecutor, CommandRequest, InstanceLifecycle, LifecycleActionResult, LifecycleHooks,
    Notifier, Operation,
};
pub use config::CoordinatorConfig;
pub use error::{Error, Result};
pub use event::{
    Event, HookAction, HookTarget, InvalidHookName, LifecycleHookEvent, StatusCheckEvent,
};
pub use reconciler::{Outcome, Reconciler, ReconcilerOptions, Reschedule, Skip};
pub use status::{CommandStatus, OverallStatus, StatusCounts, aggregate};
