//! Boundaries to the external systems the coordinator drives.

use crate::event::LifecycleHookEvent;
use crate::status::CommandStatus;

use std::error::Error;
use std::fmt::{Display, Formatter, Result as FmtResult};

use async_trait::async_trait;
use farm_membership::ComponentType;

/// How a lifecycle hook is resolved.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum LifecycleActionResult {
    /// Let the launch or termination proceed.
    Continue,
    /// Give up on the instance.
    Abandon,
}

impl LifecycleActionResult {
    /// Wire value expected by the autoscaling API.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continue => "CONTINUE",
            Self::Abandon => "ABANDON",
        }
    }
}

impl Display for LifecycleActionResult {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// An opaque configuration or removal operation run on an instance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Operation {
    /// Bootstrap the farm on its primary broker.
    ConfigurePrimaryBroker,
    /// Join a secondary broker.
    ConfigureBroker,
    /// Join a gateway.
    ConfigureGateway,
    /// Join a web access node.
    ConfigureWebAccess,
    /// Take a broker out of the farm.
    RemoveBroker,
    /// Take a gateway out of the farm.
    RemoveGateway,
    /// Take a web access node out of the farm.
    RemoveWebAccess,
}

impl Operation {
    /// The operation that joins a non-primary member of `component_type`.
    #[must_use]
    pub const fn configure(component_type: ComponentType) -> Self {
        match component_type {
            ComponentType::Broker => Self::ConfigureBroker,
            ComponentType::Gateway => Self::ConfigureGateway,
            ComponentType::WebAccess => Self::ConfigureWebAccess,
        }
    }

    /// The operation that removes a member of `component_type`.
    #[must_use]
    pub const fn remove(component_type: ComponentType) -> Self {
        match component_type {
            ComponentType::Broker => Self::RemoveBroker,
            ComponentType::Gateway => Self::RemoveGateway,
            ComponentType::WebAccess => Self::RemoveWebAccess,
        }
    }

    /// Stable name, used to pick the command document.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ConfigurePrimaryBroker => "ConfigurePrimaryBroker",
            Self::ConfigureBroker => "ConfigureBroker",
            Self::ConfigureGateway => "ConfigureGateway",
            Self::ConfigureWebAccess => "ConfigureWebAccess",
            Self::RemoveBroker => "RemoveBroker",
            Self::RemoveGateway => "RemoveGateway",
            Self::RemoveWebAccess => "RemoveWebAccess",
        }
    }
}

impl Display for Operation {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(self.as_str())
    }
}

/// One submission to the command-execution subsystem.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CommandRequest {
    /// What to run.
    pub operation: Operation,
    /// Instance to run it against.
    pub instance_id: String,
    /// The farm's primary broker, when there is one other than the target.
    pub primary_broker: Option<String>,
}

/// Read-only view of the compute-instance lifecycle.
#[async_trait]
pub trait InstanceLifecycle: Send + Sync + 'static {
    /// The error type for lookups.
    type Error: Error + Send + Sync + 'static;

    /// Whether the instance is pending or running.
    async fn is_running(&self, instance_id: &str) -> Result<bool, Self::Error>;
}

/// Completion of autoscaling lifecycle hooks.
#[async_trait]
pub trait LifecycleHooks: Send + Sync + 'static {
    /// The error type for completions.
    type Error: Error + Send + Sync + 'static;

    /// Resolves the paused lifecycle action.
    async fn complete(
        &self,
        hook: &LifecycleHookEvent,
        result: LifecycleActionResult,
    ) -> Result<(), Self::Error>;
}

/// The subsystem that actually configures instances.
#[async_trait]
pub trait CommandExecutor: Send + Sync + 'static {
    /// The error type for command operations.
    type Error: Error + Send + Sync + 'static;

    /// Submits an operation; does not wait for it to finish.
    async fn execute(&self, request: &CommandRequest) -> Result<(), Self::Error>;

    /// Status of every command invocation recorded against the instance.
    async fn invocations(&self, instance_id: &str) -> Result<Vec<CommandStatus>, Self::Error>;
}

/// Channel used to schedule a future invocation.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// The error type for publishing.
    type Error: Error + Send + Sync + 'static;

    /// Publishes a JSON message that will come back as a new event.
    async fn publish(&self, message: String) -> Result<(), Self::Error>;
}
