//! Mock implementations of the coordinator's external collaborators for
//! testing and local runs. Every call is recorded for later inspection.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod error;

pub use error::Error;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use farm_coordinator::{
    CommandExecutor, CommandRequest, CommandStatus, InstanceLifecycle, LifecycleActionResult,
    LifecycleHookEvent, LifecycleHooks, Notifier,
};
use parking_lot::Mutex;

/// Instance lifecycle where every instance runs unless stopped.
#[derive(Clone, Debug, Default)]
pub struct MockInstances {
    stopped: Arc<Mutex<HashSet<String>>>,
}

impl MockInstances {
    /// Creates a mock where every instance is running.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks an instance as no longer pending or running.
    pub fn stop(&self, instance_id: impl Into<String>) {
        self.stopped.lock().insert(instance_id.into());
    }
}

#[async_trait]
impl InstanceLifecycle for MockInstances {
    type Error = Error;

    async fn is_running(&self, instance_id: &str) -> Result<bool, Self::Error> {
        Ok(!self.stopped.lock().contains(instance_id))
    }
}

/// A recorded lifecycle completion.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Completion {
    /// Hook that was completed.
    pub hook_name: String,
    /// Instance the hook paused.
    pub instance_id: String,
    /// How it was completed.
    pub result: LifecycleActionResult,
}

/// Lifecycle hooks that record completions.
#[derive(Clone, Debug, Default)]
pub struct MockLifecycleHooks {
    completions: Arc<Mutex<Vec<Completion>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockLifecycleHooks {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent completions fail (they are still recorded).
    pub fn fail(&self) {
        *self.failing.lock() = true;
    }

    /// Every completion attempted so far.
    #[must_use]
    pub fn completions(&self) -> Vec<Completion> {
        self.completions.lock().clone()
    }
}

#[async_trait]
impl LifecycleHooks for MockLifecycleHooks {
    type Error = Error;

    async fn complete(
        &self,
        hook: &LifecycleHookEvent,
        result: LifecycleActionResult,
    ) -> Result<(), Self::Error> {
        self.completions.lock().push(Completion {
            hook_name: hook.hook_name.clone(),
            instance_id: hook.instance_id.clone(),
            result,
        });

        if *self.failing.lock() {
            return Err(Error::Injected("lifecycle hook"));
        }

        Ok(())
    }
}

/// Command subsystem with scripted invocation statuses.
#[derive(Clone, Debug, Default)]
pub struct MockCommands {
    requests: Arc<Mutex<Vec<CommandRequest>>>,
    statuses: Arc<Mutex<HashMap<String, Vec<CommandStatus>>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockCommands {
    /// Creates a subsystem with no recorded invocations.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the invocation statuses reported for an instance.
    pub fn set_statuses(&self, instance_id: impl Into<String>, statuses: Vec<CommandStatus>) {
        self.statuses.lock().insert(instance_id.into(), statuses);
    }

    /// Makes subsequent submissions fail.
    pub fn fail(&self) {
        *self.failing.lock() = true;
    }

    /// Every request submitted successfully so far.
    #[must_use]
    pub fn requests(&self) -> Vec<CommandRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CommandExecutor for MockCommands {
    type Error = Error;

    async fn execute(&self, request: &CommandRequest) -> Result<(), Self::Error> {
        if *self.failing.lock() {
            return Err(Error::Injected("command execution"));
        }

        self.requests.lock().push(request.clone());
        Ok(())
    }

    async fn invocations(&self, instance_id: &str) -> Result<Vec<CommandStatus>, Self::Error> {
        Ok(self
            .statuses
            .lock()
            .get(instance_id)
            .cloned()
            .unwrap_or_default())
    }
}

/// Notification channel that keeps published messages.
#[derive(Clone, Debug, Default)]
pub struct MockNotifier {
    messages: Arc<Mutex<Vec<String>>>,
    failing: Arc<Mutex<bool>>,
}

impl MockNotifier {
    /// Creates an empty channel.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent publishes fail.
    pub fn fail(&self) {
        *self.failing.lock() = true;
    }

    /// Every message published successfully so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }

    /// Removes and returns the published messages.
    pub fn drain(&self) -> Vec<String> {
        std::mem::take(&mut *self.messages.lock())
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    type Error = Error;

    async fn publish(&self, message: String) -> Result<(), Self::Error> {
        if *self.failing.lock() {
            return Err(Error::Injected("notifier"));
        }

        self.messages.lock().push(message);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use farm_coordinator::Operation;
    use serde_json::Map;

    #[tokio::test]
    async fn test_instances() {
        let instances = MockInstances::new();
        instances.stop("i-2");

        assert!(instances.is_running("i-1").await.unwrap());
        assert!(!instances.is_running("i-2").await.unwrap());
    }

    #[tokio::test]
    async fn test_hooks_record_even_when_failing() {
        let hooks = MockLifecycleHooks::new();
        let hook = LifecycleHookEvent {
            hook_name: "RDS-Gateway-LAUNCHING".to_string(),
            instance_id: "i-1".to_string(),
            group_name: "gateways".to_string(),
            action_token: "tok".to_string(),
            extra: Map::new(),
        };

        hooks.complete(&hook, LifecycleActionResult::Continue).await.unwrap();
        hooks.fail();
        assert!(hooks.complete(&hook, LifecycleActionResult::Abandon).await.is_err());

        assert_eq!(hooks.completions().len(), 2);
    }

    #[tokio::test]
    async fn test_commands() {
        let commands = MockCommands::new();
        commands.set_statuses("i-1", vec![CommandStatus::Success]);
        let request = CommandRequest {
            operation: Operation::ConfigureGateway,
            instance_id: "i-1".to_string(),
            primary_broker: Some("i-0".to_string()),
        };

        commands.execute(&request).await.unwrap();

        assert_eq!(commands.requests(), vec![request]);
        assert_eq!(
            commands.invocations("i-1").await.unwrap(),
            vec![CommandStatus::Success]
        );
        assert!(commands.invocations("i-2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_notifier() {
        let notifier = MockNotifier::new();
        notifier.publish("{}".to_string()).await.unwrap();

        assert_eq!(notifier.drain(), vec!["{}".to_string()]);
        assert!(notifier.messages().is_empty());

        notifier.fail();
        assert!(notifier.publish("{}".to_string()).await.is_err());
    }
}
