use farm_coordinator::{
    CommandExecutor, Event, InstanceLifecycle, LifecycleHooks, Notifier, Reconciler,
};
use farm_parameters::ParameterStore1;
use futures::future::join_all;
use tracing::{error, info};

/// Handles every event concurrently and returns how many failed.
pub async fn dispatch<P, I, H, C, N>(
    reconciler: &Reconciler<P, I, H, C, N>,
    events: Vec<Event>,
) -> usize
where
    P: ParameterStore1,
    I: InstanceLifecycle,
    H: LifecycleHooks,
    C: CommandExecutor,
    N: Notifier,
{
    let results = join_all(events.into_iter().map(|event| reconciler.handle(event))).await;

    results
        .into_iter()
        .filter(|result| match result {
            Ok(outcome) => {
                info!(?outcome, "handled event");
                false
            }
            Err(e) => {
                error!(error = %e, "failed to handle event");
                true
            }
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use farm_coordinator::{CoordinatorConfig, Operation, ReconcilerOptions};
    use farm_coordinator_mock::{MockCommands, MockInstances, MockLifecycleHooks, MockNotifier};
    use farm_membership::ComponentType;
    use farm_parameters_memory::MemoryParameterStore;
    use serde_json::json;

    fn launching(component_type: ComponentType, instance_id: &str) -> serde_json::Value {
        json!({
            "LifecycleHookName": format!("{component_type}-LAUNCHING"),
            "EC2InstanceId": instance_id,
            "AutoScalingGroupName": "farm",
            "LifecycleActionToken": "tok"
        })
    }

    #[tokio::test]
    async fn test_dispatch_envelope_records() {
        let mut config = CoordinatorConfig::new("/farm", "topic", "test-farm").unwrap();
        config.reschedule_delay = Duration::ZERO;
        config.conch.min_wait = Duration::from_millis(1);
        config.conch.max_wait = Duration::from_millis(5);
        config.conch.reclaim_pause = Duration::from_millis(1);

        let commands = MockCommands::new();
        let notifier = MockNotifier::new();
        let reconciler = Reconciler::new(ReconcilerOptions {
            config,
            parameters: MemoryParameterStore::new(),
            instances: MockInstances::new(),
            hooks: MockLifecycleHooks::new(),
            commands: commands.clone(),
            notifier: notifier.clone(),
        });

        let envelope = json!({
            "Records": [
                {"Sns": {"Message": launching(ComponentType::Broker, "i-1").to_string()}},
                {"Sns": {"Message": launching(ComponentType::Broker, "i-2").to_string()}},
                {"Sns": {"Message": "{\"Event\":\"autoscaling:TEST_NOTIFICATION\"}"}}
            ]
        });
        let events = Event::decode_notification(&envelope.to_string()).unwrap();

        let failed = dispatch(&reconciler, events).await;

        assert_eq!(failed, 0);
        let requests = commands.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].operation, Operation::ConfigurePrimaryBroker);
        // The winner's status check and the loser's retry.
        assert_eq!(notifier.messages().len(), 2);
    }

    #[tokio::test]
    async fn test_dispatch_counts_failures() {
        let mut config = CoordinatorConfig::new("/farm", "topic", "test-farm").unwrap();
        config.reschedule_delay = Duration::ZERO;

        let commands = MockCommands::new();
        commands.fail();
        let reconciler = Reconciler::new(ReconcilerOptions {
            config,
            parameters: MemoryParameterStore::new(),
            instances: MockInstances::new(),
            hooks: MockLifecycleHooks::new(),
            commands,
            notifier: MockNotifier::new(),
        });

        let events = vec![Event::from_value(launching(ComponentType::Broker, "i-1"))];

        assert_eq!(dispatch(&reconciler, events).await, 1);
    }
}
