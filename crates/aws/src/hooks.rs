use crate::error::Error;

use async_trait::async_trait;
use aws_config::SdkConfig;
use farm_coordinator::{LifecycleActionResult, LifecycleHookEvent, LifecycleHooks};
use tracing::info;

/// Completes autoscaling lifecycle actions.
#[derive(Clone, Debug)]
pub struct AutoScalingHooks {
    client: aws_sdk_autoscaling::Client,
}

impl AutoScalingHooks {
    /// Creates the autoscaling client.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_autoscaling::Client::new(config),
        }
    }
}

#[async_trait]
impl LifecycleHooks for AutoScalingHooks {
    type Error = Error;

    async fn complete(
        &self,
        hook: &LifecycleHookEvent,
        result: LifecycleActionResult,
    ) -> Result<(), Self::Error> {
        self.client
            .complete_lifecycle_action()
            .auto_scaling_group_name(&hook.group_name)
            .lifecycle_hook_name(&hook.hook_name)
            .lifecycle_action_token(&hook.action_token)
            .instance_id(&hook.instance_id)
            .lifecycle_action_result(result.as_str())
            .send()
            .await
            .map_err(|e| Error::AutoScaling(e.into()))?;

        info!(instance_id = %hook.instance_id, %result, "completed lifecycle action");

        Ok(())
    }
}
