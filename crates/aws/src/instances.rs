use crate::error::Error;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ec2::types::InstanceStateName;
use farm_coordinator::InstanceLifecycle;

/// Instance state lookups against EC2.
#[derive(Clone, Debug)]
pub struct Ec2Instances {
    client: aws_sdk_ec2::Client,
}

impl Ec2Instances {
    /// Creates the lookup client.
    #[must_use]
    pub fn new(config: &SdkConfig) -> Self {
        Self {
            client: aws_sdk_ec2::Client::new(config),
        }
    }
}

#[async_trait]
impl InstanceLifecycle for Ec2Instances {
    type Error = Error;

    async fn is_running(&self, instance_id: &str) -> Result<bool, Self::Error> {
        let resp = self
            .client
            .describe_instance_status()
            .instance_ids(instance_id)
            .include_all_instances(true)
            .send()
            .await
            .map_err(|e| Error::Ec2(e.into()))?;

        let status = resp
            .instance_statuses
            .unwrap_or_default()
            .into_iter()
            .next()
            .ok_or_else(|| Error::InstanceNotFound(instance_id.to_string()))?;

        Ok(matches!(
            status.instance_state.and_then(|s| s.name),
            Some(InstanceStateName::Pending | InstanceStateName::Running)
        ))
    }
}
