use crate::error::Error;

use async_trait::async_trait;
use aws_config::SdkConfig;
use farm_coordinator::Notifier;

/// Publishes rescheduled events to an SNS topic.
#[derive(Clone, Debug)]
pub struct SnsNotifier {
    client: aws_sdk_sns::Client,
    topic_arn: String,
}

impl SnsNotifier {
    /// Creates a notifier for `topic_arn`.
    pub fn new(config: &SdkConfig, topic_arn: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_sns::Client::new(config),
            topic_arn: topic_arn.into(),
        }
    }
}

#[async_trait]
impl Notifier for SnsNotifier {
    type Error = Error;

    async fn publish(&self, message: String) -> Result<(), Self::Error> {
        self.client
            .publish()
            .topic_arn(&self.topic_arn)
            .message(message)
            .send()
            .await
            .map_err(|e| Error::Sns(e.into()))?;

        Ok(())
    }
}
