use crate::error::Error;

use async_trait::async_trait;
use aws_config::SdkConfig;
use aws_sdk_ssm::types::CommandInvocationStatus;
use farm_coordinator::{CommandExecutor, CommandRequest, CommandStatus};
use tracing::debug;

const PRIMARY_BROKER_PARAMETER: &str = "PrimaryBroker";

/// Runs operations as Systems Manager command documents.
///
/// Each [`Operation`](farm_coordinator::Operation) maps to the document
/// `{document_prefix}{operation}`.
#[derive(Clone, Debug)]
pub struct SsmCommands {
    client: aws_sdk_ssm::Client,
    document_prefix: String,
}

impl SsmCommands {
    /// Creates the command client.
    pub fn new(config: &SdkConfig, document_prefix: impl Into<String>) -> Self {
        Self {
            client: aws_sdk_ssm::Client::new(config),
            document_prefix: document_prefix.into(),
        }
    }
}

fn command_status(status: &CommandInvocationStatus) -> CommandStatus {
    match status {
        CommandInvocationStatus::Pending => CommandStatus::Pending,
        CommandInvocationStatus::InProgress => CommandStatus::InProgress,
        CommandInvocationStatus::Delayed => CommandStatus::Delayed,
        CommandInvocationStatus::Success => CommandStatus::Success,
        CommandInvocationStatus::Cancelled => CommandStatus::Cancelled,
        CommandInvocationStatus::TimedOut => CommandStatus::TimedOut,
        CommandInvocationStatus::Failed => CommandStatus::Failed,
        CommandInvocationStatus::Cancelling => CommandStatus::Cancelling,
        _ => CommandStatus::Unknown,
    }
}

#[async_trait]
impl CommandExecutor for SsmCommands {
    type Error = Error;

    async fn execute(&self, request: &CommandRequest) -> Result<(), Self::Error> {
        let document = format!("{}{}", self.document_prefix, request.operation);

        let mut send = self
            .client
            .send_command()
            .document_name(&document)
            .instance_ids(&request.instance_id);
        if let Some(primary) = &request.primary_broker {
            send = send.parameters(PRIMARY_BROKER_PARAMETER, vec![primary.clone()]);
        }

        let resp = send.send().await.map_err(|e| Error::Ssm(e.into()))?;

        debug!(
            %document,
            command_id = ?resp.command.and_then(|c| c.command_id),
            "sent command"
        );

        Ok(())
    }

    async fn invocations(&self, instance_id: &str) -> Result<Vec<CommandStatus>, Self::Error> {
        let mut statuses = Vec::new();
        let mut next_token = None;

        loop {
            let resp = self
                .client
                .list_command_invocations()
                .instance_id(instance_id)
                .set_next_token(next_token)
                .send()
                .await
                .map_err(|e| Error::Ssm(e.into()))?;

            statuses.extend(
                resp.command_invocations
                    .unwrap_or_default()
                    .iter()
                    .map(|i| i.status.as_ref().map_or(CommandStatus::Unknown, command_status)),
            );

            match resp.next_token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(statuses)
    }
}
