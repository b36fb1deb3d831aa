//! AWS implementations of the coordinator's collaborators: Systems Manager
//! parameters and Run Command, EC2 instance status, autoscaling lifecycle
//! hooks and SNS.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod commands;
mod error;
mod hooks;
mod instances;
mod notifier;
mod parameters;

pub use commands::SsmCommands;
pub use error::Error;
pub use hooks::AutoScalingHooks;
pub use instances::Ec2Instances;
pub use notifier::SnsNotifier;
pub use parameters::SsmParameterStore;

use aws_config::{Region, SdkConfig};

/// Loads the shared SDK configuration for `region` from the environment.
pub async fn load_config(region: String) -> SdkConfig {
    aws_config::from_env()
        .region(Region::new(region))
        .load()
        .await
}
