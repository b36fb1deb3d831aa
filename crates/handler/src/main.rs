//! Entry point for one coordinator invocation: reads a notification, handles
//! every event in it and exits.
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

mod dispatch;
mod error;

use dispatch::dispatch;
use error::{Error, Result};

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use farm_aws::{AutoScalingHooks, Ec2Instances, SnsNotifier, SsmCommands, SsmParameterStore};
use farm_coordinator::{CoordinatorConfig, Event, Reconciler, ReconcilerOptions};
use tokio::io::AsyncReadExt;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Path prefix of the shared parameter namespace
    #[arg(long, env = "MEMBERSHIP_STORE", required = true)]
    membership_store: String,

    /// Topic used to reschedule work
    #[arg(long, env = "NOTIFICATION_TOPIC", required = true)]
    notification_topic: String,

    /// Name of the deployment this farm belongs to
    #[arg(long, env = "DEPLOYMENT_NAME", required = true)]
    deployment_name: String,

    #[arg(long, env = "AWS_REGION", default_value = "us-east-1")]
    region: String,

    /// Prefix of the command documents, one per operation
    #[arg(long, env = "COMMAND_DOCUMENT_PREFIX", default_value = "")]
    document_prefix: String,

    /// Seconds to wait before republishing an event
    #[arg(long, env = "RESCHEDULE_DELAY", default_value_t = 30)]
    reschedule_delay: u64,

    #[arg(long, env = "MAX_STATUS_CHECKS", default_value_t = 120)]
    max_status_checks: u32,

    /// Notification to handle; read from stdin when omitted
    #[arg(long)]
    event: Option<PathBuf>,

    #[arg(long, env = "LOG_LEVEL", default_value_t = Level::INFO)]
    log_level: Level,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing::subscriber::set_global_default(
        FmtSubscriber::builder()
            .with_max_level(args.log_level)
            .finish(),
    )?;

    let mut config = CoordinatorConfig::new(
        args.membership_store,
        args.notification_topic,
        args.deployment_name,
    )?;
    config.reschedule_delay = Duration::from_secs(args.reschedule_delay);
    config.max_status_checks = args.max_status_checks;

    let raw = match &args.event {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .map_err(|e| Error::Io("failed to read event file", e))?,
        None => {
            let mut raw = String::new();
            tokio::io::stdin()
                .read_to_string(&mut raw)
                .await
                .map_err(|e| Error::Io("failed to read event from stdin", e))?;
            raw
        }
    };
    let events = Event::decode_notification(&raw)?;
    let total = events.len();
    info!(total, deployment = %config.deployment_name(), "received notification");

    let sdk_config = farm_aws::load_config(args.region).await;
    let reconciler = Reconciler::new(ReconcilerOptions {
        parameters: SsmParameterStore::new(&sdk_config, config.membership_store()),
        instances: Ec2Instances::new(&sdk_config),
        hooks: AutoScalingHooks::new(&sdk_config),
        commands: SsmCommands::new(&sdk_config, args.document_prefix),
        notifier: SnsNotifier::new(&sdk_config, config.notification_topic()),
        config,
    });

    let failed = dispatch(&reconciler, events).await;
    if failed > 0 {
        return Err(Error::Failed { failed, total });
    }

    Ok(())
}
