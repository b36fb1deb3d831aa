//! The event handler: decides the next step for each scaling or status-check
//! event and reschedules itself while work is outstanding.

use crate::adaptor::{
    CommandExecutor, CommandRequest, InstanceLifecycle, LifecycleActionResult, LifecycleHooks,
    Notifier, Operation,
};
use crate::config::CoordinatorConfig;
use crate::error::{Error, Result};
use crate::event::{Event, HookAction, LifecycleHookEvent, StatusCheckEvent};
use crate::status::{self, OverallStatus};

use farm_membership::{
    ComponentType, DeploymentView, ElectionOutcome, Error as MembershipError, MemberStatus,
    MemberUpdate, Membership, build_view,
};
use farm_parameters::ParameterStore1;
use tracing::{debug, error, info, instrument, warn};

/// Why an event was put back on the notification channel.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Reschedule {
    /// The primary broker is missing or still being configured.
    PrimaryNotReady,
    /// This broker lost the primary election.
    ElectionLost {
        /// The primary observed after backing off.
        winner: Option<String>,
    },
    /// Two primaries were observed; wait for the election to settle.
    DualPrimary,
    /// Configuration is still running.
    StatusCheck {
        /// Aggregate status observed.
        status: OverallStatus,
        /// Checks made so far, this one included.
        checks: u32,
    },
}

/// Why an event was dropped without action.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Skip {
    /// The instance is already being configured or is configured.
    AlreadyMember(MemberStatus),
    /// The instance was already removed.
    AlreadyRemoved,
    /// The hook name does not encode a known role and action.
    InvalidHook(String),
    /// Configuration status could not be determined.
    Indeterminate,
    /// Not an event this coordinator handles.
    Unrecognized,
}

/// What handling one event did.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Outcome {
    /// An operation was submitted and a status check scheduled.
    Started(Operation),
    /// The lifecycle action was completed.
    Resolved {
        /// How the hook was completed.
        result: LifecycleActionResult,
        /// Status committed for the member, if any.
        status: Option<MemberStatus>,
    },
    /// The event (or its follow-up) was republished for later.
    Rescheduled(Reschedule),
    /// Nothing to do.
    Skipped(Skip),
}

/// Collaborators and settings for a [`Reconciler`].
pub struct ReconcilerOptions<P, I, H, C, N> {
    /// Shared settings.
    pub config: CoordinatorConfig,
    /// Root parameter store; scoped by deployment name.
    pub parameters: P,
    /// Instance lifecycle API.
    pub instances: I,
    /// Lifecycle-hook completion API.
    pub hooks: H,
    /// Command-execution subsystem.
    pub commands: C,
    /// Reschedule channel.
    pub notifier: N,
}

/// Handles coordinator events for one deployment.
pub struct Reconciler<P, I, H, C, N>
where
    P: ParameterStore1,
{
    config: CoordinatorConfig,
    membership: Membership<P::Scoped>,
    instances: I,
    hooks: H,
    commands: C,
    notifier: N,
}

impl<P, I, H, C, N> Reconciler<P, I, H, C, N>
where
    P: ParameterStore1,
    I: InstanceLifecycle,
    H: LifecycleHooks,
    C: CommandExecutor,
    N: Notifier,
{
    /// Creates a reconciler.
    pub fn new(
        ReconcilerOptions {
            config,
            parameters,
            instances,
            hooks,
            commands,
            notifier,
        }: ReconcilerOptions<P, I, H, C, N>,
    ) -> Self {
        let membership = Membership::new(
            parameters.scope(config.deployment_name()),
            config.conch.clone(),
        );

        Self {
            config,
            membership,
            instances,
            hooks,
            commands,
            notifier,
        }
    }

    /// The deployment's membership.
    pub const fn membership(&self) -> &Membership<P::Scoped> {
        &self.membership
    }

    /// Handles one event.
    ///
    /// # Errors
    ///
    /// Membership, lease and store failures, and failures to query or submit
    /// commands or instance state. Completion and publish failures are logged
    /// only.
    #[instrument(skip_all, fields(event = %event))]
    pub async fn handle(&self, event: Event) -> Result<Outcome> {
        match event {
            Event::StatusCheck(check) => self.status_check(check).await,
            Event::LifecycleHook(hook) => match hook.target() {
                Ok(target) => match target.action {
                    HookAction::Launching => self.add(hook, target.component_type).await,
                    HookAction::Terminating => self.remove(hook, target.component_type).await,
                },
                Err(e) => {
                    warn!(error = %e, "skipping lifecycle hook");
                    Ok(Outcome::Skipped(Skip::InvalidHook(hook.hook_name)))
                }
            },
            Event::Unrecognized(value) => {
                warn!(%value, "no way to handle event, skipping");
                Ok(Outcome::Skipped(Skip::Unrecognized))
            }
        }
    }

    async fn add(&self, hook: LifecycleHookEvent, component_type: ComponentType) -> Result<Outcome> {
        let Some(view) = self.current_view().await? else {
            return Ok(self.reschedule_hook(hook, Reschedule::DualPrimary).await);
        };

        if let Some(existing) = view.member(&hook.instance_id) {
            if matches!(
                existing.status,
                MemberStatus::Configuring | MemberStatus::Configured
            ) {
                info!(status = ?existing.status, "instance already joined, ignoring duplicate launch");
                return Ok(Outcome::Skipped(Skip::AlreadyMember(existing.status)));
            }
        }

        match view.primary_broker {
            Some(primary) if primary.instance_id == hook.instance_id => {
                info!("resuming primary broker configuration");
                self.start(
                    hook,
                    Operation::ConfigurePrimaryBroker,
                    None,
                    Some(MemberStatus::Configuring),
                )
                .await
            }
            Some(primary) if primary.status != MemberStatus::Configured => {
                info!(primary = %primary.instance_id, "primary broker not configured yet, waiting");
                Ok(self.reschedule_hook(hook, Reschedule::PrimaryNotReady).await)
            }
            None if component_type == ComponentType::Broker => {
                if !self.is_running(&hook).await? {
                    return Ok(self.abandon_launch(&hook).await);
                }

                info!("no primary broker, establishing this one");
                match self.membership.elect_primary(&hook.instance_id).await? {
                    ElectionOutcome::Won => {
                        self.start(
                            hook,
                            Operation::ConfigurePrimaryBroker,
                            None,
                            Some(MemberStatus::Configuring),
                        )
                        .await
                    }
                    ElectionOutcome::Lost { winner } => {
                        info!(?winner, "lost primary election, backing off");
                        Ok(self
                            .reschedule_hook(hook, Reschedule::ElectionLost { winner })
                            .await)
                    }
                }
            }
            None => {
                info!(%component_type, "no primary broker to join yet, waiting");
                Ok(self.reschedule_hook(hook, Reschedule::PrimaryNotReady).await)
            }
            Some(primary) => {
                if !self.is_running(&hook).await? {
                    return Ok(self.abandon_launch(&hook).await);
                }

                let mut update = MemberUpdate::new(&hook.instance_id)
                    .component_type(component_type)
                    .status(MemberStatus::New);
                if component_type == ComponentType::Broker {
                    update = update.primary(false);
                }
                self.membership.set_member(update).await?;

                self.start(
                    hook,
                    Operation::configure(component_type),
                    Some(primary.instance_id),
                    Some(MemberStatus::Configuring),
                )
                .await
            }
        }
    }

    async fn remove(&self, hook: LifecycleHookEvent, component_type: ComponentType) -> Result<Outcome> {
        let members = self.membership.members().await?;

        if members
            .iter()
            .any(|m| m.instance_id == hook.instance_id && m.status == MemberStatus::Removed)
        {
            info!("instance already removed, ignoring duplicate termination");
            return Ok(Outcome::Skipped(Skip::AlreadyRemoved));
        }

        let view = match build_view(&members) {
            Ok(view) => view,
            Err(e) => {
                warn!(error = %e, "primary election unsettled");
                return Ok(self.reschedule_hook(hook, Reschedule::DualPrimary).await);
            }
        };

        if view
            .primary_broker
            .as_ref()
            .is_some_and(|p| p.status == MemberStatus::Configuring)
        {
            info!("primary broker configuration in progress, cannot remove yet");
            return Ok(self.reschedule_hook(hook, Reschedule::PrimaryNotReady).await);
        }

        self.membership
            .set_member(
                MemberUpdate::new(&hook.instance_id)
                    .component_type(component_type)
                    .status(MemberStatus::Removing),
            )
            .await?;

        let primary = view
            .primary_broker
            .map(|p| p.instance_id)
            .filter(|id| *id != hook.instance_id);

        self.start(hook, Operation::remove(component_type), primary, None)
            .await
    }

    async fn status_check(&self, check: StatusCheckEvent) -> Result<Outcome> {
        let target = match check.hook.target() {
            Ok(target) => target,
            Err(e) => {
                warn!(error = %e, "skipping status check");
                return Ok(Outcome::Skipped(Skip::InvalidHook(check.hook.hook_name)));
            }
        };

        let mut status = status::aggregate(&self.commands, &check.hook.instance_id)
            .await
            .map_err(Error::external("command status"))?;

        if status.is_waiting() && check.checks >= self.config.max_status_checks {
            warn!(checks = check.checks, ?status, "configuration still not finished, treating as timed out");
            status = OverallStatus::TimedOut;
        }

        if status == OverallStatus::Success {
            info!("configuration succeeded, continuing lifecycle action");
            self.complete(&check.hook, LifecycleActionResult::Continue).await;

            let final_status = match target.action {
                HookAction::Launching => MemberStatus::Configured,
                HookAction::Terminating => MemberStatus::Removed,
            };
            self.membership
                .set_member(
                    MemberUpdate::new(&check.hook.instance_id)
                        .component_type(target.component_type)
                        .status(final_status),
                )
                .await?;

            return Ok(Outcome::Resolved {
                result: LifecycleActionResult::Continue,
                status: Some(final_status),
            });
        }

        if status.is_waiting() {
            debug!(?status, "configuration in progress");
            let next = check.next();
            let checks = next.checks;
            self.reschedule(&Event::StatusCheck(next)).await;

            return Ok(Outcome::Rescheduled(Reschedule::StatusCheck { status, checks }));
        }

        if status.is_failure() {
            warn!(?status, "configuration failed, abandoning lifecycle action");
            self.complete(&check.hook, LifecycleActionResult::Abandon).await;

            // An abandoned termination still ends the instance.
            let final_status = match target.action {
                HookAction::Launching => MemberStatus::Removing,
                HookAction::Terminating => MemberStatus::Removed,
            };
            self.membership
                .set_member(
                    MemberUpdate::new(&check.hook.instance_id)
                        .component_type(target.component_type)
                        .status(final_status),
                )
                .await?;

            return Ok(Outcome::Resolved {
                result: LifecycleActionResult::Abandon,
                status: Some(final_status),
            });
        }

        warn!(?status, "configuration state could not be determined");
        Ok(Outcome::Skipped(Skip::Indeterminate))
    }

    /// Submits `operation`, records `next_status` and schedules the first status check.
    async fn start(
        &self,
        hook: LifecycleHookEvent,
        operation: Operation,
        primary_broker: Option<String>,
        next_status: Option<MemberStatus>,
    ) -> Result<Outcome> {
        let request = CommandRequest {
            operation,
            instance_id: hook.instance_id.clone(),
            primary_broker,
        };
        self.commands
            .execute(&request)
            .await
            .map_err(Error::external("command execution"))?;
        info!(%operation, "initiated operation");

        if let Some(status) = next_status {
            self.membership
                .set_member(MemberUpdate::new(&hook.instance_id).status(status))
                .await?;
        }

        self.reschedule(&Event::StatusCheck(StatusCheckEvent::new(hook)))
            .await;

        Ok(Outcome::Started(operation))
    }

    /// Reads the view outside the lease. `None` means two primaries were seen.
    async fn current_view(&self) -> Result<Option<DeploymentView>> {
        match self.membership.view().await {
            Ok(view) => Ok(Some(view)),
            Err(MembershipError::DualPrimary(e)) => {
                warn!(error = %e, "primary election unsettled");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn is_running(&self, hook: &LifecycleHookEvent) -> Result<bool> {
        let running = self
            .instances
            .is_running(&hook.instance_id)
            .await
            .map_err(Error::external("instance status"))?;

        if !running {
            warn!("instance is neither pending nor running");
        }

        Ok(running)
    }

    async fn abandon_launch(&self, hook: &LifecycleHookEvent) -> Outcome {
        self.complete(hook, LifecycleActionResult::Abandon).await;

        Outcome::Resolved {
            result: LifecycleActionResult::Abandon,
            status: None,
        }
    }

    async fn reschedule_hook(&self, hook: LifecycleHookEvent, reason: Reschedule) -> Outcome {
        self.reschedule(&Event::LifecycleHook(hook)).await;
        Outcome::Rescheduled(reason)
    }

    async fn reschedule(&self, event: &Event) {
        tokio::time::sleep(self.config.reschedule_delay).await;

        let message = match event.encode() {
            Ok(message) => message,
            Err(e) => {
                error!(error = %e, "could not encode rescheduled event");
                return;
            }
        };

        debug!(%message, "publishing");
        if let Err(e) = self.notifier.publish(message).await {
            error!(error = %e, "failed to publish rescheduled event");
        }
    }

    async fn complete(&self, hook: &LifecycleHookEvent, result: LifecycleActionResult) {
        if let Err(e) = self.hooks.complete(hook, result).await {
            error!(error = %e, %result, "failed to complete lifecycle action");
        }
    }
}
