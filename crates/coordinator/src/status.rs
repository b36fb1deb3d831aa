//! Reduction of an instance's command invocations to one overall status.

use crate::adaptor::CommandExecutor;

use serde::{Deserialize, Serialize};

/// Status of a single command invocation.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub enum CommandStatus {
    /// Queued.
    Pending,
    /// Running.
    InProgress,
    /// Deferred by the subsystem.
    Delayed,
    /// Finished successfully.
    Success,
    /// Cancelled.
    Cancelled,
    /// Ran out of time.
    TimedOut,
    /// Finished with an error.
    Failed,
    /// Being cancelled.
    Cancelling,
    /// Any status this coordinator does not track.
    #[serde(other)]
    Unknown,
}

/// Overall configuration state of one instance.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum OverallStatus {
    /// Every tracked command succeeded.
    Success,
    /// At least one command failed.
    Failed,
    /// At least one command was cancelled.
    Cancelled,
    /// At least one command is being cancelled.
    Cancelling,
    /// At least one command timed out.
    TimedOut,
    /// Work is running.
    InProgress,
    /// Work is queued.
    Pending,
    /// Work is deferred.
    Delayed,
    /// The counts fit none of the above.
    Indeterminate,
}

impl OverallStatus {
    /// Still waiting on the subsystem.
    #[must_use]
    pub const fn is_waiting(self) -> bool {
        matches!(self, Self::InProgress | Self::Pending | Self::Delayed)
    }

    /// A failure-class outcome; the instance is abandoned.
    #[must_use]
    pub const fn is_failure(self) -> bool {
        matches!(
            self,
            Self::Failed | Self::Cancelled | Self::Cancelling | Self::TimedOut
        )
    }
}

/// Per-status tallies of an instance's invocations.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct StatusCounts {
    /// Pending invocations.
    pub pending: usize,
    /// Running invocations.
    pub in_progress: usize,
    /// Delayed invocations.
    pub delayed: usize,
    /// Successful invocations.
    pub success: usize,
    /// Cancelled invocations.
    pub cancelled: usize,
    /// Timed-out invocations.
    pub timed_out: usize,
    /// Failed invocations.
    pub failed: usize,
    /// Invocations being cancelled.
    pub cancelling: usize,
    /// All invocations, untracked statuses included.
    pub total: usize,
}

impl StatusCounts {
    /// Counts the given statuses.
    pub fn tally<I>(statuses: I) -> Self
    where
        I: IntoIterator<Item = CommandStatus>,
    {
        statuses.into_iter().fold(Self::default(), |mut acc, status| {
            match status {
                CommandStatus::Pending => acc.pending += 1,
                CommandStatus::InProgress => acc.in_progress += 1,
                CommandStatus::Delayed => acc.delayed += 1,
                CommandStatus::Success => acc.success += 1,
                CommandStatus::Cancelled => acc.cancelled += 1,
                CommandStatus::TimedOut => acc.timed_out += 1,
                CommandStatus::Failed => acc.failed += 1,
                CommandStatus::Cancelling => acc.cancelling += 1,
                CommandStatus::Unknown => {}
            }
            acc.total += 1;
            acc
        })
    }

    /// Resolves the tallies by fixed priority, most authoritative first.
    ///
    /// `Success` needs every invocation to have succeeded; any failure-class
    /// count then outranks work that is still pending.
    #[must_use]
    pub const fn overall(&self) -> OverallStatus {
        if self.success == self.total {
            OverallStatus::Success
        } else if self.failed > 0 {
            OverallStatus::Failed
        } else if self.cancelled > 0 {
            OverallStatus::Cancelled
        } else if self.cancelling > 0 {
            OverallStatus::Cancelling
        } else if self.timed_out > 0 {
            OverallStatus::TimedOut
        } else if self.in_progress > 0 {
            OverallStatus::InProgress
        } else if self.pending > 0 {
            OverallStatus::Pending
        } else if self.delayed > 0 {
            OverallStatus::Delayed
        } else {
            OverallStatus::Indeterminate
        }
    }
}

/// Fetches every invocation for the instance and reduces them to one status.
///
/// # Errors
///
/// Returns the executor's error if invocations cannot be listed.
pub async fn aggregate<C>(commands: &C, instance_id: &str) -> Result<OverallStatus, C::Error>
where
    C: CommandExecutor,
{
    let statuses = commands.invocations(instance_id).await?;
    Ok(StatusCounts::tally(statuses).overall())
}

#[cfg(test)]
mod tests {
    use super::*;

    use super::CommandStatus::{Cancelling, Delayed, Failed, InProgress, Pending, Success, TimedOut, Unknown};

    fn overall(statuses: &[CommandStatus]) -> OverallStatus {
        StatusCounts::tally(statuses.iter().copied()).overall()
    }

    #[test]
    fn test_any_failure_beats_success() {
        assert_eq!(overall(&[Success, Success, Failed]), OverallStatus::Failed);
    }

    #[test]
    fn test_unanimous_success() {
        assert_eq!(overall(&[Success, Success, Success]), OverallStatus::Success);
    }

    #[test]
    fn test_in_progress_beats_pending() {
        assert_eq!(overall(&[Pending, InProgress]), OverallStatus::InProgress);
    }

    #[test]
    fn test_failure_class_beats_waiting() {
        assert_eq!(overall(&[InProgress, TimedOut]), OverallStatus::TimedOut);
        assert_eq!(overall(&[Cancelling, TimedOut, Pending]), OverallStatus::Cancelling);
        assert_eq!(overall(&[Success, Delayed]), OverallStatus::Delayed);
    }

    #[test]
    fn test_untracked_statuses_are_indeterminate() {
        assert_eq!(overall(&[Unknown]), OverallStatus::Indeterminate);
        assert_eq!(overall(&[Success, Unknown]), OverallStatus::Indeterminate);
    }

    #[test]
    fn test_no_invocations_counts_as_success() {
        assert_eq!(overall(&[]), OverallStatus::Success);
    }

    #[test]
    fn test_counts() {
        let counts = StatusCounts::tally([Success, Success, Failed]);

        assert_eq!(
            counts,
            StatusCounts {
                success: 2,
                failed: 1,
                total: 3,
                ..StatusCounts::default()
            }
        );
    }

    #[test]
    fn test_unknown_wire_status() {
        let status: CommandStatus = serde_json::from_str(r#""Undeliverable""#).unwrap();
        assert_eq!(status, Unknown);
    }
}
