use crate::error::{Error, Result};

use std::time::Duration;

use farm_conch::ConchOptions;

const DEFAULT_RESCHEDULE_DELAY: Duration = Duration::from_secs(30);
const DEFAULT_MAX_STATUS_CHECKS: u32 = 120;

/// Settings shared by every component of one coordinator invocation.
///
/// Built once at entry and passed down explicitly.
#[derive(Clone, Debug)]
pub struct CoordinatorConfig {
    membership_store: String,
    notification_topic: String,
    deployment_name: String,

    /// Pause before republishing an event that cannot make progress yet.
    pub reschedule_delay: Duration,

    /// Status checks after which still-running configuration counts as timed out.
    pub max_status_checks: u32,

    /// Lease behaviour for membership mutations.
    pub conch: ConchOptions,
}

impl CoordinatorConfig {
    /// Creates a config from the three required settings.
    ///
    /// # Errors
    ///
    /// Returns [`Error::MissingConfig`] if any setting is blank.
    pub fn new(
        membership_store: impl Into<String>,
        notification_topic: impl Into<String>,
        deployment_name: impl Into<String>,
    ) -> Result<Self> {
        let membership_store = required("MEMBERSHIP_STORE", membership_store.into())?;
        let notification_topic = required("NOTIFICATION_TOPIC", notification_topic.into())?;
        let deployment_name = required("DEPLOYMENT_NAME", deployment_name.into())?;

        Ok(Self {
            membership_store,
            notification_topic,
            deployment_name,
            reschedule_delay: DEFAULT_RESCHEDULE_DELAY,
            max_status_checks: DEFAULT_MAX_STATUS_CHECKS,
            conch: ConchOptions::default(),
        })
    }

    /// Location (path prefix) of the shared parameter namespace.
    #[must_use]
    pub fn membership_store(&self) -> &str {
        &self.membership_store
    }

    /// Identifier of the channel used to reschedule work.
    #[must_use]
    pub fn notification_topic(&self) -> &str {
        &self.notification_topic
    }

    /// Deployment name; scopes the membership record and the lease.
    #[must_use]
    pub fn deployment_name(&self) -> &str {
        &self.deployment_name
    }
}

fn required(name: &'static str, value: String) -> Result<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(Error::MissingConfig(name));
    }

    Ok(value.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    use assert_matches::assert_matches;

    #[test]
    fn test_defaults() {
        let config = CoordinatorConfig::new("/rds", "arn:aws:sns:topic", "farm").unwrap();

        assert_eq!(config.membership_store(), "/rds");
        assert_eq!(config.notification_topic(), "arn:aws:sns:topic");
        assert_eq!(config.deployment_name(), "farm");
        assert_eq!(config.reschedule_delay, Duration::from_secs(30));
        assert_eq!(config.conch.ttl, Duration::from_secs(60));
    }

    #[test]
    fn test_missing_settings_are_fatal() {
        assert_matches!(
            CoordinatorConfig::new("", "topic", "farm"),
            Err(Error::MissingConfig("MEMBERSHIP_STORE"))
        );
        assert_matches!(
            CoordinatorConfig::new("/rds", " ", "farm"),
            Err(Error::MissingConfig("NOTIFICATION_TOPIC"))
        );
        assert_matches!(
            CoordinatorConfig::new("/rds", "topic", ""),
            Err(Error::MissingConfig("DEPLOYMENT_NAME"))
        );
    }
}
